pub mod app;
pub mod bot;
pub mod config;
pub mod db;
pub mod error;
pub mod fulfill;
pub mod ingest;
pub mod lookup;
pub mod models;
pub mod normalize;
pub mod pagination;
pub mod source;
pub mod transport;
