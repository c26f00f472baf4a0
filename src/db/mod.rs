mod chats;
pub mod query;
mod repository;
mod schema;
mod sessions;
mod subscriptions;

pub use query::{split_search_text, RecipeOrder, RecipeQuery};
pub use repository::Repository;

#[cfg(test)]
pub(crate) use repository::tests::card as test_card;
