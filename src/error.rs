use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database connection error: {0}")]
    Connection(#[from] tokio_rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Recipe source error on page {page}: {message}")]
    Source { page: u32, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Constraint(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Errors talking to the recipe source that are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Source { .. } | AppError::Http(_))
    }

    /// Message safe to show to a chat user, if the error is one they caused.
    pub fn user_message(&self) -> Option<&str> {
        match self {
            AppError::NotFound(msg) | AppError::Constraint(msg) => Some(msg),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
