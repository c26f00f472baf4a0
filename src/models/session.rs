use chrono::{DateTime, Utc};

/// Result set behind an interactive list message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionQuery {
    Search { primary: String, ingredients: String },
    Liked,
}

impl SessionQuery {
    /// Callback namespace used by the list message's navigation buttons.
    pub fn namespace(&self) -> &'static str {
        match self {
            SessionQuery::Search { .. } => "search",
            SessionQuery::Liked => "liked",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaginationSession {
    pub id: i64,
    pub message_id: i64,
    pub chat_id: i64,
    pub query: SessionQuery,
    pub page_n: u32,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub is_deleted: bool,
}
