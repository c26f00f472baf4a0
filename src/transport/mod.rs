//! Messaging transport boundary: outbound send/edit/delete plus the shape
//! of inbound callback tokens.

pub mod format;
#[cfg(test)]
pub(crate) mod memory;
mod telegram;

use async_trait::async_trait;

use crate::error::Result;

pub use telegram::{
    CallbackQuery, ChatInfo, IncomingMessage, TelegramClient, Update, DEFAULT_API_URL,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub text: String,
    pub callback: String,
}

impl Button {
    pub fn new(text: impl Into<String>, callback: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback: callback.into(),
        }
    }
}

/// Rows of inline buttons attached to a message.
pub type Controls = Vec<Vec<Button>>;

#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Send a message and return its transport id.
    async fn send(&self, chat_id: i64, text: &str, controls: &Controls) -> Result<i64>;

    async fn edit(&self, chat_id: i64, message_id: i64, text: &str, controls: &Controls)
        -> Result<()>;

    async fn delete(&self, chat_id: i64, message_id: i64) -> Result<()>;
}

/// Inbound callback token `<namespace>/<action>[/<item_id>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callback {
    pub namespace: String,
    pub action: String,
    pub item_id: Option<String>,
}

impl Callback {
    pub fn new(namespace: &str, action: &str, item_id: Option<&str>) -> Self {
        Self {
            namespace: namespace.to_string(),
            action: action.to_string(),
            item_id: item_id.map(str::to_string),
        }
    }

    pub fn parse(data: &str) -> Option<Self> {
        let mut parts = data.splitn(3, '/');
        let namespace = parts.next().filter(|s| !s.is_empty())?;
        let action = parts.next().filter(|s| !s.is_empty())?;
        let item_id = parts.next().filter(|s| !s.is_empty());
        Some(Self::new(namespace, action, item_id))
    }

    pub fn encode(&self) -> String {
        match &self.item_id {
            Some(id) => format!("{}/{}/{}", self.namespace, self.action, id),
            None => format!("{}/{}", self.namespace, self.action),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_callback_tokens() {
        assert_eq!(
            Callback::parse("recipe/like/abc123"),
            Some(Callback::new("recipe", "like", Some("abc123")))
        );
        assert_eq!(
            Callback::parse("search/nextPage"),
            Some(Callback::new("search", "nextPage", None))
        );
        assert_eq!(Callback::parse("garbage"), None);
        assert_eq!(Callback::parse("/x"), None);
    }

    #[test]
    fn item_ids_may_contain_slashes() {
        let callback = Callback::parse("recipe/show/a/b").unwrap();
        assert_eq!(callback.item_id.as_deref(), Some("a/b"));
        assert_eq!(callback.encode(), "recipe/show/a/b");
    }
}
