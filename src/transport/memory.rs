use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Controls, DeliverySink};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Delivery {
    Sent {
        chat_id: i64,
        message_id: i64,
        text: String,
        controls: Controls,
    },
    Edited {
        chat_id: i64,
        message_id: i64,
        text: String,
    },
    Deleted {
        chat_id: i64,
        message_id: i64,
    },
}

/// Records every call; sends to chats in `failing` (or containing
/// `fail_text`) are rejected.
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub deliveries: Mutex<Vec<Delivery>>,
    pub failing: Mutex<HashSet<i64>>,
    pub fail_text: Mutex<Option<String>>,
    next_id: Mutex<i64>,
}

impl RecordingSink {
    pub fn fail_chat(&self, chat_id: i64) {
        self.failing.lock().unwrap().insert(chat_id);
    }

    pub fn fail_when_text_contains(&self, needle: &str) {
        *self.fail_text.lock().unwrap() = Some(needle.to_string());
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn sent_texts(&self, chat: i64) -> Vec<String> {
        self.deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Sent { chat_id, text, .. } if chat_id == chat => Some(text),
                _ => None,
            })
            .collect()
    }

    fn check(&self, chat_id: i64, text: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(&chat_id) {
            return Err(AppError::Transport(format!("chat {chat_id} unreachable")));
        }
        if let Some(needle) = self.fail_text.lock().unwrap().as_deref() {
            if text.contains(needle) {
                return Err(AppError::Transport("message rejected".to_string()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn send(&self, chat_id: i64, text: &str, controls: &Controls) -> Result<i64> {
        self.check(chat_id, text)?;
        let message_id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            *next
        };
        self.deliveries.lock().unwrap().push(Delivery::Sent {
            chat_id,
            message_id,
            text: text.to_string(),
            controls: controls.clone(),
        });
        Ok(message_id)
    }

    async fn edit(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        _controls: &Controls,
    ) -> Result<()> {
        self.check(chat_id, text)?;
        self.deliveries.lock().unwrap().push(Delivery::Edited {
            chat_id,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete(&self, chat_id: i64, message_id: i64) -> Result<()> {
        self.check(chat_id, "")?;
        self.deliveries.lock().unwrap().push(Delivery::Deleted {
            chat_id,
            message_id,
        });
        Ok(())
    }
}
