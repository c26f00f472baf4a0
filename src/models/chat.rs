use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Author, Tag};

#[derive(Debug, Clone, PartialEq)]
pub struct Chat {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub last_seen: DateTime<Utc>,
}

/// Chat metadata as reported by the transport on each inbound event.
#[derive(Debug, Clone, Default)]
pub struct NewChat {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectKind {
    Tag,
    Author,
}

/// What a subscription or block points at: a tag or an author id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subject {
    pub kind: SubjectKind,
    pub id: String,
}

impl Subject {
    pub fn tag(id: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Tag,
            id: id.into(),
        }
    }

    pub fn author(id: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Author,
            id: id.into(),
        }
    }

    /// Column pair `(tag_id, author_id)` with exactly one side set.
    pub fn columns(&self) -> (Option<&str>, Option<&str>) {
        match self.kind {
            SubjectKind::Tag => (Some(self.id.as_str()), None),
            SubjectKind::Author => (None, Some(self.id.as_str())),
        }
    }
}

impl From<&Tag> for Subject {
    fn from(tag: &Tag) -> Self {
        Subject::tag(tag.id.clone())
    }
}

impl From<&Author> for Subject {
    fn from(author: &Author) -> Self {
        Subject::author(author.id.clone())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: i64,
    pub chat_id: i64,
    pub subject: Subject,
    pub subject_name: Option<String>,
    pub last_item_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.subject_name.as_deref().unwrap_or(&self.subject.id);
        match self.subject.kind {
            SubjectKind::Tag => write!(f, "#{label}"),
            SubjectKind::Author => write!(f, "{label}"),
        }
    }
}

/// Tags and authors a chat never wants to see in browsing results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockedSets {
    pub tags: Vec<String>,
    pub authors: Vec<String>,
}
