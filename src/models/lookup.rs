use super::{Author, Subject, Tag};

/// Outcome of resolving a free-text tag or author reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found { subject: Subject, label: String },
    TagNotFound { name: String, suggestion: Option<Tag> },
    AuthorNotFound { name: String, suggestion: Option<Author> },
    Ambiguous { tag: Tag, author: Author },
    NothingFound { name: String, suggestions: Vec<String> },
}
