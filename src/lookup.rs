//! Resolve a user-typed tag or author reference.

use crate::db::Repository;
use crate::error::Result;
use crate::models::{Lookup, Subject};
use crate::normalize::id_from_name;

const TAG_PREFIX: char = '#';
const AUTHOR_PREFIX: char = '@';
const MAX_SUGGESTIONS: usize = 3;

/// `#name` looks up only tags, `@name` only authors. A bare name checks
/// both and reports `Ambiguous` when it matches one of each.
pub async fn resolve(repository: &Repository, raw: &str) -> Result<Lookup> {
    let raw = raw.trim();

    if let Some(name) = raw.strip_prefix(TAG_PREFIX) {
        let name = name.trim();
        return Ok(match repository.tag(&id_from_name(name)).await? {
            Some(tag) => Lookup::Found {
                subject: Subject::from(&tag),
                label: format!("#{}", tag.label()),
            },
            None => Lookup::TagNotFound {
                name: name.to_string(),
                suggestion: repository.similar_tags(name, 1).await?.pop(),
            },
        });
    }

    if let Some(name) = raw.strip_prefix(AUTHOR_PREFIX) {
        let name = name.trim();
        return Ok(match repository.author(&id_from_name(name)).await? {
            Some(author) => Lookup::Found {
                subject: Subject::from(&author),
                label: author.label().to_string(),
            },
            None => Lookup::AuthorNotFound {
                name: name.to_string(),
                suggestion: repository.similar_authors(name, 1).await?.pop(),
            },
        });
    }

    let id = id_from_name(raw);
    let tag = repository.tag(&id).await?;
    let author = repository.author(&id).await?;

    Ok(match (tag, author) {
        (Some(tag), Some(author)) => Lookup::Ambiguous { tag, author },
        (Some(tag), None) => Lookup::Found {
            subject: Subject::from(&tag),
            label: format!("#{}", tag.label()),
        },
        (None, Some(author)) => Lookup::Found {
            subject: Subject::from(&author),
            label: author.label().to_string(),
        },
        (None, None) => {
            let mut suggestions: Vec<String> = repository
                .similar_tags(raw, MAX_SUGGESTIONS)
                .await?
                .iter()
                .map(|tag| format!("#{}", tag.label()))
                .collect();
            suggestions.extend(
                repository
                    .similar_authors(raw, MAX_SUGGESTIONS)
                    .await?
                    .iter()
                    .map(|author| author.label().to_string()),
            );
            Lookup::NothingFound {
                name: raw.to_string(),
                suggestions,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_card;
    use crate::models::{Author, Tag};

    async fn setup() -> Repository {
        let repo = Repository::open_in_memory().await.unwrap();
        let mut card = test_card("r1", "Lemon Pasta", Some((2024, 3, 1)));
        card.tags.push(Tag::from_display_name("Quick"));
        card.authors.push(Author::from_display_name("Quick"));
        repo.save_page(vec![card]).await.unwrap();
        repo
    }

    #[tokio::test]
    async fn bare_names_resolve_to_the_only_match() {
        let repo = setup().await;

        assert_eq!(
            resolve(&repo, "dinner").await.unwrap(),
            Lookup::Found {
                subject: Subject::tag("dinner"),
                label: "#Dinner".to_string(),
            }
        );
        assert_eq!(
            resolve(&repo, "Molly Baz").await.unwrap(),
            Lookup::Found {
                subject: Subject::author("mollybaz"),
                label: "Molly Baz".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn name_matching_both_is_ambiguous_until_prefixed() {
        let repo = setup().await;

        assert!(matches!(
            resolve(&repo, "quick").await.unwrap(),
            Lookup::Ambiguous { .. }
        ));
        assert!(matches!(
            resolve(&repo, "#quick").await.unwrap(),
            Lookup::Found { subject, .. } if subject == Subject::tag("quick")
        ));
        assert!(matches!(
            resolve(&repo, "@Quick").await.unwrap(),
            Lookup::Found { subject, .. } if subject == Subject::author("quick")
        ));
    }

    #[tokio::test]
    async fn misses_carry_similar_suggestions() {
        let repo = setup().await;

        match resolve(&repo, "#diner").await.unwrap() {
            Lookup::TagNotFound { name, suggestion } => {
                assert_eq!(name, "diner");
                assert_eq!(suggestion.map(|t| t.id), Some("dinner".to_string()));
            }
            other => panic!("unexpected lookup: {other:?}"),
        }

        match resolve(&repo, "@Molly Bas").await.unwrap() {
            Lookup::AuthorNotFound { suggestion, .. } => {
                assert_eq!(suggestion.map(|a| a.id), Some("mollybaz".to_string()));
            }
            other => panic!("unexpected lookup: {other:?}"),
        }

        match resolve(&repo, "zzzz").await.unwrap() {
            Lookup::NothingFound { name, suggestions } => {
                assert_eq!(name, "zzzz");
                assert!(suggestions.is_empty());
            }
            other => panic!("unexpected lookup: {other:?}"),
        }
    }
}
