use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::error::{AppError, Result};
use crate::models::{BlockedSets, Chat, NewChat, Subject, SubjectKind};

use super::repository::{to_db_time, Repository};

impl Repository {
    // Chat operations

    /// Register a chat or refresh its metadata and last-seen time.
    pub async fn upsert_chat(&self, chat: NewChat) -> Result<Chat> {
        let now = Utc::now();
        let stored = Chat {
            id: chat.id,
            username: chat.username.filter(|s| !s.is_empty()),
            first_name: chat.first_name.filter(|s| !s.is_empty()),
            last_name: chat.last_name.filter(|s| !s.is_empty()),
            last_seen: now,
        };
        let row = stored.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO chats (id, username, first_name, last_name, last_seen)
                       VALUES (?1, ?2, ?3, ?4, ?5)
                       ON CONFLICT(id) DO UPDATE SET
                           username = excluded.username,
                           first_name = excluded.first_name,
                           last_name = excluded.last_name,
                           last_seen = excluded.last_seen"#,
                    params![
                        row.id,
                        row.username,
                        row.first_name,
                        row.last_name,
                        to_db_time(&row.last_seen)
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(stored)
    }

    pub async fn chat_ids(&self) -> Result<Vec<i64>> {
        let ids = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT id FROM chats ORDER BY id")?;
                let ids = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<i64>>>()?;
                Ok(ids)
            })
            .await?;
        Ok(ids)
    }

    /// Flip the liked state of a recipe for a chat; returns the new state.
    pub async fn toggle_like(&self, chat_id: i64, recipe_id: &str) -> Result<bool> {
        let recipe_id = recipe_id.to_string();
        let missing_id = recipe_id.clone();
        let liked = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let exists = tx
                    .query_row(
                        "SELECT 1 FROM recipes WHERE id = ?1",
                        params![recipe_id],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();
                if !exists {
                    return Ok(None);
                }
                let removed = tx.execute(
                    "DELETE FROM liked_recipes WHERE chat_id = ?1 AND recipe_id = ?2",
                    params![chat_id, recipe_id],
                )?;
                if removed == 0 {
                    tx.execute(
                        "INSERT INTO liked_recipes (chat_id, recipe_id) VALUES (?1, ?2)",
                        params![chat_id, recipe_id],
                    )?;
                }
                tx.commit()?;
                Ok(Some(removed == 0))
            })
            .await?;
        liked.ok_or_else(|| AppError::NotFound(format!("Recipe {missing_id} not found")))
    }

    /// Returns `false` when the subject was already blocked.
    pub async fn block(&self, chat_id: i64, subject: &Subject) -> Result<bool> {
        let sql = match subject.kind {
            SubjectKind::Tag => "INSERT OR IGNORE INTO blocked_tags (chat_id, tag_id) VALUES (?1, ?2)",
            SubjectKind::Author => {
                "INSERT OR IGNORE INTO blocked_authors (chat_id, author_id) VALUES (?1, ?2)"
            }
        };
        let subject_id = subject.id.clone();
        let inserted = self
            .conn
            .call(move |conn| Ok(conn.execute(sql, params![chat_id, subject_id])?))
            .await?;
        Ok(inserted > 0)
    }

    /// Returns `false` when the subject was not blocked.
    pub async fn unblock(&self, chat_id: i64, subject: &Subject) -> Result<bool> {
        let sql = match subject.kind {
            SubjectKind::Tag => "DELETE FROM blocked_tags WHERE chat_id = ?1 AND tag_id = ?2",
            SubjectKind::Author => {
                "DELETE FROM blocked_authors WHERE chat_id = ?1 AND author_id = ?2"
            }
        };
        let subject_id = subject.id.clone();
        let removed = self
            .conn
            .call(move |conn| Ok(conn.execute(sql, params![chat_id, subject_id])?))
            .await?;
        Ok(removed > 0)
    }

    pub async fn blocked_sets(&self, chat_id: i64) -> Result<BlockedSets> {
        let blocked = self
            .conn
            .call(move |conn| {
                let mut stmt = conn
                    .prepare("SELECT tag_id FROM blocked_tags WHERE chat_id = ?1 ORDER BY tag_id")?;
                let tags = stmt
                    .query_map(params![chat_id], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                let mut stmt = conn.prepare(
                    "SELECT author_id FROM blocked_authors WHERE chat_id = ?1 ORDER BY author_id",
                )?;
                let authors = stmt
                    .query_map(params![chat_id], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
                Ok(BlockedSets { tags, authors })
            })
            .await?;
        Ok(blocked)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{test_card, Repository};
    use crate::models::{NewChat, Subject};

    fn chat(id: i64) -> NewChat {
        NewChat {
            id,
            username: Some("cook".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn toggle_like_flips_state() {
        let repo = Repository::open_in_memory().await.unwrap();
        repo.upsert_chat(chat(1)).await.unwrap();
        repo.save_page(vec![test_card("a", "A", None)]).await.unwrap();

        assert!(repo.toggle_like(1, "a").await.unwrap());
        assert!(!repo.toggle_like(1, "a").await.unwrap());
        assert!(repo.toggle_like(1, "missing").await.is_err());
    }

    #[tokio::test]
    async fn block_and_unblock_round_trip() {
        let repo = Repository::open_in_memory().await.unwrap();
        repo.upsert_chat(chat(1)).await.unwrap();
        repo.save_page(vec![test_card("a", "A", None)]).await.unwrap();

        assert!(repo.block(1, &Subject::tag("dinner")).await.unwrap());
        assert!(!repo.block(1, &Subject::tag("dinner")).await.unwrap());
        assert!(repo.block(1, &Subject::author("mollybaz")).await.unwrap());

        let blocked = repo.blocked_sets(1).await.unwrap();
        assert_eq!(blocked.tags, vec!["dinner"]);
        assert_eq!(blocked.authors, vec!["mollybaz"]);

        assert!(repo.unblock(1, &Subject::tag("dinner")).await.unwrap());
        assert!(repo.blocked_sets(1).await.unwrap().tags.is_empty());
    }

    #[tokio::test]
    async fn upsert_chat_refreshes_metadata() {
        let repo = Repository::open_in_memory().await.unwrap();
        repo.upsert_chat(chat(7)).await.unwrap();
        let updated = repo
            .upsert_chat(NewChat {
                id: 7,
                username: Some(String::new()),
                first_name: Some("Ada".to_string()),
                last_name: None,
            })
            .await
            .unwrap();

        assert_eq!(updated.username, None);
        assert_eq!(repo.chat_ids().await.unwrap(), vec![7]);
    }
}
