use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::error::{AppError, Result};
use crate::models::{Subject, SubjectKind, Subscription};

use super::repository::{datetime_column, to_db_time, Repository};

enum SubscribeResult {
    Created(i64),
    Duplicate,
    LimitReached,
}

impl Repository {
    // Subscription operations

    /// Subscribe a chat to a tag or author.
    ///
    /// The watermark starts at `now`, so only recipes published after
    /// subscribing are delivered. Duplicates and going over `limit` are
    /// rejected without touching the table.
    pub async fn subscribe(
        &self,
        chat_id: i64,
        subject: &Subject,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        let (tag_id, author_id) = subject.columns();
        let tag_id = tag_id.map(str::to_string);
        let author_id = author_id.map(str::to_string);
        let now_text = to_db_time(&now);

        let result = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let existing: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM subscriptions
                     WHERE chat_id = ?1 AND tag_id IS ?2 AND author_id IS ?3",
                    params![chat_id, tag_id, author_id],
                    |row| row.get(0),
                )?;
                if existing > 0 {
                    return Ok(SubscribeResult::Duplicate);
                }
                let total: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM subscriptions WHERE chat_id = ?1",
                    params![chat_id],
                    |row| row.get(0),
                )?;
                if total as usize >= limit {
                    return Ok(SubscribeResult::LimitReached);
                }
                tx.execute(
                    "INSERT INTO subscriptions (chat_id, tag_id, author_id, last_item_date, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)",
                    params![chat_id, tag_id, author_id, now_text],
                )?;
                let id = tx.last_insert_rowid();
                tx.commit()?;
                Ok(SubscribeResult::Created(id))
            })
            .await?;

        match result {
            SubscribeResult::Created(id) => Ok(Subscription {
                id,
                chat_id,
                subject: subject.clone(),
                subject_name: None,
                last_item_date: now,
                created_at: now,
            }),
            SubscribeResult::Duplicate => Err(AppError::Constraint(
                "You are already subscribed to this".to_string(),
            )),
            SubscribeResult::LimitReached => Err(AppError::Constraint(format!(
                "You can have at most {limit} subscriptions"
            ))),
        }
    }

    /// Returns `false` when there was no such subscription.
    pub async fn unsubscribe(&self, chat_id: i64, subject: &Subject) -> Result<bool> {
        let (tag_id, author_id) = subject.columns();
        let tag_id = tag_id.map(str::to_string);
        let author_id = author_id.map(str::to_string);
        let removed = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM subscriptions WHERE chat_id = ?1 AND tag_id IS ?2 AND author_id IS ?3",
                    params![chat_id, tag_id, author_id],
                )?)
            })
            .await?;
        Ok(removed > 0)
    }

    pub async fn subscriptions(&self, chat_id: i64) -> Result<Vec<Subscription>> {
        let subscriptions = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT s.id, s.chat_id, s.tag_id, s.author_id, s.last_item_date, s.created_at,
                              COALESCE(t.name, a.name)
                       FROM subscriptions s
                       LEFT JOIN tags t ON t.id = s.tag_id
                       LEFT JOIN authors a ON a.id = s.author_id
                       WHERE s.chat_id = ?1
                       ORDER BY s.id"#,
                )?;
                let subscriptions = stmt
                    .query_map(params![chat_id], |row| {
                        let tag_id: Option<String> = row.get(2)?;
                        let author_id: Option<String> = row.get(3)?;
                        let subject = match (tag_id, author_id) {
                            (Some(id), _) => Subject::tag(id),
                            (None, Some(id)) => Subject::author(id),
                            (None, None) => {
                                return Err(rusqlite::Error::InvalidColumnType(
                                    2,
                                    "tag_id".to_string(),
                                    rusqlite::types::Type::Null,
                                ))
                            }
                        };
                        Ok(Subscription {
                            id: row.get(0)?,
                            chat_id: row.get(1)?,
                            subject,
                            subject_name: row.get(6)?,
                            last_item_date: datetime_column(row, 4)?,
                            created_at: datetime_column(row, 5)?,
                        })
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(subscriptions)
            })
            .await?;
        Ok(subscriptions)
    }

    /// Move every watermark of the chat that is older than `date` up to it.
    ///
    /// All of the chat's subscriptions move together, not only the ones the
    /// delivered recipe matched. Returns the number of rows advanced.
    pub async fn advance_watermarks(&self, chat_id: i64, date: DateTime<Utc>) -> Result<usize> {
        let date = to_db_time(&date);
        let advanced = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    "UPDATE subscriptions SET last_item_date = ?2
                     WHERE chat_id = ?1 AND last_item_date < ?2",
                    params![chat_id, date],
                )?)
            })
            .await?;
        Ok(advanced)
    }
}
