use chrono::{SubsecRound, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::error::Result;
use crate::models::{PaginationSession, SessionQuery};

use super::repository::{datetime_column, to_db_time, Repository};

const SESSION_COLUMNS: &str = "id, message_id, chat_id, kind, query_primary, query_ingredients, \
     page_n, created_at, modified_at, is_deleted";

impl Repository {
    // Pagination session operations

    pub async fn create_session(
        &self,
        chat_id: i64,
        message_id: i64,
        query: &SessionQuery,
        page_n: u32,
    ) -> Result<PaginationSession> {
        // Stored with microsecond precision.
        let now = Utc::now().trunc_subsecs(6);
        let (primary, ingredients) = match query {
            SessionQuery::Search {
                primary,
                ingredients,
            } => (primary.clone(), ingredients.clone()),
            SessionQuery::Liked => (String::new(), String::new()),
        };
        let kind = query.namespace();
        let now_text = to_db_time(&now);

        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO pagination_sessions
                           (message_id, chat_id, kind, query_primary, query_ingredients, page_n,
                            created_at, modified_at, is_deleted)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, 0)"#,
                    params![message_id, chat_id, kind, primary, ingredients, page_n, now_text],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        Ok(PaginationSession {
            id,
            message_id,
            chat_id,
            query: query.clone(),
            page_n,
            created_at: now,
            modified_at: now,
            is_deleted: false,
        })
    }

    /// Live (not deleted) session behind a chat message.
    pub async fn find_session(
        &self,
        chat_id: i64,
        message_id: i64,
    ) -> Result<Option<PaginationSession>> {
        let session = self
            .conn
            .call(move |conn| {
                let session = conn
                    .query_row(
                        &format!(
                            "SELECT {SESSION_COLUMNS} FROM pagination_sessions
                             WHERE chat_id = ?1 AND message_id = ?2 AND is_deleted = 0
                             ORDER BY id DESC LIMIT 1"
                        ),
                        params![chat_id, message_id],
                        session_from_row,
                    )
                    .optional()?;
                Ok(session)
            })
            .await?;
        Ok(session)
    }

    /// Move a session from `expected` to `page_n`.
    ///
    /// Returns `false` if the session was changed or deleted concurrently,
    /// in which case nothing is written.
    pub async fn set_session_page(&self, id: i64, expected: u32, page_n: u32) -> Result<bool> {
        let now = to_db_time(&Utc::now());
        let updated = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    "UPDATE pagination_sessions SET page_n = ?3, modified_at = ?4
                     WHERE id = ?1 AND page_n = ?2 AND is_deleted = 0",
                    params![id, expected, page_n, now],
                )?)
            })
            .await?;
        Ok(updated > 0)
    }

    pub async fn mark_session_deleted(&self, id: i64) -> Result<bool> {
        let now = to_db_time(&Utc::now());
        let updated = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    "UPDATE pagination_sessions SET is_deleted = 1, modified_at = ?2
                     WHERE id = ?1 AND is_deleted = 0",
                    params![id, now],
                )?)
            })
            .await?;
        Ok(updated > 0)
    }
}

fn session_from_row(row: &Row) -> rusqlite::Result<PaginationSession> {
    let kind: String = row.get(3)?;
    let query = match kind.as_str() {
        "liked" => SessionQuery::Liked,
        _ => SessionQuery::Search {
            primary: row.get(4)?,
            ingredients: row.get(5)?,
        },
    };
    Ok(PaginationSession {
        id: row.get(0)?,
        message_id: row.get(1)?,
        chat_id: row.get(2)?,
        query,
        page_n: row.get(6)?,
        created_at: datetime_column(row, 7)?,
        modified_at: datetime_column(row, 8)?,
        is_deleted: row.get(9)?,
    })
}
