//! Interactive result pages backed by persisted pagination sessions.
//!
//! A session remembers which query a list message shows and which page is
//! on screen. Navigation re-runs the query for the target page, so totals
//! and blocked-item exclusions always reflect current data.

use tracing::{debug, warn};

use crate::db::{RecipeQuery, Repository};
use crate::error::Result;
use crate::models::{PaginationSession, SessionQuery};
use crate::transport::{format, Controls, DeliverySink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

impl Direction {
    pub fn from_action(action: &str) -> Option<Self> {
        match action {
            "nextPage" => Some(Direction::Next),
            "previousPage" => Some(Direction::Previous),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The message now shows this page.
    Rendered(u32),
    /// No page in that direction, or the session is gone. Nothing changed.
    NotFound,
}

struct RenderedPage {
    text: String,
    controls: Controls,
}

pub struct Paginator<'a> {
    repository: &'a Repository,
    sink: &'a dyn DeliverySink,
    page_size: usize,
}

impl<'a> Paginator<'a> {
    pub fn new(repository: &'a Repository, sink: &'a dyn DeliverySink, page_size: usize) -> Self {
        Self {
            repository,
            sink,
            page_size: page_size.max(1),
        }
    }

    /// Send page 0 of `query` and start a session for it. Returns `None`
    /// without sending anything when the query has no results.
    pub async fn open(
        &self,
        chat_id: i64,
        query: SessionQuery,
    ) -> Result<Option<PaginationSession>> {
        let Some(page) = self.render(chat_id, &query, 0).await? else {
            return Ok(None);
        };
        let message_id = self.sink.send(chat_id, &page.text, &page.controls).await?;
        let session = match self
            .repository
            .create_session(chat_id, message_id, &query, 0)
            .await
        {
            Ok(session) => session,
            Err(e) => {
                warn!(chat_id, message_id, error = %e, "Session not stored, removing list message");
                if let Err(delete_err) = self.sink.delete(chat_id, message_id).await {
                    warn!(chat_id, message_id, error = %delete_err, "Could not remove list message");
                }
                return Err(e);
            }
        };
        debug!(chat_id, message_id, kind = query.namespace(), "Opened list session");
        Ok(Some(session))
    }

    pub async fn navigate(
        &self,
        chat_id: i64,
        message_id: i64,
        direction: Direction,
    ) -> Result<PageOutcome> {
        let Some(session) = self.repository.find_session(chat_id, message_id).await? else {
            return Ok(PageOutcome::NotFound);
        };

        let current = session.page_n;
        let target = match direction {
            Direction::Next => current + 1,
            Direction::Previous if current == 0 => return Ok(PageOutcome::NotFound),
            Direction::Previous => current - 1,
        };

        let Some(page) = self.render(chat_id, &session.query, target).await? else {
            return Ok(PageOutcome::NotFound);
        };

        if !self
            .repository
            .set_session_page(session.id, current, target)
            .await?
        {
            debug!(session = session.id, "Lost a concurrent page update");
            return Ok(PageOutcome::NotFound);
        }

        if let Err(e) = self
            .sink
            .edit(chat_id, message_id, &page.text, &page.controls)
            .await
        {
            warn!(session = session.id, error = %e, "Edit failed, restoring page");
            self.repository
                .set_session_page(session.id, target, current)
                .await?;
            return Err(e);
        }

        Ok(PageOutcome::Rendered(target))
    }

    /// Remove the list message and retire its session. Returns whether a
    /// live session was attached to it.
    pub async fn dismiss(&self, chat_id: i64, message_id: i64) -> Result<bool> {
        self.sink.delete(chat_id, message_id).await?;
        match self.repository.find_session(chat_id, message_id).await? {
            Some(session) => self.repository.mark_session_deleted(session.id).await,
            None => Ok(false),
        }
    }

    async fn render(
        &self,
        chat_id: i64,
        query: &SessionQuery,
        page_n: u32,
    ) -> Result<Option<RenderedPage>> {
        let blocked = self.repository.blocked_sets(chat_id).await?;
        let recipe_query = RecipeQuery::for_session(chat_id, query).excluding(&blocked);
        let offset = page_n as usize * self.page_size;

        let cards = self
            .repository
            .query_recipes(&recipe_query, offset, self.page_size)
            .await?;
        if cards.is_empty() {
            return Ok(None);
        }
        let total = self.repository.count_recipes(&recipe_query).await?;

        let (text, controls) = format::list_message(
            &cards,
            offset,
            page_n,
            total,
            self.page_size,
            query.namespace(),
        );
        Ok(Some(RenderedPage { text, controls }))
    }
}
