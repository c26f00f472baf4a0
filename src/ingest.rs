//! Incremental ingestion from the recipe source.
//!
//! Walks the listing newest-first from a start page, upserting each page in
//! its own transaction, until the listing runs out or a page reaches back to
//! the high watermark (the newest date a previous run already stored).

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::db::Repository;
use crate::error::Result;
use crate::models::RecipeCard;
use crate::source::{is_sponsored, parse_pub_date, ItemParser, RawItem, RecipeSource, SourcePage};

#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Base pause between page fetches and between retries.
    pub pause: Duration,
    pub max_attempts: u32,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            pause: Duration::from_secs(3),
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub saved: usize,
    pub newest_seen: Option<DateTime<Utc>>,
    pub pages: u32,
}

/// Items of one page that survived filtering, plus the date range seen.
#[derive(Debug, Default)]
struct PageSelection {
    cards: Vec<RecipeCard>,
    oldest: Option<DateTime<Utc>>,
    newest: Option<DateTime<Utc>>,
}

/// `base` scaled by a uniform factor in `[0.85, 1.15]`.
pub fn jittered(base: Duration) -> Duration {
    base.mul_f64(rand::thread_rng().gen_range(0.85..=1.15))
}

pub struct Ingestor<'a> {
    source: &'a dyn RecipeSource,
    repository: &'a Repository,
    parser: &'a ItemParser,
    settings: IngestSettings,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        source: &'a dyn RecipeSource,
        repository: &'a Repository,
        parser: &'a ItemParser,
        settings: IngestSettings,
    ) -> Self {
        Self {
            source,
            repository,
            parser,
            settings,
        }
    }

    /// Ingest everything newer than the newest recipe already stored.
    pub async fn ingest_since_latest(&self, start_page: u32) -> Result<IngestReport> {
        let watermark = self.repository.latest_pub_date().await?;
        self.ingest(watermark, start_page).await
    }

    /// Crawl from `start_page` until the listing is exhausted or a page's
    /// oldest dated item is at or before `high_watermark`.
    ///
    /// A page that still fails after the retry ceiling aborts the run; pages
    /// committed before it stay committed.
    pub async fn ingest(
        &self,
        high_watermark: Option<DateTime<Utc>>,
        start_page: u32,
    ) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for page_n in start_page.. {
            let page = self.fetch_with_retry(page_n).await?;

            if page.items.is_empty() {
                info!(page = page_n, "stopping: page is empty");
                break;
            }

            let fetched = page.items.len();
            let selection = select_items(&page.items, high_watermark, self.parser);
            let saved = self.repository.save_page(selection.cards).await?;

            report.saved += saved;
            report.pages += 1;
            if selection.newest > report.newest_seen {
                report.newest_seen = selection.newest;
            }

            info!(
                page = page_n,
                fetched,
                saved,
                total = report.saved,
                oldest = ?selection.oldest,
                "page ingested"
            );

            if let (Some(watermark), Some(oldest)) = (high_watermark, selection.oldest) {
                if oldest <= watermark {
                    info!(page = page_n, %watermark, "stopping: reached watermark");
                    break;
                }
            }

            tokio::time::sleep(jittered(self.settings.pause)).await;
        }

        Ok(report)
    }

    async fn fetch_with_retry(&self, page: u32) -> Result<SourcePage> {
        let mut attempt = 1;
        loop {
            debug!(page, attempt, "loading page");
            match self.source.fetch_page(page).await {
                Ok(data) => return Ok(data),
                Err(e) if e.is_transient() && attempt < self.settings.max_attempts => {
                    warn!(
                        page,
                        attempt,
                        max_attempts = self.settings.max_attempts,
                        error = %e,
                        "page fetch failed, retrying"
                    );
                    tokio::time::sleep(jittered(self.settings.pause)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Drop sponsored items and items at or before the watermark, parse the
/// rest. Skipped dated items still count towards the date range so the
/// crawl can tell it has walked past the watermark.
fn select_items(
    items: &[RawItem],
    high_watermark: Option<DateTime<Utc>>,
    parser: &ItemParser,
) -> PageSelection {
    let mut selection = PageSelection::default();

    for item in items {
        if is_sponsored(item) {
            debug!(id = %item.id, "skipping sponsored item");
            continue;
        }

        if let Some(date) = item.pub_date.as_deref().and_then(parse_pub_date) {
            if selection.oldest.map_or(true, |oldest| date < oldest) {
                selection.oldest = Some(date);
            }
            if selection.newest.map_or(true, |newest| date > newest) {
                selection.newest = Some(date);
            }
            if high_watermark.is_some_and(|watermark| date <= watermark) {
                continue;
            }
        }

        selection.cards.push(parser.parse(item));
    }

    selection
}
