use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::bot::{run_polling, Bot, BotSettings};
use crate::config::Config;
use crate::db::Repository;
use crate::error::Result;
use crate::fulfill::{FulfillReport, Fulfiller};
use crate::ingest::{IngestReport, IngestSettings, Ingestor};
use crate::source::{HttpSource, ItemParser};
use crate::transport::TelegramClient;

/// Process-wide services, built once from the configuration.
#[derive(Clone)]
pub struct App {
    pub config: Config,
    pub repository: Repository,
}

fn every(minutes: u32) -> Duration {
    Duration::from_secs(u64::from(minutes.max(1)) * 60)
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let repository = Repository::new(&config.db_path).await?;
        Ok(Self { config, repository })
    }

    fn telegram(&self) -> Result<Arc<TelegramClient>> {
        let token = self.config.require_token()?;
        Ok(Arc::new(TelegramClient::new(
            &self.config.telegram_api_url,
            token,
        )?))
    }

    /// One ingestion run. Without `from_date` the newest stored recipe is
    /// the watermark.
    pub async fn run_ingest(
        &self,
        from_date: Option<DateTime<Utc>>,
        from_page: u32,
    ) -> Result<IngestReport> {
        let source = HttpSource::new(&self.config.source_base_url, self.config.fetch_timeout())?;
        let parser = ItemParser::new(&self.config.source_base_url, &self.config.source_assets_url);
        let settings = IngestSettings {
            pause: self.config.fetch_pause(),
            max_attempts: self.config.fetch_max_attempts,
        };
        let ingestor = Ingestor::new(&source, &self.repository, &parser, settings);

        let report = match from_date {
            Some(date) => ingestor.ingest(Some(date), from_page).await?,
            None => ingestor.ingest_since_latest(from_page).await?,
        };
        info!(
            saved = report.saved,
            pages = report.pages,
            newest = ?report.newest_seen,
            "Ingestion finished"
        );
        Ok(report)
    }

    pub async fn run_fulfill(&self) -> Result<FulfillReport> {
        let client = self.telegram()?;
        self.fulfill_with(&client).await
    }

    async fn fulfill_with(&self, client: &TelegramClient) -> Result<FulfillReport> {
        Fulfiller::new(&self.repository, client, self.config.fulfill_concurrency)
            .fulfill()
            .await
    }

    fn bot(&self, client: Arc<TelegramClient>) -> Bot {
        Bot::new(
            self.repository.clone(),
            client,
            BotSettings {
                page_size: self.config.page_size,
                max_subscriptions: self.config.max_subscriptions,
            },
        )
    }

    pub async fn run_bot(&self) -> Result<()> {
        let client = self.telegram()?;
        let bot = self.bot(client.clone());
        tokio::select! {
            _ = run_polling(&bot, &client) => {}
            _ = tokio::signal::ctrl_c() => info!("Shutting down"),
        }
        Ok(())
    }

    /// Bot polling plus periodic ingestion and fulfillment until Ctrl-C.
    /// A failed run is logged and retried on the next tick.
    pub async fn run_scheduler(&self) -> Result<()> {
        let client = self.telegram()?;
        let bot = self.bot(client.clone());

        let app = self.clone();
        let ingest_every = every(self.config.ingest_interval_minutes);
        let ingest_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(ingest_every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = app.run_ingest(None, 1).await {
                    error!(error = %e, "Scheduled ingestion failed");
                }
            }
        });

        let app = self.clone();
        let fulfill_client = client.clone();
        let fulfill_every = every(self.config.fulfill_interval_minutes);
        let fulfill_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(fulfill_every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if let Err(e) = app.fulfill_with(&fulfill_client).await {
                    error!(error = %e, "Scheduled fulfillment failed");
                }
            }
        });

        info!(
            ingest_minutes = self.config.ingest_interval_minutes,
            fulfill_minutes = self.config.fulfill_interval_minutes,
            "Scheduler started"
        );
        tokio::select! {
            _ = run_polling(&bot, &client) => {}
            _ = tokio::signal::ctrl_c() => info!("Shutting down"),
        }

        ingest_task.abort();
        fulfill_task.abort();
        Ok(())
    }
}
