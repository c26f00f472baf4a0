use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use recipe_feed::app::App;
use recipe_feed::config::Config;
use recipe_feed::source::parse_pub_date;

/// Recipe ingestion, subscription delivery and search over a Telegram bot.
#[derive(Parser)]
#[command(name = "recipe-feed", version)]
struct Cli {
    /// Path to the configuration file (TOML). Created with defaults if missing.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch new recipes from the source once.
    Ingest {
        /// Only ingest recipes newer than this date (YYYY-MM-DD or RFC 3339).
        /// Defaults to the newest stored recipe.
        #[arg(long)]
        from_date: Option<String>,

        /// Listing page to start from.
        #[arg(long, default_value_t = 1)]
        from_page: u32,
    },

    /// Deliver new recipes to subscribers once.
    Fulfill,

    /// Answer bot commands until interrupted.
    Bot,

    /// Bot plus periodic ingestion and fulfillment.
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid --log-level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("failed to load configuration")?;

    let app = App::new(config).await.context("failed to open database")?;

    match cli.command {
        Commands::Ingest {
            from_date,
            from_page,
        } => {
            let from_date = from_date
                .map(|raw| parse_pub_date(&raw).ok_or_else(|| anyhow!("invalid date: {raw}")))
                .transpose()?;
            let report = app.run_ingest(from_date, from_page).await?;
            println!(
                "Saved {} recipes from {} pages (newest: {})",
                report.saved,
                report.pages,
                report
                    .newest_seen
                    .map(|d| d.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string())
            );
        }
        Commands::Fulfill => {
            let report = app.run_fulfill().await?;
            println!(
                "Delivered {} recipes to {} chats ({} failed)",
                report.delivered, report.consumers, report.failed_consumers
            );
        }
        Commands::Bot => app.run_bot().await?,
        Commands::Run => app.run_scheduler().await?,
    }

    Ok(())
}
