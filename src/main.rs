use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use gmail_purge::config::{Config, Overrides};
use gmail_purge::gmail_client::GmailClient;
use gmail_purge::PipelineDriver;

#[derive(Parser)]
#[command(name = "gmail-purge")]
#[command(about = "Archive and delete Gmail messages older than a cutoff date")]
#[command(version = "0.1.0")]
struct Args {
    /// Delete messages received before this date (YYYY-MM-DD)
    #[arg(short, long, value_name = "DATE")]
    before: Option<String>,

    /// Do not save messages before deleting them
    #[arg(long)]
    no_archive: bool,

    /// Directory receiving one JSON file per archived message
    #[arg(short = 'o', long, value_name = "PATH")]
    archive_dir: Option<String>,

    /// List matching messages without archiving or deleting anything
    #[arg(short, long)]
    dry_run: bool,

    /// Stop after this many batches
    #[arg(short = 'n', long)]
    max_batches: Option<usize>,

    /// Configuration file (default: ./gmail-purge.toml if present)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Check the configuration without connecting
    #[arg(long)]
    check_config: bool,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            config_file: self.config.clone(),
            cutoff_date: self.before.clone(),
            archive_enabled: self.no_archive.then_some(false),
            archive_dir: self.archive_dir.clone(),
            dry_run: self.dry_run.then_some(true),
            max_batches: self.max_batches,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();

    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load(&args.overrides()).context("Unable to load configuration")?;

    if args.check_config {
        println!("✅ Configuration valid!");
        println!("🔑 Credentials: {}", config.gmail.credentials_path);
        println!("💾 Token cache: {}", config.gmail.token_cache_path);
        println!(
            "📅 Cutoff date: {} (query: {})",
            config.purge.cutoff_date,
            config.purge.query()
        );
        if config.purge.archive_enabled {
            println!("📁 Archive directory: {}", config.purge.archive_dir.display());
        } else {
            println!("📁 Archiving disabled");
        }
        println!("🧪 Dry run: {}", config.purge.dry_run);
        println!(
            "⏱️  Limits: {} per page, {} attempts, {}/min, {}/day, {:?} between batches",
            config.limits.page_size,
            config.limits.max_attempts,
            config.limits.per_minute_request_limit,
            config.limits.daily_request_limit,
            config.limits.batch_cooldown
        );
        return Ok(ExitCode::SUCCESS);
    }

    info!("🚀 Starting gmail-purge");

    let gmail = GmailClient::new(&config.gmail)
        .await
        .context("Unable to connect to Gmail API")?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl+C received, stopping after the current call");
            on_ctrl_c.cancel();
        }
    });

    let driver = PipelineDriver::new(gmail, config.purge, config.limits).with_cancellation(cancel);
    let outcome = driver.run().await;

    Ok(outcome.exit_code())
}
