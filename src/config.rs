use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use log::debug;
use serde::Deserialize;

use crate::error::PurgeError;

/// Config file looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "gmail-purge.toml";

const ENV_PREFIX: &str = "GMAIL_PURGE";

/// Largest page the Gmail API returns for `messages.list`.
pub const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Debug, Clone)]
pub struct Config {
    pub gmail: GmailConfig,
    pub purge: PurgeConfig,
    pub limits: Limits,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GmailConfig {
    pub credentials_path: String,
    pub token_cache_path: String,
}

/// What a single run does. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeConfig {
    /// Only messages strictly before this date are targeted.
    pub cutoff_date: NaiveDate,
    pub archive_enabled: bool,
    pub archive_dir: PathBuf,
    pub dry_run: bool,
    pub max_batches: Option<usize>,
}

impl PurgeConfig {
    pub fn new(
        cutoff_date: NaiveDate,
        archive_enabled: bool,
        archive_dir: impl Into<PathBuf>,
    ) -> Self {
        PurgeConfig {
            cutoff_date,
            archive_enabled,
            archive_dir: archive_dir.into(),
            dry_run: false,
            max_batches: None,
        }
    }

    /// Gmail search query selecting every message before the cutoff.
    pub fn query(&self) -> String {
        format!("before:{}", self.cutoff_date.format("%Y/%m/%d"))
    }

    /// Archiving only happens on runs that actually delete.
    pub fn archives(&self) -> bool {
        self.archive_enabled && !self.dry_run
    }
}

/// Pacing and quota ceilings applied to every remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    pub page_size: u32,
    pub max_attempts: u32,
    pub daily_request_limit: u64,
    pub per_minute_request_limit: u64,
    pub quota_cooldown: Duration,
    pub backoff_base: Duration,
    pub batch_cooldown: Duration,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            page_size: MAX_PAGE_SIZE,
            max_attempts: 3,
            daily_request_limit: 1_000_000,
            per_minute_request_limit: 250,
            quota_cooldown: Duration::from_secs(60),
            backoff_base: Duration::from_secs(1),
            batch_cooldown: Duration::from_secs(20),
        }
    }
}

/// Values coming from the command line; they win over file and environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub cutoff_date: Option<String>,
    pub archive_enabled: Option<bool>,
    pub archive_dir: Option<String>,
    pub dry_run: Option<bool>,
    pub max_batches: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    credentials_path: String,
    token_cache_path: String,
    cutoff_date: String,
    archive: bool,
    archive_dir: String,
    dry_run: bool,
    max_batches: Option<usize>,
    page_size: u32,
    max_attempts: u32,
    daily_request_limit: u64,
    per_minute_request_limit: u64,
    quota_cooldown_secs: u64,
    backoff_base_secs: u64,
    batch_cooldown_secs: u64,
}

impl Config {
    /// Layers defaults, the optional TOML file, `GMAIL_PURGE_*` variables
    /// and the command line, then validates the result.
    pub fn load(overrides: &Overrides) -> Result<Self, PurgeError> {
        let defaults = Limits::default();
        let file = overrides
            .config_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        debug!("Loading configuration (file: {:?})", file);

        let settings = config::Config::builder()
            .set_default("credentials_path", "./credentials.json")?
            .set_default("token_cache_path", "./gmail-token-cache.json")?
            .set_default("cutoff_date", "2019-01-01")?
            .set_default("archive", true)?
            .set_default("archive_dir", "./archive")?
            .set_default("dry_run", false)?
            .set_default("page_size", i64::from(defaults.page_size))?
            .set_default("max_attempts", i64::from(defaults.max_attempts))?
            .set_default("daily_request_limit", defaults.daily_request_limit as i64)?
            .set_default("per_minute_request_limit", defaults.per_minute_request_limit as i64)?
            .set_default("quota_cooldown_secs", defaults.quota_cooldown.as_secs() as i64)?
            .set_default("backoff_base_secs", defaults.backoff_base.as_secs() as i64)?
            .set_default("batch_cooldown_secs", defaults.batch_cooldown.as_secs() as i64)?
            .add_source(
                config::File::from(file.as_path()).required(overrides.config_file.is_some()),
            )
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .set_override_option("cutoff_date", overrides.cutoff_date.clone())?
            .set_override_option("archive", overrides.archive_enabled)?
            .set_override_option("archive_dir", overrides.archive_dir.clone())?
            .set_override_option("dry_run", overrides.dry_run)?
            .set_override_option("max_batches", overrides.max_batches.map(|n| n as i64))?
            .build()?;

        let raw: RawConfig = settings.try_deserialize()?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, PurgeError> {
        let cutoff_date = parse_cutoff_date(&raw.cutoff_date)?;

        if raw.page_size == 0 || raw.page_size > MAX_PAGE_SIZE {
            return Err(PurgeError::Config(format!(
                "page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, raw.page_size
            )));
        }
        if raw.max_attempts == 0 {
            return Err(PurgeError::Config("max_attempts must be at least 1".to_string()));
        }
        if raw.daily_request_limit == 0 || raw.per_minute_request_limit == 0 {
            return Err(PurgeError::Config("request limits must be at least 1".to_string()));
        }

        Ok(Config {
            gmail: GmailConfig {
                credentials_path: raw.credentials_path,
                token_cache_path: raw.token_cache_path,
            },
            purge: PurgeConfig {
                cutoff_date,
                archive_enabled: raw.archive,
                archive_dir: PathBuf::from(raw.archive_dir),
                dry_run: raw.dry_run,
                max_batches: raw.max_batches,
            },
            limits: Limits {
                page_size: raw.page_size,
                max_attempts: raw.max_attempts,
                daily_request_limit: raw.daily_request_limit,
                per_minute_request_limit: raw.per_minute_request_limit,
                quota_cooldown: Duration::from_secs(raw.quota_cooldown_secs),
                backoff_base: Duration::from_secs(raw.backoff_base_secs),
                batch_cooldown: Duration::from_secs(raw.batch_cooldown_secs),
            },
        })
    }
}

/// Parses an ISO 8601 calendar date (`YYYY-MM-DD`).
pub fn parse_cutoff_date(value: &str) -> Result<NaiveDate, PurgeError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
        PurgeError::Config(format!(
            "invalid cutoff date '{}' (expected YYYY-MM-DD): {}",
            value, e
        ))
    })
}
