//! `candle-sync` configuration: TOML file, defaults, environment overrides.
//!
//! Every section is optional and falls back to its defaults, except `[job]` which is
//! only needed by the `sync` command:
//!
//! ```toml
//! [api]
//! base_url = "https://api-fxpractice.oanda.com/v3"
//! request_timeout_secs = 10
//! requests_per_second = 100
//!
//! [fetch]
//! max_concurrency = 10
//! max_in_flight = 5
//! max_candles_per_request = 5000
//!
//! [database]
//! path = "candles.db"
//! batch_size = 200000
//!
//! [job]
//! instruments = ["EUR_USD", "XAU_USD"]
//! granularities = ["M1", "H1", "D"]
//! from = "31/08/2014 00:00:00"
//! to = "31/08/2024 00:00:00"
//! max_parallel_pairs = 10
//! ```
//!
//! Overrides applied after parsing: `OANDA_URL` replaces `api.base_url`, `DB_PATH`
//! replaces `database.path`. The API token is never read from the file.

use std::{
    num::{NonZeroU32, NonZeroU64, NonZeroUsize},
    path::{Path, PathBuf},
    time::Duration,
};

use candle_ingestor::{
    models::{granularity::Granularity, instrument::Instrument},
    providers::oanda_rest::{OandaConfig, PRACTICE_URL},
    requests::historical::{FetchOptions, MAX_CANDLES_PER_REQUEST},
    time::parse_date_time,
};
use nonzero_ext::nonzero;
use secrecy::SecretString;
use serde::Deserialize;
use shared_utils::env::get_env_var_opt;
use thiserror::Error;
use tracing::debug;

use crate::{store::sqlite::DEFAULT_BATCH_SIZE, sync::SyncJob};

/// Errors raised while loading or interpreting the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config {path}: {source}")]
    Io {
        /// File that was requested.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value parsed but makes no sense.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Upstream API settings.
    pub api: ApiConfig,
    /// Chunking and concurrency.
    pub fetch: FetchConfig,
    /// SQLite location and insert batching.
    pub database: DatabaseConfig,
    /// Pair matrix for the `sync` command.
    pub job: Option<JobConfig>,
}

/// `[api]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    /// REST base URL, including the `/v3` prefix.
    pub base_url: String,
    /// Per-request deadline in seconds.
    pub request_timeout_secs: NonZeroU64,
    /// Client-side request rate cap.
    pub requests_per_second: NonZeroU32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: PRACTICE_URL.to_string(),
            request_timeout_secs: nonzero!(10u64),
            requests_per_second: nonzero!(100u32),
        }
    }
}

/// `[fetch]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Chunk requests one range fetch may run at once.
    pub max_concurrency: NonZeroUsize,
    /// Requests in flight across every pair of a job.
    pub max_in_flight: NonZeroUsize,
    /// Candles per request; the API caps this at 5000.
    pub max_candles_per_request: NonZeroU32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: nonzero!(10usize),
            max_in_flight: nonzero!(5usize),
            max_candles_per_request: MAX_CANDLES_PER_REQUEST,
        }
    }
}

/// `[database]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite file path.
    pub path: String,
    /// Candles per insert sub-batch.
    pub batch_size: NonZeroUsize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "candles.db".to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// `[job]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Instruments to sync.
    pub instruments: Vec<String>,
    /// Granularities to sync for every instrument.
    pub granularities: Vec<Granularity>,
    /// Range start, `DD/MM/YYYY HH:MM:SS`.
    pub from: String,
    /// Range end; omitted means now.
    #[serde(default)]
    pub to: Option<String>,
    /// Pairs processed at once.
    #[serde(default = "default_parallel_pairs")]
    pub max_parallel_pairs: NonZeroUsize,
}

fn default_parallel_pairs() -> NonZeroUsize {
    nonzero!(10usize)
}

impl SyncConfig {
    /// Loads `path` if given (defaults otherwise), then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                debug!(path = %path.display(), "loaded config file");
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document; no environment lookups.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// `OANDA_URL` and `DB_PATH`, when set and non-blank, win over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = get_env_var_opt("OANDA_URL") {
            self.api.base_url = url;
        }
        if let Some(path) = get_env_var_opt("DB_PATH") {
            self.database.path = path;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url is empty".into()));
        }
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::Invalid("database.path is empty".into()));
        }
        if self.fetch.max_candles_per_request > MAX_CANDLES_PER_REQUEST {
            return Err(ConfigError::Invalid(format!(
                "fetch.max_candles_per_request is {}, the API allows at most {MAX_CANDLES_PER_REQUEST}",
                self.fetch.max_candles_per_request
            )));
        }
        if let Some(job) = &self.job {
            if job.instruments.iter().all(|i| i.trim().is_empty()) {
                return Err(ConfigError::Invalid("job.instruments is empty".into()));
            }
            if job.granularities.is_empty() {
                return Err(ConfigError::Invalid("job.granularities is empty".into()));
            }
        }
        Ok(())
    }

    /// Fetcher settings derived from `[fetch]` and `[api]`.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            max_concurrency: self.fetch.max_concurrency,
            max_candles_per_request: self.fetch.max_candles_per_request,
            request_timeout: Duration::from_secs(self.api.request_timeout_secs.get()),
        }
    }

    /// Provider settings for `token`, derived from `[api]`.
    pub fn oanda_config(&self, token: SecretString) -> OandaConfig {
        let mut config = OandaConfig::new(token);
        config.base_url = self.api.base_url.clone();
        config.request_timeout = Duration::from_secs(self.api.request_timeout_secs.get());
        config.requests_per_second = self.api.requests_per_second;
        config
    }

    /// The `[job]` section as a runnable [`SyncJob`].
    pub fn sync_job(&self) -> Result<SyncJob, ConfigError> {
        let job = self
            .job
            .as_ref()
            .ok_or_else(|| ConfigError::Invalid("no [job] section".into()))?;

        let from = parse_date_time(&job.from).map_err(|e| ConfigError::Invalid(format!("job.from: {e}")))?;
        let to = job
            .to
            .as_deref()
            .map(parse_date_time)
            .transpose()
            .map_err(|e| ConfigError::Invalid(format!("job.to: {e}")))?;
        if let Some(to) = to.filter(|to| from > *to) {
            return Err(ConfigError::Invalid(format!("job.from {from} is after job.to {to}")));
        }

        Ok(SyncJob {
            instruments: job
                .instruments
                .iter()
                .map(|i| i.trim())
                .filter(|i| !i.is_empty())
                .map(Instrument::from)
                .collect(),
            granularities: job.granularities.clone(),
            from,
            to,
            max_parallel_pairs: job.max_parallel_pairs,
        })
    }
}
