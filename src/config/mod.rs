//! Client configuration (code > env > defaults).

use std::path::PathBuf;
use std::time::Duration;

use bon::Builder;

use crate::error::{Result, SyncError};
use crate::paging::PagingConfig;

pub const ENV_BASE_URL: &str = "ECG_SYNC_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "ECG_SYNC_TIMEOUT_SECS";
pub const ENV_DATA_DIR: &str = "ECG_SYNC_DATA_DIR";
pub const ENV_PAGE_SIZE: &str = "ECG_SYNC_PAGE_SIZE";
pub const ENV_PREFETCH: &str = "ECG_SYNC_PREFETCH";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for one data-core instance.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use ecg_sync::config::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("https://api.example.com/")
///     .request_timeout(Duration::from_secs(5))
///     .data_dir("/tmp/ecg-sync".into())
///     .build();
/// assert_eq!(config.url("/auth/login"), "https://api.example.com/auth/login");
/// ```
#[derive(Debug, Clone, Builder)]
pub struct ClientConfig {
    /// Root of the remote service; a trailing slash is ignored.
    #[builder(into)]
    pub base_url: String,
    /// Upper bound for every network call, refresh included.
    #[builder(default = DEFAULT_TIMEOUT)]
    pub request_timeout: Duration,
    #[builder(default = default_data_dir())]
    pub data_dir: PathBuf,
    #[builder(default)]
    pub paging: PagingConfig,
}

impl ClientConfig {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup(ENV_BASE_URL)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| SyncError::Configuration(format!("{ENV_BASE_URL} is not set")))?;

        let request_timeout = match lookup(ENV_TIMEOUT_SECS) {
            Some(raw) => Duration::from_secs(parse_number(ENV_TIMEOUT_SECS, &raw)?),
            None => DEFAULT_TIMEOUT,
        };
        let data_dir = lookup(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let mut paging = PagingConfig::default();
        if let Some(raw) = lookup(ENV_PAGE_SIZE) {
            paging.page_size = parse_number(ENV_PAGE_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_PREFETCH) {
            paging.prefetch_distance = parse_number(ENV_PREFETCH, &raw)?;
        }

        let config = Self {
            base_url: base_url.trim().to_string(),
            request_timeout,
            data_dir,
            paging,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(SyncError::Configuration(format!(
                "base url must be http(s): {}",
                self.base_url
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(SyncError::Configuration(
                "request timeout must be positive".into(),
            ));
        }
        if self.paging.page_size == 0 {
            return Err(SyncError::Configuration("page size must be positive".into()));
        }
        Ok(())
    }

    /// Absolute URL for a service path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn credential_path(&self) -> PathBuf {
        self.data_dir.join("session.toml")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join("cache.sqlite3")
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| SyncError::Configuration(format!("{key} is not a valid number: {raw}")))
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "ecg-sync", "ecg-sync")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".ecg-sync"))
}
