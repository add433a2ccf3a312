//! Tests for environment-driven configuration.

use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use ecg_sync::config::{
    ClientConfig, ENV_BASE_URL, ENV_DATA_DIR, ENV_PAGE_SIZE, ENV_PREFETCH, ENV_TIMEOUT_SECS,
};
use ecg_sync::error::SyncError;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 5] = [
    ENV_BASE_URL,
    ENV_TIMEOUT_SECS,
    ENV_DATA_DIR,
    ENV_PAGE_SIZE,
    ENV_PREFETCH,
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture() -> Self {
        let saved = CONFIG_ENV_VARS
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        for key in CONFIG_ENV_VARS {
            std::env::remove_var(key);
        }
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[test]
fn from_env_reads_every_variable() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture();
    std::env::set_var(ENV_BASE_URL, " https://ecg.example.com/api/ ");
    std::env::set_var(ENV_TIMEOUT_SECS, "12");
    std::env::set_var(ENV_DATA_DIR, "/tmp/ecg-sync-test");
    std::env::set_var(ENV_PAGE_SIZE, "50");
    std::env::set_var(ENV_PREFETCH, "10");

    let config = ClientConfig::from_env().unwrap();

    assert_eq!(config.base_url, "https://ecg.example.com/api/");
    assert_eq!(config.request_timeout, Duration::from_secs(12));
    assert_eq!(config.data_dir, PathBuf::from("/tmp/ecg-sync-test"));
    assert_eq!(config.paging.page_size, 50);
    assert_eq!(config.paging.prefetch_distance, 10);
    assert_eq!(
        config.url("/history"),
        "https://ecg.example.com/api/history"
    );
    assert_eq!(
        config.cache_path(),
        PathBuf::from("/tmp/ecg-sync-test/cache.sqlite3")
    );
}

#[test]
fn from_env_requires_base_url() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture();

    let err = ClientConfig::from_env().unwrap_err();
    assert!(matches!(err, SyncError::Configuration(ref msg) if msg.contains(ENV_BASE_URL)));
}

#[test]
fn from_env_defaults_optional_values() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture();
    std::env::set_var(ENV_BASE_URL, "http://localhost:3000");

    let config = ClientConfig::from_env().unwrap();

    assert_eq!(config.request_timeout, Duration::from_secs(30));
    assert_eq!(config.paging.page_size, 20);
    assert_eq!(config.paging.prefetch_distance, 5);
    assert!(config.paging.initial_refresh);
}

#[test]
fn from_env_rejects_malformed_numbers() {
    let _lock = env_lock_guard();
    let _guard = EnvGuard::capture();
    std::env::set_var(ENV_BASE_URL, "http://localhost:3000");
    std::env::set_var(ENV_TIMEOUT_SECS, "soon");

    let err = ClientConfig::from_env().unwrap_err();
    assert!(matches!(err, SyncError::Configuration(ref msg) if msg.contains(ENV_TIMEOUT_SECS)));
}

#[test]
fn zero_page_size_is_rejected() {
    let lookup = |key: &str| match key {
        ENV_BASE_URL => Some("http://localhost:3000".to_string()),
        ENV_PAGE_SIZE => Some("0".to_string()),
        _ => None,
    };

    assert!(matches!(
        ClientConfig::from_lookup(lookup),
        Err(SyncError::Configuration(_))
    ));
}

#[test]
fn non_http_base_url_is_rejected() {
    let config = ClientConfig::builder().base_url("ftp://ecg.example.com").build();
    assert!(config.validate().is_err());
}
