#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use serde_json::{json, Value};

use ecg_sync::auth::{AuthError, Credential, CredentialStore};
use ecg_sync::cache::CacheStore;
use ecg_sync::config::ClientConfig;
use ecg_sync::error::{Result, SyncError};
use ecg_sync::remote::{PageResult, RemotePageSource};
use ecg_sync::types::{HistoryQuery, Record};
use ecg_sync::DataCore;

#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<BTreeMap<String, String>>,
    read_only: AtomicBool,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: &Credential) -> Self {
        let store = Self::new();
        store.save(credential).expect("seed credential");
        store
    }

    pub fn seed(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .expect("store lock poisoned")
            .insert(key.to_string(), value.to_string());
    }

    /// Every later `put` and `clear` fails as if the disk were full.
    pub fn fail_writes(&self) {
        self.read_only.store(true, Ordering::SeqCst);
    }

    fn check_writable(&self) -> std::result::Result<(), AuthError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(AuthError::Io("disk full".to_string()));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().expect("store lock poisoned").is_empty()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> std::result::Result<Option<String>, AuthError> {
        Ok(self
            .entries
            .lock()
            .expect("store lock poisoned")
            .get(key)
            .cloned())
    }

    fn put(&self, entries: &[(&str, &str)]) -> std::result::Result<(), AuthError> {
        self.check_writable()?;
        let mut map = self.entries.lock().expect("store lock poisoned");
        for (key, value) in entries {
            map.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn clear(&self) -> std::result::Result<(), AuthError> {
        self.check_writable()?;
        self.entries.lock().expect("store lock poisoned").clear();
        Ok(())
    }
}

pub fn credential(access_token: &str, refresh_token: &str) -> Credential {
    Credential {
        subject_id: "user7".to_string(),
        access_token: access_token.to_string(),
        refresh_token: refresh_token.to_string(),
        display_name: "Ana".to_string(),
    }
}

/// Newest-first fixture rows: row `n` of the whole history has id `1000 - n`
/// and is one minute older than row `n - 1`.
pub fn history_rows(start: usize, count: usize) -> Vec<Record> {
    (start..start + count).map(history_row).collect()
}

pub fn history_row(n: usize) -> Record {
    let seconds = 1_714_550_400 - (n as i64) * 60;
    Record {
        id: 1000 - n as i64,
        timestamp: DateTime::from_timestamp(seconds, 0)
            .expect("valid timestamp")
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        classification: if n % 7 == 0 { "AFib" } else { "Normal" }.to_string(),
        measurement: Some(60.0 + (n % 40) as f64),
    }
}

pub fn page(records: Vec<Record>, current_page: u32, total_pages: u32, total_items: u64) -> PageResult {
    PageResult {
        records,
        current_page,
        total_pages,
        total_items,
    }
}

/// Wire body for `GET /history`.
pub fn history_body(records: &[Record], current_page: u32, total_pages: u32, total_items: u64) -> Value {
    json!({
        "data": records
            .iter()
            .map(|r| json!({
                "id": r.id,
                "timestamp": r.timestamp,
                "classification": r.classification,
                "heartRate": r.measurement,
            }))
            .collect::<Vec<_>>(),
        "pagination": {
            "currentPage": current_page,
            "totalPages": total_pages,
            "totalItems": total_items,
        }
    })
}

/// The 55-row, three-page history of "user7".
pub fn user7_pages() -> [PageResult; 3] {
    [
        page(history_rows(0, 20), 1, 3, 55),
        page(history_rows(20, 20), 2, 3, 55),
        page(history_rows(40, 15), 3, 3, 55),
    ]
}

/// Page source answering from a script and recording every request.
#[derive(Default)]
pub struct ScriptedSource {
    pages: Mutex<HashMap<u32, Result<PageResult>>>,
    delays: Mutex<HashMap<u32, Duration>>,
    calls: Mutex<Vec<u32>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(pages: impl IntoIterator<Item = PageResult>) -> Self {
        let source = Self::new();
        for (index, page) in pages.into_iter().enumerate() {
            source.set_page(index as u32 + 1, Ok(page));
        }
        source
    }

    pub fn set_page(&self, page: u32, result: Result<PageResult>) {
        self.pages.lock().unwrap().insert(page, result);
    }

    pub fn fail_page(&self, page: u32, error: SyncError) {
        self.set_page(page, Err(error));
    }

    pub fn delay_page(&self, page: u32, delay: Duration) {
        self.delays.lock().unwrap().insert(page, delay);
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemotePageSource for ScriptedSource {
    async fn fetch_page(&self, _query: &HistoryQuery, page: u32) -> Result<PageResult> {
        self.calls.lock().unwrap().push(page);
        let delay = self.delays.lock().unwrap().get(&page).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.pages.lock().unwrap().get(&page).cloned();
        scripted.unwrap_or_else(|| Ok(self::page(Vec::new(), page, page, 0)))
    }
}

pub fn offline() -> SyncError {
    SyncError::Network("connection refused".to_string())
}

pub fn test_config(base_url: &str, data_dir: &std::path::Path) -> ClientConfig {
    ClientConfig::builder()
        .base_url(base_url)
        .request_timeout(Duration::from_secs(5))
        .data_dir(data_dir.to_path_buf())
        .build()
}

/// A core talking to `base_url` with an in-memory cache.
pub fn core_with_store(
    base_url: &str,
    dir: &tempfile::TempDir,
    store: Arc<MemoryCredentialStore>,
) -> DataCore {
    let cache = Arc::new(CacheStore::open_in_memory().expect("cache"));
    DataCore::with_parts(test_config(base_url, dir.path()), store, cache).expect("core")
}
