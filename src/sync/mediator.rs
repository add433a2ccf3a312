use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::cache::{CacheStore, PageCursor};
use crate::error::{Result, SyncError};
use crate::remote::RemotePageSource;
use crate::types::HistoryQuery;

/// Which edge of the loaded data a load extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LoadType {
    /// Replace the scope with a fresh first page.
    Refresh,
    /// Never fetches: pages are only walked forward from page 1.
    Prepend,
    /// Fetch the page after the last cached one.
    Append,
}

/// Outcome of one mediator load.
#[derive(Debug, Clone, PartialEq)]
pub enum MediatorResult {
    Success { end_of_pagination_reached: bool },
    Error(SyncError),
    /// A newer refresh of the same scope started; this result was discarded.
    Superseded,
}

impl MediatorResult {
    fn end_reached() -> Self {
        Self::Success {
            end_of_pagination_reached: true,
        }
    }
}

#[derive(Default)]
struct ScopeSlot {
    /// Bumped by every refresh before it fetches.
    epoch: AtomicU64,
    /// Critical section for cache writes to this scope. Owned guards travel
    /// into the blocking write, so a cancelled load still holds it until the
    /// transaction ends.
    write: Arc<Mutex<()>>,
    /// Appends to one scope run one at a time.
    append: Mutex<()>,
}

/// Decides between cache and network for each load and writes fetched pages
/// into the cache atomically.
///
/// Loads for one scope never interleave their cache writes. Different scopes
/// proceed independently.
pub struct SyncMediator {
    cache: Arc<CacheStore>,
    source: Arc<dyn RemotePageSource>,
    slots: DashMap<String, Arc<ScopeSlot>>,
}

impl SyncMediator {
    pub fn new(cache: Arc<CacheStore>, source: Arc<dyn RemotePageSource>) -> Self {
        Self {
            cache,
            source,
            slots: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub async fn load(&self, load_type: LoadType, query: &HistoryQuery) -> MediatorResult {
        match load_type {
            LoadType::Refresh => self.refresh(query).await,
            LoadType::Prepend => MediatorResult::end_reached(),
            LoadType::Append => self.append(query).await,
        }
    }

    /// Discard every load in flight, then empty the cache.
    ///
    /// A load already past its generation check finishes its write before
    /// the cache is cleared; any other load is superseded.
    pub async fn clear(&self) -> Result<()> {
        let slots: Vec<Arc<ScopeSlot>> = self
            .slots
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for slot in slots {
            let _write = slot.write.lock().await;
            slot.epoch.fetch_add(1, Ordering::SeqCst);
        }
        let cache = self.cache.clone();
        run_blocking(move || cache.clear_all()).await
    }

    /// Current refresh generation of a scope.
    pub fn epoch(&self, scope_key: &str) -> u64 {
        self.slots
            .get(scope_key)
            .map(|slot| slot.epoch.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    fn slot(&self, scope_key: &str) -> Arc<ScopeSlot> {
        self.slots
            .entry(scope_key.to_string())
            .or_default()
            .value()
            .clone()
    }

    async fn refresh(&self, query: &HistoryQuery) -> MediatorResult {
        let scope_key = query.scope_key();
        let slot = self.slot(&scope_key);
        let epoch = slot.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(scope_key = %scope_key, epoch, "refreshing scope");

        let page = match self.source.fetch_page(query, 1).await {
            Ok(page) => page,
            Err(err) => {
                tracing::warn!(scope_key = %scope_key, error = %err, "refresh failed; cache left as is");
                return MediatorResult::Error(err);
            }
        };
        let end = page.end_of_pagination();

        let write = slot.write.clone().lock_owned().await;
        if slot.epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!(scope_key = %scope_key, epoch, "refresh superseded");
            return MediatorResult::Superseded;
        }
        let cursor = PageCursor::after_page(scope_key.as_str(), 1, end);
        let cache = self.cache.clone();
        let records = page.records;
        let written = run_blocking(move || {
            let _write = write;
            cache.replace_scope(&cursor, &records)
        })
        .await;
        if let Err(err) = written {
            tracing::error!(scope_key = %scope_key, error = %err, "cache write failed");
            return MediatorResult::Error(err);
        }
        MediatorResult::Success {
            end_of_pagination_reached: end,
        }
    }

    async fn append(&self, query: &HistoryQuery) -> MediatorResult {
        let scope_key = query.scope_key();
        let slot = self.slot(&scope_key);
        let _serial = slot.append.lock().await;

        // Snapshot the generation and the cursor together.
        let (epoch, cursor) = {
            let _write = slot.write.lock().await;
            let epoch = slot.epoch.load(Ordering::SeqCst);
            match self.cache.cursor(&scope_key) {
                Ok(cursor) => (epoch, cursor),
                Err(err) => return MediatorResult::Error(err),
            }
        };
        let Some(next) = cursor.as_ref().and_then(|cursor| cursor.next_page) else {
            tracing::debug!(scope_key = %scope_key, "no further pages to append");
            return MediatorResult::end_reached();
        };

        let page = match self.source.fetch_page(query, next).await {
            Ok(page) => page,
            Err(err) if err.is_network() => {
                tracing::warn!(
                    scope_key = %scope_key,
                    page = next,
                    error = %err,
                    "append failed offline; keeping cached rows"
                );
                return MediatorResult::end_reached();
            }
            Err(err) => {
                tracing::warn!(scope_key = %scope_key, page = next, error = %err, "append failed");
                return MediatorResult::Error(err);
            }
        };
        let end = page.end_of_pagination();

        let write = slot.write.clone().lock_owned().await;
        let unchanged = slot.epoch.load(Ordering::SeqCst) == epoch
            && matches!(self.cache.cursor(&scope_key), Ok(ref current) if *current == cursor);
        if !unchanged {
            tracing::debug!(scope_key = %scope_key, page = next, "append superseded by refresh");
            return MediatorResult::Superseded;
        }
        let cursor = PageCursor::after_page(scope_key.as_str(), next, end);
        let cache = self.cache.clone();
        let records = page.records;
        let written = run_blocking(move || {
            let _write = write;
            cache.append_page(&cursor, &records)
        })
        .await;
        if let Err(err) = written {
            tracing::error!(scope_key = %scope_key, error = %err, "cache write failed");
            return MediatorResult::Error(err);
        }
        tracing::debug!(scope_key = %scope_key, page = next, end, "page appended");
        MediatorResult::Success {
            end_of_pagination_reached: end,
        }
    }
}

/// Run a cache transaction on the blocking pool.
async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| SyncError::InvalidState(format!("cache task failed: {err}")))?
}

impl std::fmt::Debug for SyncMediator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncMediator")
            .field("scopes", &self.slots.len())
            .finish()
    }
}
