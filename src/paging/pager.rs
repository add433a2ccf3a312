use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use futures::Stream;
use tokio::sync::{watch, OnceCell};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tokio_util::sync::CancellationToken;

use super::{CombinedLoadStates, LoadState, PagingConfig};
use crate::cache::{CacheChange, CacheStore};
use crate::error::Result;
use crate::sync::{LoadType, MediatorResult, SyncMediator};
use crate::types::{HistoryQuery, Record};

type AppendFuture = Shared<BoxFuture<'static, MediatorResult>>;

struct AppendSlot {
    in_flight: Option<AppendFuture>,
    cancel: CancellationToken,
    /// Bumped when a refresh invalidates outstanding appends.
    generation: u64,
    end_reached: bool,
}

struct PagerInner {
    query: HistoryQuery,
    scope_key: String,
    mediator: Arc<SyncMediator>,
    config: PagingConfig,
    states: watch::Sender<CombinedLoadStates>,
    initialized: OnceCell<()>,
    append: Mutex<AppendSlot>,
}

/// Lazily materialized, newest-first view of one history scope.
///
/// Reads come from the cache. A read within `prefetch_distance` of the
/// loaded edge starts an append in the background; a read past the edge
/// waits for it. Concurrent readers share one in-flight append.
///
/// # Example
/// ```no_run
/// # async fn run(pager: ecg_sync::paging::Pager) -> ecg_sync::error::Result<()> {
/// use futures::StreamExt;
///
/// let mut rows = std::pin::pin!(pager.stream());
/// while let Some(record) = rows.next().await {
///     let record = record?;
///     println!("{} {}", record.timestamp, record.classification);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Pager {
    inner: Arc<PagerInner>,
}

impl Pager {
    pub fn new(mediator: Arc<SyncMediator>, query: HistoryQuery, config: PagingConfig) -> Self {
        let (states, _) = watch::channel(CombinedLoadStates::default());
        Self {
            inner: Arc::new(PagerInner {
                scope_key: query.scope_key(),
                query,
                mediator,
                config,
                states,
                initialized: OnceCell::new(),
                append: Mutex::new(AppendSlot {
                    in_flight: None,
                    cancel: CancellationToken::new(),
                    generation: 0,
                    end_reached: false,
                }),
            }),
        }
    }

    pub fn query(&self) -> &HistoryQuery {
        &self.inner.query
    }

    pub fn scope_key(&self) -> &str {
        &self.inner.scope_key
    }

    pub fn load_states(&self) -> watch::Receiver<CombinedLoadStates> {
        self.inner.states.subscribe()
    }

    pub fn current_load_states(&self) -> CombinedLoadStates {
        self.inner.states.borrow().clone()
    }

    /// Rows currently cached for this scope.
    pub fn len(&self) -> Result<usize> {
        self.cache().record_count(&self.inner.scope_key)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Everything cached for this scope, without loading.
    pub fn snapshot(&self) -> Result<Vec<Record>> {
        let count = self.len()?;
        self.cache().records(&self.inner.scope_key, 0, count)
    }

    /// The record at `index`, loading more pages if needed. `Ok(None)` past
    /// the last remote page.
    pub async fn get(&self, index: usize) -> Result<Option<Record>> {
        Ok(self.window(index, 1).await?.into_iter().next())
    }

    /// Up to `limit` records starting at `offset`.
    pub async fn window(&self, offset: usize, limit: usize) -> Result<Vec<Record>> {
        self.ensure_initialized().await;

        let mut count = self.len()?;
        if count == 0 {
            if let Some(err) = self.inner.states.borrow().refresh.error.clone() {
                return Err(err);
            }
        }

        while offset >= count {
            let Some(append) = self.append_future() else {
                break;
            };
            let result = append.await;
            let loaded = self.len()?;
            match result {
                MediatorResult::Error(err) if offset >= loaded => return Err(err),
                // Offline: serve what is cached; a later read retries.
                MediatorResult::Success { .. } if loaded == count => break,
                _ => {}
            }
            count = loaded;
        }

        let wanted = offset.saturating_add(limit);
        let prefetch = self.inner.config.prefetch_distance as usize;
        if wanted.saturating_add(prefetch) > count {
            if let Some(append) = self.append_future() {
                tokio::spawn(append);
            }
        }

        self.cache().records(&self.inner.scope_key, offset, limit)
    }

    /// Ordered stream over the whole scope; restartable by calling again.
    pub fn stream(&self) -> impl Stream<Item = Result<Record>> + Send + 'static {
        let pager = self.clone();
        let chunk = pager.inner.config.page_size.max(1) as usize;
        async_stream::stream! {
            let mut offset = 0;
            loop {
                match pager.window(offset, chunk).await {
                    Ok(rows) if rows.is_empty() => break,
                    Ok(rows) => {
                        offset += rows.len();
                        for row in rows {
                            yield Ok(row);
                        }
                    }
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        }
    }

    /// Cache invalidations for this scope (including full clears).
    pub fn invalidations(&self) -> impl Stream<Item = ()> + Send + 'static {
        let scope_key = self.inner.scope_key.clone();
        BroadcastStream::new(self.cache().subscribe()).filter_map(move |change| match change {
            Ok(CacheChange::Scope(scope)) if scope == scope_key => Some(()),
            Ok(CacheChange::Cleared) => Some(()),
            Ok(CacheChange::Scope(_)) => None,
            // Lagged: something changed, re-read to be safe.
            Err(_) => Some(()),
        })
    }

    /// Replace the scope with a fresh first page, cancelling any append in
    /// flight for it.
    pub async fn refresh(&self) -> MediatorResult {
        {
            let mut slot = self.slot();
            slot.cancel.cancel();
            slot.cancel = CancellationToken::new();
            slot.in_flight = None;
            slot.generation += 1;
            slot.end_reached = false;
        }
        self.inner
            .states
            .send_modify(|states| states.append = LoadState::default());
        let result = self.run_refresh().await;
        let _ = self.inner.initialized.set(());
        result
    }

    async fn ensure_initialized(&self) {
        if !self.inner.config.initial_refresh {
            return;
        }
        self.inner
            .initialized
            .get_or_init(|| async {
                self.run_refresh().await;
            })
            .await;
    }

    async fn run_refresh(&self) -> MediatorResult {
        self.inner
            .states
            .send_modify(|states| states.refresh = LoadState::loading());
        let result = self
            .inner
            .mediator
            .load(LoadType::Refresh, &self.inner.query)
            .await;
        let state = match &result {
            MediatorResult::Success {
                end_of_pagination_reached,
            } => {
                self.slot().end_reached = *end_of_pagination_reached;
                LoadState::idle(*end_of_pagination_reached)
            }
            MediatorResult::Error(err) => {
                tracing::warn!(scope_key = %self.inner.scope_key, error = %err, "refresh failed");
                LoadState::failed(err.clone())
            }
            MediatorResult::Superseded => LoadState::idle(false),
        };
        self.inner.states.send_modify(|states| states.refresh = state);
        result
    }

    fn append_future(&self) -> Option<AppendFuture> {
        let mut slot = self.slot();
        if slot.end_reached {
            return None;
        }
        if let Some(in_flight) = &slot.in_flight {
            return Some(in_flight.clone());
        }

        let pager = self.clone();
        let token = slot.cancel.clone();
        let generation = slot.generation;
        let future = async move {
            if !token.is_cancelled() {
                pager
                    .inner
                    .states
                    .send_modify(|states| states.append = LoadState::loading());
            }
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => MediatorResult::Superseded,
                result = pager.inner.mediator.load(LoadType::Append, &pager.inner.query) => result,
            };
            pager.finish_append(generation, &result);
            result
        }
        .boxed()
        .shared();
        slot.in_flight = Some(future.clone());
        Some(future)
    }

    fn finish_append(&self, generation: u64, result: &MediatorResult) {
        // An offline append also reports the end; only the cursor knows
        // whether pages remain.
        let end = match result {
            MediatorResult::Success {
                end_of_pagination_reached: true,
            } => self.cursor_exhausted(),
            _ => false,
        };
        {
            let mut slot = self.slot();
            if slot.generation != generation {
                return;
            }
            slot.in_flight = None;
            if let MediatorResult::Success { .. } = result {
                slot.end_reached = end;
            }
        }
        let state = match result {
            MediatorResult::Success { .. } => LoadState::idle(end),
            MediatorResult::Error(err) => LoadState::failed(err.clone()),
            MediatorResult::Superseded => LoadState::default(),
        };
        self.inner.states.send_modify(|states| states.append = state);
    }

    fn cursor_exhausted(&self) -> bool {
        match self.cache().cursor(&self.inner.scope_key) {
            Ok(cursor) => cursor.map_or(true, |cursor| cursor.end_reached()),
            Err(err) => {
                tracing::warn!(scope_key = %self.inner.scope_key, error = %err, "cursor unreadable");
                true
            }
        }
    }

    fn slot(&self) -> MutexGuard<'_, AppendSlot> {
        // AppendSlot holds no invariants a panic could break halfway.
        self.inner
            .append
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cache(&self) -> &Arc<CacheStore> {
        self.inner.mediator.cache()
    }
}

impl std::fmt::Debug for Pager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pager")
            .field("scope_key", &self.inner.scope_key)
            .field("config", &self.inner.config)
            .finish()
    }
}
