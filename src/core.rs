//! The wired component graph, constructed once and handed to consumers.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::auth::{
    AuthService, CredentialStore, FileCredentialStore, RefreshCoordinator, SessionEvent,
    SessionManager,
};
use crate::cache::CacheStore;
use crate::config::ClientConfig;
use crate::error::{Result, SyncError};
use crate::http::{build_client, ApiClient};
use crate::paging::Pager;
use crate::remote::{AccountApi, HttpPageSource, RemotePageSource};
use crate::sync::SyncMediator;
use crate::types::HistoryQuery;

/// One credential store, one cache, and everything built on them.
///
/// # Example
/// ```no_run
/// use ecg_sync::{ClientConfig, DataCore, HistoryQuery};
///
/// # async fn run() -> ecg_sync::error::Result<()> {
/// let core = DataCore::open(ClientConfig::from_env()?)?;
/// let credential = core.auth().login("ana@example.com", "secret").await?;
/// let pager = core.history_pager(HistoryQuery::new(credential.subject_id));
/// let first = pager.get(0).await?;
/// # Ok(())
/// # }
/// ```
pub struct DataCore {
    config: ClientConfig,
    session: Arc<SessionManager>,
    cache: Arc<CacheStore>,
    api: ApiClient,
    mediator: Arc<SyncMediator>,
    auth: AuthService,
    account: AccountApi,
}

impl DataCore {
    /// File-backed stores under `config.data_dir`.
    pub fn open(config: ClientConfig) -> Result<Self> {
        let store = Arc::new(FileCredentialStore::new(config.credential_path()));
        let cache = Arc::new(CacheStore::open(&config.cache_path())?);
        Self::with_parts(config, store, cache)
    }

    /// Explicit stores; history pages come from the service.
    pub fn with_parts(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        cache: Arc<CacheStore>,
    ) -> Result<Self> {
        Self::build(config, store, cache, None)
    }

    /// Explicit stores and history source.
    pub fn with_source(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        cache: Arc<CacheStore>,
        source: Arc<dyn RemotePageSource>,
    ) -> Result<Self> {
        Self::build(config, store, cache, Some(source))
    }

    fn build(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        cache: Arc<CacheStore>,
        source: Option<Arc<dyn RemotePageSource>>,
    ) -> Result<Self> {
        config.validate()?;
        let timeout = config.request_timeout;
        // Separate pools: the refresh client must never carry a bearer token.
        let plain = build_client(timeout)?;
        let authed = build_client(timeout)?;

        let session = Arc::new(SessionManager::new(store)?);
        let coordinator = Arc::new(RefreshCoordinator::new(
            session.clone(),
            plain.clone(),
            config.url("auth/refresh"),
            timeout,
        ));
        let api = ApiClient::new(authed, config.base_url.clone(), timeout, coordinator);
        let source: Arc<dyn RemotePageSource> = match source {
            Some(source) => source,
            None => Arc::new(HttpPageSource::new(api.clone())),
        };
        let mediator = Arc::new(SyncMediator::new(cache.clone(), source));
        let auth = AuthService::new(
            plain,
            config.base_url.clone(),
            timeout,
            session.clone(),
            mediator.clone(),
        );
        let account = AccountApi::new(api.clone());
        tracing::debug!(base_url = %config.base_url, "data core ready");

        Ok(Self {
            config,
            session,
            cache,
            api,
            mediator,
            auth,
            account,
        })
    }

    pub fn history_pager(&self, query: HistoryQuery) -> Pager {
        Pager::new(self.mediator.clone(), query, self.config.paging.clone())
    }

    /// Unfiltered history of the signed-in user.
    pub fn my_history(&self) -> Result<Pager> {
        let subject_id = self
            .session
            .subject_id()?
            .ok_or_else(|| SyncError::InvalidState("not signed in".into()))?;
        Ok(self.history_pager(HistoryQuery::new(subject_id)))
    }

    pub fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.subscribe()
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn account(&self) -> &AccountApi {
        &self.account
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn mediator(&self) -> &Arc<SyncMediator> {
        &self.mediator
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl std::fmt::Debug for DataCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataCore")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
