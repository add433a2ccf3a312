//! Session lifecycle: the credential, its in-memory token mirror and the
//! observable session state.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use super::authority::TokenAuthority;
use super::credential::{keys, Credential};
use super::error::AuthError;
use super::store::CredentialStore;

/// Derived session state; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    SignedOut,
    Active,
    Refreshing,
    Expired,
}

/// Broadcast notifications for collaborators outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionEvent {
    /// The session could not be renewed and was torn down. Sign in again.
    Expired,
}

const EVENT_CAPACITY: usize = 16;

/// Owns the credential store and keeps the [`TokenAuthority`] in step with it.
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    authority: Arc<TokenAuthority>,
    state: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    /// Load any persisted credential and mirror its access token in memory.
    pub fn new(store: Arc<dyn CredentialStore>) -> Result<Self, AuthError> {
        let token = store.load_access_token()?;
        let initial = if token.is_some() {
            SessionState::Active
        } else {
            SessionState::SignedOut
        };
        let (state, _) = watch::channel(initial);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            store,
            authority: Arc::new(TokenAuthority::new(token)),
            state,
            events,
        })
    }

    pub fn authority(&self) -> Arc<TokenAuthority> {
        self.authority.clone()
    }

    pub fn current_access_token(&self) -> Option<String> {
        self.authority.current()
    }

    pub fn credential(&self) -> Result<Option<Credential>, AuthError> {
        self.store.load()
    }

    pub fn refresh_token(&self) -> Result<Option<String>, AuthError> {
        self.store.load_refresh_token()
    }

    pub fn subject_id(&self) -> Result<Option<String>, AuthError> {
        self.store.get(keys::SUBJECT_ID)
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Persist a freshly issued credential and mark the session active.
    pub fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        self.store.save(credential)?;
        self.authority.set(Some(credential.access_token.clone()));
        self.state.send_replace(SessionState::Active);
        Ok(())
    }

    /// Persist a renewed access token; the refresh token is left as is.
    pub fn save_access_token(&self, token: &str) -> Result<(), AuthError> {
        self.store.save_access_token(token)?;
        self.authority.set(Some(token.to_string()));
        self.state.send_replace(SessionState::Active);
        Ok(())
    }

    /// Persist a rotated refresh token.
    pub fn save_refresh_token(&self, token: &str) -> Result<(), AuthError> {
        self.store.put(&[(keys::REFRESH_TOKEN, token)])
    }

    pub fn begin_refresh(&self) {
        self.state.send_if_modified(|state| {
            if *state == SessionState::Active {
                *state = SessionState::Refreshing;
                true
            } else {
                false
            }
        });
    }

    /// Sign out on request. Not an expiry: no event is broadcast.
    pub fn clear(&self) -> Result<(), AuthError> {
        self.store.clear()?;
        self.authority.set(None);
        self.state.send_replace(SessionState::SignedOut);
        Ok(())
    }

    /// Tear the session down after an unrecoverable authorization failure.
    ///
    /// Returns `true` only for the call that moved the session into
    /// [`SessionState::Expired`]; that call alone broadcasts the event.
    pub fn expire(&self) -> bool {
        self.authority.set(None);
        if let Err(err) = self.store.clear() {
            tracing::error!(error = %err, "failed to clear credential store on session expiry");
        }
        let transitioned = self.state.send_if_modified(|state| {
            if *state == SessionState::Expired {
                false
            } else {
                *state = SessionState::Expired;
                true
            }
        });
        if transitioned {
            tracing::warn!("session expired; sign-in required");
            let _ = self.events.send(SessionEvent::Expired);
        }
        transitioned
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state())
            .field("has_token", &!self.authority.is_empty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::FileCredentialStore;
    use tempfile::TempDir;

    fn manager() -> (TempDir, SessionManager) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(FileCredentialStore::new(dir.path().join("session.toml")));
        (dir, SessionManager::new(store).unwrap())
    }

    fn credential() -> Credential {
        Credential {
            subject_id: "7".into(),
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            display_name: "Ana".into(),
        }
    }

    #[test]
    fn save_updates_authority_and_state() {
        let (_dir, session) = manager();
        assert_eq!(session.state(), SessionState::SignedOut);
        session.save(&credential()).unwrap();
        assert_eq!(session.current_access_token().as_deref(), Some("access"));
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn persisted_credential_starts_active() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.toml");
        FileCredentialStore::new(&path).save(&credential()).unwrap();

        let session = SessionManager::new(Arc::new(FileCredentialStore::new(&path))).unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.current_access_token().as_deref(), Some("access"));
    }

    #[test]
    fn expire_broadcasts_once_per_transition() {
        let (_dir, session) = manager();
        session.save(&credential()).unwrap();
        let mut events = session.subscribe();

        assert!(session.expire());
        assert!(!session.expire());

        assert_eq!(events.try_recv().unwrap(), SessionEvent::Expired);
        assert!(events.try_recv().is_err());
        assert_eq!(session.state(), SessionState::Expired);
        assert!(session.credential().unwrap().is_none());
        assert!(session.current_access_token().is_none());
    }

    #[test]
    fn login_after_expiry_reactivates() {
        let (_dir, session) = manager();
        session.save(&credential()).unwrap();
        session.expire();
        session.save(&credential()).unwrap();
        assert_eq!(session.state(), SessionState::Active);
    }

    #[test]
    fn clear_signs_out_without_event() {
        let (_dir, session) = manager();
        session.save(&credential()).unwrap();
        let mut events = session.subscribe();
        session.clear().unwrap();
        assert_eq!(session.state(), SessionState::SignedOut);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn begin_refresh_only_from_active() {
        let (_dir, session) = manager();
        session.begin_refresh();
        assert_eq!(session.state(), SessionState::SignedOut);
        session.save(&credential()).unwrap();
        session.begin_refresh();
        assert_eq!(session.state(), SessionState::Refreshing);
        session.save_access_token("fresh").unwrap();
        assert_eq!(session.state(), SessionState::Active);
    }

    /// Accepts writes but cannot delete, like a file on a read-only mount.
    struct UndeletableStore(std::sync::Mutex<std::collections::BTreeMap<String, String>>);

    impl CredentialStore for UndeletableStore {
        fn get(&self, key: &str) -> Result<Option<String>, AuthError> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        fn put(&self, entries: &[(&str, &str)]) -> Result<(), AuthError> {
            let mut map = self.0.lock().unwrap();
            for (key, value) in entries {
                map.insert((*key).to_string(), (*value).to_string());
            }
            Ok(())
        }

        fn clear(&self) -> Result<(), AuthError> {
            Err(AuthError::Io("read-only file system".into()))
        }
    }

    #[test]
    fn failed_clear_keeps_session_in_step_with_store() {
        let store = Arc::new(UndeletableStore(Default::default()));
        let session = SessionManager::new(store.clone()).unwrap();
        session.save(&credential()).unwrap();

        assert!(session.clear().is_err());

        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.current_access_token().as_deref(), Some("access"));
        assert!(session.credential().unwrap().is_some());
    }
}
