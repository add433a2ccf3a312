//! Session credential, its storage, and bearer-token renewal.

pub mod authority;
pub mod credential;
pub mod error;
pub mod refresh;
pub mod service;
pub mod session;
pub mod store;

pub use authority::TokenAuthority;
pub use credential::Credential;
pub use error::AuthError;
pub use refresh::RefreshCoordinator;
pub use service::AuthService;
pub use session::{SessionEvent, SessionManager, SessionState};
pub use store::{CredentialStore, FileCredentialStore};
