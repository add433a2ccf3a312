use serde::{Deserialize, Serialize};

/// The signed-in session's credential.
///
/// Exactly one exists per session; its absence means "signed out".
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub subject_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub display_name: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("subject_id", &self.subject_id)
            .field("access_token", &"..")
            .field("refresh_token", &"..")
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Keys under which credential fields are persisted.
pub mod keys {
    pub const ACCESS_TOKEN: &str = "access_token";
    pub const REFRESH_TOKEN: &str = "refresh_token";
    pub const SUBJECT_ID: &str = "subject_id";
    pub const DISPLAY_NAME: &str = "display_name";
}
