use thiserror::Error;

use crate::error::SyncError;

/// Errors raised by the session layer: login, storage and token refresh.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    #[error("Not logged in")]
    NotLoggedIn,
    #[error("No refresh token stored")]
    MissingRefreshToken,
    #[error("Expired or invalid grant")]
    ExpiredOrInvalidGrant,
    #[error("Rejected by service (status {status}): {}", .message.as_deref().unwrap_or("no message"))]
    Rejected { status: u16, message: Option<String> },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AuthError {
    /// True when the only way forward is a new login.
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            Self::NotLoggedIn | Self::MissingRefreshToken | Self::ExpiredOrInvalidGrant
        )
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for AuthError {
    fn from(error: toml::de::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<toml::ser::Error> for AuthError {
    fn from(error: toml::ser::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<AuthError> for SyncError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::NotLoggedIn
            | AuthError::MissingRefreshToken
            | AuthError::ExpiredOrInvalidGrant => SyncError::AuthExpired,
            AuthError::Rejected { status, message } => SyncError::Service { status, message },
            AuthError::Network(msg) => SyncError::Network(msg),
            AuthError::InvalidResponse(msg) | AuthError::Serialization(msg) => {
                SyncError::Serialization(msg)
            }
            AuthError::Io(msg) => SyncError::Io(msg),
        }
    }
}

impl From<SyncError> for AuthError {
    fn from(error: SyncError) -> Self {
        match error {
            SyncError::Service { status, message } => Self::Rejected { status, message },
            SyncError::AuthExpired => Self::ExpiredOrInvalidGrant,
            SyncError::Io(msg) => Self::Io(msg),
            SyncError::Serialization(msg) => Self::Serialization(msg),
            other if other.is_network() => Self::Network(other.to_string()),
            other => Self::InvalidResponse(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ending_errors_become_auth_expired() {
        for err in [
            AuthError::NotLoggedIn,
            AuthError::MissingRefreshToken,
            AuthError::ExpiredOrInvalidGrant,
        ] {
            assert!(err.ends_session());
            assert_eq!(SyncError::from(err), SyncError::AuthExpired);
        }
    }

    #[test]
    fn rejection_keeps_status_and_message() {
        let err = AuthError::Rejected {
            status: 400,
            message: Some("Invalid credentials".into()),
        };
        assert!(!err.ends_session());
        assert_eq!(
            SyncError::from(err),
            SyncError::service(400, Some("Invalid credentials".into()))
        );
    }
}
