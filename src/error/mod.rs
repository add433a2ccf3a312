//! Error types for the data core.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all data-core operations.
///
/// Cloneable so a failure can be carried inside load-state signals that several
/// observers read.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Service error (status {status}): {}", .message.as_deref().unwrap_or("no message"))]
    Service {
        status: u16,
        message: Option<String>,
    },

    #[error("Session expired")]
    AuthExpired,

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl SyncError {
    /// Create a service error from a status and optional message.
    pub fn service(status: u16, message: Option<String>) -> Self {
        Self::Service { status, message }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network(_) | Self::Timeout(_) => ErrorCategory::Network,
            Self::Service { .. } => ErrorCategory::Service,
            Self::AuthExpired => ErrorCategory::Authentication,
            Self::Cache(_) | Self::Io(_) => ErrorCategory::Cache,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::InvalidState(_) => ErrorCategory::Unknown,
        }
    }

    /// No connectivity or timeout.
    pub fn is_network(&self) -> bool {
        self.category() == ErrorCategory::Network
    }

    /// HTTP status for service errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Service { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self {
            Self::Service { status, .. } if *status >= 500 => RecoverySuggestion::RetryLater,
            Self::Service { status: 401, .. } => RecoverySuggestion::SignInAgain,
            _ => match self.category() {
                ErrorCategory::Network => RecoverySuggestion::RetryWhenOnline,
                ErrorCategory::Service => RecoverySuggestion::ShowServiceMessage,
                ErrorCategory::Authentication => RecoverySuggestion::SignInAgain,
                ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
                _ => RecoverySuggestion::ContactSupport,
            },
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Serialization(error.to_string())
        } else if error.is_builder() {
            Self::Configuration(error.to_string())
        } else {
            // Timeouts, refused connections and dropped bodies all mean "offline".
            Self::Network(error.to_string())
        }
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Cache(error.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SyncError>;
