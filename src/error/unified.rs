//! Error classification and suggested recovery for the presentation layer.

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// No connectivity or the request timed out.
    Network,
    /// The remote service answered with a non-2xx status.
    Service,
    /// The session is gone and the user must sign in again.
    Authentication,
    /// The local durable store failed.
    Cache,
    Configuration,
    Serialization,
    Unknown,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    /// Keep showing cached data and retry once connectivity returns.
    RetryWhenOnline,
    /// Redirect to the login screen.
    SignInAgain,
    /// Show the service's message; retrying the same request will not help.
    ShowServiceMessage,
    /// Retry later; the remote service is failing.
    RetryLater,
    CheckConfiguration,
    ContactSupport,
}
