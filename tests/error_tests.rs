//! Tests for error classification and the auth/sync error boundary.

use ecg_sync::auth::AuthError;
use ecg_sync::error::{ErrorCategory, RecoverySuggestion, SyncError};

#[test]
fn categories_route_recovery() {
    let cases = [
        (SyncError::Network("refused".into()), ErrorCategory::Network),
        (SyncError::Timeout(30_000), ErrorCategory::Network),
        (SyncError::service(404, None), ErrorCategory::Service),
        (SyncError::AuthExpired, ErrorCategory::Authentication),
        (SyncError::Cache("locked".into()), ErrorCategory::Cache),
        (SyncError::Configuration("bad".into()), ErrorCategory::Configuration),
    ];
    for (error, category) in cases {
        assert_eq!(error.category(), category, "{error}");
    }
}

#[test]
fn network_errors_suggest_retry_when_online() {
    assert_eq!(
        SyncError::Network("dns".into()).recovery_suggestion(),
        RecoverySuggestion::RetryWhenOnline
    );
    assert_eq!(
        SyncError::AuthExpired.recovery_suggestion(),
        RecoverySuggestion::SignInAgain
    );
}

#[test]
fn session_ending_auth_errors_become_auth_expired() {
    for error in [
        AuthError::NotLoggedIn,
        AuthError::MissingRefreshToken,
        AuthError::ExpiredOrInvalidGrant,
    ] {
        assert!(error.ends_session());
        assert_eq!(SyncError::from(error), SyncError::AuthExpired);
    }
}

#[test]
fn rejected_auth_error_keeps_status_and_message() {
    let error = AuthError::Rejected {
        status: 500,
        message: Some("refresh backend down".into()),
    };
    assert!(!error.ends_session());
    assert_eq!(
        SyncError::from(error),
        SyncError::service(500, Some("refresh backend down".into()))
    );
}

#[test]
fn service_error_status_is_exposed() {
    let error = SyncError::service(409, Some("Device already claimed".into()));
    assert_eq!(error.status(), Some(409));
    assert!(!error.is_network());
    assert_eq!(SyncError::AuthExpired.status(), None);
}
