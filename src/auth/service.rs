use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::credential::Credential;
use super::error::AuthError;
use super::session::SessionManager;
use crate::error::{Result, SyncError};
use crate::http::service_message;
use crate::sync::SyncMediator;
use crate::util::timeout::with_timeout;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

/// Login body. Accepts the camelCase and snake_case spellings the service
/// has used.
#[derive(Debug, Default, Deserialize)]
struct LoginResponse {
    #[serde(default, alias = "accessToken")]
    access_token: Option<String>,
    #[serde(default, alias = "refreshToken")]
    refresh_token: Option<String>,
    #[serde(
        default,
        alias = "subjectId",
        alias = "subject_id",
        deserialize_with = "crate::types::de::opt_string_or_number"
    )]
    user_id: Option<String>,
    #[serde(default, alias = "displayName", alias = "display_name")]
    name: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

/// Sign-in, registration and sign-out.
///
/// Talks to the service over a plain client: these calls carry no bearer
/// token and never enter token recovery.
pub struct AuthService {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    session: Arc<SessionManager>,
    mediator: Arc<SyncMediator>,
}

impl AuthService {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        timeout: Duration,
        session: Arc<SessionManager>,
        mediator: Arc<SyncMediator>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout,
            session,
            mediator,
        }
    }

    /// Exchange email and password for a credential, persisting it.
    pub async fn login(&self, email: &str, password: &str) -> Result<Credential> {
        let body = LoginRequest { email, password };
        let response: LoginResponse = self.post("auth/login", &body).await?;
        let credential = credential_from(response)?;
        self.session.save(&credential)?;
        tracing::info!(subject_id = %credential.subject_id, "signed in");
        Ok(credential)
    }

    /// Create an account. Returns the service's confirmation message.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<String> {
        let body = RegisterRequest {
            name,
            email,
            password,
        };
        let response: MessageResponse = self.post("auth/register", &body).await?;
        Ok(response
            .message
            .unwrap_or_else(|| "registered".to_string()))
    }

    /// Sign out: forget the credential and drop every cached row. History
    /// loads still in flight are discarded rather than written back.
    pub async fn logout(&self) -> Result<()> {
        self.session.clear()?;
        self.mediator.clear().await?;
        tracing::info!("signed out");
        Ok(())
    }

    pub fn current(&self) -> Result<Option<Credential>> {
        Ok(self.session.credential()?)
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let url = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let request = self.client.post(url).json(body);
        with_timeout(self.timeout, async {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            if !status.is_success() {
                return Err(SyncError::service(status.as_u16(), service_message(&text)));
            }
            Ok(serde_json::from_str(&text)?)
        })
        .await
    }
}

fn credential_from(response: LoginResponse) -> std::result::Result<Credential, AuthError> {
    if let Some(error) = response.error.filter(|_| response.access_token.is_none()) {
        return Err(AuthError::InvalidResponse(error));
    }
    let missing = |field: &str| AuthError::InvalidResponse(format!("login response missing {field}"));
    Ok(Credential {
        access_token: response.access_token.ok_or_else(|| missing("access token"))?,
        refresh_token: response.refresh_token.ok_or_else(|| missing("refresh token"))?,
        subject_id: response.user_id.ok_or_else(|| missing("user id"))?,
        display_name: response.name.unwrap_or_default(),
    })
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_login_with_numeric_user_id() {
        let response: LoginResponse = serde_json::from_str(
            r#"{"access_token": "a", "refresh_token": "r", "user_id": 7, "role": "patient", "name": "Ana"}"#,
        )
        .unwrap();
        let credential = credential_from(response).unwrap();
        assert_eq!(credential.subject_id, "7");
        assert_eq!(credential.display_name, "Ana");
    }

    #[test]
    fn camel_case_login() {
        let response: LoginResponse = serde_json::from_str(
            r#"{"accessToken": "a", "refreshToken": "r", "subjectId": "user7", "displayName": "Ana"}"#,
        )
        .unwrap();
        let credential = credential_from(response).unwrap();
        assert_eq!(credential.subject_id, "user7");
        assert_eq!(credential.refresh_token, "r");
    }

    #[test]
    fn embedded_error_is_rejected() {
        let response: LoginResponse =
            serde_json::from_str(r#"{"error": "Invalid credentials"}"#).unwrap();
        assert_eq!(
            credential_from(response).unwrap_err(),
            AuthError::InvalidResponse("Invalid credentials".into())
        );
    }

    #[test]
    fn missing_refresh_token_is_rejected() {
        let response: LoginResponse =
            serde_json::from_str(r#"{"access_token": "a", "user_id": 1}"#).unwrap();
        assert!(credential_from(response).is_err());
    }
}
