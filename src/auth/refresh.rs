//! Single-flight renewal of the access token after an authorization failure.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::Mutex;

use super::error::AuthError;
use super::session::SessionManager;
use crate::http::service_message;
use crate::util::timeout::with_timeout;

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(alias = "accessToken")]
    access_token: String,
    #[serde(default, alias = "refreshToken")]
    refresh_token: Option<String>,
}

/// Renews the access token when the service rejects it.
///
/// One lock is shared by every request made with this credential. The first
/// caller through performs the refresh; callers queued behind it find the
/// token already replaced and reuse it.
pub struct RefreshCoordinator {
    session: Arc<SessionManager>,
    // Plain client: a 401 here must not recurse.
    client: reqwest::Client,
    refresh_url: String,
    timeout: Duration,
    lock: Mutex<()>,
}

impl RefreshCoordinator {
    pub fn new(
        session: Arc<SessionManager>,
        client: reqwest::Client,
        refresh_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            session,
            client,
            refresh_url: refresh_url.into(),
            timeout,
            lock: Mutex::new(()),
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Produce a token to retry with after `stale` was rejected.
    ///
    /// Any failure has already torn the session down and broadcast the expiry
    /// by the time it is returned; callers should fail their request without
    /// retrying.
    pub async fn recover(&self, stale: Option<&str>) -> Result<String, AuthError> {
        if self.refresh_token()?.is_none() {
            self.session.expire();
            return Err(AuthError::MissingRefreshToken);
        }

        let _guard = self.lock.lock().await;

        match self.session.current_access_token() {
            Some(current) if Some(current.as_str()) != stale => {
                tracing::debug!("access token already renewed by a concurrent request");
                return Ok(current);
            }
            Some(_) => {}
            None => {
                self.session.expire();
                return Err(AuthError::NotLoggedIn);
            }
        }

        // Re-read under the lock: a rotation may have replaced it.
        let Some(refresh_token) = self.refresh_token()? else {
            self.session.expire();
            return Err(AuthError::MissingRefreshToken);
        };

        self.session.begin_refresh();
        tracing::info!("refreshing access token");
        match with_timeout(self.timeout, self.request_refresh(&refresh_token)).await {
            Ok(response) => match self.persist(&response, &refresh_token).await {
                Ok(()) => {
                    tracing::info!("access token refreshed");
                    Ok(response.access_token)
                }
                Err(err) => {
                    tracing::error!(error = %err, "refreshed token could not be stored");
                    self.session.expire();
                    Err(err)
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, "token refresh failed");
                self.session.expire();
                Err(err)
            }
        }
    }

    /// Store the renewed token, and the refresh token if it was rotated.
    async fn persist(&self, response: &RefreshResponse, previous: &str) -> Result<(), AuthError> {
        let session = self.session.clone();
        let access_token = response.access_token.clone();
        let rotated = response
            .refresh_token
            .clone()
            .filter(|rotated| rotated != previous);
        tokio::task::spawn_blocking(move || -> Result<(), AuthError> {
            session.save_access_token(&access_token)?;
            if let Some(rotated) = rotated {
                session.save_refresh_token(&rotated)?;
            }
            Ok(())
        })
        .await
        .map_err(|err| AuthError::Io(format!("credential write task failed: {err}")))?
    }

    async fn request_refresh(&self, refresh_token: &str) -> Result<RefreshResponse, AuthError> {
        let response = self
            .client
            .post(&self.refresh_url)
            .bearer_auth(refresh_token)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            return serde_json::from_str(&body)
                .map_err(|err| AuthError::InvalidResponse(err.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            400 | 401 | 403 => Err(AuthError::ExpiredOrInvalidGrant),
            code => Err(AuthError::Rejected {
                status: code,
                message: service_message(&body),
            }),
        }
    }

    fn refresh_token(&self) -> Result<Option<String>, AuthError> {
        match self.session.refresh_token() {
            Ok(token) => Ok(token),
            Err(err) => {
                tracing::error!(error = %err, "could not read refresh token");
                self.session.expire();
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refresh_url", &self.refresh_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}
