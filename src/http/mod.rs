//! Authenticated HTTP client: bearer injection, 401 recovery, status mapping.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::{RefreshCoordinator, TokenAuthority};
use crate::error::{Result, SyncError};
use crate::util::timeout::with_timeout;

/// Build a plain client with the given per-request timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(10)
        .build()
        .map_err(|err| SyncError::Configuration(format!("failed to build HTTP client: {err}")))
}

/// Attach the bearer credential, if any. Without one the request goes out
/// unauthenticated and the service answers 401.
pub fn authorize(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

/// Extract a human-readable message from an error body.
///
/// Prefers `{"error": ".."}`, then `{"message": ".."}`, then the raw text.
pub fn service_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        for field in ["error", "message"] {
            if let Some(text) = value.get(field).and_then(|v| v.as_str()) {
                return Some(text.to_string());
            }
        }
    }
    Some(trimmed.chars().take(200).collect())
}

/// Map a non-2xx response to [`SyncError::Service`].
pub async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::service(status.as_u16(), service_message(&body)))
}

/// Client for every authenticated call.
///
/// Each request reads the current token from the [`TokenAuthority`]. A 401 is
/// handed to the [`RefreshCoordinator`] once; the request is retried with the
/// token it returns, and a second 401 is final.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    authority: Arc<TokenAuthority>,
    coordinator: Arc<RefreshCoordinator>,
}

impl ApiClient {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        timeout: Duration,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout,
            authority: coordinator.session().authority(),
            coordinator,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Send the request produced by `build`, recovering from one 401.
    ///
    /// `build` may be called twice, so it must not consume state.
    pub async fn execute<F>(&self, build: F) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let token = self.authority.current();
        let response = self.send_once(&build, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        let message = service_message(&response.text().await.unwrap_or_default());
        let fresh = match self.coordinator.recover(token.as_deref()).await {
            Ok(fresh) => fresh,
            Err(err) => {
                tracing::warn!(error = %err, "request failed: session could not be renewed");
                return Err(SyncError::service(401, message));
            }
        };

        let retry = self.send_once(&build, Some(&fresh)).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("request rejected again after token refresh");
        }
        check_status(retry).await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(path);
        let response = self
            .execute(|client| client.get(&url).query(query))
            .await?;
        decode(response).await
    }

    pub async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let response = self
            .execute(|client| client.request(method.clone(), &url).json(body))
            .await?;
        decode(response).await
    }

    async fn send_once<F>(&self, build: &F, token: Option<&str>) -> Result<Response>
    where
        F: Fn(&reqwest::Client) -> RequestBuilder,
    {
        let request = authorize(build(&self.client), token);
        with_timeout(self.timeout, async { Ok(request.send().await?) }).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}
