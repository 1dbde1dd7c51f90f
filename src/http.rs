use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{ApiError, Result};
use crate::session::SessionStore;

pub fn client_with_timeout(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(ApiError::from)
}

#[derive(Debug, serde::Deserialize)]
struct RefreshResponse {
    access: String,
    #[serde(default)]
    refresh: Option<String>,
}

/// Single chokepoint for every call that may require bearer authentication.
///
/// Decorates outgoing requests with the current access token, intercepts a
/// 401 once per request, refreshes through a single-flight latch and retries
/// with the replaced token. A failed refresh clears the session and yields
/// [`ApiError::SessionExpired`]; everything else passes through untouched.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
    refresh_lock: Mutex<()>,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, session: Arc<SessionStore>) -> Result<Self> {
        Ok(Self {
            http: client_with_timeout(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.dispatch(Method::GET, path, None).await?;
        self.read_json(response).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let response = self.dispatch(Method::POST, path, Some(&body)).await?;
        self.read_json(response).await
    }

    /// POST without a payload; the action endpoints (cancel, renew, follow)
    /// take none.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.dispatch(Method::POST, path, None).await?;
        self.read_json(response).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let response = self.dispatch(Method::PUT, path, Some(&body)).await?;
        self.read_json(response).await
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let response = self.dispatch(Method::PATCH, path, Some(&body)).await?;
        self.read_json(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let response = self.dispatch(Method::DELETE, path, None).await?;
        Self::expect_success(response).await
    }

    /// GET where only success matters; the body, if any, is discarded.
    pub async fn get_unit(&self, path: &str) -> Result<()> {
        let response = self.dispatch(Method::GET, path, None).await?;
        Self::expect_success(response).await
    }

    pub async fn post_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        let body = serde_json::to_value(body)?;
        let response = self.dispatch(Method::POST, path, Some(&body)).await?;
        Self::expect_success(response).await
    }

    async fn expect_success(response: reqwest::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::api_error(status, response.text().await.unwrap_or_default()))
        }
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        let token = self.session.access_token();
        let response = self.send(method.clone(), path, body, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }
        if self.session.refresh_token().is_none() {
            // Nothing to refresh with; surface the original rejection.
            return Ok(response);
        }

        tracing::debug!(path, "received 401, refreshing access token");
        let fresh = self.refresh_access_token(token.as_deref()).await?;
        // One retry per request; a second 401 falls through as a plain error.
        self.send(method, path, body, Some(&fresh)).await
    }

    /// Exchanges the refresh token for a new access token.
    ///
    /// Concurrent 401s share one in-flight refresh: the first caller holds
    /// the latch while refreshing, the rest wait on it and reuse the token
    /// it installed instead of firing parallel refresh calls.
    async fn refresh_access_token(&self, stale: Option<&str>) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.session.access_token()
            && stale != Some(current.as_str())
        {
            return Ok(current);
        }

        let Some(refresh) = self.session.refresh_token() else {
            self.session.clear();
            return Err(ApiError::SessionExpired);
        };

        let body = serde_json::json!({ "refresh": refresh });
        let sent = self
            .send(Method::POST, "/token/refresh/", Some(&body), None)
            .await;
        let response = match sent {
            Ok(response) if response.status().is_success() => response,
            _ => {
                tracing::warn!("token refresh rejected, ending session");
                self.session.clear();
                return Err(ApiError::SessionExpired);
            }
        };
        let Ok(refreshed) = response.json::<RefreshResponse>().await else {
            self.session.clear();
            return Err(ApiError::SessionExpired);
        };

        self.session.set_access_token(refreshed.access.clone());
        if let Some(rotated) = refreshed.refresh {
            self.session.set_refresh_token(rotated);
        }
        tracing::debug!("access token refreshed");
        Ok(refreshed.access)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        token: Option<&str>,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(ApiError::from)
    }

    async fn read_json<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            response.json::<T>().await.map_err(ApiError::from)
        } else {
            Err(Self::api_error(
                status,
                response.text().await.unwrap_or_default(),
            ))
        }
    }

    fn api_error(status: StatusCode, body: String) -> ApiError {
        ApiError::Api {
            status: status.as_u16(),
            message: error_message(status, &body),
        }
    }
}

/// Pulls a human-readable message out of an error body: `detail`, `message`
/// or `error` keys first, then the first entry of a field-error array
/// ({"email": ["…"]}), then a generic fallback.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body)
        && let Some(object) = value.as_object()
    {
        for key in ["detail", "message", "error"] {
            if let Some(text) = object.get(key).and_then(Value::as_str) {
                return text.to_string();
            }
        }
        // OpenAI-style nesting: {"error": {"message": "…"}}
        if let Some(text) = object
            .get("error")
            .and_then(Value::as_object)
            .and_then(|inner| inner.get("message"))
            .and_then(Value::as_str)
        {
            return text.to_string();
        }
        for value in object.values() {
            if let Some(first) = value
                .as_array()
                .and_then(|entries| entries.first())
                .and_then(Value::as_str)
            {
                return first.to_string();
            }
        }
    }

    if status.is_server_error() {
        "Le serveur a rencontré une erreur. Veuillez réessayer plus tard.".to_string()
    } else {
        "La requête a échoué.".to_string()
    }
}
