//! Authenticated fetch for the Flora storefront API.
//!
//! `ApiClient::request` performs one logical HTTP request: it resolves the
//! endpoint against the base URL, attaches the stored bearer token, and on a
//! 401 response refreshes the token pair inline and retries exactly once.
//! The retry cap means a backend that keeps answering 401 with a fresh token
//! produces a failed response, never a refresh loop.
//!
//! The token is read from the persistent store rather than from the session
//! store, which keeps this layer independent of the session lifecycle and
//! safe to use before the cold-start restore completes.

use std::sync::Arc;

use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::api::refresh::RefreshGate;
use crate::api::ApiError;
use crate::auth::AuthError;
use crate::config::{self, ClientConfig};
use crate::events::EventBus;
use crate::models::{ApiErrorBody, DataEnvelope, LoginData};
use crate::storage::KeyValueStore;

/// Outcome of an API call. HTTP failures are carried in-band (`ok: false`)
/// so calling code can branch on success without catching errors.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub ok: bool,
    pub status: u16,
    /// Parsed JSON body; `None` for empty or non-JSON bodies
    pub data: Option<Value>,
}

/// Request body variants.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

/// Caller-supplied request parameters. The bearer header is merged in by
/// the client; caller headers are applied first.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

/// API client for the Flora storefront.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    config: ClientConfig,
    storage: Arc<dyn KeyValueStore>,
    events: Arc<EventBus>,
    gate: Arc<RefreshGate>,
}

impl ApiClient {
    /// Create a new API client over the given storage and event bus.
    pub fn new(
        config: ClientConfig,
        storage: Arc<dyn KeyValueStore>,
        events: Arc<EventBus>,
    ) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            http,
            config,
            storage,
            events,
            gate: Arc::new(RefreshGate::new()),
        })
    }

    pub(crate) fn http(&self) -> &Client {
        &self.http
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn storage(&self) -> &Arc<dyn KeyValueStore> {
        &self.storage
    }

    pub(crate) fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub(crate) fn gate(&self) -> &RefreshGate {
        &self.gate
    }

    /// Perform one logical API request with bearer attachment and
    /// single-retry-on-401 semantics.
    pub async fn request(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.resolve_url(endpoint);
        let token = self.stored_token().await;
        let response = self.build(&url, &options, token.as_deref()).send().await?;

        // The token-issue endpoint's 401 means bad credentials, not an
        // expired session. Return it untouched so a failed login can never
        // start a refresh cycle.
        if endpoint.contains("/auth/token") {
            return Ok(Self::into_api_response(response).await);
        }

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(Self::into_api_response(response).await);
        }

        debug!(url = %url, "request returned 401, refreshing token");
        match self.refresh_unless_rotated(token.as_deref()).await {
            Ok(new_token) => match self.build(&url, &options, Some(&new_token)).send().await {
                Ok(retried) => Ok(Self::into_api_response(retried).await),
                // The retry is part of the refresh cycle: a transport
                // failure here ends the session like a rejected refresh,
                // rather than surfacing as a network error.
                Err(err) => {
                    warn!(error = %err, "retry after refresh failed, ending session");
                    Ok(self.expire_session().await)
                }
            },
            Err(err) => {
                warn!(error = %err, "inline refresh failed, clearing stored tokens");
                Ok(self.expire_session().await)
            }
        }
    }

    /// Clear the four token keys and synthesize the session-expired triple.
    async fn expire_session(&self) -> ApiResponse {
        if let Err(err) = self.storage.multi_remove(&config::TOKEN_KEYS).await {
            warn!(error = %err, "failed to clear stored tokens");
        }
        ApiResponse {
            ok: false,
            status: 401,
            data: Some(json!({"error": "Session expired"})),
        }
    }

    /// GET a relative endpoint or absolute URL.
    pub async fn get(&self, endpoint: &str) -> Result<ApiResponse, ApiError> {
        self.request(endpoint, RequestOptions::default()).await
    }

    /// POST a JSON body.
    pub async fn post_json(&self, endpoint: &str, body: Value) -> Result<ApiResponse, ApiError> {
        self.request(
            endpoint,
            RequestOptions {
                method: Method::POST,
                body: Some(RequestBody::Json(body)),
                ..Default::default()
            },
        )
        .await
    }

    /// POST a form-encoded body.
    pub async fn post_form(
        &self,
        endpoint: &str,
        fields: Vec<(String, String)>,
    ) -> Result<ApiResponse, ApiError> {
        self.request(
            endpoint,
            RequestOptions {
                method: Method::POST,
                body: Some(RequestBody::Form(fields)),
                ..Default::default()
            },
        )
        .await
    }

    /// PUT a JSON body.
    pub async fn put_json(&self, endpoint: &str, body: Value) -> Result<ApiResponse, ApiError> {
        self.request(
            endpoint,
            RequestOptions {
                method: Method::PUT,
                body: Some(RequestBody::Json(body)),
                ..Default::default()
            },
        )
        .await
    }

    /// Exchange credentials for a token pair via `POST /auth/token`.
    ///
    /// A non-success status here is a rejected login, surfaced as
    /// `InvalidCredentials` with the server's detail message; it never
    /// triggers a refresh.
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<LoginData, AuthError> {
        let url = self.resolve_url("/auth/token");
        let response = self
            .http
            .post(&url)
            .json(&json!({"email": email, "password": password}))
            .send()
            .await?;

        if !response.status().is_success() {
            let detail = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|body| body.detail)
                .unwrap_or_else(|| "login rejected".to_string());
            return Err(AuthError::InvalidCredentials(detail));
        }

        let body: DataEnvelope<LoginData> = response
            .json()
            .await
            .map_err(AuthError::MalformedResponse)?;
        Ok(body.data)
    }

    fn resolve_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http") {
            endpoint.to_string()
        } else {
            format!("{}{}", self.config.base_url, endpoint)
        }
    }

    pub(crate) async fn stored_token(&self) -> Option<String> {
        self.storage.get(config::TOKEN_KEY).await.ok().flatten()
    }

    fn build(
        &self,
        url: &str,
        options: &RequestOptions,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let mut request = self.http.request(options.method.clone(), url);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        match &options.body {
            Some(RequestBody::Json(value)) => request = request.json(value),
            Some(RequestBody::Form(fields)) => request = request.form(fields),
            None => {}
        }
        request
    }

    async fn into_api_response(response: reqwest::Response) -> ApiResponse {
        let ok = response.status().is_success();
        let status = response.status().as_u16();
        // Tolerate empty and non-JSON bodies.
        let data = response.json::<Value>().await.ok();
        ApiResponse { ok, status, data }
    }
}
