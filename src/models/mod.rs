//! Data models for the Flora storefront auth endpoints.
//!
//! Only the token-issue and token-refresh payloads are typed here; the rest
//! of the API surface is business data the caller consumes as raw JSON
//! through `ApiResponse::data`. The user profile is deliberately opaque and
//! carried as `serde_json::Value`.

use serde::Deserialize;
use serde_json::Value;

/// Envelope used by the auth endpoints: `{ "data": ... }`.
#[derive(Debug, Clone, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// Payload of a successful `POST /auth/token` response.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginData {
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in seconds
    pub expires_in: i64,
    /// Refresh-token lifetime in seconds
    pub refresh_expires_in: i64,
    /// Last-known user profile snapshot, opaque to this crate
    #[serde(default)]
    pub user: Option<Value>,
}

/// Payload of a successful `POST /auth/refresh` response.
///
/// Rotation fields are optional: when the server omits them the previous
/// refresh token is retained and default lifetimes apply.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshData {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_expires_in: Option<i64>,
}

/// Error body returned by the API on auth failures.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
}
