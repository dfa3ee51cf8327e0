//! Client configuration.
//!
//! This module holds the API base URL, the HTTP timeout, and the key names
//! under which session state is persisted. The key names match what the
//! mobile apps already store, so a session written by one client remains
//! readable by another.

use std::time::Duration;

/// Application name used for the file-backed store and keychain service
pub const APP_NAME: &str = "flora-client";

/// Production base URL for the Flora storefront API
pub const DEFAULT_BASE_URL: &str = "https://io2-l2tx8.ondigitalocean.app";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Persisted key for the access token
pub const TOKEN_KEY: &str = "flora_token";

/// Persisted key for the access-token expiry (ms since epoch, string-encoded)
pub const EXPIRY_KEY: &str = "flora_token_expiry";

/// Persisted key for the refresh token
pub const REFRESH_KEY: &str = "flora_refresh_token";

/// Persisted key for the refresh-token expiry (ms since epoch, string-encoded)
pub const REFRESH_EXPIRY_KEY: &str = "flora_refresh_token_expiry";

/// Persisted key for the JSON-encoded user profile (empty string when absent)
pub const USER_KEY: &str = "flora_user";

/// All five persisted session keys, in write order
pub const SESSION_KEYS: [&str; 5] = [
    TOKEN_KEY,
    EXPIRY_KEY,
    REFRESH_KEY,
    REFRESH_EXPIRY_KEY,
    USER_KEY,
];

/// The four token-related keys, cleared when an inline refresh fails.
/// The user profile is left behind so a re-login can show who was signed in.
pub const TOKEN_KEYS: [&str; 4] = [TOKEN_KEY, EXPIRY_KEY, REFRESH_KEY, REFRESH_EXPIRY_KEY];

/// Access-token lifetime assumed when a refresh response omits `expires_in`
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 1800;

/// Refresh-token lifetime assumed when a refresh response omits
/// `refresh_expires_in` (one week)
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 604_800;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Config pointing at the given base URL with the default timeout.
    /// Trailing slashes are stripped so endpoint joining stays predictable.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}
