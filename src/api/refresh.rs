//! Token refresh against `POST /auth/refresh`.
//!
//! Both refresh paths converge here: the session store's proactive timer
//! and the client's 401 retry. The endpoint is called directly rather than
//! through the session store, so the fetch layer has no dependency cycle
//! back into session state.
//!
//! Refreshes are single-flight: attempts are serialized, and a caller that
//! acquires the gate after another refresh already completed reuses the
//! token the winner stored instead of issuing a second network call. Every
//! path still converges on a consistent persisted state at rest.

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::auth::AuthError;
use crate::config;
use crate::events::Topic;
use crate::models::{DataEnvelope, RefreshData};

/// Serializes refresh attempts across timer-driven and 401-driven callers.
#[derive(Debug, Default)]
pub struct RefreshGate {
    lock: Mutex<()>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ApiClient {
    /// Obtain a fresh access token, persist the new pair, and announce it.
    ///
    /// On success the four token keys are written as one logical unit and
    /// `TokenRefreshed` is published so the session store resynchronizes.
    /// Failures are terminal for the caller: a rejected or missing refresh
    /// token is not retried here.
    pub async fn refresh_access_token(&self) -> Result<String, AuthError> {
        self.refresh_unless_rotated(None).await
    }

    /// Refresh, unless the stored token no longer matches the one that just
    /// got a 401. `observed` is the token the caller presented; `None`
    /// forces a refresh (the proactive timer always wants one).
    pub(crate) async fn refresh_unless_rotated(
        &self,
        observed: Option<&str>,
    ) -> Result<String, AuthError> {
        let _guard = self.gate().lock.lock().await;

        // A concurrent task may have refreshed while we waited on the gate;
        // its token is good for us too.
        if let Some(observed) = observed {
            if let Some(current) = self.stored_token().await {
                if current != observed {
                    debug!("refresh already performed by a concurrent task");
                    return Ok(current);
                }
            }
        }

        let refresh_token = self
            .storage()
            .get(config::REFRESH_KEY)
            .await
            .ok()
            .flatten()
            .ok_or(AuthError::NoRefreshToken)?;

        let url = format!("{}/auth/refresh", self.config().base_url);
        let response = self
            .http()
            .post(&url)
            .form(&[("refresh_token", refresh_token.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "refresh token rejected");
            return Err(AuthError::RefreshRejected {
                status: response.status().as_u16(),
            });
        }

        let body: DataEnvelope<RefreshData> = response
            .json()
            .await
            .map_err(AuthError::MalformedResponse)?;
        let data = body.data;

        let now = Utc::now().timestamp_millis();
        let access_ttl = data.expires_in.unwrap_or(config::DEFAULT_ACCESS_TTL_SECS);
        let refresh_ttl = data
            .refresh_expires_in
            .unwrap_or(config::DEFAULT_REFRESH_TTL_SECS);
        let access_expiry = now + access_ttl * 1000;
        let refresh_expiry = now + refresh_ttl * 1000;
        // When the server does not rotate, keep the refresh token we have.
        let next_refresh = data.refresh_token.unwrap_or(refresh_token);

        self.storage()
            .multi_set(&[
                (config::TOKEN_KEY, data.access_token.clone()),
                (config::EXPIRY_KEY, access_expiry.to_string()),
                (config::REFRESH_KEY, next_refresh),
                (config::REFRESH_EXPIRY_KEY, refresh_expiry.to_string()),
            ])
            .await
            .map_err(AuthError::PersistenceFailure)?;

        self.events().publish(Topic::TokenRefreshed);
        debug!("access token refreshed");
        Ok(data.access_token)
    }
}
