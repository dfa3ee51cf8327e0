//! Session state and lifecycle management.
//!
//! `SessionStore` is the single source of truth for the current
//! authentication state. It restores persisted tokens on cold start,
//! persists new ones on login, and keeps a one-shot timer armed so the
//! access token is renewed one minute before it expires.
//!
//! The store also listens for `TokenRefreshed` on the event bus: when the
//! fetch layer performs an inline refresh, the handler re-reads the
//! persisted keys so the in-memory copy never goes stale.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::auth::AuthError;
use crate::config;
use crate::events::{EventBus, HandlerId, Topic};
use crate::storage::KeyValueStore;

/// Refresh this long before the access token expires
const REFRESH_LEAD_MS: i64 = 60_000;

/// Never fire a scheduled refresh sooner than this after arming
const MIN_REFRESH_DELAY_MS: i64 = 5_000;

/// In-memory authentication state.
///
/// A token and its expiry are always set or cleared together by login,
/// refresh, and logout.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub access_token: Option<String>,
    /// Absolute expiry of the access token, ms since epoch
    pub access_expiry: Option<i64>,
    pub refresh_token: Option<String>,
    /// Absolute expiry of the refresh token, ms since epoch
    pub refresh_expiry: Option<i64>,
    /// Last-known user profile snapshot, opaque to this crate
    pub user: Option<Value>,
}

impl Session {
    pub fn is_logged_in(&self) -> bool {
        self.access_token.is_some()
    }
}

pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    events: Arc<EventBus>,
    client: ApiClient,
    session: RwLock<Session>,
    /// True until the cold-start restore completes; gates UI rendering
    loading: AtomicBool,
    /// At most one pending proactive-refresh timer; arming replaces it
    refresh_timer: Mutex<Option<JoinHandle<()>>>,
    subscription: Mutex<Option<HandlerId>>,
    /// Self-reference handed to timer tasks and the bus handler, so neither
    /// keeps the store alive on its own
    weak: Weak<SessionStore>,
}

impl SessionStore {
    /// Build a store wired to the given storage, bus, and API client.
    ///
    /// The store subscribes itself to `TokenRefreshed` so refreshes done by
    /// the fetch layer are reflected here without a direct dependency.
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        events: Arc<EventBus>,
        client: ApiClient,
    ) -> Arc<Self> {
        let store = Arc::new_cyclic(|weak: &Weak<SessionStore>| Self {
            storage,
            events: Arc::clone(&events),
            client,
            session: RwLock::new(Session::default()),
            loading: AtomicBool::new(true),
            refresh_timer: Mutex::new(None),
            subscription: Mutex::new(None),
            weak: weak.clone(),
        });

        let weak = store.weak.clone();
        let id = events.subscribe(Topic::TokenRefreshed, move || {
            // Storage reads are async; resynchronize on a separate task.
            if let Some(store) = weak.upgrade() {
                tokio::spawn(async move {
                    store.resync_from_storage().await;
                });
            }
        });
        *store
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(id);

        store
    }

    /// Snapshot of the current session.
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    /// True until `restore` has run once.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Cold-start restore from the persistent store.
    ///
    /// Absent or unreadable keys leave the matching fields empty; a storage
    /// error is treated as "no session". This never fails the app. If a
    /// persisted access expiry is found, the proactive refresh timer is
    /// armed against it.
    pub async fn restore(&self) {
        let restored = self.read_persisted().await;
        if restored.is_logged_in() {
            debug!("restored persisted session");
        }
        let expiry = restored.access_expiry;
        *self.session.write().await = restored;
        self.loading.store(false, Ordering::Release);
        self.schedule_proactive_refresh(expiry);
    }

    /// Establish a session from a freshly issued token pair.
    ///
    /// The in-memory session is updated before the durable write, so it
    /// stays usable for this process lifetime even when persistence fails;
    /// in that case the caller gets `PersistenceFailure` and can warn that a
    /// re-login may be needed after restart. The refresh timer is armed
    /// either way.
    pub async fn login(
        &self,
        access_token: &str,
        access_ttl_secs: i64,
        refresh_token: &str,
        refresh_ttl_secs: i64,
        user: Option<Value>,
    ) -> Result<(), AuthError> {
        if access_token.is_empty() || refresh_token.is_empty() {
            return Err(AuthError::InvalidCredentials(
                "missing token material".to_string(),
            ));
        }

        let now = Utc::now().timestamp_millis();
        let access_expiry = now + access_ttl_secs * 1000;
        let refresh_expiry = now + refresh_ttl_secs * 1000;

        *self.session.write().await = Session {
            access_token: Some(access_token.to_string()),
            access_expiry: Some(access_expiry),
            refresh_token: Some(refresh_token.to_string()),
            refresh_expiry: Some(refresh_expiry),
            user: user.clone(),
        };

        let user_json = user.map(|u| u.to_string()).unwrap_or_default();
        let persisted = self
            .storage
            .multi_set(&[
                (config::TOKEN_KEY, access_token.to_string()),
                (config::EXPIRY_KEY, access_expiry.to_string()),
                (config::REFRESH_KEY, refresh_token.to_string()),
                (config::REFRESH_EXPIRY_KEY, refresh_expiry.to_string()),
                (config::USER_KEY, user_json),
            ])
            .await;

        self.schedule_proactive_refresh(Some(access_expiry));
        info!("logged in");

        persisted.map_err(AuthError::PersistenceFailure)
    }

    /// Exchange credentials for a token pair and establish the session.
    pub async fn login_with_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        let issued = self.client.authenticate(email, password).await?;
        self.login(
            &issued.access_token,
            issued.expires_in,
            &issued.refresh_token,
            issued.refresh_expires_in,
            issued.user,
        )
        .await
    }

    /// End the session: clear memory, remove the persisted keys, cancel any
    /// pending refresh timer. Storage errors are swallowed; logout always
    /// succeeds from the caller's perspective.
    pub async fn logout(&self) {
        self.cancel_refresh_timer();
        *self.session.write().await = Session::default();
        if let Err(err) = self.storage.multi_remove(&config::SESSION_KEYS).await {
            warn!(error = %err, "failed to clear persisted session");
        }
        info!("logged out");
    }

    /// Arm the one-shot refresh timer against an access expiry. Any
    /// previously armed timer is cancelled first, so at most one is pending.
    /// No-op when the expiry is absent.
    pub fn schedule_proactive_refresh(&self, expiry: Option<i64>) {
        self.cancel_refresh_timer();
        let Some(expiry) = expiry else { return };

        let delay = refresh_delay_ms(expiry, Utc::now().timestamp_millis());
        debug!(delay_ms = delay, "proactive refresh scheduled");

        let weak = self.weak.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if let Some(store) = weak.upgrade() {
                store.proactive_refresh().await;
            }
        });
        *self
            .refresh_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Timer-driven renewal of the access token.
    ///
    /// Any failure here is terminal for the session: a missing or rejected
    /// refresh token will not be repaired by retrying, so the store logs
    /// out instead of looping.
    pub async fn proactive_refresh(&self) {
        match self.client.refresh_access_token().await {
            Ok(_) => {
                // The refresh path already persisted the new pair and
                // published TokenRefreshed; sync our copy and re-arm.
                self.resync_from_storage().await;
                let expiry = self.session.read().await.access_expiry;
                self.schedule_proactive_refresh(expiry);
            }
            Err(err) => {
                warn!(error = %err, "proactive refresh failed, ending session");
                self.logout().await;
            }
        }
    }

    /// Overwrite the in-memory session from the five persisted keys.
    async fn resync_from_storage(&self) {
        let restored = self.read_persisted().await;
        *self.session.write().await = restored;
        debug!("session resynchronized from storage");
    }

    async fn read_persisted(&self) -> Session {
        let get = |key: &'static str| {
            let storage = Arc::clone(&self.storage);
            async move { storage.get(key).await.ok().flatten() }
        };

        let access_token = get(config::TOKEN_KEY).await;
        let access_expiry = get(config::EXPIRY_KEY).await.and_then(|v| v.parse().ok());
        let refresh_token = get(config::REFRESH_KEY).await;
        let refresh_expiry = get(config::REFRESH_EXPIRY_KEY)
            .await
            .and_then(|v| v.parse().ok());
        let user = get(config::USER_KEY)
            .await
            .filter(|v| !v.is_empty())
            .and_then(|v| serde_json::from_str(&v).ok());

        Session {
            access_token,
            access_expiry,
            refresh_token,
            refresh_expiry,
            user,
        }
    }

    fn cancel_refresh_timer(&self) {
        if let Some(handle) = self
            .refresh_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            // A fired timer ends up here itself via proactive_refresh;
            // aborting the running task would cut its cleanup short.
            if tokio::task::try_id() != Some(handle.id()) {
                handle.abort();
            }
        }
    }
}

impl Drop for SessionStore {
    fn drop(&mut self) {
        self.cancel_refresh_timer();
        if let Some(id) = self
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            self.events.unsubscribe(Topic::TokenRefreshed, id);
        }
    }
}

/// Delay before the proactive refresh fires: one minute before the access
/// token expires, but never sooner than five seconds from now.
fn refresh_delay_ms(expiry: i64, now: i64) -> u64 {
    (expiry - now - REFRESH_LEAD_MS).max(MIN_REFRESH_DELAY_MS) as u64
}
