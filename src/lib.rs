//! Flora storefront client - session lifecycle and authenticated API access.
//!
//! This crate implements the authentication core of the Flora mobile
//! storefront:
//!
//! - `auth::SessionStore`: single source of truth for the current session,
//!   with cold-start restore, login/logout, and a proactive refresh timer
//!   that renews the access token one minute before it expires
//! - `api::ApiClient`: authenticated fetch with transparent
//!   refresh-and-retry-once on 401
//! - `events::EventBus`: announces `TokenRefreshed` so the two stay
//!   consistent without a dependency cycle
//! - `storage`: injected persistent key-value capability with keychain,
//!   file, and in-memory backends
//!
//! A host wires the pieces together once at startup:
//!
//! ```no_run
//! use std::sync::Arc;
//! use flora_client::{ApiClient, ClientConfig, EventBus, KeychainStore, SessionStore};
//!
//! # async fn wire() -> Result<(), flora_client::ApiError> {
//! let storage: Arc<dyn flora_client::KeyValueStore> = Arc::new(KeychainStore::new());
//! let events = Arc::new(EventBus::new());
//! let client = ApiClient::new(ClientConfig::default(), Arc::clone(&storage), Arc::clone(&events))?;
//! let session = SessionStore::new(storage, events, client.clone());
//! session.restore().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod events;
pub mod models;
pub mod storage;

pub use api::{ApiClient, ApiError, ApiResponse, RequestBody, RequestOptions};
pub use auth::{AuthError, Session, SessionStore};
pub use config::ClientConfig;
pub use events::{EventBus, HandlerId, Topic};
pub use storage::{FileStore, KeyValueStore, KeychainStore, MemoryStore};
