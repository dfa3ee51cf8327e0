//! Authentication module for managing the user session.
//!
//! This module provides:
//! - `SessionStore`: single source of truth for the current session, with
//!   cold-start restore, login/logout, and a proactive refresh timer
//! - `Session`: the in-memory token/profile snapshot
//! - `AuthError`: the session-lifecycle error taxonomy
//!
//! Tokens are persisted through an injected `KeyValueStore` so state
//! survives a process restart.

pub mod error;
pub mod session;

pub use error::AuthError;
pub use session::{Session, SessionStore};
