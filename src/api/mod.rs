//! HTTP client module for the Flora storefront API.
//!
//! This module provides the `ApiClient` for making authenticated requests.
//! The client reads the bearer token from persistent storage, attaches it
//! to each request, and on a 401 performs a single inline token refresh and
//! retry; call sites never deal with token expiry themselves.

pub mod client;
pub mod error;
pub mod refresh;

pub use client::{ApiClient, ApiResponse, RequestBody, RequestOptions};
pub use error::ApiError;
