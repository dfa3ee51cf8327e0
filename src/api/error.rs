use thiserror::Error;

/// Transport-level failures of the fetch layer.
///
/// HTTP-level failures (non-2xx statuses) are not errors: they come back as
/// `ApiResponse { ok: false, .. }` so callers get a uniform success/failure
/// contract. Only a request that never produced a response lands here.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}
