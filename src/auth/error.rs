use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Login was attempted without usable token material, or the server
    /// rejected the credentials. Caller's responsibility; never retried.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The durable write failed after an otherwise-successful login or
    /// refresh. The in-memory session is still usable for this process
    /// lifetime, but the user may need to log in again after a restart.
    #[error("Session could not be persisted")]
    PersistenceFailure(#[source] anyhow::Error),

    /// A refresh was attempted with nothing to refresh. The session cannot
    /// self-heal and is forcibly logged out.
    #[error("No refresh token available")]
    NoRefreshToken,

    /// The refresh endpoint returned a non-success status. An expired or
    /// invalid refresh token will not become valid by retrying, so this
    /// ends the session.
    #[error("Refresh rejected by server (status {status})")]
    RefreshRejected { status: u16 },

    /// The refresh response body could not be decoded.
    #[error("Malformed refresh response")]
    MalformedResponse(#[source] reqwest::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}
