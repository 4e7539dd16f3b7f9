use thiserror::Error;

/// Failure classes a remote call can surface after the client's internal
/// retries are exhausted. Only `SessionExpired` is fatal to a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("session expired: credentials rejected by the remote side")]
    SessionExpired,
    #[error("rate limited on {endpoint} after {attempts} attempts")]
    RateLimited { endpoint: String, attempts: u32 },
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ApiError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::SessionExpired)
    }
}
