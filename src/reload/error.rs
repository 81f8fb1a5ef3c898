use thiserror::Error;

/// Why a hot reload did not happen.
///
/// Never fatal: the coordinator logs these as warnings.
#[derive(Error, Debug)]
pub enum ReloadError {
    #[error("authentication rejected (status {0})")]
    Unauthorized(u16),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("reload rejected: {0}")]
    Rejected(String),

    #[error("unexpected response: {0}")]
    Protocol(String),

    /// Nothing is listening; the instance is probably not running.
    #[error("no instance listening at {0}")]
    NotReachable(String),
}
