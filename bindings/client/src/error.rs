use thiserror::Error;

pub type ConductorClientResult<T> = Result<T, ConductorClientError>;

/// Errors raised by [crate::prelude::ConductorClient].
///
/// An unexpected status is only an error for the setup and cleanup operations. The load calls
/// return the status so that scenarios can check it.
#[derive(Debug, Error)]
pub enum ConductorClientError {
    #[error("invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("server URL cannot have API paths appended: {0}")]
    NotABaseUrl(String),
    #[error("token is not a valid header value")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{operation} returned status {status}: {body}")]
    UnexpectedStatus {
        operation: &'static str,
        status: u16,
        body: String,
    },
}
