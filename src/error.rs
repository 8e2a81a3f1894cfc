use std::result;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The server answered 401 but sent no usable `WWW-Authenticate` header.
    #[error("Missing WWW-Authenticate challenge")]
    ChallengeMissing,

    /// The challenge lacks a required directive (`realm` or `nonce`).
    #[error("Missing \"{0}\" in challenge")]
    ChallengeIncomplete(&'static str),

    /// The authenticated retry was rejected as well.
    #[error("Authentication failed for {0}")]
    AuthenticationFailed(String),

    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),

    /// DNS, connect or other connection-level failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Body is not JSON, or lacks the expected device-kind key.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Device returned HTTP {0}")]
    UnexpectedStatus(u16),

    #[error("Unknown algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Bad Qop option: {0}")]
    BadQop(String),

    #[error("Invalid header syntax: {0}")]
    InvalidHeaderSyntax(String),

    /// A control command or device path with out-of-range arguments.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = result::Result<T, Error>;

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::InvalidUrl(e.to_string())
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

impl Error {
    /// True for failures that may clear up on the next polling interval.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::RequestTimeout(_) | Error::Transport(_) | Error::UnexpectedStatus(_)
        )
    }
}
