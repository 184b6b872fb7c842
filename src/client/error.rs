//! Errors from the generation service client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("server error (status {status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl ClientError {
    /// Classify a reqwest failure, pulling timeouts out of the transport bucket.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.is_decode() {
            ClientError::MalformedResponse(err.to_string())
        } else {
            ClientError::Transport(err)
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
