use thiserror::Error;

/// Errors raised while calling the inference provider.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The configured base URL cannot carry path segments.
    #[error("Invalid inference base URL '{0}'")]
    InvalidUrl(String),

    /// The request could not be sent, timed out, or the body could not be read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider reported an error, either through a non-success status or
    /// an `error` field in the body.
    #[error("Provider error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Provider {
        /// Response status, when it was not a success.
        status: Option<u16>,
        /// Provider message.
        message: String,
    },

    /// The provider answered successfully but produced no text.
    #[error("Response contained no generated text")]
    EmptyResponse,

    /// The response body was not in any recognised shape.
    #[error("Unrecognised response body: {0}")]
    UnexpectedBody(String),
}
