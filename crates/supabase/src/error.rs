//! Transport-level errors for the Supabase adapters.
//!
//! Each port implementation converts these into the matching
//! [`pipeline::CaptionError`] variant, adding the object or row it was
//! working on.

use thiserror::Error;

/// Longest provider error body kept in a message.
const MAX_ERROR_BODY: usize = 256;

/// Errors raised while talking to Supabase Storage, PostgREST, or a signed URL.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// The configured base URL cannot carry path segments.
    #[error("Invalid Supabase URL '{0}'")]
    InvalidUrl(String),

    /// The request could not be sent or the response could not be read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// Response status code.
        status: u16,
        /// Provider message extracted from the body.
        message: String,
    },

    /// The signing endpoint answered without a usable URL.
    #[error("Signed URL response was unusable: {0}")]
    InvalidSignedUrl(String),

    /// A downloaded body exceeded the configured maximum.
    #[error("Body exceeds {limit} bytes")]
    BodyTooLarge {
        /// Configured maximum.
        limit: usize,
    },
}

impl SupabaseError {
    /// Returns the HTTP status behind this error, if a response arrived.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Builds a [`SupabaseError::Status`] from a failed response body.
    ///
    /// Storage and PostgREST both answer with JSON objects carrying a
    /// `message` field; other bodies are kept verbatim (truncated).
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| truncate(body.trim(), MAX_ERROR_BODY));
        Self::Status { status, message }
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
