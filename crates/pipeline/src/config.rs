//! Runtime configuration consumed by the pipeline and its adapters.
//!
//! Values arrive through constructors only. Nothing in this workspace below
//! the `cli` composition root reads the process environment.

use std::time::Duration;

use crate::{ModelId, TableName};

/// Default image-to-text model.
pub const DEFAULT_MODEL: &str = "nlpconnect/vit-gpt2-image-captioning";

/// Default lifetime requested for signed URLs.
pub const DEFAULT_SIGNED_URL_EXPIRY: Duration = Duration::from_secs(60);

/// Default source table for storage webhooks.
pub const DEFAULT_EXPECTED_TABLE: &str = "objects";

/// Default destination table for captions.
pub const DEFAULT_CAPTION_TABLE: &str = "image_caption";

// ---------------------------------------------------------------------------
// Pipeline settings
// ---------------------------------------------------------------------------

/// Settings that shape how a single event is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptioningConfig {
    /// Model passed to the inference provider.
    pub model: ModelId,

    /// Lifetime requested for the signed URL.
    pub signed_url_expiry: Duration,

    /// Events naming any other table are skipped. Events with no table are
    /// accepted.
    pub expected_table: TableName,
}

impl Default for CaptioningConfig {
    fn default() -> Self {
        Self {
            model: ModelId::from_static(DEFAULT_MODEL),
            signed_url_expiry: DEFAULT_SIGNED_URL_EXPIRY,
            expected_table: TableName::from_static(DEFAULT_EXPECTED_TABLE),
        }
    }
}

impl CaptioningConfig {
    /// Returns the default caption destination table.
    pub fn default_caption_table() -> TableName {
        TableName::from_static(DEFAULT_CAPTION_TABLE)
    }
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

/// A bearer credential (service-role key, access token).
///
/// `Debug` and `Display` never print the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a credential, returning `None` if it is empty.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let v = value.into();
        if v.is_empty() {
            None
        } else {
            Some(Self(v))
        }
    }

    /// Exposes the raw credential for use in a request header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Formats the credential as an `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}
