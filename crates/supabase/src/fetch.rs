//! Plain HTTP download of the bytes behind a signed URL.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{CaptionError, ImageData, ObjectFetcher, SignedUrl};
use reqwest::{header::CONTENT_TYPE, Client};
use tracing::{debug, instrument};

use crate::client::check_status;
use crate::SupabaseError;

/// Default cap on a downloaded object (10 MiB).
pub const DEFAULT_MAX_OBJECT_BYTES: usize = 10 * 1024 * 1024;

/// Downloads objects through signed URLs.
///
/// Signed URLs carry their own token, so no credentials are attached.
#[derive(Debug, Clone)]
pub struct HttpObjectFetcher {
    http: Client,
    max_bytes: usize,
}

impl HttpObjectFetcher {
    /// Builds a fetcher with a per-request `timeout` that refuses bodies
    /// larger than `max_bytes`.
    pub fn new(timeout: Duration, max_bytes: usize) -> Result<Self, SupabaseError> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("captioner/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, max_bytes })
    }

    /// Downloads `url`, enforcing the size cap while streaming.
    pub async fn download(&self, url: &str) -> Result<ImageData, SupabaseError> {
        let response = check_status(self.http.get(url).send().await?).await?;

        if let Some(len) = response.content_length() {
            if len > self.max_bytes as u64 {
                return Err(SupabaseError::BodyTooLarge {
                    limit: self.max_bytes,
                });
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let mut response = response;
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(SupabaseError::BodyTooLarge {
                    limit: self.max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(ImageData {
            bytes,
            content_type,
        })
    }
}

#[async_trait]
impl ObjectFetcher for HttpObjectFetcher {
    #[instrument(skip(self, url), fields(url = url.redacted()))]
    async fn fetch(&self, url: &SignedUrl) -> Result<ImageData, CaptionError> {
        let image = self
            .download(&url.url)
            .await
            .map_err(|e| CaptionError::FetchFailed {
                status: e.status(),
                message: e.to_string(),
            })?;
        debug!(bytes = image.len(), content_type = ?image.content_type, "Object downloaded");
        Ok(image)
    }
}
