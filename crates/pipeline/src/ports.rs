//! Port traits the orchestration layer depends on.
//!
//! Each trait is implemented by an infrastructure crate (`supabase`,
//! `inference`) and by in-memory fakes in tests. Implementations report
//! failures as the matching [`CaptionError`] variant and never retry.

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    Caption, CaptionError, CaptionOutcome, DeliveryId, ImageData, ModelId, ObjectLocation,
    SignedUrl,
};

/// Issues short-lived, pre-authenticated URLs for stored objects.
#[async_trait]
pub trait SignedUrlProvider: Send + Sync {
    /// Requests a URL for `location` valid for `expires_in`.
    ///
    /// # Errors
    ///
    /// [`CaptionError::SignedUrlUnavailable`] if the object or bucket does not
    /// exist or the provider call fails.
    async fn create_signed_url(
        &self,
        location: &ObjectLocation,
        expires_in: Duration,
    ) -> Result<SignedUrl, CaptionError>;
}

/// Downloads the bytes behind a signed URL.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    /// # Errors
    ///
    /// [`CaptionError::FetchFailed`] on transport failure, non-success status,
    /// or an unusable body.
    async fn fetch(&self, url: &SignedUrl) -> Result<ImageData, CaptionError>;
}

/// Runs an image-to-text model.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Returns the generated text for `image`.
    ///
    /// # Errors
    ///
    /// [`CaptionError::InferenceFailed`] on provider error, timeout, or a
    /// response without generated text.
    async fn image_to_text(&self, image: &ImageData, model: &ModelId)
        -> Result<String, CaptionError>;
}

/// Persists captions keyed by object id.
#[async_trait]
pub trait CaptionStore: Send + Sync {
    /// Writes `caption`, replacing any existing row with the same id.
    ///
    /// # Errors
    ///
    /// [`CaptionError::StoreWriteFailed`] on constraint violation or
    /// connectivity loss.
    async fn upsert(&self, caption: &Caption) -> Result<(), CaptionError>;
}

/// Handles one raw webhook delivery end to end.
///
/// The inbound HTTP layer depends only on this trait.
#[async_trait]
pub trait StorageEventHandler: Send + Sync {
    /// Decodes `body` and runs it through the pipeline.
    async fn handle_payload(
        &self,
        delivery: DeliveryId,
        body: &[u8],
    ) -> Result<CaptionOutcome, CaptionError>;
}
