//! The webhook-to-caption pipeline.
//!
//! [`CaptionPipeline`] sequences the four ports strictly in order: each step's
//! output is the next step's input, so nothing runs concurrently within a
//! delivery. The first failure aborts the delivery; earlier steps have no side
//! effects to undo.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use pipeline::{
    Caption, CaptionError, CaptionOutcome, CaptionStore, CaptioningConfig, DeliveryId,
    InferenceClient, ObjectFetcher, ObjectId, PipelineStage, SignedUrlProvider, StorageEvent,
    StorageEventHandler, StorageObject,
};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::filter::should_caption;

/// Orchestrates signed-URL resolution, download, inference, and storage for
/// one storage event at a time.
///
/// Holds no per-delivery state, so one instance serves any number of
/// concurrent deliveries.
pub struct CaptionPipeline {
    urls: Arc<dyn SignedUrlProvider>,
    fetcher: Arc<dyn ObjectFetcher>,
    inference: Arc<dyn InferenceClient>,
    store: Arc<dyn CaptionStore>,
    config: CaptioningConfig,
}

impl CaptionPipeline {
    /// Creates a pipeline over the given collaborators.
    pub fn new(
        urls: Arc<dyn SignedUrlProvider>,
        fetcher: Arc<dyn ObjectFetcher>,
        inference: Arc<dyn InferenceClient>,
        store: Arc<dyn CaptionStore>,
        config: CaptioningConfig,
    ) -> Self {
        Self {
            urls,
            fetcher,
            inference,
            store,
            config,
        }
    }

    /// Returns the settings this pipeline runs with.
    pub fn config(&self) -> &CaptioningConfig {
        &self.config
    }

    /// Runs an already-decoded event through the filter and, if accepted, the
    /// full pipeline.
    pub async fn handle_event(&self, event: &StorageEvent) -> Result<CaptionOutcome, CaptionError> {
        if let Err(reason) = should_caption(event, &self.config.expected_table) {
            info!(
                object_id = event.object_id().map(ObjectId::as_str),
                event_type = %event.event_type,
                reason = %reason,
                "Event skipped"
            );
            return Ok(CaptionOutcome::Skipped(reason));
        }

        let record = event.inserted_object()?;
        let started = Instant::now();
        let result = self.caption_object(record).await;
        match &result {
            Ok(caption) => info!(
                object_id = %caption.id,
                caption = %caption.caption,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Caption stored"
            ),
            Err(e) => warn!(
                object_id = %record.id,
                kind = e.kind(),
                failed_stage = %e.failed_stage(),
                error = %e,
                "Captioning failed"
            ),
        }
        result.map(CaptionOutcome::Stored)
    }

    async fn caption_object(&self, record: &StorageObject) -> Result<Caption, CaptionError> {
        let mut progress = Progress::new(&record.id);

        let location = record
            .location()
            .ok_or_else(|| CaptionError::SignedUrlUnavailable {
                object: record.id.to_string(),
                message: "record has no bucket_id or object path".to_string(),
            })?;

        let signed_url = self
            .urls
            .create_signed_url(&location, self.config.signed_url_expiry)
            .await?;
        progress.advance();

        let image = self.fetcher.fetch(&signed_url).await?;
        if image.is_empty() {
            return Err(CaptionError::FetchFailed {
                status: None,
                message: format!("object '{location}' has an empty body"),
            });
        }
        progress.advance();

        let generated = self.inference.image_to_text(&image, &self.config.model).await?;
        let text = generated.trim();
        if text.is_empty() {
            return Err(CaptionError::InferenceFailed {
                model: self.config.model.to_string(),
                message: "model returned empty text".to_string(),
            });
        }
        progress.advance();

        let caption = Caption {
            id: record.id.clone(),
            caption: text.to_string(),
        };
        self.store.upsert(&caption).await?;
        progress.advance();
        progress.finish();

        Ok(caption)
    }
}

#[async_trait]
impl StorageEventHandler for CaptionPipeline {
    async fn handle_payload(
        &self,
        delivery: DeliveryId,
        body: &[u8],
    ) -> Result<CaptionOutcome, CaptionError> {
        let span = info_span!("delivery", delivery_id = %delivery);
        async move {
            let event = StorageEvent::from_json(body).inspect_err(|e| {
                warn!(kind = e.kind(), error = %e, body_len = body.len(), "Rejected webhook payload");
            })?;
            self.handle_event(&event).await
        }
        .instrument(span)
        .await
    }
}

// ---------------------------------------------------------------------------
// Stage tracking
// ---------------------------------------------------------------------------

/// Walks [`PipelineStage`] forward one state per completed step.
struct Progress<'a> {
    object_id: &'a ObjectId,
    stage: PipelineStage,
}

impl<'a> Progress<'a> {
    fn new(object_id: &'a ObjectId) -> Self {
        debug!(object_id = %object_id, stage = %PipelineStage::Received, "Pipeline stage reached");
        Self {
            object_id,
            stage: PipelineStage::Received,
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.stage.next() {
            self.stage = next;
            debug!(object_id = %self.object_id, stage = %next, "Pipeline stage reached");
        }
    }

    fn finish(mut self) {
        while self.stage != PipelineStage::Done {
            self.advance();
        }
    }
}
