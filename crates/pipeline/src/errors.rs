//! Top-level error type for the captioning pipeline.
//!
//! [`CaptionError`] is the taxonomy every port returns. Infrastructure crates
//! define their own transport-level errors and convert them into the matching
//! variant at the port boundary, so the orchestration layer only ever sees
//! these five conditions.
//!
//! None of them is recovered from: each aborts the delivery. There is no
//! retry policy; webhook redelivery is the only second attempt.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::PipelineStage;

/// Conditions that abort a delivery.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum CaptionError {
    /// The webhook body is not a decodable storage event.
    ///
    /// Produced before any external call is made.
    #[error("Malformed webhook payload: {message}")]
    MalformedPayload {
        /// Decoder diagnostics.
        message: String,
    },

    /// No signed URL could be obtained for the object.
    ///
    /// Produced when the record lacks a bucket or path, the object or bucket
    /// does not exist, or the storage provider call fails.
    #[error("Signed URL unavailable for '{object}': {message}")]
    SignedUrlUnavailable {
        /// `bucket/path` of the object, or the object id when the record
        /// carries no location.
        object: String,
        /// Provider or validation diagnostics.
        message: String,
    },

    /// The object bytes could not be downloaded.
    ///
    /// Produced on transport failure, non-success status, or an empty or
    /// oversized body.
    #[error("Fetching object bytes failed{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    FetchFailed {
        /// HTTP status returned by the storage service, if a response arrived.
        status: Option<u16>,
        /// Transport or validation diagnostics.
        message: String,
    },

    /// The inference provider did not produce a caption.
    ///
    /// Produced on timeout, quota exhaustion, provider error bodies, and
    /// responses without generated text.
    #[error("Inference with model '{model}' failed: {message}")]
    InferenceFailed {
        /// Model that was invoked.
        model: String,
        /// Provider diagnostics.
        message: String,
    },

    /// The caption row could not be written.
    ///
    /// Produced on constraint violations and connectivity loss.
    #[error("Writing caption for object '{object_id}' failed: {message}")]
    StoreWriteFailed {
        /// Primary key of the row that was being written.
        object_id: String,
        /// Store diagnostics.
        message: String,
    },
}

impl CaptionError {
    /// Stable snake_case code for this error, safe to return to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedPayload { .. } => "malformed_payload",
            Self::SignedUrlUnavailable { .. } => "signed_url_unavailable",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::InferenceFailed { .. } => "inference_failed",
            Self::StoreWriteFailed { .. } => "store_write_failed",
        }
    }

    /// The stage the pipeline was trying to reach when this error occurred.
    pub fn failed_stage(&self) -> PipelineStage {
        match self {
            Self::MalformedPayload { .. } => PipelineStage::Received,
            Self::SignedUrlUnavailable { .. } => PipelineStage::UrlResolved,
            Self::FetchFailed { .. } => PipelineStage::BytesFetched,
            Self::InferenceFailed { .. } => PipelineStage::CaptionGenerated,
            Self::StoreWriteFailed { .. } => PipelineStage::Stored,
        }
    }

    /// Returns `true` if the fault lies with the inbound request rather than
    /// with a collaborator.
    pub fn is_caller_fault(&self) -> bool {
        matches!(self, Self::MalformedPayload { .. })
    }
}
