//! Core domain for the storage-upload captioning service.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, and the error taxonomy used throughout the workspace. Infrastructure
//! crates implement the port traits defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ObjectId`, `BucketId`, `DeliveryId`, etc.) |
//! | [`types`] | Value types (`StorageEvent`, `SignedUrl`, `Caption`, `PipelineStage`, etc.) |
//! | [`errors`] | The `CaptionError` taxonomy |
//! | [`config`] | `CaptioningConfig` and the redacting `ApiKey` |
//! | [`ports`] | Async traits for the signed-URL provider, fetcher, inference client, and caption store |

pub mod config;
pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::{
    ApiKey, CaptioningConfig, DEFAULT_CAPTION_TABLE, DEFAULT_EXPECTED_TABLE, DEFAULT_MODEL,
    DEFAULT_SIGNED_URL_EXPIRY,
};
pub use errors::CaptionError;
pub use identifiers::{BucketId, DeliveryId, ModelId, ObjectId, TableName};
pub use ports::{CaptionStore, InferenceClient, ObjectFetcher, SignedUrlProvider, StorageEventHandler};
pub use types::{
    Caption, CaptionOutcome, EventType, ImageData, ObjectLocation, PipelineStage, SignedUrl,
    SkipReason, StorageEvent, StorageObject, Timestamp,
};
