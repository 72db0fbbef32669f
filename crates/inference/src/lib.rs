//! Image-to-text inference infrastructure adapter.
//!
//! Implements the [`pipeline::InferenceClient`] trait for the Hugging Face
//! Inference API. Other providers are added as new clients in this crate
//! without any changes to the `pipeline` crate.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, request formatting, and response
//! parsing live here. The [`pipeline`] crate sees only
//! [`pipeline::InferenceClient`].
//!
//! Calls are made exactly once. A model that is still loading (HTTP 503 with
//! an `estimated_time`) is reported as a failure like any other provider
//! error; the webhook sender's redelivery is the retry mechanism.

mod error;
mod huggingface;

pub use error::InferenceError;
pub use huggingface::{HuggingFaceClient, HuggingFaceConfig, DEFAULT_BASE_URL};
