//! Webhook handler core: turns a storage insert event into a stored caption.
//!
//! [`CaptionPipeline`] implements [`pipeline::StorageEventHandler`] by running
//! four steps in sequence:
//!
//! 1. obtain a signed URL for the uploaded object,
//! 2. download the object bytes,
//! 3. run an image-to-text model over them,
//! 4. upsert the caption keyed by the object id.
//!
//! Events other than inserts on the configured table are acknowledged without
//! any external call (see [`filter::should_caption`]).
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** The pipeline sequences calls between the domain
//! types in the [`pipeline`] crate and the port traits implemented by the
//! infrastructure crates. It performs no I/O of its own.

pub mod filter;
mod orchestrator;

pub use crate::filter::should_caption;
pub use crate::orchestrator::CaptionPipeline;
