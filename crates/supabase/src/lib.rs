//! Supabase infrastructure adapter.
//!
//! Implements three ports from the [`pipeline`] crate:
//!
//! - [`pipeline::SignedUrlProvider`] for [`SupabaseClient`]: Storage's
//!   `object/sign` endpoint.
//! - [`pipeline::CaptionStore`] for [`SupabaseClient`]: a PostgREST insert
//!   that merges on primary-key conflict, so redelivered webhooks overwrite
//!   rather than fail.
//! - [`pipeline::ObjectFetcher`] for [`HttpObjectFetcher`]: an
//!   unauthenticated GET of the signed URL with a status check and size cap.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** This crate must not contain domain rules. Endpoint
//! layout, authentication headers, and provider error bodies are handled
//! here; the [`pipeline`] crate never sees them.

mod client;
mod error;
mod fetch;
mod postgrest;
mod storage;

pub use client::{SupabaseClient, SupabaseConfig};
pub use error::SupabaseError;
pub use fetch::{HttpObjectFetcher, DEFAULT_MAX_OBJECT_BYTES};
