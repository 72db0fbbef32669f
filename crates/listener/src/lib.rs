//! Inbound webhook receiver.
//!
//! Binds an HTTP server and hands each `POST /` body to a
//! [`pipeline::StorageEventHandler`]. Each request gets a fresh
//! [`pipeline::DeliveryId`] for log correlation.
//!
//! | Route | Reply |
//! |-------|-------|
//! | `POST /` | `200 ok` when the event was captioned or skipped; `400 {"error": "malformed_payload"}`; `500 {"error": "<kind>"}` for collaborator failures; `401` on a bad bearer token |
//! | `GET /healthz` | `200 ok` |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport details, authentication, and status mapping
//! all live here. The [`pipeline`] crate sees only raw payload bytes.

mod config;
pub mod routes;
mod server;

pub use config::{ListenerConfig, DEFAULT_BODY_LIMIT};
pub use routes::error_reply;
pub use server::{ListenerError, WebhookServer};
