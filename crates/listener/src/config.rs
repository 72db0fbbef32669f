//! Settings for the inbound webhook listener.

use std::net::SocketAddr;

use pipeline::ApiKey;

/// Default cap on an inbound webhook body (64 KiB).
pub const DEFAULT_BODY_LIMIT: u64 = 64 * 1024;

/// Settings for the inbound HTTP server.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Address to bind.
    pub bind: SocketAddr,

    /// When set, every webhook must carry `Authorization: Bearer <token>`.
    pub webhook_token: Option<ApiKey>,

    /// Largest accepted request body, in bytes.
    pub body_limit: u64,
}

impl ListenerConfig {
    /// Creates a config binding `bind` with no token check and the default
    /// body limit.
    pub fn new(bind: SocketAddr) -> Self {
        Self {
            bind,
            webhook_token: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}
