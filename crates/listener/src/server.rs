//! Binding and serving the webhook routes with graceful shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use pipeline::StorageEventHandler;
use thiserror::Error;
use tracing::info;

use crate::{routes, ListenerConfig};

/// Errors raised while running the inbound server.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The configured address could not be bound.
    #[error("Failed to bind webhook listener: {0}")]
    Bind(#[from] warp::Error),
}

/// HTTP server that feeds webhook deliveries into a [`StorageEventHandler`].
pub struct WebhookServer {
    handler: Arc<dyn StorageEventHandler>,
    config: ListenerConfig,
}

impl WebhookServer {
    /// Creates a server; nothing is bound until [`WebhookServer::run`].
    pub fn new(handler: Arc<dyn StorageEventHandler>, config: ListenerConfig) -> Self {
        Self { handler, config }
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    ///
    /// In-flight deliveries are allowed to finish before this returns.
    pub async fn run<S>(self, shutdown: S) -> Result<(), ListenerError>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let (addr, server) = self.bind(shutdown)?;
        info!(
            %addr,
            token_check = self.config.webhook_token.is_some(),
            "Webhook listener bound"
        );
        server.await;
        info!("Webhook listener stopped");
        Ok(())
    }

    /// Binds without serving; returns the bound address and the server future.
    pub fn bind<S>(
        &self,
        shutdown: S,
    ) -> Result<(SocketAddr, impl Future<Output = ()> + 'static), ListenerError>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let routes = routes::routes(self.handler.clone(), &self.config);
        let bound = warp::serve(routes).try_bind_with_graceful_shutdown(self.config.bind, shutdown)?;
        Ok(bound)
    }
}
