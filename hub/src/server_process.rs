use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::Router;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use tokio_util::sync::CancellationToken;
use tools::http::http_server::HttpServerProcess;
use tracing::info;

use crate::hub::Hub;

async fn ws_handler(State(hub): State<Arc<Hub>>, ws: WebSocketUpgrade, headers: HeaderMap) -> Response {
    hub.handshake(ws, headers).await
}

/// Binds and serves the websocket listener as a supervised
/// [`HttpServerProcess`] (§4.D "Accept socket upgrades"), distinct from the
/// teacher's readiness/liveness/metrics app server.
pub struct HubServerProcess {
    addr: String,
    url: String,
    hub: Arc<Hub>,
}

impl HubServerProcess {
    #[must_use]
    pub fn new(addr: impl Into<String>, url: impl Into<String>, hub: Arc<Hub>) -> Self {
        Self {
            addr: addr.into(),
            url: url.into(),
            hub,
        }
    }
}

#[async_trait]
impl HttpServerProcess for HubServerProcess {
    async fn pre_run(&self) -> Result<()> {
        Ok(())
    }

    async fn run(&self, token: CancellationToken) -> Result<()> {
        self.hub.set_shutdown_token(token.clone());

        let router = Router::new()
            .route(&self.url, get(ws_handler))
            .with_state(Arc::clone(&self.hub));

        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .with_context(|| format!("failed to bind hub listener on {}", self.addr))?;

        info!("Connection Hub listening on {}", self.addr);

        // §4.D "Shutdown": every live socket gets a close frame (bounded 2s
        // each) before axum's graceful drain waits on the connection futures
        // themselves — otherwise those futures exit on the same token and
        // the directory is already empty by the time `Hub::shutdown` runs.
        let hub = Arc::clone(&self.hub);
        let shutdown_token = token.clone();
        let graceful_shutdown = async move {
            shutdown_token.cancelled().await;
            hub.shutdown().await;
        };

        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(graceful_shutdown)
            .await
            .context("hub websocket server failed")?;

        Ok(())
    }
}
