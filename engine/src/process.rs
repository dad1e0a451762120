use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hub::Hub;
use tokio_util::sync::CancellationToken;
use tools::http::http_server::HttpServerProcess;

/// Runs the Event Broker's supervised reconnect loop (§4.C "Serve") as one
/// of the teacher's [`HttpServerProcess`]es, so `tools::http_server::Server`
/// drives it under the same `CancellationToken`-based shutdown as every
/// other long-running task.
pub struct BrokerProcess(pub Arc<broker::Broker>);

#[async_trait]
impl HttpServerProcess for BrokerProcess {
    async fn pre_run(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn run(&self, token: CancellationToken) -> anyhow::Result<()> {
        self.0.run(token).await
    }
}

/// Periodically pings every live socket and drops the ones that fail
/// (§4.D "Optional cleanup"), running as its own supervised process
/// rather than bolted onto the hub's request loop.
pub struct CleanupProcess {
    hub: Arc<Hub>,
    interval: Duration,
}

impl CleanupProcess {
    #[must_use]
    pub fn new(hub: Arc<Hub>, interval: Duration) -> Self {
        Self { hub, interval }
    }
}

#[async_trait]
impl HttpServerProcess for CleanupProcess {
    async fn pre_run(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn run(&self, token: CancellationToken) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                _ = ticker.tick() => {
                    self.hub.cleanup_pass().await;
                }
            }
        }
    }
}
