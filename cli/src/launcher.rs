use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use engine::WiringConfig;
use hub::HeaderSessionResolver;
use sqlx::postgres::PgPoolOptions;
use tools::http::http_server::{HttpServer, HttpServerConfig};
use wire::Database;

use crate::config::Config;
use crate::ui;

pub async fn start(config_path: PathBuf) -> Result<()> {
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            ui::print_config_error(&config_path, &e);
            return Ok(());
        }
    };

    let pool = PgPoolOptions::new()
        .connect(&config.database.dsn)
        .await
        .with_context(|| "failed to connect to the database")?;
    let db = Database::new(pool);

    let wiring = engine::build(
        WiringConfig {
            notification_dsn: config.database.notification_dsn.clone(),
            hub_addr: config.hub.addr.clone(),
            hub_path: config.hub.path.clone(),
            local_events: config.broker.local_events.clone(),
            broker_loop_pause: config.broker_loop_pause(),
            max_method_call_duration: config.max_method_call_duration(),
            cleanup_interval: config.cleanup_interval(),
            is_production: config.general.is_production,
        },
        db,
        Arc::new(HeaderSessionResolver::default()),
        None,
        |_dispatcher| {
            // Host handler types register themselves here, before the
            // dispatcher is frozen (§5).
        },
    );

    let server_config = HttpServerConfig {
        addr: config.general.server_addr.clone(),
        metrics_addr: config.general.metrics_addr.clone(),
        ..Default::default()
    };

    HttpServer::from_config(server_config)
        .with_processes(wiring.processes)
        .run()
        .await
        .context("HTTP server failed")
}
