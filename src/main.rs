//! slservices - Straylight network services
//!
//! A P10 services server: links to an ircu-family hub, mirrors the network
//! and hosts the service modules.

mod config;
mod db;
mod error;
mod http;
mod metrics;
mod security;
mod services;
mod state;
mod sync;
mod telemetry;

use crate::config::Config;
use crate::db::{Database, ServiceStore};
use crate::security::TrustCheck;
use crate::services::ModuleRouter;
use crate::state::StateStore;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "services.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(anyhow::anyhow!(
            "{} configuration error(s) in {}",
            errors.len(),
            config_path
        ));
    }

    info!(
        server = %config.server.name,
        numeric = %config.server.numeric,
        uplink = %config.uplink.address,
        "Starting slservices"
    );

    // Persistent store
    let db = Database::new(&config.database.path).await?;
    let store: Arc<dyn ServiceStore> = Arc::new(db);

    let trust = Arc::new(TrustCheck::load(&config.trust_check, store.as_ref()).await);
    info!(
        rules = trust.rule_count(),
        evaluator = trust.is_evaluator(),
        "Trust-check ready"
    );

    let mut modules = ModuleRouter::from_config(&config.modules);
    modules.post_load_initialization(store.as_ref()).await?;
    info!(modules = ?modules.enabled_names(), "Service modules loaded");

    // Prometheus metrics are optional.
    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    let metrics_port = config.server.metrics_port.unwrap_or(9090);
    if metrics_port == 0 {
        info!("Prometheus HTTP server disabled (metrics_port = 0)");
    } else {
        metrics::init();
        tokio::spawn(async move {
            http::run_http_server(metrics_port).await;
        });
        info!(port = metrics_port, "Prometheus HTTP server started");
    }

    let state = Arc::new(StateStore::new());
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };

    match sync::run_link(&config, state, store, modules, trust, shutdown).await {
        Ok(()) => {
            info!("Services stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, code = e.error_code(), "Uplink session ended");
            Err(e.into())
        }
    }
}
