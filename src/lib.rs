// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod clock;
pub mod config;
pub mod metrics;
pub mod service;
pub mod stats;
pub mod store;
pub mod transaction;
pub mod window;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::config::Config;
pub use crate::service::StatsService;
pub use crate::stats::Statistics;
pub use crate::transaction::ValidationError;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tracing::info;

/// Build the full HTTP application for `cfg`, reading time from `clock`.
///
/// Installs the Prometheus recorder first when the metrics route is enabled,
/// so the service's gauges land in it.
pub fn build_app(cfg: &Config, clock: Arc<dyn Clock>) -> anyhow::Result<Router> {
    let metrics = if cfg.metrics_route {
        Some(crate::metrics::Metrics::init()?)
    } else {
        None
    };

    let service = StatsService::new(cfg.window(), clock).context("building stats service")?;
    info!(
        window_secs = service.window_secs(),
        metrics_route = cfg.metrics_route,
        "stats service ready"
    );

    Ok(api::create_router(
        AppState::new(service),
        cfg,
        metrics.as_ref(),
    ))
}

/// Load configuration from the environment and build the app on the wall clock.
pub fn app() -> anyhow::Result<Router> {
    let cfg = Config::load()?;
    build_app(&cfg, Arc::new(SystemClock))
}
