//! Transaction Stats Service — Binary Entrypoint
//! Boots the Axum HTTP server, wiring config, tracing, shared state, and
//! graceful shutdown.

use std::future::IntoFuture;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use transaction_stats::config::{Config, LogFormat};
use transaction_stats::{build_app, SystemClock};

/// `RUST_LOG` wins when set; otherwise the configured `LOG_LEVEL`.
fn init_tracing(cfg: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", cfg.log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    match cfg.log_format() {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Compact => registry.with(fmt::layer().compact()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("ctrl-c handler: {e:#}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("SIGTERM handler: {e:#}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "SIGINT", "shutdown requested"),
        _ = terminate => info!(signal = "SIGTERM", "shutdown requested"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();

    let cfg = Config::load()?;
    init_tracing(&cfg);

    let router = build_app(&cfg, Arc::new(SystemClock))?;

    let addr = cfg.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(
        %addr,
        read_timeout = ?cfg.server.read_timeout,
        write_timeout = ?cfg.server.write_timeout,
        idle_timeout = ?cfg.server.idle_timeout,
        "server started"
    );

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        let _ = stop_rx.await;
    });
    let mut server = tokio::spawn(server.into_future());

    tokio::select! {
        res = &mut server => {
            match res {
                Ok(Ok(())) => info!("server exited"),
                Ok(Err(e)) => error!("server error: {e:#}"),
                Err(e) => error!("server task failed: {e:#}"),
            }
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    let _ = stop_tx.send(());
    match tokio::time::timeout(cfg.server.shutdown_timeout, &mut server).await {
        Ok(_) => info!("server shut down cleanly"),
        Err(_) => {
            warn!(
                timeout = ?cfg.server.shutdown_timeout,
                "graceful shutdown timed out; aborting open connections"
            );
            server.abort();
        }
    }
    Ok(())
}
