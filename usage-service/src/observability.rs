use std::net::SocketAddr;

use axum::{routing::get, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static PROM_HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("usage_service=info".parse().unwrap_or_else(|_| "info".parse().unwrap()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Install the Prometheus recorder and serve `/metrics` from a spawned task.
/// Call at most once, before any counters are touched.
pub fn init_metrics(bind_addr: &str) -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);

    let addr: SocketAddr = bind_addr.parse()?;

    tokio::spawn(async move {
        if let Err(e) = serve_metrics(addr).await {
            tracing::error!(error = %e, "metrics endpoint failed");
        }
    });

    Ok(())
}

async fn serve_metrics(addr: SocketAddr) -> anyhow::Result<()> {
    let app = Router::new().route("/metrics", get(render_metrics));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

async fn render_metrics() -> String {
    match PROM_HANDLE.get() {
        Some(handle) => handle.render(),
        None => String::new(),
    }
}
