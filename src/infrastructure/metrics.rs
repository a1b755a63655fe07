//! Metrics exporter wiring (SPEC_FULL §12). Each binary installs its own
//! Prometheus endpoint; `metrics::counter!`/`histogram!` call sites live in
//! the services (`generator_worker_service`) that own the measurements.

use anyhow::{Context, Result};

/// Installs a Prometheus recorder with its own HTTP listener, as the pack's
/// `flowcatalyst` manifest pairs `metrics` with `metrics-exporter-prometheus`
/// (DESIGN.md dependency note). Call once per binary at startup.
pub fn install_prometheus_exporter(listen_addr: &str) -> Result<()> {
    let addr: std::net::SocketAddr = listen_addr
        .parse()
        .with_context(|| format!("invalid metrics listen address: {listen_addr}"))?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install Prometheus metrics exporter")?;

    tracing::info!(%listen_addr, "metrics exporter listening");
    Ok(())
}
