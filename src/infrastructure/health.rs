//! Liveness endpoint (SPEC_FULL §13): every binary exposes `GET /healthz`
//! via a tiny `axum::Router`, grounded on the teacher's `health_check`
//! handler in `main.rs`. This is ops ambient stack, not the gameplay HTTP
//! surface the spec scopes out (§1 Non-goals).

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router() -> Router {
    Router::new().route("/healthz", get(health_check))
}

/// Binds and serves the liveness router until the process exits; spawned
/// as a background task by each binary's `main`.
pub async fn serve(listen_addr: &str) -> anyhow::Result<()> {
    let addr: std::net::SocketAddr = listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%listen_addr, "liveness endpoint listening");
    axum::serve(listener, router()).await?;
    Ok(())
}
