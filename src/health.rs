//! Liveness endpoint for hosting platforms that idle silent processes

use crate::error::Result;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use tracing::info;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
}

pub async fn health_status() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
    })
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(health_status))
        .route("/health", get(health_status))
}

/// Serve the liveness routes on all interfaces until the process exits
pub async fn serve(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Health endpoint listening on {}", addr);
    axum::serve(listener, router()).await?;
    Ok(())
}
