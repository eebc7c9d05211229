//! Informational HTTP endpoint.
//!
//! `GET /` returns a static description of the worker. It never reflects
//! run outcomes and has no side effects.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::signal::ShutdownToken;

/// Body of `GET /`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub schedule: String,
    pub list_name: String,
    pub started_at: DateTime<Utc>,
}

impl StatusInfo {
    pub fn new(schedule: impl Into<String>, list_name: impl Into<String>) -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            schedule: schedule.into(),
            list_name: list_name.into(),
            started_at: Utc::now(),
        }
    }
}

async fn status_handler(State(status): State<Arc<StatusInfo>>) -> Json<StatusInfo> {
    Json(status.as_ref().clone())
}

pub fn router(status: StatusInfo) -> Router {
    Router::new()
        .route("/", get(status_handler))
        .with_state(Arc::new(status))
}

/// Serve the status endpoint until `shutdown` is cancelled
pub async fn serve(addr: SocketAddr, status: StatusInfo, shutdown: ShutdownToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind status server on {}", addr))?;

    info!("Status endpoint listening on http://{}", addr);

    axum::serve(listener, router(status))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Status server error")?;

    info!("Status endpoint stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_info_fields() {
        let status = StatusInfo::new("1h", "relay_egress");
        assert_eq!(status.name, "relaysync");
        assert_eq!(status.version, env!("CARGO_PKG_VERSION"));

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["schedule"], "1h");
        assert_eq!(json["list_name"], "relay_egress");
        assert!(json["started_at"].is_string());
    }

    #[tokio::test]
    async fn test_status_handler_is_static() {
        let status = Arc::new(StatusInfo::new("30m", "relay"));
        let Json(first) = status_handler(State(Arc::clone(&status))).await;
        let Json(second) = status_handler(State(Arc::clone(&status))).await;
        assert_eq!(first, second);
        assert_eq!(first.schedule, "30m");
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let shutdown = ShutdownToken::new();
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let handle = tokio::spawn(serve(addr, StatusInfo::new("1h", "relay"), shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("server should stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
