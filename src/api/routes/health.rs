//! Health Routes
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (ready to serve traffic)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{HealthResponse, RealtimeHealth, StoreHealth};
use crate::api::state::AppState;
use crate::store::Table;

/// GET /health/live
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Ready once the snapshot directory (if any) is present.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    if store_writable(&state) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let writable = store_writable(&state);

    Json(HealthResponse {
        status: if writable { "healthy" } else { "degraded" }.to_string(),
        store: StoreHealth {
            dashboards: state.store.row_count(Table::Dashboards).await,
            dashboard_widgets: state.store.row_count(Table::DashboardWidgets).await,
            persistent: state.store.path().is_some(),
            dirty: state.store.is_dirty(),
        },
        realtime: RealtimeHealth {
            subscriptions: state.hub.subscription_count(),
        },
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn store_writable(state: &AppState) -> bool {
    match state.store.path().and_then(|p| p.parent()) {
        Some(dir) if !dir.as_os_str().is_empty() => dir.is_dir(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }
}
