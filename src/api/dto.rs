//! Data Transfer Objects
//!
//! Response bodies of the API that are not table rows.

use serde::{Deserialize, Serialize};

/// Body of `DELETE /rest/v1/:table`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteResponse {
    pub deleted: u64,
}

/// Full health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: StoreHealth,
    pub realtime: RealtimeHealth,
    pub uptime_seconds: u64,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreHealth {
    pub dashboards: usize,
    pub dashboard_widgets: usize,
    /// Whether rows are written to a snapshot file
    pub persistent: bool,
    /// Unsaved changes are pending
    pub dirty: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeHealth {
    pub subscriptions: usize,
}
