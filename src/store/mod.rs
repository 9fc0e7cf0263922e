//! Table Store
//!
//! The boundary to the persistent backend: table-style operations against
//! two logical tables plus typed helpers on top.
//!
//! - **query**: equality filters, ordering, limit and their wire form
//! - **memory**: in-process store with change notifications and optional
//!   JSON snapshot persistence (also what `insightdeck-api` serves)
//! - **rest**: HTTP client for a remote store
//! - **error**: error types
//!
//! # Example
//!
//! ```rust
//! use insightdeck::model::{Dashboard, NewDashboard};
//! use insightdeck::store::{insert_record, select_records, MemoryStore, Query};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new();
//!
//!     let created: Dashboard = insert_record(&store, &NewDashboard::new("u1", "Sales")).await?;
//!     let listed: Vec<Dashboard> =
//!         select_records(&store, &Query::new().eq("user_id", "u1")).await?;
//!
//!     assert_eq!(listed, vec![created]);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod memory;
pub mod query;
pub mod rest;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use query::{Filter, Order, Query};
pub use rest::{RestConfig, RestStore};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::model::{Dashboard, Widget};

/// Logical tables of the backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Dashboards,
    DashboardWidgets,
}

impl Table {
    pub fn all() -> &'static [Table] {
        &[Table::Dashboards, Table::DashboardWidgets]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Dashboards => "dashboards",
            Table::DashboardWidgets => "dashboard_widgets",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dashboards" => Ok(Table::Dashboards),
            "dashboard_widgets" => Ok(Table::DashboardWidgets),
            other => Err(StoreError::UnknownTable(other.to_string())),
        }
    }
}

/// Table-oriented persistent store
///
/// Rows travel as JSON objects; the typed helpers below decode them.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Rows matching the query, ordered and limited as requested
    async fn select(&self, table: Table, query: &Query) -> StoreResult<Vec<Value>>;

    /// Insert one row and return it as stored (with generated columns)
    async fn insert(&self, table: Table, row: Value) -> StoreResult<Value>;

    /// Merge `patch` into every matching row and return the updated rows
    async fn update(&self, table: Table, query: &Query, patch: Value) -> StoreResult<Vec<Value>>;

    /// Delete matching rows and return how many were removed
    async fn delete(&self, table: Table, query: &Query) -> StoreResult<u64>;
}

/// A record type stored in one table
pub trait Record: DeserializeOwned {
    const TABLE: Table;

    fn id(&self) -> &str;
}

impl Record for Dashboard {
    const TABLE: Table = Table::Dashboards;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Record for Widget {
    const TABLE: Table = Table::DashboardWidgets;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Select and decode records
///
/// Rows that fail to decode (for example a widget type this build does not
/// know) are skipped with a warning instead of failing the whole fetch.
pub async fn select_records<R: Record>(
    store: &dyn TableStore,
    query: &Query,
) -> StoreResult<Vec<R>> {
    let rows = store.select(R::TABLE, query).await?;
    Ok(decode_rows(R::TABLE, rows))
}

/// Insert a row and decode the stored record
pub async fn insert_record<R, N>(store: &dyn TableStore, new: &N) -> StoreResult<R>
where
    R: Record,
    N: Serialize + Sync,
{
    let row = serde_json::to_value(new)?;
    let stored = store.insert(R::TABLE, row).await?;
    Ok(serde_json::from_value(stored)?)
}

/// Delete a record by id
pub async fn delete_by_id(store: &dyn TableStore, table: Table, id: &str) -> StoreResult<u64> {
    store.delete(table, &Query::new().eq("id", id)).await
}

fn decode_rows<R: Record>(table: Table, rows: Vec<Value>) -> Vec<R> {
    let total = rows.len();
    let records: Vec<R> = rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value::<R>(row) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "Skipping undecodable row");
                None
            }
        })
        .collect();

    if records.len() < total {
        tracing::debug!(
            table = %table,
            decoded = records.len(),
            skipped = total - records.len(),
            "Decoded rows"
        );
    }

    records
}
