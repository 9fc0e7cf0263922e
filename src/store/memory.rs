//! In-Memory Table Store
//!
//! Holds both tables in memory, publishes every change to a `ChangeHub`
//! and can persist a JSON snapshot to disk.
//!
//! Column defaults and constraints mirror the hosted schema:
//!
//! | table               | generated                          | required                       |
//! |---------------------|------------------------------------|--------------------------------|
//! | `dashboards`        | `id`, `created_at`, `layout`, `is_public`, `description` | `user_id`, `name` |
//! | `dashboard_widgets` | `id`, `created_at`, `config`, `position`, `dataset_id`   | `dashboard_id` (must exist), `title`, `widget_type` |
//!
//! Deleting a dashboard cascades to its widgets.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::{StoreError, StoreResult};
use super::query::Query;
use super::{Table, TableStore};
use crate::realtime::{ChangeEvent, ChangeFeed, ChangeHub, HubConfig, Subscription, Topic};

/// Snapshot file format
#[derive(Serialize, Deserialize, Default)]
struct StoreSnapshot {
    /// Version for future compatibility
    version: u32,
    dashboards: Vec<Value>,
    dashboard_widgets: Vec<Value>,
}

#[derive(Default)]
struct Tables {
    dashboards: Vec<Value>,
    widgets: Vec<Value>,
    /// Last generated `created_at`, kept strictly increasing
    last_created: Option<DateTime<Utc>>,
}

impl Tables {
    fn rows(&self, table: Table) -> &Vec<Value> {
        match table {
            Table::Dashboards => &self.dashboards,
            Table::DashboardWidgets => &self.widgets,
        }
    }

    fn rows_mut(&mut self, table: Table) -> &mut Vec<Value> {
        match table {
            Table::Dashboards => &mut self.dashboards,
            Table::DashboardWidgets => &mut self.widgets,
        }
    }

    fn next_created_at(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_created {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_created = Some(now);
        now
    }

    fn has_row(&self, table: Table, id: &str) -> bool {
        self.rows(table)
            .iter()
            .any(|r| r.get("id").and_then(Value::as_str) == Some(id))
    }
}

/// In-process table store with change notifications
pub struct MemoryStore {
    tables: RwLock<Tables>,
    hub: Arc<ChangeHub>,
    /// Snapshot file, if persistence is enabled
    path: Option<PathBuf>,
    /// Modified since last persist
    dirty: AtomicBool,
}

impl MemoryStore {
    /// Create an empty, non-persistent store
    pub fn new() -> Self {
        Self::with_hub_config(HubConfig::default())
    }

    /// Create an empty store with a custom hub configuration
    pub fn with_hub_config(config: HubConfig) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            hub: Arc::new(ChangeHub::new(config)),
            path: None,
            dirty: AtomicBool::new(false),
        }
    }

    /// Create or load a store persisted at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let snapshot = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            serde_json::from_reader::<_, StoreSnapshot>(reader).map_err(|e| {
                StoreError::Serialization(format!("Failed to load store snapshot: {}", e))
            })?
        } else {
            StoreSnapshot::default()
        };

        tracing::info!(
            path = %path.display(),
            dashboards = snapshot.dashboards.len(),
            widgets = snapshot.dashboard_widgets.len(),
            "Opened store"
        );

        let store = Self::new();
        let tables = Tables {
            dashboards: snapshot.dashboards,
            widgets: snapshot.dashboard_widgets,
            last_created: None,
        };

        Ok(Self {
            tables: RwLock::new(tables),
            path: Some(path),
            ..store
        })
    }

    /// The hub change notifications are published to
    pub fn hub(&self) -> Arc<ChangeHub> {
        Arc::clone(&self.hub)
    }

    /// Snapshot file path, if persistence is enabled
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Check if there are unsaved changes
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Number of rows in a table
    pub async fn row_count(&self, table: Table) -> usize {
        self.tables.read().await.rows(table).len()
    }

    /// Write the snapshot file if persistence is enabled and data changed
    pub async fn persist(&self) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let snapshot = {
            let tables = self.tables.read().await;
            StoreSnapshot {
                version: 1,
                dashboards: tables.dashboards.clone(),
                dashboard_widgets: tables.widgets.clone(),
            }
        };

        let result = write_snapshot(path, &snapshot);
        if result.is_err() {
            self.dirty.store(true, Ordering::SeqCst);
        } else {
            tracing::debug!(path = %path.display(), "Persisted store snapshot");
        }
        result
    }

    /// Start a background task that persists at a fixed interval
    pub fn start_background_persist(
        self: &Arc<Self>,
        interval: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = store.persist().await {
                    tracing::error!(error = %e, "Background persist failed");
                }
            }
        })
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    fn publish(&self, events: &[ChangeEvent]) {
        for event in events {
            self.hub.publish(event);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn write_snapshot(path: &Path, snapshot: &StoreSnapshot) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Write to a sibling file first so a crash never leaves a torn snapshot
    let tmp = path.with_extension("json.tmp");
    {
        let writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer_pretty(writer, snapshot).map_err(|e| {
            StoreError::Serialization(format!("Failed to persist store snapshot: {}", e))
        })?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn into_object(row: Value) -> StoreResult<Map<String, Value>> {
    match row {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Validation(format!(
            "row must be a JSON object, got {}",
            other
        ))),
    }
}

fn require_text(row: &Map<String, Value>, column: &str) -> StoreResult<String> {
    match row.get(column).and_then(Value::as_str).map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(StoreError::Validation(format!(
            "column '{}' is required",
            column
        ))),
    }
}

/// Fill generated columns and check constraints for a new row
fn prepare_insert(tables: &mut Tables, table: Table, row: Value) -> StoreResult<Value> {
    let mut row = into_object(row)?;

    match table {
        Table::Dashboards => {
            require_text(&row, "user_id")?;
            require_text(&row, "name")?;
            row.entry("description").or_insert(Value::Null);
            row.entry("layout").or_insert_with(|| json!([]));
            row.entry("is_public").or_insert(Value::Bool(false));
        }
        Table::DashboardWidgets => {
            let dashboard_id = require_text(&row, "dashboard_id")?;
            require_text(&row, "title")?;
            require_text(&row, "widget_type")?;
            if !tables.has_row(Table::Dashboards, &dashboard_id) {
                return Err(StoreError::Validation(format!(
                    "dashboard '{}' does not exist",
                    dashboard_id
                )));
            }
            row.entry("config").or_insert_with(|| json!({}));
            row.entry("position")
                .or_insert_with(|| json!({"x": 0, "y": 0, "w": 6, "h": 4}));
            row.entry("dataset_id").or_insert(Value::Null);
        }
    }

    let id = match row.get("id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => Uuid::new_v4().to_string(),
    };
    if tables.has_row(table, &id) {
        return Err(StoreError::Validation(format!(
            "duplicate key: {} '{}' already exists",
            table, id
        )));
    }
    row.insert("id".to_string(), Value::String(id));

    if row.get("created_at").map_or(true, Value::is_null) {
        let created_at = tables
            .next_created_at()
            .to_rfc3339_opts(SecondsFormat::Micros, true);
        row.insert("created_at".to_string(), Value::String(created_at));
    }

    Ok(Value::Object(row))
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn select(&self, table: Table, query: &Query) -> StoreResult<Vec<Value>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Value> = tables
            .rows(table)
            .iter()
            .filter(|row| query.matches(row))
            .cloned()
            .collect();
        drop(tables);

        query.arrange(&mut rows);
        Ok(rows)
    }

    async fn insert(&self, table: Table, row: Value) -> StoreResult<Value> {
        let stored = {
            let mut tables = self.tables.write().await;
            let stored = prepare_insert(&mut tables, table, row)?;
            tables.rows_mut(table).push(stored.clone());
            stored
        };

        self.mark_dirty();
        tracing::debug!(table = %table, id = ?stored.get("id"), "Inserted row");
        self.publish(&[ChangeEvent::insert(table, stored.clone())]);

        Ok(stored)
    }

    async fn update(&self, table: Table, query: &Query, patch: Value) -> StoreResult<Vec<Value>> {
        let patch = into_object(patch)?;
        if patch.contains_key("id") {
            return Err(StoreError::Validation("column 'id' cannot be updated".to_string()));
        }

        let events: Vec<ChangeEvent> = {
            let mut tables = self.tables.write().await;
            let mut events = Vec::new();
            for row in tables.rows_mut(table).iter_mut() {
                if !query.matches(row) {
                    continue;
                }
                let old = row.clone();
                if let Value::Object(map) = row {
                    for (column, value) in &patch {
                        map.insert(column.clone(), value.clone());
                    }
                }
                events.push(ChangeEvent::update(table, old, row.clone()));
            }
            events
        };

        if !events.is_empty() {
            self.mark_dirty();
            self.publish(&events);
        }

        let mut updated: Vec<Value> = events.into_iter().filter_map(|e| e.new).collect();
        query.arrange(&mut updated);
        Ok(updated)
    }

    async fn delete(&self, table: Table, query: &Query) -> StoreResult<u64> {
        let (removed, cascaded) = {
            let mut tables = self.tables.write().await;

            let rows = std::mem::take(tables.rows_mut(table));
            let (removed, kept): (Vec<Value>, Vec<Value>) =
                rows.into_iter().partition(|row| query.matches(row));
            *tables.rows_mut(table) = kept;

            let mut cascaded = Vec::new();
            if table == Table::Dashboards && !removed.is_empty() {
                let ids: Vec<&str> = removed
                    .iter()
                    .filter_map(|r| r.get("id").and_then(Value::as_str))
                    .collect();
                let widgets = std::mem::take(&mut tables.widgets);
                let (gone, kept): (Vec<Value>, Vec<Value>) = widgets.into_iter().partition(|w| {
                    w.get("dashboard_id")
                        .and_then(Value::as_str)
                        .map_or(false, |d| ids.contains(&d))
                });
                tables.widgets = kept;
                cascaded = gone;
            }

            (removed, cascaded)
        };

        let count = removed.len() as u64;
        if count == 0 {
            return Ok(0);
        }

        self.mark_dirty();
        tracing::debug!(
            table = %table,
            removed = count,
            cascaded = cascaded.len(),
            "Deleted rows"
        );

        let events: Vec<ChangeEvent> = cascaded
            .into_iter()
            .map(|row| ChangeEvent::delete(Table::DashboardWidgets, row))
            .chain(removed.into_iter().map(|row| ChangeEvent::delete(table, row)))
            .collect();
        self.publish(&events);

        Ok(count)
    }
}

#[async_trait]
impl ChangeFeed for MemoryStore {
    async fn subscribe(&self, topic: Topic) -> StoreResult<Subscription> {
        self.hub
            .subscribe(topic)
            .map_err(|e| StoreError::Realtime(e.to_string()))
    }
}
