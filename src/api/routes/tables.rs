//! Table Routes
//!
//! PostgREST-style access to the tables:
//!
//! - GET /rest/v1/:table?<col>=eq.<v>&order=<col>.<asc|desc>&limit=<n>
//! - POST /rest/v1/:table - insert one row, `201` with the stored row
//! - PATCH /rest/v1/:table?<filters> - merge the body into matching rows
//! - DELETE /rest/v1/:table?<filters> - `{"deleted": n}`

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use std::sync::Arc;

use crate::api::dto::DeleteResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::store::{self, Table, TableStore};

type Params = Query<Vec<(String, String)>>;

fn parse_request(table: &str, params: Vec<(String, String)>) -> ApiResult<(Table, store::Query)> {
    let table: Table = table.parse()?;
    let query = store::Query::from_params(params)?;
    Ok((table, query))
}

/// Unfiltered writes would touch every row of the table
fn require_filter(query: &store::Query, method: &str) -> ApiResult<()> {
    if query.filters.is_empty() {
        return Err(ApiError::Validation(format!(
            "{} requires at least one filter",
            method
        )));
    }
    Ok(())
}

/// GET /rest/v1/:table
pub async fn select_rows(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Params,
) -> ApiResult<Json<Vec<Value>>> {
    let (table, query) = parse_request(&table, params)?;
    let rows = state.store.select(table, &query).await?;

    tracing::debug!(table = %table, query = ?query, rows = rows.len(), "Select");
    Ok(Json(rows))
}

/// POST /rest/v1/:table
pub async fn insert_row(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Json(row): Json<Value>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let table: Table = table.parse()?;
    let stored = state.store.insert(table, row).await?;

    tracing::info!(table = %table, id = ?stored.get("id"), "Row inserted");
    Ok((StatusCode::CREATED, Json(stored)))
}

/// PATCH /rest/v1/:table
pub async fn update_rows(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Params,
    Json(patch): Json<Value>,
) -> ApiResult<Json<Vec<Value>>> {
    let (table, query) = parse_request(&table, params)?;
    require_filter(&query, "PATCH")?;

    let rows = state.store.update(table, &query, patch).await?;

    tracing::info!(table = %table, query = ?query, rows = rows.len(), "Rows updated");
    Ok(Json(rows))
}

/// DELETE /rest/v1/:table
pub async fn delete_rows(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Params,
) -> ApiResult<Json<DeleteResponse>> {
    let (table, query) = parse_request(&table, params)?;
    require_filter(&query, "DELETE")?;

    let deleted = state.store.delete(table, &query).await?;

    tracing::info!(table = %table, query = ?query, deleted, "Rows deleted");
    Ok(Json(DeleteResponse { deleted }))
}
