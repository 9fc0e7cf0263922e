//! Table queries
//!
//! A `Query` is a conjunction of equality filters plus an optional ordering
//! and limit. It has one wire form, PostgREST-style query parameters:
//!
//! ```text
//! ?user_id=eq.4f1c&order=created_at.desc&limit=20
//! ```
//!
//! The same `Filter` text (`user_id=eq.4f1c`) scopes change-feed topics.

use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::error::{StoreError, StoreResult};

/// Equality filter on one column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Filter {
    pub column: String,
    pub value: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Parse the value half of a query parameter (`eq.<value>`)
    pub fn from_param(column: &str, param: &str) -> StoreResult<Self> {
        let value = param.strip_prefix("eq.").ok_or_else(|| {
            StoreError::InvalidQuery(format!(
                "unsupported operator in '{}={}' (only eq is supported)",
                column, param
            ))
        })?;

        if column.is_empty() {
            return Err(StoreError::InvalidQuery("empty column name".to_string()));
        }

        Ok(Self::eq(column, value))
    }

    /// Check whether a row satisfies this filter
    pub fn matches(&self, row: &Value) -> bool {
        row.get(&self.column)
            .map(|v| value_text(v) == self.value)
            .unwrap_or(false)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=eq.{}", self.column, self.value)
    }
}

impl FromStr for Filter {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (column, param) = s
            .split_once('=')
            .ok_or_else(|| StoreError::InvalidQuery(format!("malformed filter '{}'", s)))?;
        Self::from_param(column.trim(), param.trim())
    }
}

/// Sort order on one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    fn to_param(&self) -> String {
        format!(
            "{}.{}",
            self.column,
            if self.ascending { "asc" } else { "desc" }
        )
    }

    fn from_param(param: &str) -> StoreResult<Self> {
        let (column, direction) = match param.rsplit_once('.') {
            Some((c, "asc")) => (c, true),
            Some((c, "desc")) => (c, false),
            _ => (param, true),
        };

        if column.is_empty() {
            return Err(StoreError::InvalidQuery(format!("malformed order '{}'", param)));
        }

        Ok(Self {
            column: column.to_string(),
            ascending: direction,
        })
    }
}

/// Select / update / delete criteria
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    /// Query matching every row
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: add an equality filter
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    /// Builder method: set ordering
    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    /// Builder method: cap the number of rows
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check whether a row satisfies every filter
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Sort rows in place by the query's ordering (stable), then apply the limit
    pub fn arrange(&self, rows: &mut Vec<Value>) {
        if let Some(order) = &self.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(a.get(&order.column), b.get(&order.column));
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
    }

    /// Encode as query parameters
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = self
            .filters
            .iter()
            .map(|f| (f.column.clone(), format!("eq.{}", f.value)))
            .collect();

        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.to_param()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }

    /// Decode from query parameters
    pub fn from_params<I, K, V>(params: I) -> StoreResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut query = Query::new();

        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "order" => query.order = Some(Order::from_param(value)?),
                "limit" => {
                    let limit = value.parse().map_err(|_| {
                        StoreError::InvalidQuery(format!("invalid limit '{}'", value))
                    })?;
                    query.limit = Some(limit);
                }
                // PostgREST column projection; every column is always returned
                "select" => {}
                column => query.filters.push(Filter::from_param(column, value)?),
            }
        }

        Ok(query)
    }
}

/// Text form of a JSON value used for equality filters
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Ordering between two column values
///
/// Timestamps compare as instants, numbers numerically, everything else by
/// text. Missing and null values sort last.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (parse_timestamp(x), parse_timestamp(y)) {
                (Some(tx), Some(ty)) => tx.cmp(&ty),
                _ => x.cmp(y),
            }
        }
        (Some(x), Some(y)) => value_text(x).cmp(&value_text(y)),
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok()
}
