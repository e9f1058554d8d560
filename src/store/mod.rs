//! Data-store collaborator: read-only access to the hosted Postgres tables.
//!
//! The audit only ever observes the store. `DataStore` therefore exposes reads
//! (`select`), calls to side-effect-free procedures (`rpc`) and procedure
//! introspection (`procedure_exists`); there is no write operation to misuse.
//!
//! Backends:
//! - `RestStore`: PostgREST over HTTP (production)
//! - `MemoryStore`: in-memory tables (tests and offline snapshots)

pub mod memory;
pub mod query;
pub mod rest;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use query::{Filter, Query};
pub use rest::RestStore;

/// Rows requested per page by `select_all`.
pub const PAGE_SIZE: usize = 1000;

/// One row as returned by the store: column name to JSON value.
pub type Row = Map<String, Value>;

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Short backend name for logs
    fn backend_tag(&self) -> &'static str;

    /// Rows of `query.table` matching every filter of `query`.
    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Every row matching `query`, fetched page by page.
    ///
    /// PostgREST silently caps responses (`max-rows`), so a single select can
    /// come back short. Pages advance by the rows actually received and stop at
    /// the first empty page. `query` should carry an order on a unique column.
    async fn select_all(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        let mut rows = Vec::new();
        loop {
            let page = query.clone().limit(PAGE_SIZE).offset(rows.len());
            let batch = self.select(&page).await?;
            if batch.is_empty() {
                break;
            }
            rows.extend(batch);
        }
        Ok(rows)
    }

    /// Call a server-side procedure that does not modify data.
    async fn rpc(&self, procedure: &str, args: &Value) -> Result<Value, StoreError>;

    /// Whether the store exposes `procedure`, without invoking it.
    async fn procedure_exists(&self, procedure: &str) -> Result<bool, StoreError>;
}

/// Decode raw rows into typed records.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, StoreError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(Value::Object(row))
                .map_err(|e| StoreError::Decode(e.to_string()))
        })
        .collect()
}

/// Render a cell for human-readable output (strings without quotes).
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}
