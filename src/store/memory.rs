//! In-memory store with PostgREST semantics.
//!
//! Backs the integration tests and the offline `--snapshot` mode. Tables keep
//! a column set so that selecting a column that does not exist fails the way
//! PostgREST does; unknown tables and procedures answer with 404.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Mutex;

use super::query::compare;
use super::{DataStore, Query, Row};
use crate::error::{AuditError, StoreError};

#[derive(Debug, Clone, Default)]
struct Table {
    columns: BTreeSet<String>,
    rows: Vec<Row>,
}

/// On-disk snapshot: `{"tables": {...}, "columns": {...}, "procedures": {...}}`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Snapshot {
    pub tables: BTreeMap<String, Vec<Row>>,
    /// Declared columns, for tables whose rows do not show every column
    pub columns: BTreeMap<String, Vec<String>>,
    /// Procedure name to the value a call returns
    pub procedures: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<String, Table>,
    procedures: HashMap<String, Value>,
    failures: HashMap<String, String>,
    max_rows: Option<usize>,
    schema_rejection: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a parsed snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut store = MemoryStore::new();
        for (name, rows) in snapshot.tables {
            store.insert_rows(&name, rows);
        }
        for (name, columns) in snapshot.columns {
            let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
            store.declare_columns(&name, &columns);
        }
        for (name, result) in snapshot.procedures {
            store.register_procedure(&name, result);
        }
        store
    }

    /// Load a snapshot JSON file.
    pub fn load(path: &Path) -> Result<Self, AuditError> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&content)?;
        log::info!(
            "[Store] Loaded snapshot {} ({} table(s))",
            path.display(),
            snapshot.tables.len()
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Create the table if needed and make sure `columns` exist on it.
    pub fn declare_columns(&mut self, table: &str, columns: &[&str]) -> &mut Self {
        let entry = self.tables.entry(table.to_string()).or_default();
        entry.columns.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    /// Append rows, widening the table's column set with their keys.
    pub fn insert_rows(&mut self, table: &str, rows: impl IntoIterator<Item = Row>) -> &mut Self {
        let entry = self.tables.entry(table.to_string()).or_default();
        for row in rows {
            entry.columns.extend(row.keys().cloned());
            entry.rows.push(row);
        }
        self
    }

    /// Convenience for JSON object literals; non-object values are ignored.
    pub fn insert_json(&mut self, table: &str, rows: impl IntoIterator<Item = Value>) -> &mut Self {
        let rows: Vec<Row> = rows
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        self.insert_rows(table, rows)
    }

    pub fn register_procedure(&mut self, name: &str, result: Value) -> &mut Self {
        self.procedures.insert(name.to_string(), result);
        self
    }

    /// Every select against `table` fails with a non-API error.
    pub fn fail_table(&mut self, table: &str, message: &str) -> &mut Self {
        self.failures.insert(table.to_string(), message.to_string());
        self
    }

    /// Procedure introspection answers with a 401 carrying `message`.
    pub fn reject_schema(&mut self, message: &str) -> &mut Self {
        self.schema_rejection = Some(message.to_string());
        self
    }

    /// Cap every select response at `max` rows, like PostgREST's `max-rows`.
    pub fn cap_rows(&mut self, max: usize) -> &mut Self {
        self.max_rows = Some(max);
        self
    }

    /// Operations served so far, as `select:<table>`, `rpc:<name>` and
    /// `introspect:<name>`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn note(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

fn sort_rows(rows: &mut [Row], column: &str, ascending: bool) {
    // Postgres defaults: ASC NULLS LAST, DESC NULLS FIRST
    rows.sort_by(|a, b| {
        let left = a.get(column).unwrap_or(&Value::Null);
        let right = b.get(column).unwrap_or(&Value::Null);
        let ordering = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => compare(left, right).unwrap_or(Ordering::Equal),
        };
        if ascending {
            ordering
        } else {
            ordering.reverse()
        }
    });
}

#[async_trait]
impl DataStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn select(&self, query: &Query) -> Result<Vec<Row>, StoreError> {
        self.note(format!("select:{}", query.table));

        if let Some(message) = self.failures.get(&query.table) {
            return Err(StoreError::Injected(message.clone()));
        }

        let table = self.tables.get(&query.table).ok_or_else(|| StoreError::Api {
            status: 404,
            message: format!("relation \"public.{}\" does not exist", query.table),
        })?;

        if let Some(missing) = query.columns.iter().find(|c| !table.columns.contains(*c)) {
            return Err(StoreError::Api {
                status: 400,
                message: format!("column {}.{} does not exist", query.table, missing),
            });
        }

        let mut rows: Vec<Row> = table
            .rows
            .iter()
            .filter(|row| query.matches(row))
            .cloned()
            .collect();

        if let Some((column, ascending)) = &query.order {
            sort_rows(&mut rows, column, *ascending);
        }
        if let Some(offset) = query.offset {
            rows.drain(..offset.min(rows.len()));
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        if let Some(max) = self.max_rows {
            rows.truncate(max);
        }

        if query.columns.is_empty() {
            return Ok(rows);
        }
        Ok(rows
            .into_iter()
            .map(|row| {
                query
                    .columns
                    .iter()
                    .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect())
    }

    async fn rpc(&self, procedure: &str, _args: &Value) -> Result<Value, StoreError> {
        self.note(format!("rpc:{}", procedure));
        self.procedures
            .get(procedure)
            .cloned()
            .ok_or_else(|| StoreError::Api {
                status: 404,
                message: format!("Could not find the function public.{}", procedure),
            })
    }

    async fn procedure_exists(&self, procedure: &str) -> Result<bool, StoreError> {
        self.note(format!("introspect:{}", procedure));
        if let Some(message) = &self.schema_rejection {
            return Err(StoreError::Api {
                status: 401,
                message: message.clone(),
            });
        }
        Ok(self.procedures.contains_key(procedure))
    }
}
