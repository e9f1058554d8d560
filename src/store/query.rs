//! PostgREST read queries.
//!
//! A `Query` renders to PostgREST query-string pairs for `RestStore` and is
//! evaluated directly against rows by `MemoryStore`, so both backends share one
//! definition of what a filter means.

use serde_json::Value;
use std::cmp::Ordering;

use super::Row;

/// One row predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Gt(String, Value),
    Lt(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
    NotNull(String),
    /// Disjunction of simple comparisons
    Or(Vec<Filter>),
}

impl Filter {
    fn column(&self) -> Option<&str> {
        match self {
            Filter::Eq(c, _)
            | Filter::Gt(c, _)
            | Filter::Lt(c, _)
            | Filter::In(c, _)
            | Filter::IsNull(c)
            | Filter::NotNull(c) => Some(c),
            Filter::Or(_) => None,
        }
    }

    /// Operator and operand in PostgREST syntax, e.g. `gt.0` or `not.is.null`.
    fn operand(&self) -> String {
        match self {
            Filter::Eq(_, v) => format!("eq.{}", render_scalar(v)),
            Filter::Gt(_, v) => format!("gt.{}", render_scalar(v)),
            Filter::Lt(_, v) => format!("lt.{}", render_scalar(v)),
            Filter::In(_, values) => {
                let items: Vec<String> = values.iter().map(render_list_item).collect();
                format!("in.({})", items.join(","))
            }
            Filter::IsNull(_) => "is.null".to_string(),
            Filter::NotNull(_) => "not.is.null".to_string(),
            Filter::Or(branches) => {
                let items: Vec<String> = branches
                    .iter()
                    .map(|b| match b.column() {
                        Some(column) => format!("{}.{}", column, b.operand()),
                        None => format!("or{}", b.operand()),
                    })
                    .collect();
                format!("({})", items.join(","))
            }
        }
    }

    /// Query-string pair for this filter.
    pub fn to_pair(&self) -> (String, String) {
        match self.column() {
            Some(column) => (column.to_string(), self.operand()),
            None => ("or".to_string(), self.operand()),
        }
    }

    /// Evaluate against a row. Absent columns behave as SQL NULL.
    pub fn matches(&self, row: &Row) -> bool {
        let cell = |c: &str| row.get(c).unwrap_or(&Value::Null);
        match self {
            Filter::Eq(c, v) => compare(cell(c), v) == Some(Ordering::Equal),
            Filter::Gt(c, v) => compare(cell(c), v) == Some(Ordering::Greater),
            Filter::Lt(c, v) => compare(cell(c), v) == Some(Ordering::Less),
            Filter::In(c, values) => values
                .iter()
                .any(|v| compare(cell(c), v) == Some(Ordering::Equal)),
            Filter::IsNull(c) => cell(c).is_null(),
            Filter::NotNull(c) => !cell(c).is_null(),
            Filter::Or(branches) => branches.iter().any(|b| b.matches(row)),
        }
    }
}

/// SQL-style comparison: NULL compares to nothing, numbers numerically,
/// strings lexically, mixed types not at all.
pub fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_list_item(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s.replace('"', "\\\"")),
        other => other.to_string(),
    }
}

/// A read against one table or view.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    /// Empty means every column
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    /// Column and ascending flag
    pub order: Option<(String, bool)>,
    pub limit: Option<usize>,
    /// Rows skipped before `limit` applies
    pub offset: Option<usize>,
}

impl Query {
    pub fn table(table: &str) -> Self {
        Query {
            table: table.to_string(),
            columns: Vec::new(),
            filters: Vec::new(),
            order: None,
            limit: None,
            offset: None,
        }
    }

    /// Comma-separated column list, as written in a PostgREST `select`.
    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(column.to_string(), value.into()))
    }

    pub fn gt(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Gt(column.to_string(), value.into()))
    }

    pub fn lt(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lt(column.to_string(), value.into()))
    }

    pub fn in_<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(Filter::In(column.to_string(), values))
    }

    pub fn is_null(self, column: &str) -> Self {
        self.filter(Filter::IsNull(column.to_string()))
    }

    pub fn not_null(self, column: &str) -> Self {
        self.filter(Filter::NotNull(column.to_string()))
    }

    pub fn or_any(self, branches: Vec<Filter>) -> Self {
        self.filter(Filter::Or(branches))
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some((column.to_string(), ascending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// PostgREST query-string pairs, in a stable order.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let select = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(",")
        };
        let mut pairs = vec![("select".to_string(), select)];
        pairs.extend(self.filters.iter().map(Filter::to_pair));
        if let Some((column, ascending)) = &self.order {
            let direction = if *ascending { "asc" } else { "desc" };
            pairs.push(("order".to_string(), format!("{}.{}", column, direction)));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset".to_string(), offset.to_string()));
        }
        pairs
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }
}
