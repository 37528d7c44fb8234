use std::collections::HashMap;
use std::ops::Index;
use std::sync::Arc;

use crate::types::RowValues;

static MISSING: RowValues = RowValues::Null;

/// Column header shared by every row of one result.
///
/// Built once per executed statement; rows hold an `Arc` to it so name lookups
/// never repeat the string scan.
#[derive(Debug)]
pub struct Columns {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Columns {
    #[must_use]
    pub fn new(names: Vec<String>) -> Arc<Self> {
        // First occurrence wins for duplicated names, matching positional order.
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Arc::new(Self { names, index })
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A row returned by the query helpers: column name to value, in column order.
///
/// Values are reachable by name or by position, either through the accessors or
/// by indexing:
/// ```rust
/// use sql_scope::prelude::*;
///
/// let row = DbRow::new(
///     Columns::new(vec!["id".into(), "name".into()]),
///     vec![RowValues::Int(5), RowValues::from("alice")],
/// );
/// assert_eq!(row.get("name").and_then(RowValues::as_text), Some("alice"));
/// assert_eq!(row[0], RowValues::Int(5));
/// assert!(row["missing"].is_null());
/// ```
#[derive(Debug, Clone)]
pub struct DbRow {
    columns: Arc<Columns>,
    values: Vec<RowValues>,
}

impl DbRow {
    #[must_use]
    pub fn new(columns: Arc<Columns>, values: Vec<RowValues>) -> Self {
        Self { columns, values }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    /// Get a value by column name; `None` if the row has no such column.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.columns
            .position(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Get a value by column position.
    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    #[must_use]
    pub fn contains(&self, column_name: &str) -> bool {
        self.columns.position(column_name).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<RowValues> {
        self.values
    }
}

/// Missing columns index to `RowValues::Null`, like a JSON object lookup.
impl Index<&str> for DbRow {
    type Output = RowValues;

    fn index(&self, column_name: &str) -> &RowValues {
        self.get(column_name).unwrap_or(&MISSING)
    }
}

impl Index<usize> for DbRow {
    type Output = RowValues;

    fn index(&self, index: usize) -> &RowValues {
        self.values.get(index).unwrap_or(&MISSING)
    }
}
