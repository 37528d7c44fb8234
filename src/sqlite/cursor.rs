use std::collections::VecDeque;

use rusqlite::{Connection, params_from_iter};

use crate::driver::Cursor;
use crate::error::SqlScopeError;
use crate::types::RowValues;

use super::params::{Params, extract_value};

/// Cursor over a rusqlite connection; rows are buffered at execute time.
pub struct SqliteCursor<'c> {
    conn: &'c Connection,
    autocommit: bool,
    column_names: Vec<String>,
    rows: VecDeque<Vec<RowValues>>,
    rowcount: usize,
}

impl<'c> SqliteCursor<'c> {
    pub(super) fn new(conn: &'c Connection, autocommit: bool) -> Self {
        Self {
            conn,
            autocommit,
            column_names: Vec::new(),
            rows: VecDeque::new(),
            rowcount: 0,
        }
    }
}

impl Cursor for SqliteCursor<'_> {
    fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<(), SqlScopeError> {
        let conn = self.conn;
        let converted = Params::convert(params);
        let mut stmt = conn.prepare(sql)?;

        // Without autocommit, writes open an implicit transaction that only an
        // explicit commit or rollback ends.
        if !self.autocommit && !stmt.readonly() && conn.is_autocommit() {
            conn.execute_batch("BEGIN")?;
        }

        self.column_names = stmt
            .column_names()
            .iter()
            .map(std::string::ToString::to_string)
            .collect();
        self.rows.clear();

        if self.column_names.is_empty() {
            self.rowcount = stmt.execute(params_from_iter(converted.as_values().iter()))?;
            return Ok(());
        }

        let col_count = self.column_names.len();
        let mut rows = stmt.query(params_from_iter(converted.as_values().iter()))?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(col_count);
            for idx in 0..col_count {
                values.push(extract_value(row, idx)?);
            }
            self.rows.push_back(values);
        }
        self.rowcount = self.rows.len();
        Ok(())
    }

    fn column_names(&self) -> &[String] {
        &self.column_names
    }

    fn fetch_one(&mut self) -> Result<Option<Vec<RowValues>>, SqlScopeError> {
        Ok(self.rows.pop_front())
    }

    fn fetch_all(&mut self) -> Result<Vec<Vec<RowValues>>, SqlScopeError> {
        Ok(self.rows.drain(..).collect())
    }

    fn rowcount(&self) -> usize {
        self.rowcount
    }

    fn close(&mut self) {
        self.rows.clear();
    }
}
