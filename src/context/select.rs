use std::sync::Arc;

use tracing::info;

use crate::error::SqlScopeError;
use crate::results::{Columns, DbRow};
use crate::translation::translate_placeholders;
use crate::types::RowValues;

use super::ExecutionContext;

#[derive(Clone, Copy)]
enum Fetch {
    One,
    All,
}

impl ExecutionContext {
    /// Run a query and return every row.
    ///
    /// Uses the active connection, or a temporary one if no scope is open.
    ///
    /// # Errors
    /// Returns `SqlScopeError::Query` if execution fails, or the connection error.
    pub fn select(&mut self, sql: &str, params: &[RowValues]) -> Result<Vec<DbRow>, SqlScopeError> {
        self.with_connection(|ctx| ctx.run_select(sql, params, Fetch::All))
    }

    /// Run a query and return its first row; `None` when nothing matched.
    ///
    /// # Errors
    /// Returns `SqlScopeError::Query` if execution fails, or the connection error.
    pub fn select_one(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Option<DbRow>, SqlScopeError> {
        let rows = self.with_connection(|ctx| ctx.run_select(sql, params, Fetch::One))?;
        Ok(rows.into_iter().next())
    }

    /// Run a single-column query and read its first value as an integer.
    ///
    /// `None` when no row matched or the value is NULL.
    ///
    /// # Errors
    /// Returns `SqlScopeError::MultipleColumns` unless exactly one column comes
    /// back, and `SqlScopeError::ExecutionError` if the value is not an integer.
    pub fn select_int(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Option<i64>, SqlScopeError> {
        let Some(row) = self.select_one(sql, params)? else {
            return Ok(None);
        };
        if row.len() != 1 {
            return Err(SqlScopeError::MultipleColumns(row.len()));
        }
        match row.into_values().pop() {
            Some(RowValues::Int(value)) => Ok(Some(value)),
            Some(RowValues::Null) | None => Ok(None),
            Some(other) => Err(SqlScopeError::ExecutionError(format!(
                "expected an integer, got {other:?}"
            ))),
        }
    }

    fn run_select(
        &mut self,
        sql: &str,
        params: &[RowValues],
        fetch: Fetch,
    ) -> Result<Vec<DbRow>, SqlScopeError> {
        let native = translate_placeholders(sql, self.engine.placeholder_style());
        info!(sql = %native, params = params.len(), "select");

        let mut cursor = self.connection_mut()?.cursor()?;
        cursor
            .execute(&native, params)
            .map_err(|e| SqlScopeError::query(&native, e))?;
        let columns = Columns::new(cursor.column_names().to_vec());
        let rows = match fetch {
            Fetch::One => cursor.fetch_one().map(|row| row.into_iter().collect()),
            Fetch::All => cursor.fetch_all(),
        }
        .map_err(|e| SqlScopeError::query(&native, e))?;
        cursor.close();

        Ok(rows
            .into_iter()
            .map(|values| DbRow::new(Arc::clone(&columns), values))
            .collect())
    }
}
