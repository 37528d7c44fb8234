use tracing::{info, warn};

use crate::error::SqlScopeError;
use crate::translation::translate_placeholders;
use crate::types::RowValues;

use super::ExecutionContext;

impl ExecutionContext {
    /// Execute an INSERT/UPDATE/DELETE and return the affected row count.
    ///
    /// Outside a transaction the statement is committed on its own; inside one
    /// the commit is left to the outermost transaction scope.
    ///
    /// # Errors
    /// Returns `SqlScopeError::Query` if execution fails,
    /// `SqlScopeError::Commit` if the auto-commit fails, or the connection error.
    pub fn update(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, SqlScopeError> {
        self.with_connection(|ctx| ctx.run_update(sql, params))
    }

    /// Insert one row into `table` from ordered `(column, value)` pairs.
    ///
    /// # Errors
    /// Returns `SqlScopeError::ExecutionError` for an empty column list, otherwise
    /// the same errors as [`update`](Self::update).
    pub fn insert(
        &mut self,
        table: &str,
        values: &[(&str, RowValues)],
    ) -> Result<usize, SqlScopeError> {
        if values.is_empty() {
            return Err(SqlScopeError::ExecutionError(format!(
                "insert into {table} needs at least one column"
            )));
        }
        let columns = values
            .iter()
            .map(|(name, _)| quote_identifier(name))
            .collect::<Vec<_>>()
            .join(", ");
        let markers = vec!["?"; values.len()].join(", ");
        let sql = format!(
            "insert into {} ({columns}) values ({markers})",
            quote_identifier(table)
        );
        let params: Vec<RowValues> = values.iter().map(|(_, value)| value.clone()).collect();
        self.update(&sql, &params)
    }

    fn run_update(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, SqlScopeError> {
        let native = translate_placeholders(sql, self.engine.placeholder_style());
        info!(sql = %native, params = params.len(), "update");

        let autocommit = self.transactions == 0;
        let conn = self.connection_mut()?;
        let affected = {
            let mut cursor = conn.cursor()?;
            cursor
                .execute(&native, params)
                .map_err(|e| SqlScopeError::query(&native, e))?;
            let affected = cursor.rowcount();
            cursor.close();
            affected
        };

        if autocommit {
            info!("auto commit");
            if let Err(source) = conn.commit() {
                warn!(error = %source, "auto commit failed, rolling back");
                return Err(SqlScopeError::Commit {
                    source: Box::new(source),
                    rollback: conn.rollback().err().map(Box::new),
                });
            }
        }
        Ok(affected)
    }
}

fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_quoted_and_escaped() {
        assert_eq!(quote_identifier("user"), "\"user\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
