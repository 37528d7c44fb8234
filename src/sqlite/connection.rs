use rusqlite::Connection;

use crate::driver::{Cursor, DriverConnection};
use crate::error::SqlScopeError;

use super::cursor::SqliteCursor;

/// A physical `SQLite` connection.
pub struct SqliteConnection {
    conn: Connection,
    autocommit: bool,
}

impl SqliteConnection {
    pub(super) fn new(conn: Connection, autocommit: bool) -> Self {
        Self { conn, autocommit }
    }

    /// True while an implicit or explicit transaction is open.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    fn finish(&mut self, statement: &str) -> Result<(), SqlScopeError> {
        if self.in_transaction() {
            self.conn.execute_batch(statement)?;
        }
        Ok(())
    }
}

impl DriverConnection for SqliteConnection {
    fn cursor(&mut self) -> Result<Box<dyn Cursor + '_>, SqlScopeError> {
        Ok(Box::new(SqliteCursor::new(&self.conn, self.autocommit)))
    }

    fn begin(&mut self) -> Result<(), SqlScopeError> {
        if !self.in_transaction() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), SqlScopeError> {
        self.finish("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), SqlScopeError> {
        self.finish("ROLLBACK")
    }

    fn close(self: Box<Self>) -> Result<(), SqlScopeError> {
        self.conn.close().map_err(|(_, err)| SqlScopeError::SqliteError(err))
    }
}
