//! The blocking driver interface the connection core consumes.
//!
//! A [`Connector`] opens physical connections; a [`DriverConnection`] hands out
//! cursors and finishes transactions; a [`Cursor`] executes one statement at a
//! time and buffers its rows.

use crate::config::ConnectOptions;
use crate::error::SqlScopeError;
use crate::translation::PlaceholderStyle;
use crate::types::RowValues;

/// Factory for physical connections.
pub trait Connector: Send + Sync {
    /// Open a new physical connection.
    ///
    /// # Errors
    /// Returns the driver's error if the connection cannot be established.
    fn open(&self, options: &ConnectOptions) -> Result<Box<dyn DriverConnection>, SqlScopeError>;

    /// Marker style the driver expects in SQL text.
    fn placeholder_style(&self) -> PlaceholderStyle;

    fn name(&self) -> &'static str;
}

/// One open physical connection.
pub trait DriverConnection: Send {
    /// # Errors
    /// Returns the driver's error if no cursor can be created.
    fn cursor(&mut self) -> Result<Box<dyn Cursor + '_>, SqlScopeError>;

    /// Start a transaction explicitly. Drivers that always run inside an
    /// implicit transaction can keep the default no-op.
    ///
    /// # Errors
    /// Returns the driver's error if the transaction cannot be started.
    fn begin(&mut self) -> Result<(), SqlScopeError> {
        Ok(())
    }

    /// # Errors
    /// Returns the driver's error if the commit fails.
    fn commit(&mut self) -> Result<(), SqlScopeError>;

    /// # Errors
    /// Returns the driver's error if the rollback fails.
    fn rollback(&mut self) -> Result<(), SqlScopeError>;

    /// # Errors
    /// Returns the driver's error if closing fails; the connection is gone either way.
    fn close(self: Box<Self>) -> Result<(), SqlScopeError>;
}

/// Statement cursor borrowed from a [`DriverConnection`].
pub trait Cursor {
    /// Execute `sql` (already in the driver's placeholder style).
    ///
    /// # Errors
    /// Returns the driver's error if preparing or executing fails.
    fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<(), SqlScopeError>;

    /// Column names of the last executed statement; empty for DML.
    fn column_names(&self) -> &[String];

    /// # Errors
    /// Returns the driver's error if the next row cannot be read.
    fn fetch_one(&mut self) -> Result<Option<Vec<RowValues>>, SqlScopeError>;

    /// # Errors
    /// Returns the driver's error if the remaining rows cannot be read.
    fn fetch_all(&mut self) -> Result<Vec<Vec<RowValues>>, SqlScopeError>;

    /// Rows affected by the last executed statement.
    fn rowcount(&self) -> usize;

    fn close(&mut self) {}
}
