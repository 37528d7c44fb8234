use std::sync::Arc;

use tracing::{debug, warn};

use crate::driver::{Cursor, DriverConnection};
use crate::engine::Engine;
use crate::error::SqlScopeError;

/// A connection that opens its physical handle on the first cursor request.
///
/// The handle is opened at most once per instance; `close` clears it.
pub struct LazyConnection {
    engine: Arc<Engine>,
    handle: Option<Box<dyn DriverConnection>>,
    begin_pending: bool,
}

impl LazyConnection {
    pub(crate) fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            handle: None,
            begin_pending: false,
        }
    }

    /// Whether the physical connection has been opened.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Start a driver transaction before the next statement, opening first if needed.
    pub(crate) fn begin_on_next_statement(&mut self) {
        self.begin_pending = true;
    }

    /// Borrow a cursor, opening the physical connection first if needed.
    ///
    /// # Errors
    /// Returns `SqlScopeError::Connection` if opening fails, or the driver's
    /// error if no cursor can be created or a pending begin fails.
    pub fn cursor(&mut self) -> Result<Box<dyn Cursor + '_>, SqlScopeError> {
        if self.handle.is_none() {
            let opened = self.engine.open_connection()?;
            debug!(engine = self.engine.id(), "lazy connection opened");
            self.handle = Some(opened);
        }
        let Some(handle) = self.handle.as_mut() else {
            return Err(SqlScopeError::NoConnection("create a cursor"));
        };
        if self.begin_pending {
            handle.begin()?;
            self.begin_pending = false;
        }
        handle.cursor()
    }

    /// # Errors
    /// Returns `SqlScopeError::NoConnection` if nothing was opened, or the
    /// driver's commit error.
    pub fn commit(&mut self) -> Result<(), SqlScopeError> {
        self.begin_pending = false;
        self.handle
            .as_mut()
            .ok_or(SqlScopeError::NoConnection("commit"))?
            .commit()
    }

    /// # Errors
    /// Returns `SqlScopeError::NoConnection` if nothing was opened, or the
    /// driver's rollback error.
    pub fn rollback(&mut self) -> Result<(), SqlScopeError> {
        self.begin_pending = false;
        self.handle
            .as_mut()
            .ok_or(SqlScopeError::NoConnection("roll back"))?
            .rollback()
    }

    /// Close the physical connection if one is open. Calling it again is a no-op.
    ///
    /// # Errors
    /// Returns the driver's close error; the handle is cleared regardless.
    pub fn close(&mut self) -> Result<(), SqlScopeError> {
        self.begin_pending = false;
        match self.handle.take() {
            Some(handle) => {
                debug!(engine = self.engine.id(), "closing connection");
                handle.close()
            }
            None => Ok(()),
        }
    }
}

impl Drop for LazyConnection {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "closing dropped connection failed");
        }
    }
}
