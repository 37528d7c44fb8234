//! Per-thread-of-control connection state and the scopes built on it.
//!
//! An [`ExecutionContext`] holds at most one [`LazyConnection`] and the current
//! transaction depth. [`ConnectionScope`] makes sure a connection exists for the
//! duration of a call chain and releases it only if it created it;
//! [`TransactionScope`] adds the nesting counter and finishes the physical
//! transaction exactly once, when the outermost scope exits.
//!
//! ```rust
//! use sql_scope::prelude::*;
//! use sql_scope::test_utils::RecordingConnector;
//!
//! # fn demo() -> Result<(), SqlScopeError> {
//! let engine = Engine::new(ConnectOptions::for_path("demo"), RecordingConnector::new());
//! let mut ctx = engine.context();
//! ctx.with_transaction(|ctx| {
//!     ctx.update("insert into t(x) values (?)", &[RowValues::Int(1)])?;
//!     // joins the enclosing transaction; nothing is committed here
//!     ctx.with_transaction(|ctx| ctx.update("update t set x = ?", &[RowValues::Int(2)]))?;
//!     Ok(())
//! })?;
//! assert!(!ctx.is_initialized());
//! # Ok(())
//! # }
//! # demo().unwrap();
//! ```

mod dml;
mod lazy;
pub(crate) mod local;
mod scope;
mod select;
mod tx;

use std::sync::Arc;

use tracing::warn;

use crate::engine::Engine;
use crate::error::SqlScopeError;

pub use lazy::LazyConnection;
pub use scope::ConnectionScope;
pub use tx::TransactionScope;

/// Connection and transaction state for one thread of control.
pub struct ExecutionContext {
    engine: Arc<Engine>,
    connection: Option<LazyConnection>,
    transactions: usize,
    rollback_only: bool,
    // Bumped whenever the connection is attached or detached.
    generation: u64,
    tx_generation: u64,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("engine", &self.engine.id())
            .field("initialized", &self.is_initialized())
            .field("transactions", &self.transactions)
            .field("rollback_only", &self.rollback_only)
            .finish()
    }
}

impl ExecutionContext {
    pub(crate) fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            connection: None,
            transactions: 0,
            rollback_only: false,
            generation: 0,
            tx_generation: 0,
        }
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// True while a (possibly not yet opened) connection is attached.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.connection.is_some()
    }

    /// Attach a new lazy connection and reset the transaction depth.
    ///
    /// Callers check [`is_initialized`](Self::is_initialized) first; calling it on
    /// an initialized context replaces (and closes) the previous connection.
    /// Inside a transaction the depth is kept, and the enclosing transaction
    /// fails when it finishes.
    pub fn init(&mut self) {
        self.connection = Some(LazyConnection::new(Arc::clone(&self.engine)));
        self.generation += 1;
        if self.transactions > 0 {
            warn!(
                depth = self.transactions,
                "connection replaced inside a transaction"
            );
            return;
        }
        self.transactions = 0;
        self.rollback_only = false;
    }

    /// Close the connection and detach it.
    ///
    /// # Errors
    /// Returns `SqlScopeError::NoConnection` if the context is not initialized,
    /// or the driver's close error. The connection is detached either way.
    pub fn cleanup(&mut self) -> Result<(), SqlScopeError> {
        let Some(mut connection) = self.connection.take() else {
            return Err(SqlScopeError::NoConnection("clean up"));
        };
        self.generation += 1;
        if self.transactions > 0 {
            warn!(
                depth = self.transactions,
                "connection closed inside a transaction"
            );
        }
        connection.close()
    }

    /// Whether the connection was swapped out since the outermost transaction began.
    fn connection_replaced(&self) -> bool {
        self.generation != self.tx_generation
    }

    /// Number of transaction scopes currently open.
    #[must_use]
    pub fn transaction_depth(&self) -> usize {
        self.transactions
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.transactions > 0
    }

    /// Set once a nested transaction scope failed; the outermost scope will roll back.
    #[must_use]
    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    /// # Errors
    /// Returns `SqlScopeError::NoConnection` outside any scope.
    pub fn connection_mut(&mut self) -> Result<&mut LazyConnection, SqlScopeError> {
        self.connection
            .as_mut()
            .ok_or(SqlScopeError::NoConnection("use the connection"))
    }

    /// Enter a connection scope.
    pub fn connection(&mut self) -> ConnectionScope<'_> {
        ConnectionScope::enter(self)
    }

    /// Enter a transaction scope.
    pub fn begin(&mut self) -> TransactionScope<'_> {
        TransactionScope::begin(self)
    }

    /// Run `f` inside a connection scope; the scope exits on every path.
    ///
    /// # Errors
    /// Returns the error from `f`, or the close error if `f` succeeded but
    /// releasing the connection failed.
    pub fn with_connection<T>(
        &mut self,
        f: impl FnOnce(&mut ExecutionContext) -> Result<T, SqlScopeError>,
    ) -> Result<T, SqlScopeError> {
        let mut scope = self.connection();
        let result = f(&mut *scope);
        match (result, scope.exit()) {
            (Ok(value), released) => released.map(|()| value),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                warn!(error = %close_err, "releasing connection after failure");
                Err(err)
            }
        }
    }

    /// Run `f` inside a transaction scope: commit when the outermost scope
    /// succeeds, roll back when any failure reaches it.
    ///
    /// # Errors
    /// Returns the error from `f` (chained with the rollback failure, if any),
    /// `SqlScopeError::Commit` if the final commit fails, or
    /// `SqlScopeError::RolledBack` if a nested scope failed and `f` swallowed it.
    pub fn with_transaction<T>(
        &mut self,
        f: impl FnOnce(&mut ExecutionContext) -> Result<T, SqlScopeError>,
    ) -> Result<T, SqlScopeError> {
        let mut tx = self.begin();
        match f(&mut *tx) {
            Ok(value) => tx.commit().map(|()| value),
            Err(err) => Err(tx.rollback_with(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectOptions;
    use crate::test_utils::{DriverEvent, RecordingConnector};

    #[test]
    fn init_and_cleanup_toggle_connection() -> Result<(), SqlScopeError> {
        let connector = RecordingConnector::new();
        let mut ctx = Engine::new(ConnectOptions::for_path("ctx"), connector.clone()).context();
        assert!(!ctx.is_initialized());

        ctx.init();
        assert!(ctx.is_initialized());
        assert_eq!(ctx.transaction_depth(), 0);
        drop(ctx.connection_mut()?.cursor()?);

        ctx.cleanup()?;
        assert!(!ctx.is_initialized());
        assert_eq!(connector.count(&DriverEvent::Close), 1);
        Ok(())
    }

    #[test]
    fn cleanup_requires_initialized_context() {
        let mut ctx = Engine::new(ConnectOptions::for_path("ctx"), RecordingConnector::new()).context();
        assert!(matches!(ctx.cleanup(), Err(SqlScopeError::NoConnection(_))));
        assert!(matches!(ctx.connection_mut(), Err(SqlScopeError::NoConnection(_))));
    }

    #[test]
    fn reinit_replaces_and_closes_previous_connection() -> Result<(), SqlScopeError> {
        let connector = RecordingConnector::new();
        let mut ctx = Engine::new(ConnectOptions::for_path("ctx"), connector.clone()).context();
        ctx.init();
        drop(ctx.connection_mut()?.cursor()?);
        ctx.init();
        assert!(ctx.is_initialized());
        assert!(!ctx.connection_mut()?.is_open());
        assert_eq!(connector.count(&DriverEvent::Close), 1);
        Ok(())
    }
}
