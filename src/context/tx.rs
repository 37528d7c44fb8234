use std::ops::{Deref, DerefMut};

use tracing::{debug, error, info, warn};

use crate::error::SqlScopeError;

use super::{ConnectionScope, ExecutionContext};

/// Transaction guard layered on a [`ConnectionScope`].
///
/// Entering at depth 0 begins a transaction; entering deeper joins the enclosing
/// one. Only the exit that brings the depth back to 0 talks to the driver, with
/// exactly one commit or rollback. A nested scope that exits with failure marks
/// the transaction rollback-only instead.
///
/// Exit with [`commit`](Self::commit) on success and [`rollback`](Self::rollback)
/// (or [`rollback_with`](Self::rollback_with)) on failure. Dropping the guard
/// without either counts as a failure.
pub struct TransactionScope<'a> {
    scope: ConnectionScope<'a>,
    finished: bool,
}

impl<'a> TransactionScope<'a> {
    pub fn begin(ctx: &'a mut ExecutionContext) -> Self {
        let mut scope = ConnectionScope::enter(ctx);
        scope.transactions += 1;
        if scope.transactions == 1 {
            info!("begin transaction");
            scope.tx_generation = scope.generation;
            if let Some(conn) = scope.connection.as_mut() {
                conn.begin_on_next_statement();
            }
        } else {
            debug!(depth = scope.transactions, "join enclosing transaction");
        }
        Self {
            scope,
            finished: false,
        }
    }

    /// Whether this scope attached the connection and will release it.
    #[must_use]
    pub fn owns_connection(&self) -> bool {
        self.scope.owns_connection()
    }

    /// Success exit.
    ///
    /// # Errors
    /// At depth 0: `SqlScopeError::Commit` if the commit fails, or
    /// `SqlScopeError::RolledBack` if a nested scope failed earlier. Also the
    /// close error when this scope owns the connection.
    pub fn commit(self) -> Result<(), SqlScopeError> {
        self.finish(true)
    }

    /// Failure exit.
    ///
    /// # Errors
    /// Returns the driver's rollback error (depth 0 only) or the close error.
    pub fn rollback(self) -> Result<(), SqlScopeError> {
        self.finish(false)
    }

    /// Failure exit on behalf of `original`, which stays the primary error.
    ///
    /// A rollback failure is chained as `SqlScopeError::Rollback` rather than
    /// replacing `original`.
    #[must_use]
    pub fn rollback_with(self, original: SqlScopeError) -> SqlScopeError {
        match self.finish(false) {
            Ok(()) => original,
            Err(rollback) => {
                error!(error = %original, rollback_error = %rollback, "rollback failed");
                SqlScopeError::Rollback {
                    original: Box::new(original),
                    rollback: Box::new(rollback),
                }
            }
        }
    }

    fn finish(mut self, success: bool) -> Result<(), SqlScopeError> {
        self.finished = true;
        let outcome = self.leave(success);
        match (outcome, self.scope.release()) {
            (Ok(()), released) => released,
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(close_err)) => {
                warn!(error = %close_err, "releasing connection after failed transaction");
                Err(err)
            }
        }
    }

    fn leave(&mut self, success: bool) -> Result<(), SqlScopeError> {
        let ctx: &mut ExecutionContext = &mut self.scope;
        ctx.transactions = ctx.transactions.saturating_sub(1);
        if ctx.transactions > 0 {
            if !success {
                ctx.rollback_only = true;
                debug!(
                    depth = ctx.transactions,
                    "nested transaction failed; marked rollback-only"
                );
            }
            return Ok(());
        }

        let doomed = std::mem::take(&mut ctx.rollback_only);
        if ctx.connection_replaced() {
            // Whatever ran on the old connection was discarded when it closed.
            warn!("connection detached before the transaction finished");
            return if success {
                Err(SqlScopeError::NoConnection("commit"))
            } else {
                Ok(())
            };
        }
        let Some(conn) = ctx.connection.as_mut().filter(|conn| conn.is_open()) else {
            debug!("transaction finished without touching the database");
            return if success && doomed {
                Err(SqlScopeError::RolledBack)
            } else {
                Ok(())
            };
        };

        if success && !doomed {
            return match conn.commit() {
                Ok(()) => {
                    info!("commit ok");
                    Ok(())
                }
                Err(source) => {
                    warn!(error = %source, "commit failed, rolling back");
                    let rollback = conn.rollback().err().map(Box::new);
                    if let Some(err) = &rollback {
                        error!(error = %err, "rollback after failed commit failed");
                    }
                    Err(SqlScopeError::Commit {
                        source: Box::new(source),
                        rollback,
                    })
                }
            };
        }

        conn.rollback()?;
        info!("rollback ok");
        if success {
            // Body succeeded but a nested scope failed: report it instead of committing.
            Err(SqlScopeError::RolledBack)
        } else {
            Ok(())
        }
    }
}

impl Deref for TransactionScope<'_> {
    type Target = ExecutionContext;

    fn deref(&self) -> &ExecutionContext {
        &self.scope
    }
}

impl DerefMut for TransactionScope<'_> {
    fn deref_mut(&mut self) -> &mut ExecutionContext {
        &mut self.scope
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        warn!(
            depth = self.scope.transactions,
            "transaction scope dropped without commit; treating as failure"
        );
        if let Err(err) = self.leave(false) {
            error!(error = %err, "rollback on drop failed");
        }
    }
}
