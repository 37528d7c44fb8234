use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use crate::error::SqlScopeError;

use super::ExecutionContext;

/// Guard that keeps a connection attached to the context while it lives.
///
/// The scope that attached the connection owns it and releases it on exit;
/// scopes entered while one is already attached borrow it and leave it alone.
/// It dereferences to the [`ExecutionContext`], so nested scopes are entered
/// through it.
pub struct ConnectionScope<'a> {
    ctx: &'a mut ExecutionContext,
    owns_connection: bool,
}

impl<'a> ConnectionScope<'a> {
    pub fn enter(ctx: &'a mut ExecutionContext) -> Self {
        let owns_connection = if ctx.is_initialized() {
            false
        } else {
            ctx.init();
            true
        };
        debug!(owns_connection, "enter connection scope");
        Self {
            ctx,
            owns_connection,
        }
    }

    /// Whether this scope attached the connection and will release it.
    #[must_use]
    pub fn owns_connection(&self) -> bool {
        self.owns_connection
    }

    /// Leave the scope, surfacing a failure to close the connection.
    ///
    /// # Errors
    /// Returns the driver's close error when this scope owned the connection.
    pub fn exit(mut self) -> Result<(), SqlScopeError> {
        self.release()
    }

    pub(crate) fn release(&mut self) -> Result<(), SqlScopeError> {
        if !self.owns_connection {
            return Ok(());
        }
        self.owns_connection = false;
        if self.ctx.is_initialized() {
            debug!("release connection");
            self.ctx.cleanup()
        } else {
            Ok(())
        }
    }
}

impl Deref for ConnectionScope<'_> {
    type Target = ExecutionContext;

    fn deref(&self) -> &ExecutionContext {
        &*self.ctx
    }
}

impl DerefMut for ConnectionScope<'_> {
    fn deref_mut(&mut self) -> &mut ExecutionContext {
        &mut *self.ctx
    }
}

impl Drop for ConnectionScope<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(error = %err, "closing connection on scope exit failed");
        }
    }
}
