use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::engine::Engine;
use crate::error::SqlScopeError;

use super::ExecutionContext;

enum Slot {
    Idle(ExecutionContext),
    InUse,
}

thread_local! {
    // One context per engine per thread; dropped (and its connection closed)
    // when the thread exits.
    static CONTEXTS: RefCell<HashMap<u64, Slot>> = RefCell::new(HashMap::new());
}

/// Puts the context back into its slot when the call ends, unwinding included.
struct Checkout {
    engine_id: u64,
    ctx: Option<ExecutionContext>,
}

impl Drop for Checkout {
    fn drop(&mut self) {
        let ctx = self.ctx.take();
        let engine_id = self.engine_id;
        let _ = CONTEXTS.try_with(|slots| {
            let mut slots = slots.borrow_mut();
            match ctx {
                Some(ctx) => {
                    slots.insert(engine_id, Slot::Idle(ctx));
                }
                None => {
                    slots.remove(&engine_id);
                }
            }
        });
    }
}

pub(crate) fn with_thread_context<T>(
    engine: &Arc<Engine>,
    f: impl FnOnce(&mut ExecutionContext) -> Result<T, SqlScopeError>,
) -> Result<T, SqlScopeError> {
    let engine_id = engine.id();
    let ctx = CONTEXTS.with(|slots| {
        let mut slots = slots.borrow_mut();
        match slots.insert(engine_id, Slot::InUse) {
            Some(Slot::Idle(ctx)) => Ok(ctx),
            Some(Slot::InUse) => Err(SqlScopeError::ContextBusy),
            None => {
                debug!(engine = engine_id, "creating thread execution context");
                Ok(ExecutionContext::new(Arc::clone(engine)))
            }
        }
    })?;

    let mut checkout = Checkout {
        engine_id,
        ctx: Some(ctx),
    };
    match checkout.ctx.as_mut() {
        Some(ctx) => f(ctx),
        None => Err(SqlScopeError::ContextBusy),
    }
}
