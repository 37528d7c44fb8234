use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::{info, warn};

use crate::config::ConnectOptions;
use crate::context::{ExecutionContext, local};
use crate::driver::{Connector, DriverConnection};
use crate::error::SqlScopeError;
use crate::translation::PlaceholderStyle;

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// Holds what is needed to open a physical connection. Immutable once built.
pub struct Engine {
    id: u64,
    options: ConnectOptions,
    connector: Box<dyn Connector>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.id)
            .field("driver", &self.connector.name())
            .field("options", &self.options)
            .finish()
    }
}

impl Engine {
    #[must_use]
    pub fn new(options: ConnectOptions, connector: impl Connector + 'static) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed),
            options,
            connector: Box::new(connector),
        })
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    #[must_use]
    pub fn placeholder_style(&self) -> PlaceholderStyle {
        self.connector.placeholder_style()
    }

    /// Open a new physical connection. Failures are not retried.
    ///
    /// # Errors
    /// Returns `SqlScopeError::Connection` wrapping the driver's error.
    pub fn open_connection(&self) -> Result<Box<dyn DriverConnection>, SqlScopeError> {
        let target = self.options.target();
        info!(driver = self.connector.name(), %target, "open connection");
        self.connector.open(&self.options).map_err(|source| {
            warn!(%target, error = %source, "open connection failed");
            SqlScopeError::Connection {
                target,
                source: Box::new(source),
            }
        })
    }

    /// A fresh execution context bound to this engine.
    ///
    /// The caller owns it; pass it (or scopes derived from it) down the call chain.
    #[must_use]
    pub fn context(self: &Arc<Self>) -> ExecutionContext {
        ExecutionContext::new(Arc::clone(self))
    }

    /// Run `f` with this thread's execution context for this engine.
    ///
    /// The context is created on first use and lives until the thread exits, so
    /// consecutive calls on one thread share its state.
    ///
    /// # Errors
    /// Returns `SqlScopeError::ContextBusy` if called again from inside `f`, or
    /// whatever `f` returns.
    pub fn with_context<T>(
        self: &Arc<Self>,
        f: impl FnOnce(&mut ExecutionContext) -> Result<T, SqlScopeError>,
    ) -> Result<T, SqlScopeError> {
        local::with_thread_context(self, f)
    }
}

/// Initialize-once slot for an [`Engine`].
///
/// The first `initialize` wins; later calls fail with
/// `SqlScopeError::AlreadyInitialized` and leave the stored engine untouched.
#[derive(Debug, Default)]
pub struct EngineCell {
    engine: OnceLock<Arc<Engine>>,
}

impl EngineCell {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            engine: OnceLock::new(),
        }
    }

    /// # Errors
    /// Returns `SqlScopeError::AlreadyInitialized` if an engine is already stored.
    pub fn initialize(
        &self,
        options: ConnectOptions,
        connector: impl Connector + 'static,
    ) -> Result<Arc<Engine>, SqlScopeError> {
        if self.engine.get().is_some() {
            return Err(SqlScopeError::AlreadyInitialized);
        }
        let engine = Engine::new(options, connector);
        self.engine
            .set(Arc::clone(&engine))
            .map_err(|_| SqlScopeError::AlreadyInitialized)?;
        info!(engine = engine.id, target = %engine.options.target(), "engine initialized");
        Ok(engine)
    }

    /// # Errors
    /// Returns `SqlScopeError::NotInitialized` before the first `initialize`.
    pub fn get(&self) -> Result<Arc<Engine>, SqlScopeError> {
        self.engine
            .get()
            .cloned()
            .ok_or(SqlScopeError::NotInitialized)
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.engine.get().is_some()
    }
}

static GLOBAL_ENGINE: EngineCell = EngineCell::new();

/// Initialize the process-wide engine.
///
/// # Errors
/// Returns `SqlScopeError::AlreadyInitialized` on every call after the first success.
pub fn initialize(
    options: ConnectOptions,
    connector: impl Connector + 'static,
) -> Result<Arc<Engine>, SqlScopeError> {
    GLOBAL_ENGINE.initialize(options, connector)
}

/// The process-wide engine.
///
/// # Errors
/// Returns `SqlScopeError::NotInitialized` if [`initialize`] has not succeeded yet.
pub fn engine() -> Result<Arc<Engine>, SqlScopeError> {
    GLOBAL_ENGINE.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingConnector;

    #[test]
    fn second_initialize_fails_and_keeps_first_engine() -> Result<(), SqlScopeError> {
        let cell = EngineCell::new();
        assert!(matches!(cell.get(), Err(SqlScopeError::NotInitialized)));

        let first = cell.initialize(ConnectOptions::for_path("first"), RecordingConnector::new())?;
        let again = cell.initialize(ConnectOptions::for_path("second"), RecordingConnector::new());
        assert!(matches!(again, Err(SqlScopeError::AlreadyInitialized)));

        let stored = cell.get()?;
        assert_eq!(stored.id(), first.id());
        assert_eq!(stored.options().database, "first");
        Ok(())
    }

    #[test]
    fn concurrent_initialize_has_one_winner() {
        let cell = Arc::new(EngineCell::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cell = Arc::clone(&cell);
                std::thread::spawn(move || {
                    cell.initialize(
                        ConnectOptions::for_path(format!("db{i}")),
                        RecordingConnector::new(),
                    )
                    .is_ok()
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .filter_map(|h| h.join().ok())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert!(cell.is_initialized());
    }

    #[test]
    fn open_failure_is_a_connection_error() {
        let connector = RecordingConnector::new();
        connector.fail_open(true);
        let engine = Engine::new(ConnectOptions::new("app", "pw", "shop"), connector.clone());
        let err = engine.open_connection().err();
        assert!(matches!(
            err,
            Some(SqlScopeError::Connection { ref target, .. }) if target == "app@127.0.0.1:3306/shop"
        ));
        assert_eq!(connector.opens(), 0);
    }
}
