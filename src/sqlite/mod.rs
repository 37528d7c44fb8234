//! Blocking `SQLite` driver built on rusqlite.
//!
//! `database` in [`ConnectOptions`] is the file path (`:memory:` works, but every
//! physical connection then gets its own empty database). Server fields are
//! ignored. Recognized options:
//! - `autocommit` (default `false`): when false, the first write opens a
//!   transaction that stays open until commit or rollback.
//!   Transaction scopes always `BEGIN` before their first statement, so reads
//!   made before the first write see one snapshot.
//! - `busy_timeout_ms`: how long to wait on a locked database.
//! - `init_sql`: batch executed on every new connection (pragmas and the like).

mod connection;
mod cursor;
pub mod params;

use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use crate::config::ConnectOptions;
use crate::driver::{Connector, DriverConnection};
use crate::error::SqlScopeError;
use crate::translation::PlaceholderStyle;

pub use connection::SqliteConnection;
pub use cursor::SqliteCursor;

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnector;

impl Connector for SqliteConnector {
    fn open(&self, options: &ConnectOptions) -> Result<Box<dyn DriverConnection>, SqlScopeError> {
        let conn = Connection::open(&options.database)?;
        let driver_options = &options.options;

        if let Some(ms) = driver_options
            .get("busy_timeout_ms")
            .and_then(serde_json::Value::as_u64)
        {
            conn.busy_timeout(Duration::from_millis(ms))?;
        }
        if let Some(init_sql) = driver_options
            .get("init_sql")
            .and_then(serde_json::Value::as_str)
        {
            conn.execute_batch(init_sql)?;
        }
        debug!(
            path = %options.database,
            autocommit = driver_options.autocommit(),
            "opened sqlite connection"
        );

        Ok(Box::new(SqliteConnection::new(
            conn,
            driver_options.autocommit(),
        )))
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Sqlite
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
