//! Convenient imports for common functionality.

pub use crate::config::{ConnectOptions, ConnectOptionsBuilder, DriverOptions};
pub use crate::context::{ConnectionScope, ExecutionContext, LazyConnection, TransactionScope};
pub use crate::driver::{Connector, Cursor, DriverConnection};
pub use crate::engine::{Engine, EngineCell};
pub use crate::error::SqlScopeError;
pub use crate::results::{Columns, DbRow};
pub use crate::translation::{PlaceholderStyle, translate_placeholders};
pub use crate::types::RowValues;

#[cfg(feature = "sqlite")]
pub use crate::sqlite::SqliteConnector;
