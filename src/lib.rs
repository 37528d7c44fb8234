//! Lazy connection acquisition, per-thread connection reuse and nested
//! transaction scopes over a blocking SQL driver.
//!
//! ```rust
//! use sql_scope::prelude::*;
//! # fn demo(path: &str) -> Result<(), SqlScopeError> {
//! let engine = Engine::new(ConnectOptions::for_path(path), SqliteConnector);
//! let mut ctx = engine.context();
//!
//! ctx.update("create table t (id integer primary key, x integer)", &[])?;
//! ctx.with_transaction(|ctx| {
//!     ctx.insert("t", &[("id", RowValues::Int(5)), ("x", RowValues::Int(1))])?;
//!     ctx.update("update t set x = ? where id = ?", &[RowValues::Int(2), RowValues::Int(5)])
//! })?;
//! let x = ctx.select_int("select x from t where id = ?", &[RowValues::Int(5)])?;
//! assert_eq!(x, Some(2));
//! # Ok(())
//! # }
//! # let dir = tempfile::tempdir().unwrap();
//! # demo(dir.path().join("doc.db").to_str().unwrap()).unwrap();
//! ```

pub mod config;
pub mod context;
pub mod driver;
pub mod engine;
pub mod error;
pub mod prelude;
pub mod results;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod translation;
pub mod types;

pub use config::{ConnectOptions, ConnectOptionsBuilder, DriverOptions};
pub use context::{ConnectionScope, ExecutionContext, LazyConnection, TransactionScope};
pub use engine::{Engine, EngineCell, engine, initialize};
pub use error::SqlScopeError;
pub use results::{Columns, DbRow};
pub use types::RowValues;
