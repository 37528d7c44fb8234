//! In-memory driver that records every call, for tests.
//!
//! [`RecordingConnector`] is cheap to clone; clones share one event log, so a
//! test keeps a handle while the engine owns another.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::config::ConnectOptions;
use crate::driver::{Connector, Cursor, DriverConnection};
use crate::error::SqlScopeError;
use crate::translation::PlaceholderStyle;
use crate::types::RowValues;

/// One call observed by the recording driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    Open,
    Execute(String),
    Commit,
    Rollback,
    Close,
}

#[derive(Default)]
struct Faults {
    open: bool,
    commit: bool,
    rollback: bool,
    close: bool,
    execute_containing: Option<String>,
}

type CannedRows = (Vec<String>, Vec<Vec<RowValues>>);

#[derive(Default)]
struct Shared {
    events: Mutex<Vec<DriverEvent>>,
    faults: Mutex<Faults>,
    rows: Mutex<Option<CannedRows>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn record(&self, event: DriverEvent) {
        lock(&self.events).push(event);
    }

    fn injected(&self, check: impl FnOnce(&Faults) -> bool, what: &str) -> Result<(), SqlScopeError> {
        if check(&lock(&self.faults)) {
            Err(SqlScopeError::Other(format!("injected {what} failure")))
        } else {
            Ok(())
        }
    }
}

/// Connector whose connections record calls instead of talking to a server.
///
/// Statements starting with `select` return the rows set by
/// [`with_rows`](Self::with_rows) (none by default); any other statement
/// reports one affected row.
#[derive(Clone)]
pub struct RecordingConnector {
    shared: Arc<Shared>,
    style: PlaceholderStyle,
}

impl Default for RecordingConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingConnector {
    /// Uses `$N` markers so placeholder rewriting is visible in the log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            style: PlaceholderStyle::Postgres,
        }
    }

    #[must_use]
    pub fn with_style(mut self, style: PlaceholderStyle) -> Self {
        self.style = style;
        self
    }

    #[must_use]
    pub fn with_rows(self, columns: &[&str], rows: Vec<Vec<RowValues>>) -> Self {
        let columns = columns.iter().map(|c| (*c).to_string()).collect();
        *lock(&self.shared.rows) = Some((columns, rows));
        self
    }

    #[must_use]
    pub fn events(&self) -> Vec<DriverEvent> {
        lock(&self.shared.events).clone()
    }

    #[must_use]
    pub fn count(&self, event: &DriverEvent) -> usize {
        lock(&self.shared.events)
            .iter()
            .filter(|e| *e == event)
            .count()
    }

    /// Successful physical opens.
    #[must_use]
    pub fn opens(&self) -> usize {
        self.count(&DriverEvent::Open)
    }

    /// SQL text of every executed statement, in order.
    #[must_use]
    pub fn executed(&self) -> Vec<String> {
        lock(&self.shared.events)
            .iter()
            .filter_map(|e| match e {
                DriverEvent::Execute(sql) => Some(sql.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.shared.events).clear();
    }

    pub fn fail_open(&self, fail: bool) {
        lock(&self.shared.faults).open = fail;
    }

    /// Commit attempts are still recorded before failing.
    pub fn fail_commit(&self, fail: bool) {
        lock(&self.shared.faults).commit = fail;
    }

    /// Rollback attempts are still recorded before failing.
    pub fn fail_rollback(&self, fail: bool) {
        lock(&self.shared.faults).rollback = fail;
    }

    pub fn fail_close(&self, fail: bool) {
        lock(&self.shared.faults).close = fail;
    }

    /// Fail any statement whose SQL contains `needle`.
    pub fn fail_execute_containing(&self, needle: &str) {
        lock(&self.shared.faults).execute_containing = Some(needle.to_string());
    }
}

impl Connector for RecordingConnector {
    fn open(&self, _options: &ConnectOptions) -> Result<Box<dyn DriverConnection>, SqlScopeError> {
        self.shared.injected(|f| f.open, "open")?;
        self.shared.record(DriverEvent::Open);
        Ok(Box::new(RecordingConnection {
            shared: Arc::clone(&self.shared),
        }))
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        self.style
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

struct RecordingConnection {
    shared: Arc<Shared>,
}

impl DriverConnection for RecordingConnection {
    fn cursor(&mut self) -> Result<Box<dyn Cursor + '_>, SqlScopeError> {
        Ok(Box::new(RecordingCursor {
            shared: &self.shared,
            column_names: Vec::new(),
            rows: VecDeque::new(),
            rowcount: 0,
        }))
    }

    fn commit(&mut self) -> Result<(), SqlScopeError> {
        self.shared.record(DriverEvent::Commit);
        self.shared.injected(|f| f.commit, "commit")
    }

    fn rollback(&mut self) -> Result<(), SqlScopeError> {
        self.shared.record(DriverEvent::Rollback);
        self.shared.injected(|f| f.rollback, "rollback")
    }

    fn close(self: Box<Self>) -> Result<(), SqlScopeError> {
        self.shared.record(DriverEvent::Close);
        self.shared.injected(|f| f.close, "close")
    }
}

struct RecordingCursor<'c> {
    shared: &'c Shared,
    column_names: Vec<String>,
    rows: VecDeque<Vec<RowValues>>,
    rowcount: usize,
}

impl Cursor for RecordingCursor<'_> {
    fn execute(&mut self, sql: &str, _params: &[RowValues]) -> Result<(), SqlScopeError> {
        self.shared.record(DriverEvent::Execute(sql.to_string()));
        self.shared.injected(
            |f| {
                f.execute_containing
                    .as_deref()
                    .is_some_and(|needle| sql.contains(needle))
            },
            "execute",
        )?;

        let is_query = sql.trim_start().to_ascii_lowercase().starts_with("select");
        if is_query {
            let (columns, rows) = lock(&self.shared.rows).clone().unwrap_or_default();
            self.column_names = columns;
            self.rows = rows.into();
            self.rowcount = self.rows.len();
        } else {
            self.column_names.clear();
            self.rows.clear();
            self.rowcount = 1;
        }
        Ok(())
    }

    fn column_names(&self) -> &[String] {
        &self.column_names
    }

    fn fetch_one(&mut self) -> Result<Option<Vec<RowValues>>, SqlScopeError> {
        Ok(self.rows.pop_front())
    }

    fn fetch_all(&mut self) -> Result<Vec<Vec<RowValues>>, SqlScopeError> {
        Ok(self.rows.drain(..).collect())
    }

    fn rowcount(&self) -> usize {
        self.rowcount
    }
}
