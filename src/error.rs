use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlScopeError {
    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("engine already initialized")]
    AlreadyInitialized,

    #[error("engine not initialized")]
    NotInitialized,

    #[error("failed to open connection to {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: Box<SqlScopeError>,
    },

    /// An operation needed a live physical connection and none was open.
    #[error("no open connection: cannot {0}")]
    NoConnection(&'static str),

    #[error("query failed: {sql}: {source}")]
    Query {
        sql: String,
        #[source]
        source: Box<SqlScopeError>,
    },

    /// Commit at the end of a top-level transaction failed. `rollback` carries the
    /// failure of the compensating rollback, if that failed too.
    #[error("transaction commit failed: {source}{}", rollback_note(.rollback))]
    Commit {
        #[source]
        source: Box<SqlScopeError>,
        rollback: Option<Box<SqlScopeError>>,
    },

    /// Rollback failed while another error was already propagating. `original` is
    /// the primary error; the rollback failure is the chained source.
    #[error("{original} (rollback also failed: {rollback})")]
    Rollback {
        original: Box<SqlScopeError>,
        #[source]
        rollback: Box<SqlScopeError>,
    },

    #[error("transaction rolled back: a nested scope failed")]
    RolledBack,

    #[error("expected a single column, query returned {0}")]
    MultipleColumns(usize),

    #[error("execution context already in use on this thread")]
    ContextBusy,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Other database error: {0}")]
    Other(String),
}

fn rollback_note(rollback: &Option<Box<SqlScopeError>>) -> String {
    match rollback {
        Some(err) => format!(" (rollback also failed: {err})"),
        None => String::new(),
    }
}

impl SqlScopeError {
    /// The error that triggered a chained failure.
    ///
    /// For [`SqlScopeError::Rollback`] this is the body error that caused the
    /// rollback; every other variant is its own primary error.
    #[must_use]
    pub fn primary(&self) -> &SqlScopeError {
        match self {
            SqlScopeError::Rollback { original, .. } => original.primary(),
            other => other,
        }
    }

    pub(crate) fn query(sql: &str, source: SqlScopeError) -> Self {
        SqlScopeError::Query {
            sql: sql.to_string(),
            source: Box::new(source),
        }
    }
}
