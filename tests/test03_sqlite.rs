#![cfg(feature = "sqlite")]

use std::sync::Arc;

use sql_scope::prelude::*;
use tempfile::{TempDir, tempdir};

fn setup(prefix: &str) -> Result<(TempDir, Arc<Engine>), SqlScopeError> {
    setup_with(prefix, None)
}

fn setup_with(prefix: &str, init_sql: Option<&str>) -> Result<(TempDir, Arc<Engine>), SqlScopeError> {
    let dir = tempdir().map_err(|err| SqlScopeError::Other(err.to_string()))?;
    let path = dir.path().join(format!("{prefix}.db"));
    let mut builder = ConnectOptions::builder("", "", path.to_string_lossy().into_owned())
        .option("busy_timeout_ms", 5000);
    if let Some(init_sql) = init_sql {
        builder = builder.option("init_sql", init_sql);
    }
    let options = builder.finish();
    let engine = Engine::new(options, SqliteConnector);
    engine.context().update(
        "create table t (id integer primary key, x integer not null, note text)",
        &[],
    )?;
    Ok((dir, engine))
}

fn count(ctx: &mut ExecutionContext) -> Result<Option<i64>, SqlScopeError> {
    ctx.select_int("select count(*) from t", &[])
}

#[test]
fn committed_rows_are_visible_to_new_connections() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, engine) = setup("commit")?;
    let mut ctx = engine.context();
    ctx.with_transaction(|ctx| {
        ctx.insert("t", &[("id", RowValues::Int(1)), ("x", RowValues::Int(10))])?;
        ctx.insert("t", &[("id", RowValues::Int(2)), ("x", RowValues::Int(20))])?;
        Ok(())
    })?;

    let mut other = engine.context();
    assert_eq!(count(&mut other)?, Some(2));
    let row = other
        .select_one("select id, x, note from t where id = ?", &[RowValues::Int(2)])?
        .ok_or("missing row")?;
    assert_eq!(row["x"], RowValues::Int(20));
    assert!(row.get("note").is_some_and(RowValues::is_null));
    Ok(())
}

#[test]
fn nested_failure_discards_outer_work_too() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, engine) = setup("nested_rollback")?;
    let mut ctx = engine.context();

    let result = ctx.with_transaction(|ctx| {
        ctx.update("insert into t(id, x) values (?, ?)", &[RowValues::Int(1), RowValues::Int(1)])?;
        ctx.with_transaction(|ctx| {
            ctx.update("insert into t(id, x) values (?, ?)", &[RowValues::Int(2), RowValues::Int(2)])?;
            Err::<(), _>(SqlScopeError::Other("abort".into()))
        })
    });
    assert!(result.is_err());
    assert_eq!(count(&mut engine.context())?, Some(0));
    Ok(())
}

#[test]
fn constraint_violation_is_a_query_error_and_rolls_back() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, engine) = setup("constraint")?;
    let mut ctx = engine.context();

    let result = ctx.with_transaction(|ctx| {
        ctx.insert("t", &[("id", RowValues::Int(1)), ("x", RowValues::Int(1))])?;
        ctx.insert("t", &[("id", RowValues::Int(1)), ("x", RowValues::Int(2))])
    });
    assert!(matches!(result, Err(SqlScopeError::Query { .. })));
    assert_eq!(count(&mut ctx)?, Some(0));
    Ok(())
}

#[test]
fn sequential_updates_commit_independently() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, engine) = setup("autocommit")?;
    let mut ctx = engine.context();
    ctx.update("insert into t(id, x) values (?, ?)", &[RowValues::Int(1), RowValues::Int(1)])?;
    let failed = ctx.update("insert into t(id, x) values (?, ?)", &[RowValues::Int(1), RowValues::Int(9)]);
    assert!(failed.is_err());
    ctx.update("insert into t(id, x) values (?, ?)", &[RowValues::Int(2), RowValues::Int(2)])?;
    assert_eq!(ctx.transaction_depth(), 0);
    assert_eq!(count(&mut engine.context())?, Some(2));
    Ok(())
}

#[test]
fn select_one_without_match_is_none() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, engine) = setup("empty")?;
    let mut ctx = engine.context();
    let row = ctx.select_one("select * from t where id = ?", &[RowValues::Int(5)])?;
    assert!(row.is_none());
    assert!(ctx.select("select * from t", &[])?.is_empty());
    Ok(())
}

#[test]
fn rows_keep_column_order_and_types() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, engine) = setup("types")?;
    let mut ctx = engine.context();
    ctx.insert("t", &[
        ("id", RowValues::Int(1)),
        ("x", RowValues::Bool(true)),
        ("note", RowValues::from("it's ?")),
    ])?;
    let rows = ctx.select("select note, x, id from t where note = ?", &[RowValues::from("it's ?")])?;
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.column_names(), ["note", "x", "id"]);
    assert_eq!(row[1].as_bool(), Some(true));
    assert_eq!(row["note"].as_text(), Some("it's ?"));
    Ok(())
}

#[test]
fn thread_contexts_share_the_database() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, engine) = setup("threads")?;
    let handles: Vec<_> = (1..=4)
        .map(|id| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                engine.with_context(|ctx| {
                    ctx.with_transaction(|ctx| {
                        ctx.insert("t", &[("id", RowValues::Int(id)), ("x", RowValues::Int(id))])
                    })
                })
            })
        })
        .collect();
    for handle in handles {
        assert!(matches!(handle.join(), Ok(Ok(1))));
    }
    assert_eq!(count(&mut engine.context())?, Some(4));
    Ok(())
}

#[test]
fn transaction_reads_see_one_snapshot() -> Result<(), Box<dyn std::error::Error>> {
    // WAL lets the writer commit while the reader's transaction is open.
    let (_dir, engine) = setup_with("snapshot", Some("PRAGMA journal_mode = WAL;"))?;
    let mut ctx = engine.context();
    let mut writer = engine.context();

    let (before, after) = ctx.with_transaction(|ctx| {
        let before = count(ctx)?;
        writer.update("insert into t(id, x) values (?, ?)", &[RowValues::Int(1), RowValues::Int(1)])?;
        let after = count(ctx)?;
        Ok((before, after))
    })?;
    assert_eq!((before, after), (Some(0), Some(0)));
    assert_eq!(count(&mut ctx)?, Some(1));
    Ok(())
}
