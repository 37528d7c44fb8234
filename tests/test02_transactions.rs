use std::error::Error as _;

use sql_scope::prelude::*;
use sql_scope::test_utils::{DriverEvent, RecordingConnector};

fn setup() -> (RecordingConnector, ExecutionContext) {
    let connector = RecordingConnector::new();
    let engine = Engine::new(ConnectOptions::new("app", "pw", "shop"), connector.clone());
    (connector, engine.context())
}

fn finishes(connector: &RecordingConnector) -> (usize, usize) {
    (
        connector.count(&DriverEvent::Commit),
        connector.count(&DriverEvent::Rollback),
    )
}

/// Nest `depth` transactions, each doing one update, and fail at `fail_at` if set.
fn nested(
    ctx: &mut ExecutionContext,
    depth: usize,
    fail_at: Option<usize>,
) -> Result<(), SqlScopeError> {
    ctx.with_transaction(|ctx| {
        ctx.update("update t set x = ?", &[RowValues::Int(depth as i64)])?;
        if fail_at == Some(depth) {
            return Err(SqlScopeError::Other(format!("failure at depth {depth}")));
        }
        if depth > 1 {
            nested(ctx, depth - 1, fail_at)?;
        }
        Ok(())
    })
}

#[test]
fn exactly_one_finish_per_top_level_transaction() -> Result<(), Box<dyn std::error::Error>> {
    for depth in 1..=5 {
        let (connector, mut ctx) = setup();
        nested(&mut ctx, depth, None)?;
        assert_eq!(finishes(&connector), (1, 0), "depth {depth}");
        assert_eq!(connector.events().last(), Some(&DriverEvent::Close));
        assert_eq!(ctx.transaction_depth(), 0);

        for fail_at in 1..=depth {
            let (connector, mut ctx) = setup();
            let err = nested(&mut ctx, depth, Some(fail_at));
            assert!(err.is_err(), "depth {depth} fail_at {fail_at}");
            assert_eq!(finishes(&connector), (0, 1), "depth {depth} fail_at {fail_at}");
            assert_eq!(connector.opens(), 1);
            assert_eq!(ctx.transaction_depth(), 0);
            assert!(!ctx.is_initialized());
        }
    }
    Ok(())
}

#[test]
fn finish_happens_only_when_depth_returns_to_zero() -> Result<(), Box<dyn std::error::Error>> {
    let (connector, mut ctx) = setup();
    ctx.with_transaction(|ctx| {
        ctx.update("update t set x = 1", &[])?;
        ctx.with_transaction(|ctx| {
            assert_eq!(ctx.transaction_depth(), 2);
            ctx.update("update t set x = 2", &[])
        })?;
        assert_eq!(ctx.transaction_depth(), 1);
        assert_eq!(connector.count(&DriverEvent::Commit), 0);
        Ok(())
    })?;
    assert_eq!(
        connector.events(),
        vec![
            DriverEvent::Open,
            DriverEvent::Execute("update t set x = 1".into()),
            DriverEvent::Execute("update t set x = 2".into()),
            DriverEvent::Commit,
            DriverEvent::Close,
        ]
    );
    Ok(())
}

#[test]
fn inner_failure_rolls_back_whole_transaction_once() {
    let (connector, mut ctx) = setup();

    let result = ctx.with_transaction(|ctx| {
        assert_eq!(ctx.transaction_depth(), 1);
        ctx.update("insert into t(x) values (?)", &[RowValues::Int(1)])?;
        let inner = ctx.with_transaction(|ctx| {
            assert_eq!(ctx.transaction_depth(), 2);
            Err::<(), _>(SqlScopeError::Other("inner failed".into()))
        });
        assert_eq!(ctx.transaction_depth(), 1);
        assert!(ctx.is_rollback_only());
        assert_eq!(connector.count(&DriverEvent::Rollback), 0);
        inner
    });

    assert!(matches!(result, Err(SqlScopeError::Other(ref msg)) if msg == "inner failed"));
    assert_eq!(
        connector.events(),
        vec![
            DriverEvent::Open,
            DriverEvent::Execute("insert into t(x) values ($1)".into()),
            DriverEvent::Rollback,
            DriverEvent::Close,
        ]
    );
    assert_eq!(ctx.transaction_depth(), 0);
}

#[test]
fn swallowed_inner_failure_refuses_to_commit() {
    let (connector, mut ctx) = setup();

    let result = ctx.with_transaction(|ctx| {
        ctx.update("insert into t(x) values (?)", &[RowValues::Int(1)])?;
        let _ignored = ctx.with_transaction(|_| {
            Err::<(), _>(SqlScopeError::Other("inner failed".into()))
        });
        Ok(())
    });

    assert!(matches!(result, Err(SqlScopeError::RolledBack)));
    assert_eq!(finishes(&connector), (0, 1));
}

#[test]
fn commit_failure_propagates_and_rolls_back() {
    let (connector, mut ctx) = setup();
    connector.fail_commit(true);

    let result = ctx.with_transaction(|ctx| ctx.update("update t set x = 1", &[]));

    match result {
        Err(SqlScopeError::Commit { rollback, .. }) => assert!(rollback.is_none()),
        other => panic!("expected commit error, got {other:?}"),
    }
    assert_eq!(finishes(&connector), (1, 1));
    assert!(!ctx.is_initialized());
    assert_eq!(connector.count(&DriverEvent::Close), 1);
}

#[test]
fn commit_and_rollback_failures_are_both_reported() {
    let (connector, mut ctx) = setup();
    connector.fail_commit(true);
    connector.fail_rollback(true);

    let result = ctx.with_transaction(|ctx| ctx.update("update t set x = 1", &[]));

    match result {
        Err(SqlScopeError::Commit { rollback, .. }) => assert!(rollback.is_some()),
        other => panic!("expected commit error, got {other:?}"),
    }
}

#[test]
fn rollback_failure_keeps_original_error_primary() {
    let (connector, mut ctx) = setup();
    connector.fail_rollback(true);

    let result = ctx.with_transaction(|ctx| {
        ctx.update("update t set x = 1", &[])?;
        Err::<(), _>(SqlScopeError::Other("body failed".into()))
    });

    let err = match result {
        Err(err) => err,
        Ok(()) => panic!("expected failure"),
    };
    assert!(matches!(err.primary(), SqlScopeError::Other(msg) if msg == "body failed"));
    assert!(matches!(err, SqlScopeError::Rollback { .. }));
    assert!(err.source().is_some());
    assert_eq!(finishes(&connector), (0, 1));
    assert!(!ctx.is_initialized());
}

#[test]
fn sequential_updates_outside_transaction_autocommit() -> Result<(), Box<dyn std::error::Error>> {
    let (connector, mut ctx) = setup();
    ctx.update("insert into t(x) values (?)", &[RowValues::Int(1)])?;
    assert_eq!(ctx.transaction_depth(), 0);
    ctx.update("insert into t(x) values (?)", &[RowValues::Int(2)])?;
    assert_eq!(ctx.transaction_depth(), 0);
    assert_eq!(finishes(&connector), (2, 0));
    Ok(())
}

#[test]
fn transaction_borrows_connection_of_enclosing_scope() -> Result<(), Box<dyn std::error::Error>> {
    let (connector, mut ctx) = setup();
    ctx.with_connection(|ctx| {
        ctx.with_transaction(|ctx| ctx.update("update t set x = 1", &[]))?;
        assert!(ctx.is_initialized());
        ctx.with_transaction(|ctx| ctx.update("update t set x = 2", &[]))?;
        Ok(())
    })?;
    assert_eq!(connector.opens(), 1);
    assert_eq!(finishes(&connector), (2, 0));
    assert_eq!(connector.count(&DriverEvent::Close), 1);
    Ok(())
}

#[test]
fn guard_api_mirrors_closure_api() -> Result<(), Box<dyn std::error::Error>> {
    let (connector, mut ctx) = setup();
    let mut tx = ctx.begin();
    tx.update("update t set x = ?", &[RowValues::Int(3)])?;
    let mut inner = tx.begin();
    inner.update("update t set y = ?", &[RowValues::Int(4)])?;
    inner.commit()?;
    tx.commit()?;
    assert_eq!(finishes(&connector), (1, 0));
    Ok(())
}
