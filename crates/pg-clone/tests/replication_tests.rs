//! Streaming copier and orchestrator behavior against in-memory drivers.

mod common;

use std::sync::Arc;

use common::{config, MockSource, MockTable, MockTarget};
use pg_clone::core::{Column, SqlValue};
use pg_clone::{
    Anonymizer, CopyOptions, ErrorKind, ReplicateError, Replicator, RunStatus, TableCopier,
};
use tokio_util::sync::CancellationToken;

fn copier(source: &Arc<MockSource>, target: &Arc<MockTarget>) -> TableCopier {
    TableCopier::new(
        source.clone(),
        target.clone(),
        Arc::new(Anonymizer::new(4)),
        "public",
        "public",
    )
}

fn opts(batch_size: usize) -> CopyOptions {
    CopyOptions {
        truncate_first: true,
        anonymize: false,
        batch_size,
    }
}

#[tokio::test]
async fn test_commit_count_is_ceil_rows_over_batch() {
    for (rows, batch, expected_commits) in [(0, 3, 0), (1, 3, 1), (6, 3, 2), (7, 3, 3), (10, 1, 10)] {
        let table = MockTable::numbered(rows);
        let columns = table.columns.clone();
        let source = Arc::new(MockSource::new().with_table("items", table));
        let target = Arc::new(MockTarget::new());

        let outcome = copier(&source, &target)
            .copy("items", &columns, &opts(batch), &CancellationToken::new())
            .await;

        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.rows_copied, rows as u64);
        let commits = target.commits_for("items");
        assert_eq!(commits.len(), expected_commits, "rows={} batch={}", rows, batch);
        if let Some(last) = commits.last() {
            assert_eq!(last.rows, rows - batch * (expected_commits - 1));
        }
        assert_eq!(target.rows("items").len(), rows);
    }
}

#[tokio::test]
async fn test_rows_keep_source_order_and_columns() {
    let table = MockTable::new(&[("b", "text"), ("a", "int8"), ("c", "numeric")]).with_rows(
        (0..5)
            .map(|i| {
                vec![
                    SqlValue::Text(format!("v{}", i)),
                    SqlValue::I64(i),
                    SqlValue::Text(format!("{}.50", i)),
                ]
            })
            .collect(),
    );
    let columns = table.columns.clone();
    let expected_rows = table.rows.clone();
    let source = Arc::new(MockSource::new().with_table("t", table));
    let target = Arc::new(MockTarget::new());

    let outcome = copier(&source, &target)
        .copy("t", &columns, &opts(2), &CancellationToken::new())
        .await;
    assert!(outcome.success);

    assert_eq!(target.rows("t"), expected_rows);
    for commit in target.commits() {
        assert_eq!(commit.columns, vec!["b", "a", "c"]);
    }
    let reads = source.reads();
    assert_eq!(reads.len(), 1);
    assert_eq!(reads[0].columns, columns);
    assert_eq!(reads[0].batch_size, 2);
}

#[tokio::test]
async fn test_truncate_first_is_optional() {
    let source = Arc::new(MockSource::new().with_table("t", MockTable::numbered(2)));
    let existing = vec![vec![SqlValue::I32(99), SqlValue::Text("old".into())]];
    let target = Arc::new(MockTarget::new().with_table("t", existing));
    let columns = MockTable::numbered(0).columns;

    let no_truncate = CopyOptions {
        truncate_first: false,
        ..opts(10)
    };
    let outcome = copier(&source, &target)
        .copy("t", &columns, &no_truncate, &CancellationToken::new())
        .await;
    assert!(outcome.success);
    assert!(target.truncates().is_empty());
    assert_eq!(target.rows("t").len(), 3);

    let outcome = copier(&source, &target)
        .copy("t", &columns, &opts(10), &CancellationToken::new())
        .await;
    assert!(outcome.success);
    assert_eq!(target.truncates(), vec!["t"]);
    assert_eq!(target.rows("t").len(), 2);
}

#[tokio::test]
async fn test_truncate_failure_aborts_before_reading() {
    let source = Arc::new(MockSource::new().with_table("t", MockTable::numbered(3)));
    let target = Arc::new(MockTarget::new().fail_truncate("t"));
    let columns = MockTable::numbered(0).columns;

    let outcome = copier(&source, &target)
        .copy("t", &columns, &opts(2), &CancellationToken::new())
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.rows_copied, 0);
    assert_eq!(outcome.error.unwrap().kind, ErrorKind::Write);
    assert!(source.reads().is_empty());
    assert!(target.commits().is_empty());
}

#[tokio::test]
async fn test_write_failure_keeps_committed_batches() {
    let source = Arc::new(MockSource::new().with_table("t", MockTable::numbered(10)));
    let target = Arc::new(MockTarget::new().fail_write_at("t", 2));
    let columns = MockTable::numbered(0).columns;

    let outcome = copier(&source, &target)
        .copy("t", &columns, &opts(3), &CancellationToken::new())
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.rows_copied, 6);
    assert_eq!(outcome.error.unwrap().kind, ErrorKind::Write);
    assert_eq!(target.commits_for("t").len(), 2);
    assert_eq!(target.rows("t").len(), 6);
}

#[tokio::test]
async fn test_read_failure_keeps_committed_batches() {
    let source = Arc::new(
        MockSource::new()
            .with_table("t", MockTable::numbered(10))
            .fail_read_after("t", 1),
    );
    let target = Arc::new(MockTarget::new());
    let columns = MockTable::numbered(0).columns;

    let outcome = copier(&source, &target)
        .copy("t", &columns, &opts(4), &CancellationToken::new())
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.rows_copied, 4);
    assert_eq!(outcome.error.unwrap().kind, ErrorKind::Read);
    assert_eq!(target.rows("t").len(), 4);
}

#[tokio::test]
async fn test_row_width_mismatch_is_a_read_error() {
    let table = MockTable::numbered(0).with_rows(vec![vec![SqlValue::I32(1)]]);
    let columns = table.columns.clone();
    let source = Arc::new(MockSource::new().with_table("t", table));
    let target = Arc::new(MockTarget::new());

    let outcome = copier(&source, &target)
        .copy("t", &columns, &opts(10), &CancellationToken::new())
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.error.unwrap().kind, ErrorKind::Read);
    assert!(target.commits().is_empty());
}

#[tokio::test]
async fn test_email_scenario_three_rows_batch_two() {
    let table = MockTable::new(&[("id", "int4"), ("email", "varchar")]).with_rows(
        (1..=3)
            .map(|i| {
                vec![
                    SqlValue::I32(i),
                    SqlValue::Text("john.doe@example.com".to_string()),
                ]
            })
            .collect(),
    );
    let source = Arc::new(MockSource::new().with_table("users", table));
    let target = Arc::new(MockTarget::new());
    let replicator = Replicator::with_drivers(
        config("  anonymize: true\n  batch_size: 2"),
        source.clone(),
        target.clone(),
    );

    let result = replicator
        .replicate_all(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.rows_copied, 3);
    let commits = target.commits_for("users");
    assert_eq!(commits.iter().map(|c| c.rows).collect::<Vec<_>>(), vec![2, 1]);

    for (i, row) in target.rows("users").iter().enumerate() {
        assert_eq!(row[0], SqlValue::I32(i as i32 + 1));
        let email = row[1].as_text().unwrap();
        let (local, domain) = email.split_once('@').unwrap();
        assert!(local.starts_with('j'), "{}", email);
        let stars = &local[1..];
        assert!((1..=5).contains(&stars.len()) && stars.chars().all(|c| c == '*'));
        assert!(["example.com", "test.com", "sample.org"].contains(&domain));
    }
}

#[tokio::test]
async fn test_anonymize_disabled_copies_verbatim() {
    let table = MockTable::new(&[("email", "text"), ("ssn", "int8")]).with_rows(vec![vec![
        SqlValue::Text("a@b.c".into()),
        SqlValue::I64(123456789),
    ]]);
    let expected = table.rows.clone();
    let source = Arc::new(MockSource::new().with_table("people", table));
    let target = Arc::new(MockTarget::new());
    let replicator = Replicator::with_drivers(config(""), source, target.clone());

    replicator
        .replicate_all(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(target.rows("people"), expected);
}

#[tokio::test]
async fn test_anonymize_leaves_text_transported_columns_alone() {
    // numeric and jsonb arrive as text but must be written back unchanged.
    let table = MockTable::new(&[
        ("id", "int4"),
        ("credit_limit", "numeric"),
        ("billing_address", "jsonb"),
        ("credit_card", "varchar"),
    ])
    .with_rows(vec![vec![
        SqlValue::I32(1),
        SqlValue::Text("2500.00".into()),
        SqlValue::Text(r#"{"street":"1 Main St"}"#.into()),
        SqlValue::Text("4111 1111 1111 1234".into()),
    ]]);
    let source = Arc::new(MockSource::new().with_table("accounts", table));
    let target = Arc::new(MockTarget::new());
    let replicator =
        Replicator::with_drivers(config("  anonymize: true"), source, target.clone());

    let result = replicator
        .replicate_all(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    let rows = target.rows("accounts");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], SqlValue::I32(1));
    assert_eq!(rows[0][1], SqlValue::Text("2500.00".into()));
    assert_eq!(rows[0][2], SqlValue::Text(r#"{"street":"1 Main St"}"#.into()));
    assert_eq!(rows[0][3], SqlValue::Text("****-****-****-1234".into()));
}

#[tokio::test]
async fn test_partial_failure_isolation() {
    let source = Arc::new(
        MockSource::new()
            .with_table("a_users", MockTable::numbered(5))
            .with_table("b_orders", MockTable::numbered(5))
            .with_table("c_items", MockTable::numbered(2)),
    );
    let target = Arc::new(MockTarget::new().fail_write_at("b_orders", 1));
    let replicator = Replicator::with_drivers(
        config("  batch_size: 2"),
        source.clone(),
        target.clone(),
    );

    let result = replicator
        .replicate_all(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.outcomes.len(), 3);
    assert_eq!(result.status, RunStatus::PartiallyCompleted);
    let a = &result.outcomes[0];
    assert!(a.success);
    assert_eq!((a.table.as_str(), a.rows_copied), ("a_users", 5));
    let b = &result.outcomes[1];
    assert!(!b.success);
    assert_eq!(b.rows_copied, 2);
    assert!(result.outcomes[2].success);
    assert_eq!(result.failed_tables, vec!["b_orders"]);
    assert_eq!(result.rows_copied, 9);
}

#[tokio::test]
async fn test_missing_table_in_allow_list_is_table_scoped() {
    let source = Arc::new(MockSource::new().with_table("users", MockTable::numbered(1)));
    let target = Arc::new(MockTarget::new());
    let replicator = Replicator::with_drivers(
        config("  tables: [ghost, users]"),
        source,
        target.clone(),
    );

    let result = replicator
        .replicate_all(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.tables_total, 2);
    let ghost = &result.outcomes[0];
    assert_eq!(ghost.table, "ghost");
    assert_eq!(ghost.error.as_ref().unwrap().kind, ErrorKind::CatalogQuery);
    assert!(result.outcomes[1].success);
    assert_eq!(target.rows("users").len(), 1);
}

#[tokio::test]
async fn test_discovery_applies_exclusions_in_catalog_order() {
    let source = Arc::new(
        MockSource::new()
            .with_table("orders", MockTable::numbered(1))
            .with_table("audit_log", MockTable::numbered(1))
            .with_table("users", MockTable::numbered(1)),
    );
    let replicator = Replicator::with_drivers(
        config("  exclude_tables: [audit_log, audit_*]"),
        source,
        Arc::new(MockTarget::new()),
    );

    assert_eq!(replicator.resolve_tables().await.unwrap(), vec!["orders", "users"]);
}

#[tokio::test]
async fn test_allow_list_bypasses_discovery() {
    let source = Arc::new(MockSource::new().fail_list_tables());
    let replicator = Replicator::with_drivers(
        config("  tables: [zeta, alpha]\n  exclude_tables: [zeta]"),
        source,
        Arc::new(MockTarget::new()),
    );

    assert_eq!(replicator.resolve_tables().await.unwrap(), vec!["zeta", "alpha"]);
}

#[tokio::test]
async fn test_discovery_failure_is_fatal() {
    let source = Arc::new(MockSource::new().fail_list_tables());
    let target = Arc::new(MockTarget::new());
    let replicator = Replicator::with_drivers(config(""), source, target.clone());

    let err = replicator
        .replicate_all(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ReplicateError::CatalogQuery { .. }));
    assert_eq!(err.exit_code(), 3);
    assert!(target.commits().is_empty());
}

#[tokio::test]
async fn test_cancellation_between_batches() {
    let cancel = CancellationToken::new();
    let source = Arc::new(
        MockSource::new()
            .with_table("a", MockTable::numbered(10))
            .with_table("b", MockTable::numbered(10)),
    );
    let target = Arc::new(MockTarget::new().cancel_after_commits(2, cancel.clone()));
    let replicator = Replicator::with_drivers(config("  batch_size: 3"), source, target.clone());

    let result = replicator.replicate_all(&cancel).await.unwrap();

    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(result.outcomes.len(), 1);
    let a = &result.outcomes[0];
    assert!(a.is_cancelled());
    assert_eq!(a.rows_copied, 6);
    assert_eq!(target.rows("a").len(), 6);
    assert!(target.commits_for("b").is_empty());
}

#[tokio::test]
async fn test_cancelled_before_start_attempts_nothing() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let source = Arc::new(MockSource::new().with_table("a", MockTable::numbered(3)));
    let target = Arc::new(MockTarget::new());
    let replicator = Replicator::with_drivers(config(""), source, target.clone());

    let result = replicator.replicate_all(&cancel).await.unwrap();
    assert_eq!(result.status, RunStatus::Cancelled);
    assert!(result.outcomes.is_empty());
    assert_eq!(result.tables_total, 1);
    assert!(target.truncates().is_empty());
}

#[tokio::test]
async fn test_health_check_over_mocks() {
    let replicator = Replicator::with_drivers(
        config(""),
        Arc::new(MockSource::new()),
        Arc::new(MockTarget::new()),
    );
    let health = replicator.health_check().await;
    assert!(health.healthy);
    assert!(health.source_connected && health.target_connected);
    assert!(health.source_error.is_none());
}

#[test]
fn test_column_helper_matches_introspection_order() {
    let table = MockTable::new(&[("z", "text"), ("y", "int4")]);
    assert_eq!(
        table.columns,
        vec![Column::new("z", "text", 1), Column::new("y", "int4", 2)]
    );
}
