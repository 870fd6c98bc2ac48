//! Data migration from an in-memory SQLite source.

use dbport::config::Config;
use dbport::core::{Connection, DatabaseType, RunContext, SchemaFilter, SchemaSnapshot};
use dbport::drivers::sqlite::{SqliteCatalog, SqliteConnection};
use dbport::drivers::DialectImpl;
use dbport::schema::SchemaFetcher;
use dbport::transfer::{DataMigrator, ScriptSink, TransferOptions};

fn config(batch_size: usize) -> Config {
    let yaml = format!(
        r#"
source:
  type: sqlite
  database: ":memory:"
target:
  type: postgres
options:
  batch_size: {}
  output_modes: [string]
"#,
        batch_size
    );
    Config::from_yaml(&yaml).unwrap()
}

async fn seed(conn: &mut SqliteConnection, statements: &[&str]) {
    for sql in statements {
        conn.execute(sql, &[]).await.unwrap();
    }
}

async fn snapshot(ctx: &RunContext, conn: &mut SqliteConnection) -> SchemaSnapshot {
    SchemaFetcher::new(ctx)
        .fetch(conn, &SqliteCatalog, &SchemaFilter::all())
        .await
        .unwrap()
}

async fn migrate(
    config: &Config,
    conn: &mut SqliteConnection,
) -> (dbport::MigrationReport, String) {
    let ctx = RunContext::new("test");
    let snapshot = snapshot(&ctx, conn).await;
    let migrator = DataMigrator::new(
        &ctx,
        DialectImpl::for_type(DatabaseType::Sqlite),
        DialectImpl::for_type(DatabaseType::Postgres),
        TransferOptions::from_config(config),
    );
    let mut sink = ScriptSink::new().with_string();
    let report = migrator
        .migrate(&snapshot, conn, &mut sink, None)
        .await
        .unwrap();
    let script = sink.finish().await.unwrap().unwrap();
    (report, script)
}

#[tokio::test]
async fn test_every_row_lands_in_exactly_one_batch() {
    let config = config(3);
    let mut conn = SqliteConnection::connect(&config.source).await.unwrap();
    seed(
        &mut conn,
        &["CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL)"],
    )
    .await;
    for i in 1..=7 {
        conn.execute(&format!("INSERT INTO items VALUES ({}, 'item {}')", i, i), &[])
            .await
            .unwrap();
    }

    let (report, script) = migrate(&config, &mut conn).await;

    assert_eq!(report.rows_transferred, 7);
    assert_eq!(report.batches, 3);
    assert_eq!(report.tables[0].total_rows, 7);
    assert_eq!(script.matches("INSERT INTO \"public\".\"items\"").count(), 3);
    for i in 1..=7 {
        assert_eq!(script.matches(&format!("'item {}'", i)).count(), 1, "item {}", i);
    }
    let first = script.find("'item 1'").unwrap();
    let last = script.find("'item 7'").unwrap();
    assert!(first < last);
}

#[tokio::test]
async fn test_parents_are_emitted_before_children() {
    let config = config(2);
    let mut conn = SqliteConnection::connect(&config.source).await.unwrap();
    seed(
        &mut conn,
        &[
            "CREATE TABLE nodes (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES nodes(id), name TEXT)",
            // Children are stored before their parents.
            "INSERT INTO nodes VALUES (1, 4, 'grandchild a')",
            "INSERT INTO nodes VALUES (2, 5, 'grandchild b')",
            "INSERT INTO nodes VALUES (4, 3, 'child a')",
            "INSERT INTO nodes VALUES (5, 3, 'child b')",
            "INSERT INTO nodes VALUES (3, NULL, 'root')",
        ],
    )
    .await;

    let (report, script) = migrate(&config, &mut conn).await;

    assert_eq!(report.rows_transferred, 5);
    assert_eq!(report.unreachable_rows, 0);
    let batches: Vec<&str> = script.split("INSERT INTO").skip(1).collect();
    assert_eq!(batches.len(), 3);
    assert!(batches[0].contains("'root'"));
    assert!(batches[1].contains("'child a'") && batches[1].contains("'child b'"));
    assert!(batches[2].contains("'grandchild a'") && batches[2].contains("'grandchild b'"));
}

#[tokio::test]
async fn test_rows_outside_the_hierarchy_are_reported() {
    let config = config(10);
    let mut conn = SqliteConnection::connect(&config.source).await.unwrap();
    seed(
        &mut conn,
        &[
            "CREATE TABLE nodes (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES nodes(id), name TEXT)",
            "INSERT INTO nodes VALUES (1, NULL, 'root')",
            "INSERT INTO nodes VALUES (2, 1, 'child')",
            "INSERT INTO nodes VALUES (3, 99, 'stray')",
        ],
    )
    .await;

    let (report, script) = migrate(&config, &mut conn).await;

    assert_eq!(report.rows_transferred, 2);
    assert_eq!(report.unreachable_rows, 1);
    assert!(!script.contains("'stray'"));
}

async fn forest(config: &Config) -> SqliteConnection {
    let mut conn = SqliteConnection::connect(&config.source).await.unwrap();
    seed(
        &mut conn,
        &[
            "CREATE TABLE nodes (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES nodes(id), name TEXT)",
            "INSERT INTO nodes VALUES (7, 4, 'n7')",
            "INSERT INTO nodes VALUES (8, 6, 'n8')",
            "INSERT INTO nodes VALUES (4, 1, 'n4')",
            "INSERT INTO nodes VALUES (5, 2, 'n5')",
            "INSERT INTO nodes VALUES (6, 3, 'n6')",
            "INSERT INTO nodes VALUES (1, NULL, 'n1')",
            "INSERT INTO nodes VALUES (2, NULL, 'n2')",
            "INSERT INTO nodes VALUES (3, NULL, 'n3')",
        ],
    )
    .await;
    conn
}

#[tokio::test]
async fn test_child_lookups_respect_in_limit() {
    let yaml = r#"
source:
  type: sqlite
  database: ":memory:"
target:
  type: postgres
options:
  batch_size: 10
  in_limit: 1
  output_modes: [string]
"#;
    let cfg = Config::from_yaml(yaml).unwrap();
    let mut conn = forest(&cfg).await;

    let (report, script) = migrate(&cfg, &mut conn).await;

    assert_eq!(report.rows_transferred, 8);
    assert_eq!(report.unreachable_rows, 0);
    // One lookup per parent key: roots, then 4, 7, 5, 6, 8 one at a time.
    assert_eq!(report.batches, 6);
    let at = |name: &str| script.find(&format!("'{}'", name)).unwrap();
    for (child, parent) in [("n4", "n1"), ("n5", "n2"), ("n6", "n3"), ("n7", "n4"), ("n8", "n6")] {
        assert!(at(parent) < at(child), "{} before {}", parent, child);
    }

    let wide = config(10);
    let mut conn = forest(&wide).await;
    let (report, _) = migrate(&wide, &mut conn).await;
    assert_eq!(report.batches, 3);
}

#[tokio::test]
async fn test_threshold_skips_large_tables() {
    let yaml = r#"
source:
  type: sqlite
  database: ":memory:"
target:
  type: mysql
options:
  row_count_threshold: 1
  output_modes: [string]
"#;
    let config = Config::from_yaml(yaml).unwrap();
    let mut conn = SqliteConnection::connect(&config.source).await.unwrap();
    seed(
        &mut conn,
        &[
            "CREATE TABLE big (id INTEGER PRIMARY KEY)",
            "INSERT INTO big VALUES (1)",
            "INSERT INTO big VALUES (2)",
            "CREATE TABLE small (id INTEGER PRIMARY KEY)",
            "INSERT INTO small VALUES (1)",
        ],
    )
    .await;

    let ctx = RunContext::new("test");
    let snapshot = snapshot(&ctx, &mut conn).await;
    let migrator = DataMigrator::new(
        &ctx,
        DialectImpl::for_type(DatabaseType::Sqlite),
        DialectImpl::for_type(DatabaseType::MySql),
        TransferOptions::from_config(&config),
    );
    let mut sink = ScriptSink::new().with_string();
    let report = migrator
        .migrate(&snapshot, &mut conn, &mut sink, None)
        .await
        .unwrap();

    assert_eq!(report.skipped_tables, vec!["main.big".to_string()]);
    assert_eq!(report.rows_transferred, 1);
    let script = sink.finish().await.unwrap().unwrap();
    assert!(script.contains("`small`"));
    assert!(!script.contains("`big`"));
}

#[tokio::test]
async fn test_cancelled_run_emits_nothing() {
    let config = config(2);
    let mut conn = SqliteConnection::connect(&config.source).await.unwrap();
    seed(
        &mut conn,
        &["CREATE TABLE t (id INTEGER PRIMARY KEY)", "INSERT INTO t VALUES (1)"],
    )
    .await;

    let ctx = RunContext::new("test");
    let snapshot = snapshot(&ctx, &mut conn).await;
    ctx.cancel();
    let migrator = DataMigrator::new(
        &ctx,
        DialectImpl::for_type(DatabaseType::Sqlite),
        DialectImpl::for_type(DatabaseType::Postgres),
        TransferOptions::from_config(&config),
    );
    let mut sink = ScriptSink::new().with_string();
    let report = migrator
        .migrate(&snapshot, &mut conn, &mut sink, None)
        .await
        .unwrap();
    assert!(report.cancelled);
    assert_eq!(report.rows_transferred, 0);
    assert_eq!(sink.finish().await.unwrap().unwrap(), "");
    Box::new(conn).close().await.unwrap();
}
