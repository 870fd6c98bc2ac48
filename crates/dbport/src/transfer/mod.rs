//! Paginated data migration.
//!
//! Each table goes through sizing, an optional parent-first walk for
//! self-referencing tables, paging and emission:
//!
//! - [`PageReader`] counts and reads pages from the source connection
//! - [`InsertScriptBuilder`] turns a page into one batched INSERT
//! - [`ScriptSink`] collects script text in memory and/or a file
//! - [`BatchHandler`] receives execution-mode batches; [`TargetExecutor`]
//!   runs them on a target connection
//!
//! Cancellation is checked before every table and every page. A cancelled
//! run keeps everything emitted so far and is reported, not raised.

mod paging;
mod script;
mod sink;

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use paging::{PageConsumer, PageReader, TableRead};
pub use script::{InsertBatch, InsertScriptBuilder};
pub use sink::ScriptSink;

use crate::config::{BytesPolicy, Config};
use crate::core::{
    Connection, DatabaseType, Dialect, Parameter, RenderMode, Row, RunContext, SchemaSnapshot,
    Table, TableColumn,
};
use crate::drivers::DialectImpl;
use crate::error::Result;

/// Per-run migration settings.
#[derive(Debug, Clone)]
pub struct TransferOptions {
    /// Rows per page and per INSERT batch.
    pub batch_size: u64,
    /// Most values in one `IN (...)` predicate of the hierarchy walk.
    pub in_limit: usize,
    /// Tables with more rows than this are skipped.
    pub row_count_threshold: Option<u64>,
    pub insert_identity: bool,
    pub bytes_policy: BytesPolicy,
    pub strip_emoji: bool,
    /// Owner (schema) for target table names; derived per table when unset.
    pub target_owner: Option<String>,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            batch_size: 500,
            in_limit: 1000,
            row_count_threshold: None,
            insert_identity: true,
            bytes_policy: BytesPolicy::Hex,
            strip_emoji: false,
            target_owner: None,
        }
    }
}

impl TransferOptions {
    pub fn from_config(config: &Config) -> Self {
        let options = &config.options;
        Self {
            batch_size: options.batch_size as u64,
            in_limit: options.in_limit,
            row_count_threshold: options.row_count_threshold,
            insert_identity: options.insert_identity,
            bytes_policy: options.bytes_policy,
            strip_emoji: options.strip_emoji,
            target_owner: config.target.schema.clone(),
        }
    }
}

/// Owner to use for `owner` once moved from `source` to `target`.
///
/// An explicit override wins; the source's default owner maps to the
/// target's default owner; any other owner is kept.
pub fn target_owner(
    source: &DialectImpl,
    target: &DialectImpl,
    explicit: Option<&str>,
    owner: &str,
) -> String {
    match explicit {
        Some(o) => o.to_string(),
        None if owner.is_empty() || owner.eq_ignore_ascii_case(source.default_owner()) => {
            target.default_owner().to_string()
        }
        None => owner.to_string(),
    }
}

/// Receives every execution-mode batch.
#[async_trait]
pub trait BatchHandler: Send {
    async fn handle(&mut self, batch: &InsertBatch) -> Result<()>;
}

/// Runs statements on the target connection.
///
/// Once any error has been reported in the run, further statements are
/// skipped rather than executed.
pub struct TargetExecutor<'a> {
    ctx: &'a RunContext,
    conn: &'a mut dyn Connection,
    executed: usize,
    skipped: usize,
}

impl<'a> TargetExecutor<'a> {
    pub fn new(ctx: &'a RunContext, conn: &'a mut dyn Connection) -> Self {
        Self {
            ctx,
            conn,
            executed: 0,
            skipped: 0,
        }
    }

    /// Execute one statement; false when skipped or failed.
    pub async fn execute(&mut self, sql: &str, params: &[Parameter]) -> Result<bool> {
        if self.ctx.has_error() {
            self.skipped += 1;
            debug!("Skipping statement after an earlier error");
            return Ok(false);
        }
        match self.conn.execute(sql, params).await {
            Ok(affected) => {
                self.executed += 1;
                debug!(affected, "statement executed");
                Ok(true)
            }
            Err(e) if self.ctx.throw_on_error() => Err(e),
            Err(e) => {
                self.ctx
                    .feedback_error(format!("Failed to execute statement: {}", e));
                Ok(false)
            }
        }
    }

    pub fn executed(&self) -> usize {
        self.executed
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

#[async_trait]
impl<'a> BatchHandler for TargetExecutor<'a> {
    async fn handle(&mut self, batch: &InsertBatch) -> Result<()> {
        self.execute(&batch.sql, &batch.params).await.map(|_| ())
    }
}

/// Per-table outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub total_rows: u64,
    pub rows_transferred: u64,
    pub batches: usize,
    pub skipped: bool,
    pub unreachable_rows: u64,
    pub cancelled: bool,
}

/// Outcome of a data migration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationReport {
    pub tables: Vec<TableReport>,
    pub rows_transferred: u64,
    pub batches: usize,
    pub skipped_tables: Vec<String>,
    pub failed_tables: Vec<String>,
    /// Rows of self-referencing tables not reachable from a root row.
    pub unreachable_rows: u64,
    pub cancelled: bool,
    pub duration_seconds: f64,
}

impl MigrationReport {
    fn record(&mut self, table: TableReport) {
        self.rows_transferred += table.rows_transferred;
        self.batches += table.batches;
        self.unreachable_rows += table.unreachable_rows;
        if table.skipped {
            self.skipped_tables.push(table.table.clone());
        }
        self.cancelled |= table.cancelled;
        self.tables.push(table);
    }
}

/// Moves table data from a source connection into scripts and/or a target.
pub struct DataMigrator<'a> {
    ctx: &'a RunContext,
    source: DialectImpl,
    target: DialectImpl,
    options: TransferOptions,
}

impl<'a> DataMigrator<'a> {
    pub fn new(
        ctx: &'a RunContext,
        source: DialectImpl,
        target: DialectImpl,
        options: TransferOptions,
    ) -> Self {
        Self {
            ctx,
            source,
            target,
            options,
        }
    }

    /// Migrate every table of the snapshot in snapshot order.
    ///
    /// File-mode batches go to `sink` when it is active; execution-mode
    /// batches go to `handler` when one is given.
    pub async fn migrate(
        &self,
        snapshot: &SchemaSnapshot,
        conn: &mut dyn Connection,
        sink: &mut ScriptSink,
        mut handler: Option<&mut (dyn BatchHandler + '_)>,
    ) -> Result<MigrationReport> {
        let started = Instant::now();
        let mut report = MigrationReport::default();
        let count = snapshot.tables.len();

        for (index, table) in snapshot.tables.iter().enumerate() {
            if self.ctx.is_cancelled() {
                report.cancelled = true;
                break;
            }
            let outcome = self
                .migrate_table(
                    snapshot,
                    table,
                    (index + 1, count),
                    &mut *conn,
                    sink,
                    handler.as_deref_mut(),
                )
                .await;
            match outcome {
                Ok(table_report) => {
                    let cancelled = table_report.cancelled;
                    report.record(table_report);
                    if cancelled {
                        break;
                    }
                }
                Err(e) if self.ctx.throw_on_error() => return Err(e),
                Err(e) => {
                    self.ctx.feedback_error(format!(
                        "Failed to migrate data of table \"{}\": {}",
                        table.name, e
                    ));
                    report.failed_tables.push(table.full_name());
                }
            }
        }

        sink.flush().await?;
        report.duration_seconds = started.elapsed().as_secs_f64();
        if report.cancelled {
            warn!("Data migration cancelled after {} table(s)", report.tables.len());
            self.ctx.feedback("Data migration was cancelled.");
        } else {
            info!(
                "Migrated {} row(s) in {} batch(es) across {} table(s) in {:.1}s",
                report.rows_transferred,
                report.batches,
                report.tables.len(),
                report.duration_seconds
            );
        }
        Ok(report)
    }

    async fn migrate_table(
        &self,
        snapshot: &SchemaSnapshot,
        table: &Table,
        position: (usize, usize),
        conn: &mut dyn Connection,
        sink: &mut ScriptSink,
        handler: Option<&mut (dyn BatchHandler + '_)>,
    ) -> Result<TableReport> {
        let columns = snapshot.columns_of(table);
        let owner = target_owner(
            &self.source,
            &self.target,
            self.options.target_owner.as_deref(),
            &table.owner,
        );
        let target_name = self.target.qualify_object(&owner, &table.name);
        let identity_insert = self.target.database_type() == DatabaseType::SqlServer
            && self.options.insert_identity
            && columns.iter().any(|c| c.is_identity);

        let mut emitter = BatchEmitter {
            ctx: self.ctx,
            table: table.full_name(),
            target_name,
            columns,
            file_builder: InsertScriptBuilder::new(self.target, RenderMode::File)
                .with_insert_identity(self.options.insert_identity),
            exec_builder: InsertScriptBuilder::new(self.target, RenderMode::Execution)
                .with_insert_identity(self.options.insert_identity),
            sink,
            handler,
            identity_insert,
            identity_on: false,
            rows: 0,
            batches: 0,
        };
        let read = PageReader::new(self.ctx, self.source, &self.options)
            .read(conn, snapshot, table, position, &mut emitter)
            .await?;
        emitter.finish().await?;

        let report = TableReport {
            table: emitter.table,
            total_rows: read.total,
            rows_transferred: emitter.rows,
            batches: emitter.batches,
            skipped: read.skipped,
            unreachable_rows: read.unreachable,
            cancelled: read.cancelled,
        };
        if report.batches > 0 {
            self.ctx.feedback(format!(
                "Table \"{}\":{} record(s) written in {} batch(es).",
                table.name, report.rows_transferred, report.batches
            ));
        }
        Ok(report)
    }
}

/// Turns each page into a batch and writes it before the next page is read.
struct BatchEmitter<'e, 'h> {
    ctx: &'e RunContext,
    table: String,
    target_name: String,
    columns: Vec<&'e TableColumn>,
    file_builder: InsertScriptBuilder,
    exec_builder: InsertScriptBuilder,
    sink: &'e mut ScriptSink,
    handler: Option<&'e mut (dyn BatchHandler + 'h)>,
    /// `SET IDENTITY_INSERT` framing is needed around the batches.
    identity_insert: bool,
    identity_on: bool,
    rows: u64,
    batches: usize,
}

impl<'e, 'h> BatchEmitter<'e, 'h> {
    async fn emit_statement(&mut self, sql: &str) -> Result<()> {
        if self.sink.is_active() {
            self.sink.write(self.ctx, sql).await?;
        }
        if let Some(h) = self.handler.as_deref_mut() {
            let batch = InsertBatch {
                table: self.table.clone(),
                page_number: 0,
                sql: sql.to_string(),
                params: Vec::new(),
                row_count: 0,
            };
            h.handle(&batch).await?;
        }
        Ok(())
    }

    /// Close the identity framing opened by the first batch.
    async fn finish(&mut self) -> Result<()> {
        if self.identity_on {
            let off = format!("SET IDENTITY_INSERT {} OFF;", self.target_name);
            self.emit_statement(&off).await?;
            self.identity_on = false;
        }
        Ok(())
    }
}

#[async_trait]
impl<'e, 'h> PageConsumer for BatchEmitter<'e, 'h> {
    async fn consume(&mut self, page_number: u64, rows: &[Row]) -> Result<()> {
        if self.identity_insert && !self.identity_on {
            let on = format!("SET IDENTITY_INSERT {} ON;", self.target_name);
            self.emit_statement(&on).await?;
            self.identity_on = true;
        }
        if self.sink.is_active() {
            if let Some(batch) = self.file_builder.build(
                &self.table,
                &self.target_name,
                &self.columns,
                rows,
                page_number,
            ) {
                self.sink.write(self.ctx, &batch.sql).await?;
            }
        }
        if let Some(h) = self.handler.as_deref_mut() {
            if let Some(batch) = self.exec_builder.build(
                &self.table,
                &self.target_name,
                &self.columns,
                rows,
                page_number,
            ) {
                h.handle(&batch).await?;
            }
        }
        self.rows += rows.len() as u64;
        self.batches += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SqlValue;
    use crate::error::ConvertError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn dialect(db: DatabaseType) -> DialectImpl {
        DialectImpl::for_type(db)
    }

    /// Serves two-row pages of a single `Id` column and counts page queries.
    struct PagedSource {
        pages: i64,
        served: Arc<AtomicUsize>,
        fail_on: Option<&'static str>,
        executed: Vec<String>,
    }

    impl PagedSource {
        fn new(pages: i64, served: &Arc<AtomicUsize>) -> Self {
            Self {
                pages,
                served: Arc::clone(served),
                fail_on: None,
                executed: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Connection for PagedSource {
        fn database_type(&self) -> DatabaseType {
            DatabaseType::Sqlite
        }

        fn database_name(&self) -> &str {
            "main"
        }

        async fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
            let columns: Arc<[String]> = vec!["Id".to_string()].into();
            if sql.contains("COUNT(1)") {
                return Ok(vec![Row::new(columns, vec![SqlValue::I64(self.pages * 2)])]);
            }
            let page = self.served.fetch_add(1, Ordering::SeqCst) as i64;
            Ok((1..=2)
                .map(|i| Row::new(Arc::clone(&columns), vec![SqlValue::I64(page * 2 + i)]))
                .collect())
        }

        async fn execute(&mut self, sql: &str, _params: &[Parameter]) -> Result<u64> {
            if self.fail_on == Some(sql) {
                return Err(ConvertError::query(sql, "constraint violation"));
            }
            self.executed.push(sql.to_string());
            Ok(1)
        }

        async fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    /// Records how many pages the source had served when each batch arrived.
    struct ServedAtBatch {
        served: Arc<AtomicUsize>,
        seen: Vec<usize>,
        cancel_after_first: Option<CancellationToken>,
    }

    #[async_trait]
    impl BatchHandler for ServedAtBatch {
        async fn handle(&mut self, batch: &InsertBatch) -> Result<()> {
            assert_eq!(batch.row_count, 2);
            self.seen.push(self.served.load(Ordering::SeqCst));
            if let Some(token) = &self.cancel_after_first {
                token.cancel();
            }
            Ok(())
        }
    }

    fn items() -> SchemaSnapshot {
        let table = Table::new("main", "items");
        SchemaSnapshot {
            table_columns: vec![TableColumn::new(&table, "Id", "INTEGER", 1)],
            tables: vec![table],
            ..SchemaSnapshot::default()
        }
    }

    fn paged_options() -> TransferOptions {
        TransferOptions {
            batch_size: 2,
            ..TransferOptions::default()
        }
    }

    #[tokio::test]
    async fn test_each_page_is_written_before_the_next_read() {
        let served = Arc::new(AtomicUsize::new(0));
        let mut source = PagedSource::new(3, &served);
        let ctx = RunContext::new("test");
        let migrator = DataMigrator::new(
            &ctx,
            dialect(DatabaseType::Sqlite),
            dialect(DatabaseType::Postgres),
            paged_options(),
        );
        let mut handler = ServedAtBatch {
            served: Arc::clone(&served),
            seen: Vec::new(),
            cancel_after_first: None,
        };
        let mut sink = ScriptSink::new().with_string();

        let report = migrator
            .migrate(
                &items(),
                &mut source,
                &mut sink,
                Some(&mut handler as &mut dyn BatchHandler),
            )
            .await
            .unwrap();

        assert_eq!(handler.seen, vec![1, 2, 3]);
        assert_eq!(report.rows_transferred, 6);
        assert_eq!(report.batches, 3);
        let script = sink.finish().await.unwrap().unwrap();
        assert_eq!(script.matches("INSERT INTO").count(), 3);
    }

    #[tokio::test]
    async fn test_cancel_between_pages_stops_reading() {
        let served = Arc::new(AtomicUsize::new(0));
        let mut source = PagedSource::new(3, &served);
        let ctx = RunContext::new("test");
        let migrator = DataMigrator::new(
            &ctx,
            dialect(DatabaseType::Sqlite),
            dialect(DatabaseType::Postgres),
            paged_options(),
        );
        let mut handler = ServedAtBatch {
            served: Arc::clone(&served),
            seen: Vec::new(),
            cancel_after_first: Some(ctx.cancel_token().clone()),
        };
        let mut sink = ScriptSink::new();

        let report = migrator
            .migrate(
                &items(),
                &mut source,
                &mut sink,
                Some(&mut handler as &mut dyn BatchHandler),
            )
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(served.load(Ordering::SeqCst), 1);
        assert_eq!(report.rows_transferred, 2);
        assert_eq!(report.batches, 1);
    }

    #[tokio::test]
    async fn test_executor_skips_after_first_failure() {
        let served = Arc::new(AtomicUsize::new(0));
        let mut target = PagedSource::new(0, &served);
        target.fail_on = Some("INSERT 2");
        let ctx = RunContext::new("test");

        let mut executor = TargetExecutor::new(&ctx, &mut target);
        assert!(executor.execute("INSERT 1", &[]).await.unwrap());
        assert!(!executor.execute("INSERT 2", &[]).await.unwrap());
        assert!(ctx.has_error());
        assert!(!executor.execute("INSERT 3", &[]).await.unwrap());
        assert!(!executor.execute("INSERT 4", &[]).await.unwrap());
        assert_eq!(executor.executed(), 1);
        assert_eq!(executor.skipped(), 2);
        drop(executor);

        assert_eq!(target.executed, vec!["INSERT 1".to_string()]);
    }

    #[tokio::test]
    async fn test_executor_throws_when_asked() {
        let served = Arc::new(AtomicUsize::new(0));
        let mut target = PagedSource::new(0, &served);
        target.fail_on = Some("INSERT 1");
        let ctx = RunContext::new("test").with_throw_on_error(true);

        let mut executor = TargetExecutor::new(&ctx, &mut target);
        assert!(executor.execute("INSERT 1", &[]).await.is_err());
        assert!(!ctx.has_error());
        assert_eq!(executor.skipped(), 0);
    }

    #[test]
    fn test_target_owner() {
        let mssql = dialect(DatabaseType::SqlServer);
        let pg = dialect(DatabaseType::Postgres);
        let mysql = dialect(DatabaseType::MySql);
        assert_eq!(target_owner(&mssql, &pg, None, "dbo"), "public");
        assert_eq!(target_owner(&mssql, &pg, None, "sales"), "sales");
        assert_eq!(target_owner(&mssql, &mysql, None, "DBO"), "");
        assert_eq!(target_owner(&mssql, &pg, Some("staging"), "dbo"), "staging");
    }

    #[test]
    fn test_options_from_config() {
        let yaml = r#"
source:
  type: sqlite
  database: shop.db
target:
  type: postgres
  schema: staging
options:
  batch_size: 50
  bytes_policy: "null"
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let options = TransferOptions::from_config(&config);
        assert_eq!(options.batch_size, 50);
        assert_eq!(options.in_limit, 1000);
        assert_eq!(options.bytes_policy, BytesPolicy::Null);
        assert_eq!(options.target_owner.as_deref(), Some("staging"));
    }

    #[test]
    fn test_report_totals() {
        let mut report = MigrationReport::default();
        report.record(TableReport {
            table: "a".into(),
            rows_transferred: 10,
            batches: 2,
            ..TableReport::default()
        });
        report.record(TableReport {
            table: "b".into(),
            skipped: true,
            ..TableReport::default()
        });
        report.record(TableReport {
            table: "c".into(),
            rows_transferred: 3,
            batches: 1,
            unreachable_rows: 2,
            ..TableReport::default()
        });
        assert_eq!(report.rows_transferred, 13);
        assert_eq!(report.batches, 3);
        assert_eq!(report.skipped_tables, vec!["b".to_string()]);
        assert_eq!(report.unreachable_rows, 2);
        assert!(!report.cancelled);
    }
}
