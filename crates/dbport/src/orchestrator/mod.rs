//! Conversion orchestrator - runs fetch, schema script and data migration.

use std::path::PathBuf;
use std::time::Instant;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ConnectionConfig};
use crate::core::{Connection, FeedbackSender, RunContext, SchemaSnapshot};
use crate::drivers::{self, DialectImpl};
use crate::error::Result;
use crate::generate::{GenerateOptions, SchemaScriptGenerator};
use crate::schema::{FetchOptions, SchemaFetcher};
use crate::transfer::{
    BatchHandler, DataMigrator, MigrationReport, ScriptSink, TargetExecutor, TransferOptions,
};

const FEEDBACK_OWNER: &str = "Converter";

/// End-to-end conversion of one source database.
pub struct Converter {
    config: Config,
    feedback: Option<FeedbackSender>,
    cancel: CancellationToken,
}

/// Result of a conversion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status: completed, completed_with_errors or cancelled.
    pub status: String,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,

    /// Source database name.
    pub database: String,

    /// Objects read from the source catalog.
    pub objects_fetched: usize,

    /// Statements in the schema script.
    pub schema_statements: usize,

    /// Schema script text, when kept in memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_script: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_file: Option<PathBuf>,

    /// Data migration outcome, when data was migrated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<MigrationReport>,

    /// Data script text, when kept in memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_script: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_file: Option<PathBuf>,

    /// Statements run against the target connection.
    pub target_statements: usize,

    /// At least one error was reported during the run.
    pub has_error: bool,
}

/// Connectivity of the configured databases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_error: Option<String>,

    /// False when no target connection is configured.
    pub target_configured: bool,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_error: Option<String>,

    pub healthy: bool,
}

impl Converter {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            feedback: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Send progress and error messages to `sender`.
    pub fn with_feedback(mut self, sender: FeedbackSender) -> Self {
        self.feedback = Some(sender);
        self
    }

    /// Stop the run cooperatively when `token` is cancelled.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token that cancels this converter's runs.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn context(&self) -> RunContext {
        let ctx = RunContext::new(FEEDBACK_OWNER)
            .with_cancel(self.cancel.clone())
            .with_throw_on_error(self.config.options.throw_on_error);
        match &self.feedback {
            Some(sender) => ctx.with_feedback(sender.clone()),
            None => ctx,
        }
    }

    /// Connect to the source (and the target when executing there), run
    /// the conversion and close every connection.
    pub async fn run(&self) -> Result<ConversionResult> {
        let mut source = drivers::connect(&self.config.source).await?;

        let mut target = match self.target_connection() {
            Some(cfg) => match drivers::connect(cfg).await {
                Ok(conn) => Some(conn),
                Err(e) => {
                    close_quietly(source, "source").await;
                    return Err(e);
                }
            },
            None => None,
        };

        let result = self
            .run_with(
                source.as_mut(),
                target.as_mut().map(|t| t.as_mut() as &mut dyn Connection),
            )
            .await;

        close_quietly(source, "source").await;
        if let Some(target) = target {
            close_quietly(target, "target").await;
        }
        result
    }

    /// Run the conversion on already open connections.
    pub async fn run_with(
        &self,
        source: &mut dyn Connection,
        target: Option<&mut dyn Connection>,
    ) -> Result<ConversionResult> {
        let started_at = Utc::now();
        let started = Instant::now();
        let ctx = self.context();
        let options = &self.config.options;
        let source_db = source.database_type();
        let target_db = self.config.target.r#type;
        let database = source.database_name().to_string();

        info!(
            "Converting {} ({}) to {}",
            database,
            source_db.label(),
            target_db.label()
        );

        let mut result = ConversionResult {
            run_id: uuid::Uuid::new_v4().to_string(),
            status: String::new(),
            started_at,
            completed_at: started_at,
            duration_seconds: 0.0,
            database: database.clone(),
            objects_fetched: 0,
            schema_statements: 0,
            schema_script: None,
            schema_file: None,
            data: None,
            data_script: None,
            data_file: None,
            target_statements: 0,
            has_error: false,
        };

        let catalog = drivers::catalog_for(source_db)?;
        let snapshot = SchemaFetcher::new(&ctx)
            .with_options(FetchOptions {
                sort_by_reference: options.sort_by_reference,
                ..FetchOptions::default()
            })
            .fetch(&mut *source, catalog.as_ref(), &self.config.filter)
            .await?;
        result.objects_fetched = snapshot.object_count();
        ctx.feedback(format!("Fetched {} object(s).", result.objects_fetched));

        let mut executor = target.map(|conn| TargetExecutor::new(&ctx, conn));

        if options.generate_mode.includes_schema() && !ctx.is_cancelled() {
            let mut sink = self.open_sink(&database, "Schema").await?;
            result.schema_file = sink.path().map(|p| p.to_path_buf());
            result.schema_statements = self
                .write_schema(&ctx, &snapshot, &mut sink, executor.as_mut())
                .await?;
            result.schema_script = sink.finish().await?;
        }

        if options.generate_mode.includes_data() && !ctx.is_cancelled() {
            let mut sink = self.open_sink(&database, "Data").await?;
            result.data_file = sink.path().map(|p| p.to_path_buf());
            let migrator = DataMigrator::new(
                &ctx,
                DialectImpl::for_type(source_db),
                DialectImpl::for_type(target_db),
                TransferOptions::from_config(&self.config),
            );
            let handler = executor.as_mut().map(|e| e as &mut dyn BatchHandler);
            let report = migrator
                .migrate(&snapshot, &mut *source, &mut sink, handler)
                .await?;
            result.data = Some(report);
            result.data_script = sink.finish().await?;
        }

        result.target_statements = executor.as_ref().map_or(0, |e| e.executed());
        result.has_error = ctx.has_error();
        result.completed_at = Utc::now();
        result.duration_seconds = started.elapsed().as_secs_f64();
        result.status = if ctx.is_cancelled() {
            "cancelled"
        } else if result.has_error {
            "completed_with_errors"
        } else {
            "completed"
        }
        .to_string();

        match result.status.as_str() {
            "cancelled" => warn!("Conversion cancelled after {:.1}s", result.duration_seconds),
            "completed_with_errors" => error!(
                "Conversion finished with errors in {:.1}s",
                result.duration_seconds
            ),
            _ => info!("Conversion completed in {:.1}s", result.duration_seconds),
        }
        ctx.feedback(format!("Conversion {}.", result.status.replace('_', " ")));
        Ok(result)
    }

    async fn write_schema(
        &self,
        ctx: &RunContext,
        snapshot: &SchemaSnapshot,
        sink: &mut ScriptSink,
        mut executor: Option<&mut TargetExecutor<'_>>,
    ) -> Result<usize> {
        let generator = SchemaScriptGenerator::new(
            self.config.source.r#type,
            self.config.target.r#type,
            GenerateOptions::from_config(&self.config),
        )?;
        let script = generator.generate(snapshot);
        ctx.feedback(format!(
            "Generated {} schema statement(s).",
            script.statements.len()
        ));

        for statement in &script.statements {
            if ctx.is_cancelled() {
                break;
            }
            if sink.is_active() {
                sink.write(ctx, statement).await?;
            }
            if let Some(executor) = executor.as_deref_mut() {
                executor.execute(statement, &[]).await?;
            }
        }
        Ok(script.statements.len())
    }

    async fn open_sink(&self, database: &str, part: &str) -> Result<ScriptSink> {
        let options = &self.config.options;
        let mut sink = ScriptSink::new();
        if options.writes_string() {
            sink = sink.with_string();
        }
        if options.writes_file() {
            let path = options.output_folder.join(script_file_name(
                database,
                self.config.target.r#type.label(),
                Local::now(),
                part,
            ));
            sink = sink.with_file(path).await?;
        }
        Ok(sink)
    }

    fn target_connection(&self) -> Option<&ConnectionConfig> {
        if self.config.options.execute_on_target {
            self.config.target.connection.as_ref()
        } else {
            None
        }
    }

    /// Open and ping the source and, when configured, the target.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let (source_connected, source_latency_ms, source_error) =
            ping(&self.config.source).await;

        let (target_configured, target_connected, target_latency_ms, target_error) =
            match &self.config.target.connection {
                Some(cfg) => {
                    let (ok, ms, err) = ping(cfg).await;
                    (true, ok, ms, err)
                }
                None => (false, false, 0, None),
            };

        Ok(HealthCheckResult {
            source_connected,
            source_latency_ms,
            source_error,
            target_configured,
            target_connected,
            target_latency_ms,
            target_error,
            healthy: source_connected && (!target_configured || target_connected),
        })
    }
}

/// `{database}_{dialect}_{yyyyMMdd}_{part}.sql`
pub fn script_file_name(database: &str, dialect_label: &str, date: DateTime<Local>, part: &str) -> String {
    format!(
        "{}_{}_{}_{}.sql",
        database,
        dialect_label,
        date.format("%Y%m%d"),
        part
    )
}

async fn ping(config: &ConnectionConfig) -> (bool, u64, Option<String>) {
    let started = Instant::now();
    let outcome: Result<()> = async {
        let mut conn = drivers::connect(config).await?;
        let pinged = conn.query_scalar("SELECT 1").await;
        conn.close().await?;
        pinged.map(|_| ())
    }
    .await;
    let elapsed = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(()) => (true, elapsed, None),
        Err(e) => {
            debug!("Ping of {} failed: {}", config.display_name(), e);
            (false, elapsed, Some(e.to_string()))
        }
    }
}

async fn close_quietly(conn: Box<dyn Connection>, role: &str) {
    if let Err(e) = conn.close().await {
        warn!("Failed to close {} connection: {}", role, e);
    }
}
