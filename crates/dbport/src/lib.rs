//! # dbport
//!
//! Cross-dialect SQL translation and schema-driven data migration.
//!
//! This library provides:
//!
//! - **Definition rewriting** of views, routines, defaults and computed
//!   expressions between SQL Server, MySQL, Oracle, PostgreSQL and SQLite
//! - **Schema fetch** through per-engine metadata catalogs, ordered by reference
//! - **Schema scripts** (`CREATE TABLE`, keys, indexes, routines) for a target dialect
//! - **Paginated data migration** into batched INSERT scripts or a live target
//!
//! ## Example
//!
//! ```rust,no_run
//! use dbport::{Config, Converter};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let result = Converter::new(config).run().await?;
//!     println!("Converted {} object(s)", result.objects_fetched);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod generate;
pub mod mapping;
pub mod orchestrator;
pub mod schema;
pub mod transfer;
pub mod translate;

// Re-exports for convenient access
pub use config::{Config, ConnectionConfig, ConvertOptions, TargetConfig};
pub use core::{DatabaseType, RunContext, SchemaFilter, SchemaSnapshot, SqlValue};
pub use error::{ConvertError, Result};
pub use generate::{GenerateOptions, SchemaScript, SchemaScriptGenerator};
pub use orchestrator::{ConversionResult, Converter, HealthCheckResult};
pub use schema::SchemaFetcher;
pub use transfer::{DataMigrator, MigrationReport, TransferOptions};
pub use translate::{ObjectNameMode, StatementTranslator, TranslateOptions, Translation};
