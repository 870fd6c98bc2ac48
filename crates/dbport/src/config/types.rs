//! Configuration types.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::{DatabaseType, SchemaFilter};
use crate::drivers::SslMode;
use crate::translate::ObjectNameMode;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database the schema and data are read from.
    pub source: ConnectionConfig,

    /// Dialect to convert to, and optionally where to run the result.
    pub target: TargetConfig,

    /// Conversion behavior.
    #[serde(default)]
    pub options: ConvertOptions,

    /// Objects to fetch (default: everything).
    #[serde(default = "SchemaFilter::all")]
    pub filter: SchemaFilter,
}

/// Connection settings for one database.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Engine (`mssql`, `postgres`, `sqlite`, ...).
    pub r#type: DatabaseType,

    /// Database host (unused for SQLite).
    #[serde(default)]
    pub host: String,

    /// Port (default: the engine's standard port).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Database name, or the database file path for SQLite.
    pub database: String,

    /// Username.
    #[serde(default)]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Encrypt SQL Server connections (default: true).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// Trust the SQL Server certificate without validation (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,

    /// PostgreSQL TLS mode (default: disable).
    #[serde(default)]
    pub ssl_mode: SslMode,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

impl ConnectionConfig {
    /// Effective port.
    pub fn port(&self) -> u16 {
        self.port
            .or_else(|| self.r#type.default_port())
            .unwrap_or_default()
    }

    /// Name used in logs and errors; never contains credentials.
    pub fn display_name(&self) -> String {
        match self.r#type {
            DatabaseType::Sqlite => self.database.clone(),
            _ => format!("{}:{}/{}", self.host, self.port(), self.database),
        }
    }

    /// True when both configs address the same database.
    pub fn same_database(&self, other: &ConnectionConfig) -> bool {
        self.r#type == other.r#type
            && self.host.eq_ignore_ascii_case(&other.host)
            && self.port() == other.port()
            && self.database == other.database
    }
}

/// Target dialect settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Dialect scripts are generated for.
    pub r#type: DatabaseType,

    /// Connection used when `options.execute_on_target` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionConfig>,

    /// Owner to qualify generated objects with (default: none).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

/// Where generated scripts go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Keep the script text in memory and return it.
    String,
    /// Write the script to a file in the output folder.
    File,
}

/// Which parts of a conversion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerateMode {
    Schema,
    Data,
    #[default]
    Both,
}

impl GenerateMode {
    pub fn includes_schema(self) -> bool {
        matches!(self, GenerateMode::Schema | GenerateMode::Both)
    }

    pub fn includes_data(self) -> bool {
        matches!(self, GenerateMode::Data | GenerateMode::Both)
    }
}

/// How binary values are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BytesPolicy {
    /// Hexadecimal literal in scripts, parameter when executing.
    #[default]
    Hex,
    /// Always `NULL`.
    Null,
}

/// Conversion behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Rows per page and per insert batch (default: 500).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Maximum items in one `IN (...)` predicate (default: 1000).
    #[serde(default = "default_in_limit")]
    pub in_limit: usize,

    /// Skip tables with more rows than this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count_threshold: Option<u64>,

    /// Copy identity column values (default: true).
    #[serde(default = "default_true")]
    pub insert_identity: bool,

    /// Emit identity clauses in generated tables (default: true).
    #[serde(default = "default_true")]
    pub generate_identity: bool,

    #[serde(default)]
    pub bytes_policy: BytesPolicy,

    /// Remove emoji from text values.
    #[serde(default)]
    pub strip_emoji: bool,

    /// Script destinations (default: string and file).
    #[serde(default = "default_output_modes")]
    pub output_modes: Vec<OutputMode>,

    /// Folder for script files (default: "output").
    #[serde(default = "default_output_folder")]
    pub output_folder: PathBuf,

    /// Fail on the first error instead of reporting and continuing.
    #[serde(default)]
    pub throw_on_error: bool,

    /// Order tables and routines by reference (default: true).
    #[serde(default = "default_true")]
    pub sort_by_reference: bool,

    #[serde(default)]
    pub name_mode: ObjectNameMode,

    #[serde(default)]
    pub generate_mode: GenerateMode,

    /// Run generated statements on `target.connection`.
    #[serde(default)]
    pub execute_on_target: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            in_limit: default_in_limit(),
            row_count_threshold: None,
            insert_identity: true,
            generate_identity: true,
            bytes_policy: BytesPolicy::default(),
            strip_emoji: false,
            output_modes: default_output_modes(),
            output_folder: default_output_folder(),
            throw_on_error: false,
            sort_by_reference: true,
            name_mode: ObjectNameMode::default(),
            generate_mode: GenerateMode::default(),
            execute_on_target: false,
        }
    }
}

impl ConvertOptions {
    pub fn writes_string(&self) -> bool {
        self.output_modes.contains(&OutputMode::String)
    }

    pub fn writes_file(&self) -> bool {
        self.output_modes.contains(&OutputMode::File)
    }
}

fn default_batch_size() -> usize {
    500
}

fn default_in_limit() -> usize {
    1000
}

fn default_output_modes() -> Vec<OutputMode> {
    vec![OutputMode::String, OutputMode::File]
}

fn default_output_folder() -> PathBuf {
    PathBuf::from("output")
}

fn default_true() -> bool {
    true
}
