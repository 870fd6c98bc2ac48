//! Error types for translation and migration runs.

use thiserror::Error;

/// Main error type for conversion operations.
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Could not open or ping a database connection
    #[error("Connection to {database} failed: {message}")]
    Connection { database: String, message: String },

    /// A statement failed on an open connection
    #[error("Query failed: {message}\n  SQL: {sql}")]
    Query { sql: String, message: String },

    /// Metadata retrieval failed
    #[error("Schema fetch failed: {0}")]
    SchemaFetch(String),

    /// Function or data type mapping tables are unusable
    #[error("Mapping table error: {0}")]
    Mapping(String),

    /// Data migration failed for a specific table
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// SQL Server driver error
    #[error("SQL Server error: {0}")]
    Mssql(#[from] tiberius::error::Error),

    /// PostgreSQL driver error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// SQLite driver error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    /// IO error (script files, config files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run was cancelled (SIGINT, etc.)
    #[error("Conversion cancelled")]
    Cancelled,
}

impl ConvertError {
    /// Create a Connection error for the named database.
    pub fn connection(database: impl Into<String>, message: impl Into<String>) -> Self {
        ConvertError::Connection {
            database: database.into(),
            message: message.into(),
        }
    }

    /// Create a Query error carrying the offending statement.
    pub fn query(sql: impl Into<String>, message: impl Into<String>) -> Self {
        ConvertError::Query {
            sql: sql.into(),
            message: message.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        ConvertError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            ConvertError::Config(_) | ConvertError::Yaml(_) | ConvertError::Mapping(_) => 2,
            ConvertError::Connection { .. }
            | ConvertError::Mssql(_)
            | ConvertError::Postgres(_)
            | ConvertError::Sqlite(_) => 3,
            ConvertError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for conversion operations.
pub type Result<T> = std::result::Result<T, ConvertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ConvertError::Config("x".into()).exit_code(), 2);
        assert_eq!(ConvertError::connection("db", "refused").exit_code(), 3);
        assert_eq!(ConvertError::Cancelled.exit_code(), 130);
        assert_eq!(ConvertError::transfer("t", "boom").exit_code(), 1);
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.yaml");
        let err = ConvertError::from(io);
        let text = err.format_detailed();
        assert!(text.starts_with("Error: IO error: missing.yaml"));
    }

    #[test]
    fn test_query_error_display() {
        let err = ConvertError::query("SELECT 1", "syntax");
        assert_eq!(err.to_string(), "Query failed: syntax\n  SQL: SELECT 1");
    }
}
