//! Database driver implementations.
//!
//! - [`mssql`]: SQL Server dialect, connector and metadata catalog
//! - [`postgres`]: PostgreSQL dialect, connector and metadata catalog
//! - [`sqlite`]: SQLite dialect, connector and metadata catalog
//! - [`mysql`], [`oracle`]: dialects only (translation and script targets)
//! - [`common`]: literal formatting, parameter binding, TLS
//!
//! # Static dispatch
//!
//! [`DialectImpl`] wraps the concrete dialects in an enum; the compiler
//! generates a `match` per call instead of a vtable lookup.

pub mod common;
pub mod mssql;
pub mod mysql;
pub mod oracle;
pub mod postgres;
pub mod sqlite;

pub use common::{SslMode, TlsBuilder};
pub use mssql::SqlServerDialect;
pub use mysql::MySqlDialect;
pub use oracle::OracleDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use tracing::debug;
use uuid::Uuid;

use crate::config::ConnectionConfig;
use crate::core::traits::{Connection, Dialect, MetadataCatalog, PageQuery};
use crate::core::{DatabaseType, SqlValue, Table, TableColumn};
use crate::error::{ConvertError, Result};

/// Enum-based static dispatch over the supported dialects.
#[derive(Debug, Clone, Copy)]
pub enum DialectImpl {
    SqlServer(SqlServerDialect),
    MySql(MySqlDialect),
    Oracle(OracleDialect),
    Postgres(PostgresDialect),
    Sqlite(SqliteDialect),
}

macro_rules! dispatch {
    ($self:ident, $d:ident => $call:expr) => {
        match $self {
            DialectImpl::SqlServer($d) => $call,
            DialectImpl::MySql($d) => $call,
            DialectImpl::Oracle($d) => $call,
            DialectImpl::Postgres($d) => $call,
            DialectImpl::Sqlite($d) => $call,
        }
    };
}

impl DialectImpl {
    /// Dialect of a known engine.
    pub fn for_type(db: DatabaseType) -> Self {
        match db {
            DatabaseType::SqlServer => DialectImpl::SqlServer(SqlServerDialect::new()),
            DatabaseType::MySql => DialectImpl::MySql(MySqlDialect::new()),
            DatabaseType::Oracle => DialectImpl::Oracle(OracleDialect::new()),
            DatabaseType::Postgres => DialectImpl::Postgres(PostgresDialect::new()),
            DatabaseType::Sqlite => DialectImpl::Sqlite(SqliteDialect::new()),
        }
    }

    /// Dialect from a type name (`mssql`, `postgresql`, ...).
    pub fn from_db_type(db_type: &str) -> Result<Self> {
        Ok(Self::for_type(db_type.parse()?))
    }
}

impl Dialect for DialectImpl {
    fn database_type(&self) -> DatabaseType {
        dispatch!(self, d => d.database_type())
    }

    fn quote_chars(&self) -> (char, char) {
        dispatch!(self, d => d.quote_chars())
    }

    fn quote_ident(&self, name: &str) -> String {
        dispatch!(self, d => d.quote_ident(name))
    }

    fn is_quoted(&self, text: &str) -> bool {
        dispatch!(self, d => d.is_quoted(text))
    }

    fn default_owner(&self) -> &'static str {
        dispatch!(self, d => d.default_owner())
    }

    fn param_char(&self) -> char {
        dispatch!(self, d => d.param_char())
    }

    fn param_placeholder(&self, index: usize) -> String {
        dispatch!(self, d => d.param_placeholder(index))
    }

    fn unicode_prefix(&self) -> &'static str {
        dispatch!(self, d => d.unicode_prefix())
    }

    fn script_delimiter(&self) -> &'static str {
        dispatch!(self, d => d.script_delimiter())
    }

    fn supports_bulk_copy(&self) -> bool {
        dispatch!(self, d => d.supports_bulk_copy())
    }

    fn qualify_object(&self, owner: &str, name: &str) -> String {
        dispatch!(self, d => d.qualify_object(owner, name))
    }

    fn build_page_query(&self, query: &PageQuery<'_>) -> String {
        dispatch!(self, d => d.build_page_query(query))
    }

    fn build_count_query(&self, table: &str, where_clause: Option<&str>) -> String {
        dispatch!(self, d => d.build_count_query(table, where_clause))
    }

    fn batch_insert_prefix(&self) -> &'static str {
        dispatch!(self, d => d.batch_insert_prefix())
    }

    fn batch_insert_item_before(&self, table: &str, columns: &str, is_first: bool) -> String {
        dispatch!(self, d => d.batch_insert_item_before(table, columns, is_first))
    }

    fn batch_insert_item_end(&self, is_last: bool) -> &'static str {
        dispatch!(self, d => d.batch_insert_item_end(is_last))
    }

    fn is_guid_column(&self, column: &TableColumn) -> bool {
        dispatch!(self, d => d.is_guid_column(column))
    }

    fn guid_from_bytes(&self, bytes: [u8; 16]) -> Uuid {
        dispatch!(self, d => d.guid_from_bytes(bytes))
    }

    fn render_literal(&self, value: &SqlValue<'_>, column: &TableColumn) -> String {
        dispatch!(self, d => d.render_literal(value, column))
    }

    fn bytes_literal(&self, bytes: &[u8], column: &TableColumn) -> String {
        dispatch!(self, d => d.bytes_literal(bytes, column))
    }

    fn needs_parameter(&self, column: &TableColumn, value: &SqlValue<'_>) -> bool {
        dispatch!(self, d => d.needs_parameter(column, value))
    }

    fn identity_clause(&self, table: &Table, column: &TableColumn) -> Option<String> {
        dispatch!(self, d => d.identity_clause(table, column))
    }

    fn computed_clause(&self, expression: &str) -> String {
        dispatch!(self, d => d.computed_clause(expression))
    }
}

/// Open a connection described by `config`.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn Connection>> {
    debug!(db = %config.r#type, target = %config.display_name(), "opening connection");
    match config.r#type {
        DatabaseType::SqlServer => Ok(Box::new(mssql::MssqlConnection::connect(config).await?)),
        DatabaseType::Postgres => Ok(Box::new(postgres::PgConnection::connect(config).await?)),
        DatabaseType::Sqlite => Ok(Box::new(sqlite::SqliteConnection::connect(config).await?)),
        other => Err(ConvertError::connection(
            config.display_name(),
            format!("no connector is available for {}", other),
        )),
    }
}

/// Metadata catalog of an engine with a connector.
pub fn catalog_for(db: DatabaseType) -> Result<Box<dyn MetadataCatalog>> {
    match db {
        DatabaseType::SqlServer => Ok(Box::new(mssql::MssqlCatalog)),
        DatabaseType::Postgres => Ok(Box::new(postgres::PgCatalog)),
        DatabaseType::Sqlite => Ok(Box::new(sqlite::SqliteCatalog)),
        other => Err(ConvertError::SchemaFetch(format!(
            "no metadata catalog is available for {}",
            other
        ))),
    }
}

/// True when a connector exists for `db`.
pub fn has_connector(db: DatabaseType) -> bool {
    matches!(
        db,
        DatabaseType::SqlServer | DatabaseType::Postgres | DatabaseType::Sqlite
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialect_impl_from_db_type() {
        assert_eq!(
            DialectImpl::from_db_type("mssql").unwrap().database_type(),
            DatabaseType::SqlServer
        );
        assert_eq!(
            DialectImpl::from_db_type("postgresql").unwrap().label(),
            "Postgres"
        );
        assert!(DialectImpl::from_db_type("db2").is_err());
    }

    #[test]
    fn test_dispatch_reaches_each_dialect() {
        let quotes: Vec<String> = DatabaseType::ALL
            .iter()
            .map(|db| DialectImpl::for_type(*db).quote_ident("t"))
            .collect();
        assert_eq!(quotes, vec!["[t]", "`t`", "\"t\"", "\"t\"", "\"t\""]);

        let owners: Vec<&str> = DatabaseType::ALL
            .iter()
            .map(|db| DialectImpl::for_type(*db).default_owner())
            .collect();
        assert_eq!(owners, vec!["dbo", "", "", "public", "main"]);
    }

    #[test]
    fn test_connectors_and_catalogs() {
        assert!(has_connector(DatabaseType::Sqlite));
        assert!(!has_connector(DatabaseType::Oracle));
        assert!(catalog_for(DatabaseType::MySql).is_err());
        assert!(catalog_for(DatabaseType::Postgres).is_ok());
    }
}
