//! Core traits for dialect-neutral translation and migration.
//!
//! - [`Dialect`]: per-engine SQL spelling (quoting, paging, literals, batch inserts)
//! - [`Connection`]: an open session able to run queries and statements
//! - [`MetadataCatalog`]: per-engine metadata SQL, one query per object kind
//!
//! # Design Patterns
//!
//! - **Strategy**: every dialect is an interchangeable set of spelling rules
//! - **Template Method**: default trait methods carry the common spelling
//!   (`INSERT INTO`, `;` delimiter, `COUNT(1)`), dialects override the rest

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;

use super::dbtype::DatabaseType;
use super::identifier::{is_quoted_with, quote_with};
use super::schema::{DatabaseObjectType, SchemaFilter, Table, TableColumn};
use super::value::{Row, SqlValue};

/// Helper column added by window-function paging; stripped from every page.
pub const ROW_NUMBER_COLUMN: &str = "_ROWNUMBER";

/// How values are rendered into an insert batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Statements will be executed; oversized or binary values become parameters.
    Execution,
    /// Statements will be written to a script file; everything is a literal.
    File,
}

/// One page of a table read.
#[derive(Debug, Clone)]
pub struct PageQuery<'a> {
    /// Qualified, quoted table name.
    pub table: &'a str,
    /// Quoted column names in select order.
    pub columns: &'a [String],
    /// Quoted ordering columns (primary key, or all columns as a fallback).
    pub order_by: &'a [String],
    /// Optional predicate without the `WHERE` keyword.
    pub where_clause: Option<&'a str>,
    /// 1-based page number.
    pub page_number: u64,
    pub page_size: u64,
}

impl PageQuery<'_> {
    /// Rows skipped before this page.
    pub fn offset(&self) -> u64 {
        self.page_number.saturating_sub(1) * self.page_size
    }

    /// `" WHERE ..."` or the empty string.
    pub fn where_sql(&self) -> String {
        where_sql(self.where_clause)
    }
}

/// `" WHERE ..."` or the empty string.
pub fn where_sql(where_clause: Option<&str>) -> String {
    match where_clause {
        Some(w) if !w.trim().is_empty() => format!(" WHERE {}", w),
        _ => String::new(),
    }
}

/// SQL spelling rules of one database engine.
///
/// Dialects are stateless; the `drivers` module wraps them in `DialectImpl`
/// for static dispatch.
pub trait Dialect: Send + Sync {
    /// Engine this dialect speaks for.
    fn database_type(&self) -> DatabaseType;

    /// Label used in file names and feedback.
    fn label(&self) -> &'static str {
        self.database_type().label()
    }

    /// Opening and closing identifier quote characters.
    fn quote_chars(&self) -> (char, char);

    /// Quote an identifier, doubling embedded closing quotes.
    fn quote_ident(&self, name: &str) -> String {
        let (left, right) = self.quote_chars();
        quote_with(name, left, right)
    }

    /// True when `text` is quoted in this dialect's own style.
    fn is_quoted(&self, text: &str) -> bool {
        let (left, right) = self.quote_chars();
        is_quoted_with(text, left, right)
    }

    /// Owner objects belong to when none is given (`dbo`, `public`); may be empty.
    fn default_owner(&self) -> &'static str;

    /// Character that introduces a named parameter in generated batches.
    fn param_char(&self) -> char;

    /// Native positional placeholder for the given 1-based index.
    fn param_placeholder(&self, index: usize) -> String;

    /// Prefix for unicode string literals (`N`), possibly empty.
    fn unicode_prefix(&self) -> &'static str;

    /// Statement delimiter in scripts.
    fn script_delimiter(&self) -> &'static str {
        ";"
    }

    /// Whether the engine has a native bulk-copy path.
    fn supports_bulk_copy(&self) -> bool {
        false
    }

    /// Qualified, quoted object name for statements in this dialect.
    fn qualify_object(&self, owner: &str, name: &str) -> String;

    /// Query returning one page of rows in a deterministic order.
    fn build_page_query(&self, query: &PageQuery<'_>) -> String;

    /// Query returning the row count of a table.
    fn build_count_query(&self, table: &str, where_clause: Option<&str>) -> String {
        format!("SELECT COUNT(1) FROM {}{}", table, where_sql(where_clause))
    }

    /// Leading keyword(s) of a multi-row insert.
    fn batch_insert_prefix(&self) -> &'static str {
        "INSERT INTO"
    }

    /// Text emitted before each row's value tuple.
    fn batch_insert_item_before(&self, _table: &str, _columns: &str, _is_first: bool) -> String {
        String::new()
    }

    /// Text emitted after each row's value tuple.
    fn batch_insert_item_end(&self, is_last: bool) -> &'static str {
        if is_last {
            ";"
        } else {
            ","
        }
    }

    /// Whether the column's declared type is this engine's GUID-carrying type.
    fn is_guid_column(&self, column: &TableColumn) -> bool;

    /// Interpret 16 raw bytes as a GUID using this engine's byte order.
    fn guid_from_bytes(&self, bytes: [u8; 16]) -> Uuid {
        Uuid::from_bytes(bytes)
    }

    /// Literal form of a value for this dialect.
    fn render_literal(&self, value: &SqlValue<'_>, column: &TableColumn) -> String;

    /// Hexadecimal literal form of a binary value.
    fn bytes_literal(&self, bytes: &[u8], column: &TableColumn) -> String;

    /// Whether the value must travel as a parameter when executing.
    fn needs_parameter(&self, _column: &TableColumn, _value: &SqlValue<'_>) -> bool {
        false
    }

    /// Identity clause for a column definition, if the engine has one.
    fn identity_clause(&self, table: &Table, column: &TableColumn) -> Option<String>;

    /// Computed column clause around an already translated expression.
    fn computed_clause(&self, expression: &str) -> String;
}

/// Named parameter attached to an execution-mode batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Name including the dialect's parameter character (`@P1_0_Photo`).
    pub name: String,
    pub value: SqlValue<'static>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: SqlValue<'static>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// An open database session.
///
/// Connections are opened lazily by the orchestrator and closed on every
/// exit path; dropping a connection also releases it.
#[async_trait]
pub trait Connection: Send {
    /// Engine behind this connection.
    fn database_type(&self) -> DatabaseType;

    /// Database (catalog) name, used for output file names.
    fn database_name(&self) -> &str;

    /// Run a query and collect every row.
    async fn query(&mut self, sql: &str) -> Result<Vec<Row>>;

    /// Run a query and return the first column of the first row.
    async fn query_scalar(&mut self, sql: &str) -> Result<Option<SqlValue<'static>>> {
        let rows = self.query(sql).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.values().first().cloned()))
    }

    /// Run a statement with named parameters; returns affected rows.
    async fn execute(&mut self, sql: &str, params: &[Parameter]) -> Result<u64>;

    /// Close the session.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Metadata SQL of one engine.
///
/// Every query returns rows with the standard column aliases (`Owner`,
/// `Name`, `TableName`, `ColumnName`, `DataType`, ...) so the schema fetcher
/// can map them without engine knowledge.
pub trait MetadataCatalog: Send + Sync {
    /// Query for one object kind, or `None` when the engine has no such objects.
    fn metadata_query(&self, kind: DatabaseObjectType, filter: &SchemaFilter) -> Option<String>;
}
