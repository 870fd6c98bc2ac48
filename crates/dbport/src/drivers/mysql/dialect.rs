//! MySQL dialect (Strategy pattern).
//!
//! MySQL is a translation and script target only; no connector is provided.

use chrono::Utc;

use crate::core::traits::{Dialect, PageQuery};
use crate::core::{DatabaseType, SqlValue, Table, TableColumn};
use crate::drivers::common::{
    duration_as_datetime, format_date, format_datetime, format_duration, format_time, hex_upper,
    is_datetime_column,
};

/// MySQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl MySqlDialect {
    pub fn new() -> Self {
        Self
    }

    /// MySQL treats `\` as an escape inside literals, so it is doubled too.
    fn quote(&self, text: &str) -> String {
        format!(
            "{}'{}'",
            self.unicode_prefix(),
            text.replace('\\', "\\\\").replace('\'', "''")
        )
    }
}

impl Dialect for MySqlDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::MySql
    }

    fn quote_chars(&self) -> (char, char) {
        ('`', '`')
    }

    fn default_owner(&self) -> &'static str {
        ""
    }

    fn param_char(&self) -> char {
        '@'
    }

    fn param_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn unicode_prefix(&self) -> &'static str {
        "N"
    }

    fn supports_bulk_copy(&self) -> bool {
        true
    }

    fn qualify_object(&self, _owner: &str, name: &str) -> String {
        self.quote_ident(name)
    }

    fn build_page_query(&self, query: &PageQuery<'_>) -> String {
        format!(
            "SELECT {} FROM {}{} ORDER BY {} LIMIT {}, {}",
            query.columns.join(","),
            query.table,
            query.where_sql(),
            query.order_by.join(","),
            query.offset(),
            query.page_size
        )
    }

    fn is_guid_column(&self, column: &TableColumn) -> bool {
        let ty = column.type_name();
        match ty.as_str() {
            "char(36)" | "binary(16)" => true,
            "char" => column.max_length == Some(36),
            "binary" => column.max_length == Some(16),
            _ => false,
        }
    }

    fn render_literal(&self, value: &SqlValue<'_>, column: &TableColumn) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            SqlValue::F32(f) if !f.is_finite() => "NULL".to_string(),
            SqlValue::F64(f) if !f.is_finite() => "NULL".to_string(),
            SqlValue::Text(s) => self.quote(s),
            SqlValue::Bytes(b) => self.bytes_literal(b, column),
            SqlValue::Uuid(u) => format!("'{}'", u.hyphenated()),
            SqlValue::Date(d) => format!("'{}'", format_date(d)),
            SqlValue::Time(t) => format!("'{}'", format_time(t, 6)),
            SqlValue::DateTime(dt) => format!("'{}'", format_datetime(dt, 6)),
            // DATETIME has no offset; values are normalised to UTC.
            SqlValue::DateTimeOffset(dt) => format!(
                "'{}'",
                dt.with_timezone(&Utc)
                    .naive_utc()
                    .format("%Y-%m-%d %H:%M:%S%.6f")
            ),
            SqlValue::Duration(d) if is_datetime_column(column) => {
                format!("'{}'", format_datetime(&duration_as_datetime(d), 6))
            }
            SqlValue::Duration(d) => format!("'{}'", format_duration(d)),
            other => other.to_plain_string(),
        }
    }

    fn bytes_literal(&self, bytes: &[u8], column: &TableColumn) -> String {
        match <[u8; 16]>::try_from(bytes) {
            Ok(raw) if self.is_guid_column(column) && column.type_name().starts_with("char") => {
                format!("'{}'", self.guid_from_bytes(raw).hyphenated())
            }
            _ => format!("0x{}", hex_upper(bytes)),
        }
    }

    fn identity_clause(&self, _table: &Table, _column: &TableColumn) -> Option<String> {
        Some("AUTO_INCREMENT".to_string())
    }

    fn computed_clause(&self, expression: &str) -> String {
        format!("AS ({})", expression)
    }
}
