//! SQLite dialect (Strategy pattern).

use crate::core::traits::{Dialect, PageQuery};
use crate::core::{DatabaseType, SqlValue, Table, TableColumn};
use crate::drivers::common::{
    duration_as_datetime, format_date, format_datetime, format_duration, format_time, hex_upper,
    is_datetime_column, quote_text,
};

/// SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for SqliteDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn quote_chars(&self) -> (char, char) {
        ('"', '"')
    }

    fn default_owner(&self) -> &'static str {
        "main"
    }

    fn param_char(&self) -> char {
        '@'
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("?{}", index)
    }

    fn unicode_prefix(&self) -> &'static str {
        ""
    }

    fn qualify_object(&self, _owner: &str, name: &str) -> String {
        self.quote_ident(name)
    }

    fn build_page_query(&self, query: &PageQuery<'_>) -> String {
        format!(
            "SELECT {} FROM {}{} ORDER BY {} LIMIT {} OFFSET {}",
            query.columns.join(","),
            query.table,
            query.where_sql(),
            query.order_by.join(","),
            query.page_size,
            query.offset()
        )
    }

    /// SQLite has no GUID type; declared type names are taken at face value.
    fn is_guid_column(&self, column: &TableColumn) -> bool {
        matches!(
            column.type_name().as_str(),
            "uniqueidentifier" | "guid" | "uuid"
        )
    }

    fn render_literal(&self, value: &SqlValue<'_>, column: &TableColumn) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            SqlValue::F32(f) if !f.is_finite() => "NULL".to_string(),
            SqlValue::F64(f) if !f.is_finite() => "NULL".to_string(),
            SqlValue::Text(s) => quote_text(s, self.unicode_prefix()),
            SqlValue::Bytes(b) => self.bytes_literal(b, column),
            SqlValue::Uuid(u) => format!("'{}'", u.hyphenated()),
            SqlValue::Date(d) => format!("'{}'", format_date(d)),
            SqlValue::Time(t) => format!("'{}'", format_time(t, 7)),
            SqlValue::DateTime(dt) => format!("'{}'", format_datetime(dt, 7)),
            SqlValue::DateTimeOffset(dt) => format!(
                "'{}{}'",
                format_datetime(&dt.naive_local(), 7),
                dt.format("%:z")
            ),
            SqlValue::Duration(d) if is_datetime_column(column) => {
                format!("'{}'", format_datetime(&duration_as_datetime(d), 7))
            }
            SqlValue::Duration(d) => format!("'{}'", format_duration(d)),
            other => other.to_plain_string(),
        }
    }

    fn bytes_literal(&self, bytes: &[u8], column: &TableColumn) -> String {
        match <[u8; 16]>::try_from(bytes) {
            Ok(raw) if self.is_guid_column(column) => {
                format!("'{}'", self.guid_from_bytes(raw).hyphenated())
            }
            _ => format!("X'{}'", hex_upper(bytes)),
        }
    }

    /// Auto-increment only exists on an inline `INTEGER PRIMARY KEY`.
    fn identity_clause(&self, _table: &Table, _column: &TableColumn) -> Option<String> {
        None
    }

    fn computed_clause(&self, expression: &str) -> String {
        format!("AS ({})", expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(ty: &str) -> TableColumn {
        TableColumn::new(&Table::new("main", "t"), "c", ty, 1)
    }

    #[test]
    fn test_spelling() {
        let d = SqliteDialect::new();
        assert_eq!(d.qualify_object("main", "t"), "\"t\"");
        assert_eq!(d.param_placeholder(3), "?3");
        assert_eq!(d.render_literal(&SqlValue::from(vec![0x0Au8]), &column("blob")), "X'0A'");
        assert_eq!(d.render_literal(&SqlValue::Bool(true), &column("boolean")), "1");
        assert!(d.identity_clause(&Table::new("main", "t"), &column("integer")).is_none());
    }
}
