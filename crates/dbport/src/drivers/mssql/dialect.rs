//! SQL Server dialect (Strategy pattern).

use uuid::Uuid;

use crate::core::traits::{Dialect, PageQuery, ROW_NUMBER_COLUMN};
use crate::core::{DatabaseType, SqlValue, Table, TableColumn};
use crate::drivers::common::{
    duration_as_datetime, format_date, format_datetime, format_duration, format_time, hex_upper,
    is_datetime_column, quote_text,
};

/// Microsoft SQL Server dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl SqlServerDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for SqlServerDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::SqlServer
    }

    fn quote_chars(&self) -> (char, char) {
        ('[', ']')
    }

    fn default_owner(&self) -> &'static str {
        "dbo"
    }

    fn param_char(&self) -> char {
        '@'
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("@P{}", index)
    }

    fn unicode_prefix(&self) -> &'static str {
        "N"
    }

    fn supports_bulk_copy(&self) -> bool {
        true
    }

    fn qualify_object(&self, owner: &str, name: &str) -> String {
        if owner.is_empty() {
            self.quote_ident(name)
        } else {
            format!("{}.{}", self.quote_ident(owner), self.quote_ident(name))
        }
    }

    fn build_page_query(&self, query: &PageQuery<'_>) -> String {
        let start = query.offset() + 1;
        let end = query.offset() + query.page_size;
        format!(
            "SELECT * FROM (SELECT {}, ROW_NUMBER() OVER (ORDER BY {}) AS {} FROM {}{}) AS PagedRecords WHERE {} BETWEEN {} AND {}",
            query.columns.join(","),
            query.order_by.join(","),
            self.quote_ident(ROW_NUMBER_COLUMN),
            query.table,
            query.where_sql(),
            self.quote_ident(ROW_NUMBER_COLUMN),
            start,
            end
        )
    }

    fn is_guid_column(&self, column: &TableColumn) -> bool {
        column.type_name() == "uniqueidentifier"
    }

    fn guid_from_bytes(&self, bytes: [u8; 16]) -> Uuid {
        // uniqueidentifier stores the first three groups little-endian.
        Uuid::from_bytes_le(bytes)
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
                "'{} {}'",
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
            _ => format!("0x{}", hex_upper(bytes)),
        }
    }

    fn identity_clause(&self, table: &Table, _column: &TableColumn) -> Option<String> {
        Some(format!(
            "IDENTITY({},{})",
            table.identity_seed.unwrap_or(1),
            table.identity_increment.unwrap_or(1)
        ))
    }

    fn computed_clause(&self, expression: &str) -> String {
        format!("AS ({})", expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    fn column(ty: &str) -> TableColumn {
        TableColumn::new(&Table::new("dbo", "T"), "c", ty, 1)
    }

    #[test]
    fn test_quoting_and_qualification() {
        let d = SqlServerDialect::new();
        assert_eq!(d.quote_ident("a]b"), "[a]]b]");
        assert_eq!(d.qualify_object("dbo", "Orders"), "[dbo].[Orders]");
        assert_eq!(d.qualify_object("", "Orders"), "[Orders]");
        assert_eq!(d.param_placeholder(2), "@P2");
    }

    #[test]
    fn test_page_query() {
        let d = SqlServerDialect::new();
        let cols = vec!["[Id]".to_string(), "[Name]".to_string()];
        let order = vec!["[Id]".to_string()];
        let sql = d.build_page_query(&PageQuery {
            table: "[dbo].[T]",
            columns: &cols,
            order_by: &order,
            where_clause: Some("[ParentId] IS NULL"),
            page_number: 2,
            page_size: 50,
        });
        assert_eq!(
            sql,
            "SELECT * FROM (SELECT [Id],[Name], ROW_NUMBER() OVER (ORDER BY [Id]) AS [_ROWNUMBER] \
             FROM [dbo].[T] WHERE [ParentId] IS NULL) AS PagedRecords WHERE [_ROWNUMBER] BETWEEN 51 AND 100"
        );
    }

    #[test]
    fn test_literals() {
        let d = SqlServerDialect::new();
        let text = column("nvarchar");
        assert_eq!(d.render_literal(&SqlValue::from("O'Neil"), &text), "N'O''Neil'");
        assert_eq!(d.render_literal(&SqlValue::Bool(true), &column("bit")), "1");
        assert_eq!(d.render_literal(&SqlValue::F64(f64::NAN), &column("float")), "NULL");
        assert_eq!(
            d.render_literal(&SqlValue::from(vec![0xABu8, 0x01]), &column("varbinary")),
            "0xAB01"
        );
        let dto = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 2, 3, 4, 5)
            .unwrap();
        assert_eq!(
            d.render_literal(&SqlValue::DateTimeOffset(dto), &column("datetimeoffset")),
            "'2024-01-02 03:04:05 +02:00'"
        );
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(d.render_literal(&SqlValue::Date(date), &column("date")), "'2024-01-02'");
    }

    #[test]
    fn test_guid_bytes_use_mixed_endian_order() {
        let d = SqlServerDialect::new();
        let guid = Uuid::parse_str("01020304-0506-0708-090a-0b0c0d0e0f10").unwrap();
        let raw = guid.to_bytes_le().to_vec();
        assert_eq!(
            d.render_literal(&SqlValue::from(raw), &column("uniqueidentifier")),
            "'01020304-0506-0708-090a-0b0c0d0e0f10'"
        );
    }

    #[test]
    fn test_duration_rendering_depends_on_column() {
        let d = SqlServerDialect::new();
        let span = SqlValue::Duration(chrono::Duration::minutes(75));
        assert_eq!(d.render_literal(&span, &column("time")), "'01:15:00'");
        assert_eq!(
            d.render_literal(&span, &column("datetime")),
            "'1970-01-01 01:15:00'"
        );
    }
}
