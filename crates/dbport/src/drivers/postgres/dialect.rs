//! PostgreSQL dialect (Strategy pattern).

use crate::core::traits::{Dialect, PageQuery};
use crate::core::{DatabaseType, SqlValue, Table, TableColumn};
use crate::drivers::common::{
    duration_as_datetime, format_date, format_datetime, format_duration, format_time, hex_upper,
    is_datetime_column, quote_text,
};

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn quote_chars(&self) -> (char, char) {
        ('"', '"')
    }

    fn default_owner(&self) -> &'static str {
        "public"
    }

    fn param_char(&self) -> char {
        ':'
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn unicode_prefix(&self) -> &'static str {
        ""
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

    fn is_guid_column(&self, column: &TableColumn) -> bool {
        column.type_name() == "uuid"
    }

    fn render_literal(&self, value: &SqlValue<'_>, column: &TableColumn) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            // boolean columns reject integer literals.
            SqlValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            SqlValue::F32(f) if !f.is_finite() => "NULL".to_string(),
            SqlValue::F64(f) if !f.is_finite() => "NULL".to_string(),
            SqlValue::Text(s) => quote_text(s, self.unicode_prefix()),
            SqlValue::Bytes(b) => self.bytes_literal(b, column),
            SqlValue::Uuid(u) => format!("'{}'", u.hyphenated()),
            SqlValue::Date(d) => format!("'{}'", format_date(d)),
            SqlValue::Time(t) => format!("'{}'", format_time(t, 6)),
            SqlValue::DateTime(dt) => format!("'{}'", format_datetime(dt, 6)),
            SqlValue::DateTimeOffset(dt) => format!(
                "'{}{}'",
                format_datetime(&dt.naive_local(), 6),
                dt.format("%:z")
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
            Ok(raw) if self.is_guid_column(column) => {
                format!("'{}'", self.guid_from_bytes(raw).hyphenated())
            }
            _ => format!("'\\x{}'::bytea", hex_upper(bytes)),
        }
    }

    fn identity_clause(&self, table: &Table, _column: &TableColumn) -> Option<String> {
        Some(match (table.identity_seed, table.identity_increment) {
            (None, None) => "GENERATED BY DEFAULT AS IDENTITY".to_string(),
            (seed, incr) => format!(
                "GENERATED BY DEFAULT AS IDENTITY (START WITH {} INCREMENT BY {})",
                seed.unwrap_or(1),
                incr.unwrap_or(1)
            ),
        })
    }

    fn computed_clause(&self, expression: &str) -> String {
        format!("GENERATED ALWAYS AS ({}) STORED", expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn column(ty: &str) -> TableColumn {
        TableColumn::new(&Table::new("public", "t"), "c", ty, 1)
    }

    #[test]
    fn test_page_query() {
        let d = PostgresDialect::new();
        let cols = vec!["\"id\"".to_string(), "\"name\"".to_string()];
        let order = vec!["\"id\"".to_string()];
        let sql = d.build_page_query(&PageQuery {
            table: "\"public\".\"t\"",
            columns: &cols,
            order_by: &order,
            where_clause: None,
            page_number: 1,
            page_size: 500,
        });
        assert_eq!(
            sql,
            "SELECT \"id\",\"name\" FROM \"public\".\"t\" ORDER BY \"id\" LIMIT 500 OFFSET 0"
        );
        assert_eq!(
            d.build_count_query("\"public\".\"t\"", Some("\"parent\" IS NULL")),
            "SELECT COUNT(1) FROM \"public\".\"t\" WHERE \"parent\" IS NULL"
        );
    }

    #[test]
    fn test_literals() {
        let d = PostgresDialect::new();
        assert_eq!(d.render_literal(&SqlValue::Bool(false), &column("boolean")), "FALSE");
        assert_eq!(d.render_literal(&SqlValue::from("x'y"), &column("text")), "'x''y'");
        assert_eq!(
            d.render_literal(&SqlValue::from(vec![1u8, 2, 255]), &column("bytea")),
            "'\\x0102FF'::bytea"
        );
        assert_eq!(d.render_literal(&SqlValue::I64(-5), &column("bigint")), "-5");
    }

    #[test]
    fn test_guid_bytes_in_uuid_column() {
        let d = PostgresDialect::new();
        let guid = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        let bytes = SqlValue::from(guid.as_bytes().to_vec());
        assert_eq!(
            d.render_literal(&bytes, &column("uuid")),
            "'550e8400-e29b-41d4-a716-446655440000'"
        );
        assert!(d.render_literal(&bytes, &column("bytea")).ends_with("::bytea"));
    }

    #[test]
    fn test_identity_clause_with_seed() {
        let d = PostgresDialect::new();
        let mut t = Table::new("public", "t");
        assert_eq!(
            d.identity_clause(&t, &column("int")).as_deref(),
            Some("GENERATED BY DEFAULT AS IDENTITY")
        );
        t.identity_seed = Some(100);
        assert_eq!(
            d.identity_clause(&t, &column("int")).as_deref(),
            Some("GENERATED BY DEFAULT AS IDENTITY (START WITH 100 INCREMENT BY 1)")
        );
    }
}
