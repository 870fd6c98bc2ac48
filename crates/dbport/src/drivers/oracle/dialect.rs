//! Oracle dialect (Strategy pattern).
//!
//! Oracle is a translation and script target only; no connector is provided.

use chrono::{Duration, Timelike};

use crate::core::traits::{Dialect, PageQuery, ROW_NUMBER_COLUMN};
use crate::core::{DatabaseType, SqlValue, Table, TableColumn};
use crate::drivers::common::{
    duration_as_datetime, format_date, format_datetime, fraction, fraction_digits, hex_upper,
    is_character_column, is_datetime_column,
};

/// Longest string Oracle accepts as a literal in a statement.
pub const MAX_LITERAL_CHARS: usize = 4000;

/// Oracle dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect;

impl OracleDialect {
    pub fn new() -> Self {
        Self
    }

    /// Quote a string for a `;`-delimited script.
    ///
    /// Every `;` is spliced in through `CHR(59)`, including values that end
    /// up bound as parameters.
    fn quote(&self, text: &str) -> String {
        let prefix = self.unicode_prefix();
        let splice = format!("'||CHR(59)||{}'", prefix);
        let escaped = text.replace('\'', "''").replace(';', &splice);
        format!("{}'{}'", prefix, escaped)
    }

    fn timestamp_mask(digits: usize) -> String {
        if digits == 0 {
            "YYYY-MM-DD HH24:MI:SS".to_string()
        } else {
            format!("YYYY-MM-DD HH24:MI:SS.FF{}", digits)
        }
    }

    fn interval(duration: &Duration) -> String {
        let negative = *duration < Duration::zero();
        let abs = if negative { -*duration } else { *duration };
        let days = abs.num_days();
        let secs = abs.num_seconds() - days * 86_400;
        let nanos = (abs - Duration::seconds(abs.num_seconds()))
            .num_nanoseconds()
            .unwrap_or(0);
        format!(
            "INTERVAL '{}{} {:02}:{:02}:{:02}{}' DAY TO SECOND",
            if negative { "-" } else { "" },
            days,
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60,
            fraction(nanos as u32, 9)
        )
    }
}

impl Dialect for OracleDialect {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Oracle
    }

    fn quote_chars(&self) -> (char, char) {
        ('"', '"')
    }

    fn default_owner(&self) -> &'static str {
        ""
    }

    fn param_char(&self) -> char {
        ':'
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!(":{}", index)
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
        let start = query.offset() + 1;
        let end = query.offset() + query.page_size;
        format!(
            "SELECT * FROM (SELECT {}, ROW_NUMBER() OVER (ORDER BY {}) AS {} FROM {}{}) \"PagedRecords\" WHERE {} BETWEEN {} AND {}",
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

    fn batch_insert_prefix(&self) -> &'static str {
        "INSERT ALL"
    }

    fn batch_insert_item_before(&self, table: &str, columns: &str, is_first: bool) -> String {
        if is_first {
            format!(" INTO {}({})VALUES", table, columns)
        } else {
            format!("INTO {}({}) VALUES", table, columns)
        }
    }

    fn batch_insert_item_end(&self, is_last: bool) -> &'static str {
        if is_last {
            "\nSELECT 1 FROM DUAL;"
        } else {
            ""
        }
    }

    fn is_guid_column(&self, column: &TableColumn) -> bool {
        let ty = column.type_name();
        ty == "raw(16)" || (ty == "raw" && column.max_length == Some(16))
    }

    fn render_literal(&self, value: &SqlValue<'_>, column: &TableColumn) -> String {
        match value {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            SqlValue::F32(f) if !f.is_finite() => "NULL".to_string(),
            SqlValue::F64(f) if !f.is_finite() => "NULL".to_string(),
            SqlValue::Text(s) => self.quote(s),
            SqlValue::Bytes(b) => self.bytes_literal(b, column),
            SqlValue::Uuid(u) if is_character_column(column) => format!("'{}'", u.hyphenated()),
            // RAW(16) GUIDs keep the mixed-endian byte order of uniqueidentifier.
            SqlValue::Uuid(u) => format!("HEXTORAW('{}')", hex_upper(&u.to_bytes_le())),
            SqlValue::Date(d) => format!("TO_DATE('{}','YYYY-MM-DD')", format_date(d)),
            SqlValue::Time(t) => {
                let since_midnight = Duration::seconds(i64::from(t.num_seconds_from_midnight()))
                    + Duration::nanoseconds(i64::from(t.nanosecond()));
                Self::interval(&since_midnight)
            }
            SqlValue::DateTime(dt) => {
                let digits = fraction_digits(dt.nanosecond(), 9);
                format!(
                    "TO_TIMESTAMP('{}','{}')",
                    format_datetime(dt, 9),
                    Self::timestamp_mask(digits)
                )
            }
            SqlValue::DateTimeOffset(dt) => {
                let digits = fraction_digits(dt.nanosecond(), 9);
                format!(
                    "TO_TIMESTAMP_TZ('{} {}','{} TZH:TZM')",
                    format_datetime(&dt.naive_local(), 9),
                    dt.format("%:z"),
                    Self::timestamp_mask(digits)
                )
            }
            SqlValue::Duration(d) if is_datetime_column(column) => {
                self.render_literal(&SqlValue::DateTime(duration_as_datetime(d)), column)
            }
            SqlValue::Duration(d) => Self::interval(d),
            other => other.to_plain_string(),
        }
    }

    fn bytes_literal(&self, bytes: &[u8], _column: &TableColumn) -> String {
        format!("HEXTORAW('{}')", hex_upper(bytes))
    }

    fn needs_parameter(&self, _column: &TableColumn, value: &SqlValue<'_>) -> bool {
        value
            .as_str()
            .is_some_and(|s| s.chars().count() > MAX_LITERAL_CHARS)
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
        format!("GENERATED ALWAYS AS ({}) VIRTUAL", expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, TimeZone};
    use uuid::Uuid;

    fn column(ty: &str) -> TableColumn {
        TableColumn::new(&Table::new("", "T"), "c", ty, 1)
    }

    #[test]
    fn test_semicolons_are_spliced() {
        let d = OracleDialect::new();
        assert_eq!(
            d.render_literal(&SqlValue::from("a;b"), &column("varchar2")),
            "N'a'||CHR(59)||N'b'"
        );
    }

    #[test]
    fn test_timestamp_mask_follows_fraction() {
        let d = OracleDialect::new();
        let dt = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_milli_opt(7, 8, 9, 120)
            .unwrap();
        assert_eq!(
            d.render_literal(&SqlValue::DateTime(dt), &column("timestamp")),
            "TO_TIMESTAMP('2024-05-06 07:08:09.12','YYYY-MM-DD HH24:MI:SS.FF2')"
        );
        let whole = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap();
        assert_eq!(
            d.render_literal(&SqlValue::DateTime(whole), &column("timestamp")),
            "TO_TIMESTAMP('2024-05-06 07:08:09','YYYY-MM-DD HH24:MI:SS')"
        );
        let tz = FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 6, 7, 8, 9)
            .unwrap();
        assert_eq!(
            d.render_literal(&SqlValue::DateTimeOffset(tz), &column("timestamp with time zone")),
            "TO_TIMESTAMP_TZ('2024-05-06 07:08:09 -05:00','YYYY-MM-DD HH24:MI:SS TZH:TZM')"
        );
    }

    #[test]
    fn test_guid_to_raw16() {
        let d = OracleDialect::new();
        let guid = Uuid::parse_str("01020304-0506-0708-090a-0b0c0d0e0f10").unwrap();
        let mut raw = column("raw");
        raw.max_length = Some(16);
        assert!(d.is_guid_column(&raw));
        assert_eq!(
            d.render_literal(&SqlValue::Uuid(guid), &raw),
            "HEXTORAW('0403020106050807090A0B0C0D0E0F10')"
        );
        assert_eq!(
            d.render_literal(&SqlValue::Uuid(guid), &column("varchar2")),
            "'01020304-0506-0708-090a-0b0c0d0e0f10'"
        );
    }

    #[test]
    fn test_insert_all_batch_parts() {
        let d = OracleDialect::new();
        assert_eq!(d.batch_insert_prefix(), "INSERT ALL");
        assert_eq!(d.batch_insert_item_before("\"T\"", "\"A\"", true), " INTO \"T\"(\"A\")VALUES");
        assert_eq!(d.batch_insert_item_end(true), "\nSELECT 1 FROM DUAL;");
        assert_eq!(d.batch_insert_item_end(false), "");
    }

    #[test]
    fn test_long_text_needs_parameter() {
        let d = OracleDialect::new();
        let long = SqlValue::Text("x".repeat(4001).into());
        assert!(d.needs_parameter(&column("clob"), &long));
        assert!(!d.needs_parameter(&column("clob"), &SqlValue::from("short")));
    }

    #[test]
    fn test_interval_literal() {
        let d = OracleDialect::new();
        let span = SqlValue::Duration(Duration::hours(26) + Duration::milliseconds(5));
        assert_eq!(
            d.render_literal(&span, &column("interval day to second")),
            "INTERVAL '1 02:00:00.005' DAY TO SECOND"
        );
    }
}
