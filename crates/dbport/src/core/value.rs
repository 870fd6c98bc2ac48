//! SQL value types for dialect-neutral rows.
//!
//! Every row read from a source connection is converted into [`SqlValue`]s
//! so the renderer can decide, per target dialect, how each value is spelled
//! inside a generated script.

use std::borrow::Cow;
use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

/// SQL value enum for type-safe row handling.
///
/// Uses `Cow` for string and byte data so catalog helpers can borrow, while
/// rows held in pages are always `'static`.
///
/// # Example
///
/// ```rust
/// use std::borrow::Cow;
/// use dbport::core::SqlValue;
///
/// let borrowed: SqlValue<'_> = SqlValue::Text(Cow::Borrowed("hello"));
/// let owned: SqlValue<'static> = borrowed.into_owned();
/// assert_eq!(owned.as_str(), Some("hello"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue<'a> {
    /// NULL of any type.
    Null,

    /// Boolean value.
    Bool(bool),

    /// 16-bit signed integer (smallint).
    I16(i16),

    /// 32-bit signed integer (int).
    I32(i32),

    /// 64-bit signed integer (bigint).
    I64(i64),

    /// 32-bit floating point (real/float4).
    F32(f32),

    /// 64-bit floating point (double precision/float8).
    F64(f64),

    /// Decimal value with arbitrary precision.
    Decimal(Decimal),

    /// Text/string data.
    Text(Cow<'a, str>),

    /// Binary data. Sixteen-byte values may be GUIDs depending on the column.
    Bytes(Cow<'a, [u8]>),

    /// UUID/GUID value.
    Uuid(Uuid),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Timestamp with timezone offset.
    DateTimeOffset(DateTime<FixedOffset>),

    /// Elapsed time (SQL Server `time` read as an interval, Oracle `INTERVAL DAY TO SECOND`).
    Duration(Duration),
}

impl<'a> SqlValue<'a> {
    /// Convert to a fully owned value with `'static` lifetime.
    #[must_use]
    pub fn into_owned(self) -> SqlValue<'static> {
        match self {
            SqlValue::Null => SqlValue::Null,
            SqlValue::Bool(v) => SqlValue::Bool(v),
            SqlValue::I16(v) => SqlValue::I16(v),
            SqlValue::I32(v) => SqlValue::I32(v),
            SqlValue::I64(v) => SqlValue::I64(v),
            SqlValue::F32(v) => SqlValue::F32(v),
            SqlValue::F64(v) => SqlValue::F64(v),
            SqlValue::Decimal(v) => SqlValue::Decimal(v),
            SqlValue::Text(v) => SqlValue::Text(Cow::Owned(v.into_owned())),
            SqlValue::Bytes(v) => SqlValue::Bytes(Cow::Owned(v.into_owned())),
            SqlValue::Uuid(v) => SqlValue::Uuid(v),
            SqlValue::Date(v) => SqlValue::Date(v),
            SqlValue::Time(v) => SqlValue::Time(v),
            SqlValue::DateTime(v) => SqlValue::DateTime(v),
            SqlValue::DateTimeOffset(v) => SqlValue::DateTimeOffset(v),
            SqlValue::Duration(v) => SqlValue::Duration(v),
        }
    }

    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Integer view used when reading catalog rows (counts, flags, orders).
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Bool(v) => Some(i64::from(*v)),
            SqlValue::I16(v) => Some(i64::from(*v)),
            SqlValue::I32(v) => Some(i64::from(*v)),
            SqlValue::I64(v) => Some(*v),
            SqlValue::F32(v) => Some(*v as i64),
            SqlValue::F64(v) => Some(*v as i64),
            SqlValue::Decimal(v) => v.trunc().to_string().parse().ok(),
            SqlValue::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    /// Borrow the text content, if this is a text value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(v) => Some(v.as_ref()),
            _ => None,
        }
    }

    /// Boolean view tolerant of the many ways catalogs spell flags.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SqlValue::Bool(v) => Some(*v),
            SqlValue::Text(v) => match v.trim().to_ascii_lowercase().as_str() {
                "1" | "y" | "yes" | "true" | "t" => Some(true),
                "0" | "n" | "no" | "false" | "f" => Some(false),
                _ => None,
            },
            other => other.as_i64().map(|v| v != 0),
        }
    }

    /// Plain textual form used for IN-lists and diagnostics.
    #[must_use]
    pub fn to_plain_string(&self) -> String {
        match self {
            SqlValue::Null => String::new(),
            SqlValue::Bool(v) => if *v { "1" } else { "0" }.to_string(),
            SqlValue::I16(v) => v.to_string(),
            SqlValue::I32(v) => v.to_string(),
            SqlValue::I64(v) => v.to_string(),
            SqlValue::F32(v) => v.to_string(),
            SqlValue::F64(v) => v.to_string(),
            SqlValue::Decimal(v) => v.to_string(),
            SqlValue::Text(v) => v.to_string(),
            SqlValue::Bytes(v) => hex::encode_upper(v.as_ref()),
            SqlValue::Uuid(v) => v.hyphenated().to_string(),
            SqlValue::Date(v) => v.format("%Y-%m-%d").to_string(),
            SqlValue::Time(v) => v.format("%H:%M:%S%.f").to_string(),
            SqlValue::DateTime(v) => v.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            SqlValue::DateTimeOffset(v) => v.format("%Y-%m-%d %H:%M:%S%.f %:z").to_string(),
            SqlValue::Duration(v) => v.to_string(),
        }
    }
}

impl From<bool> for SqlValue<'static> {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue<'static> {
    fn from(v: i32) -> Self {
        SqlValue::I32(v)
    }
}

impl From<i64> for SqlValue<'static> {
    fn from(v: i64) -> Self {
        SqlValue::I64(v)
    }
}

impl From<f64> for SqlValue<'static> {
    fn from(v: f64) -> Self {
        SqlValue::F64(v)
    }
}

impl From<String> for SqlValue<'static> {
    fn from(v: String) -> Self {
        SqlValue::Text(Cow::Owned(v))
    }
}

impl<'a> From<&'a str> for SqlValue<'a> {
    fn from(v: &'a str) -> Self {
        SqlValue::Text(Cow::Borrowed(v))
    }
}

impl From<Vec<u8>> for SqlValue<'static> {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(Cow::Owned(v))
    }
}

impl From<Uuid> for SqlValue<'static> {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<Decimal> for SqlValue<'static> {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<NaiveDateTime> for SqlValue<'static> {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl From<DateTime<FixedOffset>> for SqlValue<'static> {
    fn from(v: DateTime<FixedOffset>) -> Self {
        SqlValue::DateTimeOffset(v)
    }
}

impl From<NaiveDate> for SqlValue<'static> {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveTime> for SqlValue<'static> {
    fn from(v: NaiveTime) -> Self {
        SqlValue::Time(v)
    }
}

impl<T> From<Option<T>> for SqlValue<'static>
where
    T: Into<SqlValue<'static>>,
{
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One result row: shared column names plus positional values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<SqlValue<'static>>,
}

impl Row {
    /// Create a row. `values` must line up with `columns`.
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue<'static>>) -> Self {
        Self { columns, values }
    }

    /// Column names in select order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values in select order.
    pub fn values(&self) -> &[SqlValue<'static>] {
        &self.values
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up a value by column name (case-insensitive).
    pub fn get(&self, column: &str) -> Option<&SqlValue<'static>> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .map(|idx| &self.values[idx])
    }

    /// Text value of a column; non-text values are rendered plainly.
    pub fn get_string(&self, column: &str) -> Option<String> {
        match self.get(column)? {
            SqlValue::Null => None,
            SqlValue::Text(v) => Some(v.to_string()),
            other => Some(other.to_plain_string()),
        }
    }

    /// Integer value of a column.
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(SqlValue::as_i64)
    }

    /// Flag value of a column; absent or unreadable flags are false.
    pub fn get_flag(&self, column: &str) -> bool {
        self.get(column).and_then(SqlValue::as_bool).unwrap_or(false)
    }

    /// Remove a column (used to drop the row-number helper column).
    pub fn without_column(self, column: &str) -> Row {
        let Some(idx) = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
        else {
            return self;
        };
        let columns: Arc<[String]> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, c)| c.clone())
            .collect();
        let mut values = self.values;
        values.remove(idx);
        Row { columns, values }
    }

    /// Replace a value in place.
    pub fn set(&mut self, column: &str, value: SqlValue<'static>) {
        if let Some(idx) = self
            .columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
        {
            self.values[idx] = value;
        }
    }
}

/// Rows of one table, read page by page.
///
/// Page numbers are 1-based and contiguous across the whole read, child
/// levels of a self-referencing table included. Only the most recent page
/// is held; pushing a page releases the previous one.
#[derive(Debug, Clone, Default)]
pub struct PagedDataSet {
    current: Option<(u64, Vec<Row>)>,
    pages: u64,
    rows: u64,
}

impl PagedDataSet {
    /// Create an empty data set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held page with `rows` under the next page number.
    pub fn push_page(&mut self, rows: Vec<Row>) -> u64 {
        self.pages += 1;
        self.rows += rows.len() as u64;
        self.current = Some((self.pages, rows));
        self.pages
    }

    /// The page pushed last, with its number.
    pub fn current(&self) -> Option<(u64, &[Row])> {
        self.current
            .as_ref()
            .map(|(number, rows)| (*number, rows.as_slice()))
    }

    /// Release the held page.
    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Number of pages pushed so far.
    #[must_use]
    pub fn page_count(&self) -> u64 {
        self.pages
    }

    /// Number of rows pushed so far.
    #[must_use]
    pub fn row_count(&self) -> u64 {
        self.rows
    }

    /// True when no page has been pushed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages == 0
    }
}
