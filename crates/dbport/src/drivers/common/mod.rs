//! Helpers shared by the dialect and connector implementations.
//!
//! - [`tls`]: TLS configuration for PostgreSQL connections
//! - literal formatting (strings, hex, date/time, durations)
//! - named-parameter binding for batches produced in execution mode

pub mod tls;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::core::{Parameter, SqlValue, TableColumn};

pub use tls::{SslMode, TlsBuilder};

/// `prefix'text'` with embedded single quotes doubled.
pub fn quote_text(text: &str, prefix: &str) -> String {
    format!("{}'{}'", prefix, text.replace('\'', "''"))
}

/// Upper-case hex without prefix.
pub fn hex_upper(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// `.fff` with trailing zeros trimmed and at most `max_digits` digits; empty when zero.
pub fn fraction(nanos: u32, max_digits: usize) -> String {
    let digits = format!("{:09}", nanos % 1_000_000_000);
    let digits = &digits[..max_digits.min(9)];
    let trimmed = digits.trim_end_matches('0');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(".{}", trimmed)
    }
}

/// Number of significant fractional-second digits, capped at `max_digits`.
pub fn fraction_digits(nanos: u32, max_digits: usize) -> usize {
    fraction(nanos, max_digits).len().saturating_sub(1)
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn format_time(time: &NaiveTime, max_digits: usize) -> String {
    format!(
        "{}{}",
        time.format("%H:%M:%S"),
        fraction(time.nanosecond(), max_digits)
    )
}

pub fn format_datetime(dt: &NaiveDateTime, max_digits: usize) -> String {
    format!(
        "{} {}",
        format_date(&dt.date()),
        format_time(&dt.time(), max_digits)
    )
}

/// `[-][d.]hh:mm:ss[.fffffff]`.
pub fn format_duration(duration: &Duration) -> String {
    let negative = *duration < Duration::zero();
    let abs = if negative { -*duration } else { *duration };
    let days = abs.num_days();
    let secs = abs.num_seconds() - days * 86_400;
    let ticks = (abs - Duration::seconds(abs.num_seconds()))
        .num_nanoseconds()
        .unwrap_or(0)
        / 100;

    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if days > 0 {
        out.push_str(&format!("{}.", days));
    }
    out.push_str(&format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    ));
    if ticks > 0 {
        out.push_str(&format!(".{:07}", ticks));
    }
    out
}

/// Anchor a duration at 1970-01-01 for datetime columns.
pub fn duration_as_datetime(duration: &Duration) -> NaiveDateTime {
    NaiveDateTime::default() + *duration
}

/// True when the declared column type holds a point in time.
pub fn is_datetime_column(column: &TableColumn) -> bool {
    let ty = column.type_name();
    ty.contains("date") || ty.contains("timestamp")
}

/// True when the declared column type is a character type.
pub fn is_character_column(column: &TableColumn) -> bool {
    let ty = column.type_name();
    ty.contains("char") || ty.contains("text") || ty.contains("clob")
}

/// Remove emoji and their joiners/variation selectors.
pub fn strip_emoji(text: &str) -> String {
    text.chars().filter(|c| !is_emoji(*c)).collect()
}

fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F000..=0x1FAFF | 0x2600..=0x27BF | 0x2B00..=0x2BFF | 0xFE0F | 0x200D | 0xE0020..=0xE007F)
}

/// `" AND column IN ('a','b')"`, or empty when `names` is empty.
pub fn in_names(column: &str, names: &[String]) -> String {
    if names.is_empty() {
        return String::new();
    }
    let list: Vec<String> = names.iter().map(|n| quote_text(n, "")).collect();
    format!(" AND {} IN ({})", column, list.join(","))
}

/// `" AND column = 'owner'"`, or empty without an owner.
pub fn owner_is(column: &str, owner: Option<&str>) -> String {
    match owner {
        Some(o) if !o.is_empty() => format!(" AND {} = {}", column, quote_text(o, "")),
        _ => String::new(),
    }
}

/// Rewrite named placeholders (`@P1_0_Photo`) into the engine's positional
/// form and return the values in binding order.
///
/// Text inside string literals is left alone. Placeholders are matched
/// longest-name first so `@P1_1` never swallows part of `@P1_10`.
pub fn bind_named_parameters<'p>(
    sql: &str,
    params: &'p [Parameter],
    placeholder: impl Fn(usize) -> String,
) -> (String, Vec<&'p SqlValue<'static>>) {
    if params.is_empty() {
        return (sql.to_string(), Vec::new());
    }

    let mut by_length: Vec<&Parameter> = params.iter().collect();
    by_length.sort_by(|a, b| b.name.len().cmp(&a.name.len()));

    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut in_string = false;
    let mut idx = 0;
    while idx < sql.len() {
        let rest = &sql[idx..];
        let Some(ch) = rest.chars().next() else {
            break;
        };
        if ch == '\'' {
            in_string = !in_string;
        }
        if !in_string {
            let hit = by_length.iter().find(|p| {
                rest.starts_with(p.name.as_str())
                    && !rest[p.name.len()..]
                        .chars()
                        .next()
                        .is_some_and(|n| n.is_alphanumeric() || n == '_')
            });
            if let Some(param) = hit {
                values.push(&param.value);
                out.push_str(&placeholder(values.len()));
                idx += param.name.len();
                continue;
            }
        }
        out.push(ch);
        idx += ch.len_utf8();
    }
    (out, values)
}
