//! SQLite session over sqlx.

use std::borrow::Cow;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteConnectOptions, SqliteRow};
use sqlx::{Column as _, ConnectOptions as _, Connection as _, Row as _, TypeInfo as _, ValueRef as _};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::core::{Connection, DatabaseType, Parameter, Row, SqlValue};
use crate::drivers::common::{bind_named_parameters, format_duration};
use crate::error::{ConvertError, Result};

/// Database path that opens a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// An open SQLite session.
pub struct SqliteConnection {
    conn: sqlx::sqlite::SqliteConnection,
    database: String,
}

impl SqliteConnection {
    /// Open the database file named by `config.database`; the file must exist.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let path = config.database.as_str();
        let options = if path == IN_MEMORY || path == "sqlite::memory:" {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| ConvertError::connection(path, e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(false)
        };

        let conn = options
            .connect()
            .await
            .map_err(|e| ConvertError::connection(path, e.to_string()))?;

        info!("Opened SQLite database: {}", path);
        Ok(Self {
            conn,
            database: database_name(path),
        })
    }
}

/// File stem of the database path (`main` for in-memory databases).
fn database_name(path: &str) -> String {
    if path == IN_MEMORY || path == "sqlite::memory:" {
        return "main".to_string();
    }
    std::path::Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

#[async_trait]
impl Connection for SqliteConnection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        debug!(sql, "sqlite query");
        let rows = sqlx::query(sql)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| ConvertError::query(sql, e.to_string()))?;

        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let columns: Arc<[String]> = first
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        Ok(rows
            .iter()
            .map(|row| {
                let values = (0..columns.len())
                    .map(|idx| convert_sqlite_value(row, idx))
                    .collect();
                Row::new(Arc::clone(&columns), values)
            })
            .collect())
    }

    async fn execute(&mut self, sql: &str, params: &[Parameter]) -> Result<u64> {
        let (sql_text, values) = bind_named_parameters(sql, params, |i| format!("?{}", i));
        let mut query = sqlx::query(&sql_text);
        for value in values {
            query = bind_value(query, value);
        }
        let result = query
            .execute(&mut self.conn)
            .await
            .map_err(|e| ConvertError::query(sql, e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

/// Convert by storage class, refined by the declared column type.
fn convert_sqlite_value(row: &SqliteRow, idx: usize) -> SqlValue<'static> {
    let Ok(raw) = row.try_get_raw(idx) else {
        return SqlValue::Null;
    };
    if raw.is_null() {
        return SqlValue::Null;
    }
    let storage = raw.type_info().name().to_ascii_uppercase();
    let declared = row.columns()[idx].type_info().name().to_ascii_uppercase();

    let value = match storage.as_str() {
        "INTEGER" | "BIGINT" | "INT8" => {
            if declared == "BOOLEAN" {
                row.try_get::<bool, _>(idx).ok().map(SqlValue::Bool)
            } else {
                row.try_get::<i64, _>(idx).ok().map(SqlValue::I64)
            }
        }
        "REAL" => row.try_get::<f64, _>(idx).ok().map(SqlValue::F64),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(idx)
            .ok()
            .map(|b| SqlValue::Bytes(Cow::Owned(b))),
        _ => {
            let temporal = match declared.as_str() {
                "DATETIME" => row.try_get::<NaiveDateTime, _>(idx).ok().map(SqlValue::DateTime),
                "DATE" => row.try_get::<NaiveDate, _>(idx).ok().map(SqlValue::Date),
                "TIME" => row.try_get::<NaiveTime, _>(idx).ok().map(SqlValue::Time),
                _ => None,
            };
            temporal.or_else(|| {
                row.try_get::<String, _>(idx)
                    .ok()
                    .map(|s| SqlValue::Text(Cow::Owned(s)))
            })
        }
    };
    value.unwrap_or(SqlValue::Null)
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &SqlValue<'static>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::I16(v) => query.bind(*v),
        SqlValue::I32(v) => query.bind(*v),
        SqlValue::I64(v) => query.bind(*v),
        SqlValue::F32(v) => query.bind(*v),
        SqlValue::F64(v) => query.bind(*v),
        SqlValue::Decimal(v) => query.bind(v.to_string()),
        SqlValue::Text(v) => query.bind(v.to_string()),
        SqlValue::Bytes(v) => query.bind(v.to_vec()),
        SqlValue::Uuid(v) => query.bind(v.to_string()),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Time(v) => query.bind(*v),
        SqlValue::DateTime(v) => query.bind(*v),
        SqlValue::DateTimeOffset(v) => query.bind(*v),
        SqlValue::Duration(v) => query.bind(format_duration(v)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::SslMode;

    fn memory_config() -> ConnectionConfig {
        ConnectionConfig {
            r#type: DatabaseType::Sqlite,
            host: String::new(),
            port: None,
            database: IN_MEMORY.to_string(),
            user: String::new(),
            password: String::new(),
            encrypt: false,
            trust_server_cert: false,
            ssl_mode: SslMode::Disable,
        }
    }

    #[test]
    fn test_database_name() {
        assert_eq!(database_name("/data/shop.db"), "shop");
        assert_eq!(database_name(IN_MEMORY), "main");
    }

    #[tokio::test]
    async fn test_roundtrip_values() {
        let mut conn = SqliteConnection::connect(&memory_config()).await.unwrap();
        conn.execute(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, score REAL, \
             photo BLOB, active BOOLEAN, created DATETIME)",
            &[],
        )
        .await
        .unwrap();
        let params = vec![Parameter::new("@P1_0_photo", SqlValue::Bytes(Cow::Owned(vec![1, 2, 3])))];
        let affected = conn
            .execute(
                "INSERT INTO t VALUES (1, 'a;b', 1.5, @P1_0_photo, 1, '2024-05-01 08:30:00')",
                &params,
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let rows = conn.query("SELECT * FROM t").await.unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.get("id"), Some(&SqlValue::I64(1)));
        assert_eq!(row.get_string("name").as_deref(), Some("a;b"));
        assert_eq!(row.get("score"), Some(&SqlValue::F64(1.5)));
        assert_eq!(row.get("photo"), Some(&SqlValue::Bytes(Cow::Owned(vec![1, 2, 3]))));
        assert_eq!(row.get("active"), Some(&SqlValue::Bool(true)));
        assert!(matches!(row.get("created"), Some(SqlValue::DateTime(_))));

        let count = conn.query_scalar("SELECT COUNT(1) FROM t").await.unwrap();
        assert_eq!(count.and_then(|v| v.as_i64()), Some(1));
        Box::new(conn).close().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_a_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = memory_config();
        config.database = dir.path().join("absent.db").to_string_lossy().into_owned();
        let err = SqliteConnection::connect(&config).await.err().unwrap();
        assert_eq!(err.exit_code(), 3);
    }
}
