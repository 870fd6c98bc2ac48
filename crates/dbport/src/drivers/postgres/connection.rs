//! PostgreSQL session over tokio-postgres.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, Config as PgConfig, NoTls};
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::core::{Connection, DatabaseType, Parameter, Row, SqlValue};
use crate::drivers::common::{bind_named_parameters, format_duration, TlsBuilder};
use crate::error::{ConvertError, Result};

/// An open PostgreSQL session.
pub struct PgConnection {
    client: Client,
    database: String,
}

impl PgConnection {
    /// Connect, negotiating TLS unless `ssl_mode` is `disable`.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let server = config.display_name();
        let mut pg_config = PgConfig::new();
        pg_config
            .host(&config.host)
            .port(config.port())
            .dbname(&config.database)
            .user(&config.user)
            .password(&config.password)
            .application_name("dbport");

        let client = match TlsBuilder::new(config.ssl_mode).build()? {
            Some(tls) => {
                let (client, connection) = pg_config
                    .connect(tls)
                    .await
                    .map_err(|e| ConvertError::connection(&server, e.to_string()))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        warn!("PostgreSQL connection closed with error: {}", e);
                    }
                });
                client
            }
            None => {
                let (client, connection) = pg_config
                    .connect(NoTls)
                    .await
                    .map_err(|e| ConvertError::connection(&server, e.to_string()))?;
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        warn!("PostgreSQL connection closed with error: {}", e);
                    }
                });
                client
            }
        };

        info!("Connected to PostgreSQL: {} (ssl_mode={})", server, config.ssl_mode);
        Ok(Self {
            client,
            database: config.database.clone(),
        })
    }
}

#[async_trait]
impl Connection for PgConnection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        debug!(sql, "postgres query");
        let rows = self
            .client
            .query(sql, &[])
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
        let types: Vec<Type> = first.columns().iter().map(|c| c.type_().clone()).collect();

        Ok(rows
            .iter()
            .map(|row| {
                let values = types
                    .iter()
                    .enumerate()
                    .map(|(idx, ty)| convert_pg_value(row, idx, ty))
                    .collect();
                Row::new(Arc::clone(&columns), values)
            })
            .collect())
    }

    async fn execute(&mut self, sql: &str, params: &[Parameter]) -> Result<u64> {
        let (sql_text, values) = bind_named_parameters(sql, params, |i| format!("${}", i));
        let boxed: Vec<Box<dyn ToSql + Sync + Send>> =
            values.into_iter().map(sql_value_to_param).collect();
        let refs: Vec<&(dyn ToSql + Sync)> = boxed
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();
        self.client
            .execute(sql_text.as_str(), &refs)
            .await
            .map_err(|e| ConvertError::query(sql, e.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        // Dropping the client ends the spawned connection task.
        drop(self.client);
        Ok(())
    }
}

/// Convert a PostgreSQL column value to the neutral value model.
fn convert_pg_value(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> SqlValue<'static> {
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx).ok().flatten().map(SqlValue::Bool),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx).ok().flatten().map(SqlValue::I16),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx).ok().flatten().map(SqlValue::I32),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx).ok().flatten().map(SqlValue::I64),
        Type::OID => row
            .try_get::<_, Option<u32>>(idx)
            .ok()
            .flatten()
            .map(|v| SqlValue::I64(i64::from(v))),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx).ok().flatten().map(SqlValue::F32),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).ok().flatten().map(SqlValue::F64),
        Type::NUMERIC => row
            .try_get::<_, Option<rust_decimal::Decimal>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Decimal),
        Type::UUID => row
            .try_get::<_, Option<uuid::Uuid>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Uuid),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::DateTime),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<FixedOffset>>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::DateTimeOffset),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Date),
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(idx)
            .ok()
            .flatten()
            .map(SqlValue::Time),
        Type::BYTEA => row
            .try_get::<_, Option<Vec<u8>>>(idx)
            .ok()
            .flatten()
            .map(|b| SqlValue::Bytes(Cow::Owned(b))),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .ok()
            .flatten()
            .map(|v| SqlValue::Text(Cow::Owned(v.to_string()))),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map(|s| SqlValue::Text(Cow::Owned(s))),
    };
    value.unwrap_or(SqlValue::Null)
}

fn sql_value_to_param(value: &SqlValue<'static>) -> Box<dyn ToSql + Sync + Send> {
    match value {
        SqlValue::Null => Box::new(Option::<String>::None),
        SqlValue::Bool(v) => Box::new(*v),
        SqlValue::I16(v) => Box::new(*v),
        SqlValue::I32(v) => Box::new(*v),
        SqlValue::I64(v) => Box::new(*v),
        SqlValue::F32(v) => Box::new(*v),
        SqlValue::F64(v) => Box::new(*v),
        SqlValue::Decimal(v) => Box::new(*v),
        SqlValue::Text(v) => Box::new(v.to_string()),
        SqlValue::Bytes(v) => Box::new(v.to_vec()),
        SqlValue::Uuid(v) => Box::new(*v),
        SqlValue::Date(v) => Box::new(*v),
        SqlValue::Time(v) => Box::new(*v),
        SqlValue::DateTime(v) => Box::new(*v),
        SqlValue::DateTimeOffset(v) => Box::new(*v),
        SqlValue::Duration(v) => Box::new(format_duration(v)),
    }
}
