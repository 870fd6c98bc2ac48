//! SQL Server session over tiberius.

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use tiberius::numeric::Numeric;
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql, Query};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::core::{Connection, DatabaseType, Parameter, Row, SqlValue};
use crate::drivers::common::{bind_named_parameters, format_duration};
use crate::error::{ConvertError, Result};

/// An open SQL Server session.
pub struct MssqlConnection {
    client: Client<Compat<TcpStream>>,
    database: String,
}

impl MssqlConnection {
    /// Connect and log in.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let server = config.display_name();
        let tds = build_config(config);

        let tcp = TcpStream::connect(tds.get_addr())
            .await
            .map_err(|e| ConvertError::connection(&server, e.to_string()))?;
        tcp.set_nodelay(true).ok();

        let client = Client::connect(tds, tcp.compat_write())
            .await
            .map_err(|e| ConvertError::connection(&server, e.to_string()))?;

        info!("Connected to SQL Server: {}", server);
        Ok(Self {
            client,
            database: config.database.clone(),
        })
    }
}

fn build_config(config: &ConnectionConfig) -> Config {
    let mut tds = Config::new();
    tds.host(&config.host);
    tds.port(config.port());
    tds.database(&config.database);
    tds.authentication(AuthMethod::sql_server(&config.user, &config.password));

    if config.encrypt {
        if config.trust_server_cert {
            tds.trust_cert();
        }
        tds.encryption(EncryptionLevel::Required);
    } else {
        tds.encryption(EncryptionLevel::NotSupported);
    }
    tds
}

#[async_trait]
impl Connection for MssqlConnection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::SqlServer
    }

    fn database_name(&self) -> &str {
        &self.database
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        debug!(sql, "mssql query");
        let stream = self
            .client
            .simple_query(sql)
            .await
            .map_err(|e| ConvertError::query(sql, e.to_string()))?;
        let rows = stream
            .into_first_result()
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
            .into_iter()
            .map(|row| {
                let values = row.into_iter().map(|cell| convert_cell(&cell)).collect();
                Row::new(Arc::clone(&columns), values)
            })
            .collect())
    }

    async fn execute(&mut self, sql: &str, params: &[Parameter]) -> Result<u64> {
        let (sql_text, values) = bind_named_parameters(sql, params, |i| format!("@P{}", i));
        let mut query = Query::new(sql_text);
        for value in values {
            bind_value(&mut query, value);
        }
        let result = query
            .execute(&mut self.client)
            .await
            .map_err(|e| ConvertError::query(sql, e.to_string()))?;
        Ok(result.total())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

/// Convert a tiberius cell into the neutral value model.
fn convert_cell(cell: &ColumnData<'static>) -> SqlValue<'static> {
    let value = match cell {
        ColumnData::U8(v) => v.map(|v| SqlValue::I16(i16::from(v))),
        ColumnData::I16(v) => v.map(SqlValue::I16),
        ColumnData::I32(v) => v.map(SqlValue::I32),
        ColumnData::I64(v) => v.map(SqlValue::I64),
        ColumnData::F32(v) => v.map(SqlValue::F32),
        ColumnData::F64(v) => v.map(SqlValue::F64),
        ColumnData::Bit(v) => v.map(SqlValue::Bool),
        ColumnData::String(v) => v
            .as_ref()
            .map(|s| SqlValue::Text(Cow::Owned(s.to_string()))),
        ColumnData::Guid(v) => v.map(SqlValue::Uuid),
        ColumnData::Binary(v) => v
            .as_ref()
            .map(|b| SqlValue::Bytes(Cow::Owned(b.to_vec()))),
        ColumnData::Numeric(_) => Decimal::from_sql(cell)
            .ok()
            .flatten()
            .map(SqlValue::Decimal),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|x| SqlValue::Text(Cow::Owned(x.to_string()))),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(cell)
                .ok()
                .flatten()
                .map(SqlValue::DateTime)
        }
        ColumnData::Date(_) => NaiveDate::from_sql(cell).ok().flatten().map(SqlValue::Date),
        ColumnData::Time(_) => NaiveTime::from_sql(cell).ok().flatten().map(SqlValue::Time),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(cell)
            .ok()
            .flatten()
            .map(SqlValue::DateTimeOffset),
    };
    value.unwrap_or(SqlValue::Null)
}

fn bind_value(query: &mut Query<'_>, value: &SqlValue<'static>) {
    match value {
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::I16(v) => query.bind(*v),
        SqlValue::I32(v) => query.bind(*v),
        SqlValue::I64(v) => query.bind(*v),
        SqlValue::F32(v) => query.bind(*v),
        SqlValue::F64(v) => query.bind(*v),
        SqlValue::Decimal(v) => query.bind(to_numeric(v)),
        SqlValue::Text(v) => query.bind(v.to_string()),
        SqlValue::Bytes(v) => query.bind(v.to_vec()),
        SqlValue::Uuid(v) => query.bind(*v),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Time(v) => query.bind(*v),
        SqlValue::DateTime(v) => query.bind(*v),
        SqlValue::DateTimeOffset(v) => query.bind(*v),
        SqlValue::Duration(v) => query.bind(format_duration(v)),
    }
}

fn to_numeric(value: &Decimal) -> Numeric {
    Numeric::new_with_scale(value.mantissa(), value.scale() as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::SslMode;

    fn config(encrypt: bool) -> ConnectionConfig {
        ConnectionConfig {
            r#type: DatabaseType::SqlServer,
            host: "sql.internal".to_string(),
            port: Some(1444),
            database: "Sales".to_string(),
            user: "sa".to_string(),
            password: "pw".to_string(),
            encrypt,
            trust_server_cert: true,
            ssl_mode: SslMode::Disable,
        }
    }

    #[test]
    fn test_build_config_address() {
        let tds = build_config(&config(true));
        assert_eq!(tds.get_addr(), "sql.internal:1444");
    }

    #[test]
    fn test_decimal_binds_as_numeric() {
        let numeric = to_numeric(&Decimal::new(-12345, 2));
        assert_eq!(numeric.value(), -12345);
        assert_eq!(numeric.scale(), 2);
    }

    #[test]
    fn test_convert_cell() {
        assert_eq!(convert_cell(&ColumnData::U8(Some(7))), SqlValue::I16(7));
        assert_eq!(convert_cell(&ColumnData::I32(None)), SqlValue::Null);
        assert_eq!(convert_cell(&ColumnData::Bit(Some(true))), SqlValue::Bool(true));
        assert_eq!(
            convert_cell(&ColumnData::String(Some(Cow::Owned("x".to_string())))),
            SqlValue::Text(Cow::Owned("x".to_string()))
        );
        assert_eq!(
            convert_cell(&ColumnData::Binary(Some(Cow::Owned(vec![1, 2])))),
            SqlValue::Bytes(Cow::Owned(vec![1, 2]))
        );
    }
}
