//! Supported database engines.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConvertError;

/// A SQL dialect / database engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    #[serde(alias = "mssql", alias = "sql_server")]
    SqlServer,
    MySql,
    Oracle,
    #[serde(alias = "postgresql", alias = "pg")]
    Postgres,
    Sqlite,
}

impl DatabaseType {
    /// Every supported engine.
    pub const ALL: [DatabaseType; 5] = [
        DatabaseType::SqlServer,
        DatabaseType::MySql,
        DatabaseType::Oracle,
        DatabaseType::Postgres,
        DatabaseType::Sqlite,
    ];

    /// Key used in the mapping tables and configuration.
    pub fn key(self) -> &'static str {
        match self {
            DatabaseType::SqlServer => "sqlserver",
            DatabaseType::MySql => "mysql",
            DatabaseType::Oracle => "oracle",
            DatabaseType::Postgres => "postgres",
            DatabaseType::Sqlite => "sqlite",
        }
    }

    /// Label used in file names and feedback (`SqlServer`, `Postgres`).
    pub fn label(self) -> &'static str {
        match self {
            DatabaseType::SqlServer => "SqlServer",
            DatabaseType::MySql => "MySql",
            DatabaseType::Oracle => "Oracle",
            DatabaseType::Postgres => "Postgres",
            DatabaseType::Sqlite => "Sqlite",
        }
    }

    /// Default TCP port, where the engine has one.
    pub fn default_port(self) -> Option<u16> {
        match self {
            DatabaseType::SqlServer => Some(1433),
            DatabaseType::MySql => Some(3306),
            DatabaseType::Oracle => Some(1521),
            DatabaseType::Postgres => Some(5432),
            DatabaseType::Sqlite => None,
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DatabaseType {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlserver" | "mssql" | "sql_server" => Ok(DatabaseType::SqlServer),
            "mysql" => Ok(DatabaseType::MySql),
            "oracle" => Ok(DatabaseType::Oracle),
            "postgres" | "postgresql" | "pg" => Ok(DatabaseType::Postgres),
            "sqlite" => Ok(DatabaseType::Sqlite),
            other => Err(ConvertError::Config(format!(
                "Unknown database type: '{}'. Supported types: sqlserver, mysql, oracle, postgres, sqlite",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("mssql".parse::<DatabaseType>().unwrap(), DatabaseType::SqlServer);
        assert_eq!("PG".parse::<DatabaseType>().unwrap(), DatabaseType::Postgres);
        assert_eq!("sqlite".parse::<DatabaseType>().unwrap(), DatabaseType::Sqlite);
        assert!("db2".parse::<DatabaseType>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let t: DatabaseType = serde_yaml::from_str("mssql").unwrap();
        assert_eq!(t, DatabaseType::SqlServer);
        assert_eq!(serde_yaml::to_string(&DatabaseType::MySql).unwrap().trim(), "mysql");
    }

    #[test]
    fn test_keys_and_labels() {
        for db in DatabaseType::ALL {
            assert_eq!(db.key().parse::<DatabaseType>().unwrap(), db);
        }
        assert_eq!(DatabaseType::SqlServer.label(), "SqlServer");
    }
}
