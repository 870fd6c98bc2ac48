//! Configuration validation.

use super::{Config, ConnectionConfig};
use crate::core::DatabaseType;
use crate::drivers::has_connector;
use crate::error::{ConvertError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_connection("source", &config.source)?;

    if let Some(target) = &config.target.connection {
        validate_connection("target.connection", target)?;
        if target.r#type != config.target.r#type {
            return Err(ConvertError::Config(format!(
                "target.connection.type must match target.type ({}), got {}",
                config.target.r#type, target.r#type
            )));
        }
        if target.same_database(&config.source) {
            return Err(ConvertError::Config(
                "source and target cannot be the same database".into(),
            ));
        }
    }

    let options = &config.options;
    if options.execute_on_target && config.target.connection.is_none() {
        return Err(ConvertError::Config(
            "options.execute_on_target requires target.connection".into(),
        ));
    }
    if options.batch_size == 0 {
        return Err(ConvertError::Config(
            "options.batch_size must be at least 1".into(),
        ));
    }
    if options.in_limit == 0 {
        return Err(ConvertError::Config(
            "options.in_limit must be at least 1".into(),
        ));
    }
    if options.output_modes.is_empty() && !options.execute_on_target {
        return Err(ConvertError::Config(
            "options.output_modes must name at least one output".into(),
        ));
    }
    if options.writes_file() && options.output_folder.as_os_str().is_empty() {
        return Err(ConvertError::Config(
            "options.output_folder is required for file output".into(),
        ));
    }

    Ok(())
}

fn validate_connection(section: &str, conn: &ConnectionConfig) -> Result<()> {
    if !has_connector(conn.r#type) {
        return Err(ConvertError::Config(format!(
            "{}.type '{}' has no connector; supported: mssql, postgres, sqlite",
            section,
            conn.r#type.key()
        )));
    }
    if conn.database.is_empty() {
        return Err(ConvertError::Config(format!(
            "{}.database is required",
            section
        )));
    }
    if conn.r#type != DatabaseType::Sqlite {
        if conn.host.is_empty() {
            return Err(ConvertError::Config(format!("{}.host is required", section)));
        }
        if conn.user.is_empty() {
            return Err(ConvertError::Config(format!("{}.user is required", section)));
        }
    }
    Ok(())
}
