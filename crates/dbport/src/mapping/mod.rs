//! Function and data type equivalence tables.
//!
//! Both tables ship with the crate as YAML and are parsed once per process.

pub mod datatype;
pub mod function;

use once_cell::sync::OnceCell;

use crate::error::Result;

pub use datatype::{ArgumentShape, DataTypeMapping, DataTypeMappings, DataTypeRow, TypeSpec};
pub use function::{FunctionAlias, FunctionMapping, FunctionMappings, ResolvedFunction};

const FUNCTIONS_YAML: &str = include_str!("functions.yaml");
const DATA_TYPES_YAML: &str = include_str!("datatypes.yaml");

static TABLES: OnceCell<MappingTables> = OnceCell::new();

/// Loaded mapping tables.
#[derive(Debug, Clone)]
pub struct MappingTables {
    pub functions: FunctionMappings,
    pub data_types: DataTypeMappings,
}

impl MappingTables {
    /// Parse the bundled tables.
    pub fn load() -> Result<Self> {
        Self::from_yaml(FUNCTIONS_YAML, DATA_TYPES_YAML)
    }

    /// Parse tables from YAML text.
    pub fn from_yaml(functions: &str, data_types: &str) -> Result<Self> {
        Ok(Self {
            functions: FunctionMappings::from_yaml(functions)?,
            data_types: DataTypeMappings::from_yaml(data_types)?,
        })
    }

    /// Process-wide bundled tables, parsed on first use.
    pub fn global() -> Result<&'static Self> {
        TABLES.get_or_try_init(Self::load)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DatabaseType;

    #[test]
    fn test_bundled_tables_load() {
        let tables = MappingTables::global().unwrap();
        assert!(tables.functions.iter().count() > 30);
        assert!(tables
            .data_types
            .is_type_name(DatabaseType::Postgres, "timestamptz"));
    }

    #[test]
    fn test_bad_yaml_is_mapping_error() {
        let err = MappingTables::from_yaml("- name: x\n  sqlserver: [", DATA_TYPES_YAML).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
