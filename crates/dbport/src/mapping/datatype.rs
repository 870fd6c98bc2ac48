//! Data type mapping table.
//!
//! Resolves a source type name to a canonical type, then writes the target
//! dialect's spelling with arguments reshaped and clamped to the target's
//! valid range.

use serde::Deserialize;

use crate::core::{DatabaseType, TableColumn};
use crate::error::{ConvertError, Result};

/// Which arguments a type takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentShape {
    #[default]
    None,
    Length,
    Precision,
    PrecisionScale,
    Scale,
}

/// A type as written in SQL text: name plus raw arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpec {
    pub name: String,
    pub args: Vec<String>,
}

impl TypeSpec {
    /// Parse `nvarchar(50)`, `DECIMAL(10, 2)`, `timestamp(3) with time zone`.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        match (text.find('('), text.rfind(')')) {
            (Some(open), Some(close)) if close > open => {
                let head = text[..open].trim();
                let tail = text[close + 1..].trim();
                let name = if tail.is_empty() {
                    head.to_string()
                } else {
                    format!("{} {}", head, tail)
                };
                let args = text[open + 1..close]
                    .split(',')
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .collect();
                Self { name, args }
            }
            _ => Self {
                name: text.to_string(),
                args: Vec::new(),
            },
        }
    }

    /// Arguments a column carries for a given source shape.
    pub fn from_column(column: &TableColumn, shape: ArgumentShape) -> Self {
        let args = match shape {
            ArgumentShape::None => Vec::new(),
            ArgumentShape::Length => match column.max_length {
                Some(-1) => vec!["max".to_string()],
                Some(n) if n > 0 => vec![n.to_string()],
                _ => Vec::new(),
            },
            ArgumentShape::Precision => column
                .precision
                .filter(|p| *p > 0)
                .map(|p| vec![p.to_string()])
                .unwrap_or_default(),
            ArgumentShape::PrecisionScale => match (column.precision, column.scale) {
                (Some(p), Some(s)) if p > 0 => vec![p.to_string(), s.to_string()],
                (Some(p), None) if p > 0 => vec![p.to_string()],
                _ => Vec::new(),
            },
            ArgumentShape::Scale => column
                .scale
                .map(|s| vec![s.to_string()])
                .unwrap_or_default(),
        };
        Self {
            name: column.data_type.trim().to_string(),
            args,
        }
    }

    /// Write the type back as SQL.
    pub fn to_sql(&self) -> String {
        write_type(&self.name, &self.args)
    }
}

fn write_type(name: &str, args: &[String]) -> String {
    if args.is_empty() {
        return name.to_string();
    }
    let list = format!("({})", args.join(","));
    // `timestamp with time zone` takes its precision after the first word.
    match name.find(" with ") {
        Some(pos) => format!("{}{}{}", &name[..pos], list, &name[pos..]),
        None => format!("{}{}", name, list),
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawTypeRow {
    names: String,
    #[serde(default)]
    args: ArgumentShape,
    #[serde(default)]
    range: Option<[i64; 2]>,
    #[serde(default)]
    max: Option<String>,
    #[serde(default)]
    cast: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawType {
    name: String,
    #[serde(default)]
    sqlserver: Option<RawTypeRow>,
    #[serde(default)]
    mysql: Option<RawTypeRow>,
    #[serde(default)]
    oracle: Option<RawTypeRow>,
    #[serde(default)]
    postgres: Option<RawTypeRow>,
    #[serde(default)]
    sqlite: Option<RawTypeRow>,
}

impl RawType {
    fn take_row(&mut self, db: DatabaseType) -> Option<RawTypeRow> {
        match db {
            DatabaseType::SqlServer => self.sqlserver.take(),
            DatabaseType::MySql => self.mysql.take(),
            DatabaseType::Oracle => self.oracle.take(),
            DatabaseType::Postgres => self.postgres.take(),
            DatabaseType::Sqlite => self.sqlite.take(),
        }
    }
}

/// A canonical type's spelling in one dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataTypeRow {
    pub dialect: DatabaseType,
    /// Names; the first is written when this dialect is the target.
    pub names: Vec<String>,
    pub shape: ArgumentShape,
    pub range: Option<(i64, i64)>,
    pub max_name: Option<String>,
    pub cast_name: Option<String>,
}

impl DataTypeRow {
    pub fn type_name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or("")
    }

    fn matches(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    fn clamp(&self, value: i64) -> i64 {
        match self.range {
            Some((min, max)) => value.clamp(min, max),
            None => value,
        }
    }

    fn exceeds(&self, value: i64) -> bool {
        self.range.is_some_and(|(_, max)| value > max)
    }

    /// Reshape source arguments for this (target) row.
    ///
    /// Returns the name to write (possibly the unbounded `max` name) and the
    /// argument list.
    fn reshape(&self, name: &str, args: &[String]) -> (String, Vec<String>) {
        let numeric = |idx: usize| args.get(idx).and_then(|a| a.trim().parse::<i64>().ok());
        let unbounded = args
            .first()
            .is_some_and(|a| a.eq_ignore_ascii_case("max") || a.trim() == "-1");

        match self.shape {
            ArgumentShape::None => (name.to_string(), Vec::new()),
            ArgumentShape::Length => {
                if unbounded {
                    return match &self.max_name {
                        Some(max) => (max.clone(), Vec::new()),
                        None => (name.to_string(), Vec::new()),
                    };
                }
                match numeric(0) {
                    Some(n) if self.exceeds(n) && self.max_name.is_some() => {
                        (self.max_name.clone().unwrap_or_default(), Vec::new())
                    }
                    Some(n) => (name.to_string(), vec![self.clamp(n).to_string()]),
                    None => (name.to_string(), Vec::new()),
                }
            }
            ArgumentShape::Precision => match numeric(0) {
                Some(p) => (name.to_string(), vec![self.clamp(p).to_string()]),
                None => (name.to_string(), Vec::new()),
            },
            ArgumentShape::PrecisionScale => match (numeric(0), numeric(1)) {
                (Some(p), Some(s)) if p > 0 => {
                    let p = self.clamp(p);
                    (name.to_string(), vec![p.to_string(), s.clamp(0, p).to_string()])
                }
                (Some(p), None) if p > 0 => (name.to_string(), vec![self.clamp(p).to_string()]),
                _ => (name.to_string(), Vec::new()),
            },
            ArgumentShape::Scale => {
                // A scale may arrive as the only argument or as the last of two.
                let scale = if args.len() >= 2 { numeric(1) } else { numeric(0) };
                match scale {
                    Some(s) => {
                        let limit = self.range.map_or(s, |(_, max)| s.min(max));
                        (name.to_string(), vec![limit.max(0).to_string()])
                    }
                    None => (name.to_string(), Vec::new()),
                }
            }
        }
    }
}

/// One canonical type.
#[derive(Debug, Clone)]
pub struct DataTypeMapping {
    pub canonical: String,
    rows: Vec<DataTypeRow>,
}

impl DataTypeMapping {
    pub fn row(&self, db: DatabaseType) -> Option<&DataTypeRow> {
        self.rows.iter().find(|r| r.dialect == db)
    }
}

/// The whole data type table.
#[derive(Debug, Clone, Default)]
pub struct DataTypeMappings {
    mappings: Vec<DataTypeMapping>,
}

impl DataTypeMappings {
    /// Parse the YAML table.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: Vec<RawType> = serde_yaml::from_str(yaml)?;
        let mut mappings = Vec::with_capacity(raw.len());
        for mut entry in raw {
            let mut rows = Vec::new();
            for db in DatabaseType::ALL {
                let Some(row) = entry.take_row(db) else {
                    continue;
                };
                let names: Vec<String> = row
                    .names
                    .split(',')
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty())
                    .collect();
                if names.is_empty() {
                    return Err(ConvertError::Mapping(format!(
                        "data type '{}' has no names for {}",
                        entry.name, db
                    )));
                }
                rows.push(DataTypeRow {
                    dialect: db,
                    names,
                    shape: row.args,
                    range: row.range.map(|[min, max]| (min, max)),
                    max_name: row.max,
                    cast_name: row.cast,
                });
            }
            mappings.push(DataTypeMapping {
                canonical: entry.name,
                rows,
            });
        }
        Ok(Self { mappings })
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataTypeMapping> {
        self.mappings.iter()
    }

    /// First canonical type that lists `name` for `db`.
    pub fn resolve(&self, db: DatabaseType, name: &str) -> Option<&DataTypeMapping> {
        let name = name.trim();
        self.mappings
            .iter()
            .find(|m| m.row(db).is_some_and(|r| r.matches(name)))
    }

    /// True when `name` is a known type name of `db`.
    pub fn is_type_name(&self, db: DatabaseType, name: &str) -> bool {
        self.resolve(db, name).is_some()
    }

    /// Translate a written type; `None` when the source type is unknown or
    /// the target has no equivalent.
    pub fn translate(
        &self,
        spec: &TypeSpec,
        source: DatabaseType,
        target: DatabaseType,
    ) -> Option<TypeSpec> {
        let row = self.resolve(source, &spec.name)?.row(target)?;
        let (name, args) = row.reshape(row.type_name(), &spec.args);
        Some(TypeSpec { name, args })
    }

    /// Translate the target type of a `CAST(.. AS type)`.
    pub fn translate_cast(
        &self,
        spec: &TypeSpec,
        source: DatabaseType,
        target: DatabaseType,
    ) -> Option<TypeSpec> {
        let row = self.resolve(source, &spec.name)?.row(target)?;
        match &row.cast_name {
            Some(cast) if cast.contains('(') => Some(TypeSpec {
                name: cast.clone(),
                args: Vec::new(),
            }),
            Some(cast) => {
                let (_, args) = row.reshape(cast, &spec.args);
                Some(TypeSpec {
                    name: cast.clone(),
                    args,
                })
            }
            None => {
                let (name, args) = row.reshape(row.type_name(), &spec.args);
                Some(TypeSpec { name, args })
            }
        }
    }

    /// Target column type for a fetched column; unknown types are kept as declared.
    pub fn translate_column_type(
        &self,
        column: &TableColumn,
        source: DatabaseType,
        target: DatabaseType,
    ) -> String {
        let shape = self
            .resolve(source, &column.data_type)
            .and_then(|m| m.row(source))
            .map(|r| r.shape)
            .unwrap_or(ArgumentShape::None);
        let spec = TypeSpec::from_column(column, shape);
        self.translate(&spec, source, target)
            .map(|t| t.to_sql())
            .unwrap_or_else(|| spec.to_sql())
    }
}
