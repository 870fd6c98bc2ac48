//! Function mapping table.
//!
//! Maps built-in function names between dialects through a canonical
//! function identity. Aliases are parsed once from the embedded YAML.

use serde::Deserialize;

use crate::core::DatabaseType;
use crate::error::{ConvertError, Result};

/// One alias of a canonical function in one dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionAlias {
    /// `NAME(args...)`, arguments carried over verbatim.
    Call { name: String },
    /// Niladic built-in; `parens` tells whether it is written `NAME()`.
    Niladic { name: String, parens: bool },
    /// Text with `{n}` argument placeholders.
    ///
    /// `call` is set when the template is a plain call of placeholders
    /// (`INSTR({1},{0})`), which makes it usable as a source form too.
    Template {
        text: String,
        call: Option<(String, Vec<usize>)>,
    },
    /// Fixed expression (`SYS_EXTRACT_UTC(SYSTIMESTAMP)`), target-only.
    Literal { text: String },
}

impl FunctionAlias {
    fn parse(raw: &str, arity: Option<usize>) -> Self {
        let raw = raw.trim();
        if raw.contains('{') {
            return FunctionAlias::Template {
                text: raw.to_string(),
                call: parse_placeholder_call(raw),
            };
        }
        if let Some(name) = raw.strip_suffix("()") {
            if is_identifier(name) {
                return FunctionAlias::Niladic {
                    name: name.to_string(),
                    parens: true,
                };
            }
        }
        if raw.contains('(') {
            return FunctionAlias::Literal {
                text: raw.to_string(),
            };
        }
        if arity == Some(0) {
            FunctionAlias::Niladic {
                name: raw.to_string(),
                parens: false,
            }
        } else {
            FunctionAlias::Call {
                name: raw.to_string(),
            }
        }
    }

    /// Name this alias is recognized by when it appears in source text.
    pub fn source_name(&self) -> Option<&str> {
        match self {
            FunctionAlias::Call { name } | FunctionAlias::Niladic { name, .. } => Some(name),
            FunctionAlias::Template {
                call: Some((name, _)),
                ..
            } => Some(name),
            _ => None,
        }
    }

    /// True for `NAME()` forms.
    pub fn is_paren_niladic(&self) -> bool {
        matches!(self, FunctionAlias::Niladic { parens: true, .. })
    }

    /// True for niladic built-ins written without parentheses.
    pub fn is_bare_niladic(&self) -> bool {
        matches!(self, FunctionAlias::Niladic { parens: false, .. })
    }

    /// Convert arguments as written in this (source) form into canonical order.
    pub fn canonical_args(&self, args: &[String]) -> Vec<String> {
        match self {
            FunctionAlias::Template {
                call: Some((_, slots)),
                ..
            } => {
                let mut canonical = vec![String::new(); slots.iter().max().map_or(0, |m| m + 1)];
                for (position, slot) in slots.iter().enumerate() {
                    if let Some(arg) = args.get(position) {
                        canonical[*slot] = arg.clone();
                    }
                }
                canonical
            }
            _ => args.to_vec(),
        }
    }

    /// Write a call of this (target) form with canonical arguments.
    pub fn render(&self, args: &[String]) -> String {
        match self {
            FunctionAlias::Call { name } => format!("{}({})", name, args.join(",")),
            FunctionAlias::Niladic { name, parens: true } => format!("{}()", name),
            FunctionAlias::Niladic {
                name,
                parens: false,
            } => name.clone(),
            FunctionAlias::Template { text, .. } => fill_template(text, args),
            FunctionAlias::Literal { text } => text.clone(),
        }
    }
}

fn is_identifier(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn parse_placeholder_call(text: &str) -> Option<(String, Vec<usize>)> {
    let open = text.find('(')?;
    let name = text[..open].trim();
    let inner = text[open + 1..].strip_suffix(')')?;
    if !is_identifier(name) {
        return None;
    }
    let slots = inner
        .split(',')
        .map(|part| {
            part.trim()
                .strip_prefix('{')
                .and_then(|p| p.strip_suffix('}'))
                .and_then(|p| p.parse::<usize>().ok())
        })
        .collect::<Option<Vec<usize>>>()?;
    Some((name.to_string(), slots))
}

fn fill_template(text: &str, args: &[String]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => match after[..end].parse::<usize>() {
                Ok(slot) => {
                    out.push_str(args.get(slot).map(String::as_str).unwrap_or(""));
                    rest = &after[end + 1..];
                }
                Err(_) => {
                    out.push('{');
                    rest = after;
                }
            },
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[derive(Debug, Deserialize)]
struct RawFunction {
    name: String,
    #[serde(default)]
    arity: Option<usize>,
    #[serde(default)]
    sqlserver: Option<String>,
    #[serde(default)]
    mysql: Option<String>,
    #[serde(default)]
    oracle: Option<String>,
    #[serde(default)]
    postgres: Option<String>,
    #[serde(default)]
    sqlite: Option<String>,
}

impl RawFunction {
    fn aliases(&self, db: DatabaseType) -> Option<&str> {
        match db {
            DatabaseType::SqlServer => self.sqlserver.as_deref(),
            DatabaseType::MySql => self.mysql.as_deref(),
            DatabaseType::Oracle => self.oracle.as_deref(),
            DatabaseType::Postgres => self.postgres.as_deref(),
            DatabaseType::Sqlite => self.sqlite.as_deref(),
        }
    }
}

/// Split a comma-separated alias list, keeping commas inside parentheses
/// and quotes (`INSTR({1},{0})`, `TIMEZONE('utc', NOW())`).
fn split_alias_list(list: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_quote = false;
    let mut start = 0;
    for (idx, ch) in list.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            '(' | '{' if !in_quote => depth += 1,
            ')' | '}' if !in_quote => depth -= 1,
            ',' if !in_quote && depth == 0 => {
                parts.push(&list[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&list[start..]);
    parts
}

/// One canonical function and its per-dialect aliases.
#[derive(Debug, Clone)]
pub struct FunctionMapping {
    pub canonical: String,
    /// Argument count this mapping applies to; `None` matches any.
    pub arity: Option<usize>,
    aliases: Vec<(DatabaseType, Vec<FunctionAlias>)>,
}

impl FunctionMapping {
    /// Aliases in one dialect, first one being the target form.
    pub fn aliases(&self, db: DatabaseType) -> &[FunctionAlias] {
        self.aliases
            .iter()
            .find(|(d, _)| *d == db)
            .map(|(_, a)| a.as_slice())
            .unwrap_or(&[])
    }

    /// Form written when `db` is the target.
    pub fn target_alias(&self, db: DatabaseType) -> Option<&FunctionAlias> {
        self.aliases(db).first()
    }

    fn accepts(&self, arg_count: usize) -> bool {
        self.arity.map_or(true, |a| a == arg_count)
    }
}

/// A source-side function call matched against the table.
#[derive(Debug, Clone)]
pub struct ResolvedFunction<'a> {
    pub mapping: &'a FunctionMapping,
    pub alias: &'a FunctionAlias,
}

/// The whole function table.
#[derive(Debug, Clone, Default)]
pub struct FunctionMappings {
    mappings: Vec<FunctionMapping>,
}

impl FunctionMappings {
    /// Parse the YAML table.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: Vec<RawFunction> = serde_yaml::from_str(yaml)?;
        let mut mappings = Vec::with_capacity(raw.len());
        for entry in raw {
            if entry.name.trim().is_empty() {
                return Err(ConvertError::Mapping(
                    "function mapping without a name".to_string(),
                ));
            }
            let aliases = DatabaseType::ALL
                .iter()
                .filter_map(|db| {
                    entry.aliases(*db).map(|list| {
                        let parsed: Vec<FunctionAlias> = split_alias_list(list)
                            .into_iter()
                            .filter(|a| !a.trim().is_empty())
                            .map(|a| FunctionAlias::parse(a, entry.arity))
                            .collect();
                        (*db, parsed)
                    })
                })
                .filter(|(_, parsed)| !parsed.is_empty())
                .collect();
            mappings.push(FunctionMapping {
                canonical: entry.name,
                arity: entry.arity,
                aliases,
            });
        }
        Ok(Self { mappings })
    }

    /// Every canonical mapping.
    pub fn iter(&self) -> impl Iterator<Item = &FunctionMapping> {
        self.mappings.iter()
    }

    /// Find the mapping for a call of `name` with `arg_count` arguments in `db`.
    pub fn resolve(
        &self,
        db: DatabaseType,
        name: &str,
        arg_count: usize,
    ) -> Option<ResolvedFunction<'_>> {
        self.mappings.iter().find_map(|mapping| {
            if !mapping.accepts(arg_count) {
                return None;
            }
            mapping
                .aliases(db)
                .iter()
                .find(|alias| matches_name(alias, name, arg_count))
                .map(|alias| ResolvedFunction { mapping, alias })
        })
    }

    /// First mapping whose `db` aliases name `name`, ignoring argument counts.
    pub fn resolve_by_name(&self, db: DatabaseType, name: &str) -> Option<&FunctionMapping> {
        self.mappings.iter().find(|mapping| {
            mapping
                .aliases(db)
                .iter()
                .any(|alias| alias.source_name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
        })
    }

    /// True when `name()` is a niladic alias in any dialect.
    pub fn is_known_niladic(&self, name: &str) -> bool {
        self.mappings.iter().any(|mapping| {
            mapping.aliases.iter().any(|(_, aliases)| {
                aliases.iter().any(|a| {
                    a.is_paren_niladic()
                        && a.source_name().is_some_and(|n| n.eq_ignore_ascii_case(name))
                })
            })
        })
    }

    /// True when `name` is a built-in function of `db`.
    pub fn is_builtin(&self, db: DatabaseType, name: &str) -> bool {
        self.resolve_by_name(db, name).is_some()
    }

    /// True when `name` is a niladic built-in of `db` written without parentheses.
    pub fn is_bare_niladic(&self, db: DatabaseType, name: &str) -> bool {
        self.mappings.iter().any(|mapping| {
            mapping.aliases(db).iter().any(|a| {
                a.is_bare_niladic() && a.source_name().is_some_and(|n| n.eq_ignore_ascii_case(name))
            })
        })
    }

    /// Translate one call. `None` when unmapped or the target has no equivalent.
    pub fn translate_call(
        &self,
        source: DatabaseType,
        target: DatabaseType,
        name: &str,
        args: &[String],
    ) -> Option<String> {
        let resolved = self.resolve(source, name, args.len())?;
        let target_alias = resolved.mapping.target_alias(target)?;
        let canonical = resolved.alias.canonical_args(args);
        Some(target_alias.render(&canonical))
    }
}

fn matches_name(alias: &FunctionAlias, name: &str, arg_count: usize) -> bool {
    let Some(alias_name) = alias.source_name() else {
        return false;
    };
    if !alias_name.eq_ignore_ascii_case(name) {
        return false;
    }
    match alias {
        FunctionAlias::Niladic { .. } => arg_count == 0,
        FunctionAlias::Template {
            call: Some((_, slots)),
            ..
        } => slots.len() == arg_count,
        _ => true,
    }
}
