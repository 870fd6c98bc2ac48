//! Schema snapshot types: tables, columns, keys, indexes, constraints,
//! triggers and script-bearing objects (views, functions, procedures).
//!
//! Table children are stored flat, one record per (object, column) pair, the
//! way database catalogs report them. [`SchemaSnapshot`] offers per-table
//! views over those flat lists.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kinds of database objects a fetch can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseObjectType {
    Table,
    TableColumn,
    TablePrimaryKey,
    TableForeignKey,
    TableIndex,
    TableConstraint,
    TableTrigger,
    View,
    Function,
    Procedure,
}

impl DatabaseObjectType {
    /// Every kind, in fetch order.
    pub const ALL: [DatabaseObjectType; 10] = [
        DatabaseObjectType::Table,
        DatabaseObjectType::TableColumn,
        DatabaseObjectType::TablePrimaryKey,
        DatabaseObjectType::TableForeignKey,
        DatabaseObjectType::TableIndex,
        DatabaseObjectType::TableConstraint,
        DatabaseObjectType::TableTrigger,
        DatabaseObjectType::View,
        DatabaseObjectType::Function,
        DatabaseObjectType::Procedure,
    ];

    /// Kinds that only exist as children of a table and follow the table name filter.
    pub fn is_table_child(self) -> bool {
        matches!(
            self,
            DatabaseObjectType::TableColumn
                | DatabaseObjectType::TablePrimaryKey
                | DatabaseObjectType::TableForeignKey
                | DatabaseObjectType::TableIndex
                | DatabaseObjectType::TableConstraint
        )
    }

    /// Human label used in feedback messages ("Got 3 table column(s).").
    pub fn label(self) -> &'static str {
        match self {
            DatabaseObjectType::Table => "table",
            DatabaseObjectType::TableColumn => "table column",
            DatabaseObjectType::TablePrimaryKey => "table primary key",
            DatabaseObjectType::TableForeignKey => "table foreign key",
            DatabaseObjectType::TableIndex => "table index",
            DatabaseObjectType::TableConstraint => "table constraint",
            DatabaseObjectType::TableTrigger => "table trigger",
            DatabaseObjectType::View => "view",
            DatabaseObjectType::Function => "function",
            DatabaseObjectType::Procedure => "procedure",
        }
    }
}

impl fmt::Display for DatabaseObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which objects a schema fetch should retrieve.
///
/// For every kind: in strict mode an object kind is fetched only when it is
/// both requested in `object_types` and has explicit names; otherwise either
/// condition is enough.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFilter {
    /// Requested kinds. Empty means "nothing requested by kind".
    #[serde(default)]
    pub object_types: Vec<DatabaseObjectType>,

    /// Restrict to one owner/schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(default)]
    pub table_names: Vec<String>,

    #[serde(default)]
    pub view_names: Vec<String>,

    #[serde(default)]
    pub function_names: Vec<String>,

    #[serde(default)]
    pub procedure_names: Vec<String>,

    #[serde(default)]
    pub trigger_names: Vec<String>,

    /// Require both a kind flag and explicit names.
    #[serde(default)]
    pub strict: bool,
}

impl SchemaFilter {
    /// A filter that asks for every object kind.
    pub fn all() -> Self {
        Self {
            object_types: DatabaseObjectType::ALL.to_vec(),
            ..Self::default()
        }
    }

    /// A filter that asks for the named tables (and their children) only.
    pub fn tables<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table_names: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Explicit names for a kind; table children share the table list.
    pub fn names_for(&self, kind: DatabaseObjectType) -> &[String] {
        match kind {
            DatabaseObjectType::Table => &self.table_names,
            k if k.is_table_child() => &self.table_names,
            DatabaseObjectType::TableTrigger => &self.trigger_names,
            DatabaseObjectType::View => &self.view_names,
            DatabaseObjectType::Function => &self.function_names,
            DatabaseObjectType::Procedure => &self.procedure_names,
            _ => &[],
        }
    }

    fn has_flag(&self, kind: DatabaseObjectType) -> bool {
        self.object_types.contains(&kind)
            || (kind.is_table_child() && self.object_types.contains(&DatabaseObjectType::Table))
    }

    /// Decide whether `kind` should be fetched at all.
    pub fn needs_fetch(&self, kind: DatabaseObjectType) -> bool {
        let has_names = !self.names_for(kind).is_empty();
        let has_flag = self.has_flag(kind);
        if self.strict {
            has_names && has_flag
        } else {
            has_names || has_flag
        }
    }
}

/// Common accessors for every schema record.
pub trait DbObject {
    fn owner(&self) -> &str;
    fn name(&self) -> &str;
    fn order(&self) -> i32;
    fn set_order(&mut self, order: i32);
}

/// Records carrying a script body (views, routines, triggers).
pub trait ScriptDbObject: DbObject {
    fn definition(&self) -> &str;
}

macro_rules! db_object {
    ($ty:ty) => {
        impl DbObject for $ty {
            fn owner(&self) -> &str {
                &self.owner
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn order(&self) -> i32 {
                self.order
            }

            fn set_order(&mut self, order: i32) {
                self.order = order;
            }
        }
    };
}

/// Table metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub owner: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_increment: Option<i64>,
    #[serde(default)]
    pub order: i32,
}

impl Table {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Display name used in logs and feedback (`owner.name`).
    pub fn full_name(&self) -> String {
        if self.owner.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.owner, self.name)
        }
    }
}

/// Column metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableColumn {
    pub owner: String,
    pub table_name: String,
    pub name: String,
    /// Declared type name without arguments (`nvarchar`, `decimal`).
    pub data_type: String,
    /// Character/byte length; -1 means unbounded (`max`).
    #[serde(default)]
    pub max_length: Option<i64>,
    #[serde(default)]
    pub precision: Option<i32>,
    #[serde(default)]
    pub scale: Option<i32>,
    #[serde(default = "default_true")]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_identity: bool,
    #[serde(default)]
    pub is_computed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed_expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default)]
    pub order: i32,
}

fn default_true() -> bool {
    true
}

impl TableColumn {
    pub fn new(
        table: &Table,
        name: impl Into<String>,
        data_type: impl Into<String>,
        order: i32,
    ) -> Self {
        Self {
            owner: table.owner.clone(),
            table_name: table.name.clone(),
            name: name.into(),
            data_type: data_type.into(),
            is_nullable: true,
            order,
            ..Self::default()
        }
    }

    /// Lower-cased declared type name for comparisons.
    pub fn type_name(&self) -> String {
        self.data_type.trim().to_ascii_lowercase()
    }

    pub fn belongs_to(&self, table: &Table) -> bool {
        same_table(&self.owner, &self.table_name, table)
    }
}

/// One column of a primary key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TablePrimaryKey {
    pub owner: String,
    pub table_name: String,
    pub name: String,
    pub column_name: String,
    #[serde(default)]
    pub is_desc: bool,
    #[serde(default)]
    pub order: i32,
}

/// One column of a foreign key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableForeignKey {
    pub owner: String,
    pub table_name: String,
    pub name: String,
    pub column_name: String,
    pub referenced_owner: String,
    pub referenced_table_name: String,
    pub referenced_column_name: String,
    #[serde(default)]
    pub update_cascade: bool,
    #[serde(default)]
    pub delete_cascade: bool,
    #[serde(default)]
    pub order: i32,
}

impl TableForeignKey {
    /// True when the key points back at its own table.
    pub fn is_self_reference(&self) -> bool {
        self.table_name.eq_ignore_ascii_case(&self.referenced_table_name)
            && (self.referenced_owner.is_empty()
                || self.owner.eq_ignore_ascii_case(&self.referenced_owner))
    }
}

/// One column of an index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableIndex {
    pub owner: String,
    pub table_name: String,
    pub name: String,
    pub column_name: String,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub is_desc: bool,
    #[serde(default)]
    pub order: i32,
}

/// Check constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableConstraint {
    pub owner: String,
    pub table_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
    pub definition: String,
    #[serde(default)]
    pub order: i32,
}

/// Trigger attached to a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableTrigger {
    pub owner: String,
    pub table_name: String,
    pub name: String,
    pub definition: String,
    #[serde(default)]
    pub order: i32,
}

/// View, function or stored procedure with its full `CREATE` text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptObject {
    pub owner: String,
    pub name: String,
    pub definition: String,
    #[serde(default)]
    pub order: i32,
}

db_object!(Table);
db_object!(TableColumn);
db_object!(TablePrimaryKey);
db_object!(TableForeignKey);
db_object!(TableIndex);
db_object!(TableConstraint);
db_object!(TableTrigger);
db_object!(ScriptObject);

impl ScriptDbObject for ScriptObject {
    fn definition(&self) -> &str {
        &self.definition
    }
}

impl ScriptDbObject for TableTrigger {
    fn definition(&self) -> &str {
        &self.definition
    }
}

fn same_table(owner: &str, table_name: &str, table: &Table) -> bool {
    table_name.eq_ignore_ascii_case(&table.name)
        && (owner.is_empty() || table.owner.is_empty() || owner.eq_ignore_ascii_case(&table.owner))
}

/// Everything fetched for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub tables: Vec<Table>,
    pub table_columns: Vec<TableColumn>,
    pub table_primary_keys: Vec<TablePrimaryKey>,
    pub table_foreign_keys: Vec<TableForeignKey>,
    pub table_indexes: Vec<TableIndex>,
    pub table_constraints: Vec<TableConstraint>,
    pub table_triggers: Vec<TableTrigger>,
    pub views: Vec<ScriptObject>,
    pub functions: Vec<ScriptObject>,
    pub procedures: Vec<ScriptObject>,
}

impl SchemaSnapshot {
    /// Columns of `table` in declared order.
    pub fn columns_of(&self, table: &Table) -> Vec<&TableColumn> {
        let mut columns: Vec<&TableColumn> = self
            .table_columns
            .iter()
            .filter(|c| c.belongs_to(table))
            .collect();
        columns.sort_by_key(|c| c.order);
        columns
    }

    /// Primary key columns of `table` in key order.
    pub fn primary_key_of(&self, table: &Table) -> Vec<&TablePrimaryKey> {
        let mut keys: Vec<&TablePrimaryKey> = self
            .table_primary_keys
            .iter()
            .filter(|k| same_table(&k.owner, &k.table_name, table))
            .collect();
        keys.sort_by_key(|k| k.order);
        keys
    }

    /// Foreign key columns declared on `table`.
    pub fn foreign_keys_of(&self, table: &Table) -> Vec<&TableForeignKey> {
        self.table_foreign_keys
            .iter()
            .filter(|k| same_table(&k.owner, &k.table_name, table))
            .collect()
    }

    /// First foreign key of `table` that references `table` itself.
    pub fn self_reference_of(&self, table: &Table) -> Option<&TableForeignKey> {
        self.foreign_keys_of(table)
            .into_iter()
            .find(|k| k.is_self_reference())
    }

    /// Index columns of `table`.
    pub fn indexes_of(&self, table: &Table) -> Vec<&TableIndex> {
        let mut indexes: Vec<&TableIndex> = self
            .table_indexes
            .iter()
            .filter(|i| same_table(&i.owner, &i.table_name, table))
            .collect();
        indexes.sort_by_key(|i| i.order);
        indexes
    }

    /// Check constraints of `table`.
    pub fn constraints_of(&self, table: &Table) -> Vec<&TableConstraint> {
        self.table_constraints
            .iter()
            .filter(|c| same_table(&c.owner, &c.table_name, table))
            .collect()
    }

    /// Triggers of `table`.
    pub fn triggers_of(&self, table: &Table) -> Vec<&TableTrigger> {
        self.table_triggers
            .iter()
            .filter(|t| same_table(&t.owner, &t.table_name, table))
            .collect()
    }

    /// Total number of top-level objects.
    pub fn object_count(&self) -> usize {
        self.tables.len() + self.views.len() + self.functions.len() + self.procedures.len()
    }
}
