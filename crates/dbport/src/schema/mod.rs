//! Schema fetch: runs one metadata query per requested object kind and maps
//! the aliased result columns into a [`SchemaSnapshot`].
//!
//! A failing query is reported through the run context and yields nothing
//! for that kind, unless the context asks to fail fast. Cancellation stops
//! the fetch early and returns what was fetched so far.

pub mod sort;

use tracing::{debug, warn};

use crate::core::{
    Connection, DatabaseObjectType, DatabaseType, DbObject, MetadataCatalog, Row, RunContext,
    SchemaFilter, SchemaSnapshot, ScriptObject, Table, TableColumn, TableConstraint,
    TableForeignKey, TableIndex, TablePrimaryKey, TableTrigger,
};
use crate::error::Result;
use crate::mapping::{ArgumentShape, MappingTables, TypeSpec};

pub use sort::{resort_by_definition, resort_tables};

/// Knobs for a schema fetch.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Reorder tables by foreign keys and script objects by references.
    pub sort_by_reference: bool,
    /// Fetch every table child kind whenever tables are fetched.
    pub fetch_table_all_objects: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            sort_by_reference: true,
            fetch_table_all_objects: false,
        }
    }
}

/// Fetches a schema snapshot from an open connection.
pub struct SchemaFetcher<'a> {
    ctx: &'a RunContext,
    options: FetchOptions,
}

impl<'a> SchemaFetcher<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self {
            ctx,
            options: FetchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    fn wants(&self, kind: DatabaseObjectType, filter: &SchemaFilter) -> bool {
        if filter.needs_fetch(kind) {
            return true;
        }
        self.options.fetch_table_all_objects
            && (kind.is_table_child() || kind == DatabaseObjectType::TableTrigger)
            && filter.needs_fetch(DatabaseObjectType::Table)
    }

    /// Fetch every object kind the filter asks for.
    pub async fn fetch(
        &self,
        conn: &mut dyn Connection,
        catalog: &dyn MetadataCatalog,
        filter: &SchemaFilter,
    ) -> Result<SchemaSnapshot> {
        let source = conn.database_type();
        let mut snapshot = SchemaSnapshot::default();

        for kind in DatabaseObjectType::ALL {
            if self.ctx.is_cancelled() {
                warn!("Schema fetch cancelled before {}(s)", kind.label());
                return Ok(snapshot);
            }
            if !self.wants(kind, filter) {
                continue;
            }
            let Some(sql) = catalog.metadata_query(kind, filter) else {
                debug!("{} has no {} metadata", source, kind.label());
                continue;
            };

            self.ctx.feedback(format!("Begin to get {}(s).", kind.label()));
            let rows = match conn.query(&sql).await {
                Ok(rows) => rows,
                Err(e) => {
                    if self.ctx.throw_on_error() {
                        return Err(e);
                    }
                    self.ctx
                        .feedback_error(format!("Failed to get {}(s): {}", kind.label(), e));
                    continue;
                }
            };
            let count = collect(kind, &rows, source, &mut snapshot);
            self.ctx
                .feedback(format!("Got {} {}(s).", count, kind.label()));
        }

        if self.options.sort_by_reference && !self.ctx.is_cancelled() {
            resort_tables(&mut snapshot.tables, &snapshot.table_foreign_keys);
            resort_by_definition(&mut snapshot.views);
            resort_by_definition(&mut snapshot.functions);
            resort_by_definition(&mut snapshot.procedures);
        }

        Ok(snapshot)
    }
}

/// Map `rows` into the snapshot list for `kind`; returns the row count.
fn collect(
    kind: DatabaseObjectType,
    rows: &[Row],
    source: DatabaseType,
    snapshot: &mut SchemaSnapshot,
) -> usize {
    match kind {
        DatabaseObjectType::Table => extend(&mut snapshot.tables, rows, map_table),
        DatabaseObjectType::TableColumn => {
            extend(&mut snapshot.table_columns, rows, |r| map_column(r, source))
        }
        DatabaseObjectType::TablePrimaryKey => {
            extend(&mut snapshot.table_primary_keys, rows, map_primary_key)
        }
        DatabaseObjectType::TableForeignKey => {
            extend(&mut snapshot.table_foreign_keys, rows, map_foreign_key)
        }
        DatabaseObjectType::TableIndex => extend(&mut snapshot.table_indexes, rows, map_index),
        DatabaseObjectType::TableConstraint => {
            extend(&mut snapshot.table_constraints, rows, map_constraint)
        }
        DatabaseObjectType::TableTrigger => {
            extend(&mut snapshot.table_triggers, rows, map_trigger)
        }
        DatabaseObjectType::View => extend(&mut snapshot.views, rows, map_script_object),
        DatabaseObjectType::Function => extend(&mut snapshot.functions, rows, map_script_object),
        DatabaseObjectType::Procedure => {
            extend(&mut snapshot.procedures, rows, map_script_object)
        }
    }
}

/// Append mapped rows; rows without an `Order` column are numbered 1..N.
fn extend<T: DbObject>(target: &mut Vec<T>, rows: &[Row], map: impl Fn(&Row) -> T) -> usize {
    for (i, row) in rows.iter().enumerate() {
        let mut item = map(row);
        match row.get_i64("Order") {
            Some(order) => item.set_order(order as i32),
            None => item.set_order(i as i32 + 1),
        }
        target.push(item);
    }
    rows.len()
}

fn text(row: &Row, column: &str) -> String {
    row.get_string(column).unwrap_or_default()
}

fn map_table(row: &Row) -> Table {
    Table {
        owner: text(row, "Owner"),
        name: text(row, "Name"),
        comment: row.get_string("Comment"),
        identity_seed: row.get_i64("IdentitySeed"),
        identity_increment: row.get_i64("IdentityIncrement"),
        order: 0,
    }
}

fn map_column(row: &Row, source: DatabaseType) -> TableColumn {
    let mut column = TableColumn {
        owner: text(row, "Owner"),
        table_name: text(row, "TableName"),
        name: text(row, "ColumnName"),
        data_type: text(row, "DataType"),
        max_length: row.get_i64("MaxLength"),
        precision: row.get_i64("Precision").map(|v| v as i32),
        scale: row.get_i64("Scale").map(|v| v as i32),
        is_nullable: row.get_flag("IsNullable"),
        is_identity: row.get_flag("IsIdentity"),
        is_computed: row.get_flag("IsComputed"),
        computed_expression: row.get_string("ComputeExp"),
        default_value: row.get_string("DefaultValue"),
        comment: row.get_string("Comment"),
        order: 0,
    };
    normalize_data_type(&mut column, source);
    column
}

/// Split `VARCHAR(50)`-style declared types into name and size fields.
fn normalize_data_type(column: &mut TableColumn, source: DatabaseType) {
    if !column.data_type.contains('(') {
        return;
    }
    let spec = TypeSpec::parse(&column.data_type);
    let shape = MappingTables::global()
        .ok()
        .and_then(|t| t.data_types.resolve(source, &spec.name))
        .and_then(|m| m.row(source))
        .map(|r| r.shape)
        .unwrap_or(ArgumentShape::Length);

    let first = spec.args.first().map(String::as_str);
    let second = spec.args.get(1).map(String::as_str);
    let number = |arg: Option<&str>| arg.and_then(|a| a.parse::<i32>().ok());

    match shape {
        ArgumentShape::None => {}
        ArgumentShape::Length => {
            if column.max_length.is_none() {
                column.max_length = match first {
                    Some(a) if a.eq_ignore_ascii_case("max") => Some(-1),
                    a => a.and_then(|a| a.parse::<i64>().ok()),
                };
            }
        }
        ArgumentShape::Precision => {
            column.precision = column.precision.or(number(first));
        }
        ArgumentShape::PrecisionScale => {
            column.precision = column.precision.or(number(first));
            column.scale = column.scale.or(number(second));
        }
        ArgumentShape::Scale => {
            column.scale = column.scale.or(number(first));
        }
    }
    column.data_type = spec.name;
}

fn map_primary_key(row: &Row) -> TablePrimaryKey {
    TablePrimaryKey {
        owner: text(row, "Owner"),
        table_name: text(row, "TableName"),
        name: text(row, "Name"),
        column_name: text(row, "ColumnName"),
        is_desc: row.get_flag("IsDesc"),
        order: 0,
    }
}

fn map_foreign_key(row: &Row) -> TableForeignKey {
    TableForeignKey {
        owner: text(row, "Owner"),
        table_name: text(row, "TableName"),
        name: text(row, "Name"),
        column_name: text(row, "ColumnName"),
        referenced_owner: text(row, "ReferencedOwner"),
        referenced_table_name: text(row, "ReferencedTableName"),
        referenced_column_name: text(row, "ReferencedColumnName"),
        update_cascade: row.get_flag("UpdateCascade"),
        delete_cascade: row.get_flag("DeleteCascade"),
        order: 0,
    }
}

fn map_index(row: &Row) -> TableIndex {
    TableIndex {
        owner: text(row, "Owner"),
        table_name: text(row, "TableName"),
        name: text(row, "Name"),
        column_name: text(row, "ColumnName"),
        is_unique: row.get_flag("IsUnique"),
        is_desc: row.get_flag("IsDesc"),
        order: 0,
    }
}

fn map_constraint(row: &Row) -> TableConstraint {
    TableConstraint {
        owner: text(row, "Owner"),
        table_name: text(row, "TableName"),
        name: text(row, "Name"),
        column_name: row.get_string("ColumnName"),
        definition: text(row, "Definition"),
        order: 0,
    }
}

fn map_trigger(row: &Row) -> TableTrigger {
    TableTrigger {
        owner: text(row, "Owner"),
        table_name: text(row, "TableName"),
        name: text(row, "Name"),
        definition: text(row, "Definition"),
        order: 0,
    }
}

fn map_script_object(row: &Row) -> ScriptObject {
    ScriptObject {
        owner: text(row, "Owner"),
        name: text(row, "Name"),
        definition: text(row, "Definition"),
        order: 0,
    }
}
