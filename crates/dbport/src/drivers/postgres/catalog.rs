//! PostgreSQL metadata queries.

use crate::core::{DatabaseObjectType, MetadataCatalog, SchemaFilter};
use crate::drivers::common::{in_names, owner_is};

/// Metadata catalog for PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PgCatalog;

const USER_SCHEMAS: &str = "NOT IN ('pg_catalog', 'information_schema')";

/// Tables are `pg_class` rows joined to their namespace as `c` / `n`.
fn table_scope(filter: &SchemaFilter) -> String {
    format!(
        "c.relkind IN ('r', 'p') AND n.nspname {} AND n.nspname NOT LIKE 'pg_toast%'{}{}",
        USER_SCHEMAS,
        owner_is("n.nspname", filter.owner.as_deref()),
        in_names("c.relname", &filter.table_names)
    )
}

fn constraint_query(contype: char, filter: &SchemaFilter) -> String {
    format!(
        "SELECT n.nspname::text AS \"Owner\", c.relname::text AS \"TableName\", \
         con.conname::text AS \"Name\", a.attname::text AS \"ColumnName\", \
         false AS \"IsDesc\", k.ord::int AS \"Order\" \
         FROM pg_constraint con \
         JOIN pg_class c ON c.oid = con.conrelid \
         JOIN pg_namespace n ON n.oid = c.relnamespace \
         CROSS JOIN LATERAL unnest(con.conkey) WITH ORDINALITY AS k(attnum, ord) \
         JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum \
         WHERE con.contype = '{}' AND {} \
         ORDER BY n.nspname, c.relname, k.ord",
        contype,
        table_scope(filter)
    )
}

fn routine_query(kind: char, names: &[String], filter: &SchemaFilter) -> String {
    format!(
        "SELECT n.nspname::text AS \"Owner\", p.proname::text AS \"Name\", \
         pg_get_functiondef(p.oid) AS \"Definition\" \
         FROM pg_proc p JOIN pg_namespace n ON n.oid = p.pronamespace \
         WHERE p.prokind = '{}' AND n.nspname {}{}{} \
         ORDER BY n.nspname, p.proname",
        kind,
        USER_SCHEMAS,
        owner_is("n.nspname", filter.owner.as_deref()),
        in_names("p.proname", names)
    )
}

impl MetadataCatalog for PgCatalog {
    fn metadata_query(&self, kind: DatabaseObjectType, filter: &SchemaFilter) -> Option<String> {
        let sql = match kind {
            DatabaseObjectType::Table => format!(
                "SELECT n.nspname::text AS \"Owner\", c.relname::text AS \"Name\", \
                 obj_description(c.oid, 'pg_class') AS \"Comment\" \
                 FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace \
                 WHERE {} ORDER BY n.nspname, c.relname",
                table_scope(filter)
            ),
            DatabaseObjectType::TableColumn => format!(
                "SELECT n.nspname::text AS \"Owner\", c.relname::text AS \"TableName\", \
                 col.column_name::text AS \"ColumnName\", \
                 (CASE WHEN col.data_type IN ('USER-DEFINED', 'ARRAY') THEN col.udt_name \
                 ELSE col.data_type END)::text AS \"DataType\", \
                 col.character_maximum_length::bigint AS \"MaxLength\", \
                 COALESCE(col.numeric_precision, col.datetime_precision)::int AS \"Precision\", \
                 col.numeric_scale::int AS \"Scale\", \
                 (col.is_nullable = 'YES') AS \"IsNullable\", \
                 (col.is_identity = 'YES' OR COALESCE(col.column_default, '') LIKE 'nextval(%') AS \"IsIdentity\", \
                 (col.is_generated = 'ALWAYS') AS \"IsComputed\", \
                 col.generation_expression::text AS \"ComputeExp\", \
                 (CASE WHEN COALESCE(col.column_default, '') LIKE 'nextval(%' THEN NULL \
                 ELSE col.column_default END)::text AS \"DefaultValue\", \
                 col_description(c.oid, col.ordinal_position::int) AS \"Comment\", \
                 col.ordinal_position::int AS \"Order\" \
                 FROM information_schema.columns col \
                 JOIN pg_namespace n ON n.nspname = col.table_schema \
                 JOIN pg_class c ON c.relnamespace = n.oid AND c.relname = col.table_name \
                 WHERE {} ORDER BY n.nspname, c.relname, col.ordinal_position",
                table_scope(filter)
            ),
            DatabaseObjectType::TablePrimaryKey => constraint_query('p', filter),
            DatabaseObjectType::TableForeignKey => format!(
                "SELECT n.nspname::text AS \"Owner\", c.relname::text AS \"TableName\", \
                 con.conname::text AS \"Name\", a.attname::text AS \"ColumnName\", \
                 rn.nspname::text AS \"ReferencedOwner\", rc.relname::text AS \"ReferencedTableName\", \
                 ra.attname::text AS \"ReferencedColumnName\", \
                 (con.confupdtype = 'c') AS \"UpdateCascade\", \
                 (con.confdeltype = 'c') AS \"DeleteCascade\", k.ord::int AS \"Order\" \
                 FROM pg_constraint con \
                 JOIN pg_class c ON c.oid = con.conrelid \
                 JOIN pg_namespace n ON n.oid = c.relnamespace \
                 JOIN pg_class rc ON rc.oid = con.confrelid \
                 JOIN pg_namespace rn ON rn.oid = rc.relnamespace \
                 CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(attnum, refnum, ord) \
                 JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum \
                 JOIN pg_attribute ra ON ra.attrelid = rc.oid AND ra.attnum = k.refnum \
                 WHERE con.contype = 'f' AND {} \
                 ORDER BY n.nspname, c.relname, con.conname, k.ord",
                table_scope(filter)
            ),
            DatabaseObjectType::TableIndex => format!(
                "SELECT n.nspname::text AS \"Owner\", c.relname::text AS \"TableName\", \
                 ic.relname::text AS \"Name\", a.attname::text AS \"ColumnName\", \
                 i.indisunique AS \"IsUnique\", \
                 (i.indoption[k.ord::int - 1] & 1 = 1) AS \"IsDesc\", k.ord::int AS \"Order\" \
                 FROM pg_index i \
                 JOIN pg_class c ON c.oid = i.indrelid \
                 JOIN pg_namespace n ON n.oid = c.relnamespace \
                 JOIN pg_class ic ON ic.oid = i.indexrelid \
                 CROSS JOIN LATERAL unnest(i.indkey) WITH ORDINALITY AS k(attnum, ord) \
                 JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum \
                 WHERE NOT i.indisprimary AND {} \
                 ORDER BY n.nspname, c.relname, ic.relname, k.ord",
                table_scope(filter)
            ),
            DatabaseObjectType::TableConstraint => format!(
                "SELECT n.nspname::text AS \"Owner\", c.relname::text AS \"TableName\", \
                 con.conname::text AS \"Name\", a.attname::text AS \"ColumnName\", \
                 pg_get_constraintdef(con.oid) AS \"Definition\" \
                 FROM pg_constraint con \
                 JOIN pg_class c ON c.oid = con.conrelid \
                 JOIN pg_namespace n ON n.oid = c.relnamespace \
                 LEFT JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = con.conkey[1] \
                 AND array_length(con.conkey, 1) = 1 \
                 WHERE con.contype = 'c' AND {} \
                 ORDER BY n.nspname, c.relname, con.conname",
                table_scope(filter)
            ),
            DatabaseObjectType::TableTrigger => format!(
                "SELECT n.nspname::text AS \"Owner\", c.relname::text AS \"TableName\", \
                 t.tgname::text AS \"Name\", pg_get_triggerdef(t.oid) AS \"Definition\" \
                 FROM pg_trigger t \
                 JOIN pg_class c ON c.oid = t.tgrelid \
                 JOIN pg_namespace n ON n.oid = c.relnamespace \
                 WHERE NOT t.tgisinternal AND n.nspname {}{}{} \
                 ORDER BY n.nspname, c.relname, t.tgname",
                USER_SCHEMAS,
                owner_is("n.nspname", filter.owner.as_deref()),
                in_names("t.tgname", &filter.trigger_names)
            ),
            DatabaseObjectType::View => format!(
                "SELECT n.nspname::text AS \"Owner\", c.relname::text AS \"Name\", \
                 pg_get_viewdef(c.oid, true) AS \"Definition\" \
                 FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace \
                 WHERE c.relkind = 'v' AND n.nspname {}{}{} \
                 ORDER BY n.nspname, c.relname",
                USER_SCHEMAS,
                owner_is("n.nspname", filter.owner.as_deref()),
                in_names("c.relname", &filter.view_names)
            ),
            DatabaseObjectType::Function => routine_query('f', &filter.function_names, filter),
            DatabaseObjectType::Procedure => routine_query('p', &filter.procedure_names, filter),
        };
        Some(sql)
    }
}
