//! SQLite metadata queries.
//!
//! Everything lives in the `main` schema; table children come from the
//! pragma table-valued functions joined against `sqlite_master`.

use crate::core::{DatabaseObjectType, MetadataCatalog, SchemaFilter};
use crate::drivers::common::in_names;

/// Metadata catalog for SQLite.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteCatalog;

fn user_tables(filter: &SchemaFilter) -> String {
    format!(
        "m.type = 'table' AND m.name NOT LIKE 'sqlite_%'{}",
        in_names("m.name", &filter.table_names)
    )
}

impl MetadataCatalog for SqliteCatalog {
    fn metadata_query(&self, kind: DatabaseObjectType, filter: &SchemaFilter) -> Option<String> {
        // Only the `main` schema exists for a single database file.
        if filter.owner.as_deref().is_some_and(|o| !o.eq_ignore_ascii_case("main")) {
            return None;
        }

        let sql = match kind {
            DatabaseObjectType::Table => format!(
                "SELECT 'main' AS Owner, m.name AS Name FROM sqlite_master m \
                 WHERE {} ORDER BY m.rowid",
                user_tables(filter)
            ),
            DatabaseObjectType::TableColumn => format!(
                "SELECT 'main' AS Owner, m.name AS TableName, p.name AS ColumnName, \
                 p.type AS DataType, \
                 CASE WHEN p.\"notnull\" = 0 AND p.pk = 0 THEN 1 ELSE 0 END AS IsNullable, \
                 CASE WHEN p.pk = 1 AND upper(p.type) = 'INTEGER' \
                 AND (SELECT COUNT(1) FROM pragma_table_info(m.name) k WHERE k.pk > 0) = 1 \
                 THEN 1 ELSE 0 END AS IsIdentity, \
                 0 AS IsComputed, p.dflt_value AS DefaultValue, p.cid + 1 AS \"Order\" \
                 FROM sqlite_master m JOIN pragma_table_info(m.name) p \
                 WHERE {} ORDER BY m.rowid, p.cid",
                user_tables(filter)
            ),
            DatabaseObjectType::TablePrimaryKey => format!(
                "SELECT 'main' AS Owner, m.name AS TableName, 'PK_' || m.name AS Name, \
                 p.name AS ColumnName, 0 AS IsDesc, p.pk AS \"Order\" \
                 FROM sqlite_master m JOIN pragma_table_info(m.name) p \
                 WHERE p.pk > 0 AND {} ORDER BY m.rowid, p.pk",
                user_tables(filter)
            ),
            DatabaseObjectType::TableForeignKey => format!(
                "SELECT 'main' AS Owner, m.name AS TableName, \
                 'FK_' || m.name || '_' || f.id AS Name, f.\"from\" AS ColumnName, \
                 'main' AS ReferencedOwner, f.\"table\" AS ReferencedTableName, \
                 f.\"to\" AS ReferencedColumnName, \
                 CASE WHEN f.on_update = 'CASCADE' THEN 1 ELSE 0 END AS UpdateCascade, \
                 CASE WHEN f.on_delete = 'CASCADE' THEN 1 ELSE 0 END AS DeleteCascade, \
                 f.seq + 1 AS \"Order\" \
                 FROM sqlite_master m JOIN pragma_foreign_key_list(m.name) f \
                 WHERE {} ORDER BY m.rowid, f.id, f.seq",
                user_tables(filter)
            ),
            DatabaseObjectType::TableIndex => format!(
                "SELECT 'main' AS Owner, m.name AS TableName, il.name AS Name, \
                 ii.name AS ColumnName, il.\"unique\" AS IsUnique, 0 AS IsDesc, \
                 ii.seqno + 1 AS \"Order\" \
                 FROM sqlite_master m JOIN pragma_index_list(m.name) il \
                 JOIN pragma_index_info(il.name) ii \
                 WHERE il.origin = 'c' AND {} ORDER BY m.rowid, il.name, ii.seqno",
                user_tables(filter)
            ),
            // Check constraints are only stored inside the CREATE TABLE text.
            DatabaseObjectType::TableConstraint => return None,
            DatabaseObjectType::TableTrigger => format!(
                "SELECT 'main' AS Owner, m.tbl_name AS TableName, m.name AS Name, \
                 m.sql AS Definition FROM sqlite_master m \
                 WHERE m.type = 'trigger'{} ORDER BY m.rowid",
                in_names("m.name", &filter.trigger_names)
            ),
            DatabaseObjectType::View => format!(
                "SELECT 'main' AS Owner, m.name AS Name, m.sql AS Definition \
                 FROM sqlite_master m WHERE m.type = 'view'{} ORDER BY m.rowid",
                in_names("m.name", &filter.view_names)
            ),
            DatabaseObjectType::Function | DatabaseObjectType::Procedure => return None,
        };
        Some(sql)
    }
}
