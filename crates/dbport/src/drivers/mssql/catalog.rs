//! SQL Server metadata queries over `sys.*` views.

use crate::core::{DatabaseObjectType, MetadataCatalog, SchemaFilter};
use crate::drivers::common::{in_names, owner_is};

/// Metadata catalog for SQL Server.
#[derive(Debug, Clone, Copy, Default)]
pub struct MssqlCatalog;

const TABLE_JOIN: &str = "JOIN sys.tables t ON t.object_id = {obj} \
     JOIN sys.schemas s ON s.schema_id = t.schema_id";

fn table_join(object_column: &str) -> String {
    TABLE_JOIN.replace("{obj}", object_column)
}

fn table_scope(filter: &SchemaFilter) -> String {
    format!(
        "t.is_ms_shipped = 0{}{}",
        owner_is("s.name", filter.owner.as_deref()),
        in_names("t.name", &filter.table_names)
    )
}

fn script_objects(types: &str, names: &[String], filter: &SchemaFilter) -> String {
    format!(
        "SELECT s.name AS [Owner], o.name AS [Name], \
         OBJECT_DEFINITION(o.object_id) AS [Definition] \
         FROM sys.objects o JOIN sys.schemas s ON s.schema_id = o.schema_id \
         WHERE o.type IN ({}) AND o.is_ms_shipped = 0{}{} \
         ORDER BY s.name, o.name",
        types,
        owner_is("s.name", filter.owner.as_deref()),
        in_names("o.name", names)
    )
}

impl MetadataCatalog for MssqlCatalog {
    fn metadata_query(&self, kind: DatabaseObjectType, filter: &SchemaFilter) -> Option<String> {
        let sql = match kind {
            DatabaseObjectType::Table => format!(
                "SELECT s.name AS [Owner], t.name AS [Name], \
                 CAST(ep.value AS nvarchar(4000)) AS [Comment], \
                 CAST(IDENT_SEED(QUOTENAME(s.name) + '.' + QUOTENAME(t.name)) AS bigint) AS [IdentitySeed], \
                 CAST(IDENT_INCR(QUOTENAME(s.name) + '.' + QUOTENAME(t.name)) AS bigint) AS [IdentityIncrement] \
                 FROM sys.tables t JOIN sys.schemas s ON s.schema_id = t.schema_id \
                 LEFT JOIN sys.extended_properties ep ON ep.major_id = t.object_id \
                 AND ep.minor_id = 0 AND ep.class = 1 AND ep.name = 'MS_Description' \
                 WHERE {} ORDER BY s.name, t.name",
                table_scope(filter)
            ),
            DatabaseObjectType::TableColumn => format!(
                "SELECT s.name AS [Owner], t.name AS [TableName], c.name AS [ColumnName], \
                 ty.name AS [DataType], \
                 CAST(CASE WHEN c.max_length = -1 THEN -1 \
                 WHEN ty.name IN ('nchar', 'nvarchar') THEN c.max_length / 2 \
                 ELSE c.max_length END AS bigint) AS [MaxLength], \
                 CAST(c.precision AS int) AS [Precision], CAST(c.scale AS int) AS [Scale], \
                 c.is_nullable AS [IsNullable], c.is_identity AS [IsIdentity], \
                 c.is_computed AS [IsComputed], cc.definition AS [ComputeExp], \
                 dc.definition AS [DefaultValue], CAST(ep.value AS nvarchar(4000)) AS [Comment], \
                 c.column_id AS [Order] \
                 FROM sys.columns c {} \
                 JOIN sys.types ty ON ty.user_type_id = c.user_type_id \
                 LEFT JOIN sys.computed_columns cc ON cc.object_id = c.object_id AND cc.column_id = c.column_id \
                 LEFT JOIN sys.default_constraints dc ON dc.object_id = c.default_object_id \
                 LEFT JOIN sys.extended_properties ep ON ep.major_id = c.object_id \
                 AND ep.minor_id = c.column_id AND ep.class = 1 AND ep.name = 'MS_Description' \
                 WHERE {} ORDER BY s.name, t.name, c.column_id",
                table_join("c.object_id"),
                table_scope(filter)
            ),
            DatabaseObjectType::TablePrimaryKey => format!(
                "SELECT s.name AS [Owner], t.name AS [TableName], i.name AS [Name], \
                 c.name AS [ColumnName], ic.is_descending_key AS [IsDesc], ic.key_ordinal AS [Order] \
                 FROM sys.indexes i {} \
                 JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
                 JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
                 WHERE i.is_primary_key = 1 AND {} ORDER BY s.name, t.name, ic.key_ordinal",
                table_join("i.object_id"),
                table_scope(filter)
            ),
            DatabaseObjectType::TableForeignKey => format!(
                "SELECT s.name AS [Owner], t.name AS [TableName], fk.name AS [Name], \
                 c.name AS [ColumnName], rs.name AS [ReferencedOwner], \
                 rt.name AS [ReferencedTableName], rc.name AS [ReferencedColumnName], \
                 CASE fk.update_referential_action WHEN 1 THEN 1 ELSE 0 END AS [UpdateCascade], \
                 CASE fk.delete_referential_action WHEN 1 THEN 1 ELSE 0 END AS [DeleteCascade], \
                 fkc.constraint_column_id AS [Order] \
                 FROM sys.foreign_keys fk \
                 JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id {} \
                 JOIN sys.columns c ON c.object_id = fkc.parent_object_id AND c.column_id = fkc.parent_column_id \
                 JOIN sys.tables rt ON rt.object_id = fkc.referenced_object_id \
                 JOIN sys.schemas rs ON rs.schema_id = rt.schema_id \
                 JOIN sys.columns rc ON rc.object_id = fkc.referenced_object_id \
                 AND rc.column_id = fkc.referenced_column_id \
                 WHERE {} ORDER BY s.name, t.name, fk.name, fkc.constraint_column_id",
                table_join("fkc.parent_object_id"),
                table_scope(filter)
            ),
            DatabaseObjectType::TableIndex => format!(
                "SELECT s.name AS [Owner], t.name AS [TableName], i.name AS [Name], \
                 c.name AS [ColumnName], i.is_unique AS [IsUnique], \
                 ic.is_descending_key AS [IsDesc], ic.key_ordinal AS [Order] \
                 FROM sys.indexes i {} \
                 JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
                 JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
                 WHERE i.is_primary_key = 0 AND i.type > 0 AND ic.is_included_column = 0 AND {} \
                 ORDER BY s.name, t.name, i.name, ic.key_ordinal",
                table_join("i.object_id"),
                table_scope(filter)
            ),
            DatabaseObjectType::TableConstraint => format!(
                "SELECT s.name AS [Owner], t.name AS [TableName], ck.name AS [Name], \
                 c.name AS [ColumnName], ck.definition AS [Definition] \
                 FROM sys.check_constraints ck {} \
                 LEFT JOIN sys.columns c ON c.object_id = ck.parent_object_id \
                 AND c.column_id = ck.parent_column_id \
                 WHERE {} ORDER BY s.name, t.name, ck.name",
                table_join("ck.parent_object_id"),
                table_scope(filter)
            ),
            DatabaseObjectType::TableTrigger => format!(
                "SELECT s.name AS [Owner], t.name AS [TableName], tr.name AS [Name], \
                 OBJECT_DEFINITION(tr.object_id) AS [Definition] \
                 FROM sys.triggers tr {} \
                 WHERE t.is_ms_shipped = 0{}{} ORDER BY s.name, t.name, tr.name",
                table_join("tr.parent_id"),
                owner_is("s.name", filter.owner.as_deref()),
                in_names("tr.name", &filter.trigger_names)
            ),
            DatabaseObjectType::View => script_objects("'V'", &filter.view_names, filter),
            DatabaseObjectType::Function => {
                script_objects("'FN', 'IF', 'TF'", &filter.function_names, filter)
            }
            DatabaseObjectType::Procedure => {
                script_objects("'P'", &filter.procedure_names, filter)
            }
        };
        Some(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_has_a_query() {
        let filter = SchemaFilter::all();
        for kind in DatabaseObjectType::ALL {
            let sql = MssqlCatalog.metadata_query(kind, &filter).unwrap();
            assert!(sql.starts_with("SELECT s.name AS [Owner]"), "{kind}: {sql}");
        }
    }

    #[test]
    fn test_filters_applied() {
        let mut filter = SchemaFilter::tables(["Orders"]);
        filter.owner = Some("sales".to_string());
        let sql = MssqlCatalog
            .metadata_query(DatabaseObjectType::TableColumn, &filter)
            .unwrap();
        assert!(sql.contains("AND s.name = 'sales'"));
        assert!(sql.contains("AND t.name IN ('Orders')"));
        assert!(sql.contains("c.column_id AS [Order]"));
    }

    #[test]
    fn test_script_object_types() {
        let mut filter = SchemaFilter::all();
        filter.procedure_names = vec!["usp_Load".to_string()];
        let sql = MssqlCatalog
            .metadata_query(DatabaseObjectType::Procedure, &filter)
            .unwrap();
        assert!(sql.contains("o.type IN ('P')"));
        assert!(sql.contains("AND o.name IN ('usp_Load')"));
    }
}
