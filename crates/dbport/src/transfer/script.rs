//! Batched INSERT statements for one page of rows.

use crate::core::identifier::parameter_safe;
use crate::core::{Dialect, Parameter, RenderMode, Row, SqlValue, TableColumn};
use crate::drivers::DialectImpl;

/// One batched INSERT plus the values that travel as parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertBatch {
    /// Display name of the source table.
    pub table: String,
    pub page_number: u64,
    pub sql: String,
    pub params: Vec<Parameter>,
    pub row_count: usize,
}

/// Writes multi-row inserts in the target dialect.
#[derive(Debug, Clone, Copy)]
pub struct InsertScriptBuilder {
    target: DialectImpl,
    mode: RenderMode,
    insert_identity: bool,
}

impl InsertScriptBuilder {
    pub fn new(target: DialectImpl, mode: RenderMode) -> Self {
        Self {
            target,
            mode,
            insert_identity: true,
        }
    }

    /// Whether identity columns keep their source values.
    pub fn with_insert_identity(mut self, insert_identity: bool) -> Self {
        self.insert_identity = insert_identity;
        self
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    /// Columns written by an insert: never computed ones, identity ones
    /// only when identity insertion is on.
    pub fn insert_columns<'c>(&self, columns: &[&'c TableColumn]) -> Vec<&'c TableColumn> {
        columns
            .iter()
            .copied()
            .filter(|c| !c.is_computed && (self.insert_identity || !c.is_identity))
            .collect()
    }

    /// Build the batch for one page. `table_name` is already qualified for
    /// the target. Returns `None` for an empty page or when no column is
    /// insertable.
    pub fn build(
        &self,
        source_table: &str,
        table_name: &str,
        columns: &[&TableColumn],
        rows: &[Row],
        page_number: u64,
    ) -> Option<InsertBatch> {
        let columns = self.insert_columns(columns);
        if rows.is_empty() || columns.is_empty() {
            return None;
        }

        let column_list = columns
            .iter()
            .map(|c| self.target.quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(",");

        let prefix = self.target.batch_insert_prefix();
        let mut sql = if self.target.batch_insert_item_before(table_name, &column_list, true).is_empty() {
            format!("{} {}({})VALUES", prefix, table_name, column_list)
        } else {
            prefix.to_string()
        };

        let mut params = Vec::new();
        let last = rows.len() - 1;
        for (row_index, row) in rows.iter().enumerate() {
            let values: Vec<String> = columns
                .iter()
                .map(|column| {
                    let value = row.get(&column.name).unwrap_or(&SqlValue::Null);
                    self.render(value, column, page_number, row_index, &mut params)
                })
                .collect();
            sql.push('\n');
            sql.push_str(&self.target.batch_insert_item_before(
                table_name,
                &column_list,
                row_index == 0,
            ));
            sql.push('(');
            sql.push_str(&values.join(","));
            sql.push(')');
            sql.push_str(self.target.batch_insert_item_end(row_index == last));
        }

        Some(InsertBatch {
            table: source_table.to_string(),
            page_number,
            sql,
            params,
            row_count: rows.len(),
        })
    }

    fn render(
        &self,
        value: &SqlValue<'static>,
        column: &TableColumn,
        page_number: u64,
        row_index: usize,
        params: &mut Vec<Parameter>,
    ) -> String {
        let as_parameter = self.mode == RenderMode::Execution
            && (matches!(value, SqlValue::Bytes(_)) || self.target.needs_parameter(column, value));
        if !as_parameter {
            return self.target.render_literal(value, column);
        }
        let name = format!(
            "{}P{}_{}_{}",
            self.target.param_char(),
            page_number,
            row_index,
            parameter_safe(&column.name)
        );
        params.push(Parameter::new(name.clone(), value.clone()));
        name
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;
    use std::sync::Arc;

    use super::*;
    use crate::core::{DatabaseType, Table};

    fn columns() -> Vec<TableColumn> {
        let table = Table::new("dbo", "Item");
        let mut id = TableColumn::new(&table, "Id", "int", 1);
        id.is_identity = true;
        let name = TableColumn::new(&table, "Name", "nvarchar", 2);
        let photo = TableColumn::new(&table, "Photo", "varbinary", 3);
        let mut total = TableColumn::new(&table, "Total", "int", 4);
        total.is_computed = true;
        vec![id, name, photo, total]
    }

    fn rows() -> Vec<Row> {
        let names: Arc<[String]> = ["Id", "Name", "Photo", "Total"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        vec![
            Row::new(
                Arc::clone(&names),
                vec![
                    SqlValue::I32(1),
                    SqlValue::from("a;b"),
                    SqlValue::Bytes(Cow::Owned(vec![0xCA, 0xFE])),
                    SqlValue::I32(9),
                ],
            ),
            Row::new(
                names,
                vec![SqlValue::I32(2), SqlValue::Null, SqlValue::Null, SqlValue::I32(9)],
            ),
        ]
    }

    #[test]
    fn test_file_mode_literals() {
        let cols = columns();
        let refs: Vec<&TableColumn> = cols.iter().collect();
        let builder =
            InsertScriptBuilder::new(DialectImpl::for_type(DatabaseType::Postgres), RenderMode::File);
        let batch = builder
            .build("dbo.Item", "\"Item\"", &refs, &rows(), 1)
            .unwrap();
        assert_eq!(
            batch.sql,
            "INSERT INTO \"Item\"(\"Id\",\"Name\",\"Photo\")VALUES\n\
             (1,'a;b','\\xCAFE'::bytea),\n\
             (2,NULL,NULL);"
        );
        assert!(batch.params.is_empty());
        assert_eq!(batch.row_count, 2);
    }

    #[test]
    fn test_execution_mode_parameters() {
        let cols = columns();
        let refs: Vec<&TableColumn> = cols.iter().collect();
        let builder = InsertScriptBuilder::new(
            DialectImpl::for_type(DatabaseType::SqlServer),
            RenderMode::Execution,
        )
        .with_insert_identity(false);
        let batch = builder.build("dbo.Item", "[Item]", &refs, &rows(), 3).unwrap();
        assert_eq!(
            batch.sql,
            "INSERT INTO [Item]([Name],[Photo])VALUES\n(N'a;b',@P3_0_Photo),\n(NULL,NULL);"
        );
        assert_eq!(batch.params.len(), 1);
        assert_eq!(batch.params[0].name, "@P3_0_Photo");
    }

    #[test]
    fn test_oracle_insert_all() {
        let cols = columns();
        let refs: Vec<&TableColumn> = cols.iter().take(2).collect();
        let builder =
            InsertScriptBuilder::new(DialectImpl::for_type(DatabaseType::Oracle), RenderMode::File);
        let batch = builder
            .build("dbo.Item", "\"Item\"", &refs, &rows(), 1)
            .unwrap();
        assert_eq!(
            batch.sql,
            "INSERT ALL\n INTO \"Item\"(\"Id\",\"Name\")VALUES(1,N'a'||CHR(59)||N'b')\n\
             INTO \"Item\"(\"Id\",\"Name\") VALUES(2,NULL)\nSELECT 1 FROM DUAL;"
        );
    }

    #[test]
    fn test_empty_page_has_no_batch() {
        let cols = columns();
        let refs: Vec<&TableColumn> = cols.iter().collect();
        let builder =
            InsertScriptBuilder::new(DialectImpl::for_type(DatabaseType::Sqlite), RenderMode::File);
        assert!(builder.build("t", "\"t\"", &refs, &[], 1).is_none());
    }
}
