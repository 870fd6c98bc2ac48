//! Schema script generation.
//!
//! Writes `CREATE TABLE` statements (translated column types, identity,
//! defaults, computed columns, primary keys), then foreign keys, indexes
//! and check constraints, then views, functions, procedures and triggers
//! rewritten for the target dialect. SQLite cannot add constraints to an
//! existing table, so for that target foreign keys and checks are declared
//! inline.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::core::{
    DatabaseType, Dialect, SchemaSnapshot, ScriptObject, Table, TableColumn, TableConstraint,
    TableForeignKey,
};
use crate::drivers::DialectImpl;
use crate::error::Result;
use crate::mapping::MappingTables;
use crate::transfer::target_owner;
use crate::translate::{ObjectNameMode, StatementTranslator, TranslateOptions};

/// Settings for schema generation.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Emit identity clauses for identity columns.
    pub generate_identity: bool,
    pub name_mode: ObjectNameMode,
    /// Owner for every generated object; derived per object when unset.
    pub target_owner: Option<String>,
}

impl GenerateOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            generate_identity: config.options.generate_identity,
            name_mode: config.options.name_mode,
            target_owner: config.target.schema.clone(),
        }
    }
}

/// Generated DDL, one complete statement per entry.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaScript {
    pub statements: Vec<String>,
    /// Target type names introduced while rewriting definitions.
    pub data_types: BTreeSet<String>,
}

impl SchemaScript {
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// All statements separated by line breaks.
    pub fn to_script(&self) -> String {
        self.statements.join("\n")
    }
}

/// Writes a target-dialect schema script for a fetched snapshot.
pub struct SchemaScriptGenerator {
    source: DialectImpl,
    target: DialectImpl,
    options: GenerateOptions,
    tables: &'static MappingTables,
}

impl SchemaScriptGenerator {
    pub fn new(source: DatabaseType, target: DatabaseType, options: GenerateOptions) -> Result<Self> {
        Ok(Self {
            source: DialectImpl::for_type(source),
            target: DialectImpl::for_type(target),
            options,
            tables: MappingTables::global()?,
        })
    }

    pub fn generate(&self, snapshot: &SchemaSnapshot) -> SchemaScript {
        let translator = StatementTranslator::with_tables(
            self.source.database_type(),
            self.target.database_type(),
            self.tables,
        )
        .with_options(TranslateOptions {
            name_mode: self.options.name_mode,
            ..TranslateOptions::default()
        });
        let mut script = SchemaScript::default();
        let inline_constraints = self.target.database_type() == DatabaseType::Sqlite;

        for table in &snapshot.tables {
            let sql = self.create_table(snapshot, table, &translator, inline_constraints, &mut script);
            script.statements.push(self.terminate(&sql));
        }

        if !inline_constraints {
            for table in &snapshot.tables {
                for (name, keys) in group_by_name(snapshot.foreign_keys_of(table), |k| &k.name) {
                    let sql = format!(
                        "ALTER TABLE {} ADD {}",
                        self.table_name(table),
                        self.foreign_key(&name, &keys)
                    );
                    script.statements.push(self.terminate(&sql));
                }
            }
        }

        for table in &snapshot.tables {
            for (name, columns) in group_by_name(snapshot.indexes_of(table), |i| &i.name) {
                let unique = columns.first().is_some_and(|i| i.is_unique);
                let list: Vec<String> = columns
                    .iter()
                    .map(|i| {
                        let column = self.target.quote_ident(&i.column_name);
                        if i.is_desc {
                            format!("{} DESC", column)
                        } else {
                            column
                        }
                    })
                    .collect();
                let sql = format!(
                    "CREATE {}INDEX {} ON {}({})",
                    if unique { "UNIQUE " } else { "" },
                    self.target.quote_ident(&name),
                    self.table_name(table),
                    list.join(",")
                );
                script.statements.push(self.terminate(&sql));
            }

            if !inline_constraints {
                for constraint in snapshot.constraints_of(table) {
                    let sql = format!(
                        "ALTER TABLE {} ADD {}",
                        self.table_name(table),
                        self.check_constraint(constraint, &translator, &mut script)
                    );
                    script.statements.push(self.terminate(&sql));
                }
            }
        }

        for object in snapshot
            .views
            .iter()
            .chain(&snapshot.functions)
            .chain(&snapshot.procedures)
        {
            self.push_definition(object, &translator, &mut script);
        }
        for trigger in &snapshot.table_triggers {
            let translation = translator.translate(&trigger.definition);
            script.data_types.extend(translation.data_types);
            script.statements.push(self.terminate(&translation.text));
        }

        debug!(
            statements = script.statements.len(),
            target = %self.target.database_type(),
            "schema script generated"
        );
        script
    }

    fn table_name(&self, table: &Table) -> String {
        let owner = target_owner(
            &self.source,
            &self.target,
            self.options.target_owner.as_deref(),
            &table.owner,
        );
        self.target.qualify_object(&owner, &table.name)
    }

    fn create_table(
        &self,
        snapshot: &SchemaSnapshot,
        table: &Table,
        translator: &StatementTranslator<'_>,
        inline_constraints: bool,
        script: &mut SchemaScript,
    ) -> String {
        let mut items: Vec<String> = snapshot
            .columns_of(table)
            .into_iter()
            .map(|column| self.column_definition(table, column, translator, script))
            .collect();

        let keys = snapshot.primary_key_of(table);
        if let Some(first) = keys.first() {
            let columns: Vec<String> = keys
                .iter()
                .map(|k| self.target.quote_ident(&k.column_name))
                .collect();
            items.push(format!(
                "{}PRIMARY KEY ({})",
                constraint_prefix(&self.target, &first.name),
                columns.join(",")
            ));
        }

        if inline_constraints {
            for (name, keys) in group_by_name(snapshot.foreign_keys_of(table), |k| &k.name) {
                items.push(self.foreign_key(&name, &keys));
            }
            for constraint in snapshot.constraints_of(table) {
                items.push(self.check_constraint(constraint, translator, script));
            }
        }

        format!(
            "CREATE TABLE {}(\n  {}\n)",
            self.table_name(table),
            items.join(",\n  ")
        )
    }

    fn column_definition(
        &self,
        table: &Table,
        column: &TableColumn,
        translator: &StatementTranslator<'_>,
        script: &mut SchemaScript,
    ) -> String {
        let name = self.target.quote_ident(&column.name);
        let data_type = self.tables.data_types.translate_column_type(
            column,
            self.source.database_type(),
            self.target.database_type(),
        );

        if column.is_computed {
            if let Some(expression) = column.computed_expression.as_deref() {
                let translation = translator.translate(strip_outer_parens(expression));
                script.data_types.extend(translation.data_types);
                let clause = self.target.computed_clause(&translation.text);
                // SQL Server derives the type from the expression.
                return if self.target.database_type() == DatabaseType::SqlServer {
                    format!("{} {}", name, clause)
                } else {
                    format!("{} {} {}", name, data_type, clause)
                };
            }
        }

        let mut definition = format!("{} {}", name, data_type);
        if column.is_identity && self.options.generate_identity {
            if let Some(identity) = self.target.identity_clause(table, column) {
                definition.push(' ');
                definition.push_str(&identity);
            }
        }
        definition.push_str(if column.is_nullable { " NULL" } else { " NOT NULL" });
        if let Some(default) = column.default_value.as_deref().filter(|d| !d.trim().is_empty()) {
            let translation = translator.translate(strip_outer_parens(default));
            script.data_types.extend(translation.data_types);
            definition.push_str(" DEFAULT ");
            definition.push_str(&translation.text);
        }
        definition
    }

    fn foreign_key(&self, name: &str, keys: &[&TableForeignKey]) -> String {
        let Some(first) = keys.first() else {
            return String::new();
        };
        let columns: Vec<String> = keys
            .iter()
            .map(|k| self.target.quote_ident(&k.column_name))
            .collect();
        let referenced: Vec<String> = keys
            .iter()
            .map(|k| self.target.quote_ident(&k.referenced_column_name))
            .collect();
        let referenced_table = Table::new(
            first.referenced_owner.clone(),
            first.referenced_table_name.clone(),
        );

        let mut sql = format!(
            "{}FOREIGN KEY ({}) REFERENCES {}({})",
            constraint_prefix(&self.target, name),
            columns.join(","),
            self.table_name(&referenced_table),
            referenced.join(",")
        );
        // Oracle has no ON UPDATE actions.
        if first.update_cascade && self.target.database_type() != DatabaseType::Oracle {
            sql.push_str(" ON UPDATE CASCADE");
        }
        if first.delete_cascade {
            sql.push_str(" ON DELETE CASCADE");
        }
        sql
    }

    fn check_constraint(
        &self,
        constraint: &TableConstraint,
        translator: &StatementTranslator<'_>,
        script: &mut SchemaScript,
    ) -> String {
        let translation = translator.translate(constraint.definition.trim());
        script.data_types.extend(translation.data_types);
        let body = translation.text;
        let has_keyword = body
            .get(..5)
            .is_some_and(|head| head.eq_ignore_ascii_case("check"));
        if has_keyword {
            format!("{}{}", constraint_prefix(&self.target, &constraint.name), body)
        } else {
            format!(
                "{}CHECK {}",
                constraint_prefix(&self.target, &constraint.name),
                body
            )
        }
    }

    fn push_definition(
        &self,
        object: &ScriptObject,
        translator: &StatementTranslator<'_>,
        script: &mut SchemaScript,
    ) {
        if object.definition.trim().is_empty() {
            return;
        }
        let translation = translator.translate(&object.definition);
        script.data_types.extend(translation.data_types);
        script.statements.push(self.terminate(&translation.text));
    }

    fn terminate(&self, sql: &str) -> String {
        let body = sql.trim_end().trim_end_matches(';').trim_end();
        format!("{}{}", body, self.target.script_delimiter())
    }
}

fn constraint_prefix(dialect: &DialectImpl, name: &str) -> String {
    if name.trim().is_empty() {
        String::new()
    } else {
        format!("CONSTRAINT {} ", dialect.quote_ident(name))
    }
}

/// `((0))` -> `0`; leaves `(a) + (b)` alone.
fn strip_outer_parens(expression: &str) -> &str {
    let mut text = expression.trim();
    while text.starts_with('(') && text.ends_with(')') && encloses_all(text) {
        text = text[1..text.len() - 1].trim();
    }
    text
}

fn encloses_all(text: &str) -> bool {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != text.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Group records by constraint name, keeping first-seen order.
fn group_by_name<'s, T>(items: Vec<&'s T>, name: impl Fn(&T) -> &String) -> Vec<(String, Vec<&'s T>)> {
    let mut groups: Vec<(String, Vec<&'s T>)> = Vec::new();
    for item in items {
        let key = name(item);
        match groups.iter_mut().find(|(n, _)| n == key) {
            Some((_, members)) => members.push(item),
            None => groups.push((key.clone(), vec![item])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TableIndex, TablePrimaryKey};

    fn snapshot() -> SchemaSnapshot {
        let customer = Table::new("dbo", "Customer");
        let mut orders = Table::new("dbo", "Orders");
        orders.identity_seed = Some(100);
        orders.identity_increment = Some(1);

        let mut customer_id = TableColumn::new(&customer, "Id", "int", 1);
        customer_id.is_nullable = false;
        let mut name = TableColumn::new(&customer, "Name", "nvarchar", 2);
        name.max_length = Some(50);
        name.is_nullable = false;

        let mut order_id = TableColumn::new(&orders, "Id", "int", 1);
        order_id.is_nullable = false;
        order_id.is_identity = true;
        let order_customer = TableColumn::new(&orders, "CustomerId", "int", 2);
        let mut created = TableColumn::new(&orders, "Created", "datetime", 3);
        created.default_value = Some("(getdate())".into());
        let mut qty = TableColumn::new(&orders, "Qty", "int", 4);
        qty.default_value = Some("((0))".into());
        let mut doubled = TableColumn::new(&orders, "Doubled", "int", 5);
        doubled.is_computed = true;
        doubled.computed_expression = Some("([Qty]*(2))".into());

        SchemaSnapshot {
            tables: vec![customer, orders],
            table_columns: vec![customer_id, name, order_id, order_customer, created, qty, doubled],
            table_primary_keys: vec![
                TablePrimaryKey {
                    owner: "dbo".into(),
                    table_name: "Customer".into(),
                    name: "PK_Customer".into(),
                    column_name: "Id".into(),
                    is_desc: false,
                    order: 1,
                },
                TablePrimaryKey {
                    owner: "dbo".into(),
                    table_name: "Orders".into(),
                    name: "PK_Orders".into(),
                    column_name: "Id".into(),
                    is_desc: false,
                    order: 1,
                },
            ],
            table_foreign_keys: vec![TableForeignKey {
                owner: "dbo".into(),
                table_name: "Orders".into(),
                name: "FK_Orders_Customer".into(),
                column_name: "CustomerId".into(),
                referenced_owner: "dbo".into(),
                referenced_table_name: "Customer".into(),
                referenced_column_name: "Id".into(),
                update_cascade: false,
                delete_cascade: true,
                order: 1,
            }],
            table_indexes: vec![TableIndex {
                owner: "dbo".into(),
                table_name: "Orders".into(),
                name: "IX_Orders_Created".into(),
                column_name: "Created".into(),
                is_unique: false,
                is_desc: true,
                order: 1,
            }],
            table_constraints: vec![TableConstraint {
                owner: "dbo".into(),
                table_name: "Orders".into(),
                name: "CK_Orders_Qty".into(),
                column_name: Some("Qty".into()),
                definition: "([Qty]>=(0))".into(),
                order: 1,
            }],
            views: vec![ScriptObject {
                owner: "dbo".into(),
                name: "vOrders".into(),
                definition: "CREATE VIEW dbo.vOrders AS SELECT Id, ISNULL(Qty,0) AS Qty FROM dbo.Orders".into(),
                order: 1,
            }],
            ..SchemaSnapshot::default()
        }
    }

    fn generator(target: DatabaseType) -> SchemaScriptGenerator {
        SchemaScriptGenerator::new(
            DatabaseType::SqlServer,
            target,
            GenerateOptions {
                generate_identity: true,
                ..GenerateOptions::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_postgres_tables() {
        let script = generator(DatabaseType::Postgres).generate(&snapshot());
        let customer = &script.statements[0];
        assert!(customer.starts_with("CREATE TABLE \"public\".\"Customer\"("));
        assert!(customer.contains("\"Name\" varchar(50) NOT NULL"));
        assert!(customer.contains("CONSTRAINT \"PK_Customer\" PRIMARY KEY (\"Id\")"));
        assert!(customer.ends_with(");"));

        let orders = &script.statements[1];
        assert!(orders.contains(
            "\"Id\" integer GENERATED BY DEFAULT AS IDENTITY (START WITH 100 INCREMENT BY 1) NOT NULL"
        ));
        assert!(orders.contains("\"Qty\" integer NULL DEFAULT 0"));
        assert!(orders.contains("GENERATED ALWAYS AS ("));
    }

    #[test]
    fn test_constraints_follow_tables() {
        let script = generator(DatabaseType::Postgres).generate(&snapshot());
        let fk = script
            .statements
            .iter()
            .find(|s| s.contains("FOREIGN KEY"))
            .unwrap();
        assert_eq!(
            fk,
            "ALTER TABLE \"public\".\"Orders\" ADD CONSTRAINT \"FK_Orders_Customer\" \
             FOREIGN KEY (\"CustomerId\") REFERENCES \"public\".\"Customer\"(\"Id\") ON DELETE CASCADE;"
        );
        let index = script
            .statements
            .iter()
            .find(|s| s.starts_with("CREATE INDEX"))
            .unwrap();
        assert_eq!(
            index,
            "CREATE INDEX \"IX_Orders_Created\" ON \"public\".\"Orders\"(\"Created\" DESC);"
        );
        assert!(script
            .statements
            .iter()
            .any(|s| s.contains("ADD CONSTRAINT \"CK_Orders_Qty\" CHECK")));
    }

    #[test]
    fn test_views_are_translated() {
        let script = generator(DatabaseType::Postgres).generate(&snapshot());
        let view = script.statements.last().unwrap();
        assert!(view.contains("COALESCE(Qty,0)"));
        assert!(!view.contains("dbo."));
        assert!(view.ends_with(';'));
    }

    #[test]
    fn test_sqlite_inlines_constraints() {
        let script = generator(DatabaseType::Sqlite).generate(&snapshot());
        assert!(!script.statements.iter().any(|s| s.starts_with("ALTER TABLE")));
        let orders = &script.statements[1];
        assert!(orders.contains("FOREIGN KEY (\"CustomerId\") REFERENCES \"Customer\"(\"Id\")"));
        assert!(orders.contains("CONSTRAINT \"CK_Orders_Qty\" CHECK"));
    }

    #[test]
    fn test_identity_can_be_suppressed() {
        let script = SchemaScriptGenerator::new(
            DatabaseType::SqlServer,
            DatabaseType::SqlServer,
            GenerateOptions::default(),
        )
        .unwrap()
        .generate(&snapshot());
        assert!(!script.statements[1].contains("IDENTITY"));
        assert!(script.statements[1].contains("[Doubled] AS ([Qty]*(2))"));
    }

    #[test]
    fn test_strip_outer_parens() {
        assert_eq!(strip_outer_parens("((0))"), "0");
        assert_eq!(strip_outer_parens("(getdate())"), "getdate()");
        assert_eq!(strip_outer_parens("(a) + (b)"), "(a) + (b)");
    }
}
