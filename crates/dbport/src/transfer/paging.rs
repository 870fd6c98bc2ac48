//! Page reads from the source table.
//!
//! A table is sized first, then read page by page in primary key order
//! (all columns when there is no key). Tables with a single-column foreign
//! key onto themselves are walked from their roots instead, so parents are
//! always read before their children.

use std::borrow::Cow;
use std::collections::HashSet;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, info};

use super::TransferOptions;
use crate::config::BytesPolicy;
use crate::core::{
    Connection, Dialect, PageQuery, PagedDataSet, Row, RunContext, SchemaSnapshot, SqlValue,
    Table, TableColumn, TableForeignKey, ROW_NUMBER_COLUMN,
};
use crate::drivers::common::strip_emoji;
use crate::drivers::DialectImpl;
use crate::error::Result;

/// Receives each page as soon as it has been read, before the next page
/// query runs.
#[async_trait]
pub trait PageConsumer: Send {
    async fn consume(&mut self, page_number: u64, rows: &[Row]) -> Result<()>;
}

/// Outcome of reading one table.
#[derive(Debug, Default)]
pub struct TableRead {
    /// Row count reported by the source.
    pub total: u64,
    /// Pages and rows handed to the consumer.
    pub pages: u64,
    pub rows: u64,
    /// Skipped because the row count exceeded the threshold.
    pub skipped: bool,
    /// Reading stopped on cancellation.
    pub cancelled: bool,
    /// Rows of a self-referencing table not reachable from any root.
    pub unreachable: u64,
}

/// Select list, ordering and columns of the table being read.
struct ReadPlan<'t> {
    table: String,
    columns: Vec<&'t TableColumn>,
    select: Vec<String>,
    order_by: Vec<String>,
}

/// Parent key literals gathered from one level of a hierarchy walk.
struct KeyCollector<'k> {
    column: &'k TableColumn,
    seen: &'k mut HashSet<String>,
    keys: Vec<String>,
}

impl KeyCollector<'_> {
    fn collect(&mut self, source: &DialectImpl, rows: &[Row]) {
        for row in rows {
            let Some(value) = row.get(&self.column.name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let literal = source.render_literal(value, self.column);
            if self.seen.insert(literal.clone()) {
                self.keys.push(literal);
            }
        }
    }
}

/// Reads a table's rows in pages.
pub struct PageReader<'a> {
    ctx: &'a RunContext,
    source: DialectImpl,
    options: &'a TransferOptions,
}

impl<'a> PageReader<'a> {
    pub fn new(ctx: &'a RunContext, source: DialectImpl, options: &'a TransferOptions) -> Self {
        Self {
            ctx,
            source,
            options,
        }
    }

    /// Read every row of `table`, handing each page to `consumer`;
    /// `position` is `(index, count)` for feedback.
    pub async fn read(
        &self,
        conn: &mut dyn Connection,
        snapshot: &SchemaSnapshot,
        table: &Table,
        position: (usize, usize),
        consumer: &mut dyn PageConsumer,
    ) -> Result<TableRead> {
        let plan = self.plan(snapshot, table);
        let mut result = TableRead::default();

        result.total = self.count(conn, &plan, None).await?;
        self.ctx.feedback(format!(
            "({}/{})Table \"{}\":record count is {}.",
            position.0, position.1, table.name, result.total
        ));

        if let Some(threshold) = self.options.row_count_threshold {
            if result.total > threshold {
                self.ctx.feedback(format!(
                    "Table \"{}\" has {} record(s), more than the threshold {}; skipped.",
                    table.name, result.total, threshold
                ));
                result.skipped = true;
                return Ok(result);
            }
        }
        if result.total == 0 {
            return Ok(result);
        }

        let mut data = PagedDataSet::new();
        match self_reference(snapshot, table, &plan) {
            Some(fk) => {
                debug!(table = %plan.table, fk = %fk.name, "reading hierarchy from roots");
                let roots = format!("{} IS NULL", self.source.quote_ident(&fk.column_name));
                let mut seen = HashSet::new();
                let completed = self
                    .read_hierarchy(conn, &plan, fk, roots, &mut data, &mut seen, consumer)
                    .await?;
                result.cancelled = !completed;

                let read = data.row_count();
                if completed && read < result.total {
                    result.unreachable = result.total - read;
                    self.ctx.feedback(format!(
                        "Table \"{}\": {} record(s) are not reachable from a root row and were not read.",
                        table.name, result.unreachable
                    ));
                }
            }
            None => {
                let completed = self
                    .read_pages(conn, &plan, None, result.total, &mut data, consumer, None)
                    .await?;
                result.cancelled = !completed;
            }
        }

        result.pages = data.page_count();
        result.rows = data.row_count();
        info!(
            "Read {} row(s) of {} in {} page(s)",
            result.rows, plan.table, result.pages
        );
        Ok(result)
    }

    fn plan<'t>(&self, snapshot: &'t SchemaSnapshot, table: &Table) -> ReadPlan<'t> {
        let columns = snapshot.columns_of(table);
        let select: Vec<String> = columns
            .iter()
            .map(|c| self.source.quote_ident(&c.name))
            .collect();
        let keys = snapshot.primary_key_of(table);
        let order_by = if keys.is_empty() {
            select.clone()
        } else {
            keys.iter()
                .map(|k| self.source.quote_ident(&k.column_name))
                .collect()
        };
        ReadPlan {
            table: self.source.qualify_object(&table.owner, &table.name),
            columns,
            select,
            order_by,
        }
    }

    async fn count(
        &self,
        conn: &mut dyn Connection,
        plan: &ReadPlan<'_>,
        where_clause: Option<&str>,
    ) -> Result<u64> {
        let sql = self.source.build_count_query(&plan.table, where_clause);
        let value = conn.query_scalar(&sql).await?;
        Ok(value.and_then(|v| v.as_i64()).unwrap_or(0).max(0) as u64)
    }

    /// Read `ceil(total / batch_size)` pages; false when cancelled.
    #[allow(clippy::too_many_arguments)]
    async fn read_pages(
        &self,
        conn: &mut dyn Connection,
        plan: &ReadPlan<'_>,
        where_clause: Option<&str>,
        total: u64,
        data: &mut PagedDataSet,
        consumer: &mut dyn PageConsumer,
        mut keys: Option<&mut KeyCollector<'_>>,
    ) -> Result<bool> {
        let page_size = self.options.batch_size.max(1);
        let pages = total.div_ceil(page_size);
        for page_number in 1..=pages {
            if self.ctx.is_cancelled() {
                return Ok(false);
            }
            let sql = self.source.build_page_query(&PageQuery {
                table: &plan.table,
                columns: &plan.select,
                order_by: &plan.order_by,
                where_clause,
                page_number,
                page_size,
            });
            let rows = conn.query(&sql).await?;
            debug!(table = %plan.table, page_number, rows = rows.len(), "page read");
            if rows.is_empty() {
                break;
            }
            data.push_page(self.normalize(rows, plan));
            if let Some((number, rows)) = data.current() {
                if let Some(keys) = keys.as_mut() {
                    keys.collect(&self.source, rows);
                }
                consumer.consume(number, rows).await?;
            }
            data.clear();
        }
        Ok(true)
    }

    /// Read the rows matching `where_clause`, then their children, depth
    /// first. Only the parent key literals of a level are kept.
    #[allow(clippy::too_many_arguments)]
    fn read_hierarchy<'b>(
        &'b self,
        conn: &'b mut dyn Connection,
        plan: &'b ReadPlan<'b>,
        fk: &'b TableForeignKey,
        where_clause: String,
        data: &'b mut PagedDataSet,
        seen: &'b mut HashSet<String>,
        consumer: &'b mut dyn PageConsumer,
    ) -> BoxFuture<'b, Result<bool>> {
        async move {
            let total = self.count(&mut *conn, plan, Some(&where_clause)).await?;
            if total == 0 {
                return Ok(true);
            }

            let mut collector = plan
                .columns
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(&fk.referenced_column_name))
                .copied()
                .map(|column| KeyCollector {
                    column,
                    seen: &mut *seen,
                    keys: Vec::new(),
                });
            let completed = self
                .read_pages(
                    &mut *conn,
                    plan,
                    Some(&where_clause),
                    total,
                    &mut *data,
                    &mut *consumer,
                    collector.as_mut(),
                )
                .await?;
            let keys = collector.map(|c| c.keys).unwrap_or_default();
            if !completed {
                return Ok(false);
            }

            let fk_column = self.source.quote_ident(&fk.column_name);
            for chunk in keys.chunks(self.options.in_limit.max(1)) {
                let children = format!("{} IN ({})", fk_column, chunk.join(","));
                let completed = self
                    .read_hierarchy(
                        &mut *conn,
                        plan,
                        fk,
                        children,
                        &mut *data,
                        &mut *seen,
                        &mut *consumer,
                    )
                    .await?;
                if !completed {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        .boxed()
    }

    /// Drop the paging helper column and apply the value policies.
    fn normalize(&self, rows: Vec<Row>, plan: &ReadPlan<'_>) -> Vec<Row> {
        rows.into_iter()
            .map(|row| {
                let mut row = row.without_column(ROW_NUMBER_COLUMN);
                for column in &plan.columns {
                    let replacement = row
                        .get(&column.name)
                        .and_then(|value| self.convert(value, column));
                    if let Some(value) = replacement {
                        row.set(&column.name, value);
                    }
                }
                row
            })
            .collect()
    }

    fn convert(&self, value: &SqlValue<'static>, column: &TableColumn) -> Option<SqlValue<'static>> {
        match value {
            SqlValue::Bytes(bytes) if self.source.is_guid_column(column) => {
                match <[u8; 16]>::try_from(bytes.as_ref()) {
                    Ok(raw) => Some(SqlValue::Uuid(self.source.guid_from_bytes(raw))),
                    Err(_) if self.options.bytes_policy == BytesPolicy::Null => Some(SqlValue::Null),
                    Err(_) => None,
                }
            }
            SqlValue::Bytes(_) if self.options.bytes_policy == BytesPolicy::Null => {
                Some(SqlValue::Null)
            }
            SqlValue::Text(text) if self.options.strip_emoji => {
                Some(SqlValue::Text(Cow::Owned(strip_emoji(text))))
            }
            _ => None,
        }
    }
}

/// Single-column foreign key of `table` onto itself, when walkable.
fn self_reference<'s>(
    snapshot: &'s SchemaSnapshot,
    table: &Table,
    plan: &ReadPlan<'_>,
) -> Option<&'s TableForeignKey> {
    let fk = snapshot.self_reference_of(table)?;
    let width = snapshot
        .foreign_keys_of(table)
        .iter()
        .filter(|k| k.name == fk.name)
        .count();
    let has = |name: &str| plan.columns.iter().any(|c| c.name.eq_ignore_ascii_case(name));
    (width == 1 && has(&fk.column_name) && has(&fk.referenced_column_name)).then_some(fk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DatabaseType;

    fn options() -> TransferOptions {
        TransferOptions {
            bytes_policy: BytesPolicy::Null,
            strip_emoji: true,
            ..TransferOptions::default()
        }
    }

    #[test]
    fn test_convert_guid_bytes() {
        let ctx = RunContext::new("test");
        let opts = TransferOptions::default();
        let reader = PageReader::new(&ctx, DialectImpl::for_type(DatabaseType::SqlServer), &opts);
        let table = Table::new("dbo", "T");
        let column = TableColumn::new(&table, "RowGuid", "uniqueidentifier", 1);
        let raw: Vec<u8> = (1..=16).collect();
        let converted = reader
            .convert(&SqlValue::Bytes(Cow::Owned(raw)), &column)
            .unwrap();
        assert_eq!(
            converted,
            SqlValue::Uuid("04030201-0605-0807-090a-0b0c0d0e0f10".parse().unwrap())
        );

        let opaque = TableColumn::new(&table, "Hash", "varbinary", 2);
        assert!(reader
            .convert(&SqlValue::Bytes(Cow::Owned(vec![0; 16])), &opaque)
            .is_none());
    }

    #[test]
    fn test_convert_policies() {
        let ctx = RunContext::new("test");
        let opts = options();
        let reader = PageReader::new(&ctx, DialectImpl::for_type(DatabaseType::Postgres), &opts);
        let table = Table::new("public", "T");
        let blob = TableColumn::new(&table, "Data", "bytea", 1);
        assert_eq!(
            reader.convert(&SqlValue::Bytes(Cow::Owned(vec![1, 2])), &blob),
            Some(SqlValue::Null)
        );
        let note = TableColumn::new(&table, "Note", "text", 2);
        assert_eq!(
            reader.convert(&SqlValue::from("ok \u{1F600}".to_string()), &note),
            Some(SqlValue::from("ok ".to_string()))
        );
        assert!(reader.convert(&SqlValue::I32(1), &note).is_none());
    }
}
