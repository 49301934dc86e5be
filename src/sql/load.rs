//! Bulk load of a [`Table`] into a database table

use super::executor::{Backend, SqlClient};
use crate::error::{ConnectorError, Result};
use crate::table::{Cell, ColumnKind, Table};
use chrono::{NaiveDateTime, Utc};
use sqlx::query_builder::Separated;
use sqlx::{Database, Encode, MySql, QueryBuilder, Sqlite, Type};
use std::collections::HashMap;

/// Rows per INSERT statement, before the bind limit is applied
pub const CHUNK_ROWS: usize = 30_000;

/// Bound parameters per INSERT statement; stays under both MySQL's and
/// SQLite's placeholder limits
const MAX_BINDS: usize = 30_000;

/// Column appended with the load time when requested
pub const UPDATED_TIME_COLUMN: &str = "updated_time_utc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadMode {
    /// Drop and recreate the table
    #[default]
    Replace,
    /// Create the table if missing, then insert
    Append,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub mode: LoadMode,
    pub add_updated_time: bool,
    /// SQL column types by column name, taking precedence over inference
    pub type_overrides: HashMap<String, String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            mode: LoadMode::Replace,
            add_updated_time: true,
            type_overrides: HashMap::new(),
        }
    }
}

/// `schema.table` destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableTarget {
    pub schema: Option<String>,
    pub table: String,
}

impl TableTarget {
    pub fn new(schema: Option<&str>, table: &str) -> Self {
        Self {
            schema: schema.filter(|s| !s.is_empty()).map(str::to_string),
            table: table.to_string(),
        }
    }

    fn quoted(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.table)),
            None => quote_ident(&self.table),
        }
    }
}

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// SQL type for an inferred column kind
pub fn sql_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Text | ColumnKind::Empty => "VARCHAR(255)",
        ColumnKind::DateTime => "DATETIME",
        ColumnKind::Float => "DECIMAL(20,6)",
        ColumnKind::Integer => "INT",
        ColumnKind::Boolean => "BOOLEAN",
    }
}

/// DDL run before the inserts
fn table_ddl(table: &Table, target: &TableTarget, options: &LoadOptions) -> Vec<String> {
    let columns: Vec<String> = table
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let ty = options
                .type_overrides
                .get(name)
                .map(String::as_str)
                .unwrap_or_else(|| sql_type(table.column_kind(idx)));
            format!("{} {}", quote_ident(name), ty)
        })
        .collect();
    let columns = columns.join(", ");

    match options.mode {
        LoadMode::Replace => vec![
            format!("DROP TABLE IF EXISTS {}", target.quoted()),
            format!("CREATE TABLE {} ({})", target.quoted(), columns),
        ],
        LoadMode::Append => vec![format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            target.quoted(),
            columns
        )],
    }
}

fn insert_prefix(table: &Table, target: &TableTarget) -> String {
    let columns: Vec<String> = table.columns().iter().map(|c| quote_ident(c)).collect();
    format!("INSERT INTO {} ({}) ", target.quoted(), columns.join(", "))
}

fn chunk_rows(columns: usize) -> usize {
    (MAX_BINDS / columns.max(1)).clamp(1, CHUNK_ROWS)
}

fn push_cell<'args, DB>(row: &mut Separated<'_, 'args, DB, &'static str>, cell: &Cell)
where
    DB: Database,
    i64: Encode<'args, DB> + Type<DB>,
    f64: Encode<'args, DB> + Type<DB>,
    bool: Encode<'args, DB> + Type<DB>,
    String: Encode<'args, DB> + Type<DB>,
    NaiveDateTime: Encode<'args, DB> + Type<DB>,
    Option<String>: Encode<'args, DB> + Type<DB>,
{
    match cell {
        Cell::Null => row.push_bind(None::<String>),
        Cell::Bool(b) => row.push_bind(*b),
        Cell::Int(i) => row.push_bind(*i),
        Cell::Float(f) => row.push_bind(*f),
        Cell::Text(s) => row.push_bind(s.clone()),
        Cell::DateTime(dt) => row.push_bind(*dt),
    };
}

impl SqlClient {
    /// Create (or extend) `target` and insert every row of `table`.
    /// Returns the number of rows inserted.
    pub async fn load_data(
        &self,
        table: &Table,
        target: &TableTarget,
        options: &LoadOptions,
    ) -> Result<u64> {
        if table.num_columns() == 0 {
            return Err(ConnectorError::missing("a table with at least one column"));
        }

        let mut table = table.clone();
        if options.add_updated_time {
            table.set_constant_column(UPDATED_TIME_COLUMN, Cell::DateTime(Utc::now().naive_utc()));
        }

        let ddl = table_ddl(&table, target, options);
        let prefix = insert_prefix(&table, target);
        let chunk = chunk_rows(table.num_columns());
        let mut inserted = 0u64;

        match &self.backend {
            Backend::MySql(pool) => {
                let mut tx = pool.begin().await?;
                for statement in &ddl {
                    sqlx::raw_sql(statement).execute(&mut *tx).await?;
                }
                for rows in table.rows().chunks(chunk) {
                    let mut builder = QueryBuilder::<MySql>::new(prefix.as_str());
                    builder.push_values(rows, |mut b, row| {
                        for cell in row {
                            push_cell(&mut b, cell);
                        }
                    });
                    inserted += builder.build().execute(&mut *tx).await?.rows_affected();
                }
                tx.commit().await?;
            }
            Backend::Sqlite(pool) => {
                let mut tx = pool.begin().await?;
                for statement in &ddl {
                    sqlx::raw_sql(statement).execute(&mut *tx).await?;
                }
                for rows in table.rows().chunks(chunk) {
                    let mut builder = QueryBuilder::<Sqlite>::new(prefix.as_str());
                    builder.push_values(rows, |mut b, row| {
                        for cell in row {
                            push_cell(&mut b, cell);
                        }
                    });
                    inserted += builder.build().execute(&mut *tx).await?.rows_affected();
                }
                tx.commit().await?;
            }
        }

        tracing::info!("Loaded {} row(s) into {}", inserted, target.quoted());
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let mut table = Table::new(["name", "qty", "price"]);
        table.push_row(vec![Cell::Text("a".into()), Cell::Int(1), Cell::Float(1.5)]);
        table.push_row(vec![Cell::Text("b".into()), Cell::Int(2), Cell::Null]);
        table
    }

    #[test]
    fn test_ddl_types_and_overrides() {
        let mut options = LoadOptions {
            add_updated_time: false,
            ..Default::default()
        };
        options
            .type_overrides
            .insert("name".to_string(), "VARCHAR(20)".to_string());

        let ddl = table_ddl(&sample(), &TableTarget::new(Some("sales"), "orders"), &options);
        assert_eq!(ddl[0], "DROP TABLE IF EXISTS `sales`.`orders`");
        assert_eq!(
            ddl[1],
            "CREATE TABLE `sales`.`orders` (`name` VARCHAR(20), `qty` INT, `price` DECIMAL(20,6))"
        );
    }

    #[test]
    fn test_append_ddl() {
        let options = LoadOptions {
            mode: LoadMode::Append,
            ..Default::default()
        };
        let ddl = table_ddl(&sample(), &TableTarget::new(None, "orders"), &options);
        assert_eq!(ddl.len(), 1);
        assert!(ddl[0].starts_with("CREATE TABLE IF NOT EXISTS `orders`"));
    }

    #[test]
    fn test_chunk_rows_respects_bind_limit() {
        assert_eq!(chunk_rows(1), 30_000);
        assert_eq!(chunk_rows(3), 10_000);
        assert_eq!(chunk_rows(100_000), 1);
    }

    #[tokio::test]
    async fn test_load_into_sqlite() {
        let client = SqlClient::connect("sqlite::memory:").await.unwrap();
        let target = TableTarget::new(None, "orders");

        let inserted = client
            .load_data(&sample(), &target, &LoadOptions::default())
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        let append = LoadOptions {
            mode: LoadMode::Append,
            ..Default::default()
        };
        client.load_data(&sample(), &target, &append).await.unwrap();

        let table = client
            .execute("SELECT name, qty, updated_time_utc FROM orders ORDER BY name, qty")
            .await
            .unwrap();
        assert_eq!(table.num_rows(), 4);
        assert_eq!(table.rows()[0][0], Cell::Text("a".into()));
        assert!(matches!(table.rows()[0][2], Cell::DateTime(_)));
    }

    #[tokio::test]
    async fn test_replace_drops_previous_rows() {
        let client = SqlClient::connect("sqlite::memory:").await.unwrap();
        let target = TableTarget::new(None, "orders");
        let options = LoadOptions::default();

        client.load_data(&sample(), &target, &options).await.unwrap();
        client.load_data(&sample(), &target, &options).await.unwrap();

        let table = client.execute("SELECT COUNT(*) AS n FROM orders").await.unwrap();
        assert_eq!(table.rows()[0][0], Cell::Int(2));
    }
}
