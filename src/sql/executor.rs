//! Statement execution
//!
//! One pool with a single connection per client, so every statement of a
//! script sees the session state (`USE`, temporary tables) the earlier ones
//! set up.

use super::template::{render_file, render_raw, returns_rows, split_statements, Variables};
use super::SqlCredentials;
use crate::error::{ConnectorError, Result};
use crate::table::{Cell, Table};
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::mysql::{MySqlConnection, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, ColumnIndex, Decode, Executor, Row, Statement, Type};
use std::path::Path;

#[derive(Clone)]
pub(crate) enum Backend {
    MySql(MySqlPool),
    Sqlite(SqlitePool),
}

/// Relational database client
#[derive(Clone)]
pub struct SqlClient {
    pub(crate) backend: Backend,
}

impl SqlClient {
    /// Connect to a `mysql://` (or `mariadb://`) or `sqlite:` URL
    pub async fn connect(url: &str) -> Result<Self> {
        let backend = if url.starts_with("mysql:") || url.starts_with("mariadb:") {
            let pool = MySqlPoolOptions::new().max_connections(1).connect(url).await?;
            Backend::MySql(pool)
        } else if url.starts_with("sqlite:") {
            let pool = SqlitePoolOptions::new().max_connections(1).connect(url).await?;
            Backend::Sqlite(pool)
        } else {
            return Err(ConnectorError::Config(
                "database URL must start with mysql:, mariadb: or sqlite:".to_string(),
            ));
        };

        Ok(Self { backend })
    }

    pub async fn from_credentials(credentials: &SqlCredentials) -> Result<Self> {
        tracing::debug!("Connecting to {}:{}", credentials.server, credentials.port);
        Self::connect(&credentials.database_url()).await
    }

    /// Connect with `{NAME}_SERVER`, `{NAME}_USERNAME`, ... from the environment
    pub async fn from_env(conn_name: &str) -> Result<Self> {
        Self::from_credentials(&SqlCredentials::from_env(conn_name)?).await
    }

    /// Run a `;`-separated script in one transaction. Returns the result of
    /// the last statement starting with `select` or `with`, or an empty
    /// table when none does.
    pub async fn execute(&self, script: &str) -> Result<Table> {
        let statements = split_statements(script);
        tracing::debug!("Executing {} statement(s)", statements.len());

        let table = match &self.backend {
            Backend::MySql(pool) => {
                let mut tx = pool.begin().await?;
                let mut last = None;
                for statement in &statements {
                    if returns_rows(statement) {
                        last = Some(mysql_table(&mut tx, statement).await?);
                    } else {
                        let done = sqlx::raw_sql(statement).execute(&mut *tx).await?;
                        tracing::debug!("{} row(s) affected", done.rows_affected());
                    }
                }
                tx.commit().await?;
                last
            }
            Backend::Sqlite(pool) => {
                let mut tx = pool.begin().await?;
                let mut last = None;
                for statement in &statements {
                    if returns_rows(statement) {
                        last = Some(sqlite_table(&mut tx, statement).await?);
                    } else {
                        let done = sqlx::raw_sql(statement).execute(&mut *tx).await?;
                        tracing::debug!("{} row(s) affected", done.rows_affected());
                    }
                }
                tx.commit().await?;
                last
            }
        };

        Ok(table.unwrap_or_default())
    }

    /// Render a template file (non-numeric values quoted) and [`execute`](Self::execute) it
    pub async fn execute_file(&self, path: &Path, variables: &Variables) -> Result<Table> {
        let script = render_file(path, variables)?;
        self.execute(&script).await
    }

    /// Render a single query with values substituted as given and fetch it
    pub async fn read_query(&self, template: &str, variables: &Variables) -> Result<Table> {
        let sql = render_raw(template, variables)?;

        let table = match &self.backend {
            Backend::MySql(pool) => {
                let mut conn = pool.acquire().await?;
                mysql_table(&mut conn, &sql).await?
            }
            Backend::Sqlite(pool) => {
                let mut conn = pool.acquire().await?;
                sqlite_table(&mut conn, &sql).await?
            }
        };

        Ok(table)
    }

    pub async fn close(&self) {
        match &self.backend {
            Backend::MySql(pool) => pool.close().await,
            Backend::Sqlite(pool) => pool.close().await,
        }
    }
}

async fn mysql_table(conn: &mut MySqlConnection, sql: &str) -> Result<Table> {
    let columns = column_names((&mut *conn).prepare(sql).await?.columns());
    let rows = sqlx::query(sql).fetch_all(&mut *conn).await?;
    Ok(rows_to_table(columns, &rows, mysql_cell))
}

async fn sqlite_table(conn: &mut SqliteConnection, sql: &str) -> Result<Table> {
    let columns = column_names((&mut *conn).prepare(sql).await?.columns());
    let rows = sqlx::query(sql).fetch_all(&mut *conn).await?;
    Ok(rows_to_table(columns, &rows, sqlite_cell))
}

/// Header from the prepared statement, so a select with no rows keeps it
fn column_names<C: Column>(columns: &[C]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}

fn rows_to_table<R: Row>(columns: Vec<String>, rows: &[R], decode: fn(&R, usize) -> Cell) -> Table {
    let mut table = Table::new(columns);
    for row in rows {
        table.push_row((0..row.len()).map(|i| decode(row, i)).collect());
    }
    table.normalize_numeric();
    table
}

/// `Some` when the column decodes as `T` (a null decodes as `Some(None)`)
fn try_cell<'r, R, T>(row: &'r R, idx: usize) -> Option<Option<T>>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<Option<T>, _>(idx).ok()
}

fn mysql_cell(row: &MySqlRow, idx: usize) -> Cell {
    if let Some(v) = try_cell::<_, i64>(row, idx) {
        return v.map_or(Cell::Null, Cell::Int);
    }
    if let Some(v) = try_cell::<_, u64>(row, idx) {
        return v.map_or(Cell::Null, |u| match i64::try_from(u) {
            Ok(i) => Cell::Int(i),
            Err(_) => Cell::Float(u as f64),
        });
    }
    if let Some(v) = try_cell::<_, f64>(row, idx) {
        return v.map_or(Cell::Null, Cell::Float);
    }
    if let Some(v) = try_cell::<_, NaiveDateTime>(row, idx) {
        return v.map_or(Cell::Null, Cell::DateTime);
    }
    if let Some(v) = try_cell::<_, NaiveDate>(row, idx) {
        return v
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map_or(Cell::Null, Cell::DateTime);
    }
    if let Some(v) = try_cell::<_, String>(row, idx) {
        return v.map_or(Cell::Null, Cell::Text);
    }
    // DECIMAL and friends arrive as text
    if let Ok(v) = row.try_get_unchecked::<Option<String>, _>(idx) {
        return v.map_or(Cell::Null, |s| Cell::infer(&s));
    }
    try_cell::<_, Vec<u8>>(row, idx)
        .flatten()
        .map_or(Cell::Null, |b| Cell::Text(String::from_utf8_lossy(&b).into_owned()))
}

fn sqlite_cell(row: &SqliteRow, idx: usize) -> Cell {
    if let Some(v) = try_cell::<_, i64>(row, idx) {
        return v.map_or(Cell::Null, Cell::Int);
    }
    if let Some(v) = try_cell::<_, f64>(row, idx) {
        return v.map_or(Cell::Null, Cell::Float);
    }
    if let Some(v) = try_cell::<_, NaiveDateTime>(row, idx) {
        return v.map_or(Cell::Null, Cell::DateTime);
    }
    if let Some(v) = try_cell::<_, String>(row, idx) {
        return v.map_or(Cell::Null, Cell::Text);
    }
    try_cell::<_, Vec<u8>>(row, idx)
        .flatten()
        .map_or(Cell::Null, |b| Cell::Text(String::from_utf8_lossy(&b).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory() -> SqlClient {
        SqlClient::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_script_returns_last_select() {
        let client = memory().await;
        let table = client
            .execute(
                "CREATE TABLE t (id INTEGER, name TEXT);
                 INSERT INTO t VALUES (1, 'a'), (2, 'b');
                 SELECT COUNT(*) AS n FROM t;
                 SELECT id, name FROM t ORDER BY id;",
            )
            .await
            .unwrap();

        assert_eq!(table.columns(), ["id", "name"]);
        assert_eq!(table.rows()[1], vec![Cell::Int(2), Cell::Text("b".into())]);
    }

    #[tokio::test]
    async fn test_script_without_select() {
        let client = memory().await;
        let table = client.execute("CREATE TABLE t (x INTEGER);").await.unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_empty_select_keeps_header() {
        let client = memory().await;
        let table = client
            .execute("CREATE TABLE t (a INTEGER, b TEXT); SELECT a, b FROM t WHERE 1 = 0")
            .await
            .unwrap();

        assert_eq!(table.columns(), ["a", "b"]);
        assert_eq!(table.num_rows(), 0);

        let mut out = Vec::new();
        table.write_csv(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a,b\n");
    }

    #[tokio::test]
    async fn test_read_query_empty_result_keeps_header() {
        let client = memory().await;
        client.execute("CREATE TABLE t (id INTEGER, name TEXT)").await.unwrap();

        let table = client
            .read_query("SELECT id, name FROM t", &Variables::new())
            .await
            .unwrap();
        assert_eq!(table.columns(), ["id", "name"]);
    }

    #[tokio::test]
    async fn test_failed_script_rolls_back() {
        let client = memory().await;
        client.execute("CREATE TABLE t (x INTEGER)").await.unwrap();

        let result = client
            .execute("INSERT INTO t VALUES (1); INSERT INTO missing VALUES (2)")
            .await;
        assert!(matches!(result, Err(ConnectorError::Sql(_))));

        let table = client.execute("SELECT COUNT(*) AS n FROM t").await.unwrap();
        assert_eq!(table.rows()[0][0], Cell::Int(0));
    }

    #[tokio::test]
    async fn test_read_query_raw_substitution() {
        let client = memory().await;
        let vars: Variables = [("value".to_string(), "2.5".to_string())].into_iter().collect();
        let table = client.read_query("SELECT {{ value }} AS v", &vars).await.unwrap();
        assert_eq!(table.rows()[0][0], Cell::Float(2.5));
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        assert!(matches!(
            SqlClient::connect("postgres://localhost/db").await,
            Err(ConnectorError::Config(_))
        ));
    }
}
