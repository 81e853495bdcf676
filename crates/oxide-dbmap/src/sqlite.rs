//! SQLite backend built on sqlx.

use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnection, SqlitePool, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};

use crate::error::Result;
use crate::executor::{ExecResult, Rows, SqlExecutor};
use crate::value::SqlValue;

/// Binds a `SqlValue` parameter to a query.
fn bind_param<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(Option::<i64>::None),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(i) => query.bind(*i),
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Blob(b) => query.bind(b.clone()),
    }
}

fn prepare<'q>(sql: &'q str, args: &[SqlValue]) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    args.iter().fold(sqlx::query(sql), bind_param)
}

/// Decodes one cell by its storage class.
fn decode_cell(row: &SqliteRow, index: usize) -> Result<SqlValue> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let storage = raw.type_info().name().to_ascii_uppercase();
    let value = match storage.as_str() {
        "REAL" => SqlValue::Float(row.try_get_unchecked::<f64, _>(index)?),
        "TEXT" | "DATE" | "TIME" | "DATETIME" => {
            SqlValue::Text(row.try_get_unchecked::<String, _>(index)?)
        }
        "BLOB" => SqlValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        _ => SqlValue::Int(row.try_get_unchecked::<i64, _>(index)?),
    };
    Ok(value)
}

fn decode_rows(rows: &[SqliteRow]) -> Result<Rows> {
    let columns = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();
    let rows = rows
        .iter()
        .map(|row| (0..row.len()).map(|i| decode_cell(row, i)).collect::<Result<Vec<_>>>())
        .collect::<Result<Vec<_>>>()?;
    Ok(Rows { columns, rows })
}

async fn exec_on<'c, E>(executor: E, sql: &str, args: &[SqlValue]) -> Result<ExecResult>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let done = prepare(sql, args).execute(executor).await?;
    Ok(ExecResult {
        rows_affected: done.rows_affected(),
        last_insert_id: Some(done.last_insert_rowid()),
    })
}

async fn query_on<'c, E>(executor: E, sql: &str, args: &[SqlValue]) -> Result<Rows>
where
    E: sqlx::Executor<'c, Database = Sqlite>,
{
    let rows = prepare(sql, args).fetch_all(executor).await?;
    decode_rows(&rows)
}

impl SqlExecutor for SqlitePool {
    async fn exec(&mut self, sql: &str, args: &[SqlValue]) -> Result<ExecResult> {
        exec_on(&*self, sql, args).await
    }

    async fn query(&mut self, sql: &str, args: &[SqlValue]) -> Result<Rows> {
        query_on(&*self, sql, args).await
    }
}

impl SqlExecutor for SqliteConnection {
    async fn exec(&mut self, sql: &str, args: &[SqlValue]) -> Result<ExecResult> {
        exec_on(self, sql, args).await
    }

    async fn query(&mut self, sql: &str, args: &[SqlValue]) -> Result<Rows> {
        query_on(self, sql, args).await
    }
}

impl SqlExecutor for sqlx::Transaction<'_, Sqlite> {
    async fn exec(&mut self, sql: &str, args: &[SqlValue]) -> Result<ExecResult> {
        exec_on(&mut **self, sql, args).await
    }

    async fn query(&mut self, sql: &str, args: &[SqlValue]) -> Result<Rows> {
        query_on(&mut **self, sql, args).await
    }
}
