//! The executor contract the mapper runs statements through.

use crate::error::Result;
use crate::value::SqlValue;

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Rows changed by the statement.
    pub rows_affected: u64,
    /// Key generated by the last INSERT, when the driver reports one.
    pub last_insert_id: Option<i64>,
}

/// Decoded result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    /// Result column names. Empty when no row was returned.
    pub columns: Vec<String>,
    /// Row values in column order.
    pub rows: Vec<Vec<SqlValue>>,
}

impl Rows {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Something statements can be executed on.
///
/// Implemented for pools, connections and transactions. The mapper never
/// opens or closes connections itself.
#[allow(async_fn_in_trait)]
pub trait SqlExecutor {
    /// Executes a statement.
    async fn exec(&mut self, sql: &str, args: &[SqlValue]) -> Result<ExecResult>;

    /// Runs a query and decodes every row.
    async fn query(&mut self, sql: &str, args: &[SqlValue]) -> Result<Rows>;

    /// Runs a query and returns its first row.
    async fn query_row(&mut self, sql: &str, args: &[SqlValue]) -> Result<Option<Vec<SqlValue>>> {
        Ok(self.query(sql, args).await?.rows.into_iter().next())
    }
}
