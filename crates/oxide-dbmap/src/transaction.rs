//! Transactions bound to a mapper.

use std::fmt;

use sqlx::sqlite::SqlitePool;
use sqlx::Sqlite;
use tracing::{debug, warn};

use crate::dbmap::DbMap;
use crate::error::{DbMapError, Result};
use crate::executor::{ExecResult, Rows, SqlExecutor};
use crate::hooks::Hooks;
use crate::named::Params;
use crate::record::{FieldAccess, Record};
use crate::schema::ColumnMap;
use crate::value::SqlValue;

/// Lifecycle of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Open,
    Committed,
    RolledBack,
}

/// A database transaction that runs mapper operations.
///
/// Once [`commit`](Self::commit) or [`rollback`](Self::rollback) has been
/// called, whatever its outcome, every further call fails with
/// [`DbMapError::TransactionClosed`]. Dropping an open transaction rolls it
/// back.
///
/// `Transaction` implements [`SqlExecutor`], so every `DbMap` operation also
/// accepts it directly.
pub struct Transaction<'m> {
    map: &'m DbMap,
    tx: Option<sqlx::Transaction<'static, Sqlite>>,
    state: TransactionState,
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("dialect", &self.map.dialect().name())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl DbMap {
    /// Starts a transaction on a connection taken from `pool`.
    pub async fn begin(&self, pool: &SqlitePool) -> Result<Transaction<'_>> {
        let tx = pool.begin().await?;
        debug!(dialect = self.dialect().name(), "began transaction");
        Ok(Transaction {
            map: self,
            tx: Some(tx),
            state: TransactionState::Open,
        })
    }
}

impl<'m> Transaction<'m> {
    /// Returns the mapper this transaction runs against.
    #[must_use]
    pub const fn map(&self) -> &'m DbMap {
        self.map
    }

    #[must_use]
    pub const fn state(&self) -> TransactionState {
        self.state
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == TransactionState::Open
    }

    fn conn(&mut self) -> Result<&mut sqlx::Transaction<'static, Sqlite>> {
        match (self.state, self.tx.as_mut()) {
            (TransactionState::Open, Some(tx)) => Ok(tx),
            _ => Err(DbMapError::TransactionClosed),
        }
    }

    fn close(&mut self, state: TransactionState) -> Result<sqlx::Transaction<'static, Sqlite>> {
        if self.state != TransactionState::Open {
            return Err(DbMapError::TransactionClosed);
        }
        self.state = state;
        self.tx.take().ok_or(DbMapError::TransactionClosed)
    }

    /// Commits the transaction.
    pub async fn commit(&mut self) -> Result<()> {
        let tx = self.close(TransactionState::Committed)?;
        tx.commit().await.map_err(|e| {
            warn!(error = %e, "commit failed");
            DbMapError::from(e)
        })?;
        debug!("committed transaction");
        Ok(())
    }

    /// Rolls the transaction back.
    pub async fn rollback(&mut self) -> Result<()> {
        let tx = self.close(TransactionState::RolledBack)?;
        tx.rollback().await?;
        debug!("rolled back transaction");
        Ok(())
    }

    /// Creates a savepoint named `name`.
    pub async fn savepoint(&mut self, name: &str) -> Result<()> {
        let sql = self.map.dialect().savepoint_sql(name);
        self.run_control(&sql).await
    }

    /// Releases a savepoint. A no-op on dialects without release.
    pub async fn release_savepoint(&mut self, name: &str) -> Result<()> {
        self.conn()?;
        match self.map.dialect().release_savepoint_sql(name) {
            Some(sql) => self.run_control(&sql).await,
            None => Ok(()),
        }
    }

    /// Rolls back to a savepoint, keeping the transaction open.
    pub async fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        let sql = self.map.dialect().rollback_to_savepoint_sql(name);
        self.run_control(&sql).await
    }

    async fn run_control(&mut self, sql: &str) -> Result<()> {
        debug!(sql = %sql, "exec");
        SqlExecutor::exec(self.conn()?, sql, &[]).await?;
        Ok(())
    }

    pub async fn insert<T: Record>(&mut self, record: &mut T) -> Result<()> {
        self.conn()?;
        let map = self.map;
        map.insert(self, record).await
    }

    pub async fn update<T: Record>(&mut self, record: &mut T) -> Result<u64> {
        self.conn()?;
        let map = self.map;
        map.update(self, record).await
    }

    pub async fn update_columns<T, F>(&mut self, record: &mut T, filter: F) -> Result<u64>
    where
        T: Record,
        F: Fn(&ColumnMap) -> bool,
    {
        self.conn()?;
        let map = self.map;
        map.update_columns(self, record, filter).await
    }

    pub async fn delete<T: Record>(&mut self, record: &mut T) -> Result<u64> {
        self.conn()?;
        let map = self.map;
        map.delete(self, record).await
    }

    pub async fn get<T: Record>(&mut self, keys: &[SqlValue]) -> Result<Option<T>> {
        self.conn()?;
        let map = self.map;
        map.get(self, keys).await
    }

    pub async fn select<T>(&mut self, query: &str, params: impl Into<Params>) -> Result<Vec<T>>
    where
        T: FieldAccess + Hooks + Default + 'static,
    {
        self.conn()?;
        let map = self.map;
        map.select(self, query, params).await
    }

    pub async fn select_one<T>(&mut self, query: &str, params: impl Into<Params>) -> Result<T>
    where
        T: FieldAccess + Hooks + Default + 'static,
    {
        self.conn()?;
        let map = self.map;
        map.select_one(self, query, params).await
    }

    pub async fn select_int(&mut self, query: &str, params: impl Into<Params>) -> Result<i64> {
        self.conn()?;
        let map = self.map;
        map.select_int(self, query, params).await
    }

    /// Executes a statement, expanding named parameters.
    pub async fn exec(&mut self, query: &str, params: impl Into<Params>) -> Result<ExecResult> {
        self.conn()?;
        let map = self.map;
        map.exec(self, query, params).await
    }

    /// Runs a query, expanding named parameters.
    pub async fn query(&mut self, query: &str, params: impl Into<Params>) -> Result<Rows> {
        self.conn()?;
        let map = self.map;
        map.query(self, query, params).await
    }
}

impl SqlExecutor for Transaction<'_> {
    async fn exec(&mut self, sql: &str, args: &[SqlValue]) -> Result<ExecResult> {
        SqlExecutor::exec(self.conn()?, sql, args).await
    }

    async fn query(&mut self, sql: &str, args: &[SqlValue]) -> Result<Rows> {
        SqlExecutor::query(self.conn()?, sql, args).await
    }
}
