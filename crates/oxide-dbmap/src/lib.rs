//! # oxide-dbmap
//!
//! Maps plain structs to database tables and back.
//!
//! This crate provides:
//! - `#[derive(Record)]` field descriptors in place of runtime reflection
//! - Dialects for SQLite, PostgreSQL, MySQL, SQL Server and Oracle
//! - Per-table bind plans built once and shared across tasks
//! - Insert, update, delete and get with optimistic locking on a version
//!   column
//! - Selecting into records and scalars with `:name` parameters
//! - Lifecycle hooks and transactions with savepoints
//!
//! ## Quick Start
//!
//! ```ignore
//! use oxide_dbmap::{DbMap, Record, SqliteDialect};
//! use sqlx::SqlitePool;
//!
//! #[derive(Debug, Default, Record)]
//! #[table(name = "invoices")]
//! struct Invoice {
//!     #[column(primary_key, autoincrement)]
//!     id: i64,
//!     #[column(version)]
//!     version: i64,
//!     memo: String,
//! }
//!
//! async fn example(mut pool: SqlitePool) -> oxide_dbmap::Result<()> {
//!     let mut map = DbMap::new(SqliteDialect::new());
//!     map.add_table::<Invoice>()?;
//!     map.create_tables_if_not_exists(&mut pool).await?;
//!
//!     let mut invoice = Invoice { memo: "first".into(), ..Invoice::default() };
//!     map.insert(&mut pool, &mut invoice).await?;
//!
//!     invoice.memo = "changed".into();
//!     map.update(&mut pool, &mut invoice).await?;
//!
//!     let rows: Vec<Invoice> = map
//!         .select(
//!             &mut pool,
//!             "select * from invoices where memo = :memo",
//!             [("memo", "changed".into())],
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Transactions
//!
//! ```ignore
//! let mut tx = map.begin(&pool).await?;
//! tx.insert(&mut invoice).await?;
//! tx.savepoint("before_lines").await?;
//! tx.rollback_to_savepoint("before_lines").await?;
//! tx.commit().await?;
//! ```

// Lets the derive macros' `::oxide_dbmap` paths resolve inside this crate.
extern crate self as oxide_dbmap;

mod config;
mod convert;
mod dbmap;
mod ddl;
pub mod dialect;
mod error;
mod executor;
mod hooks;
mod mutate;
mod named;
pub mod plan;
mod record;
mod scan;
pub mod schema;
mod sqlite;
mod transaction;
mod value;

pub use config::DbMapConfig;
pub use convert::{CustomScanner, TypeConverter};
pub use dbmap::DbMap;
pub use ddl::create_table_sql;
pub use dialect::{
    AutoIncrStrategy, Dialect, IndexType, MySqlDialect, OracleDialect, PostgresDialect,
    SqlServerDialect, SqliteDialect,
};
pub use error::{
    BoxError, ConversionError, DbMapError, HookError, NoFieldInTypeError, OptimisticLockError,
    Result,
};
pub use executor::{ExecResult, Rows, SqlExecutor};
pub use hooks::{HookResult, HookStage, Hooks};
pub use named::Params;
pub use plan::{BindPlan, Operation};
pub use record::{FieldAccess, FieldDef, Record};
pub use schema::{ColumnMap, IndexMap, TableMap};
pub use transaction::{Transaction, TransactionState};
pub use value::{FromSqlValue, Json, SqlType, SqlValue, ToSqlValue, ValueType};

pub use oxide_dbmap_derive::{Fields, Record};
