#![allow(dead_code)]

use std::collections::VecDeque;

use oxide_dbmap::{
    DbMap, ExecResult, Fields, HookResult, Hooks, Record, Rows, SqlExecutor, SqlValue,
    SqliteDialect,
};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

#[derive(Debug, Clone, Default, PartialEq, Record)]
#[table(name = "invoices")]
pub struct Invoice {
    #[column(primary_key, autoincrement)]
    pub id: i64,
    #[column(version)]
    pub version: i64,
    #[column(size = 120)]
    pub memo: String,
    pub person_id: i64,
    pub is_paid: bool,
}

impl Invoice {
    pub fn new(memo: &str, person_id: i64) -> Self {
        Self {
            memo: memo.to_string(),
            person_id,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Fields)]
pub struct Names {
    pub first_name: String,
    #[column(name = "surname")]
    pub last_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Record)]
#[table(name = "people")]
pub struct Person {
    #[column(primary_key, autoincrement)]
    pub id: i64,
    #[column(embed)]
    pub names: Names,
    #[column(version)]
    pub version: i64,
}

#[derive(Debug, Clone, Default, Record)]
#[table(name = "audited", hooks)]
pub struct Audited {
    #[column(primary_key, autoincrement)]
    pub id: i64,
    pub label: String,
    pub touched: i64,
    #[column(skip)]
    pub calls: Vec<&'static str>,
}

impl Hooks for Audited {
    fn before_insert(&mut self) -> HookResult {
        self.calls.push("before_insert");
        if self.label == "reject" {
            return Err("label rejected".into());
        }
        Ok(())
    }

    fn after_insert(&mut self) -> HookResult {
        self.calls.push("after_insert");
        Ok(())
    }

    fn before_update(&mut self) -> HookResult {
        self.calls.push("before_update");
        self.touched += 1;
        Ok(())
    }

    fn after_update(&mut self) -> HookResult {
        self.calls.push("after_update");
        Ok(())
    }

    fn before_delete(&mut self) -> HookResult {
        self.calls.push("before_delete");
        Ok(())
    }

    fn after_delete(&mut self) -> HookResult {
        self.calls.push("after_delete");
        Ok(())
    }

    fn after_select(&mut self) -> HookResult {
        self.calls.push("after_select");
        Ok(())
    }
}

/// Routes mapper logs to the test harness; set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn pool() -> SqlitePool {
    init_tracing();
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

pub fn mapper() -> DbMap {
    let mut map = DbMap::new(SqliteDialect::new());
    map.add_table::<Invoice>().unwrap();
    map.add_table::<Person>().unwrap();
    map.add_table::<Audited>().unwrap();
    map
}

/// A mapper with every test table created in a fresh database.
pub async fn setup() -> (DbMap, SqlitePool) {
    let map = mapper();
    let mut pool = pool().await;
    map.create_tables(&mut pool).await.unwrap();
    (map, pool)
}

/// Records every statement and answers queries from a queue of result sets.
///
/// Stands in for servers that have no driver here.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    pub statements: Vec<(String, Vec<SqlValue>)>,
    results: VecDeque<Rows>,
}

impl ScriptedExecutor {
    /// Queues one single-cell result set per value, answered in order.
    pub fn answering(values: impl IntoIterator<Item = SqlValue>) -> Self {
        let results = values
            .into_iter()
            .map(|value| Rows {
                columns: vec!["id".to_string()],
                rows: vec![vec![value]],
            })
            .collect();
        Self {
            statements: Vec::new(),
            results,
        }
    }

    pub fn sql(&self) -> Vec<&str> {
        self.statements.iter().map(|(sql, _)| sql.as_str()).collect()
    }
}

impl SqlExecutor for ScriptedExecutor {
    async fn exec(&mut self, sql: &str, args: &[SqlValue]) -> oxide_dbmap::Result<ExecResult> {
        self.statements.push((sql.to_string(), args.to_vec()));
        Ok(ExecResult {
            rows_affected: 1,
            last_insert_id: None,
        })
    }

    async fn query(&mut self, sql: &str, args: &[SqlValue]) -> oxide_dbmap::Result<Rows> {
        self.statements.push((sql.to_string(), args.to_vec()));
        Ok(self.results.pop_front().unwrap_or_default())
    }
}
