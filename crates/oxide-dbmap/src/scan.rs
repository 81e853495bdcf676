//! Selecting into records and scalars.
//!
//! Result columns are matched to fields by column name, ignoring case.
//! Fields of embedded structs take part as if declared on the outer type.
//! Columns without a matching field are skipped; [`DbMap::select_into`]
//! reports them as a non-fatal [`NoFieldInTypeError`] after filling the
//! destination.

use tracing::debug;

use crate::convert::CustomScanner;
use crate::dbmap::DbMap;
use crate::error::{DbMapError, NoFieldInTypeError, Result};
use crate::executor::{Rows, SqlExecutor};
use crate::hooks::{self, HookStage, Hooks};
use crate::named::Params;
use crate::record::FieldAccess;
use crate::schema::ColumnMap;
use crate::value::{FromSqlValue, SqlValue, ValueType};

/// Destination field of one result column.
struct Target {
    field: &'static str,
    scanner: Option<CustomScanner>,
}

fn single_column(rows: &Rows) -> Result<()> {
    if rows.columns.len() > 1 {
        return Err(DbMapError::Scan(format!(
            "expected a single column, query returned {}",
            rows.columns.len()
        )));
    }
    Ok(())
}

impl DbMap {
    /// Runs a query and returns one record per row.
    ///
    /// Result columns without a matching field are ignored; use
    /// [`select_into`](Self::select_into) to have them reported.
    pub async fn select<T, E>(
        &self,
        exec: &mut E,
        query: &str,
        params: impl Into<Params>,
    ) -> Result<Vec<T>>
    where
        T: FieldAccess + Hooks + Default + 'static,
        E: SqlExecutor + ?Sized,
    {
        let mut records = Vec::new();
        match self.select_into(exec, &mut records, query, params).await {
            Ok(()) => Ok(records),
            Err(DbMapError::NoFieldInType(missing)) => {
                debug!(error = %missing, "ignored unmatched columns");
                Ok(records)
            }
            Err(e) => Err(e),
        }
    }

    /// Runs a query and appends one record per row to `dest`.
    ///
    /// When some result columns have no field in `T`, every row is still
    /// appended and the call returns [`DbMapError::NoFieldInType`], for which
    /// [`DbMapError::is_non_fatal`] is true.
    pub async fn select_into<T, E>(
        &self,
        exec: &mut E,
        dest: &mut Vec<T>,
        query: &str,
        params: impl Into<Params>,
    ) -> Result<()>
    where
        T: FieldAccess + Hooks + Default + 'static,
        E: SqlExecutor + ?Sized,
    {
        let rows = self.query(exec, query, params).await?;
        let (targets, missing) = self.column_targets::<T>(&rows.columns);

        dest.reserve(rows.rows.len());
        for row in rows.rows {
            let mut record = T::default();
            for (target, value) in targets.iter().zip(row) {
                let Some(target) = target else { continue };
                let value = match &target.scanner {
                    Some(scanner) => {
                        scanner
                            .bind(value)
                            .map_err(|source| DbMapError::TypeConverter {
                                field: target.field.to_string(),
                                source,
                            })?
                    }
                    None => value,
                };
                record
                    .set_field(target.field, value)
                    .map_err(|e| DbMapError::conversion(target.field, e))?;
            }
            hooks::run(HookStage::AfterSelect, &mut record, |_| {
                std::any::type_name::<T>().to_string()
            })?;
            dest.push(record);
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(NoFieldInTypeError {
                type_name: std::any::type_name::<T>(),
                missing_columns: missing,
            }
            .into())
        }
    }

    /// Runs a query that must return exactly one row.
    ///
    /// Fails with [`DbMapError::NoRows`] on an empty result and with
    /// [`DbMapError::MultipleRows`] when more than one row comes back.
    pub async fn select_one<T, E>(
        &self,
        exec: &mut E,
        query: &str,
        params: impl Into<Params>,
    ) -> Result<T>
    where
        T: FieldAccess + Hooks + Default + 'static,
        E: SqlExecutor + ?Sized,
    {
        let mut records: Vec<T> = self.select(exec, query, params).await?;
        match records.len() {
            0 => Err(DbMapError::NoRows),
            1 => records.pop().ok_or(DbMapError::NoRows),
            count => Err(DbMapError::MultipleRows {
                count,
                query: query.to_string(),
            }),
        }
    }

    /// Runs a single-column query that must return exactly one row.
    pub async fn select_value<V, E>(
        &self,
        exec: &mut E,
        query: &str,
        params: impl Into<Params>,
    ) -> Result<V>
    where
        V: FromSqlValue,
        E: SqlExecutor + ?Sized,
    {
        let rows = self.query(exec, query, params).await?;
        single_column(&rows)?;
        let count = rows.len();
        match rows.rows.into_iter().next() {
            None => Err(DbMapError::NoRows),
            Some(_) if count > 1 => Err(DbMapError::MultipleRows {
                count,
                query: query.to_string(),
            }),
            Some(row) => scalar(row),
        }
    }

    /// Runs a single-column query and converts every row.
    pub async fn select_values<V, E>(
        &self,
        exec: &mut E,
        query: &str,
        params: impl Into<Params>,
    ) -> Result<Vec<V>>
    where
        V: FromSqlValue,
        E: SqlExecutor + ?Sized,
    {
        let rows = self.query(exec, query, params).await?;
        single_column(&rows)?;
        rows.rows.into_iter().map(scalar).collect()
    }

    /// First column of the first row as an integer; 0 when there is no row
    /// or the value is NULL.
    pub async fn select_int<E>(
        &self,
        exec: &mut E,
        query: &str,
        params: impl Into<Params>,
    ) -> Result<i64>
    where
        E: SqlExecutor + ?Sized,
    {
        Ok(self.select_null_int(exec, query, params).await?.unwrap_or(0))
    }

    /// First column of the first row as an integer, `None` when there is no
    /// row or the value is NULL.
    pub async fn select_null_int<E>(
        &self,
        exec: &mut E,
        query: &str,
        params: impl Into<Params>,
    ) -> Result<Option<i64>>
    where
        E: SqlExecutor + ?Sized,
    {
        self.first_scalar(exec, query, params).await
    }

    /// Like [`select_int`](Self::select_int) for floats.
    pub async fn select_float<E>(
        &self,
        exec: &mut E,
        query: &str,
        params: impl Into<Params>,
    ) -> Result<f64>
    where
        E: SqlExecutor + ?Sized,
    {
        Ok(self.select_null_float(exec, query, params).await?.unwrap_or(0.0))
    }

    /// Like [`select_null_int`](Self::select_null_int) for floats.
    pub async fn select_null_float<E>(
        &self,
        exec: &mut E,
        query: &str,
        params: impl Into<Params>,
    ) -> Result<Option<f64>>
    where
        E: SqlExecutor + ?Sized,
    {
        self.first_scalar(exec, query, params).await
    }

    /// Like [`select_int`](Self::select_int) for text; empty when absent.
    pub async fn select_str<E>(
        &self,
        exec: &mut E,
        query: &str,
        params: impl Into<Params>,
    ) -> Result<String>
    where
        E: SqlExecutor + ?Sized,
    {
        Ok(self.select_null_str(exec, query, params).await?.unwrap_or_default())
    }

    /// Like [`select_null_int`](Self::select_null_int) for text.
    pub async fn select_null_str<E>(
        &self,
        exec: &mut E,
        query: &str,
        params: impl Into<Params>,
    ) -> Result<Option<String>>
    where
        E: SqlExecutor + ?Sized,
    {
        self.first_scalar(exec, query, params).await
    }

    async fn first_scalar<V, E>(
        &self,
        exec: &mut E,
        query: &str,
        params: impl Into<Params>,
    ) -> Result<Option<V>>
    where
        V: FromSqlValue,
        E: SqlExecutor + ?Sized,
    {
        let rows = self.query(exec, query, params).await?;
        single_column(&rows)?;
        match rows.rows.into_iter().next() {
            Some(row) => scalar::<Option<V>>(row),
            None => Ok(None),
        }
    }

    /// Applies the converter's scanner for `value_type`, if any.
    pub(crate) fn scan_converted(
        &self,
        value_type: &ValueType,
        field: &str,
        value: SqlValue,
    ) -> Result<SqlValue> {
        let Some(scanner) = self.type_converter().and_then(|c| c.from_db(value_type)) else {
            return Ok(value);
        };
        scanner.bind(value).map_err(|source| DbMapError::TypeConverter {
            field: field.to_string(),
            source,
        })
    }

    /// Resolves each result column to a field of `T`.
    ///
    /// Returns the targets in column order and the unmatched column names.
    fn column_targets<T: FieldAccess + 'static>(
        &self,
        columns: &[String],
    ) -> (Vec<Option<Target>>, Vec<String>) {
        let table = self.registered::<T>();
        let defs = T::field_defs();
        let candidates: Vec<(String, &'static str, &ValueType)> = defs
            .iter()
            .map(|def| {
                let column = table
                    .and_then(|t| t.column(def.name))
                    .map_or_else(|| def.column_name(), ColumnMap::column_name);
                (column.to_lowercase(), def.name, &def.value_type)
            })
            .collect();

        let mut missing = Vec::new();
        let targets = columns
            .iter()
            .map(|column| {
                let wanted = column.to_lowercase();
                let found = candidates.iter().find(|(name, _, _)| *name == wanted);
                if let Some(&(_, field, value_type)) = found {
                    Some(Target {
                        field,
                        scanner: self.type_converter().and_then(|c| c.from_db(value_type)),
                    })
                } else {
                    missing.push(column.clone());
                    None
                }
            })
            .collect();
        (targets, missing)
    }
}

fn scalar<V: FromSqlValue>(row: Vec<SqlValue>) -> Result<V> {
    let value = row.into_iter().next().unwrap_or(SqlValue::Null);
    V::from_sql_value(value).map_err(|e| DbMapError::conversion("scalar", e))
}
