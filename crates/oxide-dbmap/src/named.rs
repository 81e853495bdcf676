//! Query parameters and `:name` expansion.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::dialect::Dialect;
use crate::error::{DbMapError, Result};
use crate::record::FieldAccess;
use crate::value::SqlValue;

static NAMED_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":{1,2}(\w+)").expect("valid named parameter regex"));

/// Arguments of a free-form query.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Params {
    /// No arguments.
    #[default]
    None,
    /// Bound in placeholder order.
    Positional(Vec<SqlValue>),
    /// Substituted for `:name` tokens.
    Named(HashMap<String, SqlValue>),
}

impl Params {
    /// Named parameters taken from the fields of a record.
    ///
    /// Every field is reachable by its field name and by its default column
    /// name.
    pub fn from_record<T: FieldAccess>(record: &T) -> Result<Self> {
        let mut map = HashMap::new();
        for def in T::field_defs() {
            let value = record
                .get_field(def.name)
                .map_err(|e| DbMapError::conversion(def.name, e))?;
            if let Some(value) = value {
                map.insert(def.column_name().to_string(), value.clone());
                map.insert(def.name.to_string(), value);
            }
        }
        Ok(Self::Named(map))
    }

    /// Rewrites `query` into positional form for `dialect`.
    ///
    /// Each `:name` occurrence becomes a new placeholder bound to the
    /// named value, in order of appearance. `::` casts and names without a
    /// value are left untouched.
    pub(crate) fn expand(self, dialect: &dyn Dialect, query: &str) -> (String, Vec<SqlValue>) {
        match self {
            Self::None => (query.to_string(), Vec::new()),
            Self::Positional(args) => (query.to_string(), args),
            Self::Named(map) => {
                let mut args = Vec::new();
                let expanded = NAMED_PARAM.replace_all(query, |caps: &Captures<'_>| {
                    let token = &caps[0];
                    if token.starts_with("::") {
                        return token.to_string();
                    }
                    map.get(&caps[1]).map_or_else(
                        || token.to_string(),
                        |value| {
                            let placeholder = dialect.bind_var(args.len());
                            args.push(value.clone());
                            placeholder
                        },
                    )
                });
                (expanded.into_owned(), args)
            }
        }
    }
}

impl From<Vec<SqlValue>> for Params {
    fn from(args: Vec<SqlValue>) -> Self {
        Self::Positional(args)
    }
}

impl<const N: usize> From<[SqlValue; N]> for Params {
    fn from(args: [SqlValue; N]) -> Self {
        Self::Positional(args.to_vec())
    }
}

impl From<&[SqlValue]> for Params {
    fn from(args: &[SqlValue]) -> Self {
        Self::Positional(args.to_vec())
    }
}

impl From<()> for Params {
    fn from((): ()) -> Self {
        Self::None
    }
}

impl From<HashMap<String, SqlValue>> for Params {
    fn from(map: HashMap<String, SqlValue>) -> Self {
        Self::Named(map)
    }
}

impl<const N: usize> From<[(&str, SqlValue); N]> for Params {
    fn from(pairs: [(&str, SqlValue); N]) -> Self {
        Self::Named(
            pairs
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{OracleDialect, PostgresDialect, SqliteDialect};

    #[test]
    fn test_repeated_name_binds_each_slot() {
        let params = Params::from([("x", SqlValue::Int(5))]);
        let (sql, args) = params.expand(
            &PostgresDialect::new(),
            "select * from t where a = :x and b = :x",
        );
        assert_eq!(sql, "select * from t where a = $1 and b = $2");
        assert_eq!(args, vec![SqlValue::Int(5), SqlValue::Int(5)]);
    }

    #[test]
    fn test_first_occurrence_order() {
        let params = Params::from([("a", SqlValue::Int(1)), ("b", SqlValue::Int(2))]);
        let (sql, args) = params.expand(&OracleDialect::new(), "x = :b or y = :a or z = :b");
        assert_eq!(sql, "x = :1 or y = :2 or z = :3");
        assert_eq!(args, vec![SqlValue::Int(2), SqlValue::Int(1), SqlValue::Int(2)]);
    }

    #[test]
    fn test_casts_and_unknown_names_untouched() {
        let params = Params::from([("id", SqlValue::Int(3))]);
        let (sql, args) = params.expand(
            &SqliteDialect::new(),
            "select created::date from t where id = :id and tag = :other",
        );
        assert_eq!(sql, "select created::date from t where id = ? and tag = :other");
        assert_eq!(args, vec![SqlValue::Int(3)]);
    }

    #[test]
    fn test_positional_passes_through() {
        let params = Params::from(vec![SqlValue::Int(1)]);
        let (sql, args) = params.expand(&SqliteDialect::new(), "select ? as v");
        assert_eq!(sql, "select ? as v");
        assert_eq!(args.len(), 1);
    }
}
