//! Mapper configuration.

use serde::Deserialize;

use crate::dbmap::DbMap;
use crate::dialect::{dialect_from_name, Dialect, MySqlDialect, PostgresDialect};
use crate::error::{DbMapError, Result};

const DEFAULT_ENGINE: &str = "InnoDB";
const DEFAULT_ENCODING: &str = "UTF8";

/// Settings a [`DbMap`] can be built from.
///
/// ```json
/// { "dialect": "mysql", "engine": "InnoDB", "encoding": "UTF8" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbMapConfig {
    /// Dialect name, as accepted by [`dialect_from_name`].
    pub dialect: String,
    /// MySQL storage engine.
    pub engine: Option<String>,
    /// MySQL character set.
    pub encoding: Option<String>,
    /// Fold PostgreSQL identifiers to lower case.
    pub lowercase_fields: bool,
}

impl Default for DbMapConfig {
    fn default() -> Self {
        Self {
            dialect: "sqlite".to_string(),
            engine: None,
            encoding: None,
            lowercase_fields: false,
        }
    }
}

impl DbMapConfig {
    /// Parses a JSON document. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| DbMapError::Config(e.to_string()))
    }

    /// Builds the configured dialect.
    pub fn dialect(&self) -> Result<Box<dyn Dialect>> {
        match self.dialect.to_ascii_lowercase().as_str() {
            "mysql" => {
                let engine = self.engine.as_deref().unwrap_or(DEFAULT_ENGINE);
                let encoding = self.encoding.as_deref().unwrap_or(DEFAULT_ENCODING);
                Ok(Box::new(MySqlDialect::new(engine, encoding)))
            }
            "postgres" | "postgresql" | "pg" => Ok(Box::new(
                PostgresDialect::new().lowercase_fields(self.lowercase_fields),
            )),
            name => dialect_from_name(name),
        }
    }
}

impl DbMap {
    /// Creates an empty map from configuration.
    pub fn from_config(config: &DbMapConfig) -> Result<Self> {
        Ok(Self::with_dialect(config.dialect()?))
    }
}
