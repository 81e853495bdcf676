//! Custom type conversion between fields and columns.

use std::fmt;

use crate::error::BoxError;
use crate::value::{SqlValue, ValueType};

type Binder = dyn Fn(SqlValue) -> Result<SqlValue, BoxError> + Send + Sync;

/// Turns the raw value read from a column into the value assigned to a
/// field.
pub struct CustomScanner {
    binder: Box<Binder>,
}

impl CustomScanner {
    /// Creates a scanner from a binder callback.
    pub fn new<F>(binder: F) -> Self
    where
        F: Fn(SqlValue) -> Result<SqlValue, BoxError> + Send + Sync + 'static,
    {
        Self {
            binder: Box::new(binder),
        }
    }

    /// Runs the binder on the holder value.
    pub fn bind(&self, holder: SqlValue) -> Result<SqlValue, BoxError> {
        (self.binder)(holder)
    }
}

impl fmt::Debug for CustomScanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomScanner").finish_non_exhaustive()
    }
}

/// Converts values of selected field types on their way to and from the
/// database.
///
/// Registered with `DbMap::set_type_converter`. `to_db` sees every value
/// bound by insert, update, delete and get; `from_db` is asked once per
/// result column and field type while scanning.
pub trait TypeConverter: Send + Sync {
    /// Converts a bound value of a field of type `value_type`.
    fn to_db(&self, value_type: &ValueType, value: SqlValue) -> Result<SqlValue, BoxError>;

    /// Returns a scanner for fields of type `value_type`, or `None` to
    /// assign column values unchanged.
    fn from_db(&self, value_type: &ValueType) -> Option<CustomScanner>;
}
