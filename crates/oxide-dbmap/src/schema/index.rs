//! Index descriptors.

use crate::dialect::IndexType;

/// An index declared on a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMap {
    name: String,
    columns: Vec<String>,
    unique: bool,
    index_type: Option<IndexType>,
}

impl IndexMap {
    pub(crate) fn new(
        name: impl Into<String>,
        index_type: Option<IndexType>,
        columns: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            unique: false,
            index_type,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Indexed fields, in index order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }

    #[must_use]
    pub const fn index_type(&self) -> Option<IndexType> {
        self.index_type
    }

    /// Makes the index UNIQUE.
    pub fn set_unique(&mut self, unique: bool) -> &mut Self {
        self.unique = unique;
        self
    }
}
