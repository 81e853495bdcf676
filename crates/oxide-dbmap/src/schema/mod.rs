//! Schema model: table, column and index descriptors.

mod column;
mod index;
mod table;

pub use column::ColumnMap;
pub use index::IndexMap;
pub use table::TableMap;
