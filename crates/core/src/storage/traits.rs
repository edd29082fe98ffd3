//! Entity traits
//!
//! These traits connect plain model structs to their [`EntityDescriptor`],
//! so the generic repository operations can read and write them.

use rusqlite::types::Value;
use rusqlite::Row;

use super::descriptor::EntityDescriptor;

/// Decode a value from a result row, starting at column `offset`
pub trait FromRow: Sized {
    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self>;

    /// Number of columns consumed by [`FromRow::from_row`]
    fn width() -> usize;
}

/// A model persisted through an [`EntityDescriptor`]
pub trait Entity: FromRow {
    fn descriptor() -> &'static EntityDescriptor;

    /// Current value of a column, `Value::Null` when unset or unknown
    fn value(&self, column: &str) -> Value;

    /// Receive the key generated by the store for a single-column primary key
    fn set_generated_key(&mut self, _key: i64) {}
}

/// Joined rows decode as (entity, foreign entity)
impl<A: Entity, B: Entity> FromRow for (A, B) {
    fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        let a = A::from_row(row, offset)?;
        let b = B::from_row(row, offset + A::width())?;
        Ok((a, b))
    }

    fn width() -> usize {
        A::width() + B::width()
    }
}
