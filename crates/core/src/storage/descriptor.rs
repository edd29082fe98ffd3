//! Declarative relation descriptions
//!
//! An [`EntityDescriptor`] enumerates the columns of a table (and the view it
//! is read from), which of them are computed by the store, which reference
//! another entity, and which form the primary key. Statements are generated
//! from these descriptions by [`super::statement`].

use std::slice;

use crate::error::{Error, Result};

/// One column of an entity
#[derive(Debug)]
pub struct Column {
    pub name: &'static str,
    /// Computed by the store: read, never written
    pub is_virtual: bool,
    /// Entity this column references, joined on a column of the same name
    pub references: Option<&'static EntityDescriptor>,
}

impl Column {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            is_virtual: false,
            references: None,
        }
    }

    pub const fn computed(name: &'static str) -> Self {
        Self {
            name,
            is_virtual: true,
            references: None,
        }
    }

    pub const fn foreign(name: &'static str, references: &'static EntityDescriptor) -> Self {
        Self {
            name,
            is_virtual: false,
            references: Some(references),
        }
    }
}

/// Description of a relation
#[derive(Debug)]
pub struct EntityDescriptor {
    /// Entity name used in error messages
    pub name: &'static str,
    /// Table written to
    pub table: &'static str,
    /// Relation read from, if different from `table`
    pub view: Option<&'static str>,
    /// Columns in declaration order
    pub columns: &'static [Column],
    /// Primary key; the first declared column when `None`
    pub primary_key: Option<&'static [&'static str]>,
}

impl EntityDescriptor {
    /// Relation selects read from
    pub fn source(&self) -> &'static str {
        self.view.unwrap_or(self.table)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.name)
    }

    /// Columns that inserts and updates may write
    pub fn writable_column_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().filter(|c| !c.is_virtual).map(|c| c.name)
    }

    pub fn primary_key(&self) -> &[&'static str] {
        match self.primary_key {
            Some(key) => key,
            None => slice::from_ref(&self.columns[0].name),
        }
    }

    /// Number of columns a row of this entity occupies in a result set
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::UnknownColumn {
                entity: self.name,
                column: name.to_string(),
            })
    }

    pub fn is_writable(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name && !c.is_virtual)
    }

    /// Entity referenced by the foreign-key column `name`
    pub fn foreign(&self, name: &str) -> Result<&'static EntityDescriptor> {
        let column = self.column(name)?;
        let target = column.references.ok_or_else(|| Error::NotForeignKey {
            entity: self.name,
            column: name.to_string(),
            target: "any entity",
        })?;

        // The join runs over a column of the same name on both sides
        target.column(name)?;
        Ok(target)
    }
}
