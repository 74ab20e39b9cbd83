//! Schema metadata types for tables and columns.
//!
//! These types provide a dialect-agnostic representation of a table's shape,
//! built from the source catalog and translated for the destination.

use serde::{Deserialize, Serialize};

use super::traits::TypeMapper;

/// Table metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,

    /// Column definitions in ordinal order.
    pub columns: Vec<Column>,

    /// Primary key column names in key order.
    pub primary_key: Vec<String>,
}

impl Table {
    /// Create a table whose primary key is the flagged columns in column order.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        let primary_key = columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect();
        Self {
            name: name.into(),
            columns,
            primary_key,
        }
    }

    /// Check if the table has a primary key.
    pub fn has_pk(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// Check if the primary key spans more than one column.
    pub fn has_composite_pk(&self) -> bool {
        self.primary_key.len() > 1
    }

    /// Column names in ordinal order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Translate every column type with `mapper`.
    ///
    /// Column order, nullability and key membership are preserved.
    pub fn translate(&self, mapper: &dyn TypeMapper) -> Table {
        Table {
            name: self.name.clone(),
            columns: self.columns.iter().map(|c| mapper.map_column(c)).collect(),
            primary_key: self.primary_key.clone(),
        }
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Data type: native before translation, destination type after.
    pub data_type: String,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Whether the column is part of the primary key.
    pub is_primary_key: bool,

    /// Ordinal position (1-based).
    pub ordinal_pos: i32,
}
