//! Schema definitions for LettyDB
//!
//! This module defines table schemas and column metadata as stored in
//! the system catalog.

use super::types::DataType;
use serde::{Deserialize, Serialize};

/// Column metadata: name, type, byte length, and byte offset within the
/// table's fixed-layout record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub length: u16,
    pub offset: u16,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType, length: u16, offset: u16) -> Self {
        Self {
            name: name.into(),
            data_type,
            length,
            offset,
        }
    }

    /// Column of a fixed-size type; the length is implied by the type.
    pub fn fixed(name: impl Into<String>, data_type: DataType, offset: u16) -> Self {
        let length = data_type.fixed_length().unwrap_or(0);
        Self::new(name, data_type, length, offset)
    }
}

/// Table schema - an ordered collection of columns
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Look a column up by name.
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Total record length in bytes.
    pub fn record_length(&self) -> u32 {
        self.columns.iter().map(|c| c.length as u32).sum()
    }
}
