//! Data types for LettyDB
//!
//! This module defines the SQL data types supported by the database,
//! with the discriminant values used in the on-disk sys_columns records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL Data Types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    /// 32-bit signed integer
    Integer = 0,
    /// Double-precision floating point
    Double = 1,
    /// Variable-length character string with a declared maximum
    Varchar = 2,
    /// Boolean
    Boolean = 3,
    /// Calendar date (year, month, day)
    Date = 4,
    /// Date + time of day
    Timestamp = 5,
}

impl DataType {
    /// Decode the on-disk discriminant.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(DataType::Integer),
            1 => Some(DataType::Double),
            2 => Some(DataType::Varchar),
            3 => Some(DataType::Boolean),
            4 => Some(DataType::Date),
            5 => Some(DataType::Timestamp),
            _ => None,
        }
    }

    /// Storage size in bytes for fixed-size types; None for VARCHAR,
    /// whose length comes from the column declaration.
    pub fn fixed_length(&self) -> Option<u16> {
        match self {
            DataType::Integer => Some(4),
            DataType::Double => Some(8),
            DataType::Boolean => Some(1),
            DataType::Date => Some(12),
            DataType::Timestamp => Some(24),
            DataType::Varchar => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "INT"),
            DataType::Double => write!(f, "FLOAT"),
            DataType::Varchar => write!(f, "VARCHAR"),
            DataType::Boolean => write!(f, "BOOL"),
            DataType::Date => write!(f, "DATE"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminant_round_trip() {
        for t in [
            DataType::Integer,
            DataType::Double,
            DataType::Varchar,
            DataType::Boolean,
            DataType::Date,
            DataType::Timestamp,
        ] {
            assert_eq!(DataType::from_u8(t as u8), Some(t));
        }
        assert_eq!(DataType::from_u8(6), None);
    }

    #[test]
    fn test_fixed_lengths() {
        assert_eq!(DataType::Integer.fixed_length(), Some(4));
        assert_eq!(DataType::Timestamp.fixed_length(), Some(24));
        assert_eq!(DataType::Varchar.fixed_length(), None);
    }
}
