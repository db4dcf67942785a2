//! Catalog module
//!
//! This module contains the system catalog, schema definitions, and data
//! types.

pub mod catalog;
pub mod schema;
pub mod types;

pub use catalog::{
    CatalogManager, SysColumnsRecord, SysTablesRecord, TableMetadata, MAX_NAME_LENGTH,
    SYS_COLUMNS_OID, SYS_TABLES_OID,
};
pub use schema::{Column, Schema};
pub use types::DataType;
