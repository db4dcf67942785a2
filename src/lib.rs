//! LettyDB - a small disk-backed relational storage engine written in Rust
//!
//! This library provides the core components of the database:
//! - Storage substrate (page I/O, extent allocation, slotted pages)
//! - System catalog (sys_tables / sys_columns bootstrap and lookup)
//! - SQL parsing (lexer, parser, AST)

pub mod catalog;
pub mod error;
pub mod sql;
pub mod storage;

pub use error::{Error, Result};
