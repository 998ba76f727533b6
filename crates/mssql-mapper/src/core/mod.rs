//! Core building blocks shared by the mapping, binding and hydration layers.
//!
//! - [`value`]: SQL value representation with typed NULLs
//! - [`convert`]: conversions between Rust property types and SQL values
//! - [`identifier`]: identifier validation and quoting for generated SQL

pub mod convert;
pub mod identifier;
pub mod value;

pub use convert::{ColumnValue, SqlType};
pub use value::{SqlNullType, SqlValue};
