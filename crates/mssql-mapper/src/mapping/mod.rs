//! Declarative mapping metadata.
//!
//! An [`EntityDef`] binds an entity to an optional table and lists its
//! mapped properties as [`ColumnDef`]s in declaration order. A
//! [`ProcedureDef`] describes a stored procedure's parameters and the shape
//! of its result.

mod db_type;

pub use db_type::DbType;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::convert::ColumnValue;
use crate::core::value::SqlNullType;

/// Start a column definition for the given SQL column name.
///
/// Used inside [`entity!`](crate::entity) field declarations:
///
/// ```rust
/// use mssql_mapper::{column, DbType};
///
/// let def = column("Station_Name").db_type(DbType::NVarChar).length(50);
/// assert_eq!(def.column, "Station_Name");
/// ```
pub fn column(name: impl Into<String>) -> ColumnDef {
    ColumnDef::new(name)
}

/// Mapping of one property to one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Property (field) name on the entity.
    pub property: String,

    /// SQL column name.
    pub column: String,

    /// SQL type, required for binding the column as a parameter.
    pub db_type: Option<DbType>,

    /// Length (or precision for time types). Zero counts as unset.
    pub length: Option<u32>,

    /// Leave the column out of generated INSERT statements (identity columns).
    pub ignore_on_insert: bool,

    /// Whether the property can hold NULL.
    pub nullable: bool,
}

impl ColumnDef {
    /// Create a column definition. The property name defaults to the column name.
    pub fn new(column: impl Into<String>) -> Self {
        let column = column.into();
        Self {
            property: column.clone(),
            column,
            db_type: None,
            length: None,
            ignore_on_insert: false,
            nullable: true,
        }
    }

    /// Set the SQL type.
    #[must_use]
    pub fn db_type(mut self, db_type: DbType) -> Self {
        self.db_type = Some(db_type);
        self
    }

    /// Set the length.
    #[must_use]
    pub fn length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Leave this column out of generated INSERT statements.
    #[must_use]
    pub fn ignore_on_insert(mut self) -> Self {
        self.ignore_on_insert = true;
        self
    }

    /// Set the property name.
    #[must_use]
    pub fn property(mut self, property: impl Into<String>) -> Self {
        self.property = property.into();
        self
    }

    /// Bind this column to a typed property, taking nullability from the type.
    #[must_use]
    pub fn for_property<T: ColumnValue>(self, property: &str) -> Self {
        let mut def = self.property(property);
        def.nullable = T::NULLABLE;
        def
    }

    /// Length with zero treated as unset.
    pub fn effective_length(&self) -> Option<u32> {
        self.length.filter(|l| *l > 0)
    }

    /// NULL hint for this column.
    pub fn null_type(&self) -> SqlNullType {
        self.db_type
            .map(|t| t.null_type())
            .unwrap_or(SqlNullType::String)
    }
}

/// Mapping of an entity to its columns and optional table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDef {
    /// Registry key; the Rust type path for typed entities.
    pub name: String,

    /// Mapped table. Without one, select-all and insert are unavailable.
    pub table: Option<String>,

    /// Mapped columns in declaration order.
    pub columns: Vec<ColumnDef>,
}

impl EntityDef {
    /// Create an entity definition without a table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            columns: Vec::new(),
        }
    }

    /// Map the entity to a table.
    #[must_use]
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Add a column mapping.
    #[must_use]
    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Find a column by property name.
    pub fn by_property(&self, property: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.property == property)
    }

    /// Columns included in generated INSERT statements.
    pub fn insertable_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| !c.ignore_on_insert)
    }
}

/// Result shape of a stored procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureKind {
    /// Returns a result set hydrated into entities.
    #[default]
    Rows,
    /// Returns nothing.
    NonQuery,
    /// Returns a single value.
    Scalar,
}

impl fmt::Display for ProcedureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcedureKind::Rows => write!(f, "rows"),
            ProcedureKind::NonQuery => write!(f, "non-query"),
            ProcedureKind::Scalar => write!(f, "scalar"),
        }
    }
}

/// One declared stored procedure parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureParam {
    /// Parameter name, with or without the leading `@`.
    pub name: String,

    /// SQL type.
    #[serde(rename = "type")]
    pub db_type: DbType,

    /// Length, applied when a value is supplied.
    #[serde(default)]
    pub length: Option<u32>,
}

/// Stored procedure registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureDef {
    /// Procedure name, optionally schema-qualified.
    pub name: String,

    /// Declared parameters in order.
    pub params: Vec<ProcedureParam>,

    /// Result shape.
    pub kind: ProcedureKind,
}

impl ProcedureDef {
    /// Create a row-returning procedure definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            kind: ProcedureKind::Rows,
        }
    }

    /// Create a procedure definition that returns nothing.
    pub fn non_query(name: impl Into<String>) -> Self {
        Self::new(name).kind(ProcedureKind::NonQuery)
    }

    /// Create a procedure definition that returns a single value.
    pub fn scalar(name: impl Into<String>) -> Self {
        Self::new(name).kind(ProcedureKind::Scalar)
    }

    /// Set the result shape.
    #[must_use]
    pub fn kind(mut self, kind: ProcedureKind) -> Self {
        self.kind = kind;
        self
    }

    /// Declare a parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, db_type: DbType, length: Option<u32>) -> Self {
        self.params.push(ProcedureParam {
            name: name.into(),
            db_type,
            length,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_builder() {
        let def = column("Station_Name")
            .db_type(DbType::NVarChar)
            .length(50)
            .for_property::<Option<String>>("name");
        assert_eq!(def.property, "name");
        assert_eq!(def.column, "Station_Name");
        assert_eq!(def.db_type, Some(DbType::NVarChar));
        assert_eq!(def.effective_length(), Some(50));
        assert!(def.nullable);
        assert!(!def.ignore_on_insert);

        let def = column("ID").for_property::<i32>("id");
        assert!(!def.nullable);
        assert_eq!(def.null_type(), SqlNullType::String);
    }

    #[test]
    fn test_zero_length_is_unset() {
        assert_eq!(column("x").length(0).effective_length(), None);
    }

    #[test]
    fn test_insertable_columns_skip_ignored() {
        let def = EntityDef::new("Station")
            .table("Stations")
            .column(column("ID").ignore_on_insert())
            .column(column("Station_Name"));
        let cols: Vec<_> = def.insertable_columns().map(|c| c.column.as_str()).collect();
        assert_eq!(cols, vec!["Station_Name"]);
        assert!(def.by_property("ID").is_some());
    }

    #[test]
    fn test_procedure_builder() {
        let def = ProcedureDef::scalar("GetStationNameFromId").param("@station_id", DbType::Int, None);
        assert_eq!(def.kind, ProcedureKind::Scalar);
        assert_eq!(def.params.len(), 1);
        assert_eq!(ProcedureKind::NonQuery.to_string(), "non-query");
    }
}
