//! Configuration type definitions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mapping::{ColumnDef, DbType, EntityDef, ProcedureDef, ProcedureKind, ProcedureParam};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database connection. Without one, only offline operations work.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionConfig>,

    /// Entities mapped without a Rust type.
    #[serde(default)]
    pub entities: Vec<EntityConfig>,

    /// Stored procedures.
    #[serde(default)]
    pub procedures: Vec<ProcedureConfig>,
}

/// SQL Server connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 1433).
    #[serde(default = "default_mssql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Encrypt connection (default: true).
    #[serde(default = "default_true")]
    pub encrypt: bool,

    /// Trust server certificate (default: false).
    #[serde(default)]
    pub trust_server_cert: bool,

    /// Maximum pooled connections (default: 8).
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("encrypt", &self.encrypt)
            .field("trust_server_cert", &self.trust_server_cert)
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

/// Entity mapping defined in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Entity name, used as the registry key.
    pub name: String,

    /// Mapped table, optionally schema-qualified.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    /// Column mappings in order.
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
}

impl EntityConfig {
    /// Mapping definition for this entity. Every property is nullable.
    pub fn to_definition(&self) -> EntityDef {
        EntityDef {
            name: self.name.clone(),
            table: self.table.clone(),
            columns: self.columns.iter().map(ColumnConfig::to_definition).collect(),
        }
    }
}

/// Column mapping defined in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// Property name.
    pub property: String,

    /// Column name (default: the property name).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,

    /// SQL type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub db_type: Option<DbType>,

    /// Length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,

    /// Leave out of INSERT statements.
    #[serde(default)]
    pub ignore_on_insert: bool,
}

impl ColumnConfig {
    pub fn to_definition(&self) -> ColumnDef {
        ColumnDef {
            property: self.property.clone(),
            column: self.column.clone().unwrap_or_else(|| self.property.clone()),
            db_type: self.db_type,
            length: self.length.filter(|l| *l > 0),
            ignore_on_insert: self.ignore_on_insert,
            nullable: true,
        }
    }
}

/// Stored procedure defined in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureConfig {
    /// Procedure name, optionally schema-qualified.
    pub name: String,

    /// Result shape (default: rows).
    #[serde(default)]
    pub kind: ProcedureKind,

    /// Entity that rows hydrate into, for row-returning procedures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,

    /// Parameters in order.
    #[serde(default)]
    pub params: Vec<ProcedureParam>,
}

impl ProcedureConfig {
    pub fn to_definition(&self) -> ProcedureDef {
        ProcedureDef {
            name: self.name.clone(),
            params: self.params.clone(),
            kind: self.kind,
        }
    }
}

// Default value functions for serde
fn default_mssql_port() -> u16 {
    1433
}

fn default_pool_size() -> u32 {
    8
}

fn default_true() -> bool {
    true
}
