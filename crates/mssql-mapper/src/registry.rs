//! Mapping registry and statement cache.
//!
//! Select-all and insert statements are built once, when an entity with a
//! table is registered, and reused for every call afterwards.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::config::Config;
use crate::core::identifier::{
    normalize_parameter_name, parameter_name_for_column, quote_mssql, quote_multipart,
    validate_identifier,
};
use crate::error::{MapperError, Result};
use crate::mapping::{ColumnDef, EntityDef, ProcedureDef};

/// A column bound by the cached insert statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertColumn {
    /// Parameter name used in the VALUES list.
    pub param: String,
    pub column: ColumnDef,
}

/// A registered entity with its cached statements.
#[derive(Debug, Clone)]
pub struct EntityMapping {
    def: EntityDef,
    select_sql: Option<String>,
    insert_sql: Option<String>,
    insert_columns: Vec<InsertColumn>,
}

impl EntityMapping {
    fn build(def: EntityDef) -> Result<Self> {
        for col in &def.columns {
            validate_identifier(&col.property)?;
            validate_identifier(&col.column)?;
            if !col.nullable {
                return Err(MapperError::NonNullableProperty {
                    entity: def.name.clone(),
                    property: col.property.clone(),
                });
            }
        }

        let Some(table) = def.table.as_deref() else {
            return Ok(Self {
                def,
                select_sql: None,
                insert_sql: None,
                insert_columns: Vec::new(),
            });
        };

        let table = quote_multipart(table)?;
        let select_sql = format!("SELECT * FROM {}", table);

        let mut seen = HashSet::new();
        let mut insert_columns = Vec::new();
        for col in def.insertable_columns() {
            let param = normalize_parameter_name(&parameter_name_for_column(&col.column))?;
            if !seen.insert(param.to_ascii_lowercase()) {
                return Err(MapperError::InvalidIdentifier(format!(
                    "columns of {} map to the same parameter name {}",
                    def.name, param
                )));
            }
            insert_columns.push(InsertColumn {
                param,
                column: col.clone(),
            });
        }

        let insert_sql = if insert_columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table)
        } else {
            let columns = insert_columns
                .iter()
                .map(|c| quote_mssql(&c.column.column))
                .collect::<Result<Vec<_>>>()?;
            let params: Vec<&str> = insert_columns.iter().map(|c| c.param.as_str()).collect();
            format!(
                "INSERT INTO {}({}) VALUES({})",
                table,
                columns.join(","),
                params.join(",")
            )
        };

        Ok(Self {
            def,
            select_sql: Some(select_sql),
            insert_sql: Some(insert_sql),
            insert_columns,
        })
    }

    /// Mapping metadata.
    pub fn definition(&self) -> &EntityDef {
        &self.def
    }

    /// True if the entity is mapped to a table.
    pub fn has_table(&self) -> bool {
        self.def.table.is_some()
    }

    /// Cached `SELECT * FROM <table>`.
    pub fn select_sql(&self) -> Option<&str> {
        self.select_sql.as_deref()
    }

    /// Cached insert statement.
    pub fn insert_sql(&self) -> Option<&str> {
        self.insert_sql.as_deref()
    }

    /// Columns bound by the insert statement, in statement order.
    pub fn insert_columns(&self) -> &[InsertColumn] {
        &self.insert_columns
    }
}

/// Entity and stored procedure registrations.
#[derive(Debug, Default)]
pub struct Registry {
    entities: HashMap<String, EntityMapping>,
    procedures: HashMap<String, ProcedureDef>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity and cache its statements.
    pub fn register(&mut self, def: EntityDef) -> Result<&EntityMapping> {
        if self.entities.contains_key(&def.name) {
            return Err(MapperError::AlreadyRegistered(def.name));
        }

        let mapping = EntityMapping::build(def)?;
        let key = mapping.def.name.clone();
        debug!(
            "Registered entity {} ({} columns, table: {})",
            key,
            mapping.def.columns.len(),
            mapping.def.table.as_deref().unwrap_or("none")
        );
        Ok(self.entities.entry(key).or_insert(mapping))
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.entities.contains_key(key)
    }

    /// True if the entity is registered with a table. Unknown entities have none.
    pub fn has_mapped_table(&self, key: &str) -> bool {
        self.entities.get(key).is_some_and(EntityMapping::has_table)
    }

    pub fn mapping(&self, key: &str) -> Result<&EntityMapping> {
        self.entities
            .get(key)
            .ok_or_else(|| MapperError::NotRegistered(key.to_string()))
    }

    /// Mapping of an entity that must have a table.
    pub fn table_mapping(&self, key: &str) -> Result<&EntityMapping> {
        let mapping = self.mapping(key)?;
        if !mapping.has_table() {
            return Err(MapperError::NoMappedTable(key.to_string()));
        }
        Ok(mapping)
    }

    pub fn select_sql(&self, key: &str) -> Result<&str> {
        let mapping = self.table_mapping(key)?;
        mapping
            .select_sql()
            .ok_or_else(|| MapperError::NoMappedTable(key.to_string()))
    }

    pub fn insert_sql(&self, key: &str) -> Result<&str> {
        let mapping = self.table_mapping(key)?;
        mapping
            .insert_sql()
            .ok_or_else(|| MapperError::NoMappedTable(key.to_string()))
    }

    /// Registered entity keys, sorted.
    pub fn entity_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entities.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Register a stored procedure.
    pub fn register_procedure(&mut self, def: ProcedureDef) -> Result<()> {
        if self.procedures.contains_key(&def.name) {
            return Err(MapperError::ProcedureAlreadyRegistered(def.name));
        }
        quote_multipart(&def.name)?;

        let mut seen = HashSet::new();
        for param in &def.params {
            let name = normalize_parameter_name(&param.name)?;
            if !seen.insert(name.to_ascii_lowercase()) {
                return Err(MapperError::InvalidIdentifier(format!(
                    "procedure {} declares {} twice",
                    def.name, name
                )));
            }
        }

        debug!(
            "Registered {} procedure {} ({} parameters)",
            def.kind,
            def.name,
            def.params.len()
        );
        self.procedures.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn is_procedure_registered(&self, name: &str) -> bool {
        self.procedures.contains_key(name)
    }

    pub fn procedure(&self, name: &str) -> Result<&ProcedureDef> {
        self.procedures
            .get(name)
            .ok_or_else(|| MapperError::ProcedureNotRegistered(name.to_string()))
    }

    /// Registered procedure names, sorted.
    pub fn procedure_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.procedures.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Register every entity and procedure defined in a configuration.
    pub fn load_config(&mut self, config: &Config) -> Result<()> {
        for entity in &config.entities {
            self.register(entity.to_definition())?;
        }
        for procedure in &config.procedures {
            self.register_procedure(procedure.to_definition())?;
        }
        debug!(
            "Loaded {} entities and {} procedures from configuration",
            config.entities.len(),
            config.procedures.len()
        );
        Ok(())
    }
}
