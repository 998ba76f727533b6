//! Configuration validation.

use std::collections::HashSet;

use super::Config;
use crate::error::{MapperError, Result};
use crate::mapping::ProcedureKind;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Connection validation
    if let Some(conn) = &config.connection {
        if conn.host.is_empty() {
            return Err(MapperError::Config("connection.host is required".into()));
        }
        if conn.database.is_empty() {
            return Err(MapperError::Config("connection.database is required".into()));
        }
        if conn.user.is_empty() {
            return Err(MapperError::Config("connection.user is required".into()));
        }
        if conn.pool_size == 0 {
            return Err(MapperError::Config(
                "connection.pool_size must be at least 1".into(),
            ));
        }
    }

    // Entity validation
    let mut entities = HashSet::new();
    for entity in &config.entities {
        if entity.name.is_empty() {
            return Err(MapperError::Config("entities[].name is required".into()));
        }
        if !entities.insert(entity.name.as_str()) {
            return Err(MapperError::Config(format!(
                "entity '{}' is defined more than once",
                entity.name
            )));
        }
        let mut properties = HashSet::new();
        for col in &entity.columns {
            if col.property.is_empty() {
                return Err(MapperError::Config(format!(
                    "entity '{}' has a column without a property name",
                    entity.name
                )));
            }
            if !properties.insert(col.property.as_str()) {
                return Err(MapperError::Config(format!(
                    "entity '{}' maps property '{}' more than once",
                    entity.name, col.property
                )));
            }
        }
    }

    // Procedure validation
    let mut procedures = HashSet::new();
    for procedure in &config.procedures {
        if procedure.name.is_empty() {
            return Err(MapperError::Config("procedures[].name is required".into()));
        }
        if !procedures.insert(procedure.name.as_str()) {
            return Err(MapperError::Config(format!(
                "procedure '{}' is defined more than once",
                procedure.name
            )));
        }
        match (&procedure.entity, procedure.kind) {
            (Some(entity), ProcedureKind::Rows) => {
                if !entities.contains(entity.as_str()) {
                    return Err(MapperError::Config(format!(
                        "procedure '{}' refers to unknown entity '{}'",
                        procedure.name, entity
                    )));
                }
            }
            (Some(_), kind) => {
                return Err(MapperError::Config(format!(
                    "procedure '{}' is {} and cannot hydrate an entity",
                    procedure.name, kind
                )));
            }
            (None, _) => {}
        }
    }

    Ok(())
}
