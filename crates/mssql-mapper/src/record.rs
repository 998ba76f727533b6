//! Dynamic entities whose shape comes from configuration.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value as JsonValue;

use crate::core::value::SqlValue;
use crate::error::{MapperError, Result};
use crate::mapping::{ColumnDef, DbType, EntityDef};

/// An entity instance without a Rust type behind it.
///
/// Properties keep the order of the entity's column mappings.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    entity: String,
    values: Vec<(String, SqlValue<'static>)>,
}

impl Record {
    /// Create an empty record for the given entity.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            values: Vec::new(),
        }
    }

    /// Create a record with every mapped property set to a typed NULL.
    pub fn empty_for(def: &EntityDef) -> Self {
        let mut record = Self::new(def.name.clone());
        for col in &def.columns {
            record.set(&col.property, SqlValue::Null(col.null_type()));
        }
        record
    }

    /// Build a record from a JSON object, converting each value to its
    /// column's type.
    ///
    /// Properties missing from the object become NULL. Keys that are not
    /// mapped properties are rejected.
    pub fn from_json(def: &EntityDef, json: &JsonValue) -> Result<Self> {
        let object = json.as_object().ok_or_else(|| {
            MapperError::conversion("JSON object", format!("{} for {}", json_kind(json), def.name))
        })?;

        if let Some(unknown) = object.keys().find(|k| def.by_property(k).is_none()) {
            return Err(MapperError::UnknownProperty {
                entity: def.name.clone(),
                property: unknown.clone(),
            });
        }

        let mut record = Self::new(def.name.clone());
        for col in &def.columns {
            let value = match object.get(&col.property) {
                Some(v) => json_to_value(col, v)
                    .map_err(|e| MapperError::hydration(&def.name, &col.property, e))?,
                None => SqlValue::Null(col.null_type()),
            };
            record.set(&col.property, value);
        }
        Ok(record)
    }

    /// Entity name.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Read a property.
    pub fn get(&self, property: &str) -> Option<&SqlValue<'static>> {
        self.values
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    /// Set a property, replacing any existing value.
    pub fn set(&mut self, property: &str, value: SqlValue<'static>) {
        match self.values.iter_mut().find(|(name, _)| name == property) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((property.to_string(), value)),
        }
    }

    /// Properties in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue<'static>)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of properties set.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if no property is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// JSON object keyed by property.
    pub fn to_json(&self) -> JsonValue {
        let map = self
            .values
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        JsonValue::Object(map)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, &value.to_json())?;
        }
        map.end()
    }
}

/// Convert a JSON value to the SQL value a column binds with.
///
/// Columns without a type keep JSON strings as text and numbers as the
/// narrowest fitting numeric value.
pub fn json_to_value(col: &ColumnDef, json: &JsonValue) -> Result<SqlValue<'static>> {
    let raw = match json {
        JsonValue::Null => return Ok(SqlValue::Null(col.null_type())),
        JsonValue::Bool(b) => SqlValue::Bool(*b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::I64(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::F64(f)
            } else {
                SqlValue::text_owned(n.to_string())
            }
        }
        JsonValue::String(s) => SqlValue::text_owned(s.clone()),
        JsonValue::Array(_) | JsonValue::Object(_) => SqlValue::text_owned(json.to_string()),
    };

    match (col.db_type, json) {
        // Keep the literal digits instead of going through f64.
        (Some(db_type @ (DbType::Decimal | DbType::Money | DbType::SmallMoney)), JsonValue::Number(n)) => {
            db_type.parse_value(&n.to_string())
        }
        (Some(db_type), _) => db_type.coerce(raw),
        (None, _) => Ok(raw),
    }
}

fn json_kind(json: &JsonValue) -> &'static str {
    match json {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
