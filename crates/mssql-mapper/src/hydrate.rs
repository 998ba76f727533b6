//! Result-to-object hydration.
//!
//! Every mapped property is assigned on every row: from the row's value when
//! the result has the column and the value is not NULL, and from a typed NULL
//! otherwise. Result columns without a mapping are ignored.

use std::sync::Arc;

use crate::core::value::SqlValue;
use crate::entity::Entity;
use crate::error::{MapperError, Result};
use crate::mapping::EntityDef;
use crate::record::Record;
use crate::result::{ResultRow, ResultTable};

/// A value the hydration engine can populate.
pub trait Hydrate: Sized {
    /// A fresh instance with nothing assigned.
    fn blank(def: &EntityDef) -> Self;

    /// Assign one property.
    fn assign(&mut self, property: &str, value: SqlValue<'static>) -> Result<()>;
}

impl<T: Entity> Hydrate for T {
    fn blank(_def: &EntityDef) -> Self {
        T::default()
    }

    fn assign(&mut self, property: &str, value: SqlValue<'static>) -> Result<()> {
        self.set_property(property, value)
    }
}

impl Hydrate for Record {
    fn blank(def: &EntityDef) -> Self {
        Record::new(def.name.clone())
    }

    fn assign(&mut self, property: &str, value: SqlValue<'static>) -> Result<()> {
        self.set(property, value);
        Ok(())
    }
}

/// Hydrates rows of one result set.
///
/// Column positions are resolved once per column list and reused while rows
/// keep sharing it.
pub struct RowHydrator<'a> {
    def: &'a EntityDef,
    resolved: Option<(Arc<[String]>, Vec<Option<usize>>)>,
}

impl<'a> RowHydrator<'a> {
    pub fn new(def: &'a EntityDef) -> Self {
        Self {
            def,
            resolved: None,
        }
    }

    /// Build one instance from a row.
    pub fn hydrate<T: Hydrate>(&mut self, row: ResultRow) -> Result<T> {
        let positions = self.positions(&row);
        let mut values = row.into_values();
        let mut target = T::blank(self.def);

        for (k, col) in self.def.columns.iter().enumerate() {
            let pos = positions[k];
            // Several properties may read the same result column.
            let shared = pos.is_some() && positions[k + 1..].contains(&pos);
            let value = pos
                .and_then(|i| values.get_mut(i))
                .map(|v| {
                    if shared {
                        v.clone()
                    } else {
                        std::mem::replace(v, SqlValue::Null(col.null_type()))
                    }
                })
                .filter(|v| !v.is_null())
                .unwrap_or(SqlValue::Null(col.null_type()));

            target
                .assign(&col.property, value)
                .map_err(|e| MapperError::hydration(short_name(&self.def.name), &col.property, e))?;
        }
        Ok(target)
    }

    fn positions(&mut self, row: &ResultRow) -> Vec<Option<usize>> {
        let columns = row.column_list();
        match &self.resolved {
            Some((cached, positions)) if Arc::ptr_eq(cached, &columns) => positions.clone(),
            _ => {
                let positions: Vec<Option<usize>> = self
                    .def
                    .columns
                    .iter()
                    .map(|c| row.index_of(&c.column))
                    .collect();
                self.resolved = Some((columns, positions.clone()));
                positions
            }
        }
    }
}

/// Hydrate every row of a buffered result.
pub fn fill_table<T: Hydrate>(def: &EntityDef, table: &ResultTable) -> Result<Vec<T>> {
    let mut hydrator = RowHydrator::new(def);
    table
        .rows()
        .iter()
        .map(|row| hydrator.hydrate(row.clone()))
        .collect()
}

/// Hydrate a single row.
pub fn hydrate_row<T: Hydrate>(def: &EntityDef, row: ResultRow) -> Result<T> {
    RowHydrator::new(def).hydrate(row)
}

/// Last path segment of a type key, for error messages.
fn short_name(key: &str) -> &str {
    key.rsplit("::").next().unwrap_or(key)
}
