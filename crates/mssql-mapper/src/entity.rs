//! Typed entities.
//!
//! Rust has no runtime reflection, so an entity describes its own mapping
//! through [`Entity`]. The [`entity!`](crate::entity) macro writes the
//! struct and the trait implementation from one declaration.

use crate::core::value::SqlValue;
use crate::error::Result;
use crate::mapping::EntityDef;

/// A Rust type mapped to table rows.
pub trait Entity: Default + Send + 'static {
    /// Mapping metadata for this type.
    fn definition() -> EntityDef;

    /// Read a mapped property. Returns `None` for unknown property names.
    fn get_property(&self, property: &str) -> Option<SqlValue<'static>>;

    /// Assign a mapped property from a SQL value.
    fn set_property(&mut self, property: &str, value: SqlValue<'static>) -> Result<()>;

    /// Registry key for this type.
    fn type_key() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Declare a mapped struct and implement [`Entity`] for it.
///
/// Each field is followed by `=>` and a [`ColumnDef`](crate::ColumnDef)
/// expression. Property names and nullability come from the field itself.
/// An optional `as "Table"` maps the entity to a table.
///
/// ```rust
/// use mssql_mapper::{column, entity, DbType, Entity};
///
/// entity! {
///     #[derive(Debug, Clone, Default, PartialEq)]
///     pub struct Station as "Stations" {
///         pub id: Option<i32> => column("ID").db_type(DbType::Int).ignore_on_insert(),
///         pub name: Option<String> => column("Station_Name").db_type(DbType::NVarChar).length(50),
///     }
/// }
///
/// let def = Station::definition();
/// assert_eq!(def.table.as_deref(), Some("Stations"));
/// assert_eq!(def.columns[1].property, "name");
/// ```
#[macro_export]
macro_rules! entity {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident $(as $table:literal)? {
            $(
                $(#[doc = $doc:literal])*
                $fvis:vis $field:ident : $ty:ty => $def:expr
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[doc = $doc])*
                $fvis $field: $ty,
            )*
        }

        impl $crate::Entity for $name {
            fn definition() -> $crate::EntityDef {
                $crate::EntityDef {
                    name: ::std::string::ToString::to_string(<Self as $crate::Entity>::type_key()),
                    table: $crate::__entity_table!($($table)?),
                    columns: ::std::vec![
                        $(
                            $crate::ColumnDef::for_property::<$ty>($def, ::std::stringify!($field)),
                        )*
                    ],
                }
            }

            fn get_property(&self, property: &str) -> ::std::option::Option<$crate::SqlValue<'static>> {
                $(
                    if property == ::std::stringify!($field) {
                        return ::std::option::Option::Some($crate::ColumnValue::to_value(&self.$field));
                    }
                )*
                ::std::option::Option::None
            }

            fn set_property(
                &mut self,
                property: &str,
                value: $crate::SqlValue<'static>,
            ) -> $crate::Result<()> {
                $(
                    if property == ::std::stringify!($field) {
                        self.$field = <$ty as $crate::ColumnValue>::from_value(value)?;
                        return ::std::result::Result::Ok(());
                    }
                )*
                let _ = value;
                ::std::result::Result::Err($crate::MapperError::UnknownProperty {
                    entity: ::std::string::ToString::to_string(::std::stringify!($name)),
                    property: ::std::string::ToString::to_string(property),
                })
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __entity_table {
    () => {
        ::std::option::Option::None
    };
    ($table:literal) => {
        ::std::option::Option::Some(::std::string::ToString::to_string($table))
    };
}
