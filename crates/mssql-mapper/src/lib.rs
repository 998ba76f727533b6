//! # mssql-mapper
//!
//! Minimal metadata-driven object mapper for Microsoft SQL Server.
//!
//! Entities declare how their properties map to columns. From that metadata
//! the mapper builds select-all, insert and stored procedure commands, binds
//! parameters with their declared SQL type and length, and hydrates results
//! back into entities from buffered tables or forward-only cursors.
//!
//! ## Example
//!
//! ```rust,no_run
//! use mssql_mapper::{column, entity, ConnectionConfig, DbType, Mapper, ProcedureDef, Params};
//!
//! entity! {
//!     #[derive(Debug, Default)]
//!     pub struct Station as "dbo.Stations" {
//!         pub id: Option<i32> => column("ID").db_type(DbType::Int).ignore_on_insert(),
//!         pub name: Option<String> => column("Station_Name").db_type(DbType::NVarChar).length(50),
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> mssql_mapper::Result<()> {
//!     let config: ConnectionConfig = serde_yaml::from_str(
//!         "{host: localhost, database: Divvy, user: sa, password: secret}",
//!     )?;
//!     let mut mapper = Mapper::connect(&config).await?;
//!     mapper.register::<Station>()?;
//!
//!     mapper
//!         .insert(&Station { id: None, name: Some("Clark St & Lake St".into()) })
//!         .await?;
//!     for station in mapper.all::<Station>().await? {
//!         println!("{:?}", station);
//!     }
//!
//!     mapper.register_procedure(
//!         ProcedureDef::scalar("GetStationNameFromId").param("@station_id", DbType::Int, None),
//!     )?;
//!     let mut params = Params::new();
//!     params.insert("@station_id".into(), 1.into());
//!     let name: Option<String> = mapper
//!         .execute_scalar_procedure("GetStationNameFromId", Some(&params))
//!         .await?;
//!     println!("{:?}", name);
//!     Ok(())
//! }
//! ```

pub mod command;
pub mod config;
pub mod core;
pub mod entity;
pub mod error;
pub mod executor;
pub mod hydrate;
pub mod mapper;
pub mod mapping;
pub mod record;
pub mod registry;
pub mod result;

// Re-exports for convenient access
pub use command::{Command, CommandKind, Parameter, Params, RenderedCommand};
pub use config::{ColumnConfig, Config, ConnectionConfig, EntityConfig, ProcedureConfig};
pub use core::convert::{ColumnValue, SqlType};
pub use core::value::{SqlNullType, SqlValue};
pub use entity::Entity;
pub use error::{MapperError, Result};
pub use executor::{Executor, MssqlExecutor, RowSink};
pub use mapper::Mapper;
pub use mapping::{column, ColumnDef, DbType, EntityDef, ProcedureDef, ProcedureKind, ProcedureParam};
pub use record::Record;
pub use registry::{EntityMapping, Registry};
pub use result::{ResultRow, ResultTable};
