//! Public facade.
//!
//! A [`Mapper`] owns the mapping registry and, once connected, an
//! [`Executor`]. Registration and statement building work offline; every
//! database operation fails with [`MapperError::NotConnected`] until an
//! executor is attached.

use std::sync::Arc;

use tracing::debug;

use crate::command::{Command, Params};
use crate::config::{Config, ConnectionConfig};
use crate::core::convert::ColumnValue;
use crate::core::value::SqlValue;
use crate::entity::Entity;
use crate::error::{MapperError, Result};
use crate::executor::{Executor, MssqlExecutor};
use crate::hydrate::{fill_table, Hydrate, RowHydrator};
use crate::mapping::{EntityDef, ProcedureDef, ProcedureKind};
use crate::record::Record;
use crate::registry::{EntityMapping, Registry};
use crate::result::{ResultRow, ResultTable};

/// Metadata-driven mapper between Rust values and SQL Server rows.
#[derive(Default)]
pub struct Mapper {
    registry: Registry,
    executor: Option<Arc<dyn Executor>>,
}

impl Mapper {
    /// A mapper without a database connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// A mapper that runs commands through the given executor.
    pub fn with_executor(executor: Arc<dyn Executor>) -> Self {
        Self {
            registry: Registry::new(),
            executor: Some(executor),
        }
    }

    /// Connect to SQL Server.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let executor = MssqlExecutor::connect(config).await?;
        Ok(Self::with_executor(Arc::new(executor)))
    }

    /// Build a mapper from configuration, registering its entities and
    /// procedures and connecting when a connection is configured.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let mut mapper = match &config.connection {
            Some(conn) => Self::connect(conn).await?,
            None => Self::new(),
        };
        mapper.registry.load_config(config)?;
        Ok(mapper)
    }

    /// Attach or replace the executor.
    pub fn set_executor(&mut self, executor: Arc<dyn Executor>) {
        self.executor = Some(executor);
    }

    pub fn is_connected(&self) -> bool {
        self.executor.is_some()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    fn executor(&self) -> Result<&dyn Executor> {
        self.executor.as_deref().ok_or(MapperError::NotConnected)
    }

    // ===== Entity registration =====

    /// Register a typed entity.
    pub fn register<T: Entity>(&mut self) -> Result<()> {
        self.registry.register(T::definition()).map(|_| ())
    }

    /// Register an entity from its definition.
    pub fn register_definition(&mut self, def: EntityDef) -> Result<()> {
        self.registry.register(def).map(|_| ())
    }

    pub fn is_registered<T: Entity>(&self) -> bool {
        self.registry.is_registered(T::type_key())
    }

    pub fn has_mapped_table<T: Entity>(&self) -> bool {
        self.registry.has_mapped_table(T::type_key())
    }

    /// Hydrate a buffered result into entities.
    pub fn fill<T: Entity>(&self, table: &ResultTable) -> Result<Vec<T>> {
        let mapping = self.registry.mapping(T::type_key())?;
        fill_table(mapping.definition(), table)
    }

    // ===== Commands =====

    /// Execute a command that returns nothing.
    pub async fn non_query(&self, command: &Command) -> Result<u64> {
        self.executor()?.execute(command).await
    }

    /// Execute a command and return its buffered result without hydration.
    pub async fn query_table(&self, command: &Command) -> Result<ResultTable> {
        self.executor()?.query(command).await
    }

    /// Execute a command and pass each raw row to `on_row` as it is read.
    pub async fn query_rows_each<F>(&self, command: &Command, mut on_row: F) -> Result<u64>
    where
        F: FnMut(ResultRow) -> Result<()> + Send,
    {
        self.executor()?.query_each(command, &mut on_row).await
    }

    /// Execute a command and hydrate its buffered result.
    pub async fn query<T: Entity>(&self, command: &Command) -> Result<Vec<T>> {
        let mapping = self.registry.mapping(T::type_key())?;
        self.query_mapping(mapping, command).await
    }

    /// Execute SQL text or a stored procedure by name without parameters.
    pub async fn query_text<T: Entity>(&self, sql: &str, stored_procedure: bool) -> Result<Vec<T>> {
        self.query(&Command::new(sql, stored_procedure)).await
    }

    /// Execute a command and hydrate rows as they are read.
    pub async fn query_stream<T: Entity>(&self, command: &Command) -> Result<Vec<T>> {
        let mapping = self.registry.mapping(T::type_key())?;
        let mut out = Vec::new();
        self.stream_mapping(mapping, command, |item| {
            out.push(item);
            Ok(())
        })
        .await?;
        Ok(out)
    }

    /// Cursor variant of [`Mapper::query_text`].
    pub async fn query_stream_text<T: Entity>(
        &self,
        sql: &str,
        stored_procedure: bool,
    ) -> Result<Vec<T>> {
        self.query_stream(&Command::new(sql, stored_procedure)).await
    }

    /// Load every row of the entity's table.
    pub async fn all<T: Entity>(&self) -> Result<Vec<T>> {
        let mapping = self.registry.table_mapping(T::type_key())?;
        let sql = self.registry.select_sql(T::type_key())?;
        self.query_mapping(mapping, &Command::text(sql)).await
    }

    /// Insert one entity into its table. Returns rows affected.
    pub async fn insert<T: Entity>(&self, entity: &T) -> Result<u64> {
        let key = T::type_key();
        let mapping = self.registry.table_mapping(key)?;
        let command = insert_command(mapping, |property| entity.get_property(property))?;
        self.non_query(&command).await
    }

    // ===== Stored procedures =====

    /// Register a stored procedure.
    pub fn register_procedure(&mut self, def: ProcedureDef) -> Result<()> {
        self.registry.register_procedure(def)
    }

    /// Register a stored procedure whose rows hydrate into `T`, registering
    /// `T` first when needed.
    pub fn register_procedure_for<T: Entity>(&mut self, def: ProcedureDef) -> Result<()> {
        if self.registry.is_procedure_registered(&def.name) {
            return Err(MapperError::ProcedureAlreadyRegistered(def.name));
        }
        if !self.is_registered::<T>() {
            self.register::<T>()?;
        }
        self.registry.register_procedure(def)
    }

    pub fn is_procedure_registered(&self, name: &str) -> bool {
        self.registry.is_procedure_registered(name)
    }

    /// Execute a procedure registered as non-query.
    pub async fn execute_non_query_procedure(
        &self,
        name: &str,
        params: Option<&Params>,
    ) -> Result<u64> {
        let command = self.procedure_command(name, Some(ProcedureKind::NonQuery), params)?;
        self.non_query(&command).await
    }

    /// Execute a procedure registered as scalar and convert its value.
    ///
    /// A NULL or empty result converts to `None` for `Option<T>` and fails
    /// for non-nullable types.
    pub async fn execute_scalar_procedure<T: ColumnValue>(
        &self,
        name: &str,
        params: Option<&Params>,
    ) -> Result<T> {
        let value = self.execute_scalar_value(name, params).await?;
        T::from_value(value)
    }

    /// Execute a procedure registered as scalar and return the raw value.
    pub async fn execute_scalar_value(
        &self,
        name: &str,
        params: Option<&Params>,
    ) -> Result<SqlValue<'static>> {
        let command = self.procedure_command(name, Some(ProcedureKind::Scalar), params)?;
        self.executor()?.scalar(&command).await
    }

    /// Execute a procedure and hydrate its rows into `T`.
    pub async fn execute_procedure<T: Entity>(
        &self,
        name: &str,
        params: Option<&Params>,
    ) -> Result<Vec<T>> {
        let command = self.procedure_command(name, None, params)?;
        let mapping = self.registry.mapping(T::type_key())?;
        self.query_mapping(mapping, &command).await
    }

    fn procedure_command(
        &self,
        name: &str,
        expected: Option<ProcedureKind>,
        params: Option<&Params>,
    ) -> Result<Command> {
        let def = self.registry.procedure(name)?;
        if let Some(expected) = expected {
            if def.kind != expected {
                return Err(MapperError::ProcedureKind {
                    name: name.to_string(),
                    expected,
                    actual: def.kind,
                });
            }
        }
        Command::for_procedure(def, params)
    }

    // ===== Records =====

    /// Load every row of a configured entity's table.
    pub async fn all_records(&self, entity: &str) -> Result<Vec<Record>> {
        let mapping = self.registry.table_mapping(entity)?;
        let sql = self.registry.select_sql(entity)?;
        self.query_mapping(mapping, &Command::text(sql)).await
    }

    /// Insert a record into its entity's table.
    pub async fn insert_record(&self, record: &Record) -> Result<u64> {
        let mapping = self.registry.table_mapping(record.entity())?;
        let command = insert_command(mapping, |property| record.get(property).cloned())?;
        self.non_query(&command).await
    }

    /// Execute a command and hydrate its buffered result into records.
    pub async fn query_records(&self, entity: &str, command: &Command) -> Result<Vec<Record>> {
        let mapping = self.registry.mapping(entity)?;
        self.query_mapping(mapping, command).await
    }

    /// Execute a command and pass each hydrated record to `on_record` as
    /// it is read. Returns the number of records.
    pub async fn query_records_each<F>(
        &self,
        entity: &str,
        command: &Command,
        on_record: F,
    ) -> Result<u64>
    where
        F: FnMut(Record) -> Result<()> + Send,
    {
        let mapping = self.registry.mapping(entity)?;
        self.stream_mapping(mapping, command, on_record).await
    }

    /// Execute a row-returning procedure and hydrate into records.
    pub async fn execute_procedure_records(
        &self,
        name: &str,
        entity: &str,
        params: Option<&Params>,
    ) -> Result<Vec<Record>> {
        let command = self.procedure_command(name, None, params)?;
        let mapping = self.registry.mapping(entity)?;
        self.query_mapping(mapping, &command).await
    }

    // ===== Shared paths =====

    async fn query_mapping<T: Hydrate>(
        &self,
        mapping: &EntityMapping,
        command: &Command,
    ) -> Result<Vec<T>> {
        let table = self.executor()?.query(command).await?;
        debug!(
            "Hydrating {} rows into {}",
            table.len(),
            mapping.definition().name
        );
        fill_table(mapping.definition(), &table)
    }

    async fn stream_mapping<T, F>(
        &self,
        mapping: &EntityMapping,
        command: &Command,
        mut on_item: F,
    ) -> Result<u64>
    where
        T: Hydrate,
        F: FnMut(T) -> Result<()> + Send,
    {
        let executor = self.executor()?;
        let mut hydrator = RowHydrator::new(mapping.definition());
        let mut sink = |row: ResultRow| on_item(hydrator.hydrate(row)?);
        executor.query_each(command, &mut sink).await
    }
}

/// Build the insert command for one instance from the cached statement.
fn insert_command<F>(mapping: &EntityMapping, mut get: F) -> Result<Command>
where
    F: FnMut(&str) -> Option<SqlValue<'static>>,
{
    let def = mapping.definition();
    let sql = mapping
        .insert_sql()
        .ok_or_else(|| MapperError::NoMappedTable(def.name.clone()))?;

    let mut command = Command::text(sql);
    for insert in mapping.insert_columns() {
        let col = &insert.column;
        let db_type = col.db_type.ok_or_else(|| MapperError::MissingColumnType {
            entity: def.name.clone(),
            column: col.column.clone(),
        })?;
        let value = get(&col.property).unwrap_or(SqlValue::Null(db_type.null_type()));
        command.add_parameter(&insert.param, db_type, col.effective_length(), value)?;
    }
    Ok(command)
}
