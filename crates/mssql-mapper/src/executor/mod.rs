//! Database client seam.
//!
//! The mapper never talks to the wire itself. It renders [`Command`]s and
//! hands them to an [`Executor`], which returns buffered tables or feeds
//! rows to a sink as they arrive.

mod mssql;

pub use mssql::MssqlExecutor;

use async_trait::async_trait;

use crate::command::Command;
use crate::core::value::{SqlNullType, SqlValue};
use crate::error::Result;
use crate::result::{ResultRow, ResultTable};

/// Receives rows from a forward-only cursor, one at a time.
///
/// Returning an error stops reading and fails the query with that error.
pub type RowSink<'a> = dyn FnMut(ResultRow) -> Result<()> + Send + 'a;

/// Executes commands against a database.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Execute a command and return the number of rows affected.
    async fn execute(&self, command: &Command) -> Result<u64>;

    /// Execute a command and buffer its first result set.
    async fn query(&self, command: &Command) -> Result<ResultTable>;

    /// Execute a command and feed the rows of its first result set to `sink`.
    ///
    /// Returns the number of rows delivered.
    async fn query_each(&self, command: &Command, sink: &mut RowSink<'_>) -> Result<u64>;

    /// First column of the first row, or NULL when the result is empty.
    async fn scalar(&self, command: &Command) -> Result<SqlValue<'static>> {
        let table = self.query(command).await?;
        Ok(table
            .first_value()
            .cloned()
            .unwrap_or(SqlValue::Null(SqlNullType::String)))
    }

    /// Check that the database is reachable.
    async fn ping(&self) -> Result<()>;
}
