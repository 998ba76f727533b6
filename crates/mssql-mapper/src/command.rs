//! SQL commands and parameter binding.
//!
//! The driver only knows positional placeholders (`@P1`, `@P2`, ...), while
//! mapped statements and stored procedures use named parameters. A
//! [`Command`] therefore renders to a batch that declares each named
//! parameter as a local variable with its SQL type and length, assigns it
//! from the matching placeholder, and then runs the statement.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::core::identifier::{normalize_parameter_name, quote_multipart};
use crate::core::value::SqlValue;
use crate::error::Result;
use crate::mapping::{DbType, ProcedureDef};

/// Named parameter values supplied by the caller.
pub type Params = HashMap<String, SqlValue<'static>>;

/// How the command text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandKind {
    /// Plain SQL batch.
    #[default]
    Text,
    /// Name of a stored procedure.
    StoredProcedure,
}

/// A bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Name including the leading `@`.
    pub name: String,
    pub db_type: DbType,
    pub length: Option<u32>,
    pub value: SqlValue<'static>,
}

/// A SQL command with its parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Command {
    pub text: String,
    pub kind: CommandKind,
    pub parameters: Vec<Parameter>,
}

/// Batch text plus positional values, ready for the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCommand {
    pub sql: String,
    pub values: Vec<SqlValue<'static>>,
}

impl Command {
    /// A plain SQL command.
    pub fn text(sql: impl Into<String>) -> Self {
        Self {
            text: sql.into(),
            kind: CommandKind::Text,
            parameters: Vec::new(),
        }
    }

    /// A stored procedure call.
    pub fn stored_procedure(name: impl Into<String>) -> Self {
        Self {
            text: name.into(),
            kind: CommandKind::StoredProcedure,
            parameters: Vec::new(),
        }
    }

    /// Create a command of the given kind.
    pub fn new(text: impl Into<String>, stored_procedure: bool) -> Self {
        if stored_procedure {
            Self::stored_procedure(text)
        } else {
            Self::text(text)
        }
    }

    /// Add a parameter. NULL values are retyped to match `db_type`.
    pub fn add_parameter(
        &mut self,
        name: &str,
        db_type: DbType,
        length: Option<u32>,
        value: SqlValue<'static>,
    ) -> Result<&mut Self> {
        let name = normalize_parameter_name(name)?;
        let value = if value.is_null() {
            SqlValue::Null(db_type.null_type())
        } else {
            value
        };
        self.parameters.push(Parameter {
            name,
            db_type,
            length: length.filter(|l| *l > 0),
            value,
        });
        Ok(self)
    }

    /// Add a parameter, builder style.
    pub fn with_parameter(
        mut self,
        name: &str,
        db_type: DbType,
        length: Option<u32>,
        value: impl Into<SqlValue<'static>>,
    ) -> Result<Self> {
        self.add_parameter(name, db_type, length, value.into())?;
        Ok(self)
    }

    /// Build a stored procedure call from its registration.
    ///
    /// Every registered parameter is bound. A supplied value is bound with
    /// the registered length, a missing one as NULL. Supplied names the
    /// procedure does not declare are ignored.
    pub fn for_procedure(def: &ProcedureDef, params: Option<&Params>) -> Result<Self> {
        let mut cmd = Self::stored_procedure(def.name.clone());
        for param in &def.params {
            match params.and_then(|p| lookup(p, &param.name)) {
                Some(value) => {
                    cmd.add_parameter(&param.name, param.db_type, param.length, value.clone())?;
                }
                None => {
                    cmd.add_parameter(
                        &param.name,
                        param.db_type,
                        None,
                        SqlValue::Null(param.db_type.null_type()),
                    )?;
                }
            }
        }
        Ok(cmd)
    }

    /// Render the batch sent to the server.
    pub fn render(&self) -> Result<RenderedCommand> {
        let mut sql = String::new();
        let mut values = Vec::with_capacity(self.parameters.len());

        for (i, p) in self.parameters.iter().enumerate() {
            let decl = p.db_type.declaration(p.length)?;
            let _ = writeln!(sql, "DECLARE {} {} = @P{};", p.name, decl, i + 1);
            values.push(p.value.clone());
        }

        match self.kind {
            CommandKind::Text => sql.push_str(&self.text),
            CommandKind::StoredProcedure => {
                let _ = write!(sql, "EXEC {}", quote_multipart(&self.text)?);
                let args: Vec<String> = self
                    .parameters
                    .iter()
                    .map(|p| format!("{0} = {0}", p.name))
                    .collect();
                if !args.is_empty() {
                    sql.push(' ');
                    sql.push_str(&args.join(", "));
                }
                sql.push(';');
            }
        }

        Ok(RenderedCommand { sql, values })
    }
}

fn lookup<'p>(params: &'p Params, name: &str) -> Option<&'p SqlValue<'static>> {
    if let Some(v) = params.get(name) {
        return Some(v);
    }
    match name.strip_prefix('@') {
        Some(bare) => params.get(bare),
        None => params.get(&format!("@{}", name)),
    }
}
