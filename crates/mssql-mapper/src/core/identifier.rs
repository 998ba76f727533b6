//! Identifier validation and quoting for generated SQL.
//!
//! Table, column and procedure names cannot be sent as parameters, so every
//! statement the registry builds splices them into the SQL text. They are
//! validated and bracket-quoted here first.
//!
//! Parameter names are a separate concern: they become T-SQL local variables
//! and must be plain `@name` tokens.

use crate::error::{MapperError, Result};

/// Maximum identifier length accepted by SQL Server (sysname).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes
/// - Identifiers exceeding maximum length
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MapperError::InvalidIdentifier(
            "identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MapperError::InvalidIdentifier(format!(
            "identifier contains null byte: {:?}",
            name
        )));
    }

    if name.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(MapperError::InvalidIdentifier(format!(
            "identifier exceeds maximum length of {} characters: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }

    Ok(())
}

/// Quote a SQL Server identifier using brackets.
///
/// Escapes closing brackets by doubling them and wraps in brackets.
///
/// ```ignore
/// assert_eq!(quote_mssql("users")?, "[users]");
/// assert_eq!(quote_mssql("table]name")?, "[table]]name]");
/// ```
pub fn quote_mssql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("[{}]", name.replace(']', "]]")))
}

/// Quote a possibly multi-part name such as `dbo.Stations`.
///
/// Each dot-separated part is quoted on its own. Parts that are already
/// bracket-quoted are unwrapped first, so `[dbo].[Stations]` round-trips
/// unchanged and a dot inside brackets stays part of the name.
pub fn quote_multipart(name: &str) -> Result<String> {
    let parts = split_multipart(name)?;
    let quoted = parts
        .iter()
        .map(|p| quote_mssql(p))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join("."))
}

fn split_multipart(name: &str) -> Result<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = name.chars().peekable();
    let mut in_brackets = false;

    while let Some(c) = chars.next() {
        match c {
            '[' if !in_brackets && current.is_empty() => in_brackets = true,
            ']' if in_brackets => {
                if chars.peek() == Some(&']') {
                    chars.next();
                    current.push(']');
                } else {
                    in_brackets = false;
                }
            }
            '.' if !in_brackets => parts.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if in_brackets {
        return Err(MapperError::InvalidIdentifier(format!(
            "unterminated bracket in {:?}",
            name
        )));
    }
    parts.push(current);
    Ok(parts)
}

/// Validate a parameter name and normalize it to start with `@`.
///
/// Parameter names become local variables in the rendered batch, so they
/// must be `@` followed by a letter or underscore and then letters, digits
/// or underscores. Names of the form `@P<digits>` are reserved for the
/// driver's positional placeholders.
pub fn normalize_parameter_name(name: &str) -> Result<String> {
    let bare = name.strip_prefix('@').unwrap_or(name);
    validate_identifier(bare)?;

    let mut chars = bare.chars();
    let first_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !first_ok || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(MapperError::InvalidIdentifier(format!(
            "parameter name must be @ followed by letters, digits or underscores: {:?}",
            name
        )));
    }

    if is_positional_placeholder(bare) {
        return Err(MapperError::InvalidIdentifier(format!(
            "parameter name {:?} collides with positional placeholders",
            name
        )));
    }

    Ok(format!("@{}", bare))
}

fn is_positional_placeholder(bare: &str) -> bool {
    let mut chars = bare.chars();
    matches!(chars.next(), Some('P' | 'p'))
        && !bare[1..].is_empty()
        && bare[1..].chars().all(|c| c.is_ascii_digit())
}

/// Derive the parameter name used for a column in generated statements.
///
/// Characters outside `[A-Za-z0-9_]` become `_`, and a leading digit gets an
/// underscore prefix.
pub fn parameter_name_for_column(column: &str) -> String {
    let mut name: String = column
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) || is_positional_placeholder(&name) {
        name.insert(0, '_');
    }
    format!("@{}", name)
}
