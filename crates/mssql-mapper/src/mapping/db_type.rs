//! SQL Server type vocabulary for columns and parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::convert::SqlType;
use crate::core::value::{SqlNullType, SqlValue};
use crate::error::{MapperError, Result};

/// Largest length SQL Server stores in-row for single-byte types.
const MAX_BYTE_LENGTH: u32 = 8000;

/// Largest length SQL Server stores in-row for Unicode types.
const MAX_UNICODE_LENGTH: u32 = 4000;

/// Default and maximum fractional-second precision for time types.
const MAX_TIME_PRECISION: u32 = 7;

const DEFAULT_DECIMAL_SCALE: u32 = 18;
const MAX_DECIMAL_SCALE: u32 = 38;

/// SQL Server data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    BigInt,
    Binary,
    Bit,
    Char,
    Date,
    DateTime,
    DateTime2,
    DateTimeOffset,
    Decimal,
    Float,
    Image,
    Int,
    Money,
    NChar,
    NText,
    NVarChar,
    Real,
    SmallDateTime,
    SmallInt,
    SmallMoney,
    Structured,
    Text,
    Time,
    Timestamp,
    TinyInt,
    Udt,
    UniqueIdentifier,
    VarBinary,
    VarChar,
    Variant,
    Xml,
}

const ALL: [DbType; 31] = [
    DbType::BigInt,
    DbType::Binary,
    DbType::Bit,
    DbType::Char,
    DbType::Date,
    DbType::DateTime,
    DbType::DateTime2,
    DbType::DateTimeOffset,
    DbType::Decimal,
    DbType::Float,
    DbType::Image,
    DbType::Int,
    DbType::Money,
    DbType::NChar,
    DbType::NText,
    DbType::NVarChar,
    DbType::Real,
    DbType::SmallDateTime,
    DbType::SmallInt,
    DbType::SmallMoney,
    DbType::Structured,
    DbType::Text,
    DbType::Time,
    DbType::Timestamp,
    DbType::TinyInt,
    DbType::Udt,
    DbType::UniqueIdentifier,
    DbType::VarBinary,
    DbType::VarChar,
    DbType::Variant,
    DbType::Xml,
];

impl DbType {
    /// SQL keyword for this type.
    pub fn sql_name(&self) -> &'static str {
        match self {
            DbType::BigInt => "BIGINT",
            DbType::Binary => "BINARY",
            DbType::Bit => "BIT",
            DbType::Char => "CHAR",
            DbType::Date => "DATE",
            DbType::DateTime => "DATETIME",
            DbType::DateTime2 => "DATETIME2",
            DbType::DateTimeOffset => "DATETIMEOFFSET",
            DbType::Decimal => "DECIMAL",
            DbType::Float => "FLOAT",
            DbType::Image => "IMAGE",
            DbType::Int => "INT",
            DbType::Money => "MONEY",
            DbType::NChar => "NCHAR",
            DbType::NText => "NTEXT",
            DbType::NVarChar => "NVARCHAR",
            DbType::Real => "REAL",
            DbType::SmallDateTime => "SMALLDATETIME",
            DbType::SmallInt => "SMALLINT",
            DbType::SmallMoney => "SMALLMONEY",
            DbType::Structured => "STRUCTURED",
            DbType::Text => "TEXT",
            DbType::Time => "TIME",
            DbType::Timestamp => "TIMESTAMP",
            DbType::TinyInt => "TINYINT",
            DbType::Udt => "UDT",
            DbType::UniqueIdentifier => "UNIQUEIDENTIFIER",
            DbType::VarBinary => "VARBINARY",
            DbType::VarChar => "VARCHAR",
            DbType::Variant => "SQL_VARIANT",
            DbType::Xml => "XML",
        }
    }

    /// Type text used to declare a parameter variable of this type.
    ///
    /// A length of zero counts as no length. Fixed-length character and
    /// binary types without a length are declared as their `(MAX)` varying
    /// form. For `Decimal` the length is the scale (default 18, at most 38);
    /// precision is always 38, so a scale of `s` leaves `38 - s` integer
    /// digits and extra fractional digits are rounded by the server.
    pub fn declaration(&self, length: Option<u32>) -> Result<String> {
        let length = length.filter(|l| *l > 0);

        let sized = |limit: u32| match length {
            Some(l) if l <= limit => format!("{}({})", self.sql_name(), l),
            _ => format!("{}(MAX)", self.sql_name()),
        };
        // A bare CHAR or BINARY variable holds one character.
        let fixed = |limit: u32, unsized_form: &str| match length {
            Some(l) => format!("{}({})", self.sql_name(), l.min(limit)),
            None => unsized_form.to_string(),
        };
        let precision = || {
            let p = length.unwrap_or(MAX_TIME_PRECISION).min(MAX_TIME_PRECISION);
            format!("{}({})", self.sql_name(), p)
        };

        let text = match self {
            DbType::VarChar | DbType::VarBinary => sized(MAX_BYTE_LENGTH),
            DbType::NVarChar => sized(MAX_UNICODE_LENGTH),
            DbType::Char => fixed(MAX_BYTE_LENGTH, "VARCHAR(MAX)"),
            DbType::Binary => fixed(MAX_BYTE_LENGTH, "VARBINARY(MAX)"),
            DbType::NChar => fixed(MAX_UNICODE_LENGTH, "NVARCHAR(MAX)"),
            DbType::DateTime2 | DbType::DateTimeOffset | DbType::Time => precision(),
            DbType::Decimal => {
                let scale = length.unwrap_or(DEFAULT_DECIMAL_SCALE).min(MAX_DECIMAL_SCALE);
                format!("DECIMAL(38, {})", scale)
            }
            // LOB types are not valid for local variables.
            DbType::Text => "VARCHAR(MAX)".to_string(),
            DbType::NText => "NVARCHAR(MAX)".to_string(),
            DbType::Image => "VARBINARY(MAX)".to_string(),
            DbType::Timestamp => "BINARY(8)".to_string(),
            DbType::Structured | DbType::Udt => return Err(MapperError::UnsupportedType(*self)),
            other => other.sql_name().to_string(),
        };
        Ok(text)
    }

    /// NULL hint used when a parameter of this type is bound as NULL.
    pub fn null_type(&self) -> SqlNullType {
        match self {
            DbType::BigInt => SqlNullType::I64,
            DbType::Int => SqlNullType::I32,
            DbType::SmallInt => SqlNullType::I16,
            DbType::TinyInt => SqlNullType::U8,
            DbType::Bit => SqlNullType::Bool,
            DbType::Float => SqlNullType::F64,
            DbType::Real => SqlNullType::F32,
            DbType::Decimal | DbType::Money | DbType::SmallMoney => SqlNullType::Decimal,
            DbType::UniqueIdentifier => SqlNullType::Uuid,
            DbType::Date => SqlNullType::Date,
            DbType::Time => SqlNullType::Time,
            DbType::DateTime | DbType::DateTime2 | DbType::SmallDateTime => SqlNullType::DateTime,
            DbType::DateTimeOffset => SqlNullType::DateTimeOffset,
            DbType::Binary | DbType::VarBinary | DbType::Image | DbType::Timestamp => {
                SqlNullType::Bytes
            }
            _ => SqlNullType::String,
        }
    }

    /// Parse a textual value into a value of this type.
    ///
    /// `NULL` (any case) parses to a typed NULL.
    pub fn parse_value(&self, text: &str) -> Result<SqlValue<'static>> {
        if text.eq_ignore_ascii_case("null") {
            return Ok(SqlValue::Null(self.null_type()));
        }
        let raw = SqlValue::text_owned(text.to_string());
        self.coerce(raw)
    }

    /// Convert a value to the Rust representation this type binds with.
    pub fn coerce(&self, value: SqlValue<'static>) -> Result<SqlValue<'static>> {
        if value.is_null() {
            return Ok(SqlValue::Null(self.null_type()));
        }
        let coerced = match self.null_type() {
            SqlNullType::Bool => bool::from_sql_value(value)?.to_sql_value(),
            SqlNullType::U8 => u8::from_sql_value(value)?.to_sql_value(),
            SqlNullType::I16 => i16::from_sql_value(value)?.to_sql_value(),
            SqlNullType::I32 => i32::from_sql_value(value)?.to_sql_value(),
            SqlNullType::I64 => i64::from_sql_value(value)?.to_sql_value(),
            SqlNullType::F32 => f32::from_sql_value(value)?.to_sql_value(),
            SqlNullType::F64 => f64::from_sql_value(value)?.to_sql_value(),
            SqlNullType::Decimal => rust_decimal::Decimal::from_sql_value(value)?.to_sql_value(),
            SqlNullType::Uuid => uuid::Uuid::from_sql_value(value)?.to_sql_value(),
            SqlNullType::Date => chrono::NaiveDate::from_sql_value(value)?.to_sql_value(),
            SqlNullType::Time => chrono::NaiveTime::from_sql_value(value)?.to_sql_value(),
            SqlNullType::DateTime => chrono::NaiveDateTime::from_sql_value(value)?.to_sql_value(),
            SqlNullType::DateTimeOffset => {
                chrono::DateTime::<chrono::FixedOffset>::from_sql_value(value)?.to_sql_value()
            }
            SqlNullType::Bytes => match value {
                SqlValue::Text(text) => decode_hex(&text)?,
                other => Vec::<u8>::from_sql_value(other)?.to_sql_value(),
            },
            SqlNullType::String => String::from_sql_value(value)?.to_sql_value(),
        };
        Ok(coerced)
    }
}

/// Decode `0x`-prefixed or bare hex text into bytes.
fn decode_hex(text: &str) -> Result<SqlValue<'static>> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(digits)
        .map_err(|_| MapperError::conversion("Vec<u8>", format!("Text '{}'", text)))?;
    Ok(SqlValue::bytes_owned(bytes))
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

impl FromStr for DbType {
    type Err = MapperError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        ALL.iter()
            .copied()
            .find(|t| {
                t.sql_name().eq_ignore_ascii_case(wanted)
                    || format!("{:?}", t).eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| MapperError::Config(format!("unknown SQL type '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_lengths() {
        assert_eq!(DbType::NVarChar.declaration(Some(50)).unwrap(), "NVARCHAR(50)");
        assert_eq!(DbType::NVarChar.declaration(None).unwrap(), "NVARCHAR(MAX)");
        assert_eq!(DbType::NVarChar.declaration(Some(0)).unwrap(), "NVARCHAR(MAX)");
        assert_eq!(DbType::NVarChar.declaration(Some(4001)).unwrap(), "NVARCHAR(MAX)");
        assert_eq!(DbType::VarChar.declaration(Some(8000)).unwrap(), "VARCHAR(8000)");
        assert_eq!(DbType::NChar.declaration(Some(10)).unwrap(), "NCHAR(10)");
        assert_eq!(DbType::Char.declaration(Some(3)).unwrap(), "CHAR(3)");
        assert_eq!(DbType::Char.declaration(Some(9000)).unwrap(), "CHAR(8000)");
        assert_eq!(DbType::Int.declaration(Some(50)).unwrap(), "INT");
    }

    #[test]
    fn test_unsized_fixed_types_keep_whole_value() {
        assert_eq!(DbType::Char.declaration(None).unwrap(), "VARCHAR(MAX)");
        assert_eq!(DbType::NChar.declaration(None).unwrap(), "NVARCHAR(MAX)");
        assert_eq!(DbType::Binary.declaration(None).unwrap(), "VARBINARY(MAX)");
        assert_eq!(DbType::Binary.declaration(Some(0)).unwrap(), "VARBINARY(MAX)");
    }

    #[test]
    fn test_decimal_length_is_scale() {
        assert_eq!(DbType::Decimal.declaration(None).unwrap(), "DECIMAL(38, 18)");
        assert_eq!(DbType::Decimal.declaration(Some(4)).unwrap(), "DECIMAL(38, 4)");
        assert_eq!(DbType::Decimal.declaration(Some(50)).unwrap(), "DECIMAL(38, 38)");
    }

    #[test]
    fn test_declaration_precision_types() {
        assert_eq!(DbType::DateTime2.declaration(Some(7)).unwrap(), "DATETIME2(7)");
        assert_eq!(DbType::DateTime2.declaration(Some(3)).unwrap(), "DATETIME2(3)");
        assert_eq!(DbType::DateTime2.declaration(None).unwrap(), "DATETIME2(7)");
        assert_eq!(DbType::Time.declaration(Some(12)).unwrap(), "TIME(7)");
    }

    #[test]
    fn test_declaration_substitutes_lob_types() {
        assert_eq!(DbType::NText.declaration(None).unwrap(), "NVARCHAR(MAX)");
        assert_eq!(DbType::Image.declaration(None).unwrap(), "VARBINARY(MAX)");
        assert_eq!(DbType::Variant.declaration(None).unwrap(), "SQL_VARIANT");
    }

    #[test]
    fn test_declaration_rejects_undeclarable_types() {
        assert!(matches!(
            DbType::Structured.declaration(None),
            Err(MapperError::UnsupportedType(DbType::Structured))
        ));
        assert!(DbType::Udt.declaration(None).is_err());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("nvarchar".parse::<DbType>().unwrap(), DbType::NVarChar);
        assert_eq!("DateTime2".parse::<DbType>().unwrap(), DbType::DateTime2);
        assert_eq!("sql_variant".parse::<DbType>().unwrap(), DbType::Variant);
        assert_eq!("Variant".parse::<DbType>().unwrap(), DbType::Variant);
        assert!("varchar2".parse::<DbType>().is_err());
    }

    #[test]
    fn test_deserialize_lowercase() {
        let t: DbType = serde_yaml::from_str("uniqueidentifier").unwrap();
        assert_eq!(t, DbType::UniqueIdentifier);
        let t: DbType = serde_yaml::from_str("datetime2").unwrap();
        assert_eq!(t, DbType::DateTime2);
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(DbType::Int.parse_value("15").unwrap(), SqlValue::I32(15));
        assert_eq!(
            DbType::Int.parse_value("NULL").unwrap(),
            SqlValue::Null(SqlNullType::I32)
        );
        assert_eq!(
            DbType::NVarChar.parse_value("Buckingham Fountain").unwrap(),
            SqlValue::from("Buckingham Fountain").into_owned()
        );
        assert_eq!(
            DbType::VarBinary.parse_value("0xDEAD").unwrap(),
            SqlValue::bytes_owned(vec![0xde, 0xad])
        );
        assert_eq!(
            DbType::Binary.parse_value("beef").unwrap(),
            SqlValue::bytes_owned(vec![0xbe, 0xef])
        );
        assert!(DbType::VarBinary.parse_value("0xABC").is_err());
        assert!(DbType::VarBinary.parse_value("0xZZ").is_err());
        assert!(DbType::Int.parse_value("abc").is_err());
        assert!(DbType::TinyInt.parse_value("300").is_err());
    }
}
