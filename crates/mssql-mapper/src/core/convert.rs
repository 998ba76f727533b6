//! Conversions between Rust property types and [`SqlValue`].
//!
//! [`SqlType`] covers the scalar types a column can hold. [`ColumnValue`] is
//! what entity properties implement: every `SqlType` `T` is a non-nullable
//! column value and `Option<T>` is its nullable counterpart.
//!
//! Conversions are lenient. A value read as `I64` assigns to an `i32`
//! property when it fits, numbers format into `String`, strings parse into
//! numbers, UUIDs and timestamps, and a date widens to midnight.

use std::borrow::Cow;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::value::{SqlNullType, SqlValue};
use crate::error::{MapperError, Result};

/// A scalar Rust type that maps onto a single SQL value.
pub trait SqlType: Sized {
    /// Name used in conversion errors.
    const NAME: &'static str;

    /// NULL hint used when the value is absent.
    const NULL_TYPE: SqlNullType;

    /// Convert into a SQL value.
    fn to_sql_value(&self) -> SqlValue<'static>;

    /// Convert from a non-NULL SQL value.
    fn from_sql_value(value: SqlValue<'static>) -> Result<Self>;
}

/// A property type that can be mapped to a column.
pub trait ColumnValue: Sized {
    /// Whether the property can hold NULL.
    const NULLABLE: bool;

    /// NULL hint used when the property is empty.
    const NULL_TYPE: SqlNullType;

    /// Read the property as a SQL value.
    fn to_value(&self) -> SqlValue<'static>;

    /// Build the property from a SQL value.
    fn from_value(value: SqlValue<'static>) -> Result<Self>;
}

macro_rules! impl_column_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ColumnValue for $ty {
                const NULLABLE: bool = false;
                const NULL_TYPE: SqlNullType = <$ty as SqlType>::NULL_TYPE;

                fn to_value(&self) -> SqlValue<'static> {
                    self.to_sql_value()
                }

                fn from_value(value: SqlValue<'static>) -> Result<Self> {
                    if value.is_null() {
                        return Err(MapperError::NullValue(<$ty as SqlType>::NAME));
                    }
                    <$ty as SqlType>::from_sql_value(value)
                }
            }

            impl ColumnValue for Option<$ty> {
                const NULLABLE: bool = true;
                const NULL_TYPE: SqlNullType = <$ty as SqlType>::NULL_TYPE;

                fn to_value(&self) -> SqlValue<'static> {
                    match self {
                        Some(v) => v.to_sql_value(),
                        None => SqlValue::Null(<$ty as SqlType>::NULL_TYPE),
                    }
                }

                fn from_value(value: SqlValue<'static>) -> Result<Self> {
                    if value.is_null() {
                        return Ok(None);
                    }
                    <$ty as SqlType>::from_sql_value(value).map(Some)
                }
            }
        )*
    };
}

impl_column_value!(
    bool,
    u8,
    i16,
    i32,
    i64,
    f32,
    f64,
    String,
    Vec<u8>,
    Uuid,
    Decimal,
    NaiveDateTime,
    NaiveDate,
    NaiveTime,
    DateTime<FixedOffset>,
);

fn mismatch<T: SqlType>(value: &SqlValue<'_>) -> MapperError {
    MapperError::conversion(T::NAME, value.kind())
}

fn parse_text<T: SqlType, V: std::str::FromStr>(text: &str) -> Result<V> {
    text.trim()
        .parse::<V>()
        .map_err(|_| MapperError::conversion(T::NAME, format!("Text '{}'", text)))
}

/// Widen any integer variant to i128 so range checks happen in one place.
fn as_integer(value: &SqlValue<'_>) -> Option<i128> {
    match value {
        SqlValue::Bool(v) => Some(i128::from(*v)),
        SqlValue::U8(v) => Some(i128::from(*v)),
        SqlValue::I16(v) => Some(i128::from(*v)),
        SqlValue::I32(v) => Some(i128::from(*v)),
        SqlValue::I64(v) => Some(i128::from(*v)),
        SqlValue::Decimal(d) if d.fract().is_zero() => d.to_i128(),
        _ => None,
    }
}

macro_rules! impl_integer {
    ($ty:ty, $name:literal, $null:ident, $variant:ident) => {
        impl SqlType for $ty {
            const NAME: &'static str = $name;
            const NULL_TYPE: SqlNullType = SqlNullType::$null;

            fn to_sql_value(&self) -> SqlValue<'static> {
                SqlValue::$variant(*self)
            }

            fn from_sql_value(value: SqlValue<'static>) -> Result<Self> {
                if let SqlValue::Text(ref text) = value {
                    return parse_text::<Self, Self>(text);
                }
                as_integer(&value)
                    .and_then(|v| <$ty>::try_from(v).ok())
                    .ok_or_else(|| mismatch::<Self>(&value))
            }
        }
    };
}

impl_integer!(u8, "u8", U8, U8);
impl_integer!(i16, "i16", I16, I16);
impl_integer!(i32, "i32", I32, I32);
impl_integer!(i64, "i64", I64, I64);

impl SqlType for bool {
    const NAME: &'static str = "bool";
    const NULL_TYPE: SqlNullType = SqlNullType::Bool;

    fn to_sql_value(&self) -> SqlValue<'static> {
        SqlValue::Bool(*self)
    }

    fn from_sql_value(value: SqlValue<'static>) -> Result<Self> {
        match value {
            SqlValue::Bool(v) => Ok(v),
            SqlValue::Text(ref text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(mismatch::<Self>(&value)),
            },
            ref other => match as_integer(other) {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                _ => Err(mismatch::<Self>(other)),
            },
        }
    }
}

impl SqlType for f64 {
    const NAME: &'static str = "f64";
    const NULL_TYPE: SqlNullType = SqlNullType::F64;

    fn to_sql_value(&self) -> SqlValue<'static> {
        SqlValue::F64(*self)
    }

    fn from_sql_value(value: SqlValue<'static>) -> Result<Self> {
        match value {
            SqlValue::F64(v) => Ok(v),
            SqlValue::F32(v) => Ok(f64::from(v)),
            SqlValue::Decimal(d) => d.to_f64().ok_or_else(|| mismatch::<Self>(&value)),
            SqlValue::Text(ref text) => parse_text::<Self, Self>(text),
            ref other => as_integer(other)
                .map(|v| v as f64)
                .ok_or_else(|| mismatch::<Self>(other)),
        }
    }
}

impl SqlType for f32 {
    const NAME: &'static str = "f32";
    const NULL_TYPE: SqlNullType = SqlNullType::F32;

    fn to_sql_value(&self) -> SqlValue<'static> {
        SqlValue::F32(*self)
    }

    fn from_sql_value(value: SqlValue<'static>) -> Result<Self> {
        match value {
            SqlValue::F32(v) => Ok(v),
            SqlValue::Text(ref text) => parse_text::<Self, Self>(text),
            other => f64::from_sql_value(other).map(|v| v as f32),
        }
    }
}

impl SqlType for Decimal {
    const NAME: &'static str = "Decimal";
    const NULL_TYPE: SqlNullType = SqlNullType::Decimal;

    fn to_sql_value(&self) -> SqlValue<'static> {
        SqlValue::Decimal(*self)
    }

    fn from_sql_value(value: SqlValue<'static>) -> Result<Self> {
        match value {
            SqlValue::Decimal(d) => Ok(d),
            SqlValue::F64(v) => Decimal::from_f64(v).ok_or_else(|| mismatch::<Self>(&value)),
            SqlValue::F32(v) => Decimal::from_f32(v).ok_or_else(|| mismatch::<Self>(&value)),
            SqlValue::Text(ref text) => parse_text::<Self, Self>(text),
            ref other => as_integer(other)
                .and_then(Decimal::from_i128)
                .ok_or_else(|| mismatch::<Self>(other)),
        }
    }
}

impl SqlType for String {
    const NAME: &'static str = "String";
    const NULL_TYPE: SqlNullType = SqlNullType::String;

    fn to_sql_value(&self) -> SqlValue<'static> {
        SqlValue::Text(Cow::Owned(self.clone()))
    }

    fn from_sql_value(value: SqlValue<'static>) -> Result<Self> {
        match value {
            SqlValue::Text(text) => Ok(text.into_owned()),
            SqlValue::Bytes(bytes) => String::from_utf8(bytes.into_owned())
                .map_err(|_| MapperError::conversion(Self::NAME, "Bytes (invalid UTF-8)")),
            other => Ok(other.to_string()),
        }
    }
}

impl SqlType for Vec<u8> {
    const NAME: &'static str = "Vec<u8>";
    const NULL_TYPE: SqlNullType = SqlNullType::Bytes;

    fn to_sql_value(&self) -> SqlValue<'static> {
        SqlValue::Bytes(Cow::Owned(self.clone()))
    }

    fn from_sql_value(value: SqlValue<'static>) -> Result<Self> {
        match value {
            SqlValue::Bytes(bytes) => Ok(bytes.into_owned()),
            SqlValue::Text(text) => Ok(text.into_owned().into_bytes()),
            SqlValue::Uuid(u) => Ok(u.as_bytes().to_vec()),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl SqlType for Uuid {
    const NAME: &'static str = "Uuid";
    const NULL_TYPE: SqlNullType = SqlNullType::Uuid;

    fn to_sql_value(&self) -> SqlValue<'static> {
        SqlValue::Uuid(*self)
    }

    fn from_sql_value(value: SqlValue<'static>) -> Result<Self> {
        match value {
            SqlValue::Uuid(u) => Ok(u),
            SqlValue::Text(ref text) => parse_text::<Self, Self>(text),
            SqlValue::Bytes(ref bytes) => {
                Uuid::from_slice(bytes).map_err(|_| mismatch::<Self>(&value))
            }
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl SqlType for NaiveDateTime {
    const NAME: &'static str = "NaiveDateTime";
    const NULL_TYPE: SqlNullType = SqlNullType::DateTime;

    fn to_sql_value(&self) -> SqlValue<'static> {
        SqlValue::DateTime(*self)
    }

    fn from_sql_value(value: SqlValue<'static>) -> Result<Self> {
        match value {
            SqlValue::DateTime(v) => Ok(v),
            SqlValue::DateTimeOffset(v) => Ok(v.naive_local()),
            SqlValue::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            SqlValue::Text(ref text) => parse_text::<Self, Self>(text)
                .or_else(|_| parse_text::<Self, NaiveDate>(text).map(|d| d.and_time(NaiveTime::MIN))),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl SqlType for NaiveDate {
    const NAME: &'static str = "NaiveDate";
    const NULL_TYPE: SqlNullType = SqlNullType::Date;

    fn to_sql_value(&self) -> SqlValue<'static> {
        SqlValue::Date(*self)
    }

    fn from_sql_value(value: SqlValue<'static>) -> Result<Self> {
        match value {
            SqlValue::Date(d) => Ok(d),
            SqlValue::DateTime(v) => Ok(v.date()),
            SqlValue::DateTimeOffset(v) => Ok(v.naive_local().date()),
            SqlValue::Text(ref text) => parse_text::<Self, Self>(text),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl SqlType for NaiveTime {
    const NAME: &'static str = "NaiveTime";
    const NULL_TYPE: SqlNullType = SqlNullType::Time;

    fn to_sql_value(&self) -> SqlValue<'static> {
        SqlValue::Time(*self)
    }

    fn from_sql_value(value: SqlValue<'static>) -> Result<Self> {
        match value {
            SqlValue::Time(t) => Ok(t),
            SqlValue::DateTime(v) => Ok(v.time()),
            SqlValue::Text(ref text) => parse_text::<Self, Self>(text),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

impl SqlType for DateTime<FixedOffset> {
    const NAME: &'static str = "DateTime<FixedOffset>";
    const NULL_TYPE: SqlNullType = SqlNullType::DateTimeOffset;

    fn to_sql_value(&self) -> SqlValue<'static> {
        SqlValue::DateTimeOffset(*self)
    }

    fn from_sql_value(value: SqlValue<'static>) -> Result<Self> {
        match value {
            SqlValue::DateTimeOffset(v) => Ok(v),
            // Offset-less timestamps are taken as UTC.
            SqlValue::DateTime(v) => Ok(DateTime::from_naive_utc_and_offset(v, Utc.fix())),
            SqlValue::Text(ref text) => DateTime::parse_from_rfc3339(text.trim())
                .map_err(|_| mismatch::<Self>(&value)),
            other => Err(mismatch::<Self>(&other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_maps_null_to_none() {
        let v: Option<i32> = ColumnValue::from_value(SqlValue::Null(SqlNullType::I32)).unwrap();
        assert_eq!(v, None);
        assert_eq!(
            <Option<i32> as ColumnValue>::to_value(&None),
            SqlValue::Null(SqlNullType::I32)
        );
        assert!(<Option<String> as ColumnValue>::NULLABLE);
        assert!(!<String as ColumnValue>::NULLABLE);
    }

    #[test]
    fn test_null_into_non_nullable_fails() {
        let err = <i32 as ColumnValue>::from_value(SqlValue::Null(SqlNullType::I32)).unwrap_err();
        assert!(matches!(err, MapperError::NullValue("i32")));
    }

    #[test]
    fn test_integer_narrowing_is_range_checked() {
        assert_eq!(i32::from_sql_value(SqlValue::I64(608)).unwrap(), 608);
        assert!(i32::from_sql_value(SqlValue::I64(i64::MAX)).is_err());
        assert_eq!(u8::from_sql_value(SqlValue::I32(255)).unwrap(), 255);
        assert!(u8::from_sql_value(SqlValue::I32(-1)).is_err());
        assert_eq!(
            i64::from_sql_value(SqlValue::Decimal(Decimal::new(4200, 2))).unwrap(),
            42
        );
        assert!(i64::from_sql_value(SqlValue::Decimal(Decimal::new(4250, 2))).is_err());
    }

    #[test]
    fn test_string_conversions() {
        assert_eq!(
            String::from_sql_value(SqlValue::I32(15)).unwrap(),
            "15".to_string()
        );
        assert_eq!(i32::from_sql_value(SqlValue::from(" 15 ")).unwrap(), 15);
        assert!(i32::from_sql_value(SqlValue::from("fifteen")).is_err());
    }

    #[test]
    fn test_float_and_decimal() {
        assert_eq!(f64::from_sql_value(SqlValue::I32(3)).unwrap(), 3.0);
        assert_eq!(
            f64::from_sql_value(SqlValue::Decimal(Decimal::new(4189, 2))).unwrap(),
            41.89
        );
        assert_eq!(
            Decimal::from_sql_value(SqlValue::I64(12)).unwrap(),
            Decimal::new(12, 0)
        );
        assert!(f64::from_sql_value(SqlValue::Bool(true)).is_ok());
        assert!(f64::from_sql_value(SqlValue::Uuid(Uuid::nil())).is_err());
    }

    #[test]
    fn test_date_widening() {
        let date = NaiveDate::from_ymd_opt(2019, 6, 30).unwrap();
        let dt = NaiveDateTime::from_sql_value(SqlValue::Date(date)).unwrap();
        assert_eq!(dt, date.and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(
            NaiveDate::from_sql_value(SqlValue::DateTime(dt)).unwrap(),
            date
        );
        let parsed = NaiveDateTime::from_sql_value(SqlValue::from("2019-06-30")).unwrap();
        assert_eq!(parsed, dt);
    }

    #[test]
    fn test_bool_from_integers() {
        assert!(bool::from_sql_value(SqlValue::U8(1)).unwrap());
        assert!(!bool::from_sql_value(SqlValue::I32(0)).unwrap());
        assert!(bool::from_sql_value(SqlValue::I32(2)).is_err());
    }
}
