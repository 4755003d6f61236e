//! Conversion of textual default values into typed values.
//!
//! The model stores defaults as text so it stays platform-agnostic; the
//! typed form exists to compare defaults semantically (`1.0` and `1.00` are
//! the same DECIMAL) and to let renderers decide how to quote them.

use crate::SqlType;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

/// A textual value could not be converted to the requested SQL type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot convert '{value}' to {sql_type}: {reason}")]
pub struct ConversionError {
    pub value: String,
    pub sql_type: SqlType,
    pub reason: String,
}

/// A column value in its native form.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    Float(f64),
    Text(String),
    Binary(Vec<u8>),
    Date(jiff::civil::Date),
    Time(jiff::civil::Time),
    Timestamp(jiff::civil::DateTime),
}

/// Parse `text` as a value of `sql_type`.
pub fn parse_value(sql_type: SqlType, text: &str) -> Result<TypedValue, ConversionError> {
    let err = |reason: String| ConversionError {
        value: text.to_string(),
        sql_type,
        reason,
    };
    let trimmed = text.trim();

    match sql_type {
        SqlType::Boolean | SqlType::Bit => parse_bool(trimmed)
            .map(TypedValue::Boolean)
            .ok_or_else(|| err("expected a boolean".to_string())),
        SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => trimmed
            .parse::<i64>()
            .map(TypedValue::Integer)
            .map_err(|e| err(e.to_string())),
        SqlType::Decimal | SqlType::Numeric => Decimal::from_str(trimmed)
            .map(TypedValue::Decimal)
            .map_err(|e| err(e.to_string())),
        SqlType::Real | SqlType::Float | SqlType::Double => trimmed
            .parse::<f64>()
            .map(TypedValue::Float)
            .map_err(|e| err(e.to_string())),
        SqlType::Date => trimmed
            .parse::<jiff::civil::Date>()
            .map(TypedValue::Date)
            .map_err(|e| err(e.to_string())),
        SqlType::Time => trimmed
            .parse::<jiff::civil::Time>()
            .map(TypedValue::Time)
            .map_err(|e| err(e.to_string())),
        SqlType::Timestamp => trimmed
            .parse::<jiff::civil::DateTime>()
            .map(TypedValue::Timestamp)
            .map_err(|e| err(e.to_string())),
        SqlType::Binary | SqlType::VarBinary | SqlType::LongVarBinary | SqlType::Blob => {
            parse_hex(trimmed).map(TypedValue::Binary).map_err(err)
        }
        // Text keeps its surrounding whitespace
        SqlType::Char
        | SqlType::VarChar
        | SqlType::LongVarChar
        | SqlType::Clob
        | SqlType::Array
        | SqlType::Other => Ok(TypedValue::Text(text.to_string())),
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

fn parse_hex(text: &str) -> Result<Vec<u8>, String> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if digits.len() % 2 != 0 {
        return Err("odd number of hex digits".to_string());
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("invalid hex digits at offset {}", i))
        })
        .collect()
}

/// Whether two textual defaults denote the same value for `sql_type`.
///
/// Falls back to textual comparison when either side does not parse.
pub fn same_default(sql_type: SqlType, a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            if a == b {
                return true;
            }
            match (parse_value(sql_type, a), parse_value(sql_type, b)) {
                (Ok(a), Ok(b)) => a == b,
                _ => false,
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_defaults_compare_numerically() {
        assert!(same_default(SqlType::Decimal, Some("1.0"), Some("1.00")));
        assert!(!same_default(SqlType::Decimal, Some("1.0"), Some("1.01")));
    }

    #[test]
    fn test_text_defaults_compare_textually() {
        assert!(!same_default(SqlType::VarChar, Some("a"), Some("a ")));
        assert!(!same_default(SqlType::VarChar, Some("a"), None));
        assert!(same_default(SqlType::VarChar, None, None));
    }

    #[test]
    fn test_boolean_spellings() {
        assert_eq!(
            parse_value(SqlType::Boolean, "TRUE"),
            Ok(TypedValue::Boolean(true))
        );
        assert_eq!(parse_value(SqlType::Bit, "0"), Ok(TypedValue::Boolean(false)));
        assert!(same_default(SqlType::Boolean, Some("1"), Some("true")));
    }

    #[test]
    fn test_integer_conversion_error_is_reported() {
        let err = parse_value(SqlType::Integer, "twelve").unwrap_err();
        assert_eq!(err.sql_type, SqlType::Integer);
        assert_eq!(err.value, "twelve");
    }

    #[test]
    fn test_date_and_timestamp() {
        assert!(matches!(
            parse_value(SqlType::Date, "2024-02-29"),
            Ok(TypedValue::Date(_))
        ));
        assert!(parse_value(SqlType::Date, "2023-02-29").is_err());
        assert!(matches!(
            parse_value(SqlType::Timestamp, "2024-02-29T10:30:00"),
            Ok(TypedValue::Timestamp(_))
        ));
    }

    #[test]
    fn test_binary_hex() {
        assert_eq!(
            parse_value(SqlType::Blob, "0xCAFE"),
            Ok(TypedValue::Binary(vec![0xca, 0xfe]))
        );
        assert!(parse_value(SqlType::Blob, "abc").is_err());
        assert!(parse_value(SqlType::Blob, "zz").is_err());
    }
}
