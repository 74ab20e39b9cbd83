//! Coercion of dialect-agnostic values to PostgreSQL parameter types.
//!
//! PostgreSQL checks every bind parameter against the type the server
//! inferred for it, while a SQLite source hands back whatever storage class
//! a cell happened to use (booleans as 0/1, timestamps as text, numerics as
//! floats). Each value is converted up front to the parameter's declared
//! type so a mismatch is reported with the column name instead of as an
//! opaque serialization failure.
//!
//! Only the types listed in [`binds_natively`] are encoded in binary. Every
//! other parameter (NUMERIC, UUID, JSON, TIME, INTERVAL, network types,
//! enums, arrays) is sent as text behind a [`text_cast`] so the server
//! parses it with the column type's own input function.

use std::error::Error;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};

use crate::core::identifier::quote_double;
use crate::core::value::SqlValue;

/// A value already converted to the exact Rust type its parameter expects.
#[derive(Debug, Clone, PartialEq)]
pub enum PgValue {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
}

impl ToSql for PgValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            PgValue::Null => Ok(IsNull::Yes),
            PgValue::Bool(v) => v.to_sql(ty, out),
            PgValue::I16(v) => v.to_sql(ty, out),
            PgValue::I32(v) => v.to_sql(ty, out),
            PgValue::I64(v) => v.to_sql(ty, out),
            PgValue::F32(v) => v.to_sql(ty, out),
            PgValue::F64(v) => v.to_sql(ty, out),
            PgValue::Text(v) => v.to_sql(ty, out),
            PgValue::Bytes(v) => v.to_sql(ty, out),
            PgValue::Timestamp(v) => v.to_sql(ty, out),
            PgValue::TimestampTz(v) => v.to_sql(ty, out),
            PgValue::Date(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        // The variant is chosen from the parameter type, so any type is
        // accepted here and the inner value's own check runs in to_sql.
        true
    }

    to_sql_checked!();
}

/// Whether [`coerce`] can encode a parameter of type `ty` directly.
pub fn binds_natively(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::BOOL
            | Type::INT2
            | Type::INT4
            | Type::INT8
            | Type::FLOAT4
            | Type::FLOAT8
            | Type::BYTEA
            | Type::TIMESTAMP
            | Type::TIMESTAMPTZ
            | Type::DATE
            | Type::TEXT
            | Type::VARCHAR
            | Type::BPCHAR
            | Type::NAME
            | Type::UNKNOWN
    )
}

/// Placeholder suffix that takes a text parameter and casts it to `ty`.
///
/// The type is schema-qualified so enums and domains outside the search
/// path resolve, and array types keep their `_elem` catalog name.
pub fn text_cast(ty: &Type) -> String {
    format!(
        "::text::{}.{}",
        quote_double(ty.schema()),
        quote_double(ty.name())
    )
}

/// Convert `value` for a parameter of type `ty`.
///
/// Returns a human-readable reason when no sensible conversion exists.
pub fn coerce(value: &SqlValue, ty: &Type) -> std::result::Result<PgValue, String> {
    if value.is_null() {
        return Ok(PgValue::Null);
    }

    let mismatch = || format!("cannot convert {} value to {}", value.kind(), ty.name());

    let converted = match *ty {
        Type::BOOL => match value {
            SqlValue::Bool(v) => PgValue::Bool(*v),
            SqlValue::Int(v) => PgValue::Bool(*v != 0),
            SqlValue::Text(s) => PgValue::Bool(parse_bool(s).ok_or_else(mismatch)?),
            _ => return Err(mismatch()),
        },
        Type::INT2 => PgValue::I16(int_value(value).and_then(|v| i16::try_from(v).ok()).ok_or_else(mismatch)?),
        Type::INT4 => PgValue::I32(int_value(value).and_then(|v| i32::try_from(v).ok()).ok_or_else(mismatch)?),
        Type::INT8 => PgValue::I64(int_value(value).ok_or_else(mismatch)?),
        Type::FLOAT4 => PgValue::F32(float_value(value).ok_or_else(mismatch)? as f32),
        Type::FLOAT8 => PgValue::F64(float_value(value).ok_or_else(mismatch)?),
        Type::BYTEA => match value {
            SqlValue::Bytes(b) => PgValue::Bytes(b.clone()),
            SqlValue::Text(s) => PgValue::Bytes(s.as_bytes().to_vec()),
            _ => return Err(mismatch()),
        },
        Type::TIMESTAMP => PgValue::Timestamp(timestamp_value(value).ok_or_else(mismatch)?),
        Type::TIMESTAMPTZ => PgValue::TimestampTz(timestamp_value(value).ok_or_else(mismatch)?.and_utc()),
        Type::DATE => PgValue::Date(timestamp_value(value).ok_or_else(mismatch)?.date()),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            PgValue::Text(text_value(value))
        }
        _ => return Err(mismatch()),
    };

    Ok(converted)
}

fn int_value(value: &SqlValue) -> Option<i64> {
    match value {
        SqlValue::Int(v) => Some(*v),
        SqlValue::Bool(v) => Some(i64::from(*v)),
        SqlValue::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
        SqlValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn float_value(value: &SqlValue) -> Option<f64> {
    match value {
        SqlValue::Float(v) => Some(*v),
        SqlValue::Int(v) => Some(*v as f64),
        SqlValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "1" | "y" | "yes" | "on" => Some(true),
        "f" | "false" | "0" | "n" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Text layouts SQLite and common drivers use for timestamps.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Layouts carrying an explicit offset; normalized to UTC.
const TIMESTAMP_TZ_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%#z"];

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in TIMESTAMP_TZ_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.naive_utc());
        }
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn timestamp_value(value: &SqlValue) -> Option<NaiveDateTime> {
    match value {
        SqlValue::Timestamp(ts) => Some(*ts),
        SqlValue::Text(s) => parse_timestamp(s),
        // Unix epoch seconds, as written by SQLite's unixepoch().
        SqlValue::Int(secs) => DateTime::from_timestamp(*secs, 0).map(|dt| dt.naive_utc()),
        _ => None,
    }
}

fn text_value(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => String::new(),
        SqlValue::Int(v) => v.to_string(),
        SqlValue::Float(v) => v.to_string(),
        SqlValue::Text(s) => s.clone(),
        SqlValue::Bool(v) => v.to_string(),
        SqlValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        SqlValue::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn test_null_coerces_to_any_type() {
        assert_eq!(coerce(&SqlValue::Null, &Type::INT4).unwrap(), PgValue::Null);
        assert_eq!(coerce(&SqlValue::Null, &Type::JSONB).unwrap(), PgValue::Null);
    }

    #[test]
    fn test_integer_widths() {
        assert_eq!(coerce(&SqlValue::Int(7), &Type::INT2).unwrap(), PgValue::I16(7));
        assert_eq!(coerce(&SqlValue::Int(7), &Type::INT4).unwrap(), PgValue::I32(7));
        assert_eq!(coerce(&SqlValue::Int(7), &Type::INT8).unwrap(), PgValue::I64(7));
        assert!(coerce(&SqlValue::Int(i64::MAX), &Type::INT4).is_err());
        assert_eq!(
            coerce(&SqlValue::Text("42".into()), &Type::INT4).unwrap(),
            PgValue::I32(42)
        );
    }

    #[test]
    fn test_sqlite_booleans() {
        assert_eq!(coerce(&SqlValue::Int(1), &Type::BOOL).unwrap(), PgValue::Bool(true));
        assert_eq!(coerce(&SqlValue::Int(0), &Type::BOOL).unwrap(), PgValue::Bool(false));
        assert_eq!(
            coerce(&SqlValue::Text("false".into()), &Type::BOOL).unwrap(),
            PgValue::Bool(false)
        );
        assert!(coerce(&SqlValue::Text("maybe".into()), &Type::BOOL).is_err());
    }

    #[test]
    fn test_floats() {
        assert_eq!(coerce(&SqlValue::Int(3), &Type::FLOAT8).unwrap(), PgValue::F64(3.0));
        assert_eq!(coerce(&SqlValue::Float(1.5), &Type::FLOAT4).unwrap(), PgValue::F32(1.5));
        assert!(matches!(
            coerce(&SqlValue::Text("NaN".into()), &Type::FLOAT8).unwrap(),
            PgValue::F64(v) if v.is_nan()
        ));
    }

    #[test]
    fn test_sqlite_timestamp_text() {
        let expected = ts(2024, 3, 1, 12, 30, 0);
        for text in [
            "2024-03-01 12:30:00",
            "2024-03-01T12:30:00",
            "2024-03-01 12:30:00.000",
            "2024-03-01T12:30:00Z",
            "2024-03-01 14:30:00+02:00",
            "2024-03-01 12:30",
        ] {
            assert_eq!(
                coerce(&SqlValue::Text(text.into()), &Type::TIMESTAMP).unwrap(),
                PgValue::Timestamp(expected),
                "{}",
                text
            );
        }
        assert_eq!(
            coerce(&SqlValue::Text("2024-03-01".into()), &Type::TIMESTAMP).unwrap(),
            PgValue::Timestamp(ts(2024, 3, 1, 0, 0, 0))
        );
    }

    #[test]
    fn test_epoch_and_tz_timestamps() {
        assert_eq!(
            coerce(&SqlValue::Int(0), &Type::TIMESTAMP).unwrap(),
            PgValue::Timestamp(ts(1970, 1, 1, 0, 0, 0))
        );
        let value = coerce(&SqlValue::Timestamp(ts(2020, 1, 2, 3, 4, 5)), &Type::TIMESTAMPTZ).unwrap();
        assert_eq!(value, PgValue::TimestampTz(ts(2020, 1, 2, 3, 4, 5).and_utc()));
    }

    #[test]
    fn test_text_accepts_anything() {
        assert_eq!(
            coerce(&SqlValue::Int(5), &Type::TEXT).unwrap(),
            PgValue::Text("5".into())
        );
        assert_eq!(
            coerce(&SqlValue::Bool(true), &Type::VARCHAR).unwrap(),
            PgValue::Text("true".into())
        );
    }

    #[test]
    fn test_mismatch_names_both_types() {
        let err = coerce(&SqlValue::Text("hello".into()), &Type::INT4).unwrap_err();
        assert!(err.contains("text"));
        assert!(err.contains("int4"));

        let err = coerce(&SqlValue::Bytes(vec![1, 2]), &Type::TIMESTAMP).unwrap_err();
        assert!(err.contains("bytes"));
    }

    #[test]
    fn test_unsupported_parameter_type() {
        assert!(coerce(&SqlValue::Text("{}".into()), &Type::JSONB).is_err());
        assert!(!binds_natively(&Type::JSONB));
    }

    #[test]
    fn test_server_parsed_types_go_through_text() {
        for ty in [
            Type::NUMERIC,
            Type::UUID,
            Type::JSON,
            Type::JSONB,
            Type::TIME,
            Type::INTERVAL,
            Type::INET,
            Type::INT4_ARRAY,
        ] {
            assert!(!binds_natively(&ty), "{}", ty);
        }
        for ty in [Type::INT8, Type::BYTEA, Type::TIMESTAMPTZ, Type::VARCHAR] {
            assert!(binds_natively(&ty), "{}", ty);
        }
    }

    #[test]
    fn test_text_cast_is_schema_qualified() {
        assert_eq!(text_cast(&Type::UUID), "::text::\"pg_catalog\".\"uuid\"");
        assert_eq!(text_cast(&Type::NUMERIC), "::text::\"pg_catalog\".\"numeric\"");
        assert_eq!(text_cast(&Type::INT4_ARRAY), "::text::\"pg_catalog\".\"_int4\"");
    }

    #[test]
    fn test_text_parameter_keeps_digits_a_decimal_would_lose() {
        // 30 significant digits and NaN both reach a NUMERIC column unchanged.
        let wide = "123456789012345678901234567.891";
        assert_eq!(
            coerce(&SqlValue::Text(wide.into()), &Type::TEXT).unwrap(),
            PgValue::Text(wide.into())
        );
        assert_eq!(
            coerce(&SqlValue::Float(f64::NAN), &Type::TEXT).unwrap(),
            PgValue::Text("NaN".into())
        );
        assert_eq!(
            coerce(&SqlValue::Float(12.5), &Type::TEXT).unwrap(),
            PgValue::Text("12.5".into())
        );
    }
}
