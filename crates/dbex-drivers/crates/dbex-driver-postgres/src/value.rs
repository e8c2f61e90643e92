//! Decoding PostgreSQL binary results into [`Value`]

use dbex_core::{ExtractorError, Result, Value};
use tokio_postgres::Row as PgRow;
use tokio_postgres::types::{FromSql, Type};

type DecodeError = Box<dyn std::error::Error + Sync + Send>;

pub(crate) fn pg_to_value(row: &PgRow, idx: usize) -> Result<Value> {
    let column = &row.columns()[idx];
    match column.type_().name() {
        "bool" => get(row, idx, Value::Bool),
        "int2" => get(row, idx, |v: i16| Value::Int64(v.into())),
        "int4" => get(row, idx, |v: i32| Value::Int64(v.into())),
        "int8" => get(row, idx, Value::Int64),
        "oid" => get(row, idx, |v: u32| Value::Int64(v.into())),
        "float4" => get(row, idx, |v: f32| Value::Float64(v.into())),
        "float8" => get(row, idx, Value::Float64),
        "numeric" => get(row, idx, |v: NumericText| Value::Decimal(v.0)),
        "text" | "varchar" | "bpchar" | "name" | "char" => get(row, idx, Value::String),
        "bytea" => get(row, idx, Value::Bytes),
        "uuid" => get(row, idx, |v: UuidText| Value::String(v.0)),
        "json" | "jsonb" => get(row, idx, Value::Json),
        "date" => get(row, idx, Value::Date),
        "time" => get(row, idx, Value::Time),
        "timestamp" => get(row, idx, Value::DateTime),
        "timestamptz" => get(row, idx, Value::DateTimeUtc),
        // enums and other text-like types carry their label as payload
        _ => get(row, idx, |v: RawText| v.0),
    }
}

fn get<'a, T: FromSql<'a>>(
    row: &'a PgRow,
    idx: usize,
    wrap: impl FnOnce(T) -> Value,
) -> Result<Value> {
    row.try_get::<_, Option<T>>(idx)
        .map(|value| value.map_or(Value::Null, wrap))
        .map_err(|e| {
            ExtractorError::Application(format!(
                "Failed to decode column \"{}\": {}",
                row.columns()[idx].name(),
                e
            ))
        })
}

/// NUMERIC rendered exactly, without going through a float
#[derive(Debug)]
struct NumericText(String);

impl NumericText {
    fn parse(raw: &[u8]) -> std::result::Result<String, DecodeError> {
        if raw.len() < 8 {
            return Err("invalid NUMERIC payload: too short".into());
        }

        let ndigits = i16::from_be_bytes([raw[0], raw[1]]).max(0) as usize;
        let weight = i16::from_be_bytes([raw[2], raw[3]]);
        let sign = u16::from_be_bytes([raw[4], raw[5]]);
        let dscale = i16::from_be_bytes([raw[6], raw[7]]).max(0) as usize;

        if sign == 0xC000 {
            return Ok("NaN".to_string());
        }
        if raw.len() < 8 + ndigits * 2 {
            return Err("invalid NUMERIC payload: truncated digits".into());
        }

        let digits = raw[8..8 + ndigits * 2]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect::<Vec<_>>();
        if digits.iter().any(|group| *group > 9999) {
            return Err("invalid NUMERIC payload: group out of range".into());
        }

        // base-10000 groups; `weight` is the exponent of the first one
        let integer_groups = if weight >= 0 { weight as usize + 1 } else { 0 };
        let mut integer = String::new();
        for index in 0..integer_groups {
            let group = digits.get(index).copied().unwrap_or(0);
            if integer.is_empty() {
                integer.push_str(&group.to_string());
            } else {
                integer.push_str(&format!("{group:04}"));
            }
        }
        if integer.is_empty() {
            integer.push('0');
        }

        let mut fraction = String::new();
        if dscale > 0 {
            let leading_zero_groups = if weight < -1 { (-1 - weight) as usize } else { 0 };
            fraction.push_str(&"0000".repeat(leading_zero_groups));
            for group in digits.iter().skip(integer_groups) {
                fraction.push_str(&format!("{group:04}"));
            }
            if fraction.len() < dscale {
                fraction.push_str(&"0".repeat(dscale - fraction.len()));
            } else {
                fraction.truncate(dscale);
            }
        }

        let is_zero = integer == "0" && fraction.chars().all(|c| c == '0');
        let mut output = String::new();
        if sign == 0x4000 && !is_zero {
            output.push('-');
        }
        output.push_str(&integer);
        if !fraction.is_empty() {
            output.push('.');
            output.push_str(&fraction);
        }
        Ok(output)
    }
}

impl<'a> FromSql<'a> for NumericText {
    fn from_sql(_: &Type, raw: &'a [u8]) -> std::result::Result<Self, DecodeError> {
        Ok(Self(Self::parse(raw)?))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// UUID in its canonical hyphenated form
#[derive(Debug)]
struct UuidText(String);

impl<'a> FromSql<'a> for UuidText {
    fn from_sql(_: &Type, raw: &'a [u8]) -> std::result::Result<Self, DecodeError> {
        if raw.len() != 16 {
            return Err("invalid UUID payload".into());
        }
        let hex: String = raw.iter().map(|b| format!("{b:02x}")).collect();
        Ok(Self(format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::UUID
    }
}

/// Payload of any other type, as text when it is UTF-8
#[derive(Debug)]
struct RawText(Value);

impl<'a> FromSql<'a> for RawText {
    fn from_sql(_: &Type, raw: &'a [u8]) -> std::result::Result<Self, DecodeError> {
        Ok(Self(match std::str::from_utf8(raw) {
            Ok(text) => Value::String(text.to_string()),
            Err(_) => Value::Bytes(raw.to_vec()),
        }))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}
