//! Dynamically typed column values.
//!
//! [`Value`] is what row payloads, bind parameters and fetched rows are made of.
//! It binds to PostgreSQL through [`ToSql`], adapting to the parameter type the
//! server inferred (e.g. an `Int` bound to an `int4` column is narrowed).
//! A pair with no faithful conversion, such as a `Float` bound to `bigint`,
//! fails with `WrongType` instead of sending reinterpreted bytes.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::error::Error;
use std::fmt;
use tokio_postgres::types::{IsNull, Kind, ToSql, Type, WrongType, to_sql_checked};
use uuid::Uuid;

/// A single SQL value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// `numeric`, exact.
    Decimal(Decimal),
    Text(String),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Date(NaiveDate),
    Uuid(Uuid),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `true` for `Null` and empty text, the values an actor override may not carry.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Integer view; numeric text is parsed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Decimal(d) => d.to_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert to JSON for serde-based row mapping.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Null => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Int(i) => J::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f).map_or(J::Null, J::Number),
            // Kept as a string so no precision is lost.
            Value::Decimal(d) => J::String(d.to_string()),
            Value::Text(s) => J::String(s.clone()),
            Value::Timestamp(ts) => J::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
            Value::TimestampTz(dt) => J::String(dt.to_rfc3339()),
            Value::Date(d) => J::String(d.to_string()),
            Value::Uuid(u) => J::String(u.to_string()),
            Value::Json(v) => v.clone(),
            Value::Bytes(b) => J::Array(b.iter().map(|x| J::from(*x)).collect()),
        }
    }

    /// Coerce numeric text into an integer, used for `id`/`*_id` bind keys.
    pub(crate) fn into_integer_hint(self) -> Value {
        match self {
            Value::Text(ref s) => match s.trim().parse::<i64>() {
                Ok(i) => Value::Int(i),
                Err(_) => self,
            },
            other => other,
        }
    }
}

/// Renders values the way they would read in SQL (text quoted), for debug output.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Text(s) => write!(f, "'{s}'"),
            Value::Timestamp(ts) => write!(f, "'{ts}'"),
            Value::TimestampTz(dt) => write!(f, "'{dt}'"),
            Value::Date(d) => write!(f, "'{d}'"),
            Value::Uuid(u) => write!(f, "'{u}'"),
            Value::Json(v) => write!(f, "'{v}'"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => |$v:ident| $expr:expr),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $expr
                }
            }
        )*
    };
}

impl_from_value! {
    bool => |v| Value::Bool(v),
    i16 => |v| Value::Int(i64::from(v)),
    i32 => |v| Value::Int(i64::from(v)),
    i64 => |v| Value::Int(v),
    u32 => |v| Value::Int(i64::from(v)),
    f32 => |v| Value::Float(f64::from(v)),
    f64 => |v| Value::Float(v),
    Decimal => |v| Value::Decimal(v),
    String => |v| Value::Text(v),
    &str => |v| Value::Text(v.to_string()),
    &String => |v| Value::Text(v.clone()),
    NaiveDateTime => |v| Value::Timestamp(v),
    DateTime<Utc> => |v| Value::TimestampTz(v),
    NaiveDate => |v| Value::Date(v),
    Uuid => |v| Value::Uuid(v),
    serde_json::Value => |v| Value::Json(v),
    Vec<u8> => |v| Value::Bytes(v),
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

type BoxError = Box<dyn Error + Sync + Send>;

fn is_text_like(ty: &Type) -> bool {
    matches!(*ty, Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN)
        || matches!(ty.kind(), Kind::Enum(_))
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, BoxError> {
    if let Ok(ts) = s.parse::<NaiveDateTime>() {
        return Ok(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(ts);
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
    Ok(date.and_time(NaiveTime::MIN))
}

/// Text bound to a non-text parameter is parsed into the server's type.
fn text_to_sql(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::BOOL => match s.to_ascii_lowercase().as_str() {
            "t" | "true" | "y" | "yes" | "on" | "1" => true.to_sql(ty, out),
            "f" | "false" | "n" | "no" | "off" | "0" => false.to_sql(ty, out),
            _ => Err(format!("invalid boolean `{s}`").into()),
        },
        Type::INT2 => s.parse::<i16>()?.to_sql(ty, out),
        Type::INT4 => s.parse::<i32>()?.to_sql(ty, out),
        Type::INT8 => s.parse::<i64>()?.to_sql(ty, out),
        Type::FLOAT4 => s.parse::<f32>()?.to_sql(ty, out),
        Type::FLOAT8 => s.parse::<f64>()?.to_sql(ty, out),
        Type::NUMERIC => s.parse::<Decimal>()?.to_sql(ty, out),
        Type::DATE => NaiveDate::parse_from_str(s, "%Y-%m-%d")?.to_sql(ty, out),
        Type::TIMESTAMP => parse_timestamp(s)?.to_sql(ty, out),
        Type::TIMESTAMPTZ => match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => dt.with_timezone(&Utc).to_sql(ty, out),
            Err(_) => parse_timestamp(s)?.and_utc().to_sql(ty, out),
        },
        Type::UUID => Uuid::parse_str(s)?.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
        _ => checked(&s, ty, out),
    }
}

/// Bind through `T`'s own `ToSql`, refusing parameter types it does not accept.
fn checked<T: ToSql>(value: &T, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if T::accepts(ty) {
        value.to_sql(ty, out)
    } else {
        Err(Box::new(WrongType::new::<T>(ty.clone())))
    }
}

/// Text wire format; enum labels share it.
fn put_text(s: &str, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    out.extend_from_slice(s.as_bytes());
    Ok(IsNull::No)
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) if is_text_like(ty) => put_text(if *b { "true" } else { "false" }, out),
            Value::Bool(b) => checked(b, ty, out),
            Value::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                Type::OID => u32::try_from(*i)?.to_sql(ty, out),
                Type::FLOAT4 => (*i as f32).to_sql(ty, out),
                Type::FLOAT8 => (*i as f64).to_sql(ty, out),
                Type::NUMERIC => Decimal::from(*i).to_sql(ty, out),
                _ if is_text_like(ty) => put_text(&i.to_string(), out),
                _ => checked(i, ty, out),
            },
            Value::Float(x) => match *ty {
                Type::FLOAT4 => (*x as f32).to_sql(ty, out),
                Type::NUMERIC => Decimal::try_from(*x)?.to_sql(ty, out),
                _ if is_text_like(ty) => put_text(&x.to_string(), out),
                _ => checked(x, ty, out),
            },
            Value::Decimal(d) => match *ty {
                Type::FLOAT4 | Type::FLOAT8 => {
                    let x = d
                        .to_f64()
                        .ok_or_else(|| format!("{d} does not fit a float"))?;
                    if *ty == Type::FLOAT4 {
                        (x as f32).to_sql(ty, out)
                    } else {
                        x.to_sql(ty, out)
                    }
                }
                Type::INT2 | Type::INT4 | Type::INT8 => {
                    let i = d
                        .fract()
                        .is_zero()
                        .then(|| d.to_i64())
                        .flatten()
                        .ok_or_else(|| format!("{d} is not an integer"))?;
                    Value::Int(i).to_sql(ty, out)
                }
                _ if is_text_like(ty) => put_text(&d.to_string(), out),
                _ => checked(d, ty, out),
            },
            Value::Text(s) => {
                if is_text_like(ty) {
                    put_text(s, out)
                } else {
                    text_to_sql(s.trim(), ty, out)
                }
            }
            Value::Timestamp(ts) => match *ty {
                Type::TIMESTAMPTZ => ts.and_utc().to_sql(ty, out),
                Type::DATE => ts.date().to_sql(ty, out),
                _ if is_text_like(ty) => put_text(&ts.to_string(), out),
                _ => checked(ts, ty, out),
            },
            Value::TimestampTz(dt) => match *ty {
                Type::TIMESTAMP => dt.naive_utc().to_sql(ty, out),
                _ if is_text_like(ty) => put_text(&dt.to_rfc3339(), out),
                _ => checked(dt, ty, out),
            },
            Value::Date(d) => match *ty {
                Type::TIMESTAMP => d.and_time(NaiveTime::MIN).to_sql(ty, out),
                Type::TIMESTAMPTZ => d.and_time(NaiveTime::MIN).and_utc().to_sql(ty, out),
                _ if is_text_like(ty) => put_text(&d.to_string(), out),
                _ => checked(d, ty, out),
            },
            Value::Uuid(u) if is_text_like(ty) => put_text(&u.to_string(), out),
            Value::Uuid(u) => checked(u, ty, out),
            Value::Json(v) if is_text_like(ty) => put_text(&v.to_string(), out),
            Value::Json(v) => checked(v, ty, out),
            Value::Bytes(b) => checked(b, ty, out),
        }
    }

    /// Any parameter type may be offered; [`to_sql`](ToSql::to_sql) refuses
    /// the pairs that have no faithful conversion.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
