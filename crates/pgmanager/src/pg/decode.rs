//! `tokio_postgres::Row` → [`Record`] conversion.

use crate::error::{OrmError, OrmResult};
use crate::record::Record;
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use std::error::Error;
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Kind, Type};
use uuid::Uuid;

/// Reads enum labels (and any text-format type) as a string.
struct Label(String);

impl<'a> FromSql<'a> for Label {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(Label(std::str::from_utf8(raw)?.to_string()))
    }

    fn accepts(ty: &Type) -> bool {
        matches!(ty.kind(), Kind::Enum(_))
    }
}

fn get<'a, T>(row: &'a Row, idx: usize, name: &str) -> OrmResult<Option<T>>
where
    T: FromSql<'a>,
{
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| OrmError::decode(name, e.to_string()))
}

fn decode_column(row: &Row, idx: usize) -> OrmResult<Value> {
    let column = &row.columns()[idx];
    let name = column.name();
    let ty = column.type_();

    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx, name)?.map(Value::Bool),
        Type::INT2 => get::<i16>(row, idx, name)?.map(Value::from),
        Type::INT4 => get::<i32>(row, idx, name)?.map(Value::from),
        Type::INT8 => get::<i64>(row, idx, name)?.map(Value::Int),
        Type::OID => get::<u32>(row, idx, name)?.map(Value::from),
        Type::FLOAT4 => get::<f32>(row, idx, name)?.map(Value::from),
        Type::FLOAT8 => get::<f64>(row, idx, name)?.map(Value::Float),
        Type::NUMERIC => get::<Decimal>(row, idx, name)?.map(Value::Decimal),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            get::<String>(row, idx, name)?.map(Value::Text)
        }
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx, name)?.map(Value::Timestamp),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx, name)?.map(Value::TimestampTz),
        Type::DATE => get::<NaiveDate>(row, idx, name)?.map(Value::Date),
        Type::UUID => get::<Uuid>(row, idx, name)?.map(Value::Uuid),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx, name)?.map(Value::Json),
        Type::BYTEA => get::<Vec<u8>>(row, idx, name)?.map(Value::Bytes),
        _ if matches!(ty.kind(), Kind::Enum(_)) => {
            get::<Label>(row, idx, name)?.map(|l| Value::Text(l.0))
        }
        _ => {
            return Err(OrmError::decode(
                name,
                format!("unsupported column type `{ty}`; cast it in SQL (e.g. ::text or ::float8)"),
            ));
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Convert a driver row into an ordered [`Record`].
pub(crate) fn row_to_record(row: &Row) -> OrmResult<Record> {
    let mut record = Record::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        record.insert(column.name(), decode_column(row, idx)?);
    }
    Ok(record)
}
