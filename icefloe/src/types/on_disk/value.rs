use std::collections::HashMap;
use std::str::FromStr;

use chrono::{NaiveTime, TimeZone, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::in_memory::epoch;
use crate::types::{self, PrimitiveValue};
use crate::Error;
use crate::ErrorKind;
use crate::Result;

/// Literal as stored in bounds and partition tuples.
///
/// Temporal values are stored as integers from the unix epoch, bytes are
/// stored as hex strings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub(crate) enum Value {
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Decimal(String),
    Date(i64),
    Time(i64),
    Timestamp(i64),
    Timestamptz(i64),
    String(String),
    Uuid(String),
    Fixed(String),
    Binary(String),
}

impl From<&PrimitiveValue> for Value {
    fn from(v: &PrimitiveValue) -> Self {
        match v {
            PrimitiveValue::Boolean(v) => Value::Boolean(*v),
            PrimitiveValue::Int(v) => Value::Int(*v),
            PrimitiveValue::Long(v) => Value::Long(*v),
            PrimitiveValue::Float(v) => Value::Float(v.0),
            PrimitiveValue::Double(v) => Value::Double(v.0),
            PrimitiveValue::Decimal(v) => Value::Decimal(v.to_string()),
            PrimitiveValue::Date(v) => Value::Date(PrimitiveValue::days_from_epoch(v)),
            PrimitiveValue::Time(v) => Value::Time(PrimitiveValue::micros_from_midnight(v)),
            PrimitiveValue::Timestamp(v) => Value::Timestamp(PrimitiveValue::micros_from_epoch(v)),
            PrimitiveValue::Timestampz(v) => {
                Value::Timestamptz(PrimitiveValue::micros_from_epoch(&v.naive_utc()))
            }
            PrimitiveValue::String(v) => Value::String(v.clone()),
            PrimitiveValue::Uuid(v) => Value::Uuid(v.to_string()),
            PrimitiveValue::Fixed(v) => Value::Fixed(faster_hex::hex_string(v)),
            PrimitiveValue::Binary(v) => Value::Binary(faster_hex::hex_string(v)),
        }
    }
}

fn invalid(what: &str, v: impl std::fmt::Display) -> Error {
    Error::new(ErrorKind::DataInvalid, format!("{what} value {v} is invalid"))
}

fn decode_hex(v: &str) -> Result<Vec<u8>> {
    let mut dst = vec![0; v.len() / 2];
    faster_hex::hex_decode(v.as_bytes(), &mut dst)
        .map_err(|e| invalid("hex", v).set_source(anyhow::anyhow!("{e}")))?;
    Ok(dst)
}

impl TryFrom<Value> for PrimitiveValue {
    type Error = Error;

    fn try_from(v: Value) -> Result<Self> {
        let v = match v {
            Value::Boolean(v) => PrimitiveValue::Boolean(v),
            Value::Int(v) => PrimitiveValue::Int(v),
            Value::Long(v) => PrimitiveValue::Long(v),
            Value::Float(v) => PrimitiveValue::Float(OrderedFloat(v)),
            Value::Double(v) => PrimitiveValue::Double(OrderedFloat(v)),
            Value::Decimal(v) => PrimitiveValue::Decimal(
                v.parse()
                    .map_err(|e| invalid("decimal", &v).set_source(e))?,
            ),
            Value::Date(days) => PrimitiveValue::Date(
                epoch()
                    .date()
                    .checked_add_signed(chrono::Duration::days(days))
                    .ok_or_else(|| invalid("date", days))?,
            ),
            Value::Time(micros) => PrimitiveValue::Time(
                NaiveTime::from_num_seconds_from_midnight_opt(
                    (micros / 1_000_000) as u32,
                    (micros % 1_000_000 * 1_000) as u32,
                )
                .ok_or_else(|| invalid("time", micros))?,
            ),
            Value::Timestamp(micros) => PrimitiveValue::Timestamp(
                epoch()
                    .checked_add_signed(chrono::Duration::microseconds(micros))
                    .ok_or_else(|| invalid("timestamp", micros))?,
            ),
            Value::Timestamptz(micros) => {
                let ts = epoch()
                    .checked_add_signed(chrono::Duration::microseconds(micros))
                    .ok_or_else(|| invalid("timestamptz", micros))?;
                PrimitiveValue::Timestampz(Utc.from_utc_datetime(&ts))
            }
            Value::String(v) => PrimitiveValue::String(v),
            Value::Uuid(v) => {
                PrimitiveValue::Uuid(Uuid::from_str(&v).map_err(|e| invalid("uuid", &v).set_source(e))?)
            }
            Value::Fixed(v) => PrimitiveValue::Fixed(decode_hex(&v)?),
            Value::Binary(v) => PrimitiveValue::Binary(decode_hex(&v)?),
        };
        Ok(v)
    }
}

pub(crate) fn serialize_values(values: &HashMap<i32, PrimitiveValue>) -> HashMap<i32, Value> {
    values.iter().map(|(k, v)| (*k, Value::from(v))).collect()
}

pub(crate) fn parse_values(values: HashMap<i32, Value>) -> Result<HashMap<i32, PrimitiveValue>> {
    values
        .into_iter()
        .map(|(k, v)| PrimitiveValue::try_from(v).map(|v| (k, v)))
        .collect()
}

pub(crate) fn serialize_struct_value(v: &types::StructValue) -> Vec<Option<Value>> {
    v.fields().iter().map(|v| v.as_ref().map(Value::from)).collect()
}

pub(crate) fn parse_struct_value(v: Vec<Option<Value>>) -> Result<types::StructValue> {
    v.into_iter()
        .map(|v| v.map(PrimitiveValue::try_from).transpose())
        .collect::<Result<Vec<_>>>()
        .map(types::StructValue::new)
}
