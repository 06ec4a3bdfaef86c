//! in_memory module provides the definition of iceberg in-memory data types.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use derive_builder::Builder;
use ordered_float::OrderedFloat;
use uuid::Uuid;

use crate::Error;
use crate::ErrorKind;
use crate::Result;

pub(crate) const MAIN_BRANCH: &str = "main";
const EMPTY_SNAPSHOT_ID: i64 = -1;

/// Spec id of the unpartitioned spec every table starts from.
pub const UNPARTITIONED_SPEC_ID: i32 = 0;
/// Partition field ids are assigned starting from this value.
pub const PARTITION_FIELD_ID_START: i32 = 1000;
/// Reserved field id of the `file_path` column in position delete files.
pub const DELETE_FILE_PATH_FIELD_ID: i32 = 2147483546;
/// Reserved field id of the `pos` column in position delete files.
pub const DELETE_FILE_POS_FIELD_ID: i32 = 2147483545;

/// All data types are either primitives or nested types, which are maps, lists, or structs.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Any {
    /// A Primitive type
    Primitive(Primitive),
    /// A Struct type
    Struct(Arc<Struct>),
    /// A List type.
    List(List),
    /// A Map type
    Map(Map),
}

impl From<Primitive> for Any {
    fn from(value: Primitive) -> Self {
        Any::Primitive(value)
    }
}

impl Any {
    /// Returns the primitive type if this is one.
    pub fn as_primitive(&self) -> Option<&Primitive> {
        match self {
            Any::Primitive(p) => Some(p),
            _ => None,
        }
    }
}

/// Primitive Types within a schema.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Primitive {
    /// True or False
    Boolean,
    /// 32-bit signed integer, Can promote to long
    Int,
    /// 64-bit signed integer
    Long,
    /// 32-bit IEEE 753 floating bit, Can promote to double
    Float,
    /// 64-bit IEEE 753 floating bit.
    Double,
    /// Fixed point decimal
    Decimal {
        /// Precision
        precision: u8,
        /// Scale
        scale: u8,
    },
    /// Calendar date without timezone or time
    Date,
    /// Time of day without date or timezone.
    Time,
    /// Timestamp without timezone
    Timestamp,
    /// Timestamp with timezone
    Timestampz,
    /// Arbitrary-length character sequences, encoded in utf-8
    String,
    /// Universally Unique Identifiers
    Uuid,
    /// Fixed length byte array
    Fixed(u64),
    /// Arbitrary-length byte array.
    Binary,
}

impl Display for Primitive {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Primitive::Boolean => write!(f, "boolean"),
            Primitive::Int => write!(f, "int"),
            Primitive::Long => write!(f, "long"),
            Primitive::Float => write!(f, "float"),
            Primitive::Double => write!(f, "double"),
            Primitive::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            Primitive::Date => write!(f, "date"),
            Primitive::Time => write!(f, "time"),
            Primitive::Timestamp => write!(f, "timestamp"),
            Primitive::Timestampz => write!(f, "timestamptz"),
            Primitive::String => write!(f, "string"),
            Primitive::Uuid => write!(f, "uuid"),
            Primitive::Fixed(len) => write!(f, "fixed[{len}]"),
            Primitive::Binary => write!(f, "binary"),
        }
    }
}

impl FromStr for Primitive {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            Error::new(
                ErrorKind::DataInvalid,
                format!("primitive type {s:?} is invalid"),
            )
        };

        let t = match s {
            "boolean" => Primitive::Boolean,
            "int" => Primitive::Int,
            "long" => Primitive::Long,
            "float" => Primitive::Float,
            "double" => Primitive::Double,
            "date" => Primitive::Date,
            "time" => Primitive::Time,
            "timestamp" => Primitive::Timestamp,
            "timestamptz" => Primitive::Timestampz,
            "string" => Primitive::String,
            "uuid" => Primitive::Uuid,
            "binary" => Primitive::Binary,
            v if v.starts_with("fixed[") => {
                let len = v
                    .strip_prefix("fixed[")
                    .and_then(|v| v.strip_suffix(']'))
                    .ok_or_else(invalid)?
                    .parse()
                    .map_err(|e| invalid().set_source(e))?;
                Primitive::Fixed(len)
            }
            v if v.starts_with("decimal(") => {
                let (precision, scale) = v
                    .strip_prefix("decimal(")
                    .and_then(|v| v.strip_suffix(')'))
                    .and_then(|v| v.split_once(','))
                    .ok_or_else(invalid)?;
                Primitive::Decimal {
                    precision: precision
                        .trim()
                        .parse()
                        .map_err(|e| invalid().set_source(e))?,
                    scale: scale.trim().parse().map_err(|e| invalid().set_source(e))?,
                }
            }
            _ => return Err(invalid()),
        };

        Ok(t)
    }
}

/// Primitive Values within a schema.
///
/// Values of the same type are totally ordered, comparing values of
/// different types yields `None`.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum PrimitiveValue {
    /// 0x00 for false, non-zero byte for true
    Boolean(bool),
    /// Stored as 4-byte little-endian
    Int(i32),
    /// Stored as 8-byte little-endian
    Long(i64),
    /// Stored as 4-byte little-endian
    Float(OrderedFloat<f32>),
    /// Stored as 8-byte little-endian
    Double(OrderedFloat<f64>),
    /// Unscaled value of a decimal, the scale is defined by its type.
    Decimal(i128),
    /// Stores days from the 1970-01-01.
    Date(NaiveDate),
    /// Stores microseconds from midnight.
    Time(NaiveTime),
    /// Stores microseconds from 1970-01-01 00:00:00.000000
    Timestamp(NaiveDateTime),
    /// Stores microseconds from 1970-01-01 00:00:00.000000 UTC
    Timestampz(DateTime<Utc>),
    /// UTF-8 bytes (without length)
    String(String),
    /// 16-byte big-endian value
    Uuid(Uuid),
    /// Binary value
    Fixed(Vec<u8>),
    /// Binary value (without length)
    Binary(Vec<u8>),
}

impl Display for PrimitiveValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PrimitiveValue::Boolean(v) => write!(f, "{v}"),
            PrimitiveValue::Int(v) => write!(f, "{v}"),
            PrimitiveValue::Long(v) => write!(f, "{v}"),
            PrimitiveValue::Float(v) => write!(f, "{v}"),
            PrimitiveValue::Double(v) => write!(f, "{v}"),
            PrimitiveValue::Decimal(v) => write!(f, "{v}"),
            PrimitiveValue::Date(v) => write!(f, "{v}"),
            PrimitiveValue::Time(v) => write!(f, "{v}"),
            PrimitiveValue::Timestamp(v) => write!(f, "{v}"),
            PrimitiveValue::Timestampz(v) => write!(f, "{v}"),
            PrimitiveValue::String(v) => write!(f, "{v:?}"),
            PrimitiveValue::Uuid(v) => write!(f, "{v}"),
            PrimitiveValue::Fixed(v) | PrimitiveValue::Binary(v) => {
                write!(f, "0x{}", faster_hex::hex_string(v))
            }
        }
    }
}

impl From<bool> for PrimitiveValue {
    fn from(v: bool) -> Self {
        PrimitiveValue::Boolean(v)
    }
}

impl From<i32> for PrimitiveValue {
    fn from(v: i32) -> Self {
        PrimitiveValue::Int(v)
    }
}

impl From<i64> for PrimitiveValue {
    fn from(v: i64) -> Self {
        PrimitiveValue::Long(v)
    }
}

impl From<f32> for PrimitiveValue {
    fn from(v: f32) -> Self {
        PrimitiveValue::Float(OrderedFloat(v))
    }
}

impl From<f64> for PrimitiveValue {
    fn from(v: f64) -> Self {
        PrimitiveValue::Double(OrderedFloat(v))
    }
}

impl From<&str> for PrimitiveValue {
    fn from(v: &str) -> Self {
        PrimitiveValue::String(v.to_string())
    }
}

impl From<String> for PrimitiveValue {
    fn from(v: String) -> Self {
        PrimitiveValue::String(v)
    }
}

impl From<NaiveDate> for PrimitiveValue {
    fn from(v: NaiveDate) -> Self {
        PrimitiveValue::Date(v)
    }
}

pub(crate) fn epoch() -> NaiveDateTime {
    NaiveDateTime::default()
}

impl PrimitiveValue {
    /// Compare with another value of the same type.
    pub fn compare(&self, other: &PrimitiveValue) -> Option<Ordering> {
        use PrimitiveValue::*;
        match (self, other) {
            (Boolean(l), Boolean(r)) => Some(l.cmp(r)),
            (Int(l), Int(r)) => Some(l.cmp(r)),
            (Long(l), Long(r)) => Some(l.cmp(r)),
            (Float(l), Float(r)) => Some(l.cmp(r)),
            (Double(l), Double(r)) => Some(l.cmp(r)),
            (Decimal(l), Decimal(r)) => Some(l.cmp(r)),
            (Date(l), Date(r)) => Some(l.cmp(r)),
            (Time(l), Time(r)) => Some(l.cmp(r)),
            (Timestamp(l), Timestamp(r)) => Some(l.cmp(r)),
            (Timestampz(l), Timestampz(r)) => Some(l.cmp(r)),
            (String(l), String(r)) => Some(l.cmp(r)),
            (Uuid(l), Uuid(r)) => Some(l.cmp(r)),
            (Fixed(l), Fixed(r)) | (Binary(l), Binary(r)) => Some(l.cmp(r)),
            _ => None,
        }
    }

    /// Whether this value is NaN.
    pub fn is_nan(&self) -> bool {
        match self {
            PrimitiveValue::Float(v) => v.is_nan(),
            PrimitiveValue::Double(v) => v.is_nan(),
            _ => false,
        }
    }

    /// Check whether this value can be stored in a column of type `ty`.
    pub fn matches_type(&self, ty: &Primitive) -> bool {
        matches!(
            (self, ty),
            (PrimitiveValue::Boolean(_), Primitive::Boolean)
                | (PrimitiveValue::Int(_), Primitive::Int)
                | (PrimitiveValue::Long(_), Primitive::Long)
                | (PrimitiveValue::Float(_), Primitive::Float)
                | (PrimitiveValue::Double(_), Primitive::Double)
                | (PrimitiveValue::Decimal(_), Primitive::Decimal { .. })
                | (PrimitiveValue::Date(_), Primitive::Date)
                | (PrimitiveValue::Time(_), Primitive::Time)
                | (PrimitiveValue::Timestamp(_), Primitive::Timestamp)
                | (PrimitiveValue::Timestampz(_), Primitive::Timestampz)
                | (PrimitiveValue::String(_), Primitive::String)
                | (PrimitiveValue::Uuid(_), Primitive::Uuid)
                | (PrimitiveValue::Fixed(_), Primitive::Fixed(_))
                | (PrimitiveValue::Binary(_), Primitive::Binary)
        )
    }

    /// Convert this literal into a value of type `ty`.
    pub fn to(&self, ty: &Primitive) -> Result<PrimitiveValue> {
        if self.matches_type(ty) {
            return Ok(self.clone());
        }

        let converted = match (self, ty) {
            (PrimitiveValue::Int(v), Primitive::Long) => Some(PrimitiveValue::Long(*v as i64)),
            (PrimitiveValue::Int(v), Primitive::Float) => Some(PrimitiveValue::from(*v as f32)),
            (PrimitiveValue::Int(v), Primitive::Double) => Some(PrimitiveValue::from(*v as f64)),
            (PrimitiveValue::Int(v), Primitive::Date) => {
                let days = chrono::Duration::days(*v as i64);
                Some(PrimitiveValue::Date(epoch().date() + days))
            }
            (PrimitiveValue::Int(v), Primitive::Decimal { scale, .. }) => Some(
                PrimitiveValue::Decimal(*v as i128 * 10_i128.pow(*scale as u32)),
            ),
            (PrimitiveValue::Long(v), Primitive::Int) => {
                i32::try_from(*v).ok().map(PrimitiveValue::Int)
            }
            (PrimitiveValue::Long(v), Primitive::Float) => Some(PrimitiveValue::from(*v as f32)),
            (PrimitiveValue::Long(v), Primitive::Double) => Some(PrimitiveValue::from(*v as f64)),
            (PrimitiveValue::Long(v), Primitive::Decimal { scale, .. }) => Some(
                PrimitiveValue::Decimal(*v as i128 * 10_i128.pow(*scale as u32)),
            ),
            (PrimitiveValue::Long(v), Primitive::Timestamp) => Some(PrimitiveValue::Timestamp(
                epoch() + chrono::Duration::microseconds(*v),
            )),
            (PrimitiveValue::Long(v), Primitive::Timestampz) => Some(PrimitiveValue::Timestampz(
                (epoch() + chrono::Duration::microseconds(*v)).and_utc(),
            )),
            (PrimitiveValue::Float(v), Primitive::Double) => {
                Some(PrimitiveValue::from(v.0 as f64))
            }
            (PrimitiveValue::Double(v), Primitive::Float) => {
                Some(PrimitiveValue::from(v.0 as f32))
            }
            (PrimitiveValue::String(v), Primitive::Date) => NaiveDate::from_str(v)
                .ok()
                .map(PrimitiveValue::Date),
            (PrimitiveValue::String(v), Primitive::Time) => NaiveTime::from_str(v)
                .ok()
                .map(PrimitiveValue::Time),
            (PrimitiveValue::String(v), Primitive::Timestamp) => NaiveDateTime::from_str(v)
                .ok()
                .map(PrimitiveValue::Timestamp),
            (PrimitiveValue::String(v), Primitive::Timestampz) => DateTime::parse_from_rfc3339(v)
                .ok()
                .map(|v| PrimitiveValue::Timestampz(v.with_timezone(&Utc))),
            (PrimitiveValue::String(v), Primitive::Uuid) => {
                Uuid::from_str(v).ok().map(PrimitiveValue::Uuid)
            }
            (PrimitiveValue::Binary(v), Primitive::Fixed(len)) if v.len() as u64 == *len => {
                Some(PrimitiveValue::Fixed(v.clone()))
            }
            (PrimitiveValue::Fixed(v), Primitive::Binary) => Some(PrimitiveValue::Binary(v.clone())),
            _ => None,
        };

        converted.ok_or_else(|| {
            Error::new(
                ErrorKind::DataInvalid,
                format!("literal {self} can't be converted to {ty}"),
            )
        })
    }

    /// Days from 1970-01-01 of a date value.
    pub(crate) fn days_from_epoch(date: &NaiveDate) -> i64 {
        date.signed_duration_since(epoch().date()).num_days()
    }

    /// Microseconds from 1970-01-01 00:00:00 of a timestamp value.
    pub(crate) fn micros_from_epoch(ts: &NaiveDateTime) -> i64 {
        ts.signed_duration_since(epoch())
            .num_microseconds()
            .unwrap_or(i64::MAX)
    }

    /// Microseconds from midnight of a time value.
    pub(crate) fn micros_from_midnight(t: &NaiveTime) -> i64 {
        t.num_seconds_from_midnight() as i64 * 1_000_000 + (t.nanosecond() / 1_000) as i64
    }
}

/// FieldRef is a reference to a field.
pub type FieldRef = Arc<Field>;

/// A struct is a tuple of typed values.
#[derive(Default, Debug, Clone)]
pub struct Struct {
    fields: Vec<FieldRef>,
    id_lookup: HashMap<i32, FieldRef>,
}

impl PartialEq for Struct {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for Struct {}

impl Struct {
    /// Create a new struct.
    pub fn new(fields: Vec<FieldRef>) -> Self {
        let mut id_lookup = HashMap::new();
        Struct::fetch_struct_field_id_map(&fields, &mut id_lookup);
        Struct { fields, id_lookup }
    }

    fn fetch_any_field_id_map(ty: &Any, map: &mut HashMap<i32, FieldRef>) {
        match ty {
            Any::Primitive(_) => {}
            Any::Struct(inner) => Self::fetch_struct_field_id_map(&inner.fields, map),
            Any::List(list) => {
                Self::fetch_any_field_id_map(&list.element_type, map);
            }
            Any::Map(m) => {
                Self::fetch_any_field_id_map(&m.key_type, map);
                Self::fetch_any_field_id_map(&m.value_type, map);
            }
        }
    }

    fn fetch_struct_field_id_map(fields: &[FieldRef], map: &mut HashMap<i32, FieldRef>) {
        for field in fields {
            map.insert(field.id, field.clone());
            Self::fetch_any_field_id_map(&field.field_type, map);
        }
    }

    /// Return the number of fields in the struct.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the struct is empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Return the fields in the struct.
    pub fn fields(&self) -> &[FieldRef] {
        &self.fields
    }

    /// Lookup the field type according to the field id.
    pub fn lookup_type(&self, field_id: i32) -> Option<Any> {
        self.id_lookup
            .get(&field_id)
            .map(|field| field.field_type.clone())
    }

    /// Lookup the field according to the field id, nested fields included.
    pub fn lookup_field(&self, field_id: i32) -> Option<&FieldRef> {
        self.id_lookup.get(&field_id)
    }

    /// Lookup a field by its (possibly dotted) name.
    pub fn lookup_field_by_name(&self, name: &str, case_sensitive: bool) -> Option<&FieldRef> {
        let (head, rest) = match name.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (name, None),
        };
        let field = self.fields.iter().find(|f| {
            if case_sensitive {
                f.name == head
            } else {
                f.name.eq_ignore_ascii_case(head)
            }
        })?;
        match (rest, &field.field_type) {
            (None, _) => Some(field),
            (Some(rest), Any::Struct(inner)) => inner.lookup_field_by_name(rest, case_sensitive),
            _ => None,
        }
    }
}

/// A Field is the field of a struct.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Field {
    /// An integer id that is unique in the table schema
    pub id: i32,
    /// Field Name
    pub name: String,
    /// Optional or required, meaning that values can (or can not be) null
    pub required: bool,
    /// Field can have any type
    pub field_type: Any,
    /// Fields can have any optional comment or doc string.
    pub comment: Option<String>,
}

impl Field {
    /// Create a required field.
    pub fn required(id: i32, name: impl Into<String>, r#type: impl Into<Any>) -> Self {
        Self {
            id,
            name: name.into(),
            required: true,
            field_type: r#type.into(),
            comment: None,
        }
    }

    /// Create an optional field.
    pub fn optional(id: i32, name: impl Into<String>, r#type: impl Into<Any>) -> Self {
        Self {
            id,
            name: name.into(),
            required: false,
            field_type: r#type.into(),
            comment: None,
        }
    }

    /// Attach a doc string.
    pub fn with_comment(mut self, doc: impl Into<String>) -> Self {
        self.comment = Some(doc.into());
        self
    }
}

/// A partition tuple, one optional value per partition field.
#[derive(Debug, Default, PartialEq, Eq, Clone, Hash)]
pub struct StructValue {
    fields: Vec<Option<PrimitiveValue>>,
}

impl From<Vec<Option<PrimitiveValue>>> for StructValue {
    fn from(fields: Vec<Option<PrimitiveValue>>) -> Self {
        Self { fields }
    }
}

impl StructValue {
    /// Create a tuple from values.
    pub fn new(fields: Vec<Option<PrimitiveValue>>) -> Self {
        Self { fields }
    }

    /// Tuple without values, used by unpartitioned specs.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Values of the tuple.
    pub fn fields(&self) -> &[Option<PrimitiveValue>] {
        &self.fields
    }

    /// Value at `pos`.
    pub fn get(&self, pos: usize) -> Option<&PrimitiveValue> {
        self.fields.get(pos).and_then(|v| v.as_ref())
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the tuple is empty.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check that this tuple fits `partition_type`.
    pub fn conforms_to(&self, partition_type: &Struct) -> bool {
        self.fields.len() == partition_type.len()
            && self
                .fields
                .iter()
                .zip(partition_type.fields())
                .all(|(value, field)| match (value, field.field_type.as_primitive()) {
                    (None, _) => true,
                    (Some(v), Some(ty)) => v.matches_type(ty),
                    (Some(_), None) => false,
                })
    }
}

impl Display for StructValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{")?;
        for (idx, v) in self.fields.iter().enumerate() {
            if idx > 0 {
                write!(f, ", ")?;
            }
            match v {
                Some(v) => write!(f, "{v}")?,
                None => write!(f, "null")?,
            }
        }
        write!(f, "}}")
    }
}

/// A list is a collection of values with some element type.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct List {
    /// an element id that is unique in the table schema.
    pub element_id: i32,
    /// Optional or required, meaning that values can (or can not be) null
    pub element_required: bool,
    /// Element can be any type
    pub element_type: Box<Any>,
}

/// A map is a collection of key-value pairs with a key type and a value type.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Map {
    /// an element id that is unique in the table schema.
    pub key_id: i32,
    /// Map key's type, it can be any type.
    pub key_type: Box<Any>,
    /// an element id that is unique in the table schema.
    pub value_id: i32,
    /// Optional or required, meaning that values can (or can not be) null
    pub value_required: bool,
    /// Map value's type, it can be any type.
    pub value_type: Box<Any>,
}

/// A table’s schema is a list of named columns.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Schema {
    /// The unique id for this schema.
    pub schema_id: i32,
    /// A schema can optionally track the set of primitive fields that
    /// identify rows in a table, using the property identifier-field-ids
    pub identifier_field_ids: Option<Vec<i32>>,
    r#struct: Struct,
}

impl Schema {
    /// Create a schema
    pub fn new(schema_id: i32, identifier_field_ids: Option<Vec<i32>>, r#struct: Struct) -> Self {
        Schema {
            schema_id,
            identifier_field_ids,
            r#struct,
        }
    }

    /// Return the fields of the schema
    pub fn fields(&self) -> &[FieldRef] {
        self.r#struct.fields()
    }

    /// Return the struct of the schema
    pub fn as_struct(&self) -> &Struct {
        &self.r#struct
    }

    /// Look up field by field id, nested fields included.
    pub fn look_up_field_by_id(&self, field_id: i32) -> Option<&FieldRef> {
        self.r#struct.lookup_field(field_id)
    }

    /// Look up field by name.
    pub fn look_up_field_by_name(&self, name: &str, case_sensitive: bool) -> Option<&FieldRef> {
        self.r#struct.lookup_field_by_name(name, case_sensitive)
    }

    /// Highest field id used by this schema.
    pub fn highest_field_id(&self) -> i32 {
        self.r#struct.id_lookup.keys().copied().max().unwrap_or(0)
    }
}

/// Transform is used to transform predicates to partition predicates,
/// in addition to transforming data values.
///
/// All transforms must return `null` for a `null` input value.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Transform {
    /// Source value, unmodified
    Identity,
    /// Hash of value, mod `N`.
    ///
    /// ```text
    /// def bucket_N(x) = (murmur3_x86_32_hash(x) & Integer.MAX_VALUE) % N
    /// ```
    Bucket(i32),
    /// Value truncated to width `W`
    Truncate(i32),
    /// Extract a date or timestamp year, as years from 1970
    Year,
    /// Extract a date or timestamp month, as months from 1970-01-01
    Month,
    /// Extract a date or timestamp day, as days from 1970-01-01
    Day,
    /// Extract a timestamp hour, as hours from 1970-01-01 00:00:00
    Hour,
    /// Always produces `null`
    Void,
}

impl Transform {
    /// Result type of this transform applied on `input_type`.
    pub fn result_type(&self, input_type: &Any) -> Result<Any> {
        let input = input_type.as_primitive().ok_or_else(|| {
            Error::new(
                ErrorKind::DataInvalid,
                format!("transform {self} can't be applied on nested type {input_type:?}"),
            )
        })?;

        if let Transform::Bucket(n) | Transform::Truncate(n) = self {
            if *n <= 0 {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    format!("transform {self} needs a positive argument"),
                ));
            }
        }

        let accepted = match self {
            Transform::Identity | Transform::Void => true,
            Transform::Year | Transform::Month | Transform::Day => matches!(
                input,
                Primitive::Date | Primitive::Timestamp | Primitive::Timestampz
            ),
            Transform::Hour => matches!(input, Primitive::Timestamp | Primitive::Timestampz),
            Transform::Bucket(_) => matches!(
                input,
                Primitive::Int
                    | Primitive::Long
                    | Primitive::Decimal { .. }
                    | Primitive::Date
                    | Primitive::Time
                    | Primitive::Timestamp
                    | Primitive::Timestampz
                    | Primitive::String
                    | Primitive::Uuid
                    | Primitive::Fixed(_)
                    | Primitive::Binary
            ),
            Transform::Truncate(_) => matches!(
                input,
                Primitive::Int
                    | Primitive::Long
                    | Primitive::Decimal { .. }
                    | Primitive::String
                    | Primitive::Binary
            ),
        };
        if !accepted {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("transform {self} type {input} is invalid"),
            ));
        }

        match self {
            Transform::Identity | Transform::Truncate(_) | Transform::Void => {
                Ok(input_type.clone())
            }
            _ => Ok(Primitive::Int.into()),
        }
    }
}

impl Display for Transform {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Transform::Identity => write!(f, "identity"),
            Transform::Year => write!(f, "year"),
            Transform::Month => write!(f, "month"),
            Transform::Day => write!(f, "day"),
            Transform::Hour => write!(f, "hour"),
            Transform::Void => write!(f, "void"),
            Transform::Bucket(length) => write!(f, "bucket[{}]", length),
            Transform::Truncate(width) => write!(f, "truncate[{}]", width),
        }
    }
}

impl FromStr for Transform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parse_arg = |v: &str, prefix: &str| -> Result<i32> {
            let arg: i32 = v
                .strip_prefix(prefix)
                .unwrap_or_default()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .parse()
                .map_err(|err| {
                    Error::new(
                        ErrorKind::DataInvalid,
                        format!("transform {prefix} type {v:?} is invalid"),
                    )
                    .set_source(err)
                })?;
            if arg <= 0 {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    format!("transform {v:?} needs a positive argument"),
                ));
            }
            Ok(arg)
        };

        let t = match s {
            "identity" => Transform::Identity,
            "year" => Transform::Year,
            "month" => Transform::Month,
            "day" => Transform::Day,
            "hour" => Transform::Hour,
            "void" => Transform::Void,
            v if v.starts_with("bucket") => Transform::Bucket(parse_arg(v, "bucket")?),
            v if v.starts_with("truncate") => Transform::Truncate(parse_arg(v, "truncate")?),
            v => {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    format!("transform {v:?} is invalid"),
                ))
            }
        };

        Ok(t)
    }
}

/// Tables are configured with a partition spec that defines how to produce
/// a tuple of partition values from a record.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PartitionSpec {
    /// The spec id.
    pub spec_id: i32,
    /// Partition fields.
    pub fields: Vec<PartitionField>,
}

impl PartitionSpec {
    /// The spec every table starts with.
    pub fn unpartitioned() -> Self {
        Self {
            spec_id: UNPARTITIONED_SPEC_ID,
            fields: vec![],
        }
    }

    /// Struct type of the partition tuples produced by this spec.
    pub fn partition_type(&self, schema: &Schema) -> Result<Struct> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for partition_field in &self.fields {
            let source_field = schema
                .look_up_field_by_id(partition_field.source_column_id)
                .ok_or_else(|| {
                    Error::new(
                        ErrorKind::DataInvalid,
                        format!(
                            "Can't find field id {} in schema",
                            partition_field.source_column_id
                        ),
                    )
                })?;
            let result_type = partition_field
                .transform
                .result_type(&source_field.field_type)?;
            fields.push(
                Field::optional(
                    partition_field.partition_field_id,
                    partition_field.name.as_str(),
                    result_type,
                )
                .into(),
            );
        }

        Ok(Struct::new(fields))
    }

    /// Source column ids of all partition fields.
    pub fn column_ids(&self) -> Vec<i32> {
        self.fields
            .iter()
            .map(|field| field.source_column_id)
            .collect()
    }

    /// Check if this partition spec is unpartitioned.
    ///
    /// Specs made only of void transforms don't partition anything.
    pub fn is_unpartitioned(&self) -> bool {
        self.fields.iter().all(|f| f.transform == Transform::Void)
    }

    /// Highest partition field id in this spec.
    pub fn highest_field_id(&self) -> Option<i32> {
        self.fields.iter().map(|f| f.partition_field_id).max()
    }
}

/// Field of the specified partition spec.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PartitionField {
    /// A source column id from the table’s schema
    pub source_column_id: i32,
    /// A partition field id that is used to identify a partition field
    /// and is unique across all partition specs.
    pub partition_field_id: i32,
    /// A transform that is applied to the source column to produce
    /// a partition value
    pub transform: Transform,
    /// A partition name
    pub name: String,
}

/// Snapshots are embedded in table metadata, but the list of manifests for a
/// snapshot are stored in a separate manifest list file.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct ManifestListEntry {
    /// Location of the manifest file
    pub manifest_path: String,
    /// Length of the manifest file in bytes
    pub manifest_length: i64,
    /// ID of a partition spec used to write the manifest
    pub partition_spec_id: i32,
    /// The type of files tracked by the manifest, either data or delete files
    pub content: ManifestContentType,
    /// The sequence number when the manifest was added to the table
    pub sequence_number: i64,
    /// The minimum data sequence number of all live data or delete files
    /// in the manifest
    pub min_sequence_number: i64,
    /// ID of the snapshot where the manifest file was added
    pub added_snapshot_id: i64,
    /// Number of entries in the manifest that have status ADDED
    pub added_data_files_count: i32,
    /// Number of entries in the manifest that have status EXISTING
    pub existing_data_files_count: i32,
    /// Number of entries in the manifest that have status DELETED
    pub deleted_data_files_count: i32,
    /// Number of rows in all of files in the manifest that have status ADDED
    pub added_rows_count: i64,
    /// Number of rows in all of files in the manifest that have status EXISTING
    pub existing_rows_count: i64,
    /// Number of rows in all of files in the manifest that have status DELETED
    pub deleted_rows_count: i64,
    /// A list of field summaries for each partition field in the spec.
    pub partitions: Vec<FieldSummary>,
}

impl ManifestListEntry {
    /// Whether the manifest still tracks live files.
    pub fn has_live_files(&self) -> bool {
        self.added_data_files_count > 0 || self.existing_data_files_count > 0
    }
}

/// Field summary for partition field in the spec.
///
/// Each field of the list corresponds to a field in the manifest file’s partition spec.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct FieldSummary {
    /// Whether the manifest contains at least one partition with a null
    /// value for the field
    pub contains_null: bool,
    /// Whether the manifest contains at least one partition with a NaN
    /// value for the field
    pub contains_nan: Option<bool>,
    /// Lower bound for the non-null, non-NaN values in the partition field,
    /// or null if all values are null or NaN.
    pub lower_bound: Option<PrimitiveValue>,
    /// Upper bound for the non-null, non-NaN values in the partition field,
    /// or null if all values are null or NaN.
    pub upper_bound: Option<PrimitiveValue>,
}

impl FieldSummary {
    /// Widen this summary with one partition value.
    pub fn update(&mut self, value: Option<&PrimitiveValue>) {
        let Some(value) = value else {
            self.contains_null = true;
            return;
        };
        if value.is_nan() {
            self.contains_nan = Some(true);
            return;
        }
        if self
            .lower_bound
            .as_ref()
            .map_or(true, |lower| value.compare(lower) == Some(Ordering::Less))
        {
            self.lower_bound = Some(value.clone());
        }
        if self
            .upper_bound
            .as_ref()
            .map_or(true, |upper| value.compare(upper) == Some(Ordering::Greater))
        {
            self.upper_bound = Some(value.clone());
        }
    }
}

/// A manifest is an immutable file that lists data files or delete
/// files, along with each file’s partition data tuple, metrics, and tracking
/// information.
#[derive(Debug, PartialEq, Clone)]
pub struct ManifestEntry {
    /// Used to track additions and deletions.
    pub status: ManifestStatus,
    /// Snapshot id where the file was added, or deleted if status is 2.
    /// Inherited when null.
    pub snapshot_id: Option<i64>,
    /// Data sequence number of the file.
    /// Inherited when null and status is 1 (added).
    pub sequence_number: Option<i64>,
    /// File sequence number indicating when the file was added.
    /// Inherited when null and status is 1 (added).
    pub file_sequence_number: Option<i64>,
    /// File path, partition tuple, metrics, …
    pub data_file: DataFile,
}

impl ManifestEntry {
    /// Check if this manifest entry is deleted.
    pub fn is_alive(&self) -> bool {
        matches!(self.status, ManifestStatus::Added | ManifestStatus::Existing)
    }

    /// Data sequence number, only known after inheritance.
    pub fn data_sequence_number(&self) -> i64 {
        self.sequence_number.unwrap_or_default()
    }

    /// Inherit snapshot id and sequence numbers from the manifest that
    /// lists this entry.
    pub(crate) fn inherit(&mut self, manifest: &ManifestListEntry) {
        if self.snapshot_id.is_none() {
            self.snapshot_id = Some(manifest.added_snapshot_id);
        }
        if self.status == ManifestStatus::Added {
            if self.sequence_number.is_none() {
                self.sequence_number = Some(manifest.sequence_number);
            }
            if self.file_sequence_number.is_none() {
                self.file_sequence_number = Some(manifest.sequence_number);
            }
        }
        self.data_file.spec_id = manifest.partition_spec_id;
    }
}

/// Metadata of a manifest that is stored in the header of the file.
#[derive(Debug, PartialEq, Clone)]
pub struct ManifestMetadata {
    /// The table schema at the time the manifest was written
    pub schema: Schema,
    /// The partition spec used to write the manifest
    pub partition_spec: PartitionSpec,
    /// Table format version number of the manifest
    pub format_version: TableFormatVersion,
    /// Type of content files tracked by the manifest: “data” or “deletes”
    pub content: ManifestContentType,
}

/// Type of content files tracked by a manifest.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ManifestContentType {
    /// The manifest content is data.
    Data = 0,
    /// The manifest content is deletes.
    Deletes = 1,
}

impl Display for ManifestContentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestContentType::Data => write!(f, "data"),
            ManifestContentType::Deletes => write!(f, "deletes"),
        }
    }
}

impl FromStr for ManifestContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "data" => Ok(ManifestContentType::Data),
            "deletes" => Ok(ManifestContentType::Deletes),
            _ => Err(Error::new(
                ErrorKind::DataInvalid,
                format!("Invalid manifest content type: {s}"),
            )),
        }
    }
}

impl TryFrom<u8> for ManifestContentType {
    type Error = Error;

    fn try_from(v: u8) -> Result<ManifestContentType> {
        match v {
            0 => Ok(ManifestContentType::Data),
            1 => Ok(ManifestContentType::Deletes),
            _ => Err(Error::new(
                ErrorKind::DataInvalid,
                format!("manifest content type {} is invalid", v),
            )),
        }
    }
}

/// Used to track additions and deletions in ManifestEntry.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ManifestStatus {
    /// Value: 0
    Existing = 0,
    /// Value: 1
    Added = 1,
    /// Value: 2
    ///
    /// Deletes are informational only and not used in scans.
    Deleted = 2,
}

impl TryFrom<u8> for ManifestStatus {
    type Error = Error;

    fn try_from(v: u8) -> Result<ManifestStatus> {
        match v {
            0 => Ok(ManifestStatus::Existing),
            1 => Ok(ManifestStatus::Added),
            2 => Ok(ManifestStatus::Deleted),
            _ => Err(Error::new(
                ErrorKind::DataInvalid,
                format!("manifest status {} is invalid", v),
            )),
        }
    }
}

/// Data file carries data file path, partition tuple, metrics, …
///
/// Delete files share this structure, their kind is told by `content`.
#[derive(Debug, PartialEq, Clone, Builder)]
#[builder(
    name = "DataFileBuilder",
    setter(prefix = "with"),
    build_fn(error = "Error")
)]
pub struct DataFile {
    /// Type of content stored by the data file: data, equality deletes,
    /// or position deletes.
    #[builder(default = "DataContentType::Data")]
    pub content: DataContentType,
    /// Full URI for the file with FS scheme
    #[builder(setter(into))]
    pub file_path: String,
    /// String file format name, avro, orc or parquet
    #[builder(default = "DataFileFormat::Parquet")]
    pub file_format: DataFileFormat,
    /// Partition data tuple, schema based on the partition spec output using
    /// partition field ids for the struct field ids
    #[builder(default)]
    pub partition: StructValue,
    /// Id of the partition spec the partition tuple belongs to.
    ///
    /// Not stored with the file, it's taken from the manifest listing it.
    #[builder(default)]
    pub spec_id: i32,
    /// Number of records in this file
    pub record_count: i64,
    /// Total file size in bytes
    pub file_size_in_bytes: i64,
    /// Map from column id to the total size on disk of all regions that
    /// store the column.
    #[builder(setter(strip_option), default)]
    pub column_sizes: Option<HashMap<i32, i64>>,
    /// Map from column id to number of values in the column (including null
    /// and NaN values)
    #[builder(setter(strip_option), default)]
    pub value_counts: Option<HashMap<i32, i64>>,
    /// Map from column id to number of null values in the column
    #[builder(setter(strip_option), default)]
    pub null_value_counts: Option<HashMap<i32, i64>>,
    /// Map from column id to number of NaN values in the column
    #[builder(setter(strip_option), default)]
    pub nan_value_counts: Option<HashMap<i32, i64>>,
    /// Map from column id to lower bound in the column.
    /// Each value must be less than or equal to all non-null, non-NaN values
    /// in the column for the file.
    #[builder(setter(strip_option), default)]
    pub lower_bounds: Option<HashMap<i32, PrimitiveValue>>,
    /// Map from column id to upper bound in the column.
    /// Each value must be greater than or equal to all non-null, non-Nan
    /// values in the column for the file.
    #[builder(setter(strip_option), default)]
    pub upper_bounds: Option<HashMap<i32, PrimitiveValue>>,
    /// Split offsets for the data file, sorted ascending.
    #[builder(setter(strip_option), default)]
    pub split_offsets: Option<Vec<i64>>,
    /// Field ids used to determine row equality in equality delete files.
    #[builder(setter(strip_option), default)]
    pub equality_ids: Option<Vec<i32>>,
    /// ID representing sort order for this file.
    #[builder(setter(strip_option), default)]
    pub sort_order_id: Option<i32>,
}

impl DataFile {
    /// Builder of data and delete files.
    pub fn builder() -> DataFileBuilder {
        DataFileBuilder::default()
    }

    /// Whether this is a delete file.
    pub fn is_delete(&self) -> bool {
        self.content != DataContentType::Data
    }

    /// Path referenced by a position delete file, known when the lower and
    /// upper bounds of its `file_path` column are the same.
    pub fn referenced_data_file(&self) -> Option<&str> {
        if self.content != DataContentType::PositionDeletes {
            return None;
        }
        let lower = self.lower_bounds.as_ref()?.get(&DELETE_FILE_PATH_FIELD_ID)?;
        let upper = self.upper_bounds.as_ref()?.get(&DELETE_FILE_PATH_FIELD_ID)?;
        match (lower, upper) {
            (PrimitiveValue::String(lower), PrimitiveValue::String(upper)) if lower == upper => {
                Some(lower.as_str())
            }
            _ => None,
        }
    }

    pub(crate) fn lower_bound(&self, field_id: i32) -> Option<&PrimitiveValue> {
        self.lower_bounds.as_ref().and_then(|m| m.get(&field_id))
    }

    pub(crate) fn upper_bound(&self, field_id: i32) -> Option<&PrimitiveValue> {
        self.upper_bounds.as_ref().and_then(|m| m.get(&field_id))
    }

    pub(crate) fn null_count(&self, field_id: i32) -> Option<i64> {
        self.null_value_counts
            .as_ref()
            .and_then(|m| m.get(&field_id))
            .copied()
    }

    pub(crate) fn value_count(&self, field_id: i32) -> Option<i64> {
        self.value_counts
            .as_ref()
            .and_then(|m| m.get(&field_id))
            .copied()
    }

    pub(crate) fn nan_count(&self, field_id: i32) -> Option<i64> {
        self.nan_value_counts
            .as_ref()
            .and_then(|m| m.get(&field_id))
            .copied()
    }
}

/// Type of content stored by the data file: data, equality deletes, or
/// position deletes (all v1 files are data files)
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum DataContentType {
    /// value: 0
    Data = 0,
    /// value: 1
    PositionDeletes = 1,
    /// value: 2
    EqualityDeletes = 2,
}

impl TryFrom<u8> for DataContentType {
    type Error = Error;

    fn try_from(v: u8) -> Result<DataContentType> {
        match v {
            0 => Ok(DataContentType::Data),
            1 => Ok(DataContentType::PositionDeletes),
            2 => Ok(DataContentType::EqualityDeletes),
            _ => Err(Error::new(
                ErrorKind::DataInvalid,
                format!("data content type {} is invalid", v),
            )),
        }
    }
}

/// Format of this data.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DataFileFormat {
    /// Avro file format: <https://avro.apache.org/>
    Avro,
    /// Orc file format: <https://orc.apache.org/>
    Orc,
    /// Parquet file format: <https://parquet.apache.org/>
    Parquet,
}

impl FromStr for DataFileFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "avro" => Ok(Self::Avro),
            "orc" => Ok(Self::Orc),
            "parquet" => Ok(Self::Parquet),
            _ => Err(Error::new(
                ErrorKind::DataInvalid,
                format!("Unsupported data file format: {}", s),
            )),
        }
    }
}

impl Display for DataFileFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DataFileFormat::Avro => f.write_str("avro"),
            DataFileFormat::Orc => f.write_str("orc"),
            DataFileFormat::Parquet => f.write_str("parquet"),
        }
    }
}

/// Snapshot of contains all data of a table at a point in time.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Snapshot {
    /// A unique long ID
    pub snapshot_id: i64,
    /// The snapshot ID of the snapshot’s parent. Omitted for any snapshot
    /// with no parent
    pub parent_snapshot_id: Option<i64>,
    /// A monotonically increasing long that tracks the order of changes to a
    /// table
    pub sequence_number: i64,
    /// A timestamp when the snapshot was created, used for garbage
    /// collection and table inspection
    pub timestamp_ms: i64,
    /// The location of a manifest list for this snapshot that tracks
    /// manifest files with additional metadata
    pub manifest_list: String,
    /// A string map that summarizes the snapshot changes, including
    /// operation (see below)
    pub summary: HashMap<String, String>,
    /// ID of the table’s current schema when the snapshot was created
    pub schema_id: Option<i64>,
}

impl Snapshot {
    /// Operation that produced this snapshot.
    pub fn operation(&self) -> Option<&str> {
        self.summary
            .get(SnapshotSummaryBuilder::OPERATION)
            .map(|v| v.as_str())
    }

    /// Number of data files this snapshot added, zero when not recorded.
    pub fn added_data_files(&self) -> i64 {
        self.summary
            .get(SnapshotSummaryBuilder::ADDED_DATA_FILES)
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    pub(crate) fn log(&self) -> SnapshotLog {
        SnapshotLog {
            timestamp_ms: self.timestamp_ms,
            snapshot_id: self.snapshot_id,
        }
    }
}

/// Operation recorded in a snapshot summary.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SnapshotOperation {
    /// Only data files were added.
    Append,
    /// Data files were removed and added, usually to replace content.
    Overwrite,
    /// Data files were rewritten without changing content.
    Replace,
    /// Data files were removed or delete files were added.
    Delete,
}

impl Display for SnapshotOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotOperation::Append => f.write_str("append"),
            SnapshotOperation::Overwrite => f.write_str("overwrite"),
            SnapshotOperation::Replace => f.write_str("replace"),
            SnapshotOperation::Delete => f.write_str("delete"),
        }
    }
}

/// Accumulates file changes of a pending snapshot into its summary.
#[derive(Default)]
pub struct SnapshotSummaryBuilder {
    added_data_files: i64,
    removed_data_files: i64,
    added_delete_files: i64,
    added_equality_delete_files: i64,
    added_position_delete_files: i64,

    added_data_records: i64,
    removed_data_records: i64,
    added_position_deletes_records: i64,
    added_equality_deletes_records: i64,

    added_files_size: i64,
    removed_files_size: i64,
}

impl SnapshotSummaryBuilder {
    const OPERATION: &'static str = "operation";
    const ADDED_DATA_FILES: &'static str = "added-data-files";
    const DELETED_DATA_FILES: &'static str = "deleted-data-files";
    const TOTAL_DATA_FILES: &'static str = "total-data-files";
    const ADDED_DELETE_FILES: &'static str = "added-delete-files";
    const ADDED_EQUALITY_DELETE_FILES: &'static str = "added-equality-delete-files";
    const ADDED_POSITION_DELETE_FILES: &'static str = "added-position-delete-files";
    const TOTAL_DELETE_FILES: &'static str = "total-delete-files";
    const ADDED_RECORDS: &'static str = "added-records";
    const DELETED_RECORDS: &'static str = "deleted-records";
    const TOTAL_RECORDS: &'static str = "total-records";
    const ADDED_POSITION_DELETES: &'static str = "added-position-deletes";
    const TOTAL_POSITION_DELETES: &'static str = "total-position-deletes";
    const ADDED_EQUALITY_DELETES: &'static str = "added-equality-deletes";
    const TOTAL_EQUALITY_DELETES: &'static str = "total-equality-deletes";
    const ADDED_FILES_SIZE: &'static str = "added-files-size";
    const REMOVED_FILES_SIZE: &'static str = "removed-files-size";
    const TOTAL_FILES_SIZE: &'static str = "total-files-size";

    /// Create an empty builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Record an added data or delete file.
    pub fn add(&mut self, datafile: &DataFile) {
        match datafile.content {
            DataContentType::Data => {
                self.added_data_files += 1;
                self.added_data_records += datafile.record_count;
            }
            DataContentType::PositionDeletes => {
                self.added_delete_files += 1;
                self.added_position_delete_files += 1;
                self.added_position_deletes_records += datafile.record_count;
            }
            DataContentType::EqualityDeletes => {
                self.added_delete_files += 1;
                self.added_equality_delete_files += 1;
                self.added_equality_deletes_records += datafile.record_count;
            }
        }
        self.added_files_size += datafile.file_size_in_bytes;
    }

    /// Record a removed data file.
    pub fn remove(&mut self, datafile: &DataFile) {
        self.removed_data_files += 1;
        self.removed_data_records += datafile.record_count;
        self.removed_files_size += datafile.file_size_in_bytes;
    }

    /// Merge the accumulated changes into the totals of the parent summary.
    pub fn merge(
        self,
        operation: SnapshotOperation,
        last_summary: Option<&HashMap<String, String>>,
    ) -> Result<HashMap<String, String>> {
        let empty = HashMap::new();
        let last_summary = last_summary.unwrap_or(&empty);

        #[inline]
        fn get_i64(value: &HashMap<String, String>, key: &str) -> Result<i64> {
            value
                .get(key)
                .map(|val| val.parse::<i64>())
                .transpose()
                .map_err(|e| {
                    Error::new(
                        ErrorKind::DataInvalid,
                        format!("snapshot summary {key} is not a number"),
                    )
                    .set_source(e)
                })
                .map(|v| v.unwrap_or_default())
        }

        let total_data_files = get_i64(last_summary, Self::TOTAL_DATA_FILES)?
            + self.added_data_files
            - self.removed_data_files;
        let total_delete_files =
            get_i64(last_summary, Self::TOTAL_DELETE_FILES)? + self.added_delete_files;
        let total_records = get_i64(last_summary, Self::TOTAL_RECORDS)?
            + self.added_data_records
            - self.removed_data_records;
        let total_position_deletes = get_i64(last_summary, Self::TOTAL_POSITION_DELETES)?
            + self.added_position_deletes_records;
        let total_equality_deletes = get_i64(last_summary, Self::TOTAL_EQUALITY_DELETES)?
            + self.added_equality_deletes_records;
        let total_files_size = get_i64(last_summary, Self::TOTAL_FILES_SIZE)?
            + self.added_files_size
            - self.removed_files_size;

        let pairs = [
            (Self::ADDED_DATA_FILES, self.added_data_files),
            (Self::DELETED_DATA_FILES, self.removed_data_files),
            (Self::TOTAL_DATA_FILES, total_data_files),
            (Self::ADDED_DELETE_FILES, self.added_delete_files),
            (
                Self::ADDED_EQUALITY_DELETE_FILES,
                self.added_equality_delete_files,
            ),
            (
                Self::ADDED_POSITION_DELETE_FILES,
                self.added_position_delete_files,
            ),
            (Self::TOTAL_DELETE_FILES, total_delete_files),
            (Self::ADDED_RECORDS, self.added_data_records),
            (Self::DELETED_RECORDS, self.removed_data_records),
            (Self::TOTAL_RECORDS, total_records),
            (
                Self::ADDED_POSITION_DELETES,
                self.added_position_deletes_records,
            ),
            (Self::TOTAL_POSITION_DELETES, total_position_deletes),
            (
                Self::ADDED_EQUALITY_DELETES,
                self.added_equality_deletes_records,
            ),
            (Self::TOTAL_EQUALITY_DELETES, total_equality_deletes),
            (Self::ADDED_FILES_SIZE, self.added_files_size),
            (Self::REMOVED_FILES_SIZE, self.removed_files_size),
            (Self::TOTAL_FILES_SIZE, total_files_size),
        ];

        let mut m = HashMap::with_capacity(pairs.len() + 1);
        m.insert(Self::OPERATION.to_string(), operation.to_string());
        for (k, v) in pairs {
            m.insert(k.to_string(), v.to_string());
        }

        Ok(m)
    }
}

/// timestamp and snapshot ID pairs that encodes changes to the current
/// snapshot for the table.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct SnapshotLog {
    /// The timestamp of this snapshot log.
    pub timestamp_ms: i64,
    /// The snapshot ID of this snapshot log.
    pub snapshot_id: i64,
}

/// Iceberg tables keep track of branches and tags using snapshot references.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SnapshotReference {
    /// A reference’s snapshot ID. The tagged snapshot or latest snapshot of
    /// a branch.
    pub snapshot_id: i64,
    /// Type of the reference, tag or branch
    pub typ: SnapshotReferenceType,
}

/// Type of the reference
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SnapshotReferenceType {
    /// Tag is used to reference a snapshot
    Tag,
    /// Branch is used to reference a snapshot and its children
    Branch,
}

impl Display for SnapshotReferenceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotReferenceType::Tag => f.write_str("tag"),
            SnapshotReferenceType::Branch => f.write_str("branch"),
        }
    }
}

impl FromStr for SnapshotReferenceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tag" => Ok(SnapshotReferenceType::Tag),
            "branch" => Ok(SnapshotReferenceType::Branch),
            _ => Err(Error::new(
                ErrorKind::DataInvalid,
                format!("Invalid snapshot reference type: {}", s),
            )),
        }
    }
}

/// timestamp and metadata file location pairs that encodes changes to the
/// previous metadata files for the table
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MetadataLog {
    /// Related timestamp for this metadata log.
    pub timestamp_ms: i64,
    /// The metadata file's location.
    pub metadata_file: String,
}

/// Table metadata is stored as JSON. Each table metadata change creates a
/// new table metadata file that is committed by an atomic operation.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct TableMetadata {
    /// Only version 2 is written.
    pub format_version: TableFormatVersion,
    /// A UUID that identifies the table, generated when the table is
    /// created.
    pub table_uuid: String,
    /// The table’s base location.
    pub location: String,
    /// The table’s highest assigned sequence number, a monotonically
    /// increasing long that tracks the order of snapshots in a table.
    pub last_sequence_number: i64,
    /// Timestamp in milliseconds from the unix epoch when the table was last
    /// updated.
    pub last_updated_ms: i64,
    /// The highest assigned column ID for the table.
    pub last_column_id: i32,
    /// A list of schemas, stored as objects with schema-id.
    pub schemas: Vec<Schema>,
    /// ID of the table’s current schema.
    pub current_schema_id: i32,
    /// A list of partition specs, stored as full partition spec objects.
    pub partition_specs: Vec<PartitionSpec>,
    /// ID of the “current” spec that writers should use by default.
    pub default_spec_id: i32,
    /// the highest assigned partition field ID across all partition specs
    /// for the table.
    pub last_partition_id: i32,
    /// A string to string map of table properties.
    ///
    /// For example, `commit.retry.num-retries` is used to control the
    /// number of commit retries.
    pub properties: HashMap<String, String>,
    /// ID of the current table snapshot; must be the same as the current ID
    /// of the main branch in refs.
    pub current_snapshot_id: Option<i64>,
    /// A list of valid snapshots.
    pub snapshots: Vec<Snapshot>,
    /// Changes to the current snapshot for the table.
    pub snapshot_log: Vec<SnapshotLog>,
    /// Previous metadata files for the table.
    pub metadata_log: Vec<MetadataLog>,
    /// A map of snapshot references.
    pub refs: HashMap<String, SnapshotReference>,
}

impl TableMetadata {
    /// Metadata of a fresh table without snapshots.
    pub fn new(
        location: impl Into<String>,
        schema: Schema,
        spec: PartitionSpec,
        properties: HashMap<String, String>,
    ) -> Result<Self> {
        // Checks the spec fits the schema.
        spec.partition_type(&schema)?;

        Ok(Self {
            format_version: TableFormatVersion::V2,
            table_uuid: Uuid::new_v4().to_string(),
            location: location.into(),
            last_sequence_number: 0,
            last_updated_ms: Utc::now().timestamp_millis(),
            last_column_id: schema.highest_field_id(),
            current_schema_id: schema.schema_id,
            schemas: vec![schema],
            default_spec_id: spec.spec_id,
            last_partition_id: spec
                .highest_field_id()
                .unwrap_or(PARTITION_FIELD_ID_START - 1),
            partition_specs: vec![spec],
            properties,
            current_snapshot_id: None,
            snapshots: vec![],
            snapshot_log: vec![],
            metadata_log: vec![],
            refs: HashMap::new(),
        })
    }

    /// Current partition spec.
    pub fn current_partition_spec(&self) -> Result<&PartitionSpec> {
        self.partition_spec(self.default_spec_id).ok_or_else(|| {
            Error::new(
                ErrorKind::DataInvalid,
                format!("Partition spec id {} not found!", self.default_spec_id),
            )
        })
    }

    /// Partition spec by id.
    pub fn partition_spec(&self, spec_id: i32) -> Option<&PartitionSpec> {
        self.partition_specs.iter().find(|p| p.spec_id == spec_id)
    }

    /// Partition type of the spec `spec_id` under the current schema.
    pub fn partition_type(&self, spec_id: i32) -> Result<Struct> {
        let spec = self.partition_spec(spec_id).ok_or_else(|| {
            Error::new(
                ErrorKind::DataInvalid,
                format!("Partition spec id {spec_id} not found!"),
            )
        })?;
        spec.partition_type(self.current_schema()?)
    }

    /// Current schema.
    pub fn current_schema(&self) -> Result<&Schema> {
        self.schema(self.current_schema_id).ok_or_else(|| {
            Error::new(
                ErrorKind::DataInvalid,
                format!("Schema id {} not found!", self.current_schema_id),
            )
        })
    }

    /// Get schema by id
    pub fn schema(&self, schema_id: i32) -> Option<&Schema> {
        self.schemas.iter().find(|s| s.schema_id == schema_id)
    }

    /// Current snapshot, `None` for a table without any commit.
    pub fn current_snapshot(&self) -> Result<Option<&Snapshot>> {
        let snapshot_id = match self.current_snapshot_id {
            None | Some(EMPTY_SNAPSHOT_ID) => return Ok(None),
            Some(id) => id,
        };

        self.snapshot(snapshot_id).map(Some).ok_or_else(|| {
            Error::new(
                ErrorKind::DataInvalid,
                format!("Snapshot id {} not found!", snapshot_id),
            )
        })
    }

    /// Snapshot by id.
    pub fn snapshot(&self, snapshot_id: i64) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.snapshot_id == snapshot_id)
    }

    /// All snapshots in commit order.
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Walk the parent chain starting at `snapshot_id`, the snapshot itself
    /// included.
    pub fn ancestors_of(&self, snapshot_id: i64) -> impl Iterator<Item = &Snapshot> {
        let mut next = self.snapshot(snapshot_id);
        std::iter::from_fn(move || {
            let current = next?;
            next = current
                .parent_snapshot_id
                .and_then(|parent| self.snapshot(parent));
            Some(current)
        })
    }

    /// Returns snapshot reference of branch
    pub fn snapshot_ref(&self, branch: &str) -> Option<&SnapshotReference> {
        self.refs.get(branch)
    }

    /// Append a snapshot to the history.
    ///
    /// Published snapshots are never replaced and sequence numbers only grow.
    pub fn add_snapshot(&mut self, snapshot: Snapshot) -> Result<()> {
        if self.snapshot(snapshot.snapshot_id).is_some() {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("Snapshot id {} already exists", snapshot.snapshot_id),
            ));
        }
        if snapshot.sequence_number <= self.last_sequence_number {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!(
                    "Sequence number {} must be larger than last sequence number {}",
                    snapshot.sequence_number, self.last_sequence_number
                ),
            ));
        }

        self.last_sequence_number = snapshot.sequence_number;
        self.last_updated_ms = snapshot.timestamp_ms;
        self.snapshots.push(snapshot);
        Ok(())
    }

    /// Point the main branch at `snapshot_id`.
    pub fn set_current_snapshot(&mut self, snapshot_id: i64) -> Result<()> {
        let log = self
            .snapshot(snapshot_id)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::DataInvalid,
                    format!("Snapshot id {} not found!", snapshot_id),
                )
            })?
            .log();

        self.refs.insert(
            MAIN_BRANCH.to_string(),
            SnapshotReference {
                snapshot_id,
                typ: SnapshotReferenceType::Branch,
            },
        );
        self.current_snapshot_id = Some(snapshot_id);
        self.snapshot_log.push(log);
        Ok(())
    }

    /// Register a new partition spec, its id is assigned here.
    ///
    /// A spec equal to an existing one is reused.
    pub fn add_partition_spec(&mut self, fields: Vec<PartitionField>) -> Result<i32> {
        if let Some(existing) = self.partition_specs.iter().find(|s| {
            s.fields.len() == fields.len()
                && s.fields.iter().zip(&fields).all(|(l, r)| {
                    l.source_column_id == r.source_column_id
                        && l.transform == r.transform
                        && l.name == r.name
                })
        }) {
            return Ok(existing.spec_id);
        }

        let spec_id = self
            .partition_specs
            .iter()
            .map(|s| s.spec_id)
            .max()
            .map_or(UNPARTITIONED_SPEC_ID, |id| id + 1);
        let spec = PartitionSpec { spec_id, fields };
        spec.partition_type(self.current_schema()?)?;

        if let Some(highest) = spec.highest_field_id() {
            self.last_partition_id = self.last_partition_id.max(highest);
        }
        self.partition_specs.push(spec);
        Ok(spec_id)
    }

    /// Make `spec_id` the default spec of writers.
    pub fn set_default_spec(&mut self, spec_id: i32) -> Result<()> {
        if self.partition_spec(spec_id).is_none() {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("Partition spec id {spec_id} not found!"),
            ));
        }
        self.default_spec_id = spec_id;
        Ok(())
    }

    /// Set table properties.
    pub fn set_properties(&mut self, props: HashMap<String, String>) {
        self.properties.extend(props);
    }

    /// Remove table properties.
    pub fn remove_properties(&mut self, keys: &[String]) {
        for key in keys {
            self.properties.remove(key);
        }
    }
}

/// Table format version number.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TableFormatVersion {
    /// The V1 Table Format Version.
    V1 = 1,
    /// The V2 Table Format Version.
    V2 = 2,
}

impl TryFrom<u8> for TableFormatVersion {
    type Error = Error;

    fn try_from(value: u8) -> Result<TableFormatVersion> {
        match value {
            1 => Ok(TableFormatVersion::V1),
            2 => Ok(TableFormatVersion::V2),
            _ => Err(Error::new(
                ErrorKind::DataInvalid,
                format!("Unknown table format: {value}"),
            )),
        }
    }
}

impl Display for TableFormatVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TableFormatVersion::V1 => f.write_str("1"),
            TableFormatVersion::V2 => f.write_str("2"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_schema() -> Schema {
        Schema::new(
            0,
            None,
            Struct::new(vec![
                Field::optional(1, "id", Primitive::Int).into(),
                Field::optional(2, "data", Primitive::String).into(),
                Field::required(3, "category", Primitive::String).into(),
            ]),
        )
    }

    fn snapshot(id: i64, parent: Option<i64>, seq: i64) -> Snapshot {
        Snapshot {
            snapshot_id: id,
            parent_snapshot_id: parent,
            sequence_number: seq,
            timestamp_ms: 1000 + seq,
            manifest_list: format!("snap-{id}.json"),
            summary: HashMap::new(),
            schema_id: Some(0),
        }
    }

    #[test]
    fn test_primitive_from_str() {
        assert_eq!(
            Primitive::from_str("decimal(9, 2)").unwrap(),
            Primitive::Decimal {
                precision: 9,
                scale: 2
            }
        );
        assert_eq!(Primitive::from_str("fixed[16]").unwrap(), Primitive::Fixed(16));
        assert_eq!(
            Primitive::from_str("timestamptz").unwrap(),
            Primitive::Timestampz
        );
        assert!(Primitive::from_str("varchar").is_err());
    }

    #[test]
    fn test_transform_from_str() {
        assert_eq!(Transform::from_str("bucket[16]").unwrap(), Transform::Bucket(16));
        assert_eq!(Transform::from_str("truncate[4]").unwrap(), Transform::Truncate(4));
        for invalid in ["bucket[0]", "truncate[0]", "bucket[-3]", "truncate[x]"] {
            let err = Transform::from_str(invalid).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DataInvalid, "{invalid}");
        }

        let int = Any::from(Primitive::Int);
        assert!(Transform::Bucket(0).result_type(&int).is_err());
        assert!(Transform::Truncate(-1).result_type(&int).is_err());
        assert_eq!(Transform::Bucket(8).result_type(&int).unwrap(), int);
    }

    #[test]
    fn test_compare_values() {
        assert_eq!(
            PrimitiveValue::from("a").compare(&PrimitiveValue::from("b")),
            Some(Ordering::Less)
        );
        assert_eq!(
            PrimitiveValue::from(3).compare(&PrimitiveValue::from(3i64)),
            None
        );
    }

    #[test]
    fn test_literal_conversion() {
        assert_eq!(
            PrimitiveValue::from(3).to(&Primitive::Long).unwrap(),
            PrimitiveValue::Long(3)
        );
        assert_eq!(
            PrimitiveValue::from("2023-01-02")
                .to(&Primitive::Date)
                .unwrap(),
            PrimitiveValue::Date(NaiveDate::from_ymd_opt(2023, 1, 2).unwrap())
        );
        assert_eq!(
            PrimitiveValue::from(3i64 << 40)
                .to(&Primitive::Int)
                .unwrap_err()
                .kind(),
            ErrorKind::DataInvalid
        );
    }

    #[test]
    fn test_lookup_field_by_name() {
        let schema = test_schema();
        assert_eq!(schema.look_up_field_by_name("data", true).unwrap().id, 2);
        assert!(schema.look_up_field_by_name("DATA", true).is_none());
        assert_eq!(schema.look_up_field_by_name("DATA", false).unwrap().id, 2);
        assert_eq!(schema.highest_field_id(), 3);
    }

    #[test]
    fn test_partition_type() {
        let schema = test_schema();
        let spec = PartitionSpec {
            spec_id: 1,
            fields: vec![PartitionField {
                source_column_id: 3,
                partition_field_id: 1000,
                transform: Transform::Identity,
                name: "category".to_string(),
            }],
        };
        let partition_type = spec.partition_type(&schema).unwrap();
        assert_eq!(partition_type.len(), 1);
        assert!(StructValue::new(vec![Some("even".into())]).conforms_to(&partition_type));
        assert!(!StructValue::new(vec![Some(1.into())]).conforms_to(&partition_type));
        assert!(!StructValue::empty().conforms_to(&partition_type));
        assert!(!spec.is_unpartitioned());
        assert!(PartitionSpec::unpartitioned().is_unpartitioned());
    }

    #[test]
    fn test_field_summary_update() {
        let mut summary = FieldSummary::default();
        summary.update(Some(&"odd".into()));
        summary.update(Some(&"even".into()));
        summary.update(None);
        assert!(summary.contains_null);
        assert_eq!(summary.lower_bound, Some("even".into()));
        assert_eq!(summary.upper_bound, Some("odd".into()));
    }

    #[test]
    fn test_snapshot_history() {
        let mut metadata = TableMetadata::new(
            "memory:///t",
            test_schema(),
            PartitionSpec::unpartitioned(),
            HashMap::new(),
        )
        .unwrap();
        assert!(metadata.current_snapshot().unwrap().is_none());

        metadata.add_snapshot(snapshot(1, None, 1)).unwrap();
        metadata.set_current_snapshot(1).unwrap();
        metadata.add_snapshot(snapshot(2, Some(1), 2)).unwrap();
        metadata.set_current_snapshot(2).unwrap();

        assert_eq!(metadata.last_sequence_number, 2);
        assert_eq!(metadata.current_snapshot().unwrap().unwrap().snapshot_id, 2);
        assert_eq!(
            metadata
                .ancestors_of(2)
                .map(|s| s.snapshot_id)
                .collect::<Vec<_>>(),
            vec![2, 1]
        );
        assert_eq!(metadata.snapshot_ref(MAIN_BRANCH).unwrap().snapshot_id, 2);

        // Ids are never reused and sequence numbers only grow.
        assert!(metadata.add_snapshot(snapshot(2, Some(1), 3)).is_err());
        assert!(metadata.add_snapshot(snapshot(3, Some(2), 2)).is_err());
    }

    #[test]
    fn test_add_partition_spec() {
        let mut metadata = TableMetadata::new(
            "memory:///t",
            test_schema(),
            PartitionSpec::unpartitioned(),
            HashMap::new(),
        )
        .unwrap();
        let fields = vec![PartitionField {
            source_column_id: 3,
            partition_field_id: 1000,
            transform: Transform::Identity,
            name: "category".to_string(),
        }];
        let spec_id = metadata.add_partition_spec(fields.clone()).unwrap();
        assert_eq!(spec_id, 1);
        assert_eq!(metadata.last_partition_id, 1000);
        assert_eq!(metadata.add_partition_spec(fields).unwrap(), 1);

        metadata.set_default_spec(1).unwrap();
        assert_eq!(metadata.current_partition_spec().unwrap().spec_id, 1);
        assert!(metadata.set_default_spec(7).is_err());
    }

    #[test]
    fn test_summary_merge() {
        let file = DataFile::builder()
            .with_file_path("a.parquet")
            .with_record_count(8)
            .with_file_size_in_bytes(100)
            .build()
            .unwrap();
        let mut builder = SnapshotSummaryBuilder::new();
        builder.add(&file);
        let first = builder.merge(SnapshotOperation::Append, None).unwrap();
        assert_eq!(first["total-records"], "8");

        let mut builder = SnapshotSummaryBuilder::new();
        builder.add(&file);
        let second = builder
            .merge(SnapshotOperation::Append, Some(&first))
            .unwrap();
        assert_eq!(second["operation"], "append");
        assert_eq!(second["total-data-files"], "2");
        assert_eq!(second["total-files-size"], "200");
    }
}
