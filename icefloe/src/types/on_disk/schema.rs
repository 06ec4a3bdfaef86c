use serde::{Deserialize, Serialize};

use crate::types;
use crate::Error;
use crate::ErrorKind;
use crate::Result;

/// Parse schema from json bytes.
pub fn parse_schema(bs: &[u8]) -> Result<types::Schema> {
    let schema: Schema = serde_json::from_slice(bs)?;
    schema.try_into()
}

/// Serialize schema to json.
pub fn serialize_schema(schema: &types::Schema) -> Result<String> {
    Ok(serde_json::to_string(&Schema::from(schema))?)
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct Schema {
    #[serde(rename = "type", default = "struct_type")]
    typ: String,
    schema_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    identifier_field_ids: Option<Vec<i32>>,
    fields: Vec<Field>,
}

fn struct_type() -> String {
    "struct".to_string()
}

impl TryFrom<Schema> for types::Schema {
    type Error = Error;

    fn try_from(v: Schema) -> Result<Self> {
        let fields = v
            .fields
            .into_iter()
            .map(|f| types::Field::try_from(f).map(types::FieldRef::new))
            .collect::<Result<Vec<_>>>()?;

        Ok(types::Schema::new(
            v.schema_id,
            v.identifier_field_ids,
            types::Struct::new(fields),
        ))
    }
}

impl From<&types::Schema> for Schema {
    fn from(v: &types::Schema) -> Self {
        Self {
            typ: struct_type(),
            schema_id: v.schema_id,
            identifier_field_ids: v.identifier_field_ids.clone(),
            fields: v.fields().iter().map(|f| Field::from(f.as_ref())).collect(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Field {
    id: i32,
    name: String,
    required: bool,
    #[serde(rename = "type")]
    typ: Type,
    #[serde(skip_serializing_if = "Option::is_none")]
    doc: Option<String>,
}

/// Primitive types are plain strings, nested types are objects.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum Type {
    Primitive(String),
    Nested(Box<NestedType>),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum NestedType {
    Struct {
        fields: Vec<Field>,
    },
    List {
        #[serde(rename = "element-id")]
        element_id: i32,
        #[serde(rename = "element-required")]
        element_required: bool,
        element: Type,
    },
    Map {
        #[serde(rename = "key-id")]
        key_id: i32,
        key: Type,
        #[serde(rename = "value-id")]
        value_id: i32,
        #[serde(rename = "value-required")]
        value_required: bool,
        value: Type,
    },
}

impl TryFrom<Field> for types::Field {
    type Error = Error;

    fn try_from(v: Field) -> Result<Self> {
        Ok(types::Field {
            id: v.id,
            name: v.name,
            required: v.required,
            field_type: v.typ.try_into()?,
            comment: v.doc,
        })
    }
}

impl From<&types::Field> for Field {
    fn from(v: &types::Field) -> Self {
        Self {
            id: v.id,
            name: v.name.clone(),
            required: v.required,
            typ: Type::from(&v.field_type),
            doc: v.comment.clone(),
        }
    }
}

impl TryFrom<Type> for types::Any {
    type Error = Error;

    fn try_from(v: Type) -> Result<Self> {
        let t = match v {
            Type::Primitive(s) => types::Any::Primitive(s.parse()?),
            Type::Nested(nested) => match *nested {
                NestedType::Struct { fields } => {
                    let fields = fields
                        .into_iter()
                        .map(|f| types::Field::try_from(f).map(types::FieldRef::new))
                        .collect::<Result<Vec<_>>>()?;
                    types::Any::Struct(types::Struct::new(fields).into())
                }
                NestedType::List {
                    element_id,
                    element_required,
                    element,
                } => types::Any::List(types::List {
                    element_id,
                    element_required,
                    element_type: Box::new(element.try_into()?),
                }),
                NestedType::Map {
                    key_id,
                    key,
                    value_id,
                    value_required,
                    value,
                } => types::Any::Map(types::Map {
                    key_id,
                    key_type: Box::new(key.try_into()?),
                    value_id,
                    value_required,
                    value_type: Box::new(value.try_into()?),
                }),
            },
        };

        if let types::Any::Map(m) = &t {
            if m.key_type.as_primitive().is_none() {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    format!("map key {} must be a primitive type", m.key_id),
                ));
            }
        }

        Ok(t)
    }
}

impl From<&types::Any> for Type {
    fn from(v: &types::Any) -> Self {
        match v {
            types::Any::Primitive(p) => Type::Primitive(p.to_string()),
            types::Any::Struct(s) => Type::Nested(Box::new(NestedType::Struct {
                fields: s.fields().iter().map(|f| Field::from(f.as_ref())).collect(),
            })),
            types::Any::List(l) => Type::Nested(Box::new(NestedType::List {
                element_id: l.element_id,
                element_required: l.element_required,
                element: Type::from(l.element_type.as_ref()),
            })),
            types::Any::Map(m) => Type::Nested(Box::new(NestedType::Map {
                key_id: m.key_id,
                key: Type::from(m.key_type.as_ref()),
                value_id: m.value_id,
                value_required: m.value_required,
                value: Type::from(m.value_type.as_ref()),
            })),
        }
    }
}
