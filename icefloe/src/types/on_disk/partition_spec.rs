use serde::{Deserialize, Serialize};

use crate::types;
use crate::Error;
use crate::Result;

/// Parse partition spec from json bytes.
pub fn parse_partition_spec(bs: &[u8]) -> Result<types::PartitionSpec> {
    let t: PartitionSpec = serde_json::from_slice(bs)?;
    t.try_into()
}

/// Serialize partition spec to json.
pub fn serialize_partition_spec(spec: &types::PartitionSpec) -> Result<String> {
    Ok(serde_json::to_string(&PartitionSpec::from(spec))?)
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct PartitionSpec {
    spec_id: i32,
    fields: Vec<PartitionField>,
}

impl TryFrom<PartitionSpec> for types::PartitionSpec {
    type Error = Error;

    fn try_from(v: PartitionSpec) -> Result<Self> {
        let mut fields = Vec::with_capacity(v.fields.len());
        for field in v.fields {
            fields.push(field.try_into()?);
        }

        Ok(types::PartitionSpec {
            spec_id: v.spec_id,
            fields,
        })
    }
}

impl From<&types::PartitionSpec> for PartitionSpec {
    fn from(v: &types::PartitionSpec) -> Self {
        Self {
            spec_id: v.spec_id,
            fields: v.fields.iter().map(PartitionField::from).collect(),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PartitionField {
    source_id: i32,
    field_id: i32,
    name: String,
    transform: String,
}

impl TryFrom<PartitionField> for types::PartitionField {
    type Error = Error;

    fn try_from(v: PartitionField) -> Result<Self> {
        Ok(types::PartitionField {
            source_column_id: v.source_id,
            partition_field_id: v.field_id,
            transform: v.transform.as_str().parse()?,
            name: v.name,
        })
    }
}

impl From<&types::PartitionField> for PartitionField {
    fn from(v: &types::PartitionField) -> Self {
        Self {
            source_id: v.source_column_id,
            field_id: v.partition_field_id,
            name: v.name.clone(),
            transform: v.transform.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partition_spec() {
        let spec = r#"
{
    "spec-id": 1,
    "fields": [ {
        "source-id": 4,
        "field-id": 1000,
        "name": "ts_day",
        "transform": "day"
    }, {
        "source-id": 1,
        "field-id": 1001,
        "name": "id_bucket",
        "transform": "bucket[16]"
    } ]
}
        "#;

        let spec = parse_partition_spec(spec.as_bytes()).unwrap();
        assert_eq!(spec.spec_id, 1);
        assert_eq!(spec.fields[0].transform, types::Transform::Day);
        assert_eq!(spec.fields[1].transform, types::Transform::Bucket(16));
        assert_eq!(spec.fields[1].partition_field_id, 1001);

        let json = serialize_partition_spec(&spec).unwrap();
        assert!(json.contains(r#""transform":"bucket[16]""#));
    }
}
