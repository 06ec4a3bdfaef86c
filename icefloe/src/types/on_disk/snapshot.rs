use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types;

#[derive(Serialize, Deserialize)]
#[cfg_attr(test, derive(Debug, PartialEq, Eq))]
#[serde(rename_all = "kebab-case")]
pub(crate) struct Snapshot {
    snapshot_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_snapshot_id: Option<i64>,
    #[serde(default)]
    sequence_number: i64,
    timestamp_ms: i64,
    manifest_list: String,
    summary: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    schema_id: Option<i64>,
}

impl From<Snapshot> for types::Snapshot {
    fn from(v: Snapshot) -> Self {
        types::Snapshot {
            snapshot_id: v.snapshot_id,
            parent_snapshot_id: v.parent_snapshot_id,
            sequence_number: v.sequence_number,
            timestamp_ms: v.timestamp_ms,
            manifest_list: v.manifest_list,
            summary: v.summary,
            schema_id: v.schema_id,
        }
    }
}

impl From<&types::Snapshot> for Snapshot {
    fn from(v: &types::Snapshot) -> Self {
        Self {
            snapshot_id: v.snapshot_id,
            parent_snapshot_id: v.parent_snapshot_id,
            sequence_number: v.sequence_number,
            timestamp_ms: v.timestamp_ms,
            manifest_list: v.manifest_list.clone(),
            summary: v.summary.clone(),
            schema_id: v.schema_id,
        }
    }
}
