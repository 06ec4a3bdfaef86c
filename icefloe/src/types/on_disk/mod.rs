//! On-disk layout of metadata files.
//!
//! Table metadata, schemas and partition specs are JSON documents. Manifest
//! lists and manifests are JSON Lines files: a header line followed by one
//! line per entry, so readers can stream them in ranged chunks.

mod value;

mod schema;
pub use schema::{parse_schema, serialize_schema};

mod partition_spec;
pub use partition_spec::{parse_partition_spec, serialize_partition_spec};

mod snapshot;

mod table_metadata;
pub use table_metadata::{parse_table_metadata, serialize_table_meta};

mod manifest_list;
pub(crate) use manifest_list::ManifestListWriter;
pub use manifest_list::{
    parse_manifest_list_entry, parse_manifest_list_metadata, serialize_manifest_list_entry,
    serialize_manifest_list_metadata, ManifestListMetadata,
};

mod manifest_file;
pub(crate) use manifest_file::ManifestWriter;
pub use manifest_file::{
    parse_manifest_entry, parse_manifest_metadata, serialize_manifest_entry,
    serialize_manifest_metadata,
};
