//! Reading manifests and planning scans.

mod line_reader;
mod manifest;
pub use manifest::*;
mod delete_index;
pub use delete_index::DeleteFileIndex;
mod scan;
pub use scan::*;
