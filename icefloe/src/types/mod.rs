//! Types will provide the definition of in-memory table metadata types and
//! functions to parse them from on-disk files.

mod in_memory;
pub use in_memory::*;

mod on_disk;
pub use on_disk::*;

mod transform;
pub use transform::*;
