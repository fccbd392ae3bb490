pub mod index;
pub mod records;

pub use index::{build_index, build_index_parallel, MetadataIndex, MetadataIndexRow};
pub use records::{scan_directory, SequenceRecord};
