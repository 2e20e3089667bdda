//! On-disk metadata: chunk records, timeseries indices, the index tree and
//! the footer.

mod chunk;
mod file_meta;
pub(crate) mod index;
mod timeseries;

pub use chunk::{ChunkGroupMetadata, ChunkMetadata, ALIGNED_TIME_MASK, ALIGNED_VALUE_MASK};
pub use file_meta::TsFileMeta;
pub use index::{IndexKey, MetadataIndexEntry, MetadataIndexNode, MetadataIndexNodeType};
pub use timeseries::{TimeseriesIndex, MULTI_CHUNK_BIT};
