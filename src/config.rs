//! Tunables carried by writers and readers.

use crate::compression::Compression;
use crate::encoding::Encoding;

/// Knobs of the write and read paths. All values have conservative defaults;
/// construct with [`TsFileConfig::default`] and override fields as needed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TsFileConfig {
    /// Rows buffered per page before it is force-sealed.
    pub page_max_point_count: usize,
    /// Estimated bytes buffered per page before it is force-sealed.
    pub page_max_memory_bytes: usize,
    /// Total pending bytes across all open chunks before an automatic flush.
    pub chunk_group_size_threshold: usize,
    /// Fan-out cap of every metadata index node.
    pub max_degree_of_index_node: usize,
    /// Target false-positive rate of the bloom filter.
    pub bloom_filter_error_rate: f64,
    /// Encoding of time columns and time chunks.
    pub time_encoding: Encoding,
    /// Compression of time chunks.
    pub time_compression: Compression,
}

impl Default for TsFileConfig {
    fn default() -> Self {
        Self {
            page_max_point_count: 10_240,
            page_max_memory_bytes: 64 * 1024,
            chunk_group_size_threshold: 128 * 1024 * 1024,
            max_degree_of_index_node: 256,
            bloom_filter_error_rate: 0.05,
            time_encoding: Encoding::Ts2Diff,
            time_compression: Compression::Uncompressed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = TsFileConfig::default();
        assert_eq!(config.page_max_point_count, 10_240);
        assert_eq!(config.max_degree_of_index_node, 256);
        assert_eq!(config.time_encoding, Encoding::Ts2Diff);
        assert_eq!(config.time_compression, Compression::Uncompressed);
    }
}
