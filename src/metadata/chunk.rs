use std::io::{Read, Write};

use crate::error::Result;
use crate::io::write_i64_le;
use crate::schema::{DeviceId, TsDataType};
use crate::statistics::Statistics;

/// Chunk masks carried in the high bits of chunk and timeseries metadata.
pub const ALIGNED_VALUE_MASK: u8 = 0x40;
pub const ALIGNED_TIME_MASK: u8 = 0x80;

/// Where one chunk starts and what it holds. Recorded by the writer at flush
/// time and serialized inside the owning timeseries index.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMetadata {
    pub measurement: String,
    pub data_type: TsDataType,
    /// Absolute file offset of the chunk's header marker.
    pub offset_of_chunk_header: i64,
    /// 0, [`ALIGNED_TIME_MASK`] or [`ALIGNED_VALUE_MASK`].
    pub mask: u8,
    pub statistics: Statistics,
}

impl ChunkMetadata {
    /// On-disk layout inside a timeseries index: the header offset, plus the
    /// per-chunk statistics unless the index holds exactly one chunk (the
    /// series statistics then carry the same information).
    pub fn serialize<W: Write>(&self, writer: &mut W, serialize_statistics: bool) -> Result<()> {
        write_i64_le(writer, self.offset_of_chunk_header)?;
        if serialize_statistics {
            self.statistics.serialize(writer)?;
        }
        Ok(())
    }

    pub fn deserialize<R: Read>(
        reader: &mut R,
        measurement: &str,
        data_type: TsDataType,
        mask: u8,
        series_statistics: Option<&Statistics>,
    ) -> Result<Self> {
        let offset_of_chunk_header = crate::io::read_i64_le(reader)?;
        let statistics = match series_statistics {
            // single-chunk index: the chunk statistics equal the series'
            Some(statistics) => statistics.clone(),
            None => Statistics::deserialize(reader, data_type)?,
        };
        Ok(Self {
            measurement: measurement.to_string(),
            data_type,
            offset_of_chunk_header,
            mask,
            statistics,
        })
    }
}

/// All chunk metadata recorded for one device within one flushed chunk
/// group.
#[derive(Debug, Clone)]
pub struct ChunkGroupMetadata {
    pub device: DeviceId,
    pub chunks: Vec<ChunkMetadata>,
}

impl ChunkGroupMetadata {
    pub fn new(device: DeviceId) -> Self {
        Self {
            device,
            chunks: vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;
    use std::io::Cursor;

    fn sample_statistics() -> Statistics {
        let mut statistics = Statistics::new(TsDataType::Int64);
        statistics.update(1, &Value::Int64(5)).unwrap();
        statistics
    }

    #[test]
    fn roundtrip_with_statistics() -> Result<()> {
        let metadata = ChunkMetadata {
            measurement: "s1".to_string(),
            data_type: TsDataType::Int64,
            offset_of_chunk_header: 1234,
            mask: 0,
            statistics: sample_statistics(),
        };
        let mut buffer = vec![];
        metadata.serialize(&mut buffer, true)?;
        let decoded = ChunkMetadata::deserialize(
            &mut Cursor::new(buffer),
            "s1",
            TsDataType::Int64,
            0,
            None,
        )?;
        assert_eq!(decoded, metadata);
        Ok(())
    }

    #[test]
    fn single_chunk_elides_statistics() -> Result<()> {
        let statistics = sample_statistics();
        let metadata = ChunkMetadata {
            measurement: "s1".to_string(),
            data_type: TsDataType::Int64,
            offset_of_chunk_header: 99,
            mask: 0,
            statistics: statistics.clone(),
        };
        let mut buffer = vec![];
        metadata.serialize(&mut buffer, false)?;
        assert_eq!(buffer.len(), 8);
        let decoded = ChunkMetadata::deserialize(
            &mut Cursor::new(buffer),
            "s1",
            TsDataType::Int64,
            0,
            Some(&statistics),
        )?;
        assert_eq!(decoded, metadata);
        Ok(())
    }
}
