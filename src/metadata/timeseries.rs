use std::io::{Cursor, Read, Write};

use crate::error::Result;
use crate::io::{read_u8, read_var_str, read_var_u64, write_u8, write_var_str, write_var_u64};
use crate::schema::TsDataType;
use crate::statistics::Statistics;

use super::chunk::{ChunkMetadata, ALIGNED_TIME_MASK, ALIGNED_VALUE_MASK};

/// Low bit of `ts_meta_type`: set when the index lists more than one chunk
/// and therefore carries per-chunk statistics.
pub const MULTI_CHUNK_BIT: u8 = 0x01;

/// The index record of one (device, measurement) series: its merged
/// statistics and the metadata of every chunk, in file-offset order.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeseriesIndex {
    pub ts_meta_type: u8,
    pub measurement: String,
    pub data_type: TsDataType,
    pub statistics: Statistics,
    pub chunk_metadata: Vec<ChunkMetadata>,
}

impl TimeseriesIndex {
    /// Builds the index of one series from its chunk metadata, already in
    /// offset order. `mask` distinguishes aligned time/value series.
    pub fn from_chunks(
        measurement: String,
        data_type: TsDataType,
        mask: u8,
        chunk_metadata: Vec<ChunkMetadata>,
    ) -> Result<Self> {
        let mut statistics = Statistics::new(data_type);
        for chunk in &chunk_metadata {
            statistics.merge(&chunk.statistics)?;
        }
        let multi = if chunk_metadata.len() > 1 {
            MULTI_CHUNK_BIT
        } else {
            0
        };
        Ok(Self {
            ts_meta_type: multi | (mask & (ALIGNED_TIME_MASK | ALIGNED_VALUE_MASK)),
            measurement,
            data_type,
            statistics,
            chunk_metadata,
        })
    }

    pub fn is_multi_chunk(&self) -> bool {
        self.ts_meta_type & MULTI_CHUNK_BIT != 0
    }

    pub fn is_aligned_time(&self) -> bool {
        self.ts_meta_type & ALIGNED_TIME_MASK != 0
    }

    pub fn is_aligned_value(&self) -> bool {
        self.ts_meta_type & ALIGNED_VALUE_MASK != 0
    }

    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        let serialize_statistics = self.is_multi_chunk();
        let mut chunk_list = vec![];
        for chunk in &self.chunk_metadata {
            chunk.serialize(&mut chunk_list, serialize_statistics)?;
        }

        write_u8(writer, self.ts_meta_type)?;
        write_var_str(writer, &self.measurement)?;
        write_u8(writer, self.data_type.to_u8())?;
        write_var_u64(writer, chunk_list.len() as u64)?;
        self.statistics.serialize(writer)?;
        writer
            .write_all(&chunk_list)
            .map_err(crate::io::write_err)?;
        Ok(())
    }

    pub fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        let ts_meta_type = read_u8(reader)?;
        let measurement = read_var_str(reader)?;
        let data_type = TsDataType::try_from(read_u8(reader)?)?;
        let chunk_list_size = read_var_u64(reader)? as usize;
        let statistics = Statistics::deserialize(reader, data_type)?;

        let chunk_list = crate::io::read_exact_vec(reader, chunk_list_size)?;
        let multi = ts_meta_type & MULTI_CHUNK_BIT != 0;
        let mask = ts_meta_type & (ALIGNED_TIME_MASK | ALIGNED_VALUE_MASK);
        let mut cursor = Cursor::new(chunk_list);
        let mut chunk_metadata = vec![];
        while (cursor.position() as usize) < cursor.get_ref().len() {
            chunk_metadata.push(ChunkMetadata::deserialize(
                &mut cursor,
                &measurement,
                data_type,
                mask,
                if multi { None } else { Some(&statistics) },
            )?);
        }
        Ok(Self {
            ts_meta_type,
            measurement,
            data_type,
            statistics,
            chunk_metadata,
        })
    }
}
