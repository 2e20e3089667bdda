//! Chunk writers: they own a page writer, seal pages into a staging area
//! and emit the framed chunk on flush.
//!
//! A chunk with exactly one page elides that page's statistics (the chunk
//! statistics carry the same information). The first sealed page is
//! therefore staged aside; only when a second page arrives is the first
//! committed to the page buffer with its statistics header.

use crate::compression::Compression;
use crate::data::Value;
use crate::encoding::Encoding;
use crate::error::Result;
use crate::io::{write_u8, write_var_str, write_var_u64, PositionedWrite};
use crate::metadata::{ChunkMetadata, ALIGNED_TIME_MASK, ALIGNED_VALUE_MASK};
use crate::schema::{MeasurementSchema, TsDataType};
use crate::statistics::Statistics;
use crate::{CHUNK_HEADER_MARKER, ONLY_ONE_PAGE_CHUNK_HEADER_MARKER};

use super::page::{PageWriter, SealedPage, TimePageWriter, ValuePageWriter};

/// The page-sealing state shared by all chunk writer flavors.
struct ChunkBuffer {
    data_type: TsDataType,
    num_pages: usize,
    statistics: Statistics,
    /// The only sealed page so far, staged without its statistics header.
    first_page: Option<SealedPage>,
    /// Pages committed with statistics, once a second page exists.
    page_buffer: Vec<u8>,
}

impl ChunkBuffer {
    fn new(data_type: TsDataType) -> Self {
        Self {
            data_type,
            num_pages: 0,
            statistics: Statistics::new(data_type),
            first_page: None,
            page_buffer: vec![],
        }
    }

    fn push(&mut self, sealed: SealedPage) -> Result<()> {
        self.statistics.merge(&sealed.statistics)?;
        match self.num_pages {
            0 => self.first_page = Some(sealed),
            1 => {
                // a second page arrived: retroactively commit the first with
                // its statistics header
                let first = self.first_page.take().expect("staged first page");
                first.write_to(&mut self.page_buffer, true)?;
                sealed.write_to(&mut self.page_buffer, true)?;
            }
            _ => sealed.write_to(&mut self.page_buffer, true)?,
        }
        self.num_pages += 1;
        Ok(())
    }

    fn size(&self) -> usize {
        let staged = self
            .first_page
            .as_ref()
            .map(|page| page.size(true))
            .unwrap_or(0);
        self.page_buffer.len() + staged
    }

    /// Emits the chunk header and pages, returning the chunk metadata. The
    /// buffer is reset for the next chunk.
    fn seal<W: PositionedWrite>(
        &mut self,
        writer: &mut W,
        measurement: &str,
        compression: Compression,
        encoding: Encoding,
        mask: u8,
    ) -> Result<Option<ChunkMetadata>> {
        if self.num_pages == 0 {
            return Ok(None);
        }
        let offset_of_chunk_header = writer.pos() as i64;

        let (marker, body) = if self.num_pages == 1 {
            let first = self.first_page.take().expect("staged first page");
            let mut body = vec![];
            first.write_to(&mut body, false)?;
            (ONLY_ONE_PAGE_CHUNK_HEADER_MARKER, body)
        } else {
            (CHUNK_HEADER_MARKER, std::mem::take(&mut self.page_buffer))
        };

        write_u8(writer, marker)?;
        write_var_str(writer, measurement)?;
        write_var_u64(writer, body.len() as u64)?;
        write_u8(writer, self.data_type.to_u8())?;
        write_u8(writer, compression.to_u8())?;
        write_u8(writer, encoding.to_u8())?;
        writer.write_all(&body).map_err(crate::io::write_err)?;

        let statistics =
            std::mem::replace(&mut self.statistics, Statistics::new(self.data_type));
        self.num_pages = 0;
        Ok(Some(ChunkMetadata {
            measurement: measurement.to_string(),
            data_type: self.data_type,
            offset_of_chunk_header,
            mask,
            statistics,
        }))
    }
}

/// Writes one unaligned measurement: pages of (time, value) pairs.
pub struct ChunkWriter {
    schema: MeasurementSchema,
    page_writer: PageWriter,
    buffer: ChunkBuffer,
    page_max_point_count: usize,
    page_max_memory_bytes: usize,
}

impl ChunkWriter {
    pub fn new(
        schema: MeasurementSchema,
        time_encoding: Encoding,
        page_max_point_count: usize,
        page_max_memory_bytes: usize,
    ) -> Result<Self> {
        let page_writer = PageWriter::new(schema.data_type, schema.encoding, time_encoding)?;
        let buffer = ChunkBuffer::new(schema.data_type);
        Ok(Self {
            schema,
            page_writer,
            buffer,
            page_max_point_count,
            page_max_memory_bytes,
        })
    }

    pub fn measurement(&self) -> &str {
        &self.schema.name
    }

    pub fn write(&mut self, time: i64, value: &Value) -> Result<()> {
        self.page_writer.write(time, value)?;
        if self.page_writer.point_count() >= self.page_max_point_count
            || self.page_writer.estimate_size() >= self.page_max_memory_bytes
        {
            self.seal_page()?;
        }
        Ok(())
    }

    fn seal_page(&mut self) -> Result<()> {
        if self.page_writer.point_count() == 0 {
            return Ok(());
        }
        let sealed = self.page_writer.seal(self.schema.compression)?;
        self.buffer.push(sealed)
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.num_pages == 0 && self.page_writer.point_count() == 0
    }

    pub fn estimate_size(&self) -> usize {
        self.buffer.size() + self.page_writer.estimate_size()
    }

    /// Seals the open page and emits the chunk.
    pub fn seal<W: PositionedWrite>(&mut self, writer: &mut W) -> Result<Option<ChunkMetadata>> {
        self.seal_page()?;
        self.buffer.seal(
            writer,
            &self.schema.name,
            self.schema.compression,
            self.schema.encoding,
            0,
        )
    }
}

/// Writes the time chunk of an aligned group. The measurement name of a
/// time chunk is the empty string.
pub struct TimeChunkWriter {
    time_encoding: Encoding,
    time_compression: Compression,
    page_writer: TimePageWriter,
    buffer: ChunkBuffer,
}

impl TimeChunkWriter {
    pub fn new(time_encoding: Encoding, time_compression: Compression) -> Result<Self> {
        Ok(Self {
            time_encoding,
            time_compression,
            page_writer: TimePageWriter::new(time_encoding)?,
            buffer: ChunkBuffer::new(TsDataType::Vector),
        })
    }

    pub fn write(&mut self, time: i64) -> Result<()> {
        self.page_writer.write(time)
    }

    pub fn page_point_count(&self) -> usize {
        self.page_writer.point_count()
    }

    pub fn page_size(&self) -> usize {
        self.page_writer.estimate_size()
    }

    pub fn seal_page(&mut self) -> Result<()> {
        if self.page_writer.point_count() == 0 {
            return Ok(());
        }
        let sealed = self.page_writer.seal(self.time_compression)?;
        self.buffer.push(sealed)
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.num_pages == 0 && self.page_writer.point_count() == 0
    }

    pub fn estimate_size(&self) -> usize {
        self.buffer.size() + self.page_writer.estimate_size()
    }

    pub fn seal<W: PositionedWrite>(&mut self, writer: &mut W) -> Result<Option<ChunkMetadata>> {
        self.seal_page()?;
        self.buffer.seal(
            writer,
            "",
            self.time_compression,
            self.time_encoding,
            ALIGNED_TIME_MASK,
        )
    }
}

/// Writes one value column of an aligned group, pages sealed in lock-step
/// with the time chunk.
pub struct ValueChunkWriter {
    schema: MeasurementSchema,
    page_writer: ValuePageWriter,
    buffer: ChunkBuffer,
}

impl ValueChunkWriter {
    pub fn new(schema: MeasurementSchema) -> Result<Self> {
        let page_writer = ValuePageWriter::new(schema.data_type, schema.encoding)?;
        let buffer = ChunkBuffer::new(schema.data_type);
        Ok(Self {
            schema,
            page_writer,
            buffer,
        })
    }

    pub fn measurement(&self) -> &str {
        &self.schema.name
    }

    pub fn write(&mut self, time: i64, value: Option<&Value>) -> Result<()> {
        self.page_writer.write(time, value)
    }

    pub fn seal_page(&mut self) -> Result<()> {
        if self.page_writer.row_count() == 0 {
            return Ok(());
        }
        let sealed = self.page_writer.seal(self.schema.compression)?;
        self.buffer.push(sealed)
    }

    pub fn estimate_size(&self) -> usize {
        self.buffer.size() + self.page_writer.estimate_size()
    }

    pub fn seal<W: PositionedWrite>(&mut self, writer: &mut W) -> Result<Option<ChunkMetadata>> {
        self.seal_page()?;
        self.buffer.seal(
            writer,
            &self.schema.name,
            self.schema.compression,
            self.schema.encoding,
            ALIGNED_VALUE_MASK,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::TrackedWrite;

    fn int32_schema() -> MeasurementSchema {
        MeasurementSchema::new(
            "s1",
            TsDataType::Int32,
            Encoding::Plain,
            Compression::Uncompressed,
        )
    }

    #[test]
    fn single_page_chunk_uses_the_one_page_marker() -> Result<()> {
        let mut chunk = ChunkWriter::new(int32_schema(), Encoding::Ts2Diff, 1024, 1 << 20)?;
        for (t, v) in [(1, 10), (2, 20), (3, 30)] {
            chunk.write(t, &Value::Int32(v))?;
        }
        let mut writer = TrackedWrite::new(vec![]);
        let metadata = chunk.seal(&mut writer)?.expect("chunk has data");
        let bytes = writer.into_inner();
        assert_eq!(bytes[0], ONLY_ONE_PAGE_CHUNK_HEADER_MARKER);
        assert_eq!(metadata.offset_of_chunk_header, 0);
        assert_eq!(metadata.statistics.count(), 3);
        Ok(())
    }

    #[test]
    fn second_page_commits_first_page_statistics() -> Result<()> {
        // page capacity of two points forces multiple pages
        let mut chunk = ChunkWriter::new(int32_schema(), Encoding::Ts2Diff, 2, 1 << 20)?;
        for t in 0..5 {
            chunk.write(t, &Value::Int32(t as i32 * 10))?;
        }
        let mut writer = TrackedWrite::new(vec![]);
        let metadata = chunk.seal(&mut writer)?.expect("chunk has data");
        let bytes = writer.into_inner();
        assert_eq!(bytes[0], CHUNK_HEADER_MARKER);
        assert_eq!(metadata.statistics.count(), 5);
        Ok(())
    }

    #[test]
    fn empty_chunk_seals_to_nothing() -> Result<()> {
        let mut chunk = ChunkWriter::new(int32_schema(), Encoding::Ts2Diff, 1024, 1 << 20)?;
        let mut writer = TrackedWrite::new(vec![]);
        assert!(chunk.seal(&mut writer)?.is_none());
        assert_eq!(writer.pos(), 0);
        Ok(())
    }

    #[test]
    fn chunk_writer_resets_after_seal() -> Result<()> {
        let mut chunk = ChunkWriter::new(int32_schema(), Encoding::Ts2Diff, 1024, 1 << 20)?;
        chunk.write(1, &Value::Int32(1))?;
        let mut writer = TrackedWrite::new(vec![]);
        chunk.seal(&mut writer)?.unwrap();
        assert!(chunk.is_empty());
        chunk.write(10, &Value::Int32(2))?;
        let metadata = chunk.seal(&mut writer)?.unwrap();
        assert_eq!(metadata.statistics.count(), 1);
        assert_eq!(metadata.statistics.start_time(), 10);
        Ok(())
    }
}
