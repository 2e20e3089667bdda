//! Page writers: in-memory buffers that seal into compressed page bytes
//! with their header and statistics.

use std::io::Write;

use crate::compression::{compress, Compression};
use crate::data::Value;
use crate::encoding::{
    ceil8, create_time_encoder, create_value_encoder, Encoder, Encoding, ValueEncoder,
};
use crate::error::Result;
use crate::io::{write_var_u64, write_err};
use crate::schema::TsDataType;
use crate::statistics::Statistics;

/// A page sealed to bytes: compressed body plus everything needed to emit
/// its header later. Staging sealed pages is what lets a chunk writer elide
/// the statistics of a chunk's only page.
#[derive(Debug, Clone)]
pub struct SealedPage {
    pub statistics: Statistics,
    pub uncompressed_size: usize,
    /// The compressed body.
    pub body: Vec<u8>,
}

impl SealedPage {
    /// Emits `{uncompressed_size: uvarint, compressed_size: uvarint,
    /// [statistics], body}`.
    pub fn write_to<W: Write>(&self, writer: &mut W, include_statistics: bool) -> Result<()> {
        write_var_u64(writer, self.uncompressed_size as u64)?;
        write_var_u64(writer, self.body.len() as u64)?;
        if include_statistics {
            self.statistics.serialize(writer)?;
        }
        writer.write_all(&self.body).map_err(write_err)
    }

    /// Bytes [`write_to`](Self::write_to) will produce.
    pub fn size(&self, include_statistics: bool) -> usize {
        let statistics = if include_statistics {
            self.statistics.serialized_size()
        } else {
            0
        };
        10 + 10 + statistics + self.body.len()
    }
}

/// Buffers the (time, value) points of one unaligned page.
pub struct PageWriter {
    data_type: TsDataType,
    time_encoder: Box<dyn Encoder<i64>>,
    value_encoder: ValueEncoder,
    statistics: Statistics,
}

impl PageWriter {
    pub fn new(
        data_type: TsDataType,
        encoding: Encoding,
        time_encoding: Encoding,
    ) -> Result<Self> {
        Ok(Self {
            data_type,
            time_encoder: create_time_encoder(time_encoding)?,
            value_encoder: create_value_encoder(encoding, data_type)?,
            statistics: Statistics::new(data_type),
        })
    }

    /// Appends one point. A value of the wrong runtime type leaves the page
    /// untouched and surfaces as `InvalidDataPoint`.
    pub fn write(&mut self, time: i64, value: &Value) -> Result<()> {
        self.value_encoder.encode(value)?;
        self.time_encoder.encode(time);
        self.statistics.update(time, value)?;
        Ok(())
    }

    pub fn point_count(&self) -> usize {
        self.time_encoder.count()
    }

    /// Conservative upper bound of the sealed page size.
    pub fn estimate_size(&self) -> usize {
        10 + self.time_encoder.size() + self.value_encoder.size()
    }

    /// Seals the page body `{time_len: uvarint, time bytes, value bytes}`
    /// and compresses it, resetting the writer for the next page.
    pub fn seal(&mut self, compression: Compression) -> Result<SealedPage> {
        let mut time_buffer = vec![];
        self.time_encoder.flush(&mut time_buffer)?;

        let mut body = vec![];
        write_var_u64(&mut body, time_buffer.len() as u64)?;
        body.extend_from_slice(&time_buffer);
        self.value_encoder.flush(&mut body)?;

        let uncompressed_size = body.len();
        let compressed = compress(compression, &body)?;
        let statistics =
            std::mem::replace(&mut self.statistics, Statistics::new(self.data_type));
        Ok(SealedPage {
            statistics,
            uncompressed_size,
            body: compressed,
        })
    }
}

/// Buffers only timestamps: the page writer of an aligned group's time
/// chunk.
pub struct TimePageWriter {
    time_encoder: Box<dyn Encoder<i64>>,
    statistics: Statistics,
}

impl TimePageWriter {
    pub fn new(time_encoding: Encoding) -> Result<Self> {
        Ok(Self {
            time_encoder: create_time_encoder(time_encoding)?,
            statistics: Statistics::new(TsDataType::Vector),
        })
    }

    pub fn write(&mut self, time: i64) -> Result<()> {
        self.time_encoder.encode(time);
        self.statistics.update_time(time)
    }

    pub fn point_count(&self) -> usize {
        self.time_encoder.count()
    }

    pub fn estimate_size(&self) -> usize {
        10 + self.time_encoder.size()
    }

    pub fn seal(&mut self, compression: Compression) -> Result<SealedPage> {
        let mut body = vec![];
        self.time_encoder.flush(&mut body)?;
        let uncompressed_size = body.len();
        let compressed = compress(compression, &body)?;
        let statistics =
            std::mem::replace(&mut self.statistics, Statistics::new(TsDataType::Vector));
        Ok(SealedPage {
            statistics,
            uncompressed_size,
            body: compressed,
        })
    }
}

/// Buffers one value column of an aligned group. Every row is recorded in
/// the null bitmap; only present rows reach the encoder, but null rows still
/// count towards the page's row count.
pub struct ValuePageWriter {
    data_type: TsDataType,
    value_encoder: ValueEncoder,
    bitmap: Vec<u8>,
    row_count: usize,
    statistics: Statistics,
}

impl ValuePageWriter {
    pub fn new(data_type: TsDataType, encoding: Encoding) -> Result<Self> {
        Ok(Self {
            data_type,
            value_encoder: create_value_encoder(encoding, data_type)?,
            bitmap: vec![],
            row_count: 0,
            statistics: Statistics::new(data_type),
        })
    }

    /// Appends one row; `None` marks a null.
    pub fn write(&mut self, time: i64, value: Option<&Value>) -> Result<()> {
        if let Some(value) = value {
            self.value_encoder.encode(value)?;
            self.statistics.update(time, value)?;
        }
        if self.row_count % 8 == 0 {
            self.bitmap.push(0);
        }
        if value.is_some() {
            // bit 1 means present, MSB first
            let last = self.bitmap.len() - 1;
            self.bitmap[last] |= 0x80 >> (self.row_count % 8);
        }
        self.row_count += 1;
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn estimate_size(&self) -> usize {
        10 + self.bitmap.len() + self.value_encoder.size()
    }

    /// Seals the body `{row_count: uvarint, bitmap, value bytes}`.
    pub fn seal(&mut self, compression: Compression) -> Result<SealedPage> {
        let mut body = vec![];
        write_var_u64(&mut body, self.row_count as u64)?;
        debug_assert_eq!(self.bitmap.len(), ceil8(self.row_count));
        body.extend_from_slice(&self.bitmap);
        self.value_encoder.flush(&mut body)?;

        let uncompressed_size = body.len();
        let compressed = compress(compression, &body)?;
        let statistics =
            std::mem::replace(&mut self.statistics, Statistics::new(self.data_type));
        self.bitmap.clear();
        self.row_count = 0;
        Ok(SealedPage {
            statistics,
            uncompressed_size,
            body: compressed,
        })
    }
}
