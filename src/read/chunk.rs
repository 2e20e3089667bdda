//! Chunk and page scanning: header parsing, page decompression and the
//! series scan iterator that walks `chunk → page → point`.

use std::collections::VecDeque;
use std::io::{Read, Seek};
use std::sync::{Arc, Weak};

use crate::compression::{decompress, Compression};
use crate::data::Value;
use crate::encoding::{
    create_time_decoder, create_value_decoder, uleb128, Encoding,
};
use crate::error::{Result, TsFileError};
use crate::io::{read_u8, read_var_str, read_var_u64};
use crate::metadata::ChunkMetadata;
use crate::schema::TsDataType;
use crate::statistics::Statistics;
use crate::{CHUNK_HEADER_MARKER, ONLY_ONE_PAGE_CHUNK_HEADER_MARKER};

use super::filter::Filter;
use super::ReaderInner;

/// The framed header of one chunk, as stored on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkHeader {
    pub marker: u8,
    pub measurement: String,
    /// Bytes of page data following this header.
    pub data_size: usize,
    pub data_type: TsDataType,
    pub compression: Compression,
    pub encoding: Encoding,
}

impl ChunkHeader {
    pub fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        let marker = read_u8(reader)?;
        if marker != CHUNK_HEADER_MARKER && marker != ONLY_ONE_PAGE_CHUNK_HEADER_MARKER {
            return Err(corrupted_err!("unexpected chunk marker {:#04x}", marker));
        }
        let measurement = read_var_str(reader)?;
        let data_size = read_var_u64(reader)? as usize;
        let data_type = TsDataType::try_from(read_u8(reader)?)?;
        let compression = Compression::try_from(read_u8(reader)?)?;
        let encoding = Encoding::try_from(read_u8(reader)?)?;
        Ok(Self {
            marker,
            measurement,
            data_size,
            data_type,
            compression,
            encoding,
        })
    }

    pub fn has_single_page(&self) -> bool {
        self.marker == ONLY_ONE_PAGE_CHUNK_HEADER_MARKER
    }
}

/// One decompressed page body plus its header fields.
struct RawPage {
    statistics: Option<Statistics>,
    body: Vec<u8>,
}

/// Splits the pages out of a chunk's data area. Pages whose statistics fail
/// `filter` are skipped without decompression; `statistics_type` names the
/// type their statistics were recorded as.
fn split_pages(
    header: &ChunkHeader,
    data: &[u8],
    statistics_type: TsDataType,
    filter: Option<&dyn Filter>,
) -> Result<Vec<RawPage>> {
    let mut pages = vec![];
    let mut cursor = std::io::Cursor::new(data);
    while (cursor.position() as usize) < data.len() {
        let uncompressed_size = read_var_u64(&mut cursor)? as usize;
        let compressed_size = read_var_u64(&mut cursor)? as usize;
        let statistics = if header.has_single_page() {
            None
        } else {
            Some(Statistics::deserialize(&mut cursor, statistics_type)?)
        };
        let start = cursor.position() as usize;
        let end = start + compressed_size;
        if end > data.len() {
            return Err(corrupted_err!(
                "page body of {} bytes overruns the chunk data area",
                compressed_size
            ));
        }
        cursor.set_position(end as u64);

        if let (Some(statistics), Some(filter)) = (&statistics, filter) {
            if !filter.satisfy_statistics(statistics) {
                continue;
            }
        }
        let body = decompress(header.compression, &data[start..end], uncompressed_size)?;
        pages.push(RawPage { statistics, body });
    }
    Ok(pages)
}

/// Decodes an unaligned page body `{time_len, time bytes, value bytes}`.
fn decode_page(
    header: &ChunkHeader,
    body: &[u8],
    time_encoding: Encoding,
) -> Result<Vec<(i64, Value)>> {
    let (time_len, consumed) = uleb128::decode(body);
    let time_len = time_len as usize;
    if consumed + time_len > body.len() {
        return Err(corrupted_err!("page time column overruns the page body"));
    }
    let mut time_decoder = create_time_decoder(time_encoding, &body[consumed..consumed + time_len])?;
    let mut value_decoder =
        create_value_decoder(header.encoding, header.data_type, &body[consumed + time_len..])?;

    let mut points = vec![];
    while time_decoder.has_next() {
        let time = time_decoder.next()?;
        if !value_decoder.has_next() {
            return Err(corrupted_err!("page value column shorter than time column"));
        }
        points.push((time, value_decoder.next(header.data_type)?));
    }
    Ok(points)
}

/// Decodes a time page body: just the encoded timestamps.
fn decode_time_page(body: &[u8], time_encoding: Encoding) -> Result<Vec<i64>> {
    let mut decoder = create_time_decoder(time_encoding, body)?;
    let mut times = vec![];
    while decoder.has_next() {
        times.push(decoder.next()?);
    }
    Ok(times)
}

/// Decodes a value page body `{row_count, bitmap, values}` into one
/// optional value per row.
fn decode_value_page(header: &ChunkHeader, body: &[u8]) -> Result<Vec<Option<Value>>> {
    let (row_count, consumed) = uleb128::decode(body);
    let row_count = row_count as usize;
    let bitmap_len = crate::encoding::ceil8(row_count);
    if consumed + bitmap_len > body.len() {
        return Err(corrupted_err!("value page bitmap overruns the page body"));
    }
    let bitmap = &body[consumed..consumed + bitmap_len];
    let mut decoder =
        create_value_decoder(header.encoding, header.data_type, &body[consumed + bitmap_len..])?;

    let mut rows = Vec::with_capacity(row_count);
    for row in 0..row_count {
        let present = bitmap[row / 8] & (0x80 >> (row % 8)) != 0;
        if present {
            if !decoder.has_next() {
                return Err(corrupted_err!(
                    "value page holds fewer values than its bitmap declares"
                ));
            }
            rows.push(Some(decoder.next(header.data_type)?));
        } else {
            rows.push(None);
        }
    }
    Ok(rows)
}

/// Streams the points of one unaligned series: `chunk → page → point`,
/// pruning chunks and pages through the filter's statistics predicate.
pub struct SeriesScanIterator<R: Read + Seek> {
    inner: Weak<ReaderInner<R>>,
    time_encoding: Encoding,
    chunks: Vec<ChunkMetadata>,
    filter: Option<Arc<dyn Filter>>,
    chunk_index: usize,
    points: VecDeque<(i64, Value)>,
    closed: bool,
}

impl<R: Read + Seek> SeriesScanIterator<R> {
    pub(crate) fn new(
        inner: Weak<ReaderInner<R>>,
        time_encoding: Encoding,
        chunks: Vec<ChunkMetadata>,
        filter: Option<Arc<dyn Filter>>,
    ) -> Self {
        Self {
            inner,
            time_encoding,
            chunks,
            filter,
            chunk_index: 0,
            points: VecDeque::new(),
            closed: false,
        }
    }

    fn upgrade(&self) -> Result<Arc<ReaderInner<R>>> {
        if self.closed {
            return Err(TsFileError::InvalidState(
                "the scan iterator is closed".to_string(),
            ));
        }
        self.inner.upgrade().ok_or_else(|| {
            TsFileError::InvalidState("the owning reader is gone".to_string())
        })
    }

    /// Reads and decodes the next chunk that survives pruning. Returns
    /// false once all chunks are exhausted.
    fn load_next_chunk(&mut self) -> Result<bool> {
        let inner = self.upgrade()?;
        while self.chunk_index < self.chunks.len() {
            let metadata = &self.chunks[self.chunk_index];
            self.chunk_index += 1;
            if let Some(filter) = &self.filter {
                if !filter.satisfy_statistics(&metadata.statistics) {
                    continue;
                }
            }
            let chunk = inner.read_chunk(metadata.offset_of_chunk_header as u64)?;
            let (header, data) = (&chunk.0, &chunk.1);
            let pages = split_pages(header, data, header.data_type, self.filter.as_deref())?;
            for page in pages {
                for (time, value) in decode_page(header, &page.body, self.time_encoding)? {
                    if self
                        .filter
                        .as_ref()
                        .map(|f| f.satisfy_time(time))
                        .unwrap_or(true)
                    {
                        self.points.push_back((time, value));
                    }
                }
            }
            if !self.points.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The next surviving point, or `None` at end of stream.
    pub fn next_point(&mut self) -> Result<Option<(i64, Value)>> {
        loop {
            if let Some(point) = self.points.pop_front() {
                return Ok(Some(point));
            }
            if !self.load_next_chunk()? {
                return Ok(None);
            }
        }
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.points.clear();
    }
}

/// Streams the rows of one aligned series: time chunks paired with the
/// requested value column's chunks, in flush order.
pub struct AlignedSeriesScanIterator<R: Read + Seek> {
    inner: Weak<ReaderInner<R>>,
    time_chunks: Vec<ChunkMetadata>,
    value_chunks: Vec<ChunkMetadata>,
    filter: Option<Arc<dyn Filter>>,
    pair_index: usize,
    rows: VecDeque<(i64, Value)>,
    closed: bool,
}

impl<R: Read + Seek> AlignedSeriesScanIterator<R> {
    pub(crate) fn new(
        inner: Weak<ReaderInner<R>>,
        time_chunks: Vec<ChunkMetadata>,
        value_chunks: Vec<ChunkMetadata>,
        filter: Option<Arc<dyn Filter>>,
    ) -> Result<Self> {
        if time_chunks.len() != value_chunks.len() {
            return Err(corrupted_err!(
                "aligned series holds {} time chunks but {} value chunks",
                time_chunks.len(),
                value_chunks.len()
            ));
        }
        Ok(Self {
            inner,
            time_chunks,
            value_chunks,
            filter,
            pair_index: 0,
            rows: VecDeque::new(),
            closed: false,
        })
    }

    fn upgrade(&self) -> Result<Arc<ReaderInner<R>>> {
        if self.closed {
            return Err(TsFileError::InvalidState(
                "the scan iterator is closed".to_string(),
            ));
        }
        self.inner.upgrade().ok_or_else(|| {
            TsFileError::InvalidState("the owning reader is gone".to_string())
        })
    }

    fn load_next_pair(&mut self) -> Result<bool> {
        let inner = self.upgrade()?;
        while self.pair_index < self.time_chunks.len() {
            let time_metadata = &self.time_chunks[self.pair_index];
            let value_metadata = &self.value_chunks[self.pair_index];
            self.pair_index += 1;
            if let Some(filter) = &self.filter {
                if !filter.satisfy_statistics(&time_metadata.statistics) {
                    continue;
                }
            }
            let time_chunk = inner.read_chunk(time_metadata.offset_of_chunk_header as u64)?;
            let value_chunk = inner.read_chunk(value_metadata.offset_of_chunk_header as u64)?;

            // pages of a pair are produced in lock-step; statistics-based
            // page skipping would desynchronize them, so pages are pruned
            // per row here instead
            let time_pages =
                split_pages(&time_chunk.0, &time_chunk.1, TsDataType::Vector, None)?;
            let value_pages =
                split_pages(&value_chunk.0, &value_chunk.1, value_chunk.0.data_type, None)?;
            if time_pages.len() != value_pages.len() {
                return Err(corrupted_err!(
                    "aligned chunk pair holds {} time pages but {} value pages",
                    time_pages.len(),
                    value_pages.len()
                ));
            }
            for (time_page, value_page) in time_pages.iter().zip(&value_pages) {
                // the time chunk header records its own encoding tag
                let times = decode_time_page(&time_page.body, time_chunk.0.encoding)?;
                let values = decode_value_page(&value_chunk.0, &value_page.body)?;
                if times.len() != values.len() {
                    return Err(corrupted_err!(
                        "aligned page holds {} timestamps but {} rows",
                        times.len(),
                        values.len()
                    ));
                }
                for (time, value) in times.into_iter().zip(values) {
                    let wanted = self
                        .filter
                        .as_ref()
                        .map(|f| f.satisfy_time(time))
                        .unwrap_or(true);
                    if !wanted {
                        continue;
                    }
                    if let Some(value) = value {
                        self.rows.push_back((time, value));
                    }
                }
            }
            if !self.rows.is_empty() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The next present (non-null) row, or `None` at end of stream.
    pub fn next_point(&mut self) -> Result<Option<(i64, Value)>> {
        loop {
            if let Some(row) = self.rows.pop_front() {
                return Ok(Some(row));
            }
            if !self.load_next_pair()? {
                return Ok(None);
            }
        }
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.rows.clear();
    }
}
