//! TS_2DIFF: delta encoding for monotonic-ish integer streams. The base
//! value is stored zigzag-encoded, followed by blocks of bit-packed deltas
//! relative to the block's minimum delta.

use crate::error::{Result, TsFileError};
use crate::io::{write_var_i64, write_var_u64};

use super::{bitpacked, uleb128, zigzag_leb128, Decoder, Encoder};

/// Deltas per block. One block header (min delta + bit width) amortizes over
/// this many values.
const BLOCK_SIZE: usize = 128;

pub struct Ts2DiffEncoder {
    values: Vec<i64>,
}

impl Ts2DiffEncoder {
    pub fn new() -> Self {
        Self { values: vec![] }
    }
}

impl Default for Ts2DiffEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<i64> for Ts2DiffEncoder {
    fn encode(&mut self, value: i64) {
        self.values.push(value);
    }

    fn size(&self) -> usize {
        // worst case: every delta needs the full 64 bits plus block headers
        10 + self.values.len() * 9 + (self.values.len() / BLOCK_SIZE + 1) * 11
    }

    fn count(&self) -> usize {
        self.values.len()
    }

    fn flush(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
        write_var_u64(buffer, self.values.len() as u64)?;
        if self.values.is_empty() {
            return Ok(());
        }
        write_var_i64(buffer, self.values[0])?;

        let deltas: Vec<i64> = self
            .values
            .windows(2)
            .map(|w| w[1].wrapping_sub(w[0]))
            .collect();
        for block in deltas.chunks(BLOCK_SIZE) {
            let min_delta = *block.iter().min().unwrap();
            let offsets: Vec<u64> = block
                .iter()
                .map(|d| (*d as i128 - min_delta as i128) as u64)
                .collect();
            let max_offset = offsets.iter().copied().max().unwrap();
            let width = bitpacked::num_bits(max_offset);

            write_var_i64(buffer, min_delta)?;
            buffer.push(width);
            bitpacked::encode(&offsets, width, buffer);
        }

        self.values.clear();
        Ok(())
    }
}

pub struct Ts2DiffDecoder {
    values: Vec<i64>,
    offset: usize,
}

impl Ts2DiffDecoder {
    pub fn new(data: &[u8]) -> Result<Self> {
        Ok(Self {
            values: decode_all(data)?,
            offset: 0,
        })
    }
}

fn decode_all(data: &[u8]) -> Result<Vec<i64>> {
    let mut pos = 0;
    let (count, consumed) = uleb128::decode(data);
    pos += consumed;
    let count = count as usize;
    if count == 0 {
        return Ok(vec![]);
    }

    let (first, consumed) = zigzag_leb128::decode(&data[pos..]);
    pos += consumed;

    let mut values = Vec::with_capacity(count);
    values.push(first);
    let mut previous = first;

    let mut remaining = count - 1;
    while remaining > 0 {
        let block_len = remaining.min(BLOCK_SIZE);
        if pos >= data.len() {
            return Err(corrupted_err!("ts_2diff stream truncated"));
        }
        let (min_delta, consumed) = zigzag_leb128::decode(&data[pos..]);
        pos += consumed;
        let width = *data
            .get(pos)
            .ok_or_else(|| corrupted_err!("ts_2diff stream truncated"))?;
        pos += 1;

        let packed_len = bitpacked::packed_len(block_len, width);
        if pos + packed_len > data.len() {
            return Err(corrupted_err!("ts_2diff block truncated"));
        }
        let offsets = bitpacked::decode(&data[pos..pos + packed_len], width, block_len)?;
        pos += packed_len;

        for offset in offsets {
            let delta = (min_delta as i128 + offset as i128) as i64;
            previous = previous.wrapping_add(delta);
            values.push(previous);
        }
        remaining -= block_len;
    }
    Ok(values)
}

impl Decoder<i64> for Ts2DiffDecoder {
    fn has_next(&self) -> bool {
        self.offset < self.values.len()
    }

    fn next(&mut self) -> Result<i64> {
        if self.offset >= self.values.len() {
            return Err(TsFileError::NoMoreData);
        }
        let value = self.values[self.offset];
        self.offset += 1;
        Ok(value)
    }
}

pub struct Ts2DiffI32Encoder {
    inner: Ts2DiffEncoder,
}

impl Ts2DiffI32Encoder {
    pub fn new() -> Self {
        Self {
            inner: Ts2DiffEncoder::new(),
        }
    }
}

impl Default for Ts2DiffI32Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<i32> for Ts2DiffI32Encoder {
    fn encode(&mut self, value: i32) {
        self.inner.encode(value as i64);
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    fn count(&self) -> usize {
        self.inner.count()
    }

    fn flush(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
        self.inner.flush(buffer)
    }
}

pub struct Ts2DiffI32Decoder {
    inner: Ts2DiffDecoder,
}

impl Ts2DiffI32Decoder {
    pub fn new(data: &[u8]) -> Result<Self> {
        Ok(Self {
            inner: Ts2DiffDecoder::new(data)?,
        })
    }
}

impl Decoder<i32> for Ts2DiffI32Decoder {
    fn has_next(&self) -> bool {
        self.inner.has_next()
    }

    fn next(&mut self) -> Result<i32> {
        Ok(self.inner.next()? as i32)
    }
}
