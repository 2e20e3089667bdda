//! RLE: hybrid repeat-run / bit-packed-literal encoding. Runs store the
//! value once with its length; literal stretches are bit-packed in groups
//! of eight values, the last group of a stream zero-padded up to the group
//! boundary. The declared count tells the decoder where the real values
//! end.

use crate::error::{Result, TsFileError};
use crate::io::write_var_u64;

use super::{bitpacked, ceil8, uleb128, zigzag_leb128, Decoder, Encoder};

/// Minimum repeat length worth a dedicated run record.
const MIN_RUN: usize = 8;

/// Appends the hybrid stream of `values`: `{count: uvarint, bit_width: u8}`
/// followed by run and literal-group records. Run records only start on a
/// group boundary, so padding can only ever occur in the stream's final
/// literal group.
pub(super) fn encode_u64(values: &[u64], buffer: &mut Vec<u8>) -> Result<()> {
    write_var_u64(buffer, values.len() as u64)?;
    if values.is_empty() {
        return Ok(());
    }
    let width = bitpacked::num_bits(values.iter().copied().max().unwrap());
    buffer.push(width);

    let mut literals: Vec<u64> = vec![];
    let mut i = 0;
    while i < values.len() {
        let mut run = 1;
        while i + run < values.len() && values[i + run] == values[i] {
            run += 1;
        }
        // borrow from the run to complete the open literal group; a padded
        // group anywhere but the end would decode as data
        let borrow = (8 - literals.len() % 8) % 8;
        if run >= MIN_RUN + borrow {
            literals.extend(std::iter::repeat(values[i]).take(borrow));
            if !literals.is_empty() {
                write_literal_groups(&literals, width, buffer)?;
                literals.clear();
            }
            write_run(values[i], run - borrow, width, buffer)?;
        } else {
            literals.extend(std::iter::repeat(values[i]).take(run));
        }
        i += run;
    }
    if !literals.is_empty() {
        literals.resize(ceil8(literals.len()) * 8, 0);
        write_literal_groups(&literals, width, buffer)?;
    }
    Ok(())
}

fn write_run(value: u64, length: usize, width: u8, buffer: &mut Vec<u8>) -> Result<()> {
    write_var_u64(buffer, (length as u64) << 1)?;
    let bytes = value.to_le_bytes();
    buffer.extend_from_slice(&bytes[..ceil8(width as usize)]);
    Ok(())
}

/// Emits one literal-group record. `literals` must be a whole number of
/// groups of eight.
fn write_literal_groups(literals: &[u64], width: u8, buffer: &mut Vec<u8>) -> Result<()> {
    debug_assert_eq!(literals.len() % 8, 0);
    let groups = literals.len() / 8;
    write_var_u64(buffer, ((groups as u64) << 1) | 1)?;
    bitpacked::encode(literals, width, buffer);
    Ok(())
}

pub(super) fn decode_u64(data: &[u8]) -> Result<Vec<u64>> {
    let mut pos = 0;
    let (count, consumed) = uleb128::decode(data);
    pos += consumed;
    let count = count as usize;
    if count == 0 {
        return Ok(vec![]);
    }
    let width = *data
        .get(pos)
        .ok_or_else(|| corrupted_err!("rle stream truncated"))?;
    pos += 1;
    if width > 64 {
        return Err(corrupted_err!("rle bit width {} out of range", width));
    }
    let value_bytes = ceil8(width as usize);

    let mut values = Vec::with_capacity(count);
    while values.len() < count {
        if pos >= data.len() {
            return Err(corrupted_err!("rle stream truncated"));
        }
        let (header, consumed) = uleb128::decode(&data[pos..]);
        pos += consumed;
        if header & 1 == 0 {
            // repeat run
            let length = (header >> 1) as usize;
            if pos + value_bytes > data.len() {
                return Err(corrupted_err!("rle run truncated"));
            }
            let mut bytes = [0u8; 8];
            bytes[..value_bytes].copy_from_slice(&data[pos..pos + value_bytes]);
            pos += value_bytes;
            let value = u64::from_le_bytes(bytes);
            if values.len() + length > count {
                return Err(corrupted_err!("rle run overflows the declared count"));
            }
            values.extend(std::iter::repeat(value).take(length));
        } else {
            // bit-packed literal groups; the final group may declare up to
            // seven padding values beyond the count
            let groups = (header >> 1) as usize;
            let length = groups * 8;
            let packed_len = bitpacked::packed_len(length, width);
            if pos + packed_len > data.len() {
                return Err(corrupted_err!("rle literal group truncated"));
            }
            let remaining = count - values.len();
            if length > remaining + 7 {
                return Err(corrupted_err!("rle literals overflow the declared count"));
            }
            let decoded = bitpacked::decode(&data[pos..pos + packed_len], width, length)?;
            values.extend(decoded.into_iter().take(remaining));
            pos += packed_len;
        }
    }
    Ok(values)
}

macro_rules! rle_int {
    ($encoder:ident, $decoder:ident, $type:ty) => {
        /// Zigzag-maps signed values before the hybrid run-length stream.
        pub struct $encoder {
            values: Vec<u64>,
        }

        impl $encoder {
            pub fn new() -> Self {
                Self { values: vec![] }
            }
        }

        impl Default for $encoder {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Encoder<$type> for $encoder {
            fn encode(&mut self, value: $type) {
                let value = value as i64;
                self.values.push(((value << 1) ^ (value >> 63)) as u64);
            }

            fn size(&self) -> usize {
                16 + self.values.len() * 9
            }

            fn count(&self) -> usize {
                self.values.len()
            }

            fn flush(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
                encode_u64(&self.values, buffer)?;
                self.values.clear();
                Ok(())
            }
        }

        pub struct $decoder {
            values: Vec<u64>,
            offset: usize,
        }

        impl $decoder {
            pub fn new(data: &[u8]) -> Result<Self> {
                Ok(Self {
                    values: decode_u64(data)?,
                    offset: 0,
                })
            }
        }

        impl Decoder<$type> for $decoder {
            fn has_next(&self) -> bool {
                self.offset < self.values.len()
            }

            fn next(&mut self) -> Result<$type> {
                if self.offset >= self.values.len() {
                    return Err(TsFileError::NoMoreData);
                }
                let value = zigzag_leb128::decode_value(self.values[self.offset]);
                self.offset += 1;
                Ok(value as $type)
            }
        }
    };
}

rle_int!(IntRleEncoder, IntRleDecoder, i32);
rle_int!(LongRleEncoder, LongRleDecoder, i64);

pub struct BooleanRleEncoder {
    values: Vec<u64>,
}

impl BooleanRleEncoder {
    pub fn new() -> Self {
        Self { values: vec![] }
    }
}

impl Default for BooleanRleEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<bool> for BooleanRleEncoder {
    fn encode(&mut self, value: bool) {
        self.values.push(value as u64);
    }

    fn size(&self) -> usize {
        16 + self.values.len() * 2
    }

    fn count(&self) -> usize {
        self.values.len()
    }

    fn flush(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
        encode_u64(&self.values, buffer)?;
        self.values.clear();
        Ok(())
    }
}

pub struct BooleanRleDecoder {
    values: Vec<u64>,
    offset: usize,
}

impl BooleanRleDecoder {
    pub fn new(data: &[u8]) -> Result<Self> {
        Ok(Self {
            values: decode_u64(data)?,
            offset: 0,
        })
    }
}

impl Decoder<bool> for BooleanRleDecoder {
    fn has_next(&self) -> bool {
        self.offset < self.values.len()
    }

    fn next(&mut self) -> Result<bool> {
        if self.offset >= self.values.len() {
            return Err(TsFileError::NoMoreData);
        }
        let value = self.values[self.offset];
        self.offset += 1;
        Ok(value != 0)
    }
}
