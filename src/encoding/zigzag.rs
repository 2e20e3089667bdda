//! ZIGZAG: signed integers mapped to unsigned and stored as varints.

use crate::error::{Result, TsFileError};
use crate::io::{write_var_i64, write_var_u64};

use super::{uleb128, zigzag_leb128, Decoder, Encoder};

macro_rules! zigzag_int {
    ($encoder:ident, $decoder:ident, $type:ty) => {
        pub struct $encoder {
            values: Vec<i64>,
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
                self.values.push(value as i64);
            }

            fn size(&self) -> usize {
                10 + self.values.len() * 10
            }

            fn count(&self) -> usize {
                self.values.len()
            }

            fn flush(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
                write_var_u64(buffer, self.values.len() as u64)?;
                for value in &self.values {
                    write_var_i64(buffer, *value)?;
                }
                self.values.clear();
                Ok(())
            }
        }

        pub struct $decoder {
            data: Vec<u8>,
            offset: usize,
            remaining: usize,
        }

        impl $decoder {
            pub fn new(data: &[u8]) -> Result<Self> {
                let (count, consumed) = uleb128::decode(data);
                Ok(Self {
                    data: data.to_vec(),
                    offset: consumed,
                    remaining: count as usize,
                })
            }
        }

        impl Decoder<$type> for $decoder {
            fn has_next(&self) -> bool {
                self.remaining > 0
            }

            fn next(&mut self) -> Result<$type> {
                if self.remaining == 0 {
                    return Err(TsFileError::NoMoreData);
                }
                if self.offset >= self.data.len() {
                    return Err(corrupted_err!("zigzag stream truncated"));
                }
                let (value, consumed) = zigzag_leb128::decode(&self.data[self.offset..]);
                self.offset += consumed;
                self.remaining -= 1;
                Ok(value as $type)
            }
        }
    };
}

zigzag_int!(IntZigzagEncoder, IntZigzagDecoder, i32);
zigzag_int!(LongZigzagEncoder, LongZigzagDecoder, i64);
