//! GORILLA: XOR-based float compression. Each value is XORed with its
//! predecessor; the control bits `0`, `10` and `11` select identical-value,
//! reuse-window and new-window forms.

use crate::error::{Result, TsFileError};
use crate::io::write_var_u64;

use super::{uleb128, Decoder, Encoder};

/// Appends bits MSB-first to a byte buffer.
struct BitWriter {
    buffer: Vec<u8>,
    acc: u8,
    used: u8,
}

impl BitWriter {
    fn new() -> Self {
        Self {
            buffer: vec![],
            acc: 0,
            used: 0,
        }
    }

    fn write_bit(&mut self, bit: bool) {
        self.acc = (self.acc << 1) | bit as u8;
        self.used += 1;
        if self.used == 8 {
            self.buffer.push(self.acc);
            self.acc = 0;
            self.used = 0;
        }
    }

    /// Writes the low `width` bits of `value`, most significant first.
    fn write_bits(&mut self, value: u64, width: u8) {
        for i in (0..width).rev() {
            self.write_bit((value >> i) & 1 == 1);
        }
    }

    fn len(&self) -> usize {
        self.buffer.len() + 1
    }

    /// Pads the trailing partial byte with zeros and returns the stream.
    fn seal(&mut self) -> Vec<u8> {
        if self.used > 0 {
            let padded = self.acc << (8 - self.used);
            self.buffer.push(padded);
            self.acc = 0;
            self.used = 0;
        }
        std::mem::take(&mut self.buffer)
    }
}

/// Reads bits MSB-first from a byte slice.
struct BitReader {
    data: Vec<u8>,
    bit: usize,
}

impl BitReader {
    fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            bit: 0,
        }
    }

    fn read_bit(&mut self) -> Result<bool> {
        let byte = self.bit / 8;
        if byte >= self.data.len() {
            return Err(corrupted_err!("gorilla bitstream truncated"));
        }
        let bit = (self.data[byte] >> (7 - self.bit % 8)) & 1;
        self.bit += 1;
        Ok(bit == 1)
    }

    fn read_bits(&mut self, width: u8) -> Result<u64> {
        let mut value = 0u64;
        for _ in 0..width {
            value = (value << 1) | self.read_bit()? as u64;
        }
        Ok(value)
    }
}

macro_rules! gorilla {
    ($encoder:ident, $decoder:ident, $type:ty, $bits:ty, $width:expr, $len_bits:expr) => {
        pub struct $encoder {
            writer: BitWriter,
            count: usize,
            previous: $bits,
            leading: u8,
            trailing: u8,
            window_valid: bool,
        }

        impl $encoder {
            pub fn new() -> Self {
                Self {
                    writer: BitWriter::new(),
                    count: 0,
                    previous: 0,
                    leading: 0,
                    trailing: 0,
                    window_valid: false,
                }
            }
        }

        impl Default for $encoder {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Encoder<$type> for $encoder {
            fn encode(&mut self, value: $type) {
                let bits = value.to_bits();
                if self.count == 0 {
                    self.writer.write_bits(bits as u64, $width);
                } else {
                    let xor = bits ^ self.previous;
                    if xor == 0 {
                        self.writer.write_bit(false);
                    } else {
                        self.writer.write_bit(true);
                        let leading = xor.leading_zeros() as u8;
                        let trailing = xor.trailing_zeros() as u8;
                        if self.window_valid
                            && leading >= self.leading
                            && trailing >= self.trailing
                        {
                            self.writer.write_bit(false);
                            let length = $width - self.leading - self.trailing;
                            self.writer
                                .write_bits((xor >> self.trailing) as u64, length);
                        } else {
                            self.writer.write_bit(true);
                            let length = $width - leading - trailing;
                            self.writer.write_bits(leading as u64, $len_bits);
                            // a full-width window wraps to zero in the
                            // length field
                            self.writer
                                .write_bits((length % $width) as u64, $len_bits);
                            self.writer.write_bits((xor >> trailing) as u64, length);
                            self.leading = leading;
                            self.trailing = trailing;
                            self.window_valid = true;
                        }
                    }
                }
                self.previous = bits;
                self.count += 1;
            }

            fn size(&self) -> usize {
                10 + self.writer.len() + 2
            }

            fn count(&self) -> usize {
                self.count
            }

            fn flush(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
                write_var_u64(buffer, self.count as u64)?;
                buffer.extend_from_slice(&self.writer.seal());
                self.count = 0;
                self.previous = 0;
                self.leading = 0;
                self.trailing = 0;
                self.window_valid = false;
                Ok(())
            }
        }

        pub struct $decoder {
            reader: BitReader,
            remaining: usize,
            started: bool,
            previous: $bits,
            leading: u8,
            trailing: u8,
        }

        impl $decoder {
            pub fn new(data: &[u8]) -> Result<Self> {
                let (count, consumed) = uleb128::decode(data);
                Ok(Self {
                    reader: BitReader::new(&data[consumed..]),
                    remaining: count as usize,
                    started: false,
                    previous: 0,
                    leading: 0,
                    trailing: 0,
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
                let bits = if !self.started {
                    self.started = true;
                    self.reader.read_bits($width)? as $bits
                } else if !self.reader.read_bit()? {
                    self.previous
                } else {
                    if self.reader.read_bit()? {
                        self.leading = self.reader.read_bits($len_bits)? as u8;
                        let length = self.reader.read_bits($len_bits)? as u8;
                        let length = if length == 0 { $width } else { length };
                        if self.leading as u16 + length as u16 > $width as u16 {
                            return Err(corrupted_err!("gorilla window out of range"));
                        }
                        self.trailing = $width - self.leading - length;
                    }
                    let length = $width - self.leading - self.trailing;
                    let xor = (self.reader.read_bits(length)? as $bits) << self.trailing;
                    self.previous ^ xor
                };
                self.previous = bits;
                self.remaining -= 1;
                Ok(<$type>::from_bits(bits))
            }
        }
    };
}

gorilla!(GorillaEncoder, GorillaDecoder, f64, u64, 64u8, 6u8);
gorilla!(GorillaF32Encoder, GorillaF32Decoder, f32, u32, 32u8, 6u8);
