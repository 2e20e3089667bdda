//! PLAIN: fixed-width little-endian values, or length-prefixed byte
//! sequences for binary types.

use std::marker::PhantomData;

use crate::error::{Result, TsFileError};
use crate::io::write_var_bytes;
use crate::types::NativeType;

use super::{uleb128, Decoder, Encoder};

pub struct PlainEncoder<T: NativeType> {
    buffer: Vec<u8>,
    count: usize,
    phantom: PhantomData<T>,
}

impl<T: NativeType> PlainEncoder<T> {
    pub fn new() -> Self {
        Self {
            buffer: vec![],
            count: 0,
            phantom: PhantomData,
        }
    }
}

impl<T: NativeType> Default for PlainEncoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: NativeType> Encoder<T> for PlainEncoder<T> {
    fn encode(&mut self, value: T) {
        self.buffer.extend_from_slice(value.to_le_bytes().as_ref());
        self.count += 1;
    }

    fn size(&self) -> usize {
        self.buffer.len()
    }

    fn count(&self) -> usize {
        self.count
    }

    fn flush(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
        buffer.extend_from_slice(&self.buffer);
        self.buffer.clear();
        self.count = 0;
        Ok(())
    }
}

pub struct PlainDecoder<T: NativeType> {
    data: Vec<u8>,
    offset: usize,
    phantom: PhantomData<T>,
}

impl<T: NativeType> PlainDecoder<T> {
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            offset: 0,
            phantom: PhantomData,
        }
    }
}

impl<T: NativeType> Decoder<T> for PlainDecoder<T> {
    fn has_next(&self) -> bool {
        self.offset + std::mem::size_of::<T>() <= self.data.len()
    }

    fn next(&mut self) -> Result<T> {
        let size = std::mem::size_of::<T>();
        if self.offset + size > self.data.len() {
            return Err(TsFileError::NoMoreData);
        }
        let bytes: T::Bytes = self.data[self.offset..self.offset + size]
            .try_into()
            .map_err(|_| corrupted_err!("plain value truncated"))?;
        self.offset += size;
        Ok(T::from_le_bytes(bytes))
    }
}

pub struct PlainBooleanEncoder {
    buffer: Vec<u8>,
}

impl PlainBooleanEncoder {
    pub fn new() -> Self {
        Self { buffer: vec![] }
    }
}

impl Default for PlainBooleanEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<bool> for PlainBooleanEncoder {
    fn encode(&mut self, value: bool) {
        self.buffer.push(value as u8);
    }

    fn size(&self) -> usize {
        self.buffer.len()
    }

    fn count(&self) -> usize {
        self.buffer.len()
    }

    fn flush(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
        buffer.extend_from_slice(&self.buffer);
        self.buffer.clear();
        Ok(())
    }
}

pub struct PlainBooleanDecoder {
    data: Vec<u8>,
    offset: usize,
}

impl PlainBooleanDecoder {
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            offset: 0,
        }
    }
}

impl Decoder<bool> for PlainBooleanDecoder {
    fn has_next(&self) -> bool {
        self.offset < self.data.len()
    }

    fn next(&mut self) -> Result<bool> {
        if self.offset >= self.data.len() {
            return Err(TsFileError::NoMoreData);
        }
        let value = self.data[self.offset];
        self.offset += 1;
        Ok(value != 0)
    }
}

pub struct PlainBinaryEncoder {
    buffer: Vec<u8>,
    count: usize,
}

impl PlainBinaryEncoder {
    pub fn new() -> Self {
        Self {
            buffer: vec![],
            count: 0,
        }
    }
}

impl Default for PlainBinaryEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<Vec<u8>> for PlainBinaryEncoder {
    fn encode(&mut self, value: Vec<u8>) {
        // writing to a Vec cannot fail
        let _ = write_var_bytes(&mut self.buffer, &value);
        self.count += 1;
    }

    fn size(&self) -> usize {
        self.buffer.len()
    }

    fn count(&self) -> usize {
        self.count
    }

    fn flush(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
        buffer.extend_from_slice(&self.buffer);
        self.buffer.clear();
        self.count = 0;
        Ok(())
    }
}

pub struct PlainBinaryDecoder {
    data: Vec<u8>,
    offset: usize,
}

impl PlainBinaryDecoder {
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: data.to_vec(),
            offset: 0,
        }
    }
}

impl Decoder<Vec<u8>> for PlainBinaryDecoder {
    fn has_next(&self) -> bool {
        self.offset < self.data.len()
    }

    fn next(&mut self) -> Result<Vec<u8>> {
        if self.offset >= self.data.len() {
            return Err(TsFileError::NoMoreData);
        }
        let (length, consumed) = uleb128::decode(&self.data[self.offset..]);
        self.offset += consumed;
        let length = length as usize;
        if self.offset + length > self.data.len() {
            return Err(corrupted_err!("plain binary value truncated"));
        }
        let value = self.data[self.offset..self.offset + length].to_vec();
        self.offset += length;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_roundtrip() -> Result<()> {
        let mut encoder = PlainEncoder::<i32>::new();
        for value in [10, 20, 30, -1, i32::MIN, i32::MAX] {
            encoder.encode(value);
        }
        assert_eq!(encoder.count(), 6);
        let mut buffer = vec![];
        encoder.flush(&mut buffer)?;
        assert_eq!(buffer.len(), 24);

        let mut decoder = PlainDecoder::<i32>::new(&buffer);
        let mut decoded = vec![];
        while decoder.has_next() {
            decoded.push(decoder.next()?);
        }
        assert_eq!(decoded, vec![10, 20, 30, -1, i32::MIN, i32::MAX]);
        assert_eq!(decoder.next(), Err(TsFileError::NoMoreData));
        Ok(())
    }

    #[test]
    fn float_bits_preserved() -> Result<()> {
        let values = vec![0.1f64, -0.0, f64::NAN, f64::INFINITY, 1.5e-300];
        let mut encoder = PlainEncoder::<f64>::new();
        values.iter().for_each(|v| encoder.encode(*v));
        let mut buffer = vec![];
        encoder.flush(&mut buffer)?;

        let mut decoder = PlainDecoder::<f64>::new(&buffer);
        for expected in &values {
            assert_eq!(decoder.next()?.to_bits(), expected.to_bits());
        }
        Ok(())
    }

    #[test]
    fn boolean_roundtrip() -> Result<()> {
        let mut encoder = PlainBooleanEncoder::new();
        [true, false, true].iter().for_each(|v| encoder.encode(*v));
        let mut buffer = vec![];
        encoder.flush(&mut buffer)?;

        let mut decoder = PlainBooleanDecoder::new(&buffer);
        assert_eq!(decoder.next()?, true);
        assert_eq!(decoder.next()?, false);
        assert_eq!(decoder.next()?, true);
        assert!(!decoder.has_next());
        Ok(())
    }

    #[test]
    fn binary_roundtrip() -> Result<()> {
        let values: Vec<Vec<u8>> = vec![b"hello".to_vec(), vec![], b"world".to_vec()];
        let mut encoder = PlainBinaryEncoder::new();
        values.iter().for_each(|v| encoder.encode(v.clone()));
        let mut buffer = vec![];
        encoder.flush(&mut buffer)?;

        let mut decoder = PlainBinaryDecoder::new(&buffer);
        for expected in &values {
            assert_eq!(&decoder.next()?, expected);
        }
        assert!(!decoder.has_next());
        Ok(())
    }
}
