//! Byte framing primitives: position-tracked writers, fixed-width
//! little-endian integers and self-describing strings and byte sequences.

use std::io::{Read, Write};

use crate::encoding::{uleb128, zigzag_leb128};
use crate::error::{Result, TsFileError};

/// A [`Write`] that knows its absolute byte position.
///
/// The writer pipeline records chunk and index offsets while streaming, so
/// every sink is wrapped into one of these.
pub trait PositionedWrite: Write {
    fn pos(&self) -> u64;
}

/// Wraps any [`Write`] and counts the bytes that pass through it.
pub struct TrackedWrite<W: Write> {
    writer: W,
    position: u64,
}

impl<W: Write> TrackedWrite<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            position: 0,
        }
    }

    /// Consumes the wrapper, returning the inner writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn inner(&self) -> &W {
        &self.writer
    }
}

impl<W: Write> Write for TrackedWrite<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.writer.write(buf)?;
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl<W: Write> PositionedWrite for TrackedWrite<W> {
    fn pos(&self) -> u64 {
        self.position
    }
}

impl PositionedWrite for Vec<u8> {
    fn pos(&self) -> u64 {
        self.len() as u64
    }
}

/// Wraps an I/O error raised on the write path.
pub(crate) fn write_err(e: std::io::Error) -> TsFileError {
    TsFileError::FileWrite(format!("underlying IO error: {}", e))
}

pub fn write_u8<W: Write>(writer: &mut W, value: u8) -> Result<()> {
    writer.write_all(&[value]).map_err(write_err)
}

pub fn write_u32_le<W: Write>(writer: &mut W, value: u32) -> Result<()> {
    writer.write_all(&value.to_le_bytes()).map_err(write_err)
}

pub fn write_i64_le<W: Write>(writer: &mut W, value: i64) -> Result<()> {
    writer.write_all(&value.to_le_bytes()).map_err(write_err)
}

pub fn write_var_u32<W: Write>(writer: &mut W, value: u32) -> Result<()> {
    write_var_u64(writer, value as u64)
}

pub fn write_var_u64<W: Write>(writer: &mut W, value: u64) -> Result<()> {
    let mut container = [0u8; 10];
    let used = uleb128::encode(value, &mut container);
    writer.write_all(&container[..used]).map_err(write_err)
}

pub fn write_var_i64<W: Write>(writer: &mut W, value: i64) -> Result<()> {
    let (container, used) = zigzag_leb128::encode(value);
    writer.write_all(&container[..used]).map_err(write_err)
}

/// `{len: uvarint, UTF-8 bytes}`.
pub fn write_var_str<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    write_var_bytes(writer, value.as_bytes())
}

/// Nullable variant: the length is zigzag-signed and `None` is length -1.
/// The two length encodings never mix within one field.
pub fn write_nullable_var_str<W: Write>(writer: &mut W, value: Option<&str>) -> Result<()> {
    match value {
        None => write_var_i64(writer, -1),
        Some(value) => {
            write_var_i64(writer, value.len() as i64)?;
            writer.write_all(value.as_bytes()).map_err(write_err)
        }
    }
}

/// `{len: uvarint, bytes}`.
pub fn write_var_bytes<W: Write>(writer: &mut W, value: &[u8]) -> Result<()> {
    write_var_u64(writer, value.len() as u64)?;
    writer.write_all(value).map_err(write_err)
}

pub fn read_u8<R: Read>(reader: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub fn read_u32_le<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_i64_le<R: Read>(reader: &mut R) -> Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

pub fn read_var_u64<R: Read>(reader: &mut R) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = read_u8(reader)?;
        if shift == 63 && byte > 1 {
            return Err(corrupted_err!("uvarint larger than u64"));
        }
        result |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

pub fn read_var_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let value = read_var_u64(reader)?;
    u32::try_from(value).map_err(|_| corrupted_err!("uvarint {} larger than u32", value))
}

pub fn read_var_i64<R: Read>(reader: &mut R) -> Result<i64> {
    let value = read_var_u64(reader)?;
    Ok(zigzag_leb128::decode_value(value))
}

/// Reads exactly `length` bytes into a fresh buffer.
pub fn read_exact_vec<R: Read>(reader: &mut R, length: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; length];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_var_bytes<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let length = read_var_u64(reader)? as usize;
    read_exact_vec(reader, length)
}

pub fn read_var_str<R: Read>(reader: &mut R) -> Result<String> {
    let bytes = read_var_bytes(reader)?;
    String::from_utf8(bytes).map_err(|e| corrupted_err!("invalid utf-8 string: {}", e))
}

pub fn read_nullable_var_str<R: Read>(reader: &mut R) -> Result<Option<String>> {
    let length = read_var_i64(reader)?;
    if length < 0 {
        return Ok(None);
    }
    let bytes = read_exact_vec(reader, length as usize)?;
    let value =
        String::from_utf8(bytes).map_err(|e| corrupted_err!("invalid utf-8 string: {}", e))?;
    Ok(Some(value))
}
