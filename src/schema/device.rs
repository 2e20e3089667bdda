use std::fmt::{Display, Formatter};
use std::io::{Read, Write};

use crate::error::{Result, TsFileError};
use crate::io::{read_var_str, read_var_u32, write_var_str, write_var_u32};

/// Identifies one row source within a table: an ordered, non-empty tuple of
/// string segments. The first segment is always the table name; the remaining
/// segments are the TAG column values in schema order.
///
/// The derived ordering is lexicographic on segments, which is the order
/// devices appear in chunk groups and in the device index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId {
    segments: Vec<String>,
}

impl DeviceId {
    pub fn new(segments: Vec<String>) -> Result<Self> {
        if segments.is_empty() {
            return Err(TsFileError::InvalidArg(
                "a device id requires at least one segment".to_string(),
            ));
        }
        Ok(Self { segments })
    }

    /// A single-segment id, as used by tree-style (non-table) registration.
    pub fn from_name(name: impl Into<String>) -> Self {
        Self {
            segments: vec![name.into()],
        }
    }

    /// Builds the id of a table row: the table name followed by the TAG
    /// column values in schema order.
    pub fn from_tags(table_name: &str, tags: &[String]) -> Self {
        let mut segments = Vec::with_capacity(1 + tags.len());
        segments.push(table_name.to_string());
        segments.extend(tags.iter().cloned());
        Self { segments }
    }

    pub fn table_name(&self) -> &str {
        &self.segments[0]
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The TAG column values, i.e. every segment after the table name.
    pub fn tag_values(&self) -> &[String] {
        &self.segments[1..]
    }

    /// The bytes hashed into the bloom filter: segments joined by NUL, which
    /// cannot occur inside a segment produced by this crate's write path.
    pub fn bloom_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![];
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                bytes.push(0u8);
            }
            bytes.extend_from_slice(segment.as_bytes());
        }
        bytes
    }

    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_var_u32(writer, self.segments.len() as u32)?;
        for segment in &self.segments {
            write_var_str(writer, segment)?;
        }
        Ok(())
    }

    pub fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        let count = read_var_u32(reader)? as usize;
        if count == 0 {
            return Err(corrupted_err!("device id with zero segments"));
        }
        let mut segments = Vec::with_capacity(count);
        for _ in 0..count {
            segments.push(read_var_str(reader)?);
        }
        Ok(Self { segments })
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}
