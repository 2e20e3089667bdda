use std::io::{Read, Write};

use crate::error::Result;
use crate::io::{read_u8, write_err, write_u8};

/// The value summary of one boolean series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BooleanStatistics {
    pub first_value: bool,
    pub last_value: bool,
    /// The number of `true` values.
    pub sum_value: i64,
}

impl BooleanStatistics {
    pub(crate) fn empty() -> Self {
        Self {
            first_value: false,
            last_value: false,
            sum_value: 0,
        }
    }

    pub(crate) fn init(&mut self, value: bool) {
        self.first_value = value;
        self.last_value = value;
        self.sum_value = value as i64;
    }

    pub(crate) fn update(&mut self, value: bool, is_first: bool, is_last: bool) {
        if is_first {
            self.first_value = value;
        }
        if is_last {
            self.last_value = value;
        }
        self.sum_value += value as i64;
    }

    pub(crate) fn merge(&mut self, other: &Self, other_is_front: bool) {
        if other_is_front {
            self.first_value = other.first_value;
        } else {
            self.last_value = other.last_value;
        }
        self.sum_value += other.sum_value;
    }

    pub(crate) fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_u8(writer, self.first_value as u8)?;
        write_u8(writer, self.last_value as u8)?;
        writer
            .write_all(&self.sum_value.to_le_bytes())
            .map_err(write_err)
    }

    pub(crate) fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        let first_value = read_u8(reader)? != 0;
        let last_value = read_u8(reader)? != 0;
        let mut sum = [0u8; 8];
        reader.read_exact(&mut sum)?;
        Ok(Self {
            first_value,
            last_value,
            sum_value: i64::from_le_bytes(sum),
        })
    }
}
