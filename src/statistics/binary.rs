use std::io::{Read, Write};

use crate::error::Result;
use crate::io::{read_var_bytes, write_var_bytes};

/// The value summary of one byte-sequence series. Binary series only track
/// their boundary values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryStatistics {
    pub first_value: Vec<u8>,
    pub last_value: Vec<u8>,
}

impl BinaryStatistics {
    pub(crate) fn empty() -> Self {
        Self {
            first_value: vec![],
            last_value: vec![],
        }
    }

    pub(crate) fn init(&mut self, value: &[u8]) {
        self.first_value = value.to_vec();
        self.last_value = value.to_vec();
    }

    pub(crate) fn update(&mut self, value: &[u8], is_first: bool, is_last: bool) {
        if is_first {
            self.first_value = value.to_vec();
        }
        if is_last {
            self.last_value = value.to_vec();
        }
    }

    pub(crate) fn merge(&mut self, other: &Self, other_is_front: bool) {
        if other_is_front {
            self.first_value = other.first_value.clone();
        } else {
            self.last_value = other.last_value.clone();
        }
    }

    pub(crate) fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_var_bytes(writer, &self.first_value)?;
        write_var_bytes(writer, &self.last_value)
    }

    pub(crate) fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        let first_value = read_var_bytes(reader)?;
        let last_value = read_var_bytes(reader)?;
        Ok(Self {
            first_value,
            last_value,
        })
    }
}
