use std::io::{Read, Write};

use crate::error::Result;
use crate::io::write_err;

macro_rules! primitive_statistics {
    ($name:ident, $type:ty, $sum:ty, $min_sentinel:expr, $max_sentinel:expr) => {
        /// The value summary of one numeric series: extremes, boundary
        /// values and the running sum.
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub struct $name {
            pub min_value: $type,
            pub max_value: $type,
            pub first_value: $type,
            pub last_value: $type,
            pub sum_value: $sum,
        }

        impl $name {
            pub(crate) fn empty() -> Self {
                Self {
                    min_value: $max_sentinel,
                    max_value: $min_sentinel,
                    first_value: Default::default(),
                    last_value: Default::default(),
                    sum_value: Default::default(),
                }
            }

            pub(crate) fn init(&mut self, value: $type) {
                self.min_value = value;
                self.max_value = value;
                self.first_value = value;
                self.last_value = value;
                self.sum_value = value as $sum;
            }

            pub(crate) fn update(&mut self, value: $type, is_first: bool, is_last: bool) {
                if value < self.min_value {
                    self.min_value = value;
                }
                if value > self.max_value {
                    self.max_value = value;
                }
                if is_first {
                    self.first_value = value;
                }
                if is_last {
                    self.last_value = value;
                }
                self.sum_value += value as $sum;
            }

            pub(crate) fn merge(&mut self, other: &Self, other_is_front: bool) {
                if other.min_value < self.min_value {
                    self.min_value = other.min_value;
                }
                if other.max_value > self.max_value {
                    self.max_value = other.max_value;
                }
                if other_is_front {
                    self.first_value = other.first_value;
                } else {
                    self.last_value = other.last_value;
                }
                self.sum_value += other.sum_value;
            }

            pub(crate) fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
                writer.write_all(&self.min_value.to_le_bytes()).map_err(write_err)?;
                writer.write_all(&self.max_value.to_le_bytes()).map_err(write_err)?;
                writer.write_all(&self.first_value.to_le_bytes()).map_err(write_err)?;
                writer.write_all(&self.last_value.to_le_bytes()).map_err(write_err)?;
                writer.write_all(&self.sum_value.to_le_bytes()).map_err(write_err)?;
                Ok(())
            }

            pub(crate) fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
                let mut value = [0u8; std::mem::size_of::<$type>()];
                let mut sum = [0u8; std::mem::size_of::<$sum>()];
                reader.read_exact(&mut value)?;
                let min_value = <$type>::from_le_bytes(value);
                reader.read_exact(&mut value)?;
                let max_value = <$type>::from_le_bytes(value);
                reader.read_exact(&mut value)?;
                let first_value = <$type>::from_le_bytes(value);
                reader.read_exact(&mut value)?;
                let last_value = <$type>::from_le_bytes(value);
                reader.read_exact(&mut sum)?;
                let sum_value = <$sum>::from_le_bytes(sum);
                Ok(Self {
                    min_value,
                    max_value,
                    first_value,
                    last_value,
                    sum_value,
                })
            }
        }
    };
}

primitive_statistics!(Int32Statistics, i32, i64, i32::MIN, i32::MAX);
primitive_statistics!(Int64Statistics, i64, f64, i64::MIN, i64::MAX);
primitive_statistics!(FloatStatistics, f32, f64, f32::MIN, f32::MAX);
primitive_statistics!(DoubleStatistics, f64, f64, f64::MIN, f64::MAX);
