//! The footer's bloom filter over every (table, device, measurement) triple.

use std::io::{Read, Write};

use crate::encoding::ceil8;
use crate::error::Result;
use crate::io::{read_exact_vec, read_var_u32, write_var_u32};
use crate::schema::DeviceId;

/// The seed schedule of the murmur3 hash family. At most eight hash
/// functions are ever used.
const SEEDS: [u64; 8] = [5, 7, 11, 19, 31, 37, 43, 59];

/// The bit array never shrinks below this, so tiny files keep a usable
/// false-positive rate.
const MINIMAL_SIZE: u32 = 256;

const MAXIMAL_HASH_FUNCTION_SIZE: u32 = 8;

/// A bit-array membership filter sized from a target false-positive rate.
#[derive(Debug, Clone, PartialEq)]
pub struct BloomFilter {
    /// Size of the bit array, in bits.
    size: u32,
    hash_function_size: u32,
    bits: Vec<u8>,
}

impl BloomFilter {
    /// An empty filter for `entry_count` expected entries at `error_rate`:
    /// `m = -n ln p / (ln 2)^2` bits and `k = (m / n) ln 2` hashes.
    pub fn build(error_rate: f64, entry_count: usize) -> Self {
        let n = entry_count.max(1) as f64;
        let ln2 = std::f64::consts::LN_2;
        let m = (-n * error_rate.ln() / (ln2 * ln2)).ceil() as u32;
        let size = m.max(MINIMAL_SIZE);
        let k = ((size as f64 / n) * ln2).ceil() as u32;
        let hash_function_size = k.clamp(1, MAXIMAL_HASH_FUNCTION_SIZE);
        Self {
            size,
            hash_function_size,
            bits: vec![0; ceil8(size as usize)],
        }
    }

    fn index(&self, entry: &[u8], seed: u64) -> usize {
        let (h1, h2) = murmurhash3::murmurhash3_x64_128(entry, seed);
        (h1.wrapping_add(h2) % self.size as u64) as usize
    }

    pub fn add(&mut self, entry: &[u8]) {
        for seed in &SEEDS[..self.hash_function_size as usize] {
            let index = self.index(entry, *seed);
            self.bits[index / 8] |= 1 << (index % 8);
        }
    }

    pub fn contains(&self, entry: &[u8]) -> bool {
        SEEDS[..self.hash_function_size as usize].iter().all(|seed| {
            let index = self.index(entry, *seed);
            self.bits[index / 8] & (1 << (index % 8)) != 0
        })
    }

    /// The filter key of one series: `table || device || measurement`.
    pub fn entry(table_name: &str, device: &DeviceId, measurement: &str) -> Vec<u8> {
        let mut entry = vec![];
        entry.extend_from_slice(table_name.as_bytes());
        entry.extend_from_slice(&device.bloom_bytes());
        entry.extend_from_slice(measurement.as_bytes());
        entry
    }

    /// `{size(bits): uvarint, k: uvarint, bitmap bytes}`. An absent filter is
    /// written by [`serialize_absent`].
    pub fn serialize<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_var_u32(writer, self.size)?;
        write_var_u32(writer, self.hash_function_size)?;
        writer.write_all(&self.bits).map_err(crate::io::write_err)
    }

    /// Reads a filter, or `None` when the absent marker (size 0) was
    /// written.
    pub fn deserialize<R: Read>(reader: &mut R) -> Result<Option<Self>> {
        let size = read_var_u32(reader)?;
        if size == 0 {
            return Ok(None);
        }
        let hash_function_size = read_var_u32(reader)?.clamp(1, MAXIMAL_HASH_FUNCTION_SIZE);
        let bits = read_exact_vec(reader, ceil8(size as usize))?;
        Ok(Some(Self {
            size,
            hash_function_size,
            bits,
        }))
    }
}

/// Writes the single-byte marker of an absent filter.
pub fn serialize_absent<W: Write>(writer: &mut W) -> Result<()> {
    write_var_u32(writer, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn entry(i: usize) -> Vec<u8> {
        BloomFilter::entry(
            "t1",
            &DeviceId::from_tags("t1", &[format!("d{}", i)]),
            "s1",
        )
    }

    #[test]
    fn added_entries_are_always_found() {
        let mut filter = BloomFilter::build(0.05, 1000);
        for i in 0..1000 {
            filter.add(&entry(i));
        }
        for i in 0..1000 {
            assert!(filter.contains(&entry(i)));
        }
    }

    #[test]
    fn false_positive_rate_is_bounded() {
        let mut filter = BloomFilter::build(0.05, 1000);
        for i in 0..1000 {
            filter.add(&entry(i));
        }
        let false_positives = (1000..2000).filter(|i| filter.contains(&entry(*i))).count();
        // twice the configured rate leaves generous probabilistic slack
        assert!(
            false_positives <= 100,
            "false positive rate too high: {}/1000",
            false_positives
        );
    }

    #[test]
    fn empty_filter_rejects_everything() {
        let filter = BloomFilter::build(0.05, 10);
        assert!(!filter.contains(&entry(0)));
    }

    #[test]
    fn roundtrip() -> Result<()> {
        let mut filter = BloomFilter::build(0.01, 50);
        for i in 0..50 {
            filter.add(&entry(i));
        }
        let mut buffer = vec![];
        filter.serialize(&mut buffer)?;
        let decoded = BloomFilter::deserialize(&mut Cursor::new(buffer))?.unwrap();
        assert_eq!(decoded, filter);
        Ok(())
    }

    #[test]
    fn absent_marker_roundtrip() -> Result<()> {
        let mut buffer = vec![];
        serialize_absent(&mut buffer)?;
        assert_eq!(buffer, vec![0u8]);
        assert_eq!(BloomFilter::deserialize(&mut Cursor::new(buffer))?, None);
        Ok(())
    }

    #[test]
    fn minimal_size_applies() {
        let filter = BloomFilter::build(0.05, 1);
        assert_eq!(filter.size, MINIMAL_SIZE);
    }
}
