//! Zigzag-ULEB128: signed varints for time deltas, statistics prefixes and
//! nullable string lengths. Small magnitudes of either sign stay small on
//! disk.

use super::uleb128;

/// Encodes `value` as zigzag-ULEB128, returning the container and the number
/// of bytes used.
pub fn encode(value: i64) -> ([u8; 10], usize) {
    let zigzag = ((value << 1) ^ (value >> 63)) as u64;
    let mut container = [0u8; 10];
    let used = uleb128::encode(zigzag, &mut container);
    (container, used)
}

/// Decodes a zigzag-ULEB128 value from the front of `bytes`, returning it
/// together with the number of bytes consumed.
pub fn decode(bytes: &[u8]) -> (i64, usize) {
    let (zigzag, consumed) = uleb128::decode(bytes);
    (decode_value(zigzag), consumed)
}

/// Undoes the zigzag mapping of an already-decoded unsigned value.
#[inline]
pub fn decode_value(zigzag: u64) -> i64 {
    (zigzag >> 1) as i64 ^ -((zigzag & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signs_interleave_from_zero() {
        // 0, -1, 1, -2, 2, ... is the order the mapping assigns codes in
        for (zigzag, expected) in [(0u64, 0i64), (1, -1), (2, 1), (3, -2), (4, 2)] {
            assert_eq!(decode_value(zigzag), expected);
        }
    }

    #[test]
    fn delta_like_values_roundtrip() {
        // the shapes TS_2DIFF feeds through here: small jitter around a
        // sampling interval, plus the extremes
        for value in [0i64, 1, -1, 50, -50, 1000, -999, i64::MIN, i64::MAX] {
            let (container, used) = encode(value);
            let (decoded, consumed) = decode(&container[..used]);
            assert_eq!((decoded, consumed), (value, used));
        }
    }

    #[test]
    fn small_magnitudes_stay_single_byte() {
        for value in -64i64..64 {
            let (_, used) = encode(value);
            assert_eq!(used, 1, "{} should fit one byte", value);
        }
        assert_eq!(encode(64).1, 2);
        assert_eq!(encode(-65).1, 2);
    }

    #[test]
    fn null_string_sentinel() {
        // nullable string lengths write -1; it must cost a single byte
        let (container, used) = encode(-1);
        assert_eq!(used, 1);
        assert_eq!(container[0], 1);
    }
}
