//! LSB-first bit packing of `u64` values into byte buffers.

use crate::error::{Result, TsFileError};

/// The number of bits required to represent `max`.
#[inline]
pub fn num_bits(max: u64) -> u8 {
    (64 - max.leading_zeros()) as u8
}

/// Packs every value into `width` bits, LSB first, appending to `buffer`.
/// Values wider than `width` bits are truncated to their low `width` bits.
pub fn encode(values: &[u64], width: u8, buffer: &mut Vec<u8>) {
    if width == 0 {
        return;
    }
    let mask = if width == 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    };

    let mut acc: u128 = 0;
    let mut acc_bits: u32 = 0;
    for value in values {
        acc |= ((value & mask) as u128) << acc_bits;
        acc_bits += width as u32;
        while acc_bits >= 8 {
            buffer.push((acc & 0xff) as u8);
            acc >>= 8;
            acc_bits -= 8;
        }
    }
    if acc_bits > 0 {
        buffer.push((acc & 0xff) as u8);
    }
}

/// Unpacks `length` values of `width` bits each from `compressed`.
pub fn decode(compressed: &[u8], width: u8, length: usize) -> Result<Vec<u64>> {
    if width == 0 {
        return Ok(vec![0; length]);
    }
    let required = super::ceil8(length * width as usize);
    if compressed.len() < required {
        return Err(corrupted_err!(
            "bit-packed buffer of {} bytes cannot hold {} values of {} bits",
            compressed.len(),
            length,
            width
        ));
    }
    let mask = if width == 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    };

    let mut values = Vec::with_capacity(length);
    let mut acc: u128 = 0;
    let mut acc_bits: u32 = 0;
    let mut bytes = compressed.iter();
    for _ in 0..length {
        while acc_bits < width as u32 {
            acc |= (*bytes.next().unwrap() as u128) << acc_bits;
            acc_bits += 8;
        }
        values.push((acc as u64) & mask);
        acc >>= width as u32;
        acc_bits -= width as u32;
    }
    Ok(values)
}

/// The number of bytes `length` values of `width` bits occupy when packed.
#[inline]
pub fn packed_len(length: usize, width: u8) -> usize {
    super::ceil8(length * width as usize)
}
