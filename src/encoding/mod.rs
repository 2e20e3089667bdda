//! Value encoders and decoders behind stable tag bytes.

pub mod bitpacked;
mod dictionary;
mod gorilla;
mod plain;
mod rle;
mod ts2diff;
pub mod uleb128;
mod zigzag;
pub mod zigzag_leb128;

pub use dictionary::{DictionaryDecoder, DictionaryEncoder};
pub use gorilla::{GorillaDecoder, GorillaEncoder, GorillaF32Decoder, GorillaF32Encoder};
pub use plain::{
    PlainBinaryDecoder, PlainBinaryEncoder, PlainBooleanDecoder, PlainBooleanEncoder,
    PlainDecoder, PlainEncoder,
};
pub use rle::{
    BooleanRleDecoder, BooleanRleEncoder, IntRleDecoder, IntRleEncoder, LongRleDecoder,
    LongRleEncoder,
};
pub use ts2diff::{Ts2DiffDecoder, Ts2DiffEncoder, Ts2DiffI32Decoder, Ts2DiffI32Encoder};
pub use zigzag::{IntZigzagDecoder, IntZigzagEncoder, LongZigzagDecoder, LongZigzagEncoder};

use crate::data::Value;
use crate::error::{Result, TsFileError};
use crate::schema::TsDataType;

/// The encoding of a value stream. The discriminant is the stable on-disk
/// tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain = 0,
    Dictionary = 1,
    Rle = 2,
    Diff = 3,
    Ts2Diff = 4,
    Bitmap = 5,
    GorillaV1 = 6,
    Regular = 7,
    Gorilla = 8,
    Zigzag = 9,
    Freq = 10,
}

impl Encoding {
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Encoding {
    type Error = TsFileError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Encoding::Plain,
            1 => Encoding::Dictionary,
            2 => Encoding::Rle,
            3 => Encoding::Diff,
            4 => Encoding::Ts2Diff,
            5 => Encoding::Bitmap,
            6 => Encoding::GorillaV1,
            7 => Encoding::Regular,
            8 => Encoding::Gorilla,
            9 => Encoding::Zigzag,
            10 => Encoding::Freq,
            other => return Err(corrupted_err!("unknown encoding tag {}", other)),
        })
    }
}

/// Returns the ceil of value/8
#[inline]
pub fn ceil8(value: usize) -> usize {
    value / 8 + ((value % 8 != 0) as usize)
}

/// Buffers values of one stream and seals them into their encoded form.
pub trait Encoder<T> {
    /// Appends one value to the stream.
    fn encode(&mut self, value: T);

    /// A conservative upper bound of the sealed size of the current buffer.
    fn size(&self) -> usize;

    /// The number of buffered values.
    fn count(&self) -> usize;

    /// Seals the buffered values into `buffer` and resets the encoder.
    fn flush(&mut self, buffer: &mut Vec<u8>) -> Result<()>;
}

/// Replays the values of one encoded stream.
pub trait Decoder<T> {
    fn has_next(&self) -> bool;

    /// The next value, or [`TsFileError::NoMoreData`] once exhausted.
    fn next(&mut self) -> Result<T>;
}

fn unsupported(encoding: Encoding, data_type: TsDataType) -> TsFileError {
    TsFileError::NotSupported(format!(
        "encoding {:?} is not supported for data type {:?}",
        encoding, data_type
    ))
}

/// A value encoder dispatched on the one-byte data-type tag.
pub enum ValueEncoder {
    Boolean(Box<dyn Encoder<bool>>),
    Int32(Box<dyn Encoder<i32>>),
    Int64(Box<dyn Encoder<i64>>),
    Float(Box<dyn Encoder<f32>>),
    Double(Box<dyn Encoder<f64>>),
    Binary(Box<dyn Encoder<Vec<u8>>>),
}

impl ValueEncoder {
    /// Appends `value`, which must match the declared data type.
    pub fn encode(&mut self, value: &Value) -> Result<()> {
        match (self, value) {
            (ValueEncoder::Boolean(e), Value::Boolean(v)) => e.encode(*v),
            (ValueEncoder::Int32(e), Value::Int32(v)) => e.encode(*v),
            (ValueEncoder::Int32(e), Value::Date(v)) => e.encode(*v),
            (ValueEncoder::Int64(e), Value::Int64(v)) => e.encode(*v),
            (ValueEncoder::Int64(e), Value::Timestamp(v)) => e.encode(*v),
            (ValueEncoder::Float(e), Value::Float(v)) => e.encode(*v),
            (ValueEncoder::Double(e), Value::Double(v)) => e.encode(*v),
            (ValueEncoder::Binary(e), Value::Text(v)) => e.encode(v.clone()),
            (ValueEncoder::Binary(e), Value::Blob(v)) => e.encode(v.clone()),
            (ValueEncoder::Binary(e), Value::String(v)) => e.encode(v.clone().into_bytes()),
            (_, value) => {
                return Err(TsFileError::InvalidDataPoint(format!(
                    "value of type {:?} does not match the declared data type",
                    value.data_type()
                )))
            }
        }
        Ok(())
    }

    pub fn size(&self) -> usize {
        match self {
            ValueEncoder::Boolean(e) => e.size(),
            ValueEncoder::Int32(e) => e.size(),
            ValueEncoder::Int64(e) => e.size(),
            ValueEncoder::Float(e) => e.size(),
            ValueEncoder::Double(e) => e.size(),
            ValueEncoder::Binary(e) => e.size(),
        }
    }

    pub fn count(&self) -> usize {
        match self {
            ValueEncoder::Boolean(e) => e.count(),
            ValueEncoder::Int32(e) => e.count(),
            ValueEncoder::Int64(e) => e.count(),
            ValueEncoder::Float(e) => e.count(),
            ValueEncoder::Double(e) => e.count(),
            ValueEncoder::Binary(e) => e.count(),
        }
    }

    pub fn flush(&mut self, buffer: &mut Vec<u8>) -> Result<()> {
        match self {
            ValueEncoder::Boolean(e) => e.flush(buffer),
            ValueEncoder::Int32(e) => e.flush(buffer),
            ValueEncoder::Int64(e) => e.flush(buffer),
            ValueEncoder::Float(e) => e.flush(buffer),
            ValueEncoder::Double(e) => e.flush(buffer),
            ValueEncoder::Binary(e) => e.flush(buffer),
        }
    }
}

/// Creates the encoder for one (encoding, data type) pair.
///
/// Tags with a reserved but undefined write-side layout (DIFF, BITMAP,
/// REGULAR, GORILLA_V1, FREQ) are rejected with `NotSupported`.
pub fn create_value_encoder(encoding: Encoding, data_type: TsDataType) -> Result<ValueEncoder> {
    use TsDataType::*;
    Ok(match (encoding, data_type) {
        (Encoding::Plain, Boolean) => ValueEncoder::Boolean(Box::new(PlainBooleanEncoder::new())),
        (Encoding::Plain, Int32 | Date) => {
            ValueEncoder::Int32(Box::new(PlainEncoder::<i32>::new()))
        }
        (Encoding::Plain, Int64 | Timestamp) => {
            ValueEncoder::Int64(Box::new(PlainEncoder::<i64>::new()))
        }
        (Encoding::Plain, Float) => ValueEncoder::Float(Box::new(PlainEncoder::<f32>::new())),
        (Encoding::Plain, Double) => ValueEncoder::Double(Box::new(PlainEncoder::<f64>::new())),
        (Encoding::Plain, Text | String | Blob) => {
            ValueEncoder::Binary(Box::new(PlainBinaryEncoder::new()))
        }
        (Encoding::Rle, Boolean) => ValueEncoder::Boolean(Box::new(BooleanRleEncoder::new())),
        (Encoding::Rle, Int32 | Date) => ValueEncoder::Int32(Box::new(IntRleEncoder::new())),
        (Encoding::Rle, Int64 | Timestamp) => ValueEncoder::Int64(Box::new(LongRleEncoder::new())),
        (Encoding::Ts2Diff, Int32 | Date) => {
            ValueEncoder::Int32(Box::new(Ts2DiffI32Encoder::new()))
        }
        (Encoding::Ts2Diff, Int64 | Timestamp) => {
            ValueEncoder::Int64(Box::new(Ts2DiffEncoder::new()))
        }
        (Encoding::Gorilla, Float) => ValueEncoder::Float(Box::new(GorillaF32Encoder::new())),
        (Encoding::Gorilla, Double) => ValueEncoder::Double(Box::new(GorillaEncoder::new())),
        (Encoding::Zigzag, Int32 | Date) => ValueEncoder::Int32(Box::new(IntZigzagEncoder::new())),
        (Encoding::Zigzag, Int64 | Timestamp) => {
            ValueEncoder::Int64(Box::new(LongZigzagEncoder::new()))
        }
        (Encoding::Dictionary, Text | String | Blob) => {
            ValueEncoder::Binary(Box::new(DictionaryEncoder::new()))
        }
        (encoding, data_type) => return Err(unsupported(encoding, data_type)),
    })
}

/// A value decoder dispatched on the one-byte data-type tag.
pub enum ValueDecoder {
    Boolean(Box<dyn Decoder<bool>>),
    Int32(Box<dyn Decoder<i32>>),
    Int64(Box<dyn Decoder<i64>>),
    Float(Box<dyn Decoder<f32>>),
    Double(Box<dyn Decoder<f64>>),
    Binary(Box<dyn Decoder<Vec<u8>>>),
}

impl ValueDecoder {
    pub fn has_next(&self) -> bool {
        match self {
            ValueDecoder::Boolean(d) => d.has_next(),
            ValueDecoder::Int32(d) => d.has_next(),
            ValueDecoder::Int64(d) => d.has_next(),
            ValueDecoder::Float(d) => d.has_next(),
            ValueDecoder::Double(d) => d.has_next(),
            ValueDecoder::Binary(d) => d.has_next(),
        }
    }

    /// The next value, rebuilt as the runtime flavor of `data_type`.
    pub fn next(&mut self, data_type: TsDataType) -> Result<Value> {
        Ok(match self {
            ValueDecoder::Boolean(d) => Value::Boolean(d.next()?),
            ValueDecoder::Int32(d) => match data_type {
                TsDataType::Date => Value::Date(d.next()?),
                _ => Value::Int32(d.next()?),
            },
            ValueDecoder::Int64(d) => match data_type {
                TsDataType::Timestamp => Value::Timestamp(d.next()?),
                _ => Value::Int64(d.next()?),
            },
            ValueDecoder::Float(d) => Value::Float(d.next()?),
            ValueDecoder::Double(d) => Value::Double(d.next()?),
            ValueDecoder::Binary(d) => {
                let bytes = d.next()?;
                match data_type {
                    TsDataType::String => Value::String(
                        String::from_utf8(bytes)
                            .map_err(|e| corrupted_err!("invalid utf-8 string value: {}", e))?,
                    ),
                    TsDataType::Blob => Value::Blob(bytes),
                    _ => Value::Text(bytes),
                }
            }
        })
    }
}

/// Creates the decoder for one (encoding, data type) pair over `data`.
pub fn create_value_decoder(
    encoding: Encoding,
    data_type: TsDataType,
    data: &[u8],
) -> Result<ValueDecoder> {
    use TsDataType::*;
    Ok(match (encoding, data_type) {
        (Encoding::Plain, Boolean) => {
            ValueDecoder::Boolean(Box::new(PlainBooleanDecoder::new(data)))
        }
        (Encoding::Plain, Int32 | Date) => {
            ValueDecoder::Int32(Box::new(PlainDecoder::<i32>::new(data)))
        }
        (Encoding::Plain, Int64 | Timestamp) => {
            ValueDecoder::Int64(Box::new(PlainDecoder::<i64>::new(data)))
        }
        (Encoding::Plain, Float) => ValueDecoder::Float(Box::new(PlainDecoder::<f32>::new(data))),
        (Encoding::Plain, Double) => {
            ValueDecoder::Double(Box::new(PlainDecoder::<f64>::new(data)))
        }
        (Encoding::Plain, Text | String | Blob) => {
            ValueDecoder::Binary(Box::new(PlainBinaryDecoder::new(data)))
        }
        (Encoding::Rle, Boolean) => {
            ValueDecoder::Boolean(Box::new(BooleanRleDecoder::new(data)?))
        }
        (Encoding::Rle, Int32 | Date) => ValueDecoder::Int32(Box::new(IntRleDecoder::new(data)?)),
        (Encoding::Rle, Int64 | Timestamp) => {
            ValueDecoder::Int64(Box::new(LongRleDecoder::new(data)?))
        }
        (Encoding::Ts2Diff, Int32 | Date) => {
            ValueDecoder::Int32(Box::new(Ts2DiffI32Decoder::new(data)?))
        }
        (Encoding::Ts2Diff, Int64 | Timestamp) => {
            ValueDecoder::Int64(Box::new(Ts2DiffDecoder::new(data)?))
        }
        (Encoding::Gorilla, Float) => {
            ValueDecoder::Float(Box::new(GorillaF32Decoder::new(data)?))
        }
        (Encoding::Gorilla, Double) => ValueDecoder::Double(Box::new(GorillaDecoder::new(data)?)),
        (Encoding::Zigzag, Int32 | Date) => {
            ValueDecoder::Int32(Box::new(IntZigzagDecoder::new(data)?))
        }
        (Encoding::Zigzag, Int64 | Timestamp) => {
            ValueDecoder::Int64(Box::new(LongZigzagDecoder::new(data)?))
        }
        (Encoding::Dictionary, Text | String | Blob) => {
            ValueDecoder::Binary(Box::new(DictionaryDecoder::new(data)?))
        }
        (encoding, data_type) => return Err(unsupported(encoding, data_type)),
    })
}

/// Creates the timestamp encoder of a page or time chunk.
pub fn create_time_encoder(encoding: Encoding) -> Result<Box<dyn Encoder<i64>>> {
    Ok(match encoding {
        Encoding::Ts2Diff => Box::new(Ts2DiffEncoder::new()),
        Encoding::Plain => Box::new(PlainEncoder::<i64>::new()),
        Encoding::Rle => Box::new(LongRleEncoder::new()),
        Encoding::Zigzag => Box::new(LongZigzagEncoder::new()),
        encoding => return Err(unsupported(encoding, TsDataType::Timestamp)),
    })
}

/// Creates the timestamp decoder of a page or time chunk.
pub fn create_time_decoder(encoding: Encoding, data: &[u8]) -> Result<Box<dyn Decoder<i64>>> {
    Ok(match encoding {
        Encoding::Ts2Diff => Box::new(Ts2DiffDecoder::new(data)?),
        Encoding::Plain => Box::new(PlainDecoder::<i64>::new(data)),
        Encoding::Rle => Box::new(LongRleDecoder::new(data)?),
        Encoding::Zigzag => Box::new(LongZigzagDecoder::new(data)?),
        encoding => return Err(unsupported(encoding, TsDataType::Timestamp)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_tags_are_rejected() {
        for encoding in [
            Encoding::Diff,
            Encoding::Bitmap,
            Encoding::Regular,
            Encoding::GorillaV1,
            Encoding::Freq,
        ] {
            assert!(matches!(
                create_value_encoder(encoding, TsDataType::Int64),
                Err(TsFileError::NotSupported(_))
            ));
            assert!(matches!(
                create_value_decoder(encoding, TsDataType::Int64, &[]),
                Err(TsFileError::NotSupported(_))
            ));
        }
    }

    #[test]
    fn tags_are_stable() {
        for tag in 0u8..=10 {
            assert_eq!(Encoding::try_from(tag).unwrap().to_u8(), tag);
        }
        assert!(Encoding::try_from(11).is_err());
    }

    #[test]
    fn mismatched_value_is_an_invalid_data_point() {
        let mut encoder = create_value_encoder(Encoding::Plain, TsDataType::Int32).unwrap();
        let result = encoder.encode(&Value::Double(1.0));
        assert!(matches!(result, Err(TsFileError::InvalidDataPoint(_))));
    }
}
