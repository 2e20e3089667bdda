//! Block compressors applied to sealed page bodies, behind stable tag bytes.

use crate::error::{Result, TsFileError};

/// The compression of a chunk's pages. The discriminant is the stable
/// on-disk tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Uncompressed = 0,
    Snappy = 1,
    Gzip = 2,
    Lzo = 3,
    Sdt = 4,
    Paa = 5,
    Pla = 6,
    Lz4 = 7,
    Zstd = 8,
}

impl Compression {
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Compression {
    type Error = TsFileError;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0 => Compression::Uncompressed,
            1 => Compression::Snappy,
            2 => Compression::Gzip,
            3 => Compression::Lzo,
            4 => Compression::Sdt,
            5 => Compression::Paa,
            6 => Compression::Pla,
            7 => Compression::Lz4,
            8 => Compression::Zstd,
            other => return Err(corrupted_err!("unknown compression tag {}", other)),
        })
    }
}

/// TsFile block compression codec interface.
pub trait Codec: std::fmt::Debug {
    /// Compresses data stored in slice `input_buf` and writes the compressed
    /// result to `output_buf`.
    /// Note that you'll need to call `clear()` before reusing the same
    /// `output_buf` across different `compress` calls.
    fn compress(&mut self, input_buf: &[u8], output_buf: &mut Vec<u8>) -> Result<()>;

    /// Decompresses data stored in slice `input_buf` and writes output to
    /// `output_buf`, which is sized to the recorded uncompressed length.
    fn decompress(&mut self, input_buf: &[u8], output_buf: &mut [u8]) -> Result<()>;
}

/// Given the compression type `codec`, returns a codec used to compress and
/// decompress bytes for the compression type.
/// This returns `None` if the codec type is `UNCOMPRESSED`.
pub fn create_codec(codec: &Compression) -> Result<Option<Box<dyn Codec>>> {
    match *codec {
        #[cfg(feature = "snappy")]
        Compression::Snappy => Ok(Some(Box::new(SnappyCodec::new()))),
        #[cfg(feature = "gzip")]
        Compression::Gzip => Ok(Some(Box::new(GZipCodec::new()))),
        #[cfg(feature = "lz4")]
        Compression::Lz4 => Ok(Some(Box::new(Lz4Codec::new()))),
        #[cfg(feature = "zstd")]
        Compression::Zstd => Ok(Some(Box::new(ZstdCodec::new()))),
        Compression::Uncompressed => Ok(None),
        Compression::Lzo | Compression::Sdt | Compression::Paa | Compression::Pla => Err(
            TsFileError::NotSupported(format!("compression {:?} has a reserved tag only", codec)),
        ),
        #[allow(unreachable_patterns)]
        _ => Err(TsFileError::NotSupported(format!(
            "compression {:?} is not installed",
            codec
        ))),
    }
}

/// Compresses `input` with `compression`, returning a fresh buffer.
pub fn compress(compression: Compression, input: &[u8]) -> Result<Vec<u8>> {
    match create_codec(&compression)? {
        Some(mut codec) => {
            let mut output = Vec::new();
            codec.compress(input, &mut output)?;
            Ok(output)
        }
        None => Ok(input.to_vec()),
    }
}

/// Decompresses `input` into a buffer of the recorded `uncompressed_size`.
pub fn decompress(
    compression: Compression,
    input: &[u8],
    uncompressed_size: usize,
) -> Result<Vec<u8>> {
    match create_codec(&compression)? {
        Some(mut codec) => {
            let mut output = vec![0u8; uncompressed_size];
            codec.decompress(input, &mut output)?;
            Ok(output)
        }
        None => {
            if input.len() != uncompressed_size {
                return Err(corrupted_err!(
                    "uncompressed page of {} bytes declares {} bytes",
                    input.len(),
                    uncompressed_size
                ));
            }
            Ok(input.to_vec())
        }
    }
}

#[cfg(feature = "snappy")]
mod snappy_codec {
    use snap::raw::{decompress_len, max_compress_len, Decoder, Encoder};

    use crate::compression::Codec;
    use crate::error::{Result, TsFileError};

    /// Codec for Snappy compression format.
    #[derive(Debug)]
    pub struct SnappyCodec {
        decoder: Decoder,
        encoder: Encoder,
    }

    impl SnappyCodec {
        /// Creates new Snappy compression codec.
        pub(crate) fn new() -> Self {
            Self {
                decoder: Decoder::new(),
                encoder: Encoder::new(),
            }
        }
    }

    impl Codec for SnappyCodec {
        fn decompress(&mut self, input_buf: &[u8], output_buf: &mut [u8]) -> Result<()> {
            let len = decompress_len(input_buf)?;
            if len > output_buf.len() {
                return Err(corrupted_err!(
                    "snappy block of {} bytes declares {} bytes",
                    len,
                    output_buf.len()
                ));
            }
            self.decoder
                .decompress(input_buf, output_buf)
                .map_err(|e| e.into())
                .map(|_| ())
        }

        fn compress(&mut self, input_buf: &[u8], output_buf: &mut Vec<u8>) -> Result<()> {
            let output_buf_len = output_buf.len();
            let required_len = max_compress_len(input_buf.len());
            output_buf.resize(output_buf_len + required_len, 0);
            let n = self
                .encoder
                .compress(input_buf, &mut output_buf[output_buf_len..])?;
            output_buf.truncate(output_buf_len + n);
            Ok(())
        }
    }
}
#[cfg(feature = "snappy")]
pub use snappy_codec::*;

#[cfg(feature = "gzip")]
mod gzip_codec {

    use std::io::{Read, Write};

    use flate2::{read, write, Compression};

    use crate::compression::Codec;
    use crate::error::Result;
    use crate::io::write_err;

    /// Codec for GZIP compression algorithm.
    #[derive(Debug)]
    pub struct GZipCodec {}

    impl GZipCodec {
        /// Creates new GZIP compression codec.
        pub(crate) fn new() -> Self {
            Self {}
        }
    }

    impl Codec for GZipCodec {
        fn decompress(&mut self, input_buf: &[u8], output_buf: &mut [u8]) -> Result<()> {
            let mut decoder = read::GzDecoder::new(input_buf);
            decoder.read_exact(output_buf).map_err(|e| e.into())
        }

        fn compress(&mut self, input_buf: &[u8], output_buf: &mut Vec<u8>) -> Result<()> {
            let mut encoder = write::GzEncoder::new(output_buf, Compression::default());
            encoder.write_all(input_buf).map_err(write_err)?;
            encoder.try_finish().map_err(write_err)
        }
    }
}
#[cfg(feature = "gzip")]
pub use gzip_codec::*;

#[cfg(feature = "lz4")]
mod lz4_codec {
    use std::io::{Read, Write};

    use crate::compression::Codec;
    use crate::error::Result;
    use crate::io::write_err;

    const LZ4_BUFFER_SIZE: usize = 4096;

    /// Codec for LZ4 compression algorithm.
    #[derive(Debug)]
    pub struct Lz4Codec {}

    impl Lz4Codec {
        /// Creates new LZ4 compression codec.
        pub(crate) fn new() -> Self {
            Self {}
        }
    }

    impl Codec for Lz4Codec {
        fn decompress(&mut self, input_buf: &[u8], output_buf: &mut [u8]) -> Result<()> {
            let mut decoder = lz4::Decoder::new(input_buf)?;
            decoder.read_exact(output_buf).map_err(|e| e.into())
        }

        fn compress(&mut self, input_buf: &[u8], output_buf: &mut Vec<u8>) -> Result<()> {
            let mut encoder = lz4::EncoderBuilder::new()
                .build(output_buf)
                .map_err(write_err)?;
            let mut from = 0;
            loop {
                let to = std::cmp::min(from + LZ4_BUFFER_SIZE, input_buf.len());
                encoder.write_all(&input_buf[from..to]).map_err(write_err)?;
                from += LZ4_BUFFER_SIZE;
                if from >= input_buf.len() {
                    break;
                }
            }
            encoder.finish().1.map_err(write_err)
        }
    }
}
#[cfg(feature = "lz4")]
pub use lz4_codec::*;

#[cfg(feature = "zstd")]
mod zstd_codec {
    use std::io::Read;
    use std::io::Write;

    use crate::compression::Codec;
    use crate::error::Result;
    use crate::io::write_err;

    /// Codec for Zstandard compression algorithm.
    #[derive(Debug)]
    pub struct ZstdCodec {}

    impl ZstdCodec {
        /// Creates new Zstandard compression codec.
        pub(crate) fn new() -> Self {
            Self {}
        }
    }

    /// Compression level (1-21) for ZSTD. Choose 1 here for better
    /// compression speed.
    const ZSTD_COMPRESSION_LEVEL: i32 = 1;

    impl Codec for ZstdCodec {
        fn decompress(&mut self, input_buf: &[u8], output_buf: &mut [u8]) -> Result<()> {
            let mut decoder = zstd::Decoder::new(input_buf)?;
            decoder.read_exact(output_buf).map_err(|e| e.into())
        }

        fn compress(&mut self, input_buf: &[u8], output_buf: &mut Vec<u8>) -> Result<()> {
            let mut encoder =
                zstd::Encoder::new(output_buf, ZSTD_COMPRESSION_LEVEL).map_err(write_err)?;
            encoder.write_all(input_buf).map_err(write_err)?;
            match encoder.finish() {
                Ok(_) => Ok(()),
                Err(e) => Err(write_err(e)),
            }
        }
    }
}
#[cfg(feature = "zstd")]
pub use zstd_codec::*;

#[cfg(test)]
mod tests {
    use super::*;

    fn test_roundtrip(c: Compression, data: &[u8]) {
        let compressed = compress(c, data).expect("Error when compressing");
        let decompressed =
            decompress(c, &compressed, data.len()).expect("Error when decompressing");
        assert_eq!(data, decompressed.as_slice());
    }

    fn test_codec(c: Compression) {
        let sizes = vec![100, 10000, 100000];
        for size in sizes {
            let data = (0..size).map(|x| (x % 255) as u8).collect::<Vec<_>>();
            test_roundtrip(c, &data);
        }
    }

    #[test]
    fn test_codec_uncompressed() {
        test_codec(Compression::Uncompressed);
    }

    #[cfg(feature = "snappy")]
    #[test]
    fn test_codec_snappy() {
        test_codec(Compression::Snappy);
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn test_codec_gzip() {
        test_codec(Compression::Gzip);
    }

    #[cfg(feature = "lz4")]
    #[test]
    fn test_codec_lz4() {
        test_codec(Compression::Lz4);
    }

    #[cfg(feature = "zstd")]
    #[test]
    fn test_codec_zstd() {
        test_codec(Compression::Zstd);
    }

    #[test]
    fn reserved_tags_are_rejected() {
        for c in [
            Compression::Lzo,
            Compression::Sdt,
            Compression::Paa,
            Compression::Pla,
        ] {
            assert!(matches!(
                create_codec(&c),
                Err(TsFileError::NotSupported(_))
            ));
        }
    }

    #[test]
    fn tags_are_stable() {
        for tag in 0u8..=8 {
            assert_eq!(Compression::try_from(tag).unwrap().to_u8(), tag);
        }
        assert!(Compression::try_from(9).is_err());
    }

    #[test]
    fn uncompressed_size_mismatch_is_corrupt() {
        let result = decompress(Compression::Uncompressed, &[1, 2, 3], 4);
        assert!(matches!(result, Err(TsFileError::Corrupted(_))));
    }
}
