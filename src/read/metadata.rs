//! Footer discovery: locate, size and deserialize the file metadata from
//! the tail of the file.

use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::error::{Result, TsFileError};
use crate::metadata::TsFileMeta;
use crate::{DEFAULT_FOOTER_READ_SIZE, FOOTER_TAIL_SIZE, TSFILE_MAGIC, VERSION_NUMBER};

// see (unstable) Seek::stream_len
fn stream_len(seek: &mut impl Seek) -> std::result::Result<u64, std::io::Error> {
    let old_pos = seek.seek(SeekFrom::Current(0))?;
    let len = seek.seek(SeekFrom::End(0))?;

    if old_pos != len {
        seek.seek(SeekFrom::Start(old_pos))?;
    }

    Ok(len)
}

/// Reads a file's metadata.
// Layout of a TsFile tail:
// +--------------------+--------+-------------------+-----------+
// |   Rest of file     | footer | footerSize u32 LE | "TsFile"  |
// +--------------------+--------+-------------------+-----------+
//
// The reader first takes up to DEFAULT_FOOTER_READ_SIZE bytes from the end.
// If the footer is longer than that, a second read of exactly
// footerSize + 10 bytes follows.
pub fn read_metadata<R: Read + Seek>(reader: &mut R) -> Result<(TsFileMeta, u64)> {
    let file_size = stream_len(reader)?;
    let minimal = TSFILE_MAGIC.len() as u64 + 1 + FOOTER_TAIL_SIZE;
    if file_size < minimal {
        return Err(corrupted_err!(
            "invalid TsFile: {} bytes cannot hold the magic and footer",
            file_size
        ));
    }

    let tail_len = std::cmp::min(DEFAULT_FOOTER_READ_SIZE, file_size) as usize;
    reader.seek(SeekFrom::End(-(tail_len as i64)))?;
    let mut tail = vec![0u8; tail_len];
    reader.read_exact(&mut tail)?;

    if tail[tail_len - TSFILE_MAGIC.len()..] != TSFILE_MAGIC {
        return Err(corrupted_err!("invalid TsFile: corrupt trailing magic"));
    }

    let footer_size = u32::from_le_bytes(
        tail[tail_len - 10..tail_len - 6]
            .try_into()
            .expect("four bytes"),
    ) as u64;

    let footer_with_tail = footer_size + FOOTER_TAIL_SIZE;
    if footer_with_tail + TSFILE_MAGIC.len() as u64 + 1 > file_size {
        return Err(corrupted_err!(
            "invalid TsFile: footer of {} bytes does not fit a {} byte file",
            footer_size,
            file_size
        ));
    }

    let footer = if footer_with_tail <= tail_len as u64 {
        // the whole footer is inside the bytes already read
        tail[tail_len - footer_with_tail as usize..tail_len - FOOTER_TAIL_SIZE as usize].to_vec()
    } else {
        // the tail read was too short: one more read of exactly
        // footerSize + 10 bytes
        reader.seek(SeekFrom::Start(file_size - footer_with_tail))?;
        let mut buffer = vec![0u8; footer_with_tail as usize];
        reader.read_exact(&mut buffer)?;
        buffer.truncate(footer_size as usize);
        buffer
    };

    let mut cursor = Cursor::new(footer);
    let meta = TsFileMeta::deserialize(&mut cursor)?;
    if cursor.position() != cursor.get_ref().len() as u64 {
        return Err(corrupted_err!(
            "invalid TsFile: {} trailing bytes after the footer",
            cursor.get_ref().len() as u64 - cursor.position()
        ));
    }
    Ok((meta, file_size))
}

/// Validates the leading magic and version byte.
pub fn check_head_magic<R: Read + Seek>(reader: &mut R) -> Result<()> {
    reader.seek(SeekFrom::Start(0))?;
    let mut head = [0u8; 7];
    reader.read_exact(&mut head)?;
    if head[..6] != TSFILE_MAGIC {
        return Err(corrupted_err!("invalid TsFile: corrupt leading magic"));
    }
    if head[6] != VERSION_NUMBER {
        return Err(corrupted_err!(
            "unsupported TsFile version {:#04x}",
            head[6]
        ));
    }
    Ok(())
}
