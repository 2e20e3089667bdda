#![forbid(unsafe_code)]
//! Unofficial implementation of TsFile IO in Rust.

#[macro_use]
pub mod error;
pub mod bloom_filter;
pub mod compression;
pub mod config;
pub mod data;
pub mod encoding;
pub mod io;
pub mod metadata;
pub mod read;
pub mod schema;
pub mod statistics;
pub mod types;
pub mod write;

/// The magic bytes at both ends of every TsFile.
pub const TSFILE_MAGIC: [u8; 6] = [b'T', b's', b'F', b'i', b'l', b'e'];

/// The file format version written after the leading magic.
pub const VERSION_NUMBER: u8 = 0x04;

/// Marker preceding a chunk group header.
pub const CHUNK_GROUP_HEADER_MARKER: u8 = 0x00;
/// Marker preceding a chunk with more than one page.
pub const CHUNK_HEADER_MARKER: u8 = 0x01;
/// Marker preceding a chunk with exactly one page.
pub const ONLY_ONE_PAGE_CHUNK_HEADER_MARKER: u8 = 0x05;
/// Separator between the data section and the metadata section.
pub const SEPARATOR_MARKER: u8 = 0x02;
/// Reserved marker for operation index ranges.
pub const OPERATION_INDEX_RANGE_MARKER: u8 = 0x04;

/// Size of the fixed tail: footer-size (u32 LE) plus the trailing magic.
pub(crate) const FOOTER_TAIL_SIZE: u64 = 4 + TSFILE_MAGIC.len() as u64;

/// The number of bytes read at the end of the file on first read.
pub(crate) const DEFAULT_FOOTER_READ_SIZE: u64 = 1024;
