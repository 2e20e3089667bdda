//! The read pipeline: footer discovery, metadata-index descent, chunk
//! scanning and the device-ordered query engine.

mod cache;
mod chunk;
mod filter;
mod index;
mod metadata;
mod query;

pub use cache::ChunkCache;
pub use chunk::{AlignedSeriesScanIterator, ChunkHeader, SeriesScanIterator};
pub use filter::{Filter, TimeRange};
pub use index::SeriesIndexLookup;
pub use metadata::read_metadata;
pub use query::{
    DeviceRowIterator, DeviceTask, DeviceTaskIterator, IdFilter, Query, ResultOrder,
    TsBlockReader,
};

use std::io::{Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use log::trace;

use crate::config::TsFileConfig;
use crate::error::{Result, TsFileError};
use crate::io::read_exact_vec;
use crate::metadata::TsFileMeta;

/// Chunks kept by the default shared cache.
const DEFAULT_CHUNK_CACHE_CAPACITY: usize = 64;

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(0);

pub(crate) struct ReaderInner<R> {
    source: Mutex<R>,
    metadata: TsFileMeta,
    config: TsFileConfig,
    file_size: u64,
    file_id: u64,
    cache: Arc<ChunkCache>,
    closed: AtomicBool,
}

impl<R: Read + Seek> ReaderInner<R> {
    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TsFileError::InvalidState(
                "the reader is closed".to_string(),
            ));
        }
        Ok(())
    }

    /// Reads `[start, start + len)` from the source under the lock.
    pub(crate) fn read_region(&self, start: u64, len: usize) -> Result<Vec<u8>> {
        self.ensure_open()?;
        if start + len as u64 > self.file_size {
            return Err(corrupted_err!(
                "byte region [{}, {}) lies beyond the {} byte file",
                start,
                start + len as u64,
                self.file_size
            ));
        }
        let mut source = self.source.lock().expect("reader source poisoned");
        source.seek(SeekFrom::Start(start))?;
        read_exact_vec(&mut *source, len)
    }

    /// Reads one chunk (header plus data area) through the shared cache.
    pub(crate) fn read_chunk(&self, offset: u64) -> Result<Arc<(ChunkHeader, Vec<u8>)>> {
        self.ensure_open()?;
        let key = (self.file_id, offset);
        if let Some(chunk) = self.cache.get(&key) {
            trace!("chunk cache hit at offset {}", offset);
            return Ok(chunk);
        }
        let chunk = {
            let mut source = self.source.lock().expect("reader source poisoned");
            source.seek(SeekFrom::Start(offset))?;
            let header = ChunkHeader::deserialize(&mut *source)?;
            let data = read_exact_vec(&mut *source, header.data_size)?;
            Arc::new((header, data))
        };
        self.cache.put(key, chunk.clone());
        Ok(chunk)
    }

    pub(crate) fn metadata(&self) -> &TsFileMeta {
        &self.metadata
    }

    pub(crate) fn config(&self) -> &TsFileConfig {
        &self.config
    }
}

/// Reads one TsFile. A reader instance is single-threaded; separate readers
/// over separate files are independent and may share a chunk cache.
pub struct TsFileReader<R: Read + Seek> {
    inner: Arc<ReaderInner<R>>,
}

impl<R: Read + Seek> TsFileReader<R> {
    /// Opens `source`: validates both magics and loads the footer.
    pub fn open(source: R) -> Result<Self> {
        Self::open_with(source, TsFileConfig::default(), None)
    }

    /// Opens `source` with explicit tunables and an optional shared chunk
    /// cache. The config's time encoding must match the writer's.
    pub fn open_with(
        mut source: R,
        config: TsFileConfig,
        cache: Option<Arc<ChunkCache>>,
    ) -> Result<Self> {
        metadata::check_head_magic(&mut source)?;
        let (meta, file_size) = metadata::read_metadata(&mut source)?;
        let inner = ReaderInner {
            source: Mutex::new(source),
            metadata: meta,
            config,
            file_size,
            file_id: NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed),
            cache: cache
                .unwrap_or_else(|| Arc::new(ChunkCache::new(DEFAULT_CHUNK_CACHE_CAPACITY))),
            closed: AtomicBool::new(false),
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn metadata(&self) -> &TsFileMeta {
        &self.inner.metadata
    }

    pub fn file_size(&self) -> u64 {
        self.inner.file_size
    }

    /// Releases cached state; every subsequent operation, including on
    /// outstanding result sets, fails with `InvalidState`. Closing twice is
    /// a no-op.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    pub(crate) fn inner(&self) -> &Arc<ReaderInner<R>> {
        &self.inner
    }

    pub(crate) fn downgrade(&self) -> Weak<ReaderInner<R>> {
        Arc::downgrade(&self.inner)
    }
}
