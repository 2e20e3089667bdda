//! A small LRU over decoded chunk bytes, shareable across readers. All
//! access happens under one mutex; callers clone the `Arc` out before
//! releasing it.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use super::chunk::ChunkHeader;

/// Cached chunks are keyed by the owning file and the chunk's header
/// offset.
pub(crate) type ChunkKey = (u64, u64);

/// The shared chunk cache; hand one `Arc` of it to several readers to share
/// decoded chunks across them.
pub struct ChunkCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

struct CacheInner {
    map: HashMap<ChunkKey, Arc<(ChunkHeader, Vec<u8>)>>,
    order: VecDeque<ChunkKey>,
}

impl ChunkCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub(crate) fn get(&self, key: &ChunkKey) -> Option<Arc<(ChunkHeader, Vec<u8>)>> {
        let mut inner = self.inner.lock().expect("chunk cache poisoned");
        let value = inner.map.get(key).cloned()?;
        inner.order.retain(|k| k != key);
        inner.order.push_back(*key);
        Some(value)
    }

    pub(crate) fn put(&self, key: ChunkKey, value: Arc<(ChunkHeader, Vec<u8>)>) {
        let mut inner = self.inner.lock().expect("chunk cache poisoned");
        if inner.map.insert(key, value).is_none() {
            inner.order.push_back(key);
        }
        while inner.map.len() > self.capacity {
            // eviction frees the entry synchronously unless a reader still
            // holds a clone
            if let Some(evicted) = inner.order.pop_front() {
                inner.map.remove(&evicted);
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::Compression;
    use crate::encoding::Encoding;
    use crate::schema::TsDataType;

    fn header() -> ChunkHeader {
        ChunkHeader {
            marker: crate::ONLY_ONE_PAGE_CHUNK_HEADER_MARKER,
            measurement: "s1".to_string(),
            data_size: 0,
            data_type: TsDataType::Int32,
            compression: Compression::Uncompressed,
            encoding: Encoding::Plain,
        }
    }

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let cache = ChunkCache::new(2);
        cache.put((1, 0), Arc::new((header(), vec![0])));
        cache.put((1, 1), Arc::new((header(), vec![1])));
        // touch (1, 0) so (1, 1) becomes the eviction candidate
        assert!(cache.get(&(1, 0)).is_some());
        cache.put((1, 2), Arc::new((header(), vec![2])));
        assert!(cache.get(&(1, 1)).is_none());
        assert!(cache.get(&(1, 0)).is_some());
        assert!(cache.get(&(1, 2)).is_some());
    }
}
