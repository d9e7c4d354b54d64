//! LRU cache of decoded source chunks (strips or tiles).

use lru::LruCache;
use std::num::NonZeroUsize;

/// Decoded samples of one strip or tile, row-major.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Valid columns in `samples` (edge chunks may be narrower)
    pub width: usize,
    pub height: usize,
    pub samples: Vec<f64>,
}

/// LRU cache keyed by chunk index.
pub struct ChunkCache {
    inner: LruCache<usize, Chunk>,
}

impl ChunkCache {
    /// Create a new cache with the given capacity (number of chunks).
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(cap),
        }
    }

    /// Size the cache to hold about `budget_bytes` of chunks of
    /// `chunk_samples` samples each.
    pub fn with_budget(budget_bytes: usize, chunk_samples: usize) -> Self {
        let chunk_bytes = chunk_samples.max(1) * std::mem::size_of::<f64>();
        Self::new(budget_bytes / chunk_bytes)
    }

    pub fn get(&mut self, index: usize) -> Option<&Chunk> {
        self.inner.get(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.inner.contains(&index)
    }

    pub fn insert(&mut self, index: usize, chunk: Chunk) {
        self.inner.put(index, chunk);
    }

    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }
}
