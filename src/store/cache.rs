use lru::LruCache;
use std::num::NonZeroUsize;

use super::error::StoreResult;
use super::file::PagedFile;
use super::{PAGE_SIZE, PageId};

/// Entry in the page cache
struct CacheEntry {
    /// The actual page data
    data: Vec<u8>,
    /// Whether this page has been modified since load
    dirty: bool,
}

/// Write-back page cache with LRU eviction over a paged file
pub struct PageCache {
    /// Underlying paged file
    file: PagedFile,
    /// Cached pages with LRU tracking; eviction writes dirty pages back
    pool: LruCache<PageId, CacheEntry>,
}

impl PageCache {
    /// Create a cache over a paged file holding up to `capacity` pages
    pub fn new(file: PagedFile, capacity: usize) -> Self {
        Self {
            file,
            pool: LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap()),
        }
    }

    /// Get a read-only view of a page, loading it from disk if necessary
    pub fn page(&mut self, page_id: PageId) -> StoreResult<&[u8]> {
        if self.pool.peek(&page_id).is_none() {
            self.load(page_id)?;
        }
        Ok(&self.pool.get(&page_id).unwrap().data)
    }

    /// Get a mutable view of a page, marking it dirty
    pub fn page_mut(&mut self, page_id: PageId) -> StoreResult<&mut [u8]> {
        if self.pool.peek(&page_id).is_none() {
            self.load(page_id)?;
        }
        let entry = self.pool.get_mut(&page_id).unwrap();
        entry.dirty = true;
        Ok(&mut entry.data)
    }

    /// Load a page from disk, evicting the least-recently-used entry
    /// (with write-back) when the pool is at capacity
    fn load(&mut self, page_id: PageId) -> StoreResult<()> {
        if self.pool.len() == self.pool.cap().get() {
            if let Some((evicted_id, entry)) = self.pool.pop_lru() {
                if entry.dirty {
                    self.file.write_page(evicted_id, &entry.data)?;
                }
            }
        }

        let mut data = vec![0u8; PAGE_SIZE];
        self.file.read_page(page_id, &mut data)?;
        self.pool.put(page_id, CacheEntry { data, dirty: false });
        Ok(())
    }

    /// Write all dirty pages back and sync the file
    pub fn flush(&mut self) -> StoreResult<()> {
        for (&page_id, entry) in self.pool.iter_mut() {
            if entry.dirty {
                self.file.write_page(page_id, &entry.data)?;
                entry.dirty = false;
            }
        }
        self.file.sync()
    }

    /// Number of pages in the backing file
    pub fn file_page_count(&self) -> StoreResult<usize> {
        self.file.page_count()
    }

    /// Get the backing file path
    pub fn path(&self) -> &std::path::Path {
        self.file.path()
    }
}
