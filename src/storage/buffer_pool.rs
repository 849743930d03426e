use super::error::{StorageError, StorageResult};
use super::heap_file::DbFile;
use super::heap_page::{HeapPage, HeapPageId};
use super::tuple::Tuple;
use super::{TableId, BUFFER_POOL_DEFAULT_PAGES};
use crate::catalog::Catalog;
use crate::engine::Engine;
use crate::transaction::{Permissions, TransactionId};
use log::trace;
use lru::LruCache;
use std::sync::{Arc, Mutex, RwLock};

/// Shared handle to a cached page. The pool keeps one handle per resident
/// page; cursors and mutation paths hold clones while they work.
pub type PageHandle = Arc<RwLock<HeapPage>>;

/// Bounded cache of pages, the sole portal through which the rest of the
/// engine touches disk.
///
/// Eviction is strict LRU over `get_page` accesses: a hit and a miss both
/// promote the target to most-recently-used, while flushes leave recency
/// alone. Dirty victims are written back through their owning file before
/// they leave the cache (STEAL policy).
pub struct BufferPool {
    pages: Mutex<LruCache<HeapPageId, PageHandle>>,
    capacity: usize,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_capacity(BUFFER_POOL_DEFAULT_PAGES)
    }

    /// A pool holding at most `capacity` pages.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer pool capacity must be positive");
        Self {
            // Unbounded: capacity is enforced by the explicit evict loop so
            // a dirty victim is never dropped without a write-back.
            pages: Mutex::new(LruCache::unbounded()),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fetch a page, reading it from its file on a miss. The returned page
    /// becomes the most-recently-used entry either way.
    pub fn get_page(
        &self,
        catalog: &Catalog,
        tid: TransactionId,
        pid: HeapPageId,
        perm: Permissions,
    ) -> StorageResult<PageHandle> {
        let mut pages = self.pages.lock().unwrap();
        if let Some(handle) = pages.get(&pid) {
            return Ok(handle.clone());
        }

        while pages.len() >= self.capacity {
            Self::evict_one(catalog, &mut pages)?;
        }

        trace!("buffer pool miss: {:?} ({:?})", pid, perm);
        let file = Self::file_for(catalog, pid.table_id)?;
        let page = file.read_page(pid)?;
        let handle: PageHandle = Arc::new(RwLock::new(page));
        pages.put(pid, handle.clone());
        Ok(handle)
    }

    /// Insert a tuple into `table_id` on behalf of `tid`, then make sure
    /// every dirtied page is cached at the most-recently-used position.
    pub fn insert_tuple(
        &self,
        ctx: &Engine,
        tid: TransactionId,
        table_id: TableId,
        t: Tuple,
    ) -> StorageResult<()> {
        let file = Self::file_for(ctx.catalog(), table_id)?;
        // The file path re-enters `get_page`, so the cache lock must not be
        // held across this call.
        let dirtied = file.insert_tuple(ctx, tid, t)?;

        let mut pages = self.pages.lock().unwrap();
        for handle in dirtied {
            let pid = handle.read().unwrap().id();
            if pages.get(&pid).is_some() {
                continue;
            }
            while pages.len() >= self.capacity {
                Self::evict_one(ctx.catalog(), &mut pages)?;
            }
            pages.put(pid, handle.clone());
        }
        Ok(())
    }

    /// Delete a tuple (located through its record id) on behalf of `tid`.
    pub fn delete_tuple(&self, ctx: &Engine, tid: TransactionId, t: &Tuple) -> StorageResult<()> {
        let rid = t.record_id().ok_or(StorageError::TupleNotOnPage)?;
        let file = Self::file_for(ctx.catalog(), rid.page_id.table_id)?;
        file.delete_tuple(ctx, tid, t)?;
        Ok(())
    }

    /// Write every dirty cached page to disk without evicting anything.
    /// Dangerous under a NO-STEAL recovery regime; there is none here.
    pub fn flush_all(&self, catalog: &Catalog) -> StorageResult<()> {
        let pages = self.pages.lock().unwrap();
        for (_, handle) in pages.iter() {
            Self::flush_handle(catalog, handle)?;
        }
        Ok(())
    }

    /// Write one cached page to disk if it is dirty. Does not touch recency.
    pub fn flush_page(&self, catalog: &Catalog, pid: HeapPageId) -> StorageResult<()> {
        let pages = self.pages.lock().unwrap();
        if let Some(handle) = pages.peek(&pid) {
            Self::flush_handle(catalog, handle)?;
        }
        Ok(())
    }

    /// Drop a page from the cache without flushing it (rollback / page
    /// reuse hook). Absent pages are ignored.
    pub fn discard_page(&self, pid: HeapPageId) {
        self.pages.lock().unwrap().pop(&pid);
    }

    /// Number of pages currently cached.
    pub fn len(&self) -> usize {
        self.pages.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, pid: HeapPageId) -> bool {
        self.pages.lock().unwrap().contains(&pid)
    }

    /// Cached page ids from most- to least-recently used.
    pub fn cached_ids(&self) -> Vec<HeapPageId> {
        self.pages.lock().unwrap().iter().map(|(pid, _)| *pid).collect()
    }

    fn file_for(catalog: &Catalog, table_id: TableId) -> StorageResult<Arc<dyn DbFile>> {
        catalog
            .try_file(table_id)
            .ok_or(StorageError::UnknownTable(table_id))
    }

    fn flush_handle(catalog: &Catalog, handle: &PageHandle) -> StorageResult<()> {
        let mut page = handle.write().unwrap();
        if let Some(tid) = page.is_dirty() {
            let file = Self::file_for(catalog, page.id().table_id)?;
            file.write_page(&page)?;
            page.mark_dirty(false, tid);
        }
        Ok(())
    }

    /// Evict the least-recently-used page. A dirty victim is flushed first;
    /// if that write fails the victim stays cached and dirty.
    fn evict_one(
        catalog: &Catalog,
        pages: &mut LruCache<HeapPageId, PageHandle>,
    ) -> StorageResult<()> {
        let (pid, handle) = pages
            .peek_lru()
            .map(|(pid, handle)| (*pid, handle.clone()))
            .ok_or(StorageError::NoVictim)?;

        {
            let page = handle.read().unwrap();
            if page.is_dirty().is_some() {
                let file = Self::file_for(catalog, pid.table_id)?;
                file.write_page(&page)?;
            }
        }

        trace!("buffer pool evict: {:?}", pid);
        pages.pop(&pid);
        Ok(())
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}
