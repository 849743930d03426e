use crate::catalog::Catalog;
use crate::optimizer::StatsMap;
use crate::storage::{BufferPool, PageHandle, StorageResult, BUFFER_POOL_DEFAULT_PAGES};
use crate::storage::HeapPageId;
use crate::transaction::{Permissions, TransactionId};
use std::sync::Arc;

/// Process-level context bundling the catalog, the buffer pool and the table
/// statistics registry. Operators and file mutation paths receive it
/// explicitly; there is no global state.
pub struct Engine {
    catalog: Catalog,
    buffer_pool: BufferPool,
    stats: StatsMap,
}

impl Engine {
    pub fn new() -> Arc<Engine> {
        Self::with_pool_capacity(BUFFER_POOL_DEFAULT_PAGES)
    }

    /// An engine whose buffer pool holds at most `pages` pages.
    pub fn with_pool_capacity(pages: usize) -> Arc<Engine> {
        Arc::new(Engine {
            catalog: Catalog::new(),
            buffer_pool: BufferPool::with_capacity(pages),
            stats: StatsMap::new(),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &BufferPool {
        &self.buffer_pool
    }

    pub fn stats(&self) -> &StatsMap {
        &self.stats
    }

    /// Shorthand for `buffer_pool().get_page` with this engine's catalog.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: HeapPageId,
        perm: Permissions,
    ) -> StorageResult<PageHandle> {
        self.buffer_pool.get_page(&self.catalog, tid, pid, perm)
    }
}
