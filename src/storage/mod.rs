mod buffer_pool;
mod error;
mod heap_file;
mod heap_page;
mod schema;
mod tuple;
mod value;

pub use buffer_pool::{BufferPool, PageHandle};
pub use error::{StorageError, StorageResult};
pub use heap_file::{DbFile, HeapFile, HeapFileCursor, TupleCursor};
pub use heap_page::{HeapPage, HeapPageId};
pub use schema::{TdItem, TupleDesc};
pub use tuple::{RecordId, Tuple};
pub use value::{Field, Op, Type};

use std::sync::atomic::{AtomicUsize, Ordering};

/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Fixed width of a STRING field payload in bytes. A serialized STRING field
/// additionally carries a 4-byte length prefix.
pub const STRING_LEN: usize = 128;

/// Default number of pages a buffer pool holds.
pub const BUFFER_POOL_DEFAULT_PAGES: usize = 50;

/// Stable id of the file backing a table.
pub type TableId = u64;

/// Zero-based index of a page within its file.
pub type PageNumber = u64;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

/// Bytes per on-disk page.
pub fn page_size() -> usize {
    PAGE_SIZE.load(Ordering::Relaxed)
}

/// Override the process-wide page size. Test hook only: pages written under
/// one size are unreadable under another.
pub fn set_page_size(bytes: usize) {
    PAGE_SIZE.store(bytes, Ordering::Relaxed);
}

/// Restore the default page size.
pub fn reset_page_size() {
    PAGE_SIZE.store(DEFAULT_PAGE_SIZE, Ordering::Relaxed);
}
