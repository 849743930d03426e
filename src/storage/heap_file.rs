use super::buffer_pool::PageHandle;
use super::error::{StorageError, StorageResult};
use super::heap_page::{HeapPage, HeapPageId};
use super::schema::TupleDesc;
use super::tuple::Tuple;
use super::{page_size, PageNumber, TableId};
use crate::engine::Engine;
use crate::transaction::{Permissions, TransactionId};
use log::{debug, trace};
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// A table's backing store: page-granular I/O plus tuple-level mutation and
/// scanning. The buffer pool and the operators only see this trait, never a
/// concrete file type.
pub trait DbFile: Send + Sync {
    /// Stable id of this file, used as the table id in page ids.
    fn id(&self) -> TableId;

    /// Schema of every tuple stored in this file.
    fn tuple_desc(&self) -> &Arc<TupleDesc>;

    /// Positioned read of exactly one page.
    fn read_page(&self, pid: HeapPageId) -> StorageResult<HeapPage>;

    /// Positioned write of exactly one page, extending the file if needed.
    fn write_page(&self, page: &HeapPage) -> StorageResult<()>;

    /// Number of whole pages currently in the file.
    fn num_pages(&self) -> StorageResult<PageNumber>;

    /// Insert `t` into the first page with room, appending a fresh page when
    /// every existing one is full. Pages are fetched through the buffer pool
    /// with write intent; the dirtied pages are returned.
    fn insert_tuple(
        &self,
        ctx: &Engine,
        tid: TransactionId,
        t: Tuple,
    ) -> StorageResult<Vec<PageHandle>>;

    /// Delete `t` from the page named by its record id, returning the
    /// dirtied page.
    fn delete_tuple(&self, ctx: &Engine, tid: TransactionId, t: &Tuple)
        -> StorageResult<PageHandle>;

    /// Cursor over every live tuple of the file, in page then slot order.
    fn scan(self: Arc<Self>, ctx: Arc<Engine>, tid: TransactionId) -> Box<dyn TupleCursor + Send>;
}

/// Pull cursor over the tuples of a file. `next` on a closed or exhausted
/// cursor yields `None`; `rewind` is close-then-open.
pub trait TupleCursor {
    fn open(&mut self) -> StorageResult<()>;
    fn next(&mut self) -> StorageResult<Option<Tuple>>;
    fn rewind(&mut self) -> StorageResult<()>;
    fn close(&mut self);
}

/// A heap file: an unordered collection of tuples stored across fixed-size
/// pages. The file is nothing but a concatenation of pages; all structure
/// lives inside each page's slot bitmap.
pub struct HeapFile {
    file: Mutex<File>,
    path: PathBuf,
    id: TableId,
    desc: Arc<TupleDesc>,
}

impl HeapFile {
    /// Create a new, empty heap file at `path`.
    pub fn create<P: AsRef<Path>>(path: P, desc: Arc<TupleDesc>) -> StorageResult<HeapFile> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;
        Self::from_parts(file, path.as_ref(), desc)
    }

    /// Open an existing heap file.
    pub fn open<P: AsRef<Path>>(path: P, desc: Arc<TupleDesc>) -> StorageResult<HeapFile> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        Self::from_parts(file, path.as_ref(), desc)
    }

    fn from_parts(file: File, path: &Path, desc: Arc<TupleDesc>) -> StorageResult<HeapFile> {
        let canonical = path.canonicalize()?;
        let mut hasher = DefaultHasher::new();
        canonical.hash(&mut hasher);
        Ok(HeapFile {
            file: Mutex::new(file),
            path: canonical,
            id: hasher.finish(),
            desc,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DbFile for HeapFile {
    fn id(&self) -> TableId {
        self.id
    }

    fn tuple_desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    fn read_page(&self, pid: HeapPageId) -> StorageResult<HeapPage> {
        let page_size = page_size();
        let offset = pid.page_no * page_size as u64;

        let mut file = self.file.lock().unwrap();
        let len = file.metadata()?.len();
        if offset >= len {
            return Err(StorageError::ReadPastEnd {
                page_no: pid.page_no,
                offset,
            });
        }

        let mut buf = vec![0u8; page_size];
        file.seek(SeekFrom::Start(offset))?;
        let mut filled = 0;
        while filled < page_size {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                return Err(StorageError::ShortRead {
                    expected: page_size,
                    actual: filled,
                });
            }
            filled += n;
        }
        drop(file);

        debug!("heap file {}: read page {}", self.id, pid.page_no);
        HeapPage::parse(pid, &buf, self.desc.clone())
    }

    fn write_page(&self, page: &HeapPage) -> StorageResult<()> {
        let data = page.serialize();
        let offset = page.id().page_no * page_size() as u64;

        let mut file = self.file.lock().unwrap();
        let required = offset + data.len() as u64;
        if file.metadata()?.len() < required {
            file.set_len(required)?;
        }
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&data)?;

        debug!("heap file {}: wrote page {}", self.id, page.id().page_no);
        Ok(())
    }

    fn num_pages(&self) -> StorageResult<PageNumber> {
        let len = self.file.lock().unwrap().metadata()?.len();
        Ok(len / page_size() as u64)
    }

    fn insert_tuple(
        &self,
        ctx: &Engine,
        tid: TransactionId,
        t: Tuple,
    ) -> StorageResult<Vec<PageHandle>> {
        // Walk existing pages looking for room.
        for page_no in 0..self.num_pages()? {
            let pid = HeapPageId::new(self.id, page_no);
            let handle = ctx
                .buffer_pool()
                .get_page(ctx.catalog(), tid, pid, Permissions::ReadWrite)?;
            let mut page = handle.write().unwrap();
            if page.num_empty_slots() > 0 {
                page.insert_tuple(tid, t)?;
                drop(page);
                return Ok(vec![handle]);
            }
        }

        // Every page is full: extend the file with an empty page, then route
        // the insert through the pool so the new page is cached.
        let new_no = self.num_pages()?;
        let pid = HeapPageId::new(self.id, new_no);
        let empty = HeapPage::parse(pid, &HeapPage::empty_page_data(), self.desc.clone())?;
        self.write_page(&empty)?;
        trace!("heap file {}: appended page {}", self.id, new_no);

        let handle = ctx
            .buffer_pool()
            .get_page(ctx.catalog(), tid, pid, Permissions::ReadWrite)?;
        handle.write().unwrap().insert_tuple(tid, t)?;
        Ok(vec![handle])
    }

    fn delete_tuple(
        &self,
        ctx: &Engine,
        tid: TransactionId,
        t: &Tuple,
    ) -> StorageResult<PageHandle> {
        let rid = t.record_id().ok_or(StorageError::TupleNotOnPage)?;
        if rid.page_id.table_id != self.id {
            return Err(StorageError::TupleNotOnPage);
        }
        let handle = ctx
            .buffer_pool()
            .get_page(ctx.catalog(), tid, rid.page_id, Permissions::ReadWrite)?;
        handle.write().unwrap().delete_tuple(tid, t)?;
        Ok(handle)
    }

    fn scan(self: Arc<Self>, ctx: Arc<Engine>, tid: TransactionId) -> Box<dyn TupleCursor + Send> {
        Box::new(HeapFileCursor::new(self, ctx, tid))
    }
}

enum CursorState {
    Closed,
    Open {
        page_no: PageNumber,
        tuples: VecDeque<Tuple>,
    },
    Exhausted,
}

/// Cursor over a heap file. Fetches one page at a time through the buffer
/// pool (read-only) and drains its live tuples in slot order.
pub struct HeapFileCursor {
    file: Arc<HeapFile>,
    ctx: Arc<Engine>,
    tid: TransactionId,
    state: CursorState,
}

impl HeapFileCursor {
    fn new(file: Arc<HeapFile>, ctx: Arc<Engine>, tid: TransactionId) -> Self {
        Self {
            file,
            ctx,
            tid,
            state: CursorState::Closed,
        }
    }

    fn page_tuples(&self, page_no: PageNumber) -> StorageResult<VecDeque<Tuple>> {
        let pid = HeapPageId::new(self.file.id(), page_no);
        let handle =
            self.ctx
                .buffer_pool()
                .get_page(self.ctx.catalog(), self.tid, pid, Permissions::ReadOnly)?;
        let page = handle.read().unwrap();
        Ok(page.iter().cloned().collect())
    }
}

impl TupleCursor for HeapFileCursor {
    fn open(&mut self) -> StorageResult<()> {
        self.state = if self.file.num_pages()? == 0 {
            CursorState::Exhausted
        } else {
            CursorState::Open {
                page_no: 0,
                tuples: self.page_tuples(0)?,
            }
        };
        Ok(())
    }

    fn next(&mut self) -> StorageResult<Option<Tuple>> {
        loop {
            match &mut self.state {
                CursorState::Closed | CursorState::Exhausted => return Ok(None),
                CursorState::Open { page_no, tuples } => {
                    if let Some(t) = tuples.pop_front() {
                        return Ok(Some(t));
                    }
                    let next_no = *page_no + 1;
                    if next_no >= self.file.num_pages()? {
                        self.state = CursorState::Exhausted;
                        return Ok(None);
                    }
                    let tuples = self.page_tuples(next_no)?;
                    self.state = CursorState::Open {
                        page_no: next_no,
                        tuples,
                    };
                }
            }
        }
    }

    fn rewind(&mut self) -> StorageResult<()> {
        self.close();
        self.open()
    }

    fn close(&mut self) {
        self.state = CursorState::Closed;
    }
}
