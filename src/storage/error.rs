use super::{PageNumber, TableId};
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("read past end of file: page {page_no} at offset {offset}")]
    ReadPastEnd { page_no: PageNumber, offset: u64 },

    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead { expected: usize, actual: usize },

    #[error("invalid page data: {0}")]
    InvalidPageData(String),

    #[error("invalid slot index: {0}")]
    InvalidSlot(usize),

    #[error("page has no empty slot")]
    NoEmptySlot,

    #[error("tuple is not on this page")]
    TupleNotOnPage,

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("unknown table id: {0}")]
    UnknownTable(TableId),

    #[error("no evictable page in buffer pool")]
    NoVictim,
}

pub type StorageResult<T> = Result<T, StorageError>;
