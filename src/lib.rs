pub mod catalog;
pub mod engine;
pub mod execution;
pub mod optimizer;
pub mod storage;
pub mod transaction;

pub use catalog::{Catalog, CatalogError};
pub use engine::Engine;
pub use execution::{OpIterator, QueryError};
pub use storage::{BufferPool, HeapFile, HeapPage, StorageError, Tuple, TupleDesc};
pub use transaction::{Permissions, TransactionId};

#[cfg(test)]
pub(crate) fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}
