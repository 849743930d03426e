mod aggregate;
mod delete;
mod error;
mod filter;
mod insert;
mod predicate;
mod seq_scan;

pub use aggregate::{
    Aggregate, AggregateOp, Aggregator, IntegerAggregator, StringAggregator,
};
pub use delete::Delete;
pub use error::{QueryError, QueryResult};
pub use filter::Filter;
pub use insert::Insert;
pub use predicate::{JoinPredicate, Predicate};
pub use seq_scan::SeqScan;

use crate::storage::{Tuple, TupleDesc};
use std::sync::Arc;

/// A node of the pull-based operator tree.
///
/// Lifecycle: construct, `open`, drain with `next` until it yields `None`,
/// `close`. `rewind` restarts the stream. The output schema is known before
/// `open`; `next` on an unopened operator is `QueryError::NotOpen` and a
/// second `open` is `QueryError::AlreadyOpen`.
pub trait OpIterator: Send {
    fn open(&mut self) -> QueryResult<()>;

    /// The next tuple, or `None` once the stream is exhausted.
    fn next(&mut self) -> QueryResult<Option<Tuple>>;

    fn rewind(&mut self) -> QueryResult<()>;

    fn close(&mut self);

    /// Schema of the tuples this operator produces.
    fn tuple_desc(&self) -> Arc<TupleDesc>;

    /// Child operators, for tree rewrites. Leaves return an empty list.
    fn children(&mut self) -> Vec<&mut dyn OpIterator> {
        Vec::new()
    }

    /// Replace the child operators. Leaves ignore the call.
    fn set_children(&mut self, _children: Vec<Box<dyn OpIterator>>) {}
}

/// A materialized relation: a schema plus the tuples themselves, exposed
/// through the operator protocol. Aggregators hand their results back as one
/// of these.
pub struct TupleIterator {
    desc: Arc<TupleDesc>,
    tuples: Vec<Tuple>,
    cursor: Option<usize>,
}

impl TupleIterator {
    pub fn new(desc: Arc<TupleDesc>, tuples: Vec<Tuple>) -> Self {
        Self {
            desc,
            tuples,
            cursor: None,
        }
    }
}

impl OpIterator for TupleIterator {
    fn open(&mut self) -> QueryResult<()> {
        if self.cursor.is_some() {
            return Err(QueryError::AlreadyOpen);
        }
        self.cursor = Some(0);
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<Tuple>> {
        let cursor = self.cursor.ok_or(QueryError::NotOpen)?;
        if cursor >= self.tuples.len() {
            return Ok(None);
        }
        self.cursor = Some(cursor + 1);
        Ok(Some(self.tuples[cursor].clone()))
    }

    fn rewind(&mut self) -> QueryResult<()> {
        self.close();
        self.open()
    }

    fn close(&mut self) {
        self.cursor = None;
    }

    fn tuple_desc(&self) -> Arc<TupleDesc> {
        self.desc.clone()
    }
}
