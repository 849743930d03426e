use super::error::{QueryError, QueryResult};
use super::OpIterator;
use crate::engine::Engine;
use crate::storage::{Field, Tuple, TupleDesc, Type};
use crate::transaction::TransactionId;
use std::sync::Arc;

/// Deletes every child tuple from its table through the buffer pool, then
/// emits a single one-column tuple holding the delete count.
///
/// The child must produce tuples that carry record ids, i.e. tuples that
/// came off a scan.
pub struct Delete {
    ctx: Arc<Engine>,
    tid: TransactionId,
    child: Box<dyn OpIterator>,
    desc: Arc<TupleDesc>,
    opened: bool,
    done: bool,
}

impl Delete {
    pub fn new(ctx: Arc<Engine>, tid: TransactionId, child: Box<dyn OpIterator>) -> Self {
        Self {
            ctx,
            tid,
            child,
            desc: Arc::new(TupleDesc::from_types(vec![Type::Int])),
            opened: false,
            done: false,
        }
    }
}

impl OpIterator for Delete {
    fn open(&mut self) -> QueryResult<()> {
        if self.opened {
            return Err(QueryError::AlreadyOpen);
        }
        self.child.open()?;
        self.opened = true;
        self.done = false;
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<Tuple>> {
        if !self.opened {
            return Err(QueryError::NotOpen);
        }
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let mut count = 0;
        while let Some(t) = self.child.next()? {
            self.ctx
                .buffer_pool()
                .delete_tuple(&self.ctx, self.tid, &t)?;
            count += 1;
        }
        let result = Tuple::new(self.desc.clone(), vec![Field::Int(count)])
            .map_err(QueryError::Storage)?;
        Ok(Some(result))
    }

    fn rewind(&mut self) -> QueryResult<()> {
        self.close();
        self.open()
    }

    fn close(&mut self) {
        if self.opened {
            self.child.close();
            self.opened = false;
        }
    }

    fn tuple_desc(&self) -> Arc<TupleDesc> {
        self.desc.clone()
    }

    fn children(&mut self) -> Vec<&mut dyn OpIterator> {
        vec![self.child.as_mut()]
    }

    fn set_children(&mut self, children: Vec<Box<dyn OpIterator>>) {
        if let Some(child) = children.into_iter().next() {
            self.child = child;
        }
    }
}
