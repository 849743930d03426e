use super::error::{QueryError, QueryResult};
use super::OpIterator;
use crate::engine::Engine;
use crate::storage::{Field, StorageError, TableId, Tuple, TupleDesc, Type};
use crate::transaction::TransactionId;
use std::sync::Arc;

/// Inserts every child tuple into a table through the buffer pool, then
/// emits a single one-column tuple holding the insert count.
pub struct Insert {
    ctx: Arc<Engine>,
    tid: TransactionId,
    child: Box<dyn OpIterator>,
    table_id: TableId,
    desc: Arc<TupleDesc>,
    opened: bool,
    done: bool,
}

impl Insert {
    /// The child's schema must match the destination table's schema.
    pub fn new(
        ctx: Arc<Engine>,
        tid: TransactionId,
        child: Box<dyn OpIterator>,
        table_id: TableId,
    ) -> QueryResult<Self> {
        let table_desc = ctx.catalog().tuple_desc(table_id)?;
        if child.tuple_desc().as_ref() != table_desc.as_ref() {
            return Err(QueryError::Storage(StorageError::SchemaMismatch(
                "child schema does not match destination table".to_string(),
            )));
        }
        Ok(Self {
            ctx,
            tid,
            child,
            table_id,
            desc: Arc::new(TupleDesc::from_types(vec![Type::Int])),
            opened: false,
            done: false,
        })
    }
}

impl OpIterator for Insert {
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
                .insert_tuple(&self.ctx, self.tid, self.table_id, t)?;
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
