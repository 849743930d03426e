use super::error::{QueryError, QueryResult};
use super::predicate::Predicate;
use super::OpIterator;
use crate::storage::{Tuple, TupleDesc};
use std::sync::Arc;

/// Relational select: passes through only the child tuples its predicate
/// accepts.
pub struct Filter {
    predicate: Predicate,
    child: Box<dyn OpIterator>,
    opened: bool,
}

impl Filter {
    pub fn new(predicate: Predicate, child: Box<dyn OpIterator>) -> Self {
        Self {
            predicate,
            child,
            opened: false,
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

impl OpIterator for Filter {
    fn open(&mut self) -> QueryResult<()> {
        if self.opened {
            return Err(QueryError::AlreadyOpen);
        }
        self.child.open()?;
        self.opened = true;
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<Tuple>> {
        if !self.opened {
            return Err(QueryError::NotOpen);
        }
        while let Some(t) = self.child.next()? {
            if self.predicate.filter(&t)? {
                return Ok(Some(t));
            }
        }
        Ok(None)
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
        self.child.tuple_desc()
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
