use super::error::{QueryError, QueryResult};
use crate::storage::{Field, Op, StorageError, Tuple};

/// Compares one field of a tuple against a constant operand.
#[derive(Debug, Clone)]
pub struct Predicate {
    field_index: usize,
    op: Op,
    operand: Field,
}

impl Predicate {
    pub fn new(field_index: usize, op: Op, operand: Field) -> Self {
        Self {
            field_index,
            op,
            operand,
        }
    }

    pub fn field_index(&self) -> usize {
        self.field_index
    }

    pub fn op(&self) -> Op {
        self.op
    }

    pub fn operand(&self) -> &Field {
        &self.operand
    }

    /// True iff `t.field op operand` holds.
    pub fn filter(&self, t: &Tuple) -> QueryResult<bool> {
        let field = t.field(self.field_index).ok_or_else(|| {
            QueryError::Storage(StorageError::InvalidSlot(self.field_index))
        })?;
        Ok(field.compare(self.op, &self.operand)?)
    }
}

/// Compares a field of a left tuple against a field of a right tuple.
#[derive(Debug, Clone)]
pub struct JoinPredicate {
    left_index: usize,
    op: Op,
    right_index: usize,
}

impl JoinPredicate {
    pub fn new(left_index: usize, op: Op, right_index: usize) -> Self {
        Self {
            left_index,
            op,
            right_index,
        }
    }

    /// True iff `left.field op right.field` holds.
    pub fn filter(&self, left: &Tuple, right: &Tuple) -> QueryResult<bool> {
        let l = left.field(self.left_index).ok_or_else(|| {
            QueryError::Storage(StorageError::InvalidSlot(self.left_index))
        })?;
        let r = right.field(self.right_index).ok_or_else(|| {
            QueryError::Storage(StorageError::InvalidSlot(self.right_index))
        })?;
        Ok(l.compare(self.op, r)?)
    }
}
