use super::error::{QueryError, QueryResult};
use super::OpIterator;
use crate::engine::Engine;
use crate::storage::{DbFile, TableId, Tuple, TupleCursor, TupleDesc};
use crate::transaction::TransactionId;
use std::sync::Arc;

/// Sequential scan: emits every live tuple of a table in page-then-slot
/// order by draining the file's cursor through the buffer pool.
pub struct SeqScan {
    ctx: Arc<Engine>,
    tid: TransactionId,
    table_id: TableId,
    alias: String,
    cursor: Option<Box<dyn TupleCursor + Send>>,
}

impl SeqScan {
    pub fn new(
        ctx: Arc<Engine>,
        tid: TransactionId,
        table_id: TableId,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            ctx,
            tid,
            table_id,
            alias: alias.into(),
            cursor: None,
        }
    }

    pub fn table_name(&self) -> QueryResult<String> {
        Ok(self.ctx.catalog().table_name(self.table_id)?)
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl OpIterator for SeqScan {
    fn open(&mut self) -> QueryResult<()> {
        if self.cursor.is_some() {
            return Err(QueryError::AlreadyOpen);
        }
        let file = self.ctx.catalog().file(self.table_id)?;
        let mut cursor = file.scan(self.ctx.clone(), self.tid);
        cursor.open()?;
        self.cursor = Some(cursor);
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<Tuple>> {
        let cursor = self.cursor.as_mut().ok_or(QueryError::NotOpen)?;
        Ok(cursor.next()?)
    }

    fn rewind(&mut self) -> QueryResult<()> {
        self.close();
        self.open()
    }

    fn close(&mut self) {
        self.cursor = None;
    }

    /// The table's schema with every field name prefixed `"{alias}."`.
    fn tuple_desc(&self) -> Arc<TupleDesc> {
        let base = match self.ctx.catalog().tuple_desc(self.table_id) {
            Ok(desc) => desc,
            // The schema must be known before open; a scan over a table that
            // was dropped from the catalog has no meaningful schema left.
            Err(_) => return Arc::new(TupleDesc::from_types(Vec::new())),
        };
        let mut types = Vec::with_capacity(base.num_fields());
        let mut names = Vec::with_capacity(base.num_fields());
        for item in base.items() {
            types.push(item.field_type);
            names.push(
                item.name
                    .as_ref()
                    .map(|name| format!("{}.{}", self.alias, name)),
            );
        }
        Arc::new(TupleDesc::new(types, names))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{DbFile, Field, HeapFile, Type};

    fn setup_table(dir: &std::path::Path, rows: &[(i32, i32)]) -> (Arc<Engine>, TableId) {
        let desc = Arc::new(TupleDesc::new(
            vec![Type::Int, Type::Int],
            vec![Some("a".to_string()), Some("b".to_string())],
        ));
        let file = Arc::new(HeapFile::create(dir.join("t.dat"), desc.clone()).unwrap());
        let ctx = Engine::new();
        ctx.catalog().add_table(file.clone(), "t", "a");

        let tid = TransactionId::new();
        for &(a, b) in rows {
            let t = Tuple::new(desc.clone(), vec![Field::Int(a), Field::Int(b)]).unwrap();
            ctx.buffer_pool()
                .insert_tuple(&ctx, tid, file.id(), t)
                .unwrap();
        }
        (ctx, file.id())
    }

    #[test]
    fn test_scan_emits_every_tuple_once() {
        let dir = tempfile::tempdir().unwrap();
        let rows = [(1, 10), (2, 20), (3, 30)];
        let (ctx, table_id) = setup_table(dir.path(), &rows);

        let mut scan = SeqScan::new(ctx, TransactionId::new(), table_id, "t");
        scan.open().unwrap();
        let mut seen = Vec::new();
        while let Some(t) = scan.next().unwrap() {
            seen.push((
                match t.field(0).unwrap() {
                    Field::Int(v) => *v,
                    _ => unreachable!(),
                },
                match t.field(1).unwrap() {
                    Field::Int(v) => *v,
                    _ => unreachable!(),
                },
            ));
        }
        scan.close();
        assert_eq!(seen, rows);
    }

    #[test]
    fn test_scan_schema_is_alias_prefixed() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, table_id) = setup_table(dir.path(), &[(1, 1)]);

        let scan = SeqScan::new(ctx, TransactionId::new(), table_id, "s");
        let desc = scan.tuple_desc();
        assert_eq!(desc.field_name(0), Some("s.a"));
        assert_eq!(desc.field_name(1), Some("s.b"));
        assert_eq!(desc.field_type(0), Some(Type::Int));
    }

    #[test]
    fn test_scan_protocol_guards() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, table_id) = setup_table(dir.path(), &[(1, 1)]);

        let mut scan = SeqScan::new(ctx, TransactionId::new(), table_id, "t");
        assert!(matches!(scan.next(), Err(QueryError::NotOpen)));
        scan.open().unwrap();
        assert!(matches!(scan.open(), Err(QueryError::AlreadyOpen)));

        assert!(scan.next().unwrap().is_some());
        scan.rewind().unwrap();
        let mut count = 0;
        while scan.next().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 1);
    }
}
