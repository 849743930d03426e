use super::error::{QueryError, QueryResult};
use super::{OpIterator, TupleIterator};
use crate::storage::{Field, StorageError, Tuple, TupleDesc, Type};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Aggregation operators. `SumCount` is the distributed-merge helper shape:
/// it emits the running sum and the count as two columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
    SumCount,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Count => "count",
            AggregateOp::SumCount => "sum_count",
        };
        write!(f, "{}", name)
    }
}

/// Incrementally folds tuples into per-group accumulators and materializes
/// the result relation on demand.
pub trait Aggregator: Send {
    /// Fold one input tuple into its group.
    fn merge_tuple_into_group(&mut self, t: &Tuple) -> QueryResult<()>;

    /// The materialized result relation: `(agg...)` rows without grouping,
    /// `(group, agg...)` rows with it.
    fn iterator(&self) -> TupleIterator;

    /// Output schema named against the child schema: the group column keeps
    /// its name, aggregate columns become `"{op} ({field})"`.
    fn output_desc(&self, child: &TupleDesc) -> Arc<TupleDesc>;

    /// Forget every group.
    fn clear(&mut self);
}

// Synthetic key for the single bucket used when there is no grouping.
fn bucket_key(group_by: Option<usize>, t: &Tuple) -> QueryResult<Field> {
    match group_by {
        None => Ok(Field::Int(0)),
        Some(i) => t
            .field(i)
            .cloned()
            .ok_or_else(|| QueryError::Storage(StorageError::InvalidSlot(i))),
    }
}

fn agg_int_field(afield: usize, t: &Tuple) -> QueryResult<i32> {
    match t.field(afield) {
        Some(Field::Int(v)) => Ok(*v),
        Some(other) => Err(QueryError::Storage(StorageError::TypeMismatch {
            expected: Type::Int.to_string(),
            actual: other.type_of().to_string(),
        })),
        None => Err(QueryError::Storage(StorageError::InvalidSlot(afield))),
    }
}

#[derive(Clone, Copy)]
struct IntAccumulator {
    count: i32,
    sum: i32,
    min: i32,
    max: i32,
}

impl IntAccumulator {
    fn new(v: i32) -> Self {
        Self {
            count: 1,
            sum: v,
            min: v,
            max: v,
        }
    }

    fn fold(&mut self, v: i32) {
        self.count += 1;
        // Integer arithmetic throughout, wrapping like the two's-complement
        // machine ops the results are defined in terms of.
        self.sum = self.sum.wrapping_add(v);
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    fn emit(&self, op: AggregateOp) -> Vec<Field> {
        match op {
            AggregateOp::Min => vec![Field::Int(self.min)],
            AggregateOp::Max => vec![Field::Int(self.max)],
            AggregateOp::Sum => vec![Field::Int(self.sum)],
            // Truncating division, consistent with two's-complement.
            AggregateOp::Avg => vec![Field::Int(self.sum / self.count)],
            AggregateOp::Count => vec![Field::Int(self.count)],
            AggregateOp::SumCount => vec![Field::Int(self.sum), Field::Int(self.count)],
        }
    }
}

/// Aggregates an INT column. Supports every `AggregateOp`.
pub struct IntegerAggregator {
    group_by: Option<(usize, Type)>,
    afield: usize,
    op: AggregateOp,
    groups: HashMap<Field, IntAccumulator>,
    // Insertion order of groups, so results come out deterministically.
    group_order: Vec<Field>,
}

impl IntegerAggregator {
    pub fn new(group_by: Option<(usize, Type)>, afield: usize, op: AggregateOp) -> Self {
        Self {
            group_by,
            afield,
            op,
            groups: HashMap::new(),
            group_order: Vec::new(),
        }
    }

    fn result_types(&self) -> Vec<Type> {
        let mut types = Vec::new();
        if let Some((_, group_type)) = self.group_by {
            types.push(group_type);
        }
        types.push(Type::Int);
        if self.op == AggregateOp::SumCount {
            types.push(Type::Int);
        }
        types
    }
}

impl Aggregator for IntegerAggregator {
    fn merge_tuple_into_group(&mut self, t: &Tuple) -> QueryResult<()> {
        let key = bucket_key(self.group_by.map(|(i, _)| i), t)?;
        let v = agg_int_field(self.afield, t)?;
        match self.groups.get_mut(&key) {
            Some(acc) => acc.fold(v),
            None => {
                self.groups.insert(key.clone(), IntAccumulator::new(v));
                self.group_order.push(key);
            }
        }
        Ok(())
    }

    fn iterator(&self) -> TupleIterator {
        let desc = Arc::new(TupleDesc::from_types(self.result_types()));
        let mut tuples = Vec::with_capacity(self.group_order.len());
        for key in &self.group_order {
            let acc = &self.groups[key];
            let mut fields = Vec::new();
            if self.group_by.is_some() {
                fields.push(key.clone());
            }
            fields.extend(acc.emit(self.op));
            tuples.push(Tuple::new(desc.clone(), fields).expect("result schema is consistent"));
        }
        TupleIterator::new(desc, tuples)
    }

    fn output_desc(&self, child: &TupleDesc) -> Arc<TupleDesc> {
        output_desc(child, self.group_by.map(|(i, _)| i), self.afield, self.op)
    }

    fn clear(&mut self) {
        self.groups.clear();
        self.group_order.clear();
    }
}

/// Aggregates a STRING column. Only `Count` is meaningful for strings;
/// construction rejects every other operator.
pub struct StringAggregator {
    group_by: Option<(usize, Type)>,
    afield: usize,
    counts: HashMap<Field, i32>,
    group_order: Vec<Field>,
}

impl StringAggregator {
    pub fn new(
        group_by: Option<(usize, Type)>,
        afield: usize,
        op: AggregateOp,
    ) -> QueryResult<Self> {
        if op != AggregateOp::Count {
            return Err(QueryError::UnsupportedAggregate(op.to_string()));
        }
        Ok(Self {
            group_by,
            afield,
            counts: HashMap::new(),
            group_order: Vec::new(),
        })
    }
}

impl Aggregator for StringAggregator {
    fn merge_tuple_into_group(&mut self, t: &Tuple) -> QueryResult<()> {
        match t.field(self.afield) {
            Some(Field::Str(_)) => {}
            Some(other) => {
                return Err(QueryError::Storage(StorageError::TypeMismatch {
                    expected: Type::String.to_string(),
                    actual: other.type_of().to_string(),
                }))
            }
            None => return Err(QueryError::Storage(StorageError::InvalidSlot(self.afield))),
        }
        let key = bucket_key(self.group_by.map(|(i, _)| i), t)?;
        match self.counts.get_mut(&key) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(key.clone(), 1);
                self.group_order.push(key);
            }
        }
        Ok(())
    }

    fn iterator(&self) -> TupleIterator {
        let mut types = Vec::new();
        if let Some((_, group_type)) = self.group_by {
            types.push(group_type);
        }
        types.push(Type::Int);
        let desc = Arc::new(TupleDesc::from_types(types));

        let mut tuples = Vec::with_capacity(self.group_order.len());
        for key in &self.group_order {
            let count = self.counts[key];
            let mut fields = Vec::new();
            if self.group_by.is_some() {
                fields.push(key.clone());
            }
            fields.push(Field::Int(count));
            tuples.push(Tuple::new(desc.clone(), fields).expect("result schema is consistent"));
        }
        TupleIterator::new(desc, tuples)
    }

    fn output_desc(&self, child: &TupleDesc) -> Arc<TupleDesc> {
        output_desc(
            child,
            self.group_by.map(|(i, _)| i),
            self.afield,
            AggregateOp::Count,
        )
    }

    fn clear(&mut self) {
        self.counts.clear();
        self.group_order.clear();
    }
}

fn output_desc(
    child: &TupleDesc,
    group_by: Option<usize>,
    afield: usize,
    op: AggregateOp,
) -> Arc<TupleDesc> {
    let agg_name = |label: &str| {
        Some(format!(
            "{} ({})",
            label,
            child.field_name(afield).unwrap_or_default()
        ))
    };

    let mut types = Vec::new();
    let mut names = Vec::new();
    if let Some(i) = group_by {
        types.push(child.field_type(i).unwrap_or(Type::Int));
        names.push(child.field_name(i).map(str::to_string));
    }
    match op {
        AggregateOp::SumCount => {
            types.push(Type::Int);
            names.push(agg_name("sum"));
            types.push(Type::Int);
            names.push(agg_name("count"));
        }
        _ => {
            types.push(Type::Int);
            names.push(agg_name(&op.to_string()));
        }
    }
    Arc::new(TupleDesc::new(types, names))
}

/// Operator wrapper around the aggregators: drains its child on `open`,
/// then streams the materialized groups.
pub struct Aggregate {
    child: Box<dyn OpIterator>,
    aggregator: Box<dyn Aggregator>,
    results: Option<TupleIterator>,
}

impl Aggregate {
    /// Pick the aggregator from the child's schema: INT aggregate columns
    /// get an `IntegerAggregator`, STRING columns a `StringAggregator`.
    pub fn new(
        child: Box<dyn OpIterator>,
        afield: usize,
        group_by: Option<usize>,
        op: AggregateOp,
    ) -> QueryResult<Self> {
        let child_desc = child.tuple_desc();
        let agg_type = child_desc
            .field_type(afield)
            .ok_or(QueryError::Storage(StorageError::InvalidSlot(afield)))?;
        let group = match group_by {
            None => None,
            Some(i) => Some((
                i,
                child_desc
                    .field_type(i)
                    .ok_or(QueryError::Storage(StorageError::InvalidSlot(i)))?,
            )),
        };

        let aggregator: Box<dyn Aggregator> = match agg_type {
            Type::Int => Box::new(IntegerAggregator::new(group, afield, op)),
            Type::String => Box::new(StringAggregator::new(group, afield, op)?),
        };
        Ok(Self {
            child,
            aggregator,
            results: None,
        })
    }
}

impl OpIterator for Aggregate {
    fn open(&mut self) -> QueryResult<()> {
        if self.results.is_some() {
            return Err(QueryError::AlreadyOpen);
        }
        self.aggregator.clear();
        self.child.open()?;
        while let Some(t) = self.child.next()? {
            self.aggregator.merge_tuple_into_group(&t)?;
        }
        let mut results = self.aggregator.iterator();
        results.open()?;
        self.results = Some(results);
        Ok(())
    }

    fn next(&mut self) -> QueryResult<Option<Tuple>> {
        match &mut self.results {
            Some(results) => results.next(),
            None => Err(QueryError::NotOpen),
        }
    }

    fn rewind(&mut self) -> QueryResult<()> {
        self.close();
        self.open()
    }

    fn close(&mut self) {
        if self.results.take().is_some() {
            self.child.close();
        }
    }

    fn tuple_desc(&self) -> Arc<TupleDesc> {
        self.aggregator.output_desc(&self.child.tuple_desc())
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

#[cfg(test)]
mod tests {
    use super::*;

    fn int_rows(values: &[(i32, i32)]) -> Vec<Tuple> {
        let desc = Arc::new(TupleDesc::new(
            vec![Type::Int, Type::Int],
            vec![Some("g".to_string()), Some("v".to_string())],
        ));
        values
            .iter()
            .map(|&(g, v)| Tuple::new(desc.clone(), vec![Field::Int(g), Field::Int(v)]).unwrap())
            .collect()
    }

    fn drain(it: &mut TupleIterator) -> Vec<Vec<Field>> {
        it.open().unwrap();
        let mut out = Vec::new();
        while let Some(t) = it.next().unwrap() {
            out.push(t.fields().to_vec());
        }
        out
    }

    #[test]
    fn test_grouped_avg() {
        let mut agg =
            IntegerAggregator::new(Some((0, Type::Int)), 1, AggregateOp::Avg);
        for t in int_rows(&[(1, 10), (1, 20), (2, 5), (2, 15)]) {
            agg.merge_tuple_into_group(&t).unwrap();
        }
        let mut rows = drain(&mut agg.iterator());
        rows.sort_by_key(|fields| match fields[0] {
            Field::Int(g) => g,
            _ => unreachable!(),
        });
        assert_eq!(
            rows,
            vec![
                vec![Field::Int(1), Field::Int(15)],
                vec![Field::Int(2), Field::Int(10)],
            ]
        );
    }

    #[test]
    fn test_avg_truncates_toward_zero() {
        let mut agg = IntegerAggregator::new(None, 1, AggregateOp::Avg);
        for t in int_rows(&[(0, -3), (0, -4)]) {
            agg.merge_tuple_into_group(&t).unwrap();
        }
        // (-7) / 2 truncates to -3, not -4.
        assert_eq!(drain(&mut agg.iterator()), vec![vec![Field::Int(-3)]]);
    }

    #[test]
    fn test_no_grouping_min_max_sum_count() {
        let rows = int_rows(&[(0, 4), (0, -2), (0, 9)]);
        for (op, expected) in [
            (AggregateOp::Min, -2),
            (AggregateOp::Max, 9),
            (AggregateOp::Sum, 11),
            (AggregateOp::Count, 3),
        ] {
            let mut agg = IntegerAggregator::new(None, 1, op);
            for t in &rows {
                agg.merge_tuple_into_group(t).unwrap();
            }
            assert_eq!(drain(&mut agg.iterator()), vec![vec![Field::Int(expected)]]);
        }
    }

    #[test]
    fn test_sum_count_emits_both() {
        let mut agg =
            IntegerAggregator::new(Some((0, Type::Int)), 1, AggregateOp::SumCount);
        for t in int_rows(&[(1, 10), (1, 20), (2, 5)]) {
            agg.merge_tuple_into_group(&t).unwrap();
        }
        let mut rows = drain(&mut agg.iterator());
        rows.sort_by_key(|fields| match fields[0] {
            Field::Int(g) => g,
            _ => unreachable!(),
        });
        assert_eq!(
            rows,
            vec![
                vec![Field::Int(1), Field::Int(30), Field::Int(2)],
                vec![Field::Int(2), Field::Int(5), Field::Int(1)],
            ]
        );
    }

    #[test]
    fn test_empty_input_yields_empty_relation() {
        let agg = IntegerAggregator::new(None, 1, AggregateOp::Count);
        assert!(drain(&mut agg.iterator()).is_empty());
    }

    #[test]
    fn test_output_desc_names() {
        let child = TupleDesc::new(
            vec![Type::Int, Type::Int],
            vec![Some("g".to_string()), Some("v".to_string())],
        );
        let agg = IntegerAggregator::new(Some((0, Type::Int)), 1, AggregateOp::Avg);
        let desc = agg.output_desc(&child);
        assert_eq!(desc.field_name(0), Some("g"));
        assert_eq!(desc.field_name(1), Some("avg (v)"));

        let agg = IntegerAggregator::new(None, 1, AggregateOp::Count);
        let desc = agg.output_desc(&child);
        assert_eq!(desc.num_fields(), 1);
        assert_eq!(desc.field_name(0), Some("count (v)"));
    }

    #[test]
    fn test_string_aggregator_counts() {
        let desc = Arc::new(TupleDesc::from_types(vec![Type::Int, Type::String]));
        let mut agg = StringAggregator::new(Some((0, Type::Int)), 1, AggregateOp::Count).unwrap();
        for (g, s) in [(1, "a"), (1, "b"), (2, "c")] {
            let t = Tuple::new(
                desc.clone(),
                vec![Field::Int(g), Field::Str(s.to_string())],
            )
            .unwrap();
            agg.merge_tuple_into_group(&t).unwrap();
        }
        let mut rows = drain(&mut agg.iterator());
        rows.sort_by_key(|fields| match fields[0] {
            Field::Int(g) => g,
            _ => unreachable!(),
        });
        assert_eq!(
            rows,
            vec![
                vec![Field::Int(1), Field::Int(2)],
                vec![Field::Int(2), Field::Int(1)],
            ]
        );
    }

    #[test]
    fn test_string_aggregator_rejects_non_count() {
        for op in [
            AggregateOp::Min,
            AggregateOp::Max,
            AggregateOp::Sum,
            AggregateOp::Avg,
            AggregateOp::SumCount,
        ] {
            let result = StringAggregator::new(None, 0, op);
            assert!(matches!(result, Err(QueryError::UnsupportedAggregate(_))));
        }
    }

    #[test]
    fn test_aggregate_operator_over_child() {
        let desc = Arc::new(TupleDesc::new(
            vec![Type::Int, Type::Int],
            vec![Some("g".to_string()), Some("v".to_string())],
        ));
        let tuples = int_rows(&[(1, 10), (1, 20), (2, 5), (2, 15)]);
        let child = TupleIterator::new(desc, tuples);

        let mut agg =
            Aggregate::new(Box::new(child), 1, Some(0), AggregateOp::Avg).unwrap();
        assert_eq!(agg.tuple_desc().field_name(1), Some("avg (v)"));

        agg.open().unwrap();
        let mut rows = Vec::new();
        while let Some(t) = agg.next().unwrap() {
            rows.push(t.fields().to_vec());
        }
        rows.sort_by_key(|fields| match fields[0] {
            Field::Int(g) => g,
            _ => unreachable!(),
        });
        assert_eq!(
            rows,
            vec![
                vec![Field::Int(1), Field::Int(15)],
                vec![Field::Int(2), Field::Int(10)],
            ]
        );

        agg.rewind().unwrap();
        let mut count = 0;
        while agg.next().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 2);
    }
}
