use super::int_histogram::IntHistogram;
use super::string_histogram::StringHistogram;
use super::{IO_COST_PER_PAGE, NUM_HIST_BINS};
use crate::engine::Engine;
use crate::execution::{QueryError, QueryResult};
use crate::storage::{DbFile, Field, Op, StorageError, TableId, TupleCursor, Type};
use crate::transaction::TransactionId;
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

enum ColumnHistogram {
    Int(IntHistogram),
    Str(StringHistogram),
}

/// Per-table statistics: one histogram per column plus the page and tuple
/// counts feeding the I/O cost model.
///
/// Built in two scans of the table: the first finds per-column minima and
/// maxima to size the histograms, the second populates them.
pub struct TableStats {
    io_cost_per_page: u64,
    n_tuples: u64,
    n_pages: u64,
    histograms: Vec<ColumnHistogram>,
}

impl TableStats {
    pub fn new(ctx: &Arc<Engine>, table_id: TableId, io_cost_per_page: u64) -> QueryResult<Self> {
        let file = ctx.catalog().file(table_id)?;
        let desc = file.tuple_desc().clone();
        let n_pages = file.num_pages().map_err(QueryError::Storage)?;
        let num_fields = desc.num_fields();

        let tid = TransactionId::new();
        let mut cursor = file.scan(ctx.clone(), tid);

        // Pass one: tuple count and integer column bounds.
        let mut n_tuples: u64 = 0;
        let mut mins = vec![i32::MAX; num_fields];
        let mut maxs = vec![i32::MIN; num_fields];
        cursor.open()?;
        while let Some(t) = cursor.next()? {
            n_tuples += 1;
            for i in 0..num_fields {
                if let Some(Field::Int(v)) = t.field(i) {
                    mins[i] = mins[i].min(*v);
                    maxs[i] = maxs[i].max(*v);
                }
            }
        }

        let mut histograms = Vec::with_capacity(num_fields);
        for i in 0..num_fields {
            match desc.field_type(i) {
                Some(Type::Int) => {
                    // An empty table leaves the bounds untouched; degrade to
                    // a one-value histogram instead of an inverted range.
                    let (min, max) = if n_tuples == 0 {
                        (0, 0)
                    } else {
                        (mins[i], maxs[i])
                    };
                    histograms.push(ColumnHistogram::Int(IntHistogram::new(
                        NUM_HIST_BINS,
                        min,
                        max,
                    )));
                }
                _ => histograms.push(ColumnHistogram::Str(StringHistogram::new(NUM_HIST_BINS))),
            }
        }

        // Pass two: populate.
        cursor.rewind()?;
        while let Some(t) = cursor.next()? {
            for (i, histogram) in histograms.iter_mut().enumerate() {
                match (histogram, t.field(i)) {
                    (ColumnHistogram::Int(hist), Some(Field::Int(v))) => hist.add_value(*v),
                    (ColumnHistogram::Str(hist), Some(Field::Str(s))) => hist.add_value(s),
                    _ => {}
                }
            }
        }
        cursor.close();

        debug!(
            "table stats for {}: {} tuples over {} pages",
            table_id, n_tuples, n_pages
        );
        Ok(Self {
            io_cost_per_page,
            n_tuples,
            n_pages,
            histograms,
        })
    }

    /// Cost of a full sequential scan, assuming a cold buffer pool and
    /// whole-page reads.
    pub fn estimate_scan_cost(&self) -> f64 {
        (self.n_pages * self.io_cost_per_page) as f64
    }

    /// Expected number of tuples surviving a predicate of the given
    /// selectivity.
    pub fn estimate_table_cardinality(&self, selectivity: f64) -> u64 {
        (selectivity * self.n_tuples as f64).floor() as u64
    }

    /// Estimated selectivity of `field op constant` against this table.
    pub fn estimate_selectivity(
        &self,
        field_index: usize,
        op: Op,
        constant: &Field,
    ) -> QueryResult<f64> {
        let histogram = self
            .histograms
            .get(field_index)
            .ok_or(QueryError::Storage(StorageError::InvalidSlot(field_index)))?;
        match (histogram, constant) {
            (ColumnHistogram::Int(hist), Field::Int(v)) => Ok(hist.estimate_selectivity(op, *v)),
            (ColumnHistogram::Str(hist), Field::Str(s)) => Ok(hist.estimate_selectivity(op, s)),
            (ColumnHistogram::Int(_), other) => {
                Err(QueryError::Storage(StorageError::TypeMismatch {
                    expected: Type::Int.to_string(),
                    actual: other.type_of().to_string(),
                }))
            }
            (ColumnHistogram::Str(_), other) => {
                Err(QueryError::Storage(StorageError::TypeMismatch {
                    expected: Type::String.to_string(),
                    actual: other.type_of().to_string(),
                }))
            }
        }
    }

    pub fn total_tuples(&self) -> u64 {
        self.n_tuples
    }
}

/// Registry of statistics by table name.
pub struct StatsMap {
    inner: RwLock<HashMap<String, Arc<TableStats>>>,
}

impl StatsMap {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, table_name: &str) -> Option<Arc<TableStats>> {
        self.inner.read().unwrap().get(table_name).cloned()
    }

    pub fn set(&self, table_name: &str, stats: Arc<TableStats>) {
        self.inner
            .write()
            .unwrap()
            .insert(table_name.to_string(), stats);
    }

    /// Swap the whole registry (test injection hook).
    pub fn replace(&self, stats: HashMap<String, Arc<TableStats>>) {
        *self.inner.write().unwrap() = stats;
    }
}

impl Default for StatsMap {
    fn default() -> Self {
        Self::new()
    }
}

/// Build statistics for every catalog table at the default I/O cost and
/// install them in the engine's registry.
pub fn compute_statistics(ctx: &Arc<Engine>) -> QueryResult<()> {
    for table_id in ctx.catalog().table_ids() {
        let stats = TableStats::new(ctx, table_id, IO_COST_PER_PAGE)?;
        let name = ctx.catalog().table_name(table_id)?;
        ctx.stats().set(&name, Arc::new(stats));
    }
    Ok(())
}
