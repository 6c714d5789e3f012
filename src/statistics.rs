use crate::database::Database;
use crate::error::SmallError;
use crate::heap_file::HeapFile;
use crate::predicate::Op;
use crate::transaction::Transaction;

/// Default bucket count for a fresh [`IntHistogram`]; the tests require at
/// least 100.
pub const DEFAULT_BUCKETS: usize = 100;
/// Cost unit `TableStats::estimate_scan_cost` charges per page read;
/// arbitrary but fixed so cost comparisons between tables are meaningful.
pub const IO_COST_PER_PAGE: f64 = 1000.0;

/// An equi-width histogram over `[min, max]` split into `buckets` buckets.
/// Bucket width is `floor((max - min + 1) / buckets)`; the last bucket
/// absorbs the remainder so every value in range lands in exactly one
/// bucket.
pub struct IntHistogram {
    min: i32,
    max: i32,
    buckets: Vec<u32>,
    width: i32,
    total: u32,
}

impl IntHistogram {
    pub fn new(buckets: usize, min: i32, max: i32) -> Self {
        let buckets = buckets.max(1);
        let range = (max - min + 1).max(1) as usize;
        let width = (range / buckets).max(1) as i32;
        Self {
            min,
            max,
            buckets: vec![0; buckets],
            width,
            total: 0,
        }
    }

    fn bucket_of(&self, v: i32) -> usize {
        let idx = (v - self.min) / self.width;
        (idx as usize).min(self.buckets.len() - 1)
    }

    /// Inclusive bounds of the bucket at `idx`; the last bucket's upper
    /// bound is clamped to `max` to absorb the division remainder.
    fn bucket_bounds(&self, idx: usize) -> (i32, i32) {
        let left = self.min + idx as i32 * self.width;
        let right = if idx == self.buckets.len() - 1 {
            self.max
        } else {
            left + self.width - 1
        };
        (left, right)
    }

    fn bucket_width(&self, idx: usize) -> i32 {
        let (left, right) = self.bucket_bounds(idx);
        right - left + 1
    }

    pub fn add_value(&mut self, v: i32) {
        let idx = self.bucket_of(v);
        self.buckets[idx] += 1;
        self.total += 1;
    }

    /// `estimateSelectivity` for the six comparison operators, following
    /// spec section 4.6 exactly: out-of-range short-circuits, `EQ`/`NOT_EQ`
    /// from the containing bucket's density, `LT`/`GT` by summing whole
    /// buckets plus a linear fraction of the containing one.
    pub fn estimate_selectivity(&self, op: Op, v: i32) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let n = self.total as f64;

        if v < self.min {
            return match op {
                Op::LessThan | Op::LessThanOrEq | Op::Equals => 0.0,
                Op::GreaterThan | Op::GreaterThanOrEq | Op::NotEquals => 1.0,
            };
        }
        if v > self.max {
            return match op {
                Op::GreaterThan | Op::GreaterThanOrEq | Op::Equals => 0.0,
                Op::LessThan | Op::LessThanOrEq | Op::NotEquals => 1.0,
            };
        }

        let b = self.bucket_of(v);
        let h = self.buckets[b] as f64;
        let w = self.bucket_width(b) as f64;
        let (left, right) = self.bucket_bounds(b);
        let eq = (h / w) / n;

        match op {
            Op::Equals => eq,
            Op::NotEquals => 1.0 - eq,
            Op::LessThan => {
                let lower: u32 = self.buckets[..b].iter().sum();
                (lower as f64) / n + eq * (v - left) as f64
            }
            Op::GreaterThan => {
                let upper: u32 = self.buckets[b + 1..].iter().sum();
                (upper as f64) / n + eq * (right - v) as f64
            }
            Op::LessThanOrEq => self.estimate_selectivity(Op::LessThan, v) + eq,
            Op::GreaterThanOrEq => self.estimate_selectivity(Op::GreaterThan, v) + eq,
        }
    }
}

/// Per-table statistics: one histogram per INT field, built by two passes
/// over the table at construction time (the first learns min/max, the
/// second populates the buckets). STRING fields are not histogrammed —
/// there is no equi-width ordering for them in this engine, matching the
/// spec's INT-only histogram.
#[derive(Clone)]
pub struct TableStats {
    num_tuples: usize,
    num_pages: usize,
    histograms: Vec<Option<IntHistogram>>,
}

impl TableStats {
    pub fn compute(table_id: i32, buckets: usize) -> Result<Self, SmallError> {
        let file = Database::catalog()
            .get_heap_file(table_id)
            .ok_or_else(|| SmallError::db_exception("no such table"))?;
        let schema = file.schema().clone();
        let num_fields = schema.num_fields();

        let mut min = vec![i32::MAX; num_fields];
        let mut max = vec![i32::MIN; num_fields];
        let mut num_tuples = 0usize;

        let tx = Transaction::new();
        let mut iter = HeapFile::iterator(&file, &tx);
        iter.open()?;
        while iter.has_next()? {
            let tuple = iter.next()?;
            num_tuples += 1;
            for i in 0..num_fields {
                if let Some(v) = tuple.get_field(i).as_int() {
                    min[i] = min[i].min(v);
                    max[i] = max[i].max(v);
                }
            }
        }
        iter.close();

        let mut histograms: Vec<Option<IntHistogram>> = (0..num_fields)
            .map(|i| {
                if min[i] <= max[i] {
                    Some(IntHistogram::new(buckets, min[i], max[i]))
                } else {
                    None
                }
            })
            .collect();

        let mut iter = HeapFile::iterator(&file, &tx);
        iter.open()?;
        while iter.has_next()? {
            let tuple = iter.next()?;
            for i in 0..num_fields {
                if let (Some(h), Some(v)) = (&mut histograms[i], tuple.get_field(i).as_int()) {
                    h.add_value(v);
                }
            }
        }
        iter.close();
        tx.commit()?;

        Ok(Self {
            num_tuples,
            num_pages: file.num_pages(),
            histograms,
        })
    }

    pub fn num_tuples(&self) -> usize {
        self.num_tuples
    }

    /// Estimated number of tuples in the field's containing table that
    /// satisfy `op v`; `floor(nTuples * selectivity)`.
    pub fn estimate_table_cardinality(&self, field: usize, op: Op, v: i32) -> usize {
        let selectivity = self.estimate_selectivity(field, op, v);
        ((self.num_tuples as f64) * selectivity).floor() as usize
    }

    pub fn estimate_selectivity(&self, field: usize, op: Op, v: i32) -> f64 {
        match &self.histograms[field] {
            Some(h) => h.estimate_selectivity(op, v),
            None => 1.0,
        }
    }

    pub fn estimate_scan_cost(&self) -> f64 {
        self.num_pages as f64 * IO_COST_PER_PAGE
    }
}
