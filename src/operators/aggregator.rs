use crate::field::Field;

/// The five supported aggregate operations. `StringAggregator` only
/// accepts `Count`; `IntAggregator` accepts all five.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AggOp {
    Min,
    Max,
    Sum,
    Count,
    Avg,
}

#[derive(Clone, Copy)]
struct IntAggState {
    min: i32,
    max: i32,
    sum: i32,
    count: i32,
}

impl IntAggState {
    fn new() -> Self {
        Self {
            min: i32::MAX,
            max: i32::MIN,
            sum: 0,
            count: 0,
        }
    }

    fn merge(&mut self, v: i32) {
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        // sum overflow is not guarded, per spec; wrapping keeps it from
        // panicking in debug builds while still letting it wrap like a
        // release build's silent overflow would.
        self.sum = self.sum.wrapping_add(v);
        self.count += 1;
    }

    fn value(&self, op: AggOp) -> i32 {
        match op {
            AggOp::Min => self.min,
            AggOp::Max => self.max,
            AggOp::Sum => self.sum,
            AggOp::Count => self.count,
            // Truncating integer division.
            AggOp::Avg => {
                if self.count == 0 {
                    0
                } else {
                    self.sum / self.count
                }
            }
        }
    }
}

/// Groups INT-valued tuples by an optional group-by field and merges each
/// group's aggregate field into one of MIN/MAX/SUM/COUNT/AVG. A `None`
/// group key is the `NO_GROUPING` sentinel: every tuple merges into a
/// single group.
pub struct IntAggregator {
    op: AggOp,
    groups: Vec<(Option<Field>, IntAggState)>,
}

impl IntAggregator {
    pub fn new(op: AggOp) -> Self {
        Self {
            op,
            groups: Vec::new(),
        }
    }

    pub fn merge(&mut self, group_key: Option<Field>, value: i32) {
        match self.groups.iter_mut().find(|(k, _)| *k == group_key) {
            Some((_, state)) => state.merge(value),
            None => {
                let mut state = IntAggState::new();
                state.merge(value);
                self.groups.push((group_key, state));
            }
        }
    }

    /// One `(group key, aggregate value)` pair per group, in first-seen
    /// order.
    pub fn results(&self) -> Vec<(Option<Field>, i32)> {
        self.groups.iter().map(|(k, s)| (k.clone(), s.value(self.op))).collect()
    }
}

/// The STRING aggregator: COUNT is the only operation that makes sense
/// over string values, so this type enforces it at construction.
pub struct StringAggregator {
    groups: Vec<(Option<Field>, i32)>,
}

impl StringAggregator {
    pub fn new(op: AggOp) -> Self {
        assert_eq!(op, AggOp::Count, "string aggregator only supports COUNT");
        Self { groups: Vec::new() }
    }

    pub fn merge(&mut self, group_key: Option<Field>) {
        match self.groups.iter_mut().find(|(k, _)| *k == group_key) {
            Some((_, count)) => *count += 1,
            None => self.groups.push((group_key, 1)),
        }
    }

    pub fn results(&self) -> Vec<(Option<Field>, i32)> {
        self.groups.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn avg_truncates_per_group() {
        let mut agg = IntAggregator::new(AggOp::Avg);
        agg.merge(Some(Field::Int(1)), 10);
        agg.merge(Some(Field::Int(1)), 11);
        agg.merge(Some(Field::Int(2)), 5);
        let results = agg.results();
        let g1 = results.iter().find(|(k, _)| *k == Some(Field::Int(1))).unwrap();
        assert_eq!(g1.1, 10); // (10+11)/2 = 10 (truncated)
    }

    #[test]
    fn no_grouping_collapses_into_one_group() {
        let mut agg = IntAggregator::new(AggOp::Sum);
        for v in 1..=5 {
            agg.merge(None, v);
        }
        let results = agg.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].1, 15);
    }
}
