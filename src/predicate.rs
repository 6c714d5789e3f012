use std::fmt;

use crate::field::Field;
use crate::tuple::Tuple;

/// Comparison operators usable by [`Predicate`] and [`JoinPredicate`], and
/// by histogram selectivity estimation (`statistics.rs`).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Op {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
}

impl Op {
    fn apply(&self, lhs: &Field, rhs: &Field) -> bool {
        match self {
            Op::Equals => lhs == rhs,
            Op::NotEquals => lhs != rhs,
            Op::GreaterThan => lhs > rhs,
            Op::GreaterThanOrEq => lhs >= rhs,
            Op::LessThan => lhs < rhs,
            Op::LessThanOrEq => lhs <= rhs,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Op::Equals => "=",
            Op::NotEquals => "<>",
            Op::GreaterThan => ">",
            Op::GreaterThanOrEq => ">=",
            Op::LessThan => "<",
            Op::LessThanOrEq => "<=",
        };
        write!(f, "{}", s)
    }
}

/// A single-tuple predicate: `tuple[field_index] op literal`. Used by
/// `Filter` and, with the same three components, by a B+Tree
/// `indexIterator`'s key range.
#[derive(Clone)]
pub struct Predicate {
    pub field_index: usize,
    pub op: Op,
    pub literal: Field,
}

impl Predicate {
    pub fn new(field_index: usize, op: Op, literal: Field) -> Self {
        Self {
            field_index,
            op,
            literal,
        }
    }

    pub fn matches(&self, tuple: &Tuple) -> bool {
        self.op.apply(tuple.get_field(self.field_index), &self.literal)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "field[{}] {} {}", self.field_index, self.op, self.literal)
    }
}

/// A two-tuple predicate for nested-loops join:
/// `t1[field1] op t2[field2]`.
#[derive(Clone)]
pub struct JoinPredicate {
    pub field1: usize,
    pub op: Op,
    pub field2: usize,
}

impl JoinPredicate {
    pub fn new(field1: usize, op: Op, field2: usize) -> Self {
        Self { field1, op, field2 }
    }

    pub fn matches(&self, t1: &Tuple, t2: &Tuple) -> bool {
        self.op.apply(t1.get_field(self.field1), t2.get_field(self.field2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Type;
    use crate::row::simple_int_schema;
    use std::sync::Arc;

    #[test]
    fn equals_matches_exact_value() {
        let schema = Arc::new(simple_int_schema(1, "c"));
        let tuple = Tuple::from_fields(schema, vec![Field::Int(7)]);
        let p = Predicate::new(0, Op::Equals, Field::Int(7));
        assert!(p.matches(&tuple));
        let p = Predicate::new(0, Op::Equals, Field::Int(8));
        assert!(!p.matches(&tuple));
    }

    #[test]
    fn join_predicate_compares_across_tuples() {
        let schema = Arc::new(simple_int_schema(1, "c"));
        let t1 = Tuple::from_fields(schema.clone(), vec![Field::Int(3)]);
        let t2 = Tuple::from_fields(schema, vec![Field::Int(3)]);
        let jp = JoinPredicate::new(0, Op::Equals, 0);
        assert!(jp.matches(&t1, &t2));
        let _ = Type::Int;
    }
}
