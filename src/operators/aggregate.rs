use std::sync::Arc;

use crate::error::SmallError;
use crate::field::{Field, Type};
use crate::row::{FieldItem, Schema};
use crate::tuple::Tuple;

use super::aggregator::{AggOp, IntAggregator, StringAggregator};
use super::OpIterator;

enum Engine {
    Int(IntAggregator),
    Str(StringAggregator),
}

/// On `open`, drains the child to completion and merges every tuple into
/// an aggregator keyed by the group field's value (or a single sentinel
/// group when `group_field` is `None`, i.e. `NO_GROUPING`). `next` then
/// yields one tuple per group out of the already-computed results.
pub struct Aggregate {
    child: Box<dyn OpIterator>,
    agg_field: usize,
    group_field: Option<usize>,
    op: AggOp,
    schema: Arc<Schema>,
    results: Vec<(Option<Field>, i32)>,
    idx: usize,
}

impl Aggregate {
    pub fn new(child: Box<dyn OpIterator>, agg_field: usize, group_field: Option<usize>, op: AggOp) -> Self {
        let child_schema = child.get_tuple_desc();
        let fields = match group_field {
            Some(g) => vec![
                FieldItem::new("groupVal", child_schema.field_type(g)),
                FieldItem::new("aggVal", Type::Int),
            ],
            None => vec![FieldItem::new("aggVal", Type::Int)],
        };
        Self {
            child,
            agg_field,
            group_field,
            op,
            schema: Arc::new(Schema::new(fields)),
            results: Vec::new(),
            idx: 0,
        }
    }
}

impl OpIterator for Aggregate {
    fn open(&mut self) -> Result<(), SmallError> {
        self.child.open()?;

        let agg_type = self.child.get_tuple_desc().field_type(self.agg_field);
        let mut int_engine = if agg_type == Type::Int {
            Some(IntAggregator::new(self.op))
        } else {
            None
        };
        let mut str_engine = if agg_type == Type::Str {
            Some(StringAggregator::new(self.op))
        } else {
            None
        };

        while self.child.has_next()? {
            let tuple = self.child.next()?;
            let group_key = self.group_field.map(|g| tuple.get_field(g).clone());
            match (&mut int_engine, &mut str_engine) {
                (Some(e), _) => e.merge(group_key, tuple.get_field(self.agg_field).as_int().unwrap()),
                (_, Some(e)) => e.merge(group_key),
                _ => unreachable!(),
            }
        }

        self.results = match (int_engine, str_engine) {
            (Some(e), _) => e.results(),
            (_, Some(e)) => e.results(),
            _ => unreachable!(),
        };
        self.idx = 0;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, SmallError> {
        Ok(self.idx < self.results.len())
    }

    fn next(&mut self) -> Result<Tuple, SmallError> {
        if !self.has_next()? {
            return Err(SmallError::no_such_element("aggregate exhausted"));
        }
        let (group_key, value) = &self.results[self.idx];
        self.idx += 1;

        let fields = match group_key {
            Some(k) => vec![k.clone(), Field::Int(*value)],
            None => vec![Field::Int(*value)],
        };
        Ok(Tuple::from_fields(self.schema.clone(), fields))
    }

    fn close(&mut self) {
        self.child.close();
    }

    fn rewind(&mut self) -> Result<(), SmallError> {
        self.idx = 0;
        Ok(())
    }

    fn get_tuple_desc(&self) -> Arc<Schema> {
        self.schema.clone()
    }
}
