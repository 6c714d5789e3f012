use std::sync::Arc;

use crate::error::SmallError;
use crate::predicate::JoinPredicate;
use crate::row::Schema;
use crate::tuple::Tuple;

use super::OpIterator;

/// Simple nested-loops join: for each tuple of the outer child, rewind the
/// inner child and scan it, emitting `merge(t1, t2)` wherever the
/// predicate holds. Neither child is materialized in full — the outer
/// tuple is held one at a time and the inner child is driven by its own
/// `rewind`/`next`.
pub struct Join {
    predicate: JoinPredicate,
    child1: Box<dyn OpIterator>,
    child2: Box<dyn OpIterator>,
    schema: Arc<Schema>,
    outer: Option<Tuple>,
    cached: Option<Tuple>,
}

impl Join {
    pub fn new(predicate: JoinPredicate, child1: Box<dyn OpIterator>, child2: Box<dyn OpIterator>) -> Self {
        let schema = Arc::new(Schema::merge(&child1.get_tuple_desc(), &child2.get_tuple_desc()));
        Self {
            predicate,
            child1,
            child2,
            schema,
            outer: None,
            cached: None,
        }
    }
}

impl OpIterator for Join {
    fn open(&mut self) -> Result<(), SmallError> {
        self.child1.open()?;
        self.child2.open()?;
        self.outer = None;
        self.cached = None;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, SmallError> {
        if self.cached.is_some() {
            return Ok(true);
        }
        loop {
            if self.outer.is_none() {
                if !self.child1.has_next()? {
                    return Ok(false);
                }
                self.outer = Some(self.child1.next()?);
                self.child2.rewind()?;
            }

            let t1 = self.outer.as_ref().unwrap();
            while self.child2.has_next()? {
                let t2 = self.child2.next()?;
                if self.predicate.matches(t1, &t2) {
                    self.cached = Some(Tuple::merge(t1, &t2));
                    return Ok(true);
                }
            }
            self.outer = None;
        }
    }

    fn next(&mut self) -> Result<Tuple, SmallError> {
        if !self.has_next()? {
            return Err(SmallError::no_such_element("join exhausted"));
        }
        Ok(self.cached.take().unwrap())
    }

    fn close(&mut self) {
        self.child1.close();
        self.child2.close();
        self.outer = None;
        self.cached = None;
    }

    fn rewind(&mut self) -> Result<(), SmallError> {
        self.outer = None;
        self.cached = None;
        self.child1.rewind()?;
        self.child2.rewind()
    }

    fn get_tuple_desc(&self) -> Arc<Schema> {
        self.schema.clone()
    }
}
