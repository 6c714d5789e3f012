use std::sync::Arc;

use crate::error::SmallError;
use crate::predicate::Predicate;
use crate::row::Schema;
use crate::tuple::Tuple;

use super::OpIterator;

/// Yields child tuples for which the predicate holds. Output schema is
/// identical to the child's.
pub struct Filter {
    predicate: Predicate,
    child: Box<dyn OpIterator>,
    cached: Option<Tuple>,
}

impl Filter {
    pub fn new(predicate: Predicate, child: Box<dyn OpIterator>) -> Self {
        Self {
            predicate,
            child,
            cached: None,
        }
    }
}

impl OpIterator for Filter {
    fn open(&mut self) -> Result<(), SmallError> {
        self.child.open()
    }

    fn has_next(&mut self) -> Result<bool, SmallError> {
        if self.cached.is_some() {
            return Ok(true);
        }
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            if self.predicate.matches(&tuple) {
                self.cached = Some(tuple);
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn next(&mut self) -> Result<Tuple, SmallError> {
        if !self.has_next()? {
            return Err(SmallError::no_such_element("filter exhausted"));
        }
        Ok(self.cached.take().unwrap())
    }

    fn close(&mut self) {
        self.child.close();
        self.cached = None;
    }

    fn rewind(&mut self) -> Result<(), SmallError> {
        self.cached = None;
        self.child.rewind()
    }

    fn get_tuple_desc(&self) -> Arc<Schema> {
        self.child.get_tuple_desc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::field::Field;
    use crate::operators::SeqScan;
    use crate::predicate::Op;
    use crate::row::simple_int_schema;
    use crate::transaction::Transaction;

    #[test]
    fn yields_only_matching_tuples() {
        let dir = tempfile::tempdir().unwrap();
        Database::reset();
        let schema = simple_int_schema(1, "c");
        let path = dir.path().join("t.dat");
        let table_id = Database::mut_catalog().add_table("t", schema, &path, None).unwrap();

        let tx = Transaction::new();
        let file = Database::catalog().get_heap_file(table_id).unwrap();
        for i in 0..10 {
            file.insert_tuple(&tx, Tuple::from_fields(file.schema().clone(), vec![Field::Int(i)]))
                .unwrap();
        }
        tx.commit().unwrap();

        let tx2 = Transaction::new();
        let scan = SeqScan::new(&tx2, table_id, "t").unwrap();
        let predicate = Predicate::new(0, Op::GreaterThanOrEq, Field::Int(5));
        let mut filter = Filter::new(predicate, Box::new(scan));
        filter.open().unwrap();
        let mut count = 0;
        while filter.has_next().unwrap() {
            let t = filter.next().unwrap();
            assert!(t.get_field(0).as_int().unwrap() >= 5);
            count += 1;
        }
        assert_eq!(count, 5);
        filter.close();
        tx2.commit().unwrap();
    }
}
