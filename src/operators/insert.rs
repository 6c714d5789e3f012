use std::sync::Arc;

use crate::database::Database;
use crate::error::SmallError;
use crate::field::{Field, Type};
use crate::row::{FieldItem, Schema};
use crate::transaction::Transaction;
use crate::tuple::Tuple;

use super::OpIterator;

/// Drains the child on the first `next`, inserting each tuple into the
/// named table via the buffer pool, and returns a single one-field tuple
/// carrying the count. Every subsequent call reports EOF. Propagates the
/// first error it hits rather than swallowing I/O failures and continuing.
pub struct Insert<'a> {
    tx: &'a Transaction,
    child: Box<dyn OpIterator>,
    table_id: i32,
    schema: Arc<Schema>,
    done: bool,
}

impl<'a> Insert<'a> {
    pub fn new(tx: &'a Transaction, child: Box<dyn OpIterator>, table_id: i32) -> Self {
        Self {
            tx,
            child,
            table_id,
            schema: Arc::new(Schema::new(vec![FieldItem::new("count", Type::Int)])),
            done: false,
        }
    }
}

impl<'a> OpIterator for Insert<'a> {
    fn open(&mut self) -> Result<(), SmallError> {
        self.child.open()
    }

    fn has_next(&mut self) -> Result<bool, SmallError> {
        Ok(!self.done)
    }

    fn next(&mut self) -> Result<Tuple, SmallError> {
        if self.done {
            return Err(SmallError::no_such_element("insert already fetched"));
        }
        let file = Database::catalog()
            .get_heap_file(self.table_id)
            .ok_or_else(|| SmallError::db_exception("no such table"))?;

        let mut count = 0i32;
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            file.insert_tuple(self.tx, tuple)?;
            count += 1;
        }

        self.done = true;
        Ok(Tuple::from_fields(self.schema.clone(), vec![Field::Int(count)]))
    }

    fn close(&mut self) {
        self.child.close();
    }

    fn rewind(&mut self) -> Result<(), SmallError> {
        self.done = false;
        self.child.rewind()
    }

    fn get_tuple_desc(&self) -> Arc<Schema> {
        self.schema.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::SeqScan;
    use crate::row::simple_int_schema;

    #[test]
    fn inserts_every_child_tuple_and_reports_count() {
        let dir = tempfile::tempdir().unwrap();
        Database::reset();
        let schema = simple_int_schema(1, "c");
        let src_path = dir.path().join("src.dat");
        let src_id = Database::mut_catalog().add_table("src", schema.clone(), &src_path, None).unwrap();
        let dst_path = dir.path().join("dst.dat");
        let dst_id = Database::mut_catalog().add_table("dst", schema, &dst_path, None).unwrap();

        let tx = Transaction::new();
        let src_file = Database::catalog().get_heap_file(src_id).unwrap();
        for i in 0..20 {
            src_file
                .insert_tuple(&tx, Tuple::from_fields(src_file.schema().clone(), vec![Field::Int(i)]))
                .unwrap();
        }
        tx.commit().unwrap();

        let tx2 = Transaction::new();
        let scan = SeqScan::new(&tx2, src_id, "src").unwrap();
        let mut insert = Insert::new(&tx2, Box::new(scan), dst_id);
        insert.open().unwrap();
        assert!(insert.has_next().unwrap());
        let result = insert.next().unwrap();
        assert_eq!(result.get_field(0).as_int().unwrap(), 20);
        assert!(!insert.has_next().unwrap());
        insert.close();
        tx2.commit().unwrap();

        let tx3 = Transaction::new();
        let mut check = SeqScan::new(&tx3, dst_id, "dst").unwrap();
        check.open().unwrap();
        let mut count = 0;
        while check.has_next().unwrap() {
            check.next().unwrap();
            count += 1;
        }
        assert_eq!(count, 20);
        check.close();
        tx3.commit().unwrap();
    }
}
