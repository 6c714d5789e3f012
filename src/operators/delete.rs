use std::sync::Arc;

use crate::database::Database;
use crate::error::SmallError;
use crate::field::{Field, Type};
use crate::row::{FieldItem, Schema};
use crate::transaction::Transaction;
use crate::tuple::Tuple;

use super::OpIterator;

/// Same shape as [`Insert`](super::Insert): drains the child on the first
/// `next`, deleting each tuple via the buffer pool, and returns a
/// one-field count tuple. Each child tuple must carry a record id (it came
/// from storage, not from a projection above it) and must belong to the
/// table its own page id names — `HeapFile::delete_tuple` enforces that.
pub struct Delete<'a> {
    tx: &'a Transaction,
    child: Box<dyn OpIterator>,
    schema: Arc<Schema>,
    done: bool,
}

impl<'a> Delete<'a> {
    pub fn new(tx: &'a Transaction, child: Box<dyn OpIterator>) -> Self {
        Self {
            tx,
            child,
            schema: Arc::new(Schema::new(vec![FieldItem::new("count", Type::Int)])),
            done: false,
        }
    }
}

impl<'a> OpIterator for Delete<'a> {
    fn open(&mut self) -> Result<(), SmallError> {
        self.child.open()
    }

    fn has_next(&mut self) -> Result<bool, SmallError> {
        Ok(!self.done)
    }

    fn next(&mut self) -> Result<Tuple, SmallError> {
        if self.done {
            return Err(SmallError::no_such_element("delete already fetched"));
        }
        let mut count = 0i32;
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            let rid = tuple
                .record_id()
                .ok_or_else(|| SmallError::db_exception("tuple has no record id to delete"))?;
            let file = Database::catalog()
                .get_heap_file(rid.page_id.table_id)
                .ok_or_else(|| SmallError::db_exception("no such table"))?;
            file.delete_tuple(self.tx, &tuple)?;
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
