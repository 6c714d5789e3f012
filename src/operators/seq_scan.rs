use std::sync::Arc;

use crate::database::Database;
use crate::error::SmallError;
use crate::heap_file::{HeapFile, HeapFileIterator};
use crate::row::Schema;
use crate::transaction::Transaction;
use crate::tuple::Tuple;

use super::OpIterator;

/// Wraps the underlying heap file's iterator. Every field of the child
/// schema is renamed to `alias.fieldName`, disambiguating self-joins.
pub struct SeqScan<'a> {
    tx: &'a Transaction,
    file: Arc<HeapFile>,
    schema: Arc<Schema>,
    iter: Option<HeapFileIterator<'a>>,
}

impl<'a> SeqScan<'a> {
    pub fn new(tx: &'a Transaction, table_id: i32, alias: &str) -> Result<Self, SmallError> {
        let file = Database::catalog()
            .get_heap_file(table_id)
            .ok_or_else(|| SmallError::db_exception("no such table"))?;
        let schema = Arc::new(file.schema().with_alias(alias));
        Ok(Self {
            tx,
            file,
            schema,
            iter: None,
        })
    }
}

impl<'a> OpIterator for SeqScan<'a> {
    fn open(&mut self) -> Result<(), SmallError> {
        let mut iter = HeapFile::iterator(&self.file, self.tx);
        iter.open()?;
        self.iter = Some(iter);
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, SmallError> {
        self.iter
            .as_mut()
            .ok_or_else(|| SmallError::db_exception("seq scan not open"))?
            .has_next()
    }

    fn next(&mut self) -> Result<Tuple, SmallError> {
        self.iter
            .as_mut()
            .ok_or_else(|| SmallError::db_exception("seq scan not open"))?
            .next()
    }

    fn close(&mut self) {
        if let Some(iter) = self.iter.as_mut() {
            iter.close();
        }
        self.iter = None;
    }

    fn rewind(&mut self) -> Result<(), SmallError> {
        self.iter
            .as_mut()
            .ok_or_else(|| SmallError::db_exception("seq scan not open"))?
            .rewind()
    }

    fn get_tuple_desc(&self) -> Arc<Schema> {
        self.schema.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::row::simple_int_schema;

    #[test]
    fn renames_fields_with_alias() {
        let dir = tempfile::tempdir().unwrap();
        Database::reset();
        let schema = simple_int_schema(2, "c");
        let path = dir.path().join("t.dat");
        let table_id = Database::mut_catalog().add_table("t", schema, &path, None).unwrap();

        let tx = Transaction::new();
        let file = Database::catalog().get_heap_file(table_id).unwrap();
        for i in 0..3 {
            let tuple = Tuple::from_fields(file.schema().clone(), vec![Field::Int(i), Field::Int(i)]);
            file.insert_tuple(&tx, tuple).unwrap();
        }
        tx.commit().unwrap();

        let tx2 = Transaction::new();
        let mut scan = SeqScan::new(&tx2, table_id, "t1").unwrap();
        assert_eq!(scan.get_tuple_desc().field_name(0), "t1.c0");
        scan.open().unwrap();
        let mut count = 0;
        while scan.has_next().unwrap() {
            scan.next().unwrap();
            count += 1;
        }
        scan.close();
        assert_eq!(count, 3);
        tx2.commit().unwrap();
    }
}
