use std::collections::hash_map::DefaultHasher;
use std::fs::{File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::database::Database;
use crate::error::SmallError;
use crate::field::Type;
use crate::lock_manager::Permission;
use crate::page::{self, HeapPage, Page};
use crate::page_id::{PageId, RecordId};
use crate::row::Schema;
use crate::transaction::Transaction;
use crate::tuple::Tuple;

/// Derive a stable table id from a file's absolute path, so re-opening the
/// same file across process restarts yields the same identity.
pub(crate) fn table_id_for_path(path: &Path) -> i32 {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let mut hasher = DefaultHasher::new();
    canonical.hash(&mut hasher);
    (hasher.finish() & 0x7fff_ffff) as i32
}

/// A single OS file of concatenated fixed-size heap pages. The only state
/// this struct owns directly is the file handle and schema; tuple mutation
/// always goes through the buffer pool so locking and dirty-tracking stay
/// centralized there.
pub struct HeapFile {
    table_id: i32,
    path: PathBuf,
    schema: Arc<Schema>,
    file: Mutex<File>,
}

impl HeapFile {
    pub fn open(path: impl AsRef<Path>, schema: Schema) -> Result<Self, SmallError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        let table_id = table_id_for_path(&path);
        Ok(Self {
            table_id,
            path,
            schema: Arc::new(schema),
            file: Mutex::new(file),
        })
    }

    pub fn table_id(&self) -> i32 {
        self.table_id
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn num_pages(&self) -> usize {
        let len = self.file.lock().unwrap().metadata().map(|m| m.len()).unwrap_or(0);
        len as usize / page::page_size()
    }

    /// Positioned read of exactly one page's worth of bytes; a read past
    /// the end of the file is the caller's mistake, not recovered here.
    pub fn read_page(&self, page_no: u32) -> Result<HeapPage, SmallError> {
        let page_size = page::page_size();
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(page_no as u64 * page_size as u64))?;
        let mut buf = vec![0u8; page_size];
        file.read_exact(&mut buf)?;
        let id = PageId::heap(self.table_id, page_no);
        Ok(HeapPage::from_bytes(id, (*self.schema).clone(), &buf))
    }

    pub fn write_page(&self, page: &HeapPage) -> Result<(), SmallError> {
        let page_size = page::page_size();
        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(page.id().page_no as u64 * page_size as u64))?;
        file.write_all(&page.get_page_data())?;
        Ok(())
    }

    /// Scan pages 0..N for an empty slot under X-mode; extend the file with
    /// a fresh, empty page if every existing page is full. The fresh page
    /// is written directly to disk (extending the file length) but the
    /// actual tuple insertion is routed back through the buffer pool under
    /// an X-lock, just like every other page mutation, so an abort can
    /// discard it and invariant 1 ("if T modified P then T holds X on P")
    /// holds for the extend path too.
    pub fn insert_tuple(&self, tx: &Transaction, tuple: Tuple) -> Result<(), SmallError> {
        if tuple.schema().as_ref() != self.schema.as_ref() {
            return Err(SmallError::db_exception("tuple schema does not match table"));
        }

        let num_pages = self.num_pages();
        for page_no in 0..num_pages {
            let page_id = PageId::heap(self.table_id, page_no as u32);
            let inserted = Database::buffer_pool().with_heap_page_mut(
                tx,
                page_id,
                Permission::ReadWrite,
                |page| {
                    if page.num_empty_slots() == 0 {
                        return Ok(false);
                    }
                    page.insert_tuple(tuple.clone())?;
                    Ok(true)
                },
            )?;
            if inserted {
                return Ok(());
            }
        }

        let new_page_id = PageId::heap(self.table_id, num_pages as u32);
        let empty_page = HeapPage::new_empty(new_page_id, (*self.schema).clone());
        self.write_page(&empty_page)?;

        Database::buffer_pool().with_heap_page_mut(
            tx,
            new_page_id,
            Permission::ReadWrite,
            |page| page.insert_tuple(tuple.clone()),
        )
    }

    /// Clear the slot named by the tuple's record identity. Fails if the
    /// tuple belongs to a different table.
    pub fn delete_tuple(&self, tx: &Transaction, tuple: &Tuple) -> Result<(), SmallError> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| SmallError::db_exception("tuple has no record id"))?;
        if rid.page_id.table_id != self.table_id {
            return Err(SmallError::db_exception(
                "tuple's table id does not match this file",
            ));
        }

        Database::buffer_pool().with_heap_page_mut(
            tx,
            rid.page_id,
            Permission::ReadWrite,
            |page| page.delete_tuple(rid),
        )
    }

    /// Build an iterator that owns a clone of this file's `Arc`, so it can
    /// outlive the borrow that produced it (an operator holds the iterator
    /// across many calls, typically longer than any single reference to
    /// the catalog's table entry would live). Takes `&Arc<HeapFile>`
    /// rather than `&self` for exactly that reason.
    pub fn iterator<'a>(file: &Arc<HeapFile>, tx: &'a Transaction) -> HeapFileIterator<'a> {
        HeapFileIterator::new(Arc::clone(file), tx)
    }
}

/// Yields every tuple in page-number order, reading each page via the
/// buffer pool with S-mode and skipping empty slots.
pub struct HeapFileIterator<'a> {
    file: Arc<HeapFile>,
    tx: &'a Transaction,
    page_no: u32,
    in_page: Vec<Tuple>,
    idx: usize,
    opened: bool,
}

impl<'a> HeapFileIterator<'a> {
    fn new(file: Arc<HeapFile>, tx: &'a Transaction) -> Self {
        Self {
            file,
            tx,
            page_no: 0,
            in_page: Vec::new(),
            idx: 0,
            opened: false,
        }
    }

    pub fn open(&mut self) -> Result<(), SmallError> {
        self.opened = true;
        self.rewind()
    }

    pub fn rewind(&mut self) -> Result<(), SmallError> {
        self.page_no = 0;
        self.idx = 0;
        self.in_page = self.load_page(0)?;
        Ok(())
    }

    fn load_page(&self, page_no: u32) -> Result<Vec<Tuple>, SmallError> {
        if page_no as usize >= self.file.num_pages() {
            return Ok(Vec::new());
        }
        let page_id = PageId::heap(self.file.table_id, page_no);
        Database::buffer_pool().with_heap_page_mut(
            self.tx,
            page_id,
            Permission::ReadOnly,
            |page| Ok(page.tuples().cloned().collect()),
        )?
    }

    pub fn has_next(&mut self) -> Result<bool, SmallError> {
        while self.idx >= self.in_page.len() {
            let next_page_no = self.page_no + 1;
            if next_page_no as usize >= self.file.num_pages() {
                return Ok(false);
            }
            self.page_no = next_page_no;
            self.in_page = self.load_page(self.page_no)?;
            self.idx = 0;
        }
        Ok(self.idx < self.in_page.len())
    }

    pub fn next(&mut self) -> Result<Tuple, SmallError> {
        if !self.has_next()? {
            return Err(SmallError::no_such_element("heap file iterator exhausted"));
        }
        let tuple = self.in_page[self.idx].clone();
        self.idx += 1;
        Ok(tuple)
    }

    pub fn close(&mut self) {
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Field;
    use crate::row::simple_int_schema;

    fn fresh_database_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        Database::reset();
        dir
    }

    #[test]
    fn insert_then_scan_roundtrip() {
        let dir = fresh_database_dir();
        let path = dir.path().join("t.dat");
        let schema = simple_int_schema(2, "c");
        let table_id = Database::mut_catalog()
            .add_table("t", schema, &path, None)
            .unwrap();

        let tx = Transaction::new();
        let file = Database::catalog().get_heap_file(table_id).unwrap();
        for i in 0..50 {
            let schema_arc = file.schema().clone();
            let tuple = Tuple::from_fields(schema_arc, vec![Field::Int(i), Field::Int(i)]);
            file.insert_tuple(&tx, tuple).unwrap();
        }
        tx.commit().unwrap();

        let tx2 = Transaction::new();
        let mut iter = HeapFile::iterator(&file, &tx2);
        iter.open().unwrap();
        let mut count = 0;
        while iter.has_next().unwrap() {
            let t = iter.next().unwrap();
            assert_eq!(t.get_field(0), t.get_field(1));
            count += 1;
        }
        assert_eq!(count, 50);
        tx2.commit().unwrap();
    }
}
