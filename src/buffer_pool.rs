use std::collections::HashMap;
use std::sync::Mutex;

use crate::database::Database;
use crate::error::SmallError;
use crate::lock_manager::{LockType, Permission};
use crate::page::{HeapPage, Page};
use crate::page_id::PageId;
use crate::transaction::{Transaction, TransactionId};
use crate::types::SmallResult;

struct CacheEntry {
    page: HeapPage,
    stamp: u64,
}

struct Inner {
    pages: HashMap<PageId, CacheEntry>,
    stamp: u64,
}

/// A bounded page cache keyed by page identity. Capacity is fixed at
/// construction; eviction approximates LRU by a monotonic access stamp
/// rather than an actual linked list, favoring a plain map over an
/// intrusive structure.
///
/// All mutation (insert, evict, flush, discard) serializes under one
/// mutex; callers never hold a page reference across a lock acquisition,
/// since every access goes through `with_heap_page`/`with_heap_page_mut`.
///
/// Every accessor takes `&self`, not `&mut self`: the pool's own `Mutex`
/// is the only serialization it needs. This matters beyond style —
/// `with_heap_page_mut` calls into the lock manager's `acquire`, which
/// blocks on a condvar while a page is contended. If reaching the pool
/// required an exclusive reference (as through `RwLock::write`), a
/// blocked waiter would hold that exclusive reference for the duration of
/// the wait, and no other transaction — including the lock holder trying
/// to reach `commit()` — could get back into the pool to make progress.
/// `Database` hands out the pool behind a shared reference for exactly
/// this reason.
pub struct BufferPool {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner {
                pages: HashMap::new(),
                stamp: 0,
            }),
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.pages.clear();
        inner.stamp = 0;
    }

    pub fn contains(&self, page_id: PageId) -> bool {
        self.inner.lock().unwrap().pages.contains_key(&page_id)
    }

    fn next_stamp(inner: &mut Inner) -> u64 {
        inner.stamp = inner.stamp.wrapping_add(1);
        if inner.stamp == u64::MAX {
            for entry in inner.pages.values_mut() {
                entry.stamp = 1;
            }
            inner.stamp = 1;
        }
        inner.stamp
    }

    /// Evict exactly one clean page with the minimum stamp. NO-STEAL: a
    /// dirty page is never a candidate, even if it is the coldest one in
    /// the pool.
    fn evict_one(inner: &mut Inner) -> SmallResult {
        let victim = inner
            .pages
            .iter()
            .filter(|(_, entry)| entry.page.is_dirty().is_none())
            .min_by_key(|(_, entry)| entry.stamp)
            .map(|(pid, _)| *pid);

        match victim {
            Some(pid) => {
                inner.pages.remove(&pid);
                Ok(())
            }
            None => Err(SmallError::db_exception(
                "buffer pool is full and no clean page can be evicted",
            )),
        }
    }

    /// Read-only access to a cached heap page, acquiring the lock manager
    /// grant, loading from disk on a cache miss, and evicting if full.
    pub fn with_heap_page<R>(
        &self,
        tx: &Transaction,
        page_id: PageId,
        perm: Permission,
        f: impl FnOnce(&HeapPage) -> Result<R, SmallError>,
    ) -> Result<R, SmallError> {
        self.with_heap_page_mut(tx, page_id, perm, |page| f(page))
    }

    /// Universal page accessor. Blocks on the lock manager, then serves
    /// the page from cache or loads it from disk, running `f` while the
    /// pool mutex is held so no other thread can observe a half-installed
    /// page.
    pub fn with_heap_page_mut<R>(
        &self,
        tx: &Transaction,
        page_id: PageId,
        perm: Permission,
        f: impl FnOnce(&mut HeapPage) -> Result<R, SmallError>,
    ) -> Result<R, SmallError> {
        Database::lock_manager().acquire(tx.id(), page_id, perm.to_lock())?;

        let mut inner = self.inner.lock().unwrap();
        let stamp = Self::next_stamp(&mut inner);

        if !inner.pages.contains_key(&page_id) {
            if inner.pages.len() >= self.capacity {
                Self::evict_one(&mut inner)?;
            }
            let file = Database::catalog()
                .get_heap_file(page_id.table_id)
                .ok_or_else(|| SmallError::db_exception("no such table"))?;
            let page = file.read_page(page_id.page_no)?;
            inner.pages.insert(page_id, CacheEntry { page, stamp });
        }

        let entry = inner.pages.get_mut(&page_id).unwrap();
        entry.stamp = stamp;
        let result = f(&mut entry.page)?;
        if perm == Permission::ReadWrite {
            entry.page.mark_dirty(Some(tx.id()));
        }
        Ok(result)
    }

    pub fn flush_page(&self, page_id: PageId) -> SmallResult {
        let mut inner = self.inner.lock().unwrap();
        Self::flush_locked(&mut inner, page_id)
    }

    fn flush_locked(inner: &mut Inner, page_id: PageId) -> SmallResult {
        if let Some(entry) = inner.pages.get_mut(&page_id) {
            if entry.page.is_dirty().is_some() {
                let file = Database::catalog()
                    .get_heap_file(page_id.table_id)
                    .ok_or_else(|| SmallError::db_exception("no such table"))?;
                file.write_page(&entry.page)?;
                entry.page.mark_dirty(None);
            }
        }
        Ok(())
    }

    /// Flush every dirty page regardless of owner. Test-only: this
    /// violates NO-STEAL bookkeeping during normal operation.
    pub fn flush_all_pages(&self) -> SmallResult {
        let page_ids: Vec<PageId> = {
            let inner = self.inner.lock().unwrap();
            inner.pages.keys().copied().collect()
        };
        for pid in page_ids {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    fn discard_page(&self, page_id: PageId) {
        let mut inner = self.inner.lock().unwrap();
        inner.pages.remove(&page_id);
    }

    /// On commit: flush every page this transaction holds X-mode (their
    /// writes become durable). On abort: discard them from the cache,
    /// relying on the fact NO-STEAL guarantees they were never evicted
    /// mid-transaction, so discarding them is equivalent to rolling back.
    /// The X-mode page set is snapshotted before releasing locks, since
    /// releasing mutates the lock table this snapshot reads.
    pub fn transaction_complete(&self, tx: TransactionId, commit: bool) -> SmallResult {
        let locked = Database::lock_manager().locked_pages(tx);
        let x_pages: Vec<PageId> = locked
            .into_iter()
            .filter(|(_, mode)| *mode == LockType::Exclusive)
            .map(|(pid, _)| pid)
            .collect();

        for pid in x_pages {
            if commit {
                self.flush_page(pid)?;
            } else {
                self.discard_page(pid);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::field::Field;
    use crate::row::simple_int_schema;
    use crate::tuple::Tuple;

    fn fresh_db() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        Database::reset();
        dir
    }

    #[test]
    fn pool_size_never_exceeds_capacity() {
        let dir = fresh_db();
        Database::set_buffer_pool_capacity(2);
        let schema = simple_int_schema(1, "c");
        let path = dir.path().join("t.dat");
        let table_id = Database::mut_catalog()
            .add_table("t", schema, &path, None)
            .unwrap();
        let file = Database::catalog().get_heap_file(table_id).unwrap();

        let tx = Transaction::new();
        for i in 0..3 {
            let tuple = Tuple::from_fields(file.schema().clone(), vec![Field::Int(i)]);
            file.insert_tuple(&tx, tuple).unwrap();
        }
        tx.commit().unwrap();

        let tx2 = Transaction::new();
        for page_no in 0..3u32 {
            let page_id = PageId::heap(table_id, page_no);
            Database::buffer_pool()
                .with_heap_page(&tx2, page_id, Permission::ReadOnly, |_| Ok(()))
                .unwrap();
        }
        tx2.commit().unwrap();
    }

    #[test]
    fn clean_page_evicted_dirty_page_kept() {
        let dir = fresh_db();
        Database::set_buffer_pool_capacity(2);
        let schema = simple_int_schema(1, "c");
        let path = dir.path().join("t.dat");
        let table_id = Database::mut_catalog()
            .add_table("t", schema, &path, None)
            .unwrap();
        let file = Database::catalog().get_heap_file(table_id).unwrap();

        let tx1 = Transaction::new();
        for i in 0..200 {
            let tuple = Tuple::from_fields(file.schema().clone(), vec![Field::Int(i)]);
            file.insert_tuple(&tx1, tuple).unwrap();
        }
        tx1.commit().unwrap();

        let t1 = Transaction::new();
        Database::buffer_pool()
            .with_heap_page(&t1, PageId::heap(table_id, 0), Permission::ReadOnly, |_| Ok(()))
            .unwrap();
        Database::buffer_pool()
            .with_heap_page(&t1, PageId::heap(table_id, 1), Permission::ReadOnly, |_| Ok(()))
            .unwrap();
        t1.commit().unwrap();

        let t2 = Transaction::new();
        Database::buffer_pool()
            .with_heap_page_mut(&t2, PageId::heap(table_id, 0), Permission::ReadWrite, |p| {
                p.insert_tuple(Tuple::from_fields(file.schema().clone(), vec![Field::Int(999)]))
            })
            .unwrap();

        let t3 = Transaction::new();
        Database::buffer_pool()
            .with_heap_page(&t3, PageId::heap(table_id, 2), Permission::ReadOnly, |_| Ok(()))
            .unwrap();

        assert!(Database::buffer_pool().contains(PageId::heap(table_id, 0)));
        assert!(!Database::buffer_pool().contains(PageId::heap(table_id, 1)));
        assert!(Database::buffer_pool().contains(PageId::heap(table_id, 2)));

        t2.commit().unwrap();
        t3.commit().unwrap();
    }
}
