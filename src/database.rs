use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use once_cell::sync::OnceCell;

use crate::buffer_pool::BufferPool;
use crate::catalog::Catalog;
use crate::lock_manager::LockManager;
use crate::statistics::TableStats;
use crate::util::HandyRwLock;

const DEFAULT_BUFFER_POOL_PAGES: usize = 50;

static DB: OnceCell<Database> = OnceCell::new();

/// The process-wide singleton: catalog, buffer pool, lock manager and the
/// table-stats map, constructed once at first access (or rebuilt wholesale
/// by `reset`, which exists for tests only). Every subsystem reaches it
/// through `Database::catalog()`/`buffer_pool()`/etc rather than taking
/// a reference to it directly.
pub struct Database {
    catalog: RwLock<Catalog>,
    buffer_pool: RwLock<BufferPool>,
    lock_manager: RwLock<LockManager>,
    stats: RwLock<HashMap<i32, TableStats>>,
}

impl Database {
    fn new() -> Self {
        Self {
            catalog: RwLock::new(Catalog::new()),
            buffer_pool: RwLock::new(BufferPool::new(DEFAULT_BUFFER_POOL_PAGES)),
            lock_manager: RwLock::new(LockManager::new()),
            stats: RwLock::new(HashMap::new()),
        }
    }

    pub fn global() -> &'static Database {
        DB.get_or_init(Database::new)
    }

    /// Rebuild catalog, buffer pool, lock manager and stats from scratch.
    /// Test-only: production lifetime is "constructed once, torn down
    /// never".
    pub fn reset() {
        let db = Database::global();
        *db.catalog.wl() = Catalog::new();
        *db.buffer_pool.wl() = BufferPool::new(DEFAULT_BUFFER_POOL_PAGES);
        *db.lock_manager.wl() = LockManager::new();
        db.stats.wl().clear();
    }

    /// Test-only: replace the buffer pool with an empty one of the given
    /// capacity.
    pub fn set_buffer_pool_capacity(capacity: usize) {
        *Database::global().buffer_pool.wl() = BufferPool::new(capacity);
    }

    pub fn catalog() -> RwLockReadGuard<'static, Catalog> {
        Database::global().catalog.rl()
    }

    pub fn mut_catalog() -> RwLockWriteGuard<'static, Catalog> {
        Database::global().catalog.wl()
    }

    /// Shared access is sufficient for every page operation: `BufferPool`
    /// serializes its own mutations internally and blocks on the lock
    /// manager from inside `with_heap_page_mut`. Handing it out as a
    /// write guard would hold the pool exclusively for the duration of
    /// that block, deadlocking any other transaction trying to reach the
    /// pool to make progress (including the lock holder trying to commit).
    pub fn buffer_pool() -> RwLockReadGuard<'static, BufferPool> {
        Database::global().buffer_pool.rl()
    }

    /// Shared access here too, for the same reason as `buffer_pool()`:
    /// `LockManager::acquire` blocks on its own condvar while holding
    /// whatever reference reached it. A write guard would let a blocked
    /// waiter starve every other transaction's `release_all` (itself
    /// needed to unblock that very waiter) out of the lock table.
    pub fn lock_manager() -> RwLockReadGuard<'static, LockManager> {
        Database::global().lock_manager.rl()
    }

    pub fn table_stats(table_id: i32) -> Option<TableStats> {
        Database::global().stats.rl().get(&table_id).cloned()
    }

    pub fn set_table_stats(table_id: i32, stats: TableStats) {
        Database::global().stats.wl().insert(table_id, stats);
    }
}
