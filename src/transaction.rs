use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::{types::SmallResult, Database};

static NEXT_TRANSACTION_ID: AtomicU64 = AtomicU64::new(1);

/// A process-lifetime unique transaction identity. Monotonically
/// increasing; never reused, even across commit/abort.
#[derive(Eq, Hash, PartialEq, PartialOrd, Ord, Clone, Copy)]
pub struct TransactionId(u64);

impl TransactionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub fn for_test(id: u64) -> Self {
        TransactionId(id)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tx_{}", self.0)
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// A handle to one transaction. No write-ahead log is kept: `abort`
/// discards the transaction's dirty pages from the buffer pool rather
/// than replaying undo records, and `commit` simply flushes them.
#[derive(Eq, Hash, PartialEq, Clone, Copy)]
pub struct Transaction {
    id: TransactionId,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            id: TransactionId(NEXT_TRANSACTION_ID.fetch_add(1, Ordering::Relaxed)),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn commit(&self) -> SmallResult {
        Database::buffer_pool().transaction_complete(self.id, true)?;
        Database::lock_manager().release_all(self.id);
        Ok(())
    }

    pub fn abort(&self) -> SmallResult {
        Database::buffer_pool().transaction_complete(self.id, false)?;
        Database::lock_manager().release_all(self.id);
        Ok(())
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
