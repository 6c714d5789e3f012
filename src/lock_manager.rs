use std::collections::{HashMap, HashSet};
use std::sync::{Condvar, Mutex};

use crate::error::SmallError;
use crate::page_id::PageId;
use crate::transaction::TransactionId;
use crate::types::SmallResult;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LockType {
    Shared,
    Exclusive,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    pub fn to_lock(&self) -> LockType {
        match self {
            Permission::ReadOnly => LockType::Shared,
            Permission::ReadWrite => LockType::Exclusive,
        }
    }
}

/// Who is waiting for whom: an edge `from -> to` means `from` cannot
/// proceed until `to` releases. Kept as two plain maps, not object
/// references, so the structure stays acyclic-checkable without any
/// transaction holding a reference to another.
#[derive(Default)]
struct WaitForGraph {
    edges: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl WaitForGraph {
    fn add_edge(&mut self, from: TransactionId, to: TransactionId) {
        if from == to {
            return;
        }
        self.edges.entry(from).or_insert_with(HashSet::new).insert(to);
    }

    fn remove_waiter(&mut self, tx: TransactionId) {
        self.edges.remove(&tx);
        for set in self.edges.values_mut() {
            set.remove(&tx);
        }
    }

    fn has_cycle(&self) -> bool {
        let mut visited = HashSet::new();
        let mut stack = HashSet::new();
        for &start in self.edges.keys() {
            if self.is_cyclic(start, &mut visited, &mut stack) {
                return true;
            }
        }
        false
    }

    fn is_cyclic(
        &self,
        tx: TransactionId,
        visited: &mut HashSet<TransactionId>,
        stack: &mut HashSet<TransactionId>,
    ) -> bool {
        if stack.contains(&tx) {
            return true;
        }
        if visited.contains(&tx) {
            return false;
        }
        visited.insert(tx);
        stack.insert(tx);
        if let Some(waiting_on) = self.edges.get(&tx) {
            for &other in waiting_on {
                if self.is_cyclic(other, visited, stack) {
                    return true;
                }
            }
        }
        stack.remove(&tx);
        false
    }
}

struct State {
    shared_holders: HashMap<PageId, HashSet<TransactionId>>,
    exclusive_holder: HashMap<PageId, TransactionId>,
    held_by_tx: HashMap<TransactionId, HashSet<PageId>>,
    wait_for: WaitForGraph,
}

/// Page-granularity strict two-phase lock manager. `acquire` blocks the
/// calling thread on a condition variable until the lock is granted or
/// a deadlock is detected; on deadlock the requester (not a lock
/// holder) is the one that receives `TransactionAborted` and must call
/// `transaction.abort()`.
pub struct LockManager {
    state: Mutex<State>,
    cvar: Condvar,
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                shared_holders: HashMap::new(),
                exclusive_holder: HashMap::new(),
                held_by_tx: HashMap::new(),
                wait_for: WaitForGraph::default(),
            }),
            cvar: Condvar::new(),
        }
    }

    fn current_mode(state: &State, tx: TransactionId, page_id: PageId) -> Option<LockType> {
        if state.exclusive_holder.get(&page_id) == Some(&tx) {
            return Some(LockType::Exclusive);
        }
        if state
            .shared_holders
            .get(&page_id)
            .map_or(false, |holders| holders.contains(&tx))
        {
            return Some(LockType::Shared);
        }
        None
    }

    /// True iff `tx` is a holder of `page_id` at at least `mode` (X implies
    /// S).
    pub fn holds_lock(&self, tx: TransactionId, page_id: PageId, mode: LockType) -> bool {
        let state = self.state.lock().unwrap();
        match Self::current_mode(&state, tx, page_id) {
            Some(LockType::Exclusive) => true,
            Some(LockType::Shared) => mode == LockType::Shared,
            None => false,
        }
    }

    /// Pages currently locked by `tx`, paired with the mode held.
    pub fn locked_pages(&self, tx: TransactionId) -> Vec<(PageId, LockType)> {
        let state = self.state.lock().unwrap();
        state
            .held_by_tx
            .get(&tx)
            .map(|pages| {
                pages
                    .iter()
                    .map(|&pid| (pid, Self::current_mode(&state, tx, pid).unwrap()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Block until `tx` holds `lock` on `page_id`, or return
    /// `TransactionAborted` if granting it would deadlock.
    pub fn acquire(
        &self,
        tx: TransactionId,
        page_id: PageId,
        lock: LockType,
    ) -> SmallResult {
        let mut state = self.state.lock().unwrap();
        loop {
            if Self::try_grant(&mut state, tx, page_id, lock) {
                state.wait_for.remove_waiter(tx);
                return Ok(());
            }

            Self::add_wait_edges(&mut state, tx, page_id, lock);
            if state.wait_for.has_cycle() {
                state.wait_for.remove_waiter(tx);
                return Err(SmallError::transaction_aborted(format!(
                    "{} would deadlock acquiring {:?} on {}",
                    tx, lock, page_id
                )));
            }

            state = self.cvar.wait(state).unwrap();
        }
    }

    fn add_wait_edges(state: &mut State, tx: TransactionId, page_id: PageId, lock: LockType) {
        if let Some(&holder) = state.exclusive_holder.get(&page_id) {
            state.wait_for.add_edge(tx, holder);
        }
        if lock == LockType::Exclusive {
            if let Some(holders) = state.shared_holders.get(&page_id) {
                for &holder in holders {
                    state.wait_for.add_edge(tx, holder);
                }
            }
        }
    }

    fn try_grant(state: &mut State, tx: TransactionId, page_id: PageId, lock: LockType) -> bool {
        if let Some(&holder) = state.exclusive_holder.get(&page_id) {
            return holder == tx;
        }

        match lock {
            LockType::Shared => {
                state
                    .shared_holders
                    .entry(page_id)
                    .or_insert_with(HashSet::new)
                    .insert(tx);
            }
            LockType::Exclusive => {
                if let Some(holders) = state.shared_holders.get(&page_id) {
                    if holders.iter().any(|&h| h != tx) {
                        return false;
                    }
                }
                state.shared_holders.remove(&page_id);
                state.exclusive_holder.insert(page_id, tx);
            }
        }

        state
            .held_by_tx
            .entry(tx)
            .or_insert_with(HashSet::new)
            .insert(page_id);
        true
    }

    /// Release every lock `tx` holds, at commit or abort.
    pub fn release_all(&self, tx: TransactionId) {
        let mut state = self.state.lock().unwrap();
        if let Some(pages) = state.held_by_tx.remove(&tx) {
            for page_id in pages {
                if let Some(holders) = state.shared_holders.get_mut(&page_id) {
                    holders.remove(&tx);
                    if holders.is_empty() {
                        state.shared_holders.remove(&page_id);
                    }
                }
                if state.exclusive_holder.get(&page_id) == Some(&tx) {
                    state.exclusive_holder.remove(&page_id);
                }
            }
        }
        state.wait_for.remove_waiter(tx);
        drop(state);
        self.cvar.notify_all();
    }

    /// Remove `tx` from `page_id`'s holders. Contract violation to call
    /// this when `tx` does not hold the page; callers that hold the
    /// invariant (buffer pool, `release_all`) are the only callers.
    pub fn release(&self, tx: TransactionId, page_id: PageId) {
        let mut state = self.state.lock().unwrap();
        if let Some(holders) = state.shared_holders.get_mut(&page_id) {
            holders.remove(&tx);
            if holders.is_empty() {
                state.shared_holders.remove(&page_id);
            }
        }
        if state.exclusive_holder.get(&page_id) == Some(&tx) {
            state.exclusive_holder.remove(&page_id);
        }
        if let Some(pages) = state.held_by_tx.get_mut(&tx) {
            pages.remove(&page_id);
        }
        drop(state);
        self.cvar.notify_all();
    }
}
