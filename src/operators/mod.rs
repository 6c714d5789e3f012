mod aggregate;
mod aggregator;
mod delete;
mod filter;
mod insert;
mod join;
mod seq_scan;

pub use aggregate::Aggregate;
pub use aggregator::AggOp;
pub use delete::Delete;
pub use filter::Filter;
pub use insert::Insert;
pub use join::Join;
pub use seq_scan::SeqScan;

use std::sync::Arc;

use crate::error::SmallError;
use crate::row::Schema;
use crate::tuple::Tuple;

/// The pull-iterator contract every operator implements: `next` is only
/// ever called after a positive `has_next`, `has_next` may cache one
/// look-ahead tuple and is idempotent, `rewind` restarts from the first
/// tuple, and `close` releases child iterators. There is no `getChildren`/
/// `setChildren` capability here — the operator tree is built and wired up
/// front as owned `Box<dyn OpIterator>` trees rather than rewired after
/// construction, since this crate has no query planner that would need to
/// graft subtrees onto an already-built plan.
pub trait OpIterator {
    fn open(&mut self) -> Result<(), SmallError>;
    fn has_next(&mut self) -> Result<bool, SmallError>;
    fn next(&mut self) -> Result<Tuple, SmallError>;
    fn close(&mut self);
    fn rewind(&mut self) -> Result<(), SmallError>;
    fn get_tuple_desc(&self) -> Arc<Schema>;
}
