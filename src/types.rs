use std::sync::{Arc, RwLock};

use crate::error::SmallError;

// Type alias, not a new type: cannot define methods on it, but every
// shared-and-mutable piece of process state in this crate (buffer pool,
// catalog, lock manager, table stats) is one of these.
pub type Pod<T> = Arc<RwLock<T>>;

pub type ResultPod<T> = Result<Pod<T>, SmallError>;

pub use crate::error::SmallResult;
