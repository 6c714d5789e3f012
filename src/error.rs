use std::fmt;

use backtrace::Backtrace;

/// The four error kinds named by the engine's error-handling design:
/// a recoverable storage/query mistake, a deadlock-victim abort, an
/// underlying I/O failure, and a lookup miss.
#[derive(Debug)]
pub enum SmallError {
    /// Recoverable by the query layer: table mismatch, no evictable page,
    /// malformed tuple.
    DbException(String),
    /// Raised only by the lock manager on deadlock detection. Propagates
    /// through every operator; the caller must still call
    /// `transaction_complete(tx, false)`.
    TransactionAborted(String),
    /// Underlying storage failure, fatal to the current transaction.
    Io(String),
    /// Catalog lookup miss, or `next()` called past the end of an iterator.
    NoSuchElement(String),
}

impl SmallError {
    pub fn db_exception(msg: impl Into<String>) -> Self {
        SmallError::DbException(msg.into())
    }

    pub fn transaction_aborted(msg: impl Into<String>) -> Self {
        SmallError::TransactionAborted(msg.into())
    }

    pub fn no_such_element(msg: impl Into<String>) -> Self {
        SmallError::NoSuchElement(msg.into())
    }

    /// Render a backtrace at the point this is called, for debug logging.
    pub fn show_backtrace(&self) {
        log::debug!("{}\n{:?}", self, Backtrace::new());
    }

    pub fn is_transaction_aborted(&self) -> bool {
        matches!(self, SmallError::TransactionAborted(_))
    }
}

impl fmt::Display for SmallError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SmallError::DbException(msg) => write!(f, "db exception: {}", msg),
            SmallError::TransactionAborted(msg) => {
                write!(f, "transaction aborted: {}", msg)
            }
            SmallError::Io(msg) => write!(f, "io error: {}", msg),
            SmallError::NoSuchElement(msg) => {
                write!(f, "no such element: {}", msg)
            }
        }
    }
}

impl std::error::Error for SmallError {}

impl From<std::io::Error> for SmallError {
    fn from(e: std::io::Error) -> Self {
        SmallError::Io(e.to_string())
    }
}

/// Shorthand used throughout the engine for fallible operations that carry
/// no success payload.
pub type SmallResult = Result<(), SmallError>;
