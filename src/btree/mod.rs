mod file;
mod node;

pub use file::{BTreeFile, BTreeIndexIterator, BTreeIterator};
pub use node::{InternalNode, LeafNode};
