use crate::field::Field;
use crate::tuple::Tuple;

/// A leaf node's payload: tuples kept sorted by the index's key field, plus
/// sibling links for ordered range scans without walking back up the tree.
pub struct LeafNode {
    pub parent: Option<usize>,
    pub left: Option<usize>,
    pub right: Option<usize>,
    pub tuples: Vec<Tuple>,
}

impl LeafNode {
    pub fn empty() -> Self {
        Self {
            parent: None,
            left: None,
            right: None,
            tuples: Vec::new(),
        }
    }
}

/// An internal node's payload. `keys[i]` is the maximum key present under
/// `children[i]`; `children[i+1]` holds everything strictly greater.
/// `child_is_leaf` tells a reader which slab (`Inner::leaves` vs
/// `Inner::internals`) the children live in, since the two live in
/// separate arenas.
pub struct InternalNode {
    pub parent: Option<usize>,
    pub child_is_leaf: bool,
    pub keys: Vec<Field>,
    pub children: Vec<usize>,
}

impl InternalNode {
    pub fn new(child_is_leaf: bool) -> Self {
        Self {
            parent: None,
            child_is_leaf,
            keys: Vec::new(),
            children: Vec::new(),
        }
    }
}

pub enum Node {
    Leaf(LeafNode),
    Internal(InternalNode),
}
