//! A one-to-one map that can be searched from either side.

use std::collections::HashMap;
use std::hash::Hash;

/// Two hash maps kept in lockstep.
///
/// Each left value pairs with at most one right value and vice versa.
/// Inserting a pair drops any earlier pairing of either side.
#[derive(Debug, Clone)]
pub struct BiMap<L, R> {
    by_left: HashMap<L, R>,
    by_right: HashMap<R, L>,
}

impl<L, R> Default for BiMap<L, R> {
    fn default() -> Self {
        Self {
            by_left: HashMap::new(),
            by_right: HashMap::new(),
        }
    }
}

impl<L, R> BiMap<L, R>
where
    L: Eq + Hash + Clone,
    R: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, left: L, right: R) {
        self.remove_by_left(&left);
        self.remove_by_right(&right);
        self.by_right.insert(right.clone(), left.clone());
        self.by_left.insert(left, right);
    }

    pub fn get_by_left(&self, left: &L) -> Option<&R> {
        self.by_left.get(left)
    }

    pub fn get_by_right(&self, right: &R) -> Option<&L> {
        self.by_right.get(right)
    }

    pub fn remove_by_left(&mut self, left: &L) -> Option<R> {
        let right = self.by_left.remove(left)?;
        self.by_right.remove(&right);
        Some(right)
    }

    pub fn remove_by_right(&mut self, right: &R) -> Option<L> {
        let left = self.by_right.remove(right)?;
        self.by_left.remove(&left);
        Some(left)
    }

    pub fn len(&self) -> usize {
        self.by_left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_left.is_empty()
    }
}
