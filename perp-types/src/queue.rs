//! FIFO of active bond instances with O(1) membership.
//!
//! A ring buffer holds the order and a hash set mirrors it for membership.
//! Only the ordered list is serialized; the set is rebuilt on load so the
//! encoding stays deterministic.

use crate::address::Address;
use crate::error::{ReserveError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(from = "Vec<Address>", into = "Vec<Address>")]
pub struct BondQueue {
    items: VecDeque<Address>,
    members: HashSet<Address>,
}

impl From<Vec<Address>> for BondQueue {
    fn from(items: Vec<Address>) -> Self {
        let mut queue = Self::new();
        for bond in items {
            // A duplicate in stored data keeps its first position.
            let _ = queue.enqueue(bond);
        }
        queue
    }
}

impl From<BondQueue> for Vec<Address> {
    fn from(queue: BondQueue) -> Self {
        queue.items.into()
    }
}

impl BondQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets to empty.
    pub fn init(&mut self) {
        self.items.clear();
        self.members.clear();
    }

    pub fn enqueue(&mut self, bond: Address) -> Result<()> {
        if !self.members.insert(bond) {
            return Err(ReserveError::DuplicateItem(bond));
        }
        self.items.push_back(bond);
        Ok(())
    }

    pub fn dequeue(&mut self) -> Result<Address> {
        let bond = self.items.pop_front().ok_or(ReserveError::EmptyQueue)?;
        self.members.remove(&bond);
        Ok(bond)
    }

    /// Oldest bond, `None` on an empty queue.
    pub fn head(&self) -> Option<Address> {
        self.items.front().copied()
    }

    /// Newest bond, `None` on an empty queue.
    pub fn tail(&self) -> Option<Address> {
        self.items.back().copied()
    }

    pub fn contains(&self, bond: &Address) -> bool {
        self.members.contains(bond)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `at(0)` is the head.
    pub fn at(&self, index: usize) -> Result<Address> {
        self.items.get(index).copied().ok_or(ReserveError::IndexOutOfBounds {
            index,
            len: self.items.len(),
        })
    }

    /// Head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &Address> + '_ {
        self.items.iter()
    }
}
