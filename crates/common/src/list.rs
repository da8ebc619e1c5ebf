//! Owned, ordered, doubly linked list
//!
//! Values live in a slot arena owned by the list; `prev`/`next` links are list
//! private and addressed through generational [`NodeId`] handles. A handle to a
//! removed element never aliases a later element: every operation given a stale
//! handle is a no-op.
//!
//! Invariants kept by every mutator:
//! - `first` and `last` are both `None` iff the list is empty
//! - `prev(first)` and `next(last)` are `None`
//! - walking `next` from `first` and `prev` from `last` visit the same `len` nodes
//!
//! Dropping the list drops the remaining values tail first.

use std::fmt;
use std::iter::FusedIterator;

/// Handle to an element of a [`List`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: usize,
    generation: u64,
}

struct Node<T> {
    value: T,
    prev: Option<usize>,
    next: Option<usize>,
}

struct Slot<T> {
    generation: u64,
    node: Option<Node<T>>,
}

pub struct List<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    first: Option<usize>,
    last: Option<usize>,
    len: usize,
}

impl<T> List<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            first: None,
            last: None,
            len: 0,
        }
    }

    /// Number of elements (cached)
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append after the current tail
    pub fn add(&mut self, value: T) -> NodeId {
        let index = self.alloc(value, self.last, None);
        match self.last {
            Some(last) => self.node_mut(last).next = Some(index),
            None => self.first = Some(index),
        }
        self.last = Some(index);
        self.id_of(index)
    }

    /// Prepend before the current head
    pub fn add_first(&mut self, value: T) -> NodeId {
        let index = self.alloc(value, None, self.first);
        match self.first {
            Some(first) => self.node_mut(first).prev = Some(index),
            None => self.last = Some(index),
        }
        self.first = Some(index);
        self.id_of(index)
    }

    /// Insert immediately after `after`
    ///
    /// `None` or a stale handle inserts at the head.
    pub fn insert_after(&mut self, value: T, after: Option<NodeId>) -> NodeId {
        let Some(after) = after.and_then(|id| self.resolve(id)) else {
            return self.add_first(value);
        };

        let next = self.node(after).next;
        let index = self.alloc(value, Some(after), next);
        match next {
            Some(next) => self.node_mut(next).prev = Some(index),
            None => self.last = Some(index),
        }
        self.node_mut(after).next = Some(index);
        self.id_of(index)
    }

    /// Unlink an element and hand it back to the caller
    pub fn extract(&mut self, id: NodeId) -> Option<T> {
        let index = self.resolve(id)?;
        Some(self.unlink(index))
    }

    /// Drop the head element; no-op on an empty list
    pub fn delete_first(&mut self) {
        if let Some(first) = self.first {
            drop(self.unlink(first));
        }
    }

    /// Unlink and return the head element
    pub fn pop_first(&mut self) -> Option<T> {
        let first = self.first?;
        Some(self.unlink(first))
    }

    /// Unlink and return the tail element
    pub fn pop_last(&mut self) -> Option<T> {
        let last = self.last?;
        Some(self.unlink(last))
    }

    /// Drop every element, tail first
    pub fn clear(&mut self) {
        while self.pop_last().is_some() {}
    }

    /// Reverse the order in place
    pub fn reverse(&mut self) {
        let mut cursor = self.first;
        while let Some(index) = cursor {
            let node = self.node_mut(index);
            std::mem::swap(&mut node.prev, &mut node.next);
            // old `next` is now in `prev`
            cursor = node.prev;
        }
        std::mem::swap(&mut self.first, &mut self.last);
    }

    pub fn first(&self) -> Option<NodeId> {
        self.first.map(|index| self.id_of(index))
    }

    pub fn last(&self) -> Option<NodeId> {
        self.last.map(|index| self.id_of(index))
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        let index = self.resolve(id)?;
        self.node(index).next.map(|next| self.id_of(next))
    }

    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        let index = self.resolve(id)?;
        self.node(index).prev.map(|prev| self.id_of(prev))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.resolve(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        let index = self.resolve(id)?;
        Some(&self.node(index).value)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        let index = self.resolve(id)?;
        Some(&mut self.node_mut(index).value)
    }

    pub fn front(&self) -> Option<&T> {
        self.first.map(|index| &self.node(index).value)
    }

    pub fn back(&self) -> Option<&T> {
        self.last.map(|index| &self.node(index).value)
    }

    /// Handles of all elements, head to tail
    ///
    /// Stays valid across `get_mut` calls, so it doubles as a mutable cursor.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(self.len);
        let mut cursor = self.first;
        while let Some(index) = cursor {
            ids.push(self.id_of(index));
            cursor = self.node(index).next;
        }
        ids
    }

    /// First element matching `predicate`, scanning from the head
    pub fn position<F>(&self, mut predicate: F) -> Option<NodeId>
    where
        F: FnMut(&T) -> bool,
    {
        let mut cursor = self.first;
        while let Some(index) = cursor {
            let node = self.node(index);
            if predicate(&node.value) {
                return Some(self.id_of(index));
            }
            cursor = node.next;
        }
        None
    }

    /// Head-to-tail iterator; `rev()` walks the `prev` links from the tail
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            front: self.first,
            back: self.last,
            remaining: self.len,
        }
    }

    fn alloc(&mut self, value: T, prev: Option<usize>, next: Option<usize>) -> usize {
        let node = Node { value, prev, next };
        self.len += 1;
        match self.free.pop() {
            Some(index) => {
                self.slots[index].node = Some(node);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                self.slots.len() - 1
            }
        }
    }

    fn unlink(&mut self, index: usize) -> T {
        let slot = &mut self.slots[index];
        let node = slot
            .node
            .take()
            .unwrap_or_else(|| unreachable!("unlink of vacant slot {index}"));
        slot.generation += 1;
        self.free.push(index);
        self.len -= 1;

        match node.prev {
            Some(prev) => self.node_mut(prev).next = node.next,
            None => self.first = node.next,
        }
        match node.next {
            Some(next) => self.node_mut(next).prev = node.prev,
            None => self.last = node.prev,
        }
        node.value
    }

    fn resolve(&self, id: NodeId) -> Option<usize> {
        let slot = self.slots.get(id.index)?;
        (slot.generation == id.generation && slot.node.is_some()).then_some(id.index)
    }

    fn id_of(&self, index: usize) -> NodeId {
        NodeId {
            index,
            generation: self.slots[index].generation,
        }
    }

    fn node(&self, index: usize) -> &Node<T> {
        self.slots[index]
            .node
            .as_ref()
            .unwrap_or_else(|| unreachable!("linked index {index} is vacant"))
    }

    fn node_mut(&mut self, index: usize) -> &mut Node<T> {
        self.slots[index]
            .node
            .as_mut()
            .unwrap_or_else(|| unreachable!("linked index {index} is vacant"))
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for List<T> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: Clone> Clone for List<T> {
    /// Deep copy in list order; handles of `self` are not valid in the copy
    fn clone(&self) -> Self {
        self.iter().cloned().collect()
    }
}

impl<T: fmt::Debug> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T> FromIterator<T> for List<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = List::new();
        list.extend(iter);
        list
    }
}

impl<T> Extend<T> for List<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Borrowing iterator over a [`List`]
pub struct Iter<'a, T> {
    list: &'a List<T>,
    front: Option<usize>,
    back: Option<usize>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.list.node(self.front?);
        self.front = node.next;
        self.remaining -= 1;
        Some(&node.value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let node = self.list.node(self.back?);
        self.back = node.prev;
        self.remaining -= 1;
        Some(&node.value)
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

impl<T> FusedIterator for Iter<'_, T> {}
