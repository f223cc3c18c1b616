use slotmap::{SlotMap, new_key_type};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::order::order::OrderHandle;
use crate::domain::utils::id::OrderId;
use crate::domain::utils::lock;

new_key_type! {
    struct NodeKey;
}

#[derive(Debug)]
struct Node {
    handle: OrderHandle,
    prev: Option<NodeKey>,
    next: Option<NodeKey>,
}

#[derive(Debug, Default)]
struct ListInner {
    /// Node arena. Keys carry a generation, so a stale key never aliases a
    /// node appended later into the same slot.
    nodes: SlotMap<NodeKey, Node>,

    /// Lookup of the node holding a given order, for O(1) removal.
    index: HashMap<OrderId, NodeKey>,

    head: Option<NodeKey>,
    tail: Option<NodeKey>,

    /// Node the next call to `next()` returns. `None` means the sweep reached the end.
    current: Option<NodeKey>,
}

/// Insertion-ordered list of orders with a roaming cursor.
///
/// One consumer walks the list with [`next`](Self::next) while other threads
/// append and remove. Structure and cursor live behind a single mutex that is
/// only held for the duration of one call, never across calls.
#[derive(Debug, Default)]
pub struct SynchronizedOrderList {
    inner: Mutex<ListInner>,
}

impl SynchronizedOrderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the order at the tail.
    ///
    /// If the cursor already ran past the end, it is moved onto the new node
    /// so the running sweep still picks the order up.
    ///
    /// # Returns
    /// `false` if the order was already in the list (nothing is appended).
    pub fn append(&self, handle: OrderHandle) -> bool {
        let mut guard = lock::lock(&self.inner);
        let inner = &mut *guard;

        if inner.index.contains_key(handle.id()) {
            return false;
        }

        let order_id = handle.id().clone();
        let previous_tail = inner.tail;
        let key = inner.nodes.insert(Node { handle, prev: previous_tail, next: None });

        match previous_tail {
            Some(tail) => {
                if let Some(node) = inner.nodes.get_mut(tail) {
                    node.next = Some(key);
                }
            }
            None => inner.head = Some(key),
        }
        inner.tail = Some(key);
        inner.index.insert(order_id, key);

        if inner.current.is_none() {
            inner.current = Some(key);
        }

        true
    }

    /// Removes the order from the list. Removing the node under the cursor
    /// moves the cursor to the following node.
    ///
    /// # Returns
    /// `true` if the order was present.
    pub fn remove(&self, order_id: &OrderId) -> bool {
        let mut guard = lock::lock(&self.inner);
        let inner = &mut *guard;

        let Some(key) = inner.index.remove(order_id) else {
            return false;
        };
        let Some(node) = inner.nodes.remove(key) else {
            return false;
        };

        match node.prev {
            Some(prev) => {
                if let Some(prev_node) = inner.nodes.get_mut(prev) {
                    prev_node.next = node.next;
                }
            }
            None => inner.head = node.next,
        }
        match node.next {
            Some(next) => {
                if let Some(next_node) = inner.nodes.get_mut(next) {
                    next_node.prev = node.prev;
                }
            }
            None => inner.tail = node.prev,
        }

        if inner.current == Some(key) {
            inner.current = node.next;
        }

        true
    }

    /// Returns the order under the cursor and advances it.
    ///
    /// # Returns
    /// `None` once the cursor reached the end of the list; it stays there
    /// until [`reset_cursor`](Self::reset_cursor) or a new append.
    pub fn next(&self) -> Option<OrderHandle> {
        let mut guard = lock::lock(&self.inner);
        let inner = &mut *guard;

        let key = inner.current?;
        match inner.nodes.get(key) {
            Some(node) => {
                inner.current = node.next;
                Some(node.handle.clone())
            }
            None => {
                inner.current = None;
                None
            }
        }
    }

    pub fn reset_cursor(&self) {
        let mut guard = lock::lock(&self.inner);
        guard.current = guard.head;
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        lock::lock(&self.inner).index.contains_key(order_id)
    }

    pub fn len(&self) -> usize {
        lock::lock(&self.inner).index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Order ids from head to tail.
    pub fn order_ids(&self) -> Vec<OrderId> {
        let guard = lock::lock(&self.inner);
        let mut ids = Vec::with_capacity(guard.index.len());
        let mut cursor = guard.head;
        while let Some(key) = cursor {
            let Some(node) = guard.nodes.get(key) else { break };
            ids.push(node.handle.id().clone());
            cursor = node.next;
        }
        ids
    }
}
