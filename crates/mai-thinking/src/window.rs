use mai_core::ConversationItem;
use std::collections::VecDeque;
use std::sync::Arc;

/// Bounded FIFO of the most recent conversation items of one flow.
///
/// Pushing past capacity evicts the oldest item.
#[derive(Debug, Clone)]
pub struct ObservationWindow {
    items: VecDeque<Arc<ConversationItem>>,
    capacity: usize,
}

impl ObservationWindow {
    /// A capacity of 0 is raised to 1. Flow settings with a zero window are
    /// rejected by [`FlowSettings::validate`](crate::FlowSettings::validate).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append an item, returning the evicted head if the window was full.
    pub fn push(&mut self, item: Arc<ConversationItem>) -> Option<Arc<ConversationItem>> {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Replace the contents with `items` (oldest first), keeping only the last `capacity`.
    pub fn refill(&mut self, items: impl IntoIterator<Item = Arc<ConversationItem>>) {
        self.items.clear();
        for item in items {
            self.push(item);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&Arc<ConversationItem>> {
        self.items.back()
    }

    /// Copy of the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Arc<ConversationItem>> {
        self.items.iter().cloned().collect()
    }

    /// Items that have not been given a storage id yet, oldest first.
    pub fn unsaved(&self) -> Vec<Arc<ConversationItem>> {
        self.items.iter().filter(|i| i.id == 0).cloned().collect()
    }

    /// Swap in stored copies of items that were persisted.
    ///
    /// Each pair is an item previously returned by [`unsaved`](Self::unsaved)
    /// and the id storage gave it. Items evicted in the meantime are ignored.
    pub fn mark_saved(&mut self, saved: &[(Arc<ConversationItem>, i64)]) {
        for slot in self.items.iter_mut() {
            if let Some((_, id)) = saved.iter().find(|(item, _)| Arc::ptr_eq(item, slot)) {
                *slot = Arc::new((**slot).clone().with_id(*id));
            }
        }
    }
}
