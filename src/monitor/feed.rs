use std::collections::VecDeque;

use serde::Serialize;

use crate::events::{AttackAlert, SystemAlert};

/// Fixed-capacity history, newest entry first. Pushing into a full feed evicts
/// the oldest entry.
#[derive(Debug, Clone)]
pub struct BoundedFeed<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T: Clone> BoundedFeed<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        self.items.push_front(item);
        self.items.truncate(self.capacity);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.iter().cloned().collect()
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
}

/// Entry of the alert feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum Alert {
    Attack(AttackAlert),
    System(SystemAlert),
}
