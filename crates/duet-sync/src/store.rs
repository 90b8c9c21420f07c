//! Local current-value caches.
//!
//! Each store is written by two paths, the publish acknowledgment and the feed
//! echo, so applying the same row twice must be harmless. The merge rule is
//! "replace if the incoming row's `seq` is at least the held row's `seq`".

use std::sync::Arc;

use tokio::sync::watch;

use duet_types::{Memory, Record, Row};

use crate::bus::Delivery;

/// The most recent row of a single-row-latest table.
pub struct CurrentValue<T: Record> {
    tx: Arc<watch::Sender<Option<T>>>,
}

impl<T: Record> Clone for CurrentValue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T: Record> Default for CurrentValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> CurrentValue<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Apply a row under the merge rule. Returns true if the held row changed.
    pub fn apply(&self, row: T) -> bool {
        self.tx.send_if_modified(|held| match held {
            Some(current) if row.seq() < current.seq() => false,
            Some(current) => {
                let changed = row.seq() != current.seq();
                *current = row;
                changed
            }
            None => {
                *held = Some(row);
                true
            }
        })
    }

    /// Apply an untyped row; rows of other tables are ignored.
    pub fn apply_row(&self, row: Row) -> bool {
        T::from_row(row).is_some_and(|row| self.apply(row))
    }

    pub fn apply_delivery(&self, delivery: Delivery) -> bool {
        match delivery {
            Delivery::Snapshot(rows) => rows
                .into_iter()
                .fold(false, |changed, row| self.apply_row(row) | changed),
            Delivery::Insert(row) => self.apply_row(row),
        }
    }

    pub fn get(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<T>> {
        self.tx.subscribe()
    }
}

/// The memory gallery: newest `memory_date` first, at most `limit` entries,
/// deduplicated by memory id.
#[derive(Clone)]
pub struct RecentMemories {
    tx: Arc<watch::Sender<Vec<Memory>>>,
    limit: usize,
}

impl RecentMemories {
    pub fn new(limit: u32) -> Self {
        let (tx, _) = watch::channel(Vec::new());
        Self {
            tx: Arc::new(tx),
            limit: limit as usize,
        }
    }

    pub fn apply(&self, memory: Memory) -> bool {
        let limit = self.limit;
        self.tx.send_if_modified(|list| {
            if list.iter().any(|m| m.id == memory.id) {
                return false;
            }
            let id = memory.id.clone();
            list.push(memory);
            list.sort_by(|a, b| {
                b.memory_date
                    .cmp(&a.memory_date)
                    .then(b.seq.cmp(&a.seq))
            });
            list.truncate(limit);
            list.iter().any(|m| m.id == id)
        })
    }

    pub fn apply_delivery(&self, delivery: Delivery) -> bool {
        let rows = match delivery {
            Delivery::Snapshot(rows) => rows,
            Delivery::Insert(row) => vec![row],
        };
        rows.into_iter()
            .filter_map(Memory::from_row)
            .fold(false, |changed, memory| self.apply(memory) | changed)
    }

    pub fn get(&self) -> Vec<Memory> {
        self.tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Vec<Memory>> {
        self.tx.subscribe()
    }
}
