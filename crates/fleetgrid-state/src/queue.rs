//! FIFO queues of instances waiting to start or stop.
//!
//! Only the head of a queue is ever acted upon. Membership checks happen
//! under the same lock as the push that depends on them, so an instance can
//! never be enrolled twice.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::types::InstanceId;

/// Outcome of pushing onto a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enqueued {
    /// The queue was empty; the caller must start acting on this instance.
    Head,
    /// Waiting behind `position` earlier entries.
    Behind(usize),
    /// Already enrolled; nothing changed.
    AlreadyQueued,
}

/// Outcome of removing an entry from a queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRemoval {
    /// Whether the removed entry was at the head.
    pub was_head: bool,
    /// The head after removal, if the removed entry was the head.
    pub promoted: Option<InstanceId>,
}

pub struct InstanceQueue {
    name: &'static str,
    entries: Mutex<VecDeque<InstanceId>>,
}

impl InstanceQueue {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Append unless already present.
    pub fn push(&self, id: &InstanceId) -> Enqueued {
        let mut entries = self.entries.lock();
        if entries.contains(id) {
            return Enqueued::AlreadyQueued;
        }
        entries.push_back(id.clone());
        match entries.len() {
            1 => Enqueued::Head,
            n => Enqueued::Behind(n - 1),
        }
    }

    /// Remove `id` wherever it sits. Returns `None` if it was not queued.
    pub fn remove(&self, id: &InstanceId) -> Option<QueueRemoval> {
        let mut entries = self.entries.lock();
        let pos = entries.iter().position(|e| e == id)?;
        entries.remove(pos);
        let was_head = pos == 0;
        Some(QueueRemoval {
            was_head,
            promoted: if was_head { entries.front().cloned() } else { None },
        })
    }

    /// Drop every entry matching `pred`, returning the removed ids in order.
    ///
    /// The head is never dropped: it is already being acted upon.
    pub fn purge_waiting<F>(&self, mut pred: F) -> Vec<InstanceId>
    where
        F: FnMut(&InstanceId) -> bool,
    {
        let mut entries = self.entries.lock();
        let mut purged = Vec::new();
        let mut idx = 1;
        while idx < entries.len() {
            if pred(&entries[idx]) {
                if let Some(id) = entries.remove(idx) {
                    purged.push(id);
                }
            } else {
                idx += 1;
            }
        }
        purged
    }

    pub fn head(&self) -> Option<InstanceId> {
        self.entries.lock().front().cloned()
    }

    pub fn is_head(&self, id: &InstanceId) -> bool {
        self.entries.lock().front() == Some(id)
    }

    pub fn contains(&self, id: &InstanceId) -> bool {
        self.entries.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Queue contents in order.
    pub fn snapshot(&self) -> Vec<InstanceId> {
        self.entries.lock().iter().cloned().collect()
    }
}
