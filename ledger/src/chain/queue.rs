// ledger/src/chain/queue.rs

//! Pending message queue: FIFO order with constant-time duplicate checks.

use std::collections::{HashSet, VecDeque};

use crate::types::{Message, MessageId};

/// Ordered, duplicate-free holding area for messages awaiting inclusion.
///
/// Arrival order is preserved so miners drain oldest-first; a membership
/// index keeps the duplicate check O(1) instead of scanning the deque.
/// Both structures always agree: an id is in `index` iff it is in `entries`.
#[derive(Debug, Default)]
pub struct MessageQueue {
    entries: VecDeque<(MessageId, Message)>,
    index: HashSet<MessageId>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if a message with this id is currently queued.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.index.contains(id)
    }

    /// Appends a message, unless one with the same id is already queued.
    ///
    /// Returns `false` (and leaves the queue untouched) on a duplicate.
    pub fn push(&mut self, id: MessageId, message: Message) -> bool {
        if !self.index.insert(id) {
            return false;
        }
        self.entries.push_back((id, message));
        true
    }

    /// Removes and returns the oldest `batch_size` messages, or `None`
    /// (leaving the queue untouched) if fewer are queued.
    pub fn take_batch(&mut self, batch_size: usize) -> Option<Vec<(MessageId, Message)>> {
        if self.entries.len() < batch_size {
            return None;
        }
        let batch: Vec<_> = self.entries.drain(..batch_size).collect();
        for (id, _) in &batch {
            self.index.remove(id);
        }
        Some(batch)
    }

    /// Drops every queued message whose id is in `ids`, preserving the
    /// relative order of the survivors.
    pub fn remove_all(&mut self, ids: &HashSet<MessageId>) {
        if ids.is_empty() {
            return;
        }
        self.entries.retain(|(id, _)| !ids.contains(id));
        self.index.retain(|id| !ids.contains(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PublicKey, Signature};

    fn dummy_entry(byte: u8) -> (MessageId, Message) {
        let message = Message {
            sender: PublicKey(vec![byte; 32]),
            timestamp: 1_700_000_000,
            payload: vec![byte],
            recipient: None,
            signature: Signature(vec![byte; 64]),
        };
        (message.compute_id(), message)
    }

    #[test]
    fn push_rejects_duplicate_ids() {
        let mut queue = MessageQueue::new();
        let (id, msg) = dummy_entry(1);
        assert!(queue.push(id, msg.clone()));
        assert!(!queue.push(id, msg));
        assert_eq!(queue.len(), 1);
        assert!(queue.contains(&id));
    }

    #[test]
    fn take_batch_needs_a_full_batch() {
        let mut queue = MessageQueue::new();
        let (id, msg) = dummy_entry(1);
        queue.push(id, msg);
        assert!(queue.take_batch(2).is_none());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn take_batch_drains_oldest_first_and_frees_ids() {
        let mut queue = MessageQueue::new();
        let ids: Vec<_> = (0..4u8)
            .map(|b| {
                let (id, msg) = dummy_entry(b);
                queue.push(id, msg);
                id
            })
            .collect();

        let batch = queue.take_batch(3).expect("enough queued");
        let batch_ids: Vec<_> = batch.iter().map(|(id, _)| *id).collect();
        assert_eq!(batch_ids, ids[..3]);
        assert_eq!(queue.len(), 1);

        // Taken ids are released: the same message may be queued again.
        let (id, msg) = dummy_entry(0);
        assert!(queue.push(id, msg));
    }

    #[test]
    fn remove_all_keeps_survivor_order() {
        let mut queue = MessageQueue::new();
        let ids: Vec<_> = (0..5u8)
            .map(|b| {
                let (id, msg) = dummy_entry(b);
                queue.push(id, msg);
                id
            })
            .collect();

        let doomed: HashSet<_> = [ids[1], ids[3]].into_iter().collect();
        queue.remove_all(&doomed);

        let remaining: Vec<_> = queue
            .take_batch(3)
            .expect("three survivors")
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(remaining, vec![ids[0], ids[2], ids[4]]);
        assert!(!queue.contains(&ids[1]));
    }
}
