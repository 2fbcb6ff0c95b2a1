//! Read-receipt batching.
//!
//! The tracker only decides *which* ids still need a server notification. It never marks
//! anything read itself: that happens in the store once the server call succeeds, so a
//! failed call leaves local state untouched.

use std::collections::{BTreeSet, HashMap};

use crate::store::MessageStore;

#[derive(Debug, Default, Clone)]
struct ThreadReceipts {
    pending: BTreeSet<String>,
    in_flight: BTreeSet<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ReadReceiptTracker {
    threads: HashMap<String, ThreadReceipts>,
}

impl ReadReceiptTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the visible ids that still need a receipt: present in `store`, not authored
    /// by `local_user_id`, not yet read by them, not temporary, and not already queued
    /// or in flight. Returns how many were newly queued.
    pub fn queue_visible(
        &mut self,
        thread_id: &str,
        visible_ids: &[String],
        store: &MessageStore,
        local_user_id: &str,
    ) -> usize {
        let entry = self.threads.entry(thread_id.to_string()).or_default();
        let mut added = 0;
        for id in visible_ids {
            let Some(m) = store.get(id) else {
                continue;
            };
            if m.sender_id == local_user_id || m.is_temp() || m.is_read_by(local_user_id) {
                continue;
            }
            if entry.in_flight.contains(id) {
                continue;
            }
            if entry.pending.insert(id.clone()) {
                added += 1;
            }
        }
        added
    }

    pub fn has_pending(&self, thread_id: &str) -> bool {
        self.threads
            .get(thread_id)
            .is_some_and(|t| !t.pending.is_empty())
    }

    /// Move everything pending for `thread_id` into flight and return it.
    pub fn take_batch(&mut self, thread_id: &str) -> Option<Vec<String>> {
        let entry = self.threads.get_mut(thread_id)?;
        if entry.pending.is_empty() {
            return None;
        }
        let batch: Vec<String> = std::mem::take(&mut entry.pending).into_iter().collect();
        entry.in_flight.extend(batch.iter().cloned());
        Some(batch)
    }

    pub fn complete(&mut self, thread_id: &str, ids: &[String]) {
        self.settle(thread_id, ids);
    }

    /// Forget a failed batch. The ids become eligible again the next time they are seen.
    pub fn fail(&mut self, thread_id: &str, ids: &[String]) {
        self.settle(thread_id, ids);
    }

    fn settle(&mut self, thread_id: &str, ids: &[String]) {
        let Some(entry) = self.threads.get_mut(thread_id) else {
            return;
        };
        for id in ids {
            entry.in_flight.remove(id);
        }
        if entry.pending.is_empty() && entry.in_flight.is_empty() {
            self.threads.remove(thread_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::test_util::msg;

    fn store() -> MessageStore {
        let mut read = msg("m4", "bob", 4);
        read.read_by_user_ids.insert("me".into());
        MessageStore::from_messages(&[
            msg("m1", "bob", 1),
            msg("m2", "me", 2),
            msg("m3", "bob", 3),
            read,
            msg("temp-5", "bob", 5),
        ])
    }

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn queues_only_unread_inbound() {
        let mut tracker = ReadReceiptTracker::new();
        let visible = ids(&["m1", "m2", "m3", "m4", "temp-5", "missing"]);
        assert_eq!(tracker.queue_visible("t", &visible, &store(), "me"), 2);
        assert_eq!(tracker.take_batch("t"), Some(ids(&["m1", "m3"])));
        assert_eq!(tracker.take_batch("t"), None);
    }

    #[test]
    fn in_flight_ids_are_not_requeued() {
        let mut tracker = ReadReceiptTracker::new();
        let s = store();
        tracker.queue_visible("t", &ids(&["m1"]), &s, "me");
        let batch = tracker.take_batch("t").unwrap_or_default();

        assert_eq!(tracker.queue_visible("t", &ids(&["m1", "m3"]), &s, "me"), 1);
        tracker.complete("t", &batch);
        assert_eq!(tracker.take_batch("t"), Some(ids(&["m3"])));
    }

    #[test]
    fn failed_batch_can_be_retried() {
        let mut tracker = ReadReceiptTracker::new();
        let s = store();
        tracker.queue_visible("t", &ids(&["m1"]), &s, "me");
        let batch = tracker.take_batch("t").unwrap_or_default();
        tracker.fail("t", &batch);
        assert!(!tracker.has_pending("t"));

        assert_eq!(tracker.queue_visible("t", &ids(&["m1"]), &s, "me"), 1);
        assert!(tracker.has_pending("t"));
    }

    #[test]
    fn threads_are_independent() {
        let mut tracker = ReadReceiptTracker::new();
        let s = store();
        tracker.queue_visible("a", &ids(&["m1"]), &s, "me");
        tracker.queue_visible("b", &ids(&["m3"]), &s, "me");
        let a = tracker.take_batch("a").unwrap_or_default();
        tracker.complete("a", &a);
        assert!(!tracker.has_pending("a"));
        assert_eq!(tracker.take_batch("b"), Some(ids(&["m3"])));
    }
}
