//! Ordered, deduplicated message collection for the active thread.
//!
//! Every write path (first page, older page, push delivery, optimistic swap) goes through
//! [`merge_messages`]. The output order is a pure function of the record set: ascending
//! `created_at`, ties broken by id, so the same set renders in the same order no matter
//! which stream delivered what first.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::message::Message;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageStore {
    messages: Vec<Message>,
}

/// Merge `incoming` into `current`, returning a new ordered, id-unique collection.
///
/// Records sharing an id are combined with [`Message::merged_with`]. Total over
/// well-formed input; duplicate ids inside `incoming` fold left to right.
pub fn merge_messages(current: &[Message], incoming: &[Message]) -> Vec<Message> {
    let mut out: Vec<Message> = Vec::with_capacity(current.len() + incoming.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(out.capacity());

    for m in current.iter().chain(incoming.iter()) {
        match index.get(&m.id) {
            Some(&pos) => {
                let merged = out[pos].merged_with(m);
                out[pos] = merged;
            }
            None => {
                index.insert(m.id.clone(), out.len());
                out.push(m.clone());
            }
        }
    }

    sort_messages(&mut out);
    out
}

/// Chronological by `created_at`. Equal timestamps are ordered by id, not by arrival, so
/// the result is the same whichever source delivered a record first.
fn sort_messages(messages: &mut [Message]) {
    messages.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: &[Message]) -> Self {
        Self {
            messages: merge_messages(&[], messages),
        }
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn merge(&mut self, incoming: &[Message]) {
        self.messages = merge_messages(&self.messages, incoming);
    }

    /// Merge only into an already-present record. Returns `false` when `incoming.id` is
    /// not in the collection, in which case nothing changes.
    pub fn merge_existing(&mut self, incoming: &Message) -> bool {
        let Some(pos) = self.messages.iter().position(|m| m.id == incoming.id) else {
            return false;
        };
        let merged = self.messages[pos].merged_with(incoming);
        self.messages[pos] = merged;
        sort_messages(&mut self.messages);
        true
    }

    /// Swap an optimistic record for its authoritative counterpart in one transition:
    /// the temporary id disappears and the server record is merge-inserted together, so
    /// no intermediate state ever shows zero or two copies.
    pub fn replace_temp(&mut self, temp_id: &str, authoritative: &Message) {
        let kept: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.id != temp_id)
            .cloned()
            .collect();
        self.messages = merge_messages(&kept, std::slice::from_ref(authoritative));
    }

    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let pos = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(pos))
    }

    /// Add `user_id` to the readers of each listed message. Returns how many records
    /// actually changed.
    pub fn mark_read_by(&mut self, message_ids: &[String], user_id: &str) -> usize {
        let mut changed = 0;
        for m in self.messages.iter_mut() {
            if message_ids.iter().any(|id| *id == m.id) && m.read_by_user_ids.insert(user_id.to_string())
            {
                changed += 1;
            }
        }
        changed
    }

    /// Inbound messages not yet read by `user_id`.
    pub fn unread_ids_for(&self, user_id: &str) -> Vec<String> {
        self.messages
            .iter()
            .filter(|m| m.sender_id != user_id && !m.is_temp() && !m.is_read_by(user_id))
            .map(|m| m.id.clone())
            .collect()
    }
}
