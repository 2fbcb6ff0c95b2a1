//! Thread summaries as shown in the conversation list, and how inbound messages fold into
//! them.

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Message;
use crate::presence::PresenceUpdate;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.email.as_deref())
            .unwrap_or("Unknown user")
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSummary {
    pub id: String,
    #[serde(default)]
    pub participant: Option<Participant>,
    #[serde(default)]
    pub last_message: Option<Message>,
    #[serde(default)]
    pub unread_count: u32,
    pub updated_at: DateTime<Utc>,
}

impl ThreadSummary {
    /// Timestamp used for list ordering.
    pub fn activity_at(&self) -> DateTime<Utc> {
        self.last_message
            .as_ref()
            .map(|m| m.created_at)
            .unwrap_or(self.updated_at)
    }
}

/// Newest activity first. Ties fall back to id so the order is total.
pub fn sort_threads(threads: &mut [ThreadSummary]) {
    threads.sort_by(|a, b| match b.activity_at().cmp(&a.activity_at()) {
        Ordering::Equal => a.id.cmp(&b.id),
        other => other,
    });
}

/// Fold one inbound message into its thread's summary.
///
/// The summary's `last_message` and `updated_at` always follow the message. The unread
/// counter resets while the thread is being read (open and on screen), never moves for
/// our own messages, and otherwise grows by one. An open thread behind a hidden window
/// is not being read, so pass `None` for it.
pub fn fold_inbound(
    thread: &ThreadSummary,
    message: &Message,
    reading_thread_id: Option<&str>,
    local_user_id: &str,
) -> ThreadSummary {
    let is_reading = reading_thread_id == Some(thread.id.as_str());
    let unread_count = if is_reading {
        0
    } else if message.sender_id == local_user_id {
        thread.unread_count
    } else {
        thread.unread_count.saturating_add(1)
    };
    ThreadSummary {
        last_message: Some(message.clone()),
        unread_count,
        updated_at: message.created_at,
        ..thread.clone()
    }
}

/// Apply a refreshed thread list on top of the current one.
///
/// When the refreshed entry for `selected_thread_id` comes back with a different
/// participant or an empty name, the participant already on screen is kept so the
/// conversation header does not flicker.
pub fn reconcile_thread_list(
    current: &[ThreadSummary],
    fetched: Vec<ThreadSummary>,
    selected_thread_id: Option<&str>,
) -> Vec<ThreadSummary> {
    let mut next = fetched;
    for thread in next.iter_mut() {
        if let Some(last) = thread.last_message.as_mut() {
            if last.thread_id.is_empty() {
                last.thread_id = thread.id.clone();
            }
        }
    }
    if let Some(selected) = selected_thread_id {
        let previous = current
            .iter()
            .find(|t| t.id == selected)
            .and_then(|t| t.participant.clone());
        if let (Some(previous), Some(thread)) = (previous, next.iter_mut().find(|t| t.id == selected))
        {
            let keep_previous = match &thread.participant {
                None => true,
                Some(p) => {
                    p.id != previous.id || p.name.as_deref().map_or(true, |n| n.trim().is_empty())
                }
            };
            if keep_previous {
                let last_seen_at = thread
                    .participant
                    .as_ref()
                    .filter(|p| p.id == previous.id)
                    .and_then(|p| p.last_seen_at)
                    .or(previous.last_seen_at);
                thread.participant = Some(Participant {
                    last_seen_at,
                    ..previous
                });
            }
        }
    }
    sort_threads(&mut next);
    next
}

/// Every participant's `last_seen_at` as a presence observation.
pub fn participant_presence(threads: &[ThreadSummary]) -> Vec<PresenceUpdate> {
    threads
        .iter()
        .filter_map(|t| t.participant.as_ref())
        .map(|p| PresenceUpdate {
            user_id: p.id.clone(),
            status: None,
            last_seen_at: p.last_seen_at,
        })
        .collect()
}

pub fn participant_ids(threads: &[ThreadSummary]) -> HashSet<String> {
    threads
        .iter()
        .filter_map(|t| t.participant.as_ref().map(|p| p.id.clone()))
        .collect()
}
