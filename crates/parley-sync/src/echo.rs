//! Short-lived record of message ids this client produced, used to recognise push echoes
//! of its own sends.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::message::Message;

pub const DEFAULT_ECHO_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct EchoLedger {
    ttl: Duration,
    entries: HashMap<String, Instant>,
}

impl Default for EchoLedger {
    fn default() -> Self {
        Self::new(DEFAULT_ECHO_TTL)
    }
}

impl EchoLedger {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Record `id` as locally produced. Re-registering refreshes its expiry.
    pub fn register(&mut self, id: impl Into<String>, now: Instant) {
        self.entries.insert(id.into(), now + self.ttl);
    }

    /// True while `id` is registered and not yet expired at `now`.
    pub fn contains(&self, id: &str, now: Instant) -> bool {
        self.entries.get(id).is_some_and(|expires| *expires > now)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Evict expired entries and return how many were dropped.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, expires| *expires > now);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What to do with a pushed "new message" for the active thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EchoVerdict {
    /// A temporary id still in flight; the send pipeline will resolve it.
    IgnoreInFlight,
    /// An echo of our own confirmed send: update the existing record only.
    MergeOnly,
    /// Anything else: merge-insert as a new arrival.
    Insert,
}

pub fn classify_push(
    ledger: &EchoLedger,
    message: &Message,
    local_user_id: &str,
    now: Instant,
) -> EchoVerdict {
    if !ledger.contains(&message.id, now) {
        return EchoVerdict::Insert;
    }
    if message.is_temp() {
        EchoVerdict::IgnoreInFlight
    } else if message.sender_id == local_user_id {
        EchoVerdict::MergeOnly
    } else {
        EchoVerdict::Insert
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::test_util::msg;

    #[test]
    fn entries_expire_after_ttl() {
        let t0 = Instant::now();
        let mut ledger = EchoLedger::new(Duration::from_secs(5));
        ledger.register("srv-9", t0);

        assert!(ledger.contains("srv-9", t0 + Duration::from_millis(4_999)));
        assert!(!ledger.contains("srv-9", t0 + Duration::from_secs(5)));
        assert!(!ledger.contains("other", t0));

        assert_eq!(ledger.purge_expired(t0 + Duration::from_secs(6)), 1);
        assert!(ledger.is_empty());
    }

    #[test]
    fn register_refreshes_expiry() {
        let t0 = Instant::now();
        let mut ledger = EchoLedger::new(Duration::from_secs(5));
        ledger.register("temp-1", t0);
        ledger.register("temp-1", t0 + Duration::from_secs(3));
        assert!(ledger.contains("temp-1", t0 + Duration::from_secs(7)));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn remove_drops_in_flight_id() {
        let t0 = Instant::now();
        let mut ledger = EchoLedger::default();
        ledger.register("temp-1", t0);
        ledger.register("srv-9", t0);
        assert!(ledger.remove("temp-1"));
        assert!(!ledger.remove("temp-1"));
        assert!(!ledger.contains("temp-1", t0));
        assert!(ledger.contains("srv-9", t0));
    }

    #[test]
    fn classify_push_by_ledger_and_sender() {
        let t0 = Instant::now();
        let mut ledger = EchoLedger::default();
        ledger.register("temp-1", t0);
        ledger.register("srv-9", t0);

        assert_eq!(
            classify_push(&ledger, &msg("temp-1", "me", 0), "me", t0),
            EchoVerdict::IgnoreInFlight
        );
        assert_eq!(
            classify_push(&ledger, &msg("srv-9", "me", 0), "me", t0),
            EchoVerdict::MergeOnly
        );
        assert_eq!(
            classify_push(&ledger, &msg("srv-10", "me", 0), "me", t0),
            EchoVerdict::Insert
        );
        assert_eq!(
            classify_push(&ledger, &msg("m7", "bob", 0), "me", t0),
            EchoVerdict::Insert
        );
        let later = t0 + Duration::from_secs(6);
        assert_eq!(
            classify_push(&ledger, &msg("srv-9", "me", 0), "me", later),
            EchoVerdict::Insert
        );
    }
}
