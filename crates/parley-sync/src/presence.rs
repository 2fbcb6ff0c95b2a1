//! Presence model: a map of user id to `{status, last_seen_at}`.
//!
//! `status` is never an independent fact. It is recomputed from `last_seen_at` and an
//! evaluation time by [`derive_status`], so two entries with the same `last_seen_at`
//! always agree once revalidated. All functions here are pure and return new state.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How long after the last observed activity a user still counts as online.
pub const DEFAULT_PRESENCE_THRESHOLD_SECS: i64 = 90;

pub fn default_presence_threshold() -> Duration {
    Duration::seconds(DEFAULT_PRESENCE_THRESHOLD_SECS)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    #[default]
    Offline,
}

impl PresenceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub status: PresenceStatus,
    pub last_seen_at: Option<DateTime<Utc>>,
}

/// One observation of a user's activity, from any of the write sources (thread-list
/// fetch, push event, local heartbeat).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PresenceUpdate {
    pub user_id: String,
    pub status: Option<PresenceStatus>,
    pub last_seen_at: Option<DateTime<Utc>>,
}

impl PresenceUpdate {
    pub fn seen(user_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            status: Some(PresenceStatus::Online),
            last_seen_at: Some(at),
        }
    }
}

pub type PresenceState = BTreeMap<String, PresenceEntry>;

/// Online iff `last_seen_at` is known and no older than `threshold` at `now`. A
/// timestamp in the future (clock skew) counts as "now".
pub fn derive_status(
    last_seen_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    threshold: Duration,
) -> PresenceStatus {
    let Some(seen) = last_seen_at else {
        return PresenceStatus::Offline;
    };
    let seen = seen.min(now);
    if now - seen <= threshold {
        PresenceStatus::Online
    } else {
        PresenceStatus::Offline
    }
}

/// Apply `updates` in order. An update never regresses a user's freshness: if the stored
/// entry has a strictly newer `last_seen_at`, the stored entry is kept.
pub fn merge_presence(state: &PresenceState, updates: &[PresenceUpdate]) -> PresenceState {
    let mut next = state.clone();
    for update in updates {
        if let Some(existing) = next.get(&update.user_id) {
            if is_strictly_newer(existing.last_seen_at, update.last_seen_at) {
                continue;
            }
        }
        let status = update
            .status
            .or_else(|| next.get(&update.user_id).map(|e| e.status))
            .unwrap_or_default();
        next.insert(
            update.user_id.clone(),
            PresenceEntry {
                status,
                last_seen_at: update.last_seen_at,
            },
        );
    }
    next
}

fn is_strictly_newer(existing: Option<DateTime<Utc>>, incoming: Option<DateTime<Utc>>) -> bool {
    match (existing, incoming) {
        (Some(a), Some(b)) => a > b,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Drop users that are no longer visible. The local user's own entry always survives.
pub fn cleanup_presence(
    state: &PresenceState,
    valid_user_ids: &HashSet<String>,
    local_user_id: &str,
) -> PresenceState {
    state
        .iter()
        .filter(|(user_id, _)| *user_id == local_user_id || valid_user_ids.contains(*user_id))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Recompute every entry's status from its stored `last_seen_at`.
pub fn revalidate_presence(
    state: &PresenceState,
    now: DateTime<Utc>,
    threshold: Duration,
) -> PresenceState {
    state
        .iter()
        .map(|(user_id, entry)| {
            (
                user_id.clone(),
                PresenceEntry {
                    status: derive_status(entry.last_seen_at, now, threshold),
                    last_seen_at: entry.last_seen_at,
                },
            )
        })
        .collect()
}

pub fn has_presence_changed(a: &PresenceState, b: &PresenceState) -> bool {
    a != b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::test_util::at;

    const T_SECS: i64 = DEFAULT_PRESENCE_THRESHOLD_SECS;

    fn threshold() -> Duration {
        Duration::seconds(T_SECS)
    }

    #[test]
    fn threshold_boundaries() {
        let now = at(1_000_000);
        let stale = now - Duration::seconds(91);
        let fresh = now - Duration::seconds(89);
        assert_eq!(derive_status(Some(stale), now, threshold()), PresenceStatus::Offline);
        assert_eq!(derive_status(Some(fresh), now, threshold()), PresenceStatus::Online);
        assert_eq!(derive_status(Some(now - threshold()), now, threshold()), PresenceStatus::Online);
        assert_eq!(derive_status(None, now, threshold()), PresenceStatus::Offline);
    }

    #[test]
    fn future_last_seen_counts_as_now() {
        let now = at(1_000_000);
        let future = now + Duration::milliseconds(200);
        assert_eq!(derive_status(Some(future), now, threshold()), PresenceStatus::Online);
    }

    #[test]
    fn derive_is_deterministic() {
        let now = at(5_000_000);
        for offset in [0_i64, 1, 60_000, 90_000, 90_001, 500_000] {
            let seen = Some(now - Duration::milliseconds(offset));
            assert_eq!(derive_status(seen, now, threshold()), derive_status(seen, now, threshold()));
        }
    }

    #[test]
    fn merge_never_regresses_freshness() {
        let newer = at(2_000);
        let older = at(1_000);
        let state = merge_presence(&PresenceState::new(), &[PresenceUpdate::seen("bob", newer)]);

        let late = PresenceUpdate {
            user_id: "bob".into(),
            status: Some(PresenceStatus::Offline),
            last_seen_at: Some(older),
        };
        let merged = merge_presence(&state, &[late]);
        assert_eq!(merged["bob"].last_seen_at, Some(newer));
        assert_eq!(merged["bob"].status, PresenceStatus::Online);

        let without_timestamp = PresenceUpdate {
            user_id: "bob".into(),
            status: Some(PresenceStatus::Offline),
            last_seen_at: None,
        };
        let merged = merge_presence(&merged, &[without_timestamp]);
        assert_eq!(merged["bob"].last_seen_at, Some(newer));
    }

    #[test]
    fn merge_accepts_equal_or_newer() {
        let t = at(2_000);
        let state = merge_presence(&PresenceState::new(), &[PresenceUpdate::seen("bob", t)]);
        let offline_same_time = PresenceUpdate {
            user_id: "bob".into(),
            status: Some(PresenceStatus::Offline),
            last_seen_at: Some(t),
        };
        let merged = merge_presence(&state, &[offline_same_time]);
        assert_eq!(merged["bob"].status, PresenceStatus::Offline);

        let merged = merge_presence(&merged, &[PresenceUpdate::seen("bob", at(3_000))]);
        assert_eq!(merged["bob"].last_seen_at, Some(at(3_000)));
    }

    #[test]
    fn fetch_and_push_converge_in_either_order() {
        let from_fetch = PresenceUpdate {
            user_id: "bob".into(),
            status: None,
            last_seen_at: Some(at(1_000)),
        };
        let from_push = PresenceUpdate::seen("bob", at(4_000));
        let now = at(10_000);

        let a = revalidate_presence(
            &merge_presence(&PresenceState::new(), &[from_fetch.clone(), from_push.clone()]),
            now,
            threshold(),
        );
        let b = revalidate_presence(
            &merge_presence(&PresenceState::new(), &[from_push, from_fetch]),
            now,
            threshold(),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn cleanup_retains_local_user() {
        let state = merge_presence(
            &PresenceState::new(),
            &[
                PresenceUpdate::seen("me", at(1)),
                PresenceUpdate::seen("bob", at(1)),
                PresenceUpdate::seen("carol", at(1)),
            ],
        );
        let valid: HashSet<String> = ["bob".to_string()].into_iter().collect();
        let cleaned = cleanup_presence(&state, &valid, "me");
        assert_eq!(cleaned.keys().collect::<Vec<_>>(), vec!["bob", "me"]);

        let cleaned = cleanup_presence(&state, &HashSet::new(), "me");
        assert_eq!(cleaned.keys().collect::<Vec<_>>(), vec!["me"]);
    }

    #[test]
    fn revalidate_flips_status_without_touching_timestamps() {
        let seen = at(0);
        let state = merge_presence(&PresenceState::new(), &[PresenceUpdate::seen("bob", seen)]);
        let later = revalidate_presence(&state, seen + Duration::seconds(120), threshold());
        assert_eq!(later["bob"].status, PresenceStatus::Offline);
        assert_eq!(later["bob"].last_seen_at, Some(seen));
        assert!(has_presence_changed(&state, &later));

        let again = revalidate_presence(&later, seen + Duration::seconds(130), threshold());
        assert!(!has_presence_changed(&later, &again));
    }
}
