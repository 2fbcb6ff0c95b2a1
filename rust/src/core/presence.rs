use std::sync::Arc;
use std::time::{Duration, Instant};

use parley_api::{ApiError, ChatApi};
use parley_sync::{has_presence_changed, merge_presence, revalidate_presence, PresenceStatus, PresenceUpdate};

use super::AppCore;
use crate::updates::InternalEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub(crate) max_retries: u32,
    pub(crate) base_delay: Duration,
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * (attempt + 1)
    }
}

/// Post a presence status, retrying transport errors and 5xx with linear backoff. 4xx
/// responses are final.
pub(crate) async fn post_presence_with_retry(
    api: &dyn ChatApi,
    thread_id: &str,
    status: PresenceStatus,
    policy: RetryPolicy,
) -> Result<(), ApiError> {
    let mut attempt = 0;
    loop {
        match api.post_presence(thread_id, status).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt);
                tracing::debug!(thread_id, attempt, ?delay, error = %e, "presence post retry");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

impl AppCore {
    /// Merge `updates`, then revalidate everyone at the current time. Returns whether the
    /// published presence map changed.
    pub(super) fn apply_presence(&mut self, updates: Vec<PresenceUpdate>) -> bool {
        let merged = merge_presence(&self.state.presence, &updates);
        let next = revalidate_presence(&merged, chrono::Utc::now(), self.config.presence_threshold());
        if has_presence_changed(&self.state.presence, &next) {
            self.state.presence = next;
            true
        } else {
            false
        }
    }

    pub(super) fn handle_presence_tick(&mut self) {
        self.echo_ledger.purge_expired(Instant::now());
        if self.apply_presence(Vec::new()) {
            tracing::debug!("presence revalidated");
            self.emit_state();
        }
    }

    pub(super) fn user_activity(&mut self) {
        if !self.visible || self.state.selected_thread_id.is_none() {
            return;
        }
        self.activity_token += 1;
        self.schedule(
            self.config.activity_debounce(),
            InternalEvent::ActivitySettled {
                token: self.activity_token,
            },
        );
    }

    pub(super) fn handle_activity_settled(&mut self, token: u64) {
        if token != self.activity_token || !self.visible {
            return;
        }
        if let Some(thread_id) = self.state.selected_thread_id.clone() {
            self.send_heartbeat(&thread_id);
            self.emit_state();
        }
    }

    pub(super) fn visibility_changed(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        let Some(thread_id) = self.state.selected_thread_id.clone() else {
            return;
        };
        if visible {
            // Whatever arrived while hidden is read now.
            self.read_open_thread(&thread_id);
            self.send_heartbeat(&thread_id);
            self.emit_state();
        } else {
            self.activity_token += 1;
            self.send_offline_beacon(&thread_id);
        }
    }

    /// Mark the local user online and tell the server. Failures are logged and left for
    /// the next activity.
    pub(super) fn send_heartbeat(&mut self, thread_id: &str) {
        let local_user_id = self.state.local_user.id.clone();
        self.apply_presence(vec![PresenceUpdate::seen(local_user_id, chrono::Utc::now())]);

        let api = self.api.clone();
        let policy = self.config.heartbeat_retry();
        let thread_id = thread_id.to_string();
        self.runtime.spawn(async move {
            if let Err(e) =
                post_presence_with_retry(api.as_ref(), &thread_id, PresenceStatus::Online, policy)
                    .await
            {
                tracing::warn!(thread_id = %thread_id, error = %e, "presence heartbeat failed");
            }
        });
    }

    /// Best-effort "offline" for teardown paths. Not awaited.
    pub(super) fn send_offline_beacon(&self, thread_id: &str) {
        let _guard = self.runtime.enter();
        if self.api.post_presence_beacon(thread_id, PresenceStatus::Offline) {
            return;
        }
        let api: Arc<dyn ChatApi> = self.api.clone();
        let policy = self.config.heartbeat_retry();
        let thread_id = thread_id.to_string();
        self.runtime.spawn(async move {
            if let Err(e) =
                post_presence_with_retry(api.as_ref(), &thread_id, PresenceStatus::Offline, policy)
                    .await
            {
                tracing::debug!(thread_id = %thread_id, error = %e, "offline presence dropped");
            }
        });
    }
}
