use std::time::Instant;

use parley_api::{RealtimeEvent, ThreadEvent};
use parley_sync::{classify_push, EchoVerdict, Message, PresenceStatus, PresenceUpdate};

use super::AppCore;
use crate::updates::InternalEvent;

impl AppCore {
    pub(super) fn handle_realtime(&mut self, thread_event: ThreadEvent) {
        let ThreadEvent { thread_id, event } = thread_event;
        tracing::debug!(thread_id = %thread_id, event = event.tag(), "realtime event");
        let now = chrono::Utc::now();

        match event {
            RealtimeEvent::MessageReceived(mut message) => {
                if message.thread_id.is_empty() {
                    message.thread_id = thread_id;
                }
                self.handle_pushed_message(message);
            }
            RealtimeEvent::TypingObserved { user_id } => {
                let mut changed = self.apply_presence(vec![PresenceUpdate::seen(&user_id, now)]);
                changed |= self.mark_typing(&thread_id, &user_id);
                if changed {
                    self.emit_state();
                }
            }
            RealtimeEvent::UserJoined { user_id } => {
                if self.apply_presence(vec![PresenceUpdate::seen(user_id, now)]) {
                    self.emit_state();
                }
            }
            RealtimeEvent::UserLeft { user_id } => {
                // No timestamp: a known user keeps their freshness and ages out normally.
                let mut changed = self.apply_presence(vec![PresenceUpdate {
                    user_id: user_id.clone(),
                    status: Some(PresenceStatus::Offline),
                    last_seen_at: None,
                }]);
                changed |= self.clear_typing(&thread_id, &user_id);
                if changed {
                    self.emit_state();
                }
            }
            RealtimeEvent::PresenceChanged {
                user_id,
                status,
                last_seen_at,
            } => {
                if self.apply_presence(vec![PresenceUpdate {
                    user_id,
                    status: Some(status),
                    last_seen_at,
                }]) {
                    self.emit_state();
                }
            }
        }
    }

    fn handle_pushed_message(&mut self, message: Message) {
        let now = Instant::now();
        self.echo_ledger.purge_expired(now);
        let local_user_id = self.state.local_user.id.clone();
        let is_open = self
            .state
            .conversation
            .as_ref()
            .is_some_and(|c| c.thread_id == message.thread_id);

        if is_open {
            match classify_push(&self.echo_ledger, &message, &local_user_id, now) {
                EchoVerdict::IgnoreInFlight => {
                    tracing::debug!(message_id = %message.id, "ignoring echo of in-flight send");
                    return;
                }
                EchoVerdict::MergeOnly => {
                    if let Some(conv) = self.state.conversation.as_mut() {
                        conv.messages.merge_existing(&message);
                    }
                }
                EchoVerdict::Insert => {
                    if let Some(conv) = self.state.conversation.as_mut() {
                        conv.messages.merge(std::slice::from_ref(&message));
                        conv.typing_user_ids.remove(&message.sender_id);
                    }
                    if message.sender_id != local_user_id {
                        if self.visible {
                            self.messages_visible(std::slice::from_ref(&message.id));
                        }
                        let seen_at = message.created_at.min(chrono::Utc::now());
                        self.apply_presence(vec![PresenceUpdate::seen(
                            message.sender_id.clone(),
                            seen_at,
                        )]);
                    }
                }
            }
        }

        self.fold_into_thread_list(&message);
        self.emit_state();
    }

    fn mark_typing(&mut self, thread_id: &str, user_id: &str) -> bool {
        if user_id == self.state.local_user.id {
            return false;
        }
        let Some(conv) = self
            .state
            .conversation
            .as_mut()
            .filter(|c| c.thread_id == thread_id)
        else {
            return false;
        };
        let inserted = conv.typing_user_ids.insert(user_id.to_string());

        self.next_typing_token += 1;
        let token = self.next_typing_token;
        self.typing_tokens
            .insert((thread_id.to_string(), user_id.to_string()), token);
        self.schedule(
            self.config.typing_ttl(),
            InternalEvent::TypingExpired {
                thread_id: thread_id.to_string(),
                user_id: user_id.to_string(),
                token,
            },
        );
        inserted
    }

    fn clear_typing(&mut self, thread_id: &str, user_id: &str) -> bool {
        self.typing_tokens
            .remove(&(thread_id.to_string(), user_id.to_string()));
        self.state
            .conversation
            .as_mut()
            .filter(|c| c.thread_id == thread_id)
            .is_some_and(|c| c.typing_user_ids.remove(user_id))
    }

    pub(super) fn handle_typing_expired(&mut self, thread_id: String, user_id: String, token: u64) {
        let key = (thread_id, user_id);
        // Refreshed since this timer was armed.
        if self.typing_tokens.get(&key) != Some(&token) {
            return;
        }
        let (thread_id, user_id) = key;
        if self.clear_typing(&thread_id, &user_id) {
            self.emit_state();
        }
    }
}
