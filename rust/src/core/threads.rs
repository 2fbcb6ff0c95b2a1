use parley_api::{ApiError, ThreadEvent};
use parley_sync::{
    cleanup_presence, fold_inbound, merge_presence, participant_ids, participant_presence,
    reconcile_thread_list, revalidate_presence, sort_threads, Message, ThreadSummary,
};

use super::AppCore;
use crate::state::{ComposerState, ConversationState};
use crate::updates::{CoreMsg, InternalEvent};

impl AppCore {
    pub(super) fn load_threads(&mut self) {
        self.threads_token += 1;
        let token = self.threads_token;
        self.set_busy(|b| b.loading_threads = true);

        let api = self.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = api.list_threads().await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::ThreadsLoaded {
                token,
                result,
            })));
        });
    }

    pub(super) fn handle_threads_loaded(
        &mut self,
        token: u64,
        result: Result<Vec<ThreadSummary>, ApiError>,
    ) {
        // A newer LoadThreads superseded this one.
        if token != self.threads_token {
            return;
        }
        self.state.busy.loading_threads = false;

        let fetched = match result {
            Ok(threads) => threads,
            Err(e) => {
                tracing::warn!(error = %e, "thread list fetch failed");
                self.toast(e.user_message("Conversations could not be loaded"));
                return;
            }
        };

        let selected = self.state.selected_thread_id.clone();
        let mut threads = reconcile_thread_list(&self.state.threads, fetched, selected.as_deref());
        if let Some(selected) = selected.as_deref() {
            if let Some(t) = threads.iter_mut().find(|t| t.id == selected) {
                t.unread_count = 0;
            }
        }
        tracing::debug!(count = threads.len(), "thread list loaded");

        let now = chrono::Utc::now();
        let valid = participant_ids(&threads);
        let cleaned = cleanup_presence(&self.state.presence, &valid, &self.state.local_user.id);
        let merged = merge_presence(&cleaned, &participant_presence(&threads));
        self.state.presence = revalidate_presence(&merged, now, self.config.presence_threshold());
        self.state.threads = threads;

        let auto_select = match (&self.state.selected_thread_id, self.state.threads.first()) {
            (None, Some(first)) => Some(first.id.clone()),
            _ => None,
        };
        match auto_select {
            Some(thread_id) => self.select_thread(&thread_id),
            None => self.emit_state(),
        }
    }

    pub(super) fn select_thread(&mut self, thread_id: &str) {
        let thread_id = thread_id.trim();
        if thread_id.is_empty() {
            return;
        }
        if self.state.selected_thread_id.as_deref() == Some(thread_id)
            && self.state.conversation.is_some()
        {
            return;
        }

        self.leave_current_thread();

        self.state.selected_thread_id = Some(thread_id.to_string());
        self.state.conversation = Some(ConversationState::new(thread_id));
        self.state.composer = ComposerState::default();
        if let Some(t) = self.state.threads.iter_mut().find(|t| t.id == thread_id) {
            t.unread_count = 0;
        }

        self.subscribe(thread_id);
        self.fetch_first_page(thread_id);
        if self.visible {
            self.send_heartbeat(thread_id);
        }
        self.emit_state();
    }

    pub(super) fn close_thread(&mut self) {
        if self.state.selected_thread_id.is_none() {
            return;
        }
        self.leave_current_thread();
        self.state.selected_thread_id = None;
        self.state.conversation = None;
        self.state.composer = ComposerState::default();
        self.state.busy.loading_messages = false;
        self.state.busy.loading_older = false;
        self.emit_state();
    }

    /// Tear down everything tied to the open thread except in-flight sends, which finish
    /// against their originating thread regardless.
    fn leave_current_thread(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            tracing::debug!(thread_id = subscription.thread_id(), "unsubscribing");
            subscription.unsubscribe();
        }
        self.subscription_token += 1;
        self.history_generation += 1;
        self.activity_token += 1;
        self.typing_tokens.clear();
        self.state.busy.loading_messages = false;
        self.state.busy.loading_older = false;
        if let Some(previous) = self.state.selected_thread_id.clone() {
            // Receipts for messages already seen still go out.
            self.flush_read_receipts(&previous);
            self.send_offline_beacon(&previous);
        }
    }

    fn subscribe(&mut self, thread_id: &str) {
        self.subscription_token += 1;
        let token = self.subscription_token;
        let (tx, rx) = flume::unbounded::<ThreadEvent>();
        self.subscription = Some(self.realtime.subscribe(thread_id, tx));

        // Forward into the actor queue so push events interleave with everything else.
        let core_tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            while let Ok(event) = rx.recv_async().await {
                if core_tx
                    .send(CoreMsg::Internal(Box::new(InternalEvent::Realtime {
                        token,
                        event,
                    })))
                    .is_err()
                {
                    break;
                }
            }
        });
        tracing::debug!(thread_id, token, "subscribed to thread events");
    }

    /// Fold `message` into its thread summary and keep the list ordered. Returns `false`
    /// when the thread is not in the list.
    pub(super) fn fold_into_thread_list(&mut self, message: &Message) -> bool {
        // The open thread only counts as read while the window is on screen.
        let reading = self
            .state
            .selected_thread_id
            .clone()
            .filter(|_| self.visible);
        let local_user_id = self.state.local_user.id.clone();
        let Some(pos) = self
            .state
            .threads
            .iter()
            .position(|t| t.id == message.thread_id)
        else {
            tracing::debug!(thread_id = %message.thread_id, "message for unknown thread");
            return false;
        };
        let folded = fold_inbound(
            &self.state.threads[pos],
            message,
            reading.as_deref(),
            &local_user_id,
        );
        self.state.threads[pos] = folded;
        sort_threads(&mut self.state.threads);
        true
    }

    pub(super) fn zero_unread(&mut self, thread_id: &str) -> bool {
        match self.state.threads.iter_mut().find(|t| t.id == thread_id) {
            Some(t) if t.unread_count != 0 => {
                t.unread_count = 0;
                true
            }
            _ => false,
        }
    }
}
