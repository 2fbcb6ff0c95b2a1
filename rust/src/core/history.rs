use parley_api::{ApiError, MessagePage};

use super::AppCore;
use crate::updates::{CoreMsg, InternalEvent};

impl AppCore {
    pub(super) fn fetch_first_page(&mut self, thread_id: &str) {
        self.state.busy.loading_messages = true;
        self.spawn_history_fetch(thread_id, None);
    }

    pub(super) fn load_older_messages(&mut self) {
        if self.state.busy.loading_older || self.state.busy.loading_messages {
            return;
        }
        let Some(conv) = self.state.conversation.as_ref() else {
            return;
        };
        let Some(cursor) = conv.next_cursor.clone() else {
            tracing::debug!(thread_id = %conv.thread_id, "no older history");
            return;
        };
        let thread_id = conv.thread_id.clone();
        self.set_busy(|b| b.loading_older = true);
        self.spawn_history_fetch(&thread_id, Some(cursor));
    }

    fn spawn_history_fetch(&self, thread_id: &str, cursor: Option<String>) {
        let api = self.api.clone();
        let tx = self.core_sender.clone();
        let generation = self.history_generation;
        let thread_id = thread_id.to_string();
        self.runtime.spawn(async move {
            let older = cursor.is_some();
            let result = api.fetch_messages(&thread_id, cursor.as_deref()).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::MessagesLoaded {
                thread_id,
                generation,
                older,
                result,
            })));
        });
    }

    pub(super) fn handle_messages_loaded(
        &mut self,
        thread_id: &str,
        generation: u64,
        older: bool,
        result: Result<MessagePage, ApiError>,
    ) {
        let current = self
            .state
            .conversation
            .as_ref()
            .is_some_and(|c| c.thread_id == thread_id);
        if generation != self.history_generation || !current {
            tracing::debug!(thread_id, generation, "ignoring stale history page");
            return;
        }

        if older {
            self.state.busy.loading_older = false;
        } else {
            self.state.busy.loading_messages = false;
        }

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(thread_id, older, error = %e, "history fetch failed");
                self.toast(e.user_message("Messages could not be loaded"));
                return;
            }
        };

        let fetched = page.messages.len();
        if let Some(conv) = self.state.conversation.as_mut() {
            conv.messages.merge(&page.messages);
            // Only the oldest page we have seen decides whether more history exists.
            if older || conv.next_cursor.is_none() {
                conv.can_load_older = page.next_cursor.is_some();
                conv.next_cursor = page.next_cursor;
            }
        }
        tracing::debug!(thread_id, older, fetched, "history page merged");

        // Everything unread on the first page is read as soon as the thread opens.
        if !older {
            self.read_open_thread(thread_id);
        }
        self.emit_state();
    }
}
