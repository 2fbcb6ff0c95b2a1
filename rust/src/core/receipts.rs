use parley_api::ApiError;

use super::AppCore;
use crate::updates::{CoreMsg, InternalEvent};

impl AppCore {
    /// Queue receipts for visible messages and arm the debounce timer.
    pub(super) fn messages_visible(&mut self, message_ids: &[String]) {
        let local_user_id = self.state.local_user.id.clone();
        let Some(conv) = self.state.conversation.as_ref() else {
            return;
        };
        let thread_id = conv.thread_id.clone();
        let queued = self
            .receipts
            .queue_visible(&thread_id, message_ids, &conv.messages, &local_user_id);
        if queued == 0 || self.receipts_scheduled.contains(&thread_id) {
            return;
        }
        self.receipts_scheduled.insert(thread_id.clone());
        self.schedule(
            self.config.read_receipt_debounce(),
            InternalEvent::ReadReceiptsDue { thread_id },
        );
    }

    /// Post receipts for every inbound message in the open conversation the local user
    /// has not read yet. With nothing left unread the badge is cleared directly.
    pub(super) fn read_open_thread(&mut self, thread_id: &str) {
        let local_user_id = self.state.local_user.id.clone();
        let Some(conv) = self
            .state
            .conversation
            .as_ref()
            .filter(|c| c.thread_id == thread_id)
        else {
            return;
        };
        let unread = conv.messages.unread_ids_for(&local_user_id);
        if unread.is_empty() {
            self.zero_unread(thread_id);
            return;
        }
        self.receipts
            .queue_visible(thread_id, &unread, &conv.messages, &local_user_id);
        self.flush_read_receipts(thread_id);
    }

    pub(super) fn flush_read_receipts(&mut self, thread_id: &str) {
        let Some(batch) = self.receipts.take_batch(thread_id) else {
            return;
        };
        tracing::debug!(thread_id, count = batch.len(), "posting read receipts");

        let api = self.api.clone();
        let tx = self.core_sender.clone();
        let thread_id = thread_id.to_string();
        self.runtime.spawn(async move {
            let result = api.mark_read(&thread_id, &batch).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(
                InternalEvent::ReadReceiptsPosted {
                    thread_id,
                    message_ids: batch,
                    result,
                },
            )));
        });
    }

    pub(super) fn handle_read_receipts_posted(
        &mut self,
        thread_id: &str,
        message_ids: Vec<String>,
        result: Result<(), ApiError>,
    ) {
        match result {
            Ok(()) => {
                self.receipts.complete(thread_id, &message_ids);
                let local_user_id = self.state.local_user.id.clone();
                if let Some(conv) = self
                    .state
                    .conversation
                    .as_mut()
                    .filter(|c| c.thread_id == thread_id)
                {
                    conv.messages.mark_read_by(&message_ids, &local_user_id);
                }
                self.zero_unread(thread_id);
                self.emit_state();
            }
            Err(e) => {
                // Left unread locally; the ids are picked up again next time they show.
                self.receipts.fail(thread_id, &message_ids);
                tracing::warn!(thread_id, count = message_ids.len(), error = %e, "read receipts failed");
            }
        }

        if self.receipts.has_pending(thread_id) && !self.receipts_scheduled.contains(thread_id) {
            self.receipts_scheduled.insert(thread_id.to_string());
            self.schedule(
                self.config.read_receipt_debounce(),
                InternalEvent::ReadReceiptsDue {
                    thread_id: thread_id.to_string(),
                },
            );
        }
    }
}
