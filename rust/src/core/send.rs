use std::collections::BTreeSet;
use std::time::Instant;

use parley_api::{upload_all, ApiError, LocalAttachment, SendMessageRequest, SentMessage};
use parley_sync::{new_temp_id, Attachment, AttachmentMetadata, Message};

use super::AppCore;
use crate::state::ComposerState;
use crate::updates::{CoreMsg, InternalEvent};

/// Url given to attachments of an optimistic message until the upload finishes.
fn local_attachment_url(attachment_id: &str) -> String {
    format!("local:{attachment_id}")
}

fn optimistic_attachment(a: &LocalAttachment) -> Attachment {
    Attachment {
        url: local_attachment_url(&a.id),
        kind: a.kind(),
        metadata: Some(AttachmentMetadata {
            name: Some(a.file_name.clone()),
            mime_type: Some(a.mime_type.clone()),
        }),
        size: Some(a.data.len() as u64),
    }
}

impl AppCore {
    pub(super) fn add_attachment(&mut self, attachment: LocalAttachment) {
        if self
            .state
            .composer
            .attachments
            .iter()
            .any(|a| a.id == attachment.id)
        {
            return;
        }
        tracing::debug!(
            kind = attachment.kind().as_str(),
            bytes = attachment.data.len(),
            "attachment added"
        );
        self.state.composer.attachments.push(attachment);
        self.emit_state();
    }

    pub(super) fn send_message(&mut self) {
        let Some(thread_id) = self.state.selected_thread_id.clone() else {
            tracing::debug!("send ignored: no active thread");
            return;
        };
        if self.state.composer.is_empty() {
            tracing::debug!("send ignored: nothing to send");
            return;
        }
        if self.sending_threads.contains(&thread_id) {
            tracing::debug!(thread_id = %thread_id, "send ignored: already sending");
            return;
        }

        let draft = std::mem::take(&mut self.state.composer);
        let content = Some(draft.text.trim())
            .filter(|t| !t.is_empty())
            .map(ToString::to_string);

        let temp_id = new_temp_id();
        let now = chrono::Utc::now();
        let local = &self.state.local_user;
        let optimistic = Message {
            id: temp_id.clone(),
            thread_id: thread_id.clone(),
            sender_id: local.id.clone(),
            content: content.clone(),
            attachments: draft.attachments.iter().map(optimistic_attachment).collect(),
            created_at: now,
            updated_at: now,
            read_by_user_ids: BTreeSet::from([local.id.clone()]),
            sender: Some(local.profile()),
        };

        if let Some(conv) = self.state.conversation.as_mut() {
            conv.messages.merge(std::slice::from_ref(&optimistic));
        }
        self.echo_ledger.register(temp_id.clone(), Instant::now());
        self.sending_threads.insert(thread_id.clone());
        self.state.busy.sending = true;
        self.emit_state();

        let api = self.api.clone();
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            let result = async {
                let uploaded = upload_all(api.as_ref(), &draft.attachments).await?;
                let request = SendMessageRequest::new(content, uploaded);
                api.send_message(&thread_id, &request).await
            }
            .await;
            let _ = tx.send(CoreMsg::Internal(Box::new(InternalEvent::SendFinished {
                thread_id,
                temp_id,
                draft,
                result,
            })));
        });
    }

    pub(super) fn handle_send_finished(
        &mut self,
        thread_id: String,
        temp_id: String,
        draft: ComposerState,
        result: Result<SentMessage, ApiError>,
    ) {
        self.sending_threads.remove(&thread_id);
        self.state.busy.sending = !self.sending_threads.is_empty();
        self.echo_ledger.remove(&temp_id);

        let is_open = self
            .state
            .conversation
            .as_ref()
            .is_some_and(|c| c.thread_id == thread_id);

        match result {
            Ok(sent) => {
                let local_user_id = self.state.local_user.id.clone();
                let mut message = sent.message;
                if message.thread_id.is_empty() {
                    message.thread_id = thread_id.clone();
                }
                message.sender = sent.sender.or(message.sender);
                message.read_by_user_ids.insert(local_user_id);

                // Registered before the swap so an echo already queued behind this
                // result is recognised.
                self.echo_ledger.register(message.id.clone(), Instant::now());
                if is_open {
                    if let Some(conv) = self.state.conversation.as_mut() {
                        conv.messages.replace_temp(&temp_id, &message);
                    }
                }
                self.fold_into_thread_list(&message);
                tracing::debug!(thread_id = %thread_id, message_id = %message.id, "send confirmed");
                self.emit_state();
            }
            Err(e) => {
                tracing::warn!(thread_id = %thread_id, error = %e, "send failed");
                if is_open {
                    if let Some(conv) = self.state.conversation.as_mut() {
                        conv.messages.remove(&temp_id);
                    }
                    if self.state.composer.is_empty() {
                        self.state.composer = draft;
                    }
                }
                self.toast(e.user_message("Message could not be sent"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_sync::AttachmentKind;

    #[test]
    fn optimistic_attachment_points_at_local_file() {
        let file = LocalAttachment::new("clip.mp4", "video/mp4", vec![0; 16]);
        let a = optimistic_attachment(&file);
        assert_eq!(a.url, format!("local:{}", file.id));
        assert_eq!(a.kind, AttachmentKind::Video);
        assert_eq!(a.size, Some(16));
        assert_eq!(
            a.metadata.and_then(|m| m.mime_type).as_deref(),
            Some("video/mp4")
        );
    }
}
