use async_trait::async_trait;
use parley_sync::{Attachment, PresenceStatus, ThreadSummary};

use crate::error::ApiError;
use crate::types::{LocalAttachment, MessagePage, SendMessageRequest, SentMessage, UploadedFile};

/// The chat backend as seen by the client core.
///
/// Every method maps to one HTTP round trip. Implementations must be cheap to share
/// across tasks; the core holds one behind an `Arc` and calls it from spawned tasks.
#[async_trait]
pub trait ChatApi: Send + Sync + 'static {
    async fn list_threads(&self) -> Result<Vec<ThreadSummary>, ApiError>;

    /// Newest page when `cursor` is `None`, otherwise the page before `cursor`.
    async fn fetch_messages(
        &self,
        thread_id: &str,
        cursor: Option<&str>,
    ) -> Result<MessagePage, ApiError>;

    async fn upload(&self, attachment: &LocalAttachment) -> Result<UploadedFile, ApiError>;

    async fn send_message(
        &self,
        thread_id: &str,
        request: &SendMessageRequest,
    ) -> Result<SentMessage, ApiError>;

    /// Server side is idempotent: re-marking a read message succeeds.
    async fn mark_read(&self, thread_id: &str, message_ids: &[String]) -> Result<(), ApiError>;

    async fn post_presence(&self, thread_id: &str, status: PresenceStatus) -> Result<(), ApiError>;

    /// Fire-and-forget presence post for teardown paths. Returns `false` when the beacon
    /// could not even be queued, in which case the caller falls back to
    /// [`ChatApi::post_presence`]. A queued beacon is a single attempt: a failure after
    /// queuing is logged and not retried.
    fn post_presence_beacon(&self, thread_id: &str, status: PresenceStatus) -> bool;
}

/// Upload each attachment in order and build the attachment list for the final create
/// request. Stops at the first failure.
pub async fn upload_all(
    api: &dyn ChatApi,
    attachments: &[LocalAttachment],
) -> Result<Vec<Attachment>, ApiError> {
    let mut uploaded = Vec::with_capacity(attachments.len());
    for attachment in attachments {
        let file = api.upload(attachment).await?;
        uploaded.push(Attachment {
            url: file.url,
            kind: attachment.kind(),
            metadata: Some(parley_sync::AttachmentMetadata {
                name: Some(attachment.file_name.clone()),
                mime_type: Some(attachment.mime_type.clone()),
            }),
            size: file.size.or(Some(attachment.data.len() as u64)),
        });
    }
    Ok(uploaded)
}
