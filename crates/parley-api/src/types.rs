//! Wire shapes for the direct-message HTTP endpoints.

use parley_sync::{Attachment, AttachmentKind, Message, PresenceStatus, SenderProfile, ThreadSummary};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadList {
    #[serde(default)]
    pub threads: Vec<ThreadSummary>,
}

/// One page of history, oldest to newest within the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub attachments: Vec<Attachment>,
    #[serde(rename = "type")]
    pub kind: String,
}

impl SendMessageRequest {
    pub fn new(content: Option<String>, attachments: Vec<Attachment>) -> Self {
        let kind = if content.is_some() {
            "text".to_string()
        } else {
            attachments
                .first()
                .map(|a| a.kind.as_str().to_string())
                .unwrap_or_else(|| "text".to_string())
        };
        Self {
            content,
            attachments,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SentMessage {
    pub message: Message,
    #[serde(default)]
    pub sender: Option<SenderProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedFile {
    pub url: String,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReadReceiptRequest<'a> {
    pub message_ids: &'a [String],
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PresenceRequest {
    pub status: PresenceStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// A file picked in the composer, not yet uploaded.
#[derive(Clone, PartialEq, Eq)]
pub struct LocalAttachment {
    pub id: String,
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl LocalAttachment {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id: format!("file-{}", uuid::Uuid::new_v4()),
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn kind(&self) -> AttachmentKind {
        AttachmentKind::from_mime(&self.mime_type)
    }
}

impl std::fmt::Debug for LocalAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAttachment")
            .field("id", &self.id)
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_request_type_follows_content_then_first_attachment() {
        let text = SendMessageRequest::new(Some("hi".into()), vec![]);
        assert_eq!(text.kind, "text");

        let gif = Attachment {
            url: "https://cdn/x.gif".into(),
            kind: AttachmentKind::Gif,
            metadata: None,
            size: Some(3),
        };
        let media_only = SendMessageRequest::new(None, vec![gif]);
        assert_eq!(media_only.kind, "gif");

        let json = serde_json::to_value(&media_only).unwrap();
        assert!(json.get("content").is_none());
        assert_eq!(json["type"], "gif");
        assert_eq!(json["attachments"][0]["type"], "gif");
    }

    #[test]
    fn message_page_accepts_missing_cursor() {
        let page: MessagePage = serde_json::from_str(r#"{"messages": []}"#).unwrap();
        assert!(page.messages.is_empty());
        assert_eq!(page.next_cursor, None);
    }

    #[test]
    fn local_attachment_debug_omits_bytes() {
        let a = LocalAttachment::new("cat.png", "image/png", vec![1, 2, 3]);
        assert_eq!(a.kind(), AttachmentKind::Image);
        assert!(a.id.starts_with("file-"));
        let dbg = format!("{a:?}");
        assert!(dbg.contains("len: 3"));
    }
}
