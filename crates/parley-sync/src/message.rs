//! Message records as they flow through the three write paths (history fetch, optimistic
//! send, push delivery).
//!
//! Ids minted locally for optimistic messages carry [`TEMP_ID_PREFIX`] so they can never
//! collide with an id handed out by the server.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix reserved for client-generated message ids.
pub const TEMP_ID_PREFIX: &str = "temp-";

pub fn is_temp_id(id: &str) -> bool {
    id.starts_with(TEMP_ID_PREFIX)
}

pub fn new_temp_id() -> String {
    format!("{TEMP_ID_PREFIX}{}", uuid::Uuid::new_v4())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Gif,
    Audio,
    Video,
    File,
}

impl AttachmentKind {
    /// Classify a MIME type the way the composer does when a file is picked.
    pub fn from_mime(mime_type: &str) -> Self {
        let mime = mime_type.trim().to_ascii_lowercase();
        if mime == "image/gif" {
            Self::Gif
        } else if mime.starts_with("image/") {
            Self::Image
        } else if mime.starts_with("audio/") {
            Self::Audio
        } else if mime.starts_with("video/") {
            Self::Video
        } else {
            Self::File
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Gif => "gif",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::File => "file",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    #[serde(default)]
    pub metadata: Option<AttachmentMetadata>,
    #[serde(default)]
    pub size: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default, alias = "groupId")]
    pub thread_id: String,
    #[serde(alias = "userId")]
    pub sender_id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub read_by_user_ids: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<SenderProfile>,
}

impl Message {
    pub fn is_temp(&self) -> bool {
        is_temp_id(&self.id)
    }

    pub fn is_read_by(&self, user_id: &str) -> bool {
        self.read_by_user_ids.contains(user_id)
    }

    /// Short text used for thread-list previews.
    pub fn preview(&self) -> String {
        match self.content.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ if !self.attachments.is_empty() => {
                format!("{} attachment(s)", self.attachments.len())
            }
            _ => String::new(),
        }
    }

    /// Field-wise merge: `incoming` wins per field, readers are unioned.
    pub fn merged_with(&self, incoming: &Message) -> Message {
        let mut read_by = self.read_by_user_ids.clone();
        read_by.extend(incoming.read_by_user_ids.iter().cloned());
        Message {
            id: incoming.id.clone(),
            thread_id: incoming.thread_id.clone(),
            sender_id: incoming.sender_id.clone(),
            content: incoming.content.clone(),
            attachments: incoming.attachments.clone(),
            created_at: incoming.created_at,
            updated_at: incoming.updated_at,
            read_by_user_ids: read_by,
            sender: incoming.sender.clone().or_else(|| self.sender.clone()),
        }
    }
}
