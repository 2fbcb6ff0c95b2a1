//! External collaborators of the parley client core: the chat HTTP backend and the
//! realtime push channel.

mod client;
mod error;
mod http;
mod realtime;
mod types;

pub use client::{upload_all, ChatApi};
pub use error::ApiError;
pub use http::HttpChatApi;
pub use realtime::{InMemoryRealtime, RealtimeAdapter, RealtimeEvent, Subscription, ThreadEvent};
pub use types::{LocalAttachment, MessagePage, SendMessageRequest, SentMessage, UploadedFile};
