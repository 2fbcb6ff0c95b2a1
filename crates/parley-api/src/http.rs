use std::time::Duration;

use async_trait::async_trait;
use parley_sync::{PresenceStatus, ThreadSummary};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use url::Url;

use crate::client::ChatApi;
use crate::error::ApiError;
use crate::types::{
    ErrorBody, LocalAttachment, MessagePage, PresenceRequest, ReadReceiptRequest,
    SendMessageRequest, SentMessage, ThreadList, UploadedFile,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// `reqwest`-backed [`ChatApi`] speaking the `/api/chat` endpoints.
#[derive(Clone)]
pub struct HttpChatApi {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpChatApi {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        Self::with_client(client, base_url)
    }

    /// Use a preconfigured client (cookies, auth headers, proxies).
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, ApiError> {
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidRequest("base url cannot be a base".into()))?;
            path.pop_if_empty();
            path.extend(["api", "chat"]);
            path.extend(segments);
        }
        Ok(url)
    }

    fn thread_endpoint(&self, thread_id: &str, leaf: &str) -> Result<Url, ApiError> {
        if thread_id.trim().is_empty() {
            return Err(ApiError::InvalidRequest("thread id is empty".into()));
        }
        self.endpoint(&["direct", thread_id, leaf])
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or(text);
    Err(ApiError::Server {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let resp = check(resp).await?;
    resp.json::<T>()
        .await
        .map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn list_threads(&self) -> Result<Vec<ThreadSummary>, ApiError> {
        let url = self.endpoint(&["direct"])?;
        let resp = self.client.get(url).send().await?;
        let list: ThreadList = decode(resp).await?;
        Ok(list.threads)
    }

    async fn fetch_messages(
        &self,
        thread_id: &str,
        cursor: Option<&str>,
    ) -> Result<MessagePage, ApiError> {
        let mut url = self.thread_endpoint(thread_id, "messages")?;
        if let Some(cursor) = cursor {
            url.query_pairs_mut().append_pair("cursor", cursor);
        }
        let resp = self.client.get(url).send().await?;
        decode(resp).await
    }

    async fn upload(&self, attachment: &LocalAttachment) -> Result<UploadedFile, ApiError> {
        let url = self.endpoint(&["upload"])?;
        let part = Part::bytes(attachment.data.clone())
            .file_name(attachment.file_name.clone())
            .mime_str(&attachment.mime_type)
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        let form = Form::new().part("file", part);
        let resp = self.client.post(url).multipart(form).send().await?;
        decode(resp).await
    }

    async fn send_message(
        &self,
        thread_id: &str,
        request: &SendMessageRequest,
    ) -> Result<SentMessage, ApiError> {
        let url = self.thread_endpoint(thread_id, "messages")?;
        let resp = self.client.post(url).json(request).send().await?;
        let mut sent: SentMessage = decode(resp).await?;
        if sent.message.thread_id.is_empty() {
            sent.message.thread_id = thread_id.to_string();
        }
        Ok(sent)
    }

    async fn mark_read(&self, thread_id: &str, message_ids: &[String]) -> Result<(), ApiError> {
        let url = self.thread_endpoint(thread_id, "read")?;
        let resp = self
            .client
            .post(url)
            .json(&ReadReceiptRequest { message_ids })
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn post_presence(&self, thread_id: &str, status: PresenceStatus) -> Result<(), ApiError> {
        let url = self.thread_endpoint(thread_id, "presence")?;
        let resp = self
            .client
            .post(url)
            .json(&PresenceRequest { status })
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// Queued on the ambient runtime and sent once. Transport errors and error statuses
    /// are only logged.
    fn post_presence_beacon(&self, thread_id: &str, status: PresenceStatus) -> bool {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return false;
        };
        let Ok(url) = self.thread_endpoint(thread_id, "presence") else {
            return false;
        };
        let request = self.client.post(url).json(&PresenceRequest { status });
        let thread_id = thread_id.to_string();
        handle.spawn(async move {
            match request.send().await {
                Ok(resp) if !resp.status().is_success() => {
                    tracing::debug!(%thread_id, status = %resp.status(), "presence beacon rejected");
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(%thread_id, error = %e, "presence beacon dropped"),
            }
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_rooted_at_api_chat() {
        let api = HttpChatApi::new("https://chat.example.com/").unwrap();
        assert_eq!(
            api.endpoint(&["direct"]).unwrap().as_str(),
            "https://chat.example.com/api/chat/direct"
        );
        assert_eq!(
            api.thread_endpoint("t 1", "read").unwrap().as_str(),
            "https://chat.example.com/api/chat/direct/t%201/read"
        );
    }

    #[tokio::test]
    async fn beacon_is_queued_inside_a_runtime() {
        let api = HttpChatApi::new("http://127.0.0.1:9").unwrap();
        assert!(api.post_presence_beacon("t1", PresenceStatus::Offline));
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let api = HttpChatApi::new("https://example.com/app").unwrap();
        assert_eq!(
            api.endpoint(&["upload"]).unwrap().as_str(),
            "https://example.com/app/api/chat/upload"
        );
    }

    #[test]
    fn empty_thread_id_is_rejected() {
        let api = HttpChatApi::new("https://example.com").unwrap();
        assert!(matches!(
            api.thread_endpoint(" ", "messages"),
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[test]
    fn beacon_without_runtime_reports_not_queued() {
        let api = HttpChatApi::new("https://example.com").unwrap();
        assert!(!api.post_presence_beacon("t1", PresenceStatus::Offline));
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let api = HttpChatApi::new("http://127.0.0.1:9").unwrap();
        let err = api.list_threads().await.unwrap_err();
        assert!(err.is_retryable(), "{err}");
    }
}
