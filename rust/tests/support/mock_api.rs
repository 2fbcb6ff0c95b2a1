use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parley_core::{
    ApiError, ChatApi, LocalAttachment, Message, MessagePage, Participant, PresenceStatus,
    SendMessageRequest, SentMessage, ThreadSummary, UploadedFile,
};

pub fn participant(id: &str, name: &str) -> Participant {
    Participant {
        id: id.to_string(),
        name: Some(name.to_string()),
        email: None,
        profile_image: None,
        last_seen_at: None,
    }
}

pub fn thread(id: &str, other: Participant, updated_at: DateTime<Utc>) -> ThreadSummary {
    ThreadSummary {
        id: id.to_string(),
        participant: Some(other),
        last_message: None,
        unread_count: 0,
        updated_at,
    }
}

pub fn message(id: &str, thread_id: &str, sender_id: &str, created_at: DateTime<Utc>) -> Message {
    Message {
        id: id.to_string(),
        thread_id: thread_id.to_string(),
        sender_id: sender_id.to_string(),
        content: Some(format!("body of {id}")),
        attachments: vec![],
        created_at,
        updated_at: created_at,
        read_by_user_ids: BTreeSet::from([sender_id.to_string()]),
        sender: None,
    }
}

#[derive(Default)]
struct Script {
    threads: Vec<ThreadSummary>,
    pages: HashMap<(String, Option<String>), MessagePage>,
    fetch_delays: HashMap<String, Duration>,
    send_delay: Duration,
    send_failure: Option<(u16, String)>,
    fail_reads: bool,
    next_message: u64,

    fetches: Vec<(String, Option<String>)>,
    sent: Vec<(String, SendMessageRequest)>,
    uploads: Vec<String>,
    read_posts: Vec<(String, Vec<String>)>,
    presence_posts: Vec<(String, PresenceStatus)>,
    beacons: Vec<(String, PresenceStatus)>,
}

/// Scripted chat backend. Answers come from what the test configured; every call is
/// recorded for assertions.
pub struct MockApi {
    user_id: String,
    script: Mutex<Script>,
}

impl MockApi {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            script: Mutex::new(Script::default()),
        }
    }

    pub fn with_threads(self, threads: Vec<ThreadSummary>) -> Self {
        self.script.lock().unwrap().threads = threads;
        self
    }

    pub fn with_page(
        self,
        thread_id: &str,
        cursor: Option<&str>,
        messages: Vec<Message>,
        next_cursor: Option<&str>,
    ) -> Self {
        self.script.lock().unwrap().pages.insert(
            (thread_id.to_string(), cursor.map(str::to_string)),
            MessagePage {
                messages,
                next_cursor: next_cursor.map(str::to_string),
            },
        );
        self
    }

    pub fn with_fetch_delay(self, thread_id: &str, delay: Duration) -> Self {
        self.script
            .lock()
            .unwrap()
            .fetch_delays
            .insert(thread_id.to_string(), delay);
        self
    }

    pub fn with_send_delay(self, delay: Duration) -> Self {
        self.script.lock().unwrap().send_delay = delay;
        self
    }

    pub fn fail_sends(&self, status: u16, message: &str) {
        self.script.lock().unwrap().send_failure = Some((status, message.to_string()));
    }

    /// While set, read receipts are recorded but answered with a 503.
    pub fn fail_reads(&self, fail: bool) {
        self.script.lock().unwrap().fail_reads = fail;
    }

    /// Id the next successful send will be given.
    pub fn next_message_id(&self) -> String {
        format!("srv-{}", self.script.lock().unwrap().next_message + 1)
    }

    pub fn fetches(&self) -> Vec<(String, Option<String>)> {
        self.script.lock().unwrap().fetches.clone()
    }

    pub fn sent(&self) -> Vec<(String, SendMessageRequest)> {
        self.script.lock().unwrap().sent.clone()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.script.lock().unwrap().uploads.clone()
    }

    pub fn read_posts(&self) -> Vec<(String, Vec<String>)> {
        self.script.lock().unwrap().read_posts.clone()
    }

    pub fn presence_posts(&self) -> Vec<(String, PresenceStatus)> {
        self.script.lock().unwrap().presence_posts.clone()
    }

    pub fn beacons(&self) -> Vec<(String, PresenceStatus)> {
        self.script.lock().unwrap().beacons.clone()
    }
}

#[async_trait]
impl ChatApi for MockApi {
    async fn list_threads(&self) -> Result<Vec<ThreadSummary>, ApiError> {
        Ok(self.script.lock().unwrap().threads.clone())
    }

    async fn fetch_messages(
        &self,
        thread_id: &str,
        cursor: Option<&str>,
    ) -> Result<MessagePage, ApiError> {
        let delay = {
            let mut script = self.script.lock().unwrap();
            script
                .fetches
                .push((thread_id.to_string(), cursor.map(str::to_string)));
            script.fetch_delays.get(thread_id).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let script = self.script.lock().unwrap();
        Ok(script
            .pages
            .get(&(thread_id.to_string(), cursor.map(str::to_string)))
            .cloned()
            .unwrap_or_default())
    }

    async fn upload(&self, file: &LocalAttachment) -> Result<UploadedFile, ApiError> {
        self.script.lock().unwrap().uploads.push(file.file_name.clone());
        Ok(UploadedFile {
            url: format!("https://files.test/{}", file.file_name),
            size: Some(file.data.len() as u64),
        })
    }

    async fn send_message(
        &self,
        thread_id: &str,
        request: &SendMessageRequest,
    ) -> Result<SentMessage, ApiError> {
        let delay = self.script.lock().unwrap().send_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock().unwrap();
        script.sent.push((thread_id.to_string(), request.clone()));
        if let Some((status, message)) = script.send_failure.clone() {
            return Err(ApiError::Server { status, message });
        }
        script.next_message += 1;
        let mut sent = message(
            &format!("srv-{}", script.next_message),
            thread_id,
            &self.user_id,
            Utc::now(),
        );
        sent.content = request.content.clone();
        sent.attachments = request.attachments.clone();
        Ok(SentMessage {
            message: sent,
            sender: None,
        })
    }

    async fn mark_read(&self, thread_id: &str, message_ids: &[String]) -> Result<(), ApiError> {
        let mut script = self.script.lock().unwrap();
        script
            .read_posts
            .push((thread_id.to_string(), message_ids.to_vec()));
        if script.fail_reads {
            return Err(ApiError::Server {
                status: 503,
                message: "read store unavailable".into(),
            });
        }
        Ok(())
    }

    async fn post_presence(&self, thread_id: &str, status: PresenceStatus) -> Result<(), ApiError> {
        self.script
            .lock()
            .unwrap()
            .presence_posts
            .push((thread_id.to_string(), status));
        Ok(())
    }

    fn post_presence_beacon(&self, thread_id: &str, status: PresenceStatus) -> bool {
        self.script
            .lock()
            .unwrap()
            .beacons
            .push((thread_id.to_string(), status));
        true
    }
}
