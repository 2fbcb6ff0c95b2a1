use std::collections::BTreeSet;

use parley_api::LocalAttachment;
use parley_sync::{
    Message, MessageStore, PresenceState, PresenceStatus, SenderProfile, ThreadSummary,
};

#[derive(Clone, Debug, PartialEq)]
pub struct AppState {
    pub rev: u64,
    pub local_user: LocalUser,
    pub threads: Vec<ThreadSummary>,
    pub selected_thread_id: Option<String>,
    pub conversation: Option<ConversationState>,
    pub presence: PresenceState,
    pub composer: ComposerState,
    pub busy: BusyState,
    pub toast: Option<String>,
}

impl AppState {
    pub fn empty(local_user: LocalUser) -> Self {
        Self {
            rev: 0,
            local_user,
            threads: vec![],
            selected_thread_id: None,
            conversation: None,
            presence: PresenceState::new(),
            composer: ComposerState::default(),
            busy: BusyState::idle(),
            toast: None,
        }
    }

    pub fn thread(&self, thread_id: &str) -> Option<&ThreadSummary> {
        self.threads.iter().find(|t| t.id == thread_id)
    }

    /// Derived status as of the last revalidation; unknown users are offline.
    pub fn presence_of(&self, user_id: &str) -> PresenceStatus {
        self.presence
            .get(user_id)
            .map(|e| e.status)
            .unwrap_or_default()
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation
            .as_ref()
            .map(|c| c.messages.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalUser {
    pub id: String,
    pub name: Option<String>,
    pub profile_image: Option<String>,
}

impl LocalUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            profile_image: None,
        }
    }

    pub fn profile(&self) -> SenderProfile {
        SenderProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            profile_image: self.profile_image.clone(),
        }
    }
}

/// The open thread: its merged message collection plus paging and typing state.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationState {
    pub thread_id: String,
    pub messages: MessageStore,
    pub next_cursor: Option<String>,
    pub can_load_older: bool,
    pub typing_user_ids: BTreeSet<String>,
}

impl ConversationState {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            messages: MessageStore::new(),
            next_cursor: None,
            can_load_older: false,
            typing_user_ids: BTreeSet::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComposerState {
    pub text: String,
    pub attachments: Vec<LocalAttachment>,
}

impl ComposerState {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.attachments.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusyState {
    pub loading_threads: bool,
    pub loading_messages: bool,
    pub loading_older: bool,
    pub sending: bool,
}

impl BusyState {
    pub fn idle() -> Self {
        Self {
            loading_threads: false,
            loading_messages: false,
            loading_older: false,
            sending: false,
        }
    }
}
