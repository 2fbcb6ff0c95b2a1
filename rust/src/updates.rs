use parley_api::{ApiError, MessagePage, SentMessage, ThreadEvent};
use parley_sync::ThreadSummary;

use crate::state::{AppState, ComposerState};
use crate::AppAction;

#[derive(Clone, Debug)]
pub enum AppUpdate {
    FullState(AppState),
}

impl AppUpdate {
    pub fn rev(&self) -> u64 {
        match self {
            AppUpdate::FullState(s) => s.rev,
        }
    }
}

#[derive(Debug)]
pub enum CoreMsg {
    Action(AppAction),
    Internal(Box<InternalEvent>),
}

#[derive(Debug)]
pub enum InternalEvent {
    // Async results
    ThreadsLoaded {
        token: u64,
        result: Result<Vec<ThreadSummary>, ApiError>,
    },
    MessagesLoaded {
        thread_id: String,
        generation: u64,
        older: bool,
        result: Result<MessagePage, ApiError>,
    },
    SendFinished {
        thread_id: String,
        temp_id: String,
        // Restored into the composer if the send fails.
        draft: ComposerState,
        result: Result<SentMessage, ApiError>,
    },
    ReadReceiptsPosted {
        thread_id: String,
        message_ids: Vec<String>,
        result: Result<(), ApiError>,
    },

    // Push path. `token` identifies the subscription that produced the event.
    Realtime {
        token: u64,
        event: ThreadEvent,
    },

    // Timers
    PresenceTick,
    ReadReceiptsDue {
        thread_id: String,
    },
    ActivitySettled {
        token: u64,
    },
    TypingExpired {
        thread_id: String,
        user_id: String,
        token: u64,
    },
}
