//! Reconciliation primitives for a direct-message client.
//!
//! Three streams write into the same conversation state: paginated history, the local
//! optimistic send pipeline, and server push. Everything here is a pure function or a
//! plain data structure so that each stream can funnel its writes through the same merge
//! rules regardless of arrival order. Evaluation time is always passed in; nothing in
//! this crate reads a clock.

pub mod echo;
pub mod message;
pub mod presence;
pub mod receipts;
pub mod store;
pub mod thread;

pub use echo::{classify_push, EchoLedger, EchoVerdict, DEFAULT_ECHO_TTL};
pub use message::{
    is_temp_id, new_temp_id, Attachment, AttachmentKind, AttachmentMetadata, Message,
    SenderProfile, TEMP_ID_PREFIX,
};
pub use presence::{
    cleanup_presence, default_presence_threshold, derive_status, has_presence_changed,
    merge_presence, revalidate_presence, PresenceEntry, PresenceState, PresenceStatus,
    PresenceUpdate, DEFAULT_PRESENCE_THRESHOLD_SECS,
};
pub use receipts::ReadReceiptTracker;
pub use store::{merge_messages, MessageStore};
pub use thread::{
    fold_inbound, participant_ids, participant_presence, reconcile_thread_list, sort_threads,
    Participant, ThreadSummary,
};
