use parley_api::LocalAttachment;

#[derive(Debug, Clone)]
pub enum AppAction {
    // Thread list
    LoadThreads,
    SelectThread {
        thread_id: String,
    },
    CloseThread,

    // Conversation
    LoadOlderMessages,
    MessagesVisible {
        message_ids: Vec<String>,
    },

    // Composer
    SetComposerText {
        text: String,
    },
    AddAttachment {
        attachment: LocalAttachment,
    },
    RemoveAttachment {
        attachment_id: String,
    },
    SendMessage,

    // Presence
    UserActivity,
    VisibilityChanged {
        visible: bool,
    },

    // UI
    ClearToast,

    // Lifecycle
    Shutdown,
}

impl AppAction {
    /// Log-safe action tag (never includes message text or file contents).
    pub fn tag(&self) -> &'static str {
        match self {
            // Thread list
            AppAction::LoadThreads => "LoadThreads",
            AppAction::SelectThread { .. } => "SelectThread",
            AppAction::CloseThread => "CloseThread",

            // Conversation
            AppAction::LoadOlderMessages => "LoadOlderMessages",
            AppAction::MessagesVisible { .. } => "MessagesVisible",

            // Composer
            AppAction::SetComposerText { .. } => "SetComposerText",
            AppAction::AddAttachment { .. } => "AddAttachment",
            AppAction::RemoveAttachment { .. } => "RemoveAttachment",
            AppAction::SendMessage => "SendMessage",

            // Presence
            AppAction::UserActivity => "UserActivity",
            AppAction::VisibilityChanged { .. } => "VisibilityChanged",

            // UI
            AppAction::ClearToast => "ClearToast",

            // Lifecycle
            AppAction::Shutdown => "Shutdown",
        }
    }
}
