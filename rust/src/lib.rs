mod actions;
mod core;
mod logging;
mod state;
mod updates;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

use flume::{Receiver, Sender};

pub use actions::AppAction;
pub use logging::init_logging;
pub use parley_api::{
    ApiError, ChatApi, HttpChatApi, InMemoryRealtime, LocalAttachment, MessagePage,
    RealtimeAdapter, RealtimeEvent, SendMessageRequest, SentMessage, Subscription, ThreadEvent,
    UploadedFile,
};
pub use parley_sync::{
    Attachment, AttachmentKind, Message, MessageStore, Participant, PresenceEntry, PresenceState,
    PresenceStatus, SenderProfile, ThreadSummary,
};
pub use state::*;
pub use updates::AppUpdate;

use updates::CoreMsg;

/// Return the default `parley_config.json` payload used when no config file exists.
pub fn default_config_json() -> String {
    core::default_app_config_json()
}

pub trait AppReconciler: Send + Sync + 'static {
    fn reconcile(&self, update: AppUpdate);
}

/// Handle to the app actor. Every state change happens on the actor thread; callers
/// dispatch actions and read snapshots.
pub struct ParleyApp {
    core_tx: Sender<CoreMsg>,
    update_rx: Receiver<AppUpdate>,
    listening: AtomicBool,
    shared_state: Arc<RwLock<AppState>>,
}

impl ParleyApp {
    pub fn new(
        data_dir: String,
        local_user: LocalUser,
        api: Arc<dyn ChatApi>,
        realtime: Arc<dyn RealtimeAdapter>,
    ) -> Self {
        logging::init_logging();
        tracing::info!(data_dir = %data_dir, user_id = %local_user.id, "ParleyApp::new() starting");

        let config = core::load_app_config(&data_dir);
        let (update_tx, update_rx) = flume::unbounded();
        let (core_tx, core_rx) = flume::unbounded::<CoreMsg>();
        let shared_state = Arc::new(RwLock::new(AppState::empty(local_user.clone())));

        // Actor loop thread (single threaded "app actor").
        let core_tx_for_core = core_tx.clone();
        let shared_for_core = shared_state.clone();
        thread::spawn(move || {
            let mut core = match crate::core::AppCore::new(
                update_tx,
                core_tx_for_core,
                config,
                local_user,
                shared_for_core,
                api,
                realtime,
            ) {
                Ok(core) => core,
                Err(e) => {
                    tracing::error!(error = %e, "failed to start app core");
                    return;
                }
            };
            while let Ok(msg) = core_rx.recv() {
                core.handle_message(msg);
                if core.is_shut_down() {
                    break;
                }
            }
            core.shutdown();
            tracing::info!("app core stopped");
        });

        Self {
            core_tx,
            update_rx,
            listening: AtomicBool::new(false),
            shared_state,
        }
    }

    /// Build an app talking to the HTTP API named by the config in `data_dir`
    /// (or `PARLEY_API_URL`).
    pub fn connect(
        data_dir: String,
        local_user: LocalUser,
        realtime: Arc<dyn RealtimeAdapter>,
    ) -> Result<Self, ApiError> {
        let base_url = core::load_app_config(&data_dir).api_base_url();
        let api = HttpChatApi::new(&base_url)?;
        Ok(Self::new(data_dir, local_user, Arc::new(api), realtime))
    }

    pub fn state(&self) -> AppState {
        match self.shared_state.read() {
            Ok(g) => g.clone(),
            Err(poison) => poison.into_inner().clone(),
        }
    }

    pub fn dispatch(&self, action: AppAction) {
        // Contract: never block caller.
        let _ = self.core_tx.send(CoreMsg::Action(action));
    }

    pub fn listen_for_updates(&self, reconciler: Box<dyn AppReconciler>) {
        if self
            .listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Avoid multiple listeners that would split messages.
            return;
        }

        let rx = self.update_rx.clone();
        thread::spawn(move || {
            while let Ok(update) = rx.recv() {
                reconciler.reconcile(update);
            }
        });
    }
}

impl Drop for ParleyApp {
    fn drop(&mut self) {
        let _ = self.core_tx.send(CoreMsg::Action(AppAction::Shutdown));
    }
}
