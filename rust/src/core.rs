mod config;
mod history;
mod intake;
mod presence;
mod receipts;
mod send;
mod threads;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use flume::Sender;
use parley_api::{ChatApi, RealtimeAdapter, Subscription};
use parley_sync::{EchoLedger, ReadReceiptTracker};

use crate::actions::AppAction;
use crate::state::{AppState, BusyState, LocalUser};
use crate::updates::{AppUpdate, CoreMsg, InternalEvent};

pub(crate) use config::{default_app_config_json, load_app_config, AppConfig};

const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

pub(crate) struct AppCore {
    pub(crate) state: AppState,
    rev: u64,

    update_sender: Sender<AppUpdate>,
    core_sender: Sender<CoreMsg>,
    shared_state: Arc<RwLock<AppState>>,

    config: AppConfig,
    runtime: tokio::runtime::Runtime,
    api: Arc<dyn ChatApi>,
    realtime: Arc<dyn RealtimeAdapter>,

    // Actor-internal bookkeeping, never published.
    echo_ledger: EchoLedger,
    receipts: ReadReceiptTracker,
    receipts_scheduled: HashSet<String>,
    sending_threads: HashSet<String>,
    subscription: Option<Subscription>,
    subscription_token: u64,
    // Bumped on every thread switch; history pages from an older generation are dropped.
    history_generation: u64,
    threads_token: u64,
    activity_token: u64,
    typing_tokens: HashMap<(String, String), u64>,
    next_typing_token: u64,
    visible: bool,
    shut_down: bool,
}

impl AppCore {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        update_sender: Sender<AppUpdate>,
        core_sender: Sender<CoreMsg>,
        config: AppConfig,
        local_user: LocalUser,
        shared_state: Arc<RwLock<AppState>>,
        api: Arc<dyn ChatApi>,
        realtime: Arc<dyn RealtimeAdapter>,
    ) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_time()
            .enable_io()
            .build()?;

        let echo_ledger = EchoLedger::new(config.echo_ttl());
        let this = Self {
            state: AppState::empty(local_user),
            rev: 0,
            update_sender,
            core_sender,
            shared_state,
            config,
            runtime,
            api,
            realtime,
            echo_ledger,
            receipts: ReadReceiptTracker::new(),
            receipts_scheduled: HashSet::new(),
            sending_threads: HashSet::new(),
            subscription: None,
            subscription_token: 0,
            history_generation: 0,
            threads_token: 0,
            activity_token: 0,
            typing_tokens: HashMap::new(),
            next_typing_token: 0,
            visible: true,
            shut_down: false,
        };

        this.start_presence_ticker();

        // Ensure ParleyApp.state() has an immediately-available snapshot.
        let snapshot = this.state.clone();
        this.commit_state_snapshot(&snapshot);
        Ok(this)
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Give fire-and-forget work (offline beacons) a moment to leave, then stop the runtime.
    pub(crate) fn shutdown(self) {
        self.runtime.shutdown_timeout(SHUTDOWN_GRACE);
    }

    fn next_rev(&mut self) -> u64 {
        self.rev += 1;
        self.state.rev = self.rev;
        self.rev
    }

    fn commit_state_snapshot(&self, snapshot: &AppState) {
        match self.shared_state.write() {
            Ok(mut g) => *g = snapshot.clone(),
            Err(poison) => *poison.into_inner() = snapshot.clone(),
        }
    }

    fn emit_state(&mut self) {
        self.next_rev();
        let snapshot = self.state.clone();
        self.commit_state_snapshot(&snapshot);
        let _ = self.update_sender.send(AppUpdate::FullState(snapshot));
    }

    fn toast(&mut self, msg: impl Into<String>) {
        // Keep toast in state until the UI explicitly clears it.
        self.state.toast = Some(msg.into());
        self.emit_state();
    }

    fn set_busy(&mut self, f: impl FnOnce(&mut BusyState)) {
        let mut next = self.state.busy.clone();
        f(&mut next);
        if next != self.state.busy {
            self.state.busy = next;
            self.emit_state();
        }
    }

    /// Deliver `event` back to the actor after `delay`.
    fn schedule(&self, delay: Duration, event: InternalEvent) {
        let tx = self.core_sender.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(CoreMsg::Internal(Box::new(event)));
        });
    }

    fn start_presence_ticker(&self) {
        let tx = self.core_sender.clone();
        let period = self.config.presence_revalidate();
        self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx
                    .send(CoreMsg::Internal(Box::new(InternalEvent::PresenceTick)))
                    .is_err()
                {
                    break;
                }
            }
        });
    }

    pub(crate) fn handle_message(&mut self, msg: CoreMsg) {
        if self.shut_down {
            return;
        }
        match msg {
            CoreMsg::Action(action) => {
                // Never log `?action` directly: it can carry message text.
                tracing::info!(action = action.tag(), "dispatch");
                self.handle_action(action);
            }
            CoreMsg::Internal(internal) => self.handle_internal(*internal),
        }
    }

    fn handle_internal(&mut self, internal: InternalEvent) {
        match internal {
            InternalEvent::ThreadsLoaded { token, result } => {
                self.handle_threads_loaded(token, result);
            }
            InternalEvent::MessagesLoaded {
                thread_id,
                generation,
                older,
                result,
            } => {
                self.handle_messages_loaded(&thread_id, generation, older, result);
            }
            InternalEvent::SendFinished {
                thread_id,
                temp_id,
                draft,
                result,
            } => {
                self.handle_send_finished(thread_id, temp_id, draft, result);
            }
            InternalEvent::ReadReceiptsPosted {
                thread_id,
                message_ids,
                result,
            } => {
                self.handle_read_receipts_posted(&thread_id, message_ids, result);
            }
            InternalEvent::Realtime { token, event } => {
                // Ignore events still queued from a subscription we already dropped.
                if token != self.subscription_token {
                    tracing::debug!(thread_id = %event.thread_id, "dropping event from stale subscription");
                    return;
                }
                self.handle_realtime(event);
            }
            InternalEvent::PresenceTick => self.handle_presence_tick(),
            InternalEvent::ReadReceiptsDue { thread_id } => {
                self.receipts_scheduled.remove(&thread_id);
                self.flush_read_receipts(&thread_id);
            }
            InternalEvent::ActivitySettled { token } => self.handle_activity_settled(token),
            InternalEvent::TypingExpired {
                thread_id,
                user_id,
                token,
            } => self.handle_typing_expired(thread_id, user_id, token),
        }
    }

    fn handle_action(&mut self, action: AppAction) {
        match action {
            // Thread list
            AppAction::LoadThreads => self.load_threads(),
            AppAction::SelectThread { thread_id } => self.select_thread(&thread_id),
            AppAction::CloseThread => self.close_thread(),

            // Conversation
            AppAction::LoadOlderMessages => self.load_older_messages(),
            AppAction::MessagesVisible { message_ids } => self.messages_visible(&message_ids),

            // Composer
            AppAction::SetComposerText { text } => {
                if self.state.composer.text != text {
                    self.state.composer.text = text;
                    self.emit_state();
                }
            }
            AppAction::AddAttachment { attachment } => self.add_attachment(attachment),
            AppAction::RemoveAttachment { attachment_id } => {
                let before = self.state.composer.attachments.len();
                self.state
                    .composer
                    .attachments
                    .retain(|a| a.id != attachment_id);
                if self.state.composer.attachments.len() != before {
                    self.emit_state();
                }
            }
            AppAction::SendMessage => self.send_message(),

            // Presence
            AppAction::UserActivity => self.user_activity(),
            AppAction::VisibilityChanged { visible } => self.visibility_changed(visible),

            // UI
            AppAction::ClearToast => {
                if self.state.toast.is_some() {
                    self.state.toast = None;
                    self.emit_state();
                }
            }

            // Lifecycle
            AppAction::Shutdown => {
                if let Some(thread_id) = self.state.selected_thread_id.clone() {
                    self.send_offline_beacon(&thread_id);
                }
                self.subscription = None;
                self.shut_down = true;
            }
        }
    }
}
