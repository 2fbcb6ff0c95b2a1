use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use parley_core::{AppReconciler, AppState, AppUpdate};

pub fn wait_until(what: &str, timeout: Duration, f: impl FnMut() -> bool) {
    wait_until_with_poll(what, timeout, Duration::from_millis(20), f);
}

pub fn wait_until_with_poll(
    what: &str,
    timeout: Duration,
    poll: Duration,
    mut f: impl FnMut() -> bool,
) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if f() {
            return;
        }
        std::thread::sleep(poll);
    }
    panic!("{what}: condition not met within {timeout:?}");
}

/// Short timers so debounce and expiry paths finish inside a test. Keys in `overrides`
/// replace the defaults written here.
pub fn write_config(data_dir: &str, overrides: serde_json::Value) {
    let path = std::path::Path::new(data_dir).join("parley_config.json");
    let mut v = serde_json::json!({
        "api_base_url": "http://127.0.0.1:9",
        "activity_debounce_ms": 100,
        "read_receipt_debounce_ms": 20,
        "typing_ttl_ms": 200,
        "heartbeat_retry_base_ms": 1,
    });
    if let (Some(base), serde_json::Value::Object(extra)) = (v.as_object_mut(), overrides) {
        base.extend(extra);
    }
    std::fs::write(path, serde_json::to_vec(&v).unwrap()).unwrap();
}

pub fn message_ids(state: &AppState) -> Vec<String> {
    state.messages().iter().map(|m| m.id.clone()).collect()
}

#[derive(Clone)]
pub struct Collector(pub Arc<Mutex<Vec<AppUpdate>>>);

impl Collector {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn revs(&self) -> Vec<u64> {
        self.0.lock().unwrap().iter().map(AppUpdate::rev).collect()
    }

    pub fn last_toast(&self) -> Option<String> {
        self.0.lock().unwrap().iter().rev().find_map(|u| match u {
            AppUpdate::FullState(s) => s.toast.clone(),
        })
    }

    /// Every published message list, oldest first.
    pub fn message_snapshots(&self) -> Vec<Vec<String>> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .map(|u| match u {
                AppUpdate::FullState(s) => message_ids(s),
            })
            .collect()
    }
}

impl AppReconciler for Collector {
    fn reconcile(&self, update: AppUpdate) {
        self.0.lock().unwrap().push(update);
    }
}
