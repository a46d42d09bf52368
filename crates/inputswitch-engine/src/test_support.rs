//! Test support utilities for inputswitch-engine integration/unit tests.
//! These mocks stand in for the macOS services and record the calls made
//! against them. They are intended for use by the test suite only.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

use mac_focus_watcher::ActivationEvent;
use mac_input_source::InputSource;
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::{ActivationApi, FrontmostApi, InputSourceApi, Result};

/// In-memory input source gateway.
///
/// `select` succeeds by making the selected source current, unless a failure
/// status has been configured with [`MockInputSourceApi::set_fail_select`].
#[derive(Default)]
pub struct MockInputSourceApi {
    sources: Mutex<Vec<InputSource>>,
    current: Mutex<Option<String>>,
    calls: Mutex<Vec<String>>,
    fail_select: AtomicBool,
    fail_status: AtomicI32,
    current_unreadable: AtomicBool,
}

impl MockInputSourceApi {
    /// Gateway knowing `ids` (display name = id), with `current` selected.
    pub fn new(ids: &[&str], current: &str) -> Self {
        let mock = Self::default();
        mock.set_sources(
            ids.iter()
                .map(|id| InputSource {
                    id: (*id).to_string(),
                    name: (*id).to_string(),
                    icon_url: None,
                })
                .collect(),
        );
        mock.set_current(Some(current));
        mock
    }
    pub fn set_sources(&self, sources: Vec<InputSource>) {
        *self.sources.lock() = sources;
    }
    pub fn set_current(&self, id: Option<&str>) {
        *self.current.lock() = id.map(str::to_string);
    }
    /// Make `select` fail with `status`.
    pub fn set_fail_select(&self, fail: bool, status: i32) {
        self.fail_status.store(status, Ordering::SeqCst);
        self.fail_select.store(fail, Ordering::SeqCst);
    }
    /// Make `current_source_id` report nothing.
    pub fn set_current_unreadable(&self, v: bool) {
        self.current_unreadable.store(v, Ordering::SeqCst);
    }
    /// Source ids passed to `select`, in call order.
    pub fn select_calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| c.strip_prefix("select:").map(str::to_string))
            .collect()
    }
    /// Every recorded call, e.g. `resolve:<id>` or `select:<id>`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

impl InputSourceApi for MockInputSourceApi {
    fn selectable_sources(&self) -> Vec<InputSource> {
        let mut v = self.sources.lock().clone();
        v.sort_by_cached_key(|s| s.name.to_lowercase());
        v
    }
    fn resolve(&self, id: &str) -> Option<InputSource> {
        self.calls.lock().push(format!("resolve:{id}"));
        self.sources.lock().iter().find(|s| s.id == id).cloned()
    }
    fn select(&self, source: &InputSource) -> mac_input_source::Result<()> {
        self.calls.lock().push(format!("select:{}", source.id));
        if self.fail_select.load(Ordering::SeqCst) {
            return Err(mac_input_source::Error::Select {
                id: source.id.clone(),
                status: self.fail_status.load(Ordering::SeqCst),
            });
        }
        *self.current.lock() = Some(source.id.clone());
        Ok(())
    }
    fn current_source_id(&self) -> Option<String> {
        if self.current_unreadable.load(Ordering::SeqCst) {
            return None;
        }
        self.current.lock().clone()
    }
}

/// Foreground application reader with a settable answer.
#[derive(Default)]
pub struct MockFrontmostApi {
    app: Mutex<Option<String>>,
}

impl MockFrontmostApi {
    pub fn new(app: Option<&str>) -> Self {
        Self {
            app: Mutex::new(app.map(str::to_string)),
        }
    }
    pub fn set(&self, app: Option<&str>) {
        *self.app.lock() = app.map(str::to_string);
    }
}

impl FrontmostApi for MockFrontmostApi {
    fn frontmost_app_id(&self) -> Option<String> {
        self.app.lock().clone()
    }
}

/// Activation source driven by [`MockActivationApi::activate`].
pub struct MockActivationApi {
    tx: UnboundedSender<ActivationEvent>,
    rx: Mutex<Option<UnboundedReceiver<ActivationEvent>>>,
    subscriptions: AtomicUsize,
}

impl Default for MockActivationApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockActivationApi {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            subscriptions: AtomicUsize::new(0),
        }
    }
    /// Deliver an activation for `app_id`.
    pub fn activate(&self, app_id: &str) {
        let _ = self.tx.send(ActivationEvent::for_app(app_id));
    }
    /// Number of times `subscribe` has been called.
    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

impl ActivationApi for MockActivationApi {
    fn subscribe(&self) -> Result<UnboundedReceiver<ActivationEvent>> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        self.rx.lock().take().ok_or(crate::Error::ChannelClosed)
    }
}
