use config::{Policy, PolicyStore};
use mac_focus_watcher::ActivationEvent;
use mac_input_source::InputSource;
use tokio::sync::mpsc::{self, UnboundedReceiver};

use crate::Result;

// ---- Input source gateway ----

/// Input source operations used by the engine.
pub trait InputSourceApi: Send + Sync {
    /// Selectable keyboard sources ordered by display name.
    fn selectable_sources(&self) -> Vec<InputSource>;
    /// The installed source with exactly this id.
    fn resolve(&self, id: &str) -> Option<InputSource>;
    /// Make `source` the active input source.
    fn select(&self, source: &InputSource) -> mac_input_source::Result<()>;
    /// Best-effort id of the active input source.
    fn current_source_id(&self) -> Option<String>;
}

/// [`InputSourceApi`] backed by Carbon Text Input Sources.
pub struct RealInputSourceApi;

impl InputSourceApi for RealInputSourceApi {
    fn selectable_sources(&self) -> Vec<InputSource> {
        mac_input_source::selectable_keyboard_sources()
    }
    fn resolve(&self, id: &str) -> Option<InputSource> {
        mac_input_source::find(id)
    }
    fn select(&self, source: &InputSource) -> mac_input_source::Result<()> {
        mac_input_source::select(&source.id)
    }
    fn current_source_id(&self) -> Option<String> {
        mac_input_source::current_source_id()
    }
}

// ---- Foreground application ----

/// Reads the foreground application directly from the OS.
pub trait FrontmostApi: Send + Sync {
    /// Bundle id of the foreground application.
    fn frontmost_app_id(&self) -> Option<String>;
}

/// [`FrontmostApi`] backed by `NSWorkspace`.
pub struct RealFrontmostApi;

impl FrontmostApi for RealFrontmostApi {
    fn frontmost_app_id(&self) -> Option<String> {
        mac_focus_watcher::frontmost_app_id()
    }
}

// ---- Activation events ----

/// Source of foreground-application activation events.
pub trait ActivationApi: Send + Sync {
    /// Establish the subscription. Events arrive in OS order, one per activation.
    fn subscribe(&self) -> Result<UnboundedReceiver<ActivationEvent>>;
}

/// [`ActivationApi`] backed by the NSWorkspace observer.
///
/// Requires `mac_focus_watcher::set_main_proxy` to have been called on the
/// main thread.
pub struct RealActivationApi;

impl ActivationApi for RealActivationApi {
    fn subscribe(&self) -> Result<UnboundedReceiver<ActivationEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        mac_focus_watcher::start_watcher(tx)?;
        Ok(rx)
    }
}

// ---- Policy ----

/// Provides the latest policy at the start of every decision.
pub trait PolicySource: Send {
    /// Latest committed policy.
    fn policy(&self) -> Policy;
}

impl PolicySource for PolicyStore {
    fn policy(&self) -> Policy {
        self.snapshot()
    }
}

impl PolicySource for Policy {
    fn policy(&self) -> Policy {
        self.clone()
    }
}
