//! mac-focus-watcher: observe foreground application changes on macOS.
//!
//! Activation events come from `NSWorkspaceDidActivateApplicationNotification`,
//! delivered on the main thread one at a time in the order AppKit posts them.
//! Each event is forwarded, unmodified and uncoalesced, into a single tokio
//! channel.
//!
//! Integration overview (no code):
//! - Call `set_main_proxy` exactly once on the Tao main thread after creating
//!   the event loop; this allows cross-thread requests to install the
//!   NSWorkspace observer.
//! - When your app is ready to start tracking, call `start_watcher(tx)` from
//!   any thread. This will:
//!   - Register `tx` as the sink for [`ActivationEvent`]s.
//!   - Post a request to the Tao event loop to install the NSWorkspace observer
//!     on the main thread.
//! - In the Tao event loop, handle the posted `Event::UserEvent(())` by calling
//!   `install_ns_workspace_observer()` on the main thread. That function is
//!   idempotent; only the first call performs installation.
//! - [`frontmost_app_id`] reads the current foreground application directly
//!   and may be called from any thread.
//!
//! All operations are macOS-only.

mod event;
mod frontmost;
mod ns;

pub use event::ActivationEvent;
pub use frontmost::frontmost_app_id;
pub use ns::{install_ns_workspace_observer, set_main_proxy, wake_main_loop};

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

/// Errors that can occur when interacting with mac-focus-watcher public APIs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("NS main proxy not set; call set_main_proxy() on the main thread first")]
    MainProxyNotSet,
    #[error("NS main proxy mutex poisoned")]
    MainProxyPoisoned,
    #[error("Failed to post install request to main thread")]
    PostEventFailed,
    #[error("NS observer state mutex poisoned")]
    NsObserverPoisoned,
}

/// Starts the activation watcher.
///
/// Preconditions:
/// - The Tao main thread must have provided its `EventLoopProxy<()>` via
///   [`set_main_proxy`] so that the NSWorkspace observer can be installed on
///   the main thread.
///
/// Effects:
/// - Registers `tx` as the sink for [`ActivationEvent`]s, replacing any
///   previous sink.
/// - Posts exactly one Tao user event, `Event::UserEvent(())`, requesting
///   installation of the NSWorkspace observer. Handle it in your Tao event
///   loop by calling [`install_ns_workspace_observer`].
pub fn start_watcher(tx: UnboundedSender<ActivationEvent>) -> Result<(), Error> {
    ns::set_ns_sink(tx);
    ns::request_ns_observer_install()
}
