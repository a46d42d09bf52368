use std::{ptr::NonNull, sync::Mutex};

use block2::StackBlock;
use objc2_app_kit::{
    NSRunningApplication, NSWorkspace, NSWorkspaceApplicationKey,
    NSWorkspaceDidActivateApplicationNotification,
};
use objc2_foundation::NSNotification;
use once_cell::sync::Lazy;
use tao::event_loop::EventLoopProxy;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, trace};

use crate::event::ActivationEvent;

// Global sink for NSWorkspace activation events (emitted on the main thread)
static NS_SINK: Lazy<Mutex<Option<UnboundedSender<ActivationEvent>>>> =
    Lazy::new(|| Mutex::new(None));

/// Set the sink used by NSWorkspace notifications to forward activation events.
///
/// Must be called before requesting installation of the NSWorkspace observer.
pub(crate) fn set_ns_sink(tx: UnboundedSender<ActivationEvent>) {
    if let Ok(mut guard) = NS_SINK.lock() {
        *guard = Some(tx);
    }
}

// Main-thread proxy to schedule installs safely on TAO event loop
static MAIN_PROXY: Lazy<Mutex<Option<EventLoopProxy<()>>>> = Lazy::new(|| Mutex::new(None));

/// Provide the Tao main-thread `EventLoopProxy<()>` for scheduling installation
/// of the NSWorkspace observer.
///
/// When to call:
/// - Call exactly once on the Tao main thread, after creating the event loop
///   and before calling [`crate::start_watcher`].
pub fn set_main_proxy(proxy: EventLoopProxy<()>) {
    if let Ok(mut g) = MAIN_PROXY.lock() {
        *g = Some(proxy);
    }
}

/// Request installation of the NSWorkspace observer on the main thread.
///
/// Posts a user event via the stored Tao `EventLoopProxy<()>`; the Tao event
/// loop handles it by calling [`install_ns_workspace_observer`].
pub(crate) fn request_ns_observer_install() -> Result<(), crate::Error> {
    match MAIN_PROXY.lock() {
        Ok(guard) => match &*guard {
            Some(p) => {
                if p.send_event(()).is_err() {
                    return Err(crate::Error::PostEventFailed);
                }
                Ok(())
            }
            None => Err(crate::Error::MainProxyNotSet),
        },
        Err(_) => Err(crate::Error::MainProxyPoisoned),
    }
}

/// Post a generic Tao `UserEvent(())` to wake the main event loop.
///
/// Useful when other threads flip control flags (e.g., shutdown requests)
/// while the loop waits in `ControlFlow::Wait`.
pub fn wake_main_loop() -> Result<(), crate::Error> {
    request_ns_observer_install()
}

/// Forward an activation into the NS sink; used by the NSWorkspace callback.
pub(crate) fn ns_emit_activation(ev: ActivationEvent) {
    if let Ok(guard) = NS_SINK.lock()
        && let Some(tx) = &*guard
    {
        let _ = tx.send(ev);
    }
}

/// Extract an [`ActivationEvent`] from a running application.
pub(crate) fn event_for_app(app: &NSRunningApplication) -> Option<ActivationEvent> {
    let (app_id, name, pid) = unsafe {
        (
            app.bundleIdentifier().map(|s| s.to_string())?,
            app.localizedName().map(|s| s.to_string()).unwrap_or_default(),
            app.processIdentifier(),
        )
    };
    if app_id.is_empty() {
        return None;
    }
    Some(ActivationEvent { app_id, name, pid })
}

// Global flag recording that the NSWorkspace observer is installed
static NS_OBS_INSTALLED: Lazy<Mutex<bool>> = Lazy::new(|| Mutex::new(false));

/// Install the NSWorkspace activation observer on the current (main) thread.
///
/// When to call:
/// - From the Tao event loop, in response to the user event posted by
///   [`crate::start_watcher`] (after you've called [`set_main_proxy`]).
///
/// Notes:
/// - Must run on the main thread.
/// - Idempotent: subsequent calls are no-ops; only the first call performs the install.
/// - The observer lives for the rest of the process; the notification center
///   retains the block.
pub fn install_ns_workspace_observer() -> Result<(), crate::Error> {
    if let Ok(mut installed) = NS_OBS_INSTALLED.lock() {
        if *installed {
            return Ok(());
        }
        unsafe {
            let ws = NSWorkspace::sharedWorkspace();
            let center = ws.notificationCenter();
            let block = StackBlock::new(move |notif: NonNull<NSNotification>| {
                let notif = notif.as_ref();
                let ev = notif
                    .userInfo()
                    .and_then(|info| info.objectForKey(NSWorkspaceApplicationKey))
                    .and_then(|obj| {
                        obj.downcast_ref::<NSRunningApplication>()
                            .and_then(event_for_app)
                    });
                match ev {
                    Some(ev) => {
                        trace!("activation app_id={} pid={}", ev.app_id, ev.pid);
                        ns_emit_activation(ev);
                    }
                    None => trace!("activation without bundle identifier; ignored"),
                }
            })
            .copy();
            let _token = center.addObserverForName_object_queue_usingBlock(
                Some(NSWorkspaceDidActivateApplicationNotification),
                None,
                None,
                &block,
            );
            *installed = true;
            info!("NSWorkspace activation observer installed");
        }
        Ok(())
    } else {
        Err(crate::Error::NsObserverPoisoned)
    }
}
