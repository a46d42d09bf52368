use objc2_app_kit::NSWorkspace;

use crate::{event::ActivationEvent, ns::event_for_app};

/// The current foreground application, if it has a bundle identifier.
fn frontmost_app() -> Option<ActivationEvent> {
    let app = unsafe { NSWorkspace::sharedWorkspace().frontmostApplication() }?;
    event_for_app(&app)
}

/// Bundle identifier of the current foreground application.
pub fn frontmost_app_id() -> Option<String> {
    frontmost_app().map(|ev| ev.app_id)
}
