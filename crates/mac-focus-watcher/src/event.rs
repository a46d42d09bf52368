//! Event types emitted by the activation watcher.

/// The foreground application changed.
///
/// Semantics:
/// - `app_id` is the bundle identifier of the newly active application and is
///   never empty; activations of processes without a bundle identifier are not
///   reported.
/// - `name` is the localized application name, or empty if unavailable.
/// - `pid` is the process identifier (or -1 if unavailable).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationEvent {
    /// Bundle identifier of the new foreground application.
    pub app_id: String,
    /// Localized display name.
    pub name: String,
    /// Process identifier.
    pub pid: i32,
}

impl ActivationEvent {
    /// Build an event for `app_id` with no name or pid, as used by tests and replays.
    pub fn for_app(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            name: String::new(),
            pid: -1,
        }
    }
}
