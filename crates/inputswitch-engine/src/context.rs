use time::OffsetDateTime;

use crate::history::LogEntry;

/// Engine-owned view of the foreground app and active input source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineContext {
    /// Bundle id of the application most recently activated.
    pub current_app_id: String,
    /// Last-known active input source.
    pub current_source_id: String,
    /// Time of the last successful switch.
    pub last_switch_at: Option<OffsetDateTime>,
    /// Changes on every successful switch; carries no other meaning.
    pub last_switch_signal: u64,
    /// Most recent switch error, cleared by the next successful switch.
    pub last_error: Option<String>,
}

/// Published read-only engine state.
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    /// Context at the time of publication.
    pub context: EngineContext,
    /// Log history, newest-first.
    pub logs: Vec<LogEntry>,
    /// Incremented on every published change.
    pub version: u64,
}

/// Change notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Context fields changed.
    ContextChanged,
    /// A switch succeeded; `signal` is the new `last_switch_signal`.
    Switched {
        /// New switch signal.
        signal: u64,
    },
    /// A log entry was inserted.
    Logged(LogEntry),
    /// The log history was cleared.
    LogsCleared,
}

/// Requests posted to the engine actor through an `EngineHandle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Manually switch to a source, bypassing policy.
    TestSwitch(String),
    /// Re-read foreground app and input source.
    Refresh,
    /// Empty the log history.
    ClearLogs,
    /// Stop the actor loop.
    Shutdown,
}

/// Decision path taken for one activation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing happened: disabled, or locked with an empty target.
    Ignored,
    /// Lock active and the switch to the lock target succeeded.
    LockApplied,
    /// Lock active and the switch to the lock target failed.
    LockFailed,
    /// Lock active and the current source already matched.
    LockHeld,
    /// The application is outside the filter scope.
    SkippedByFilter,
    /// No mapping exists for the application.
    SkippedNoRule,
    /// The mapped source was selected.
    Switched,
    /// Selecting the mapped source failed.
    SwitchFailed,
}
