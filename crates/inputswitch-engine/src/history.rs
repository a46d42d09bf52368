use std::collections::{VecDeque, vec_deque};

use time::OffsetDateTime;

/// Maximum number of retained log entries.
pub const CAPACITY: usize = 80;

/// One diagnostic record of a policy decision or manual switch. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// When the entry was recorded (local time where available).
    pub at: OffsetDateTime,
    /// Application the decision was made for.
    pub app_id: String,
    /// Input source involved.
    pub source_id: String,
    /// Whether the outcome counts as success.
    pub success: bool,
    /// Short human-readable description.
    pub message: String,
}

impl LogEntry {
    /// Create an entry stamped with the current time.
    pub fn now(
        app_id: impl Into<String>,
        source_id: impl Into<String>,
        success: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            at: now(),
            app_id: app_id.into(),
            source_id: source_id.into(),
            success,
            message: message.into(),
        }
    }

    /// Render as a single diagnostics line: `[HH:MM:SS] OK app -> source | message`.
    pub fn line(&self) -> String {
        format!(
            "[{:02}:{:02}:{:02}] {} {} -> {} | {}",
            self.at.hour(),
            self.at.minute(),
            self.at.second(),
            if self.success { "OK" } else { "ERR" },
            self.app_id,
            self.source_id,
            self.message
        )
    }
}

/// Current time in the local offset, falling back to UTC.
pub(crate) fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Bounded, newest-first log of [`LogEntry`] values.
#[derive(Debug, Clone, Default)]
pub struct LogHistory {
    entries: VecDeque<LogEntry>,
}

impl LogHistory {
    /// Empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the front, evicting the oldest entries beyond [`CAPACITY`].
    pub fn push(&mut self, entry: LogEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(CAPACITY);
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are held.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Newest entry.
    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    /// Entries newest-first.
    pub fn iter(&self) -> vec_deque::Iter<'_, LogEntry> {
        self.entries.iter()
    }

    /// Owned copy, newest-first.
    pub fn to_vec(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }
}
