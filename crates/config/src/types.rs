//! Policy data types consumed by the switching engine.

use serde::{Deserialize, Serialize};

use crate::defaults;

/// Which applications take part in automatic switching.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum FilterMode {
    /// Every application is eligible.
    #[default]
    All,
    /// Only applications on the filter list are eligible.
    Whitelist,
    /// Applications on the filter list are excluded.
    Blacklist,
}

impl FilterMode {
    /// All modes in presentation order.
    pub const ALL: [Self; 3] = [Self::All, Self::Whitelist, Self::Blacklist];

    /// Short human-readable label.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::All => "All applications",
            Self::Whitelist => "Whitelist only",
            Self::Blacklist => "Exclude blacklist",
        }
    }

    /// Parse a lowercase mode name as used on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "all" => Some(Self::All),
            "whitelist" => Some(Self::Whitelist),
            "blacklist" => Some(Self::Blacklist),
            _ => None,
        }
    }
}

/// Pin one input source regardless of the foreground application.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct GlobalLock {
    /// When true, the lock overrides every other policy field.
    pub active: bool,
    /// Input source the lock pins. Kept when the lock is released.
    pub source_id: String,
}

/// One application → input source rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Mapping {
    /// Bundle identifier of the application (e.g. `com.apple.Terminal`).
    pub app_id: String,
    /// TIS input source identifier (e.g. `com.apple.keylayout.US`).
    pub source_id: String,
}

impl Mapping {
    /// Construct a mapping from borrowed identifiers.
    pub fn new(app_id: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            source_id: source_id.into(),
        }
    }
}

/// Color presets for the menu-bar indicator dots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorColor {
    /// System green.
    Green,
    /// System yellow.
    Yellow,
    /// System orange.
    Orange,
    /// System red.
    Red,
    /// System blue.
    Blue,
    /// System pink.
    Pink,
    /// Plain white.
    White,
}

impl IndicatorColor {
    /// All presets in presentation order.
    pub const ALL: [Self; 7] = [
        Self::Green,
        Self::Yellow,
        Self::Orange,
        Self::Red,
        Self::Blue,
        Self::Pink,
        Self::White,
    ];

    /// Lowercase preset name, identical to the serialized form.
    pub fn name(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Orange => "orange",
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Pink => "pink",
            Self::White => "white",
        }
    }

    /// sRGB components matching the macOS system palette (light appearance).
    pub fn rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Green => (52, 199, 89),
            Self::Yellow => (255, 204, 0),
            Self::Orange => (255, 149, 0),
            Self::Red => (255, 59, 48),
            Self::Blue => (0, 122, 255),
            Self::Pink => (255, 45, 85),
            Self::White => (255, 255, 255),
        }
    }

    /// Parse a preset name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Menu-bar indicator colors. Never consulted by the switching decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Indicator {
    /// Dot shown while automatic switching is enabled.
    #[serde(default = "defaults::default_status_dot")]
    pub status_dot: IndicatorColor,
    /// Dot flashed after a successful switch.
    #[serde(default = "defaults::default_switch_dot")]
    pub switch_dot: IndicatorColor,
}

impl Default for Indicator {
    fn default() -> Self {
        Self {
            status_dot: defaults::STATUS_DOT,
            switch_dot: defaults::SWITCH_DOT,
        }
    }
}

/// Complete switching policy as persisted in the policy file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Policy {
    /// Master switch for automatic switching. Ignored while the global lock is active.
    #[serde(default = "defaults::default_enabled")]
    pub enabled: bool,

    /// Global lock state.
    #[serde(default)]
    pub global_lock: GlobalLock,

    /// Interpretation of `filter_list`.
    #[serde(default)]
    pub filter_mode: FilterMode,

    /// Application identifiers, insertion-ordered for display.
    #[serde(default)]
    pub filter_list: Vec<String>,

    /// Ordered mapping list. Order matters only for presentation.
    #[serde(default)]
    pub mappings: Vec<Mapping>,

    /// Menu-bar indicator colors.
    #[serde(default)]
    pub indicator: Indicator,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            enabled: defaults::ENABLED,
            global_lock: GlobalLock::default(),
            filter_mode: FilterMode::default(),
            filter_list: Vec::new(),
            mappings: Vec::new(),
            indicator: Indicator::default(),
        }
    }
}

impl Policy {
    /// Whether `app_id` is eligible for automatic switching under the filter.
    pub fn filter_allows(&self, app_id: &str) -> bool {
        match self.filter_mode {
            FilterMode::All => true,
            FilterMode::Whitelist => self.filter_list.iter().any(|a| a == app_id),
            FilterMode::Blacklist => !self.filter_list.iter().any(|a| a == app_id),
        }
    }

    /// The first mapping whose application identifier equals `app_id`.
    pub fn mapping_for(&self, app_id: &str) -> Option<&Mapping> {
        self.mappings.iter().find(|m| m.app_id == app_id)
    }

    /// Position of the mapping for `app_id` in the ordered list.
    pub(crate) fn mapping_index(&self, app_id: &str) -> Option<usize> {
        self.mappings.iter().position(|m| m.app_id == app_id)
    }
}
