// Defaults for policy fields

use crate::IndicatorColor;

/// Automatic switching is on for a fresh install.
pub(crate) const ENABLED: bool = true;

pub(crate) const STATUS_DOT: IndicatorColor = IndicatorColor::Green;
pub(crate) const SWITCH_DOT: IndicatorColor = IndicatorColor::Yellow;

// Serde default functions
pub(crate) const fn default_enabled() -> bool {
    ENABLED
}
pub(crate) const fn default_status_dot() -> IndicatorColor {
    STATUS_DOT
}
pub(crate) const fn default_switch_dot() -> IndicatorColor {
    SWITCH_DOT
}
