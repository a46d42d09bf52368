//! Menu bar status item and its menu.
//!
//! The tray is a view over the policy and the published engine state. It is
//! created and updated on the main thread; menu clicks are forwarded from a
//! listener thread and drained by the event loop.

use std::{
    sync::mpsc::{self, Receiver},
    thread,
    time::{Duration, Instant},
};

use app_catalog::AppInfo;
use config::{IndicatorColor, Policy};
use inputswitch_engine::{EngineContext, EngineHandle, EngineState};
use menu_icon::{IconCache, IconState};
use tracing::{debug, error, trace, warn};
use tray_icon::{
    Icon, TrayIcon, TrayIconBuilder,
    menu::{CheckMenuItem, Menu, MenuEvent, MenuId, MenuItem, PredefinedMenuItem, Submenu},
};

use crate::icons::IconImages;

/// How long the switch dot stays visible after a switch.
pub const PULSE: Duration = Duration::from_millis(900);

/// Number of log lines shown in the diagnostics submenu.
const DIAGNOSTIC_LINES: usize = 8;

/// Menu commands the event loop acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Flip automatic switching.
    ToggleEnabled,
    /// Flip the global lock.
    ToggleLock,
    /// Re-read app and source.
    Refresh,
    /// Switch to the source mapped for the current app, logging the result.
    TestRule,
    /// Map the current app to the current source.
    AddRule,
    /// Empty the diagnostics log.
    ClearLogs,
    /// Pick the status dot color.
    StatusDot(IndicatorColor),
    /// Pick the switch dot color.
    SwitchDot(IndicatorColor),
    /// Exit the agent.
    Quit,
}

/// Tracks the switch signal and the pulse it triggers.
#[derive(Debug, Default, Clone, Copy)]
pub struct Pulse {
    /// Last observed switch signal.
    signal: Option<u64>,
    /// End of the current pulse.
    until: Option<Instant>,
}

impl Pulse {
    /// Record `signal`; a change from a previously seen value starts a pulse.
    pub fn observe(&mut self, signal: u64, now: Instant) {
        if self.signal.is_some_and(|prev| prev != signal) {
            self.until = Some(now + PULSE);
        }
        self.signal = Some(signal);
    }

    /// Whether the pulse is showing at `now`.
    pub fn active(&self, now: Instant) -> bool {
        self.until.is_some_and(|u| now < u)
    }

    /// When the running pulse ends, if one is running.
    pub fn deadline(&self, now: Instant) -> Option<Instant> {
        self.until.filter(|u| now < *u)
    }
}

/// The status item, its menu and the state needed to redraw it.
pub struct Tray {
    /// The status item itself
    icon: TrayIcon,
    /// Disabled row describing app and source
    status: MenuItem,
    /// Disabled row naming the lock target
    lock_row: MenuItem,
    /// "Enable Auto Switch"
    enabled: CheckMenuItem,
    /// "Global Lock"
    lock: CheckMenuItem,
    /// Refresh row
    refresh: MenuItem,
    /// Test the current app's rule
    test_rule: MenuItem,
    /// Add a rule for the current app
    add_rule: MenuItem,
    /// Diagnostics submenu
    diagnostics: Submenu,
    /// Log rows currently inserted in `diagnostics`
    rows: Vec<MenuItem>,
    /// Text of `rows`, used to skip identical rebuilds
    lines: Vec<String>,
    /// Clear Logs row
    clear: MenuItem,
    /// Status dot color choices
    status_colors: Vec<(CheckMenuItem, IndicatorColor)>,
    /// Switch dot color choices
    switch_colors: Vec<(CheckMenuItem, IndicatorColor)>,
    /// Quit row
    quit: MenuItem,
    /// Rendered icon cache
    cache: IconCache,
    /// Glyph and badge images
    images: IconImages,
    /// Installed applications, for display names
    apps: Vec<AppInfo>,
    /// Cache key of the icon currently shown
    icon_key: Option<String>,
    /// Post-switch pulse
    pulse: Pulse,
    /// Engine read side
    handle: EngineHandle,
    /// Menu ids from the listener thread
    clicks: Receiver<MenuId>,
}

impl Tray {
    /// Build the status item and start the menu listener.
    pub fn build(handle: EngineHandle) -> Option<Self> {
        let menu = Menu::new();
        let status = MenuItem::new("Starting…", false, None);
        let lock_row = MenuItem::new("Lock: off", false, None);
        let enabled = CheckMenuItem::new("Enable Auto Switch", true, true, None);
        let lock = CheckMenuItem::new("Global Lock", true, false, None);
        let refresh = MenuItem::new("Refresh", true, None);
        let test_rule = MenuItem::new("Test Rule for Current App", false, None);
        let add_rule = MenuItem::new("Add Rule for Current App", false, None);
        let diagnostics = Submenu::new("Diagnostics", true);
        let clear = MenuItem::new("Clear Logs", true, None);
        let colors = Submenu::new("Icon Colors", true);
        let (status_menu, status_colors) = color_menu("Status Dot");
        let (switch_menu, switch_colors) = color_menu("Switch Dot");
        let _ = colors.append(&status_menu);
        let _ = colors.append(&switch_menu);
        let quit = MenuItem::new("Quit", true, None);

        let _ = diagnostics.append(&PredefinedMenuItem::separator());
        let _ = diagnostics.append(&clear);
        let _ = menu.append(&status);
        let _ = menu.append(&lock_row);
        let _ = menu.append(&PredefinedMenuItem::separator());
        let _ = menu.append(&enabled);
        let _ = menu.append(&lock);
        let _ = menu.append(&refresh);
        let _ = menu.append(&test_rule);
        let _ = menu.append(&add_rule);
        let _ = menu.append(&diagnostics);
        let _ = menu.append(&colors);
        let _ = menu.append(&PredefinedMenuItem::separator());
        let _ = menu.append(&quit);

        let icon = match TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_icon_as_template(false)
            .with_tooltip("inputswitch")
            .build()
        {
            Ok(t) => t,
            Err(e) => {
                error!("failed to create tray icon: {}", e);
                return None;
            }
        };

        let (tx, clicks) = mpsc::channel();
        thread::spawn(move || {
            let menu_rx = MenuEvent::receiver();
            while let Ok(ev) = menu_rx.recv() {
                if tx.send(ev.id).is_err() {
                    break;
                }
                if let Err(e) = mac_focus_watcher::wake_main_loop() {
                    warn!("menu click could not wake main loop: {}", e);
                }
            }
        });

        let apps = app_catalog::discover();
        let mut tray = Self {
            icon,
            status,
            lock_row,
            enabled,
            lock,
            refresh,
            test_rule,
            add_rule,
            diagnostics,
            rows: Vec::new(),
            lines: Vec::new(),
            clear,
            status_colors,
            switch_colors,
            quit,
            cache: IconCache::new(IconCache::default_dir()),
            images: IconImages::default(),
            apps,
            icon_key: None,
            pulse: Pulse::default(),
            handle,
            clicks,
        };
        tray.set_lines(Vec::new());
        Some(tray)
    }

    /// Map a clicked menu id to an action.
    pub fn action_for(&self, id: &MenuId) -> Option<Action> {
        if id == self.enabled.id() {
            Some(Action::ToggleEnabled)
        } else if id == self.lock.id() {
            Some(Action::ToggleLock)
        } else if id == self.refresh.id() {
            Some(Action::Refresh)
        } else if id == self.test_rule.id() {
            Some(Action::TestRule)
        } else if id == self.add_rule.id() {
            Some(Action::AddRule)
        } else if id == self.clear.id() {
            Some(Action::ClearLogs)
        } else if id == self.quit.id() {
            Some(Action::Quit)
        } else if let Some((_, c)) = self.status_colors.iter().find(|(i, _)| i.id() == id) {
            Some(Action::StatusDot(*c))
        } else {
            self.switch_colors
                .iter()
                .find(|(i, _)| i.id() == id)
                .map(|(_, c)| Action::SwitchDot(*c))
        }
    }

    /// Actions clicked since the last call.
    pub fn drain_actions(&self) -> Vec<Action> {
        self.clicks
            .try_iter()
            .filter_map(|id| self.action_for(&id))
            .collect()
    }

    /// Bring the menu and icon up to date.
    ///
    /// Returns the end of a running pulse so the caller can wake up to clear it.
    pub fn sync(&mut self, policy: &Policy, state: &EngineState, now: Instant) -> Option<Instant> {
        let ctx = &state.context;
        self.pulse.observe(ctx.last_switch_signal, now);

        let app_name = if ctx.current_app_id.is_empty() {
            "-".to_string()
        } else {
            app_catalog::display_name_for(&self.apps, &ctx.current_app_id)
        };
        let source_name = if ctx.current_source_id.is_empty() {
            "-".to_string()
        } else {
            self.handle.source_display_name(&ctx.current_source_id)
        };
        self.status.set_text(format!("{app_name}  ·  {source_name}"));
        self.enabled.set_checked(policy.enabled);
        self.lock.set_checked(policy.global_lock.active);
        let lock_text = match &policy.global_lock {
            l if l.active && !l.source_id.is_empty() => {
                format!("Locked: {}", self.handle.source_display_name(&l.source_id))
            }
            l if l.active => "Locked: (no source)".to_string(),
            _ => "Lock: off".to_string(),
        };
        self.lock_row.set_text(lock_text);
        match mapped_source(policy, ctx) {
            Some(id) => {
                let name = self.handle.source_display_name(id);
                self.test_rule.set_text(format!("Test Rule: {app_name} → {name}"));
                self.test_rule.set_enabled(true);
            }
            None => {
                self.test_rule.set_text("Test Rule for Current App");
                self.test_rule.set_enabled(false);
            }
        }
        self.add_rule.set_enabled(rule_for_current(ctx).is_some());
        for (item, c) in &self.status_colors {
            item.set_checked(*c == policy.indicator.status_dot);
        }
        for (item, c) in &self.switch_colors {
            item.set_checked(*c == policy.indicator.switch_dot);
        }

        let mut tooltip = format!("inputswitch: {source_name}");
        if let Some(err) = &ctx.last_error {
            tooltip.push_str(&format!("\nlast error: {err}"));
        }
        if let Err(e) = self.icon.set_tooltip(Some(tooltip)) {
            debug!("tooltip update failed: {}", e);
        }

        let lines = state
            .logs
            .iter()
            .take(DIAGNOSTIC_LINES)
            .map(|e| e.line())
            .collect();
        self.set_lines(lines);

        let icon_state = IconState {
            source_id: ctx.current_source_id.clone(),
            app_id: ctx.current_app_id.clone(),
            enabled: policy.enabled,
            pulse: self.pulse.active(now),
            status_dot: policy.indicator.status_dot,
            switch_dot: policy.indicator.switch_dot,
        };
        self.set_icon(&icon_state);

        self.pulse.deadline(now)
    }

    /// Replace the diagnostics rows unless `lines` is what is already shown.
    fn set_lines(&mut self, lines: Vec<String>) {
        if !self.rows.is_empty() && lines == self.lines {
            return;
        }
        for row in self.rows.drain(..) {
            let _ = self.diagnostics.remove(&row);
        }
        let texts = if lines.is_empty() {
            vec![("No entries".to_string(), false)]
        } else {
            lines.iter().map(|l| (l.clone(), true)).collect()
        };
        for (pos, (text, enabled)) in texts.into_iter().enumerate() {
            let row = MenuItem::new(text, enabled, None);
            let _ = self.diagnostics.insert(&row, pos);
            self.rows.push(row);
        }
        self.lines = lines;
    }

    /// Render and install the icon for `state` if it differs from the shown one.
    fn set_icon(&mut self, state: &IconState) {
        let key = state.cache_key();
        if self.icon_key.as_deref() == Some(key.as_str()) {
            return;
        }
        let (glyph, badge) = self.images.pair(&state.source_id, &state.app_id);
        let img = self.cache.icon(state, glyph, badge);
        let (w, h) = img.dimensions();
        match Icon::from_rgba(img.into_raw(), w, h) {
            Ok(icon) => {
                if let Err(e) = self.icon.set_icon(Some(icon)) {
                    warn!("icon update failed: {}", e);
                    return;
                }
                trace!("icon {}", key);
                self.icon_key = Some(key);
            }
            Err(e) => warn!("bad icon data: {}", e),
        }
    }
}

/// Source mapped for the current application, if it has a non-blank rule.
pub fn mapped_source<'a>(policy: &'a Policy, ctx: &EngineContext) -> Option<&'a str> {
    policy
        .mapping_for(&ctx.current_app_id)
        .map(|m| m.source_id.as_str())
        .filter(|s| !s.trim().is_empty())
}

/// The (app, source) rule "Add Rule for Current App" would create, when both are known.
pub fn rule_for_current(ctx: &EngineContext) -> Option<(&str, &str)> {
    let app = ctx.current_app_id.trim();
    let source = ctx.current_source_id.trim();
    (!app.is_empty() && !source.is_empty()).then_some((app, source))
}

/// A submenu with one checkable row per color preset.
fn color_menu(title: &str) -> (Submenu, Vec<(CheckMenuItem, IndicatorColor)>) {
    let menu = Submenu::new(title, true);
    let items: Vec<_> = IndicatorColor::ALL
        .into_iter()
        .map(|c| (CheckMenuItem::new(c.name(), true, false, None), c))
        .collect();
    for (item, _) in &items {
        let _ = menu.append(item);
    }
    (menu, items)
}
