//! Policy editing and inspection subcommands.

use std::fmt::Write as _;

use clap::{Subcommand, ValueEnum};
use config::{FilterMode, IndicatorColor, Policy, PolicyStore};
use inputswitch_engine::Engine;
use thiserror::Error;

/// Errors reported by subcommands.
#[derive(Debug, Error)]
pub enum Error {
    /// Policy file failure.
    #[error(transparent)]
    Config(#[from] config::Error),
    /// Switch failure.
    #[error(transparent)]
    Engine(#[from] inputswitch_engine::Error),
    /// Bad argument value.
    #[error("{0}")]
    Usage(String),
}

impl Error {
    /// Human-readable rendering for the terminal.
    pub fn pretty(&self) -> String {
        match self {
            Self::Config(e) => e.pretty(),
            other => format!("error: {other}"),
        }
    }
}

/// On/off argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    /// Turn on.
    On,
    /// Turn off.
    Off,
}

/// Mapping reorder direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Direction {
    /// Towards the top of the list.
    Up,
    /// Towards the bottom of the list.
    Down,
}

/// Indicator dot selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Dot {
    /// Dot shown while switching is enabled.
    Status,
    /// Dot shown briefly after a switch.
    Switch,
}

#[derive(Subcommand, Debug)]
/// Top-level CLI subcommands.
pub enum Command {
    /// Print the policy and the current input source.
    Status,
    /// Enable automatic switching.
    Enable,
    /// Disable automatic switching.
    Disable,
    /// Engage or release the global lock (engaging captures the current source).
    Lock {
        /// on or off
        #[arg(value_enum)]
        state: Toggle,
    },
    /// Map an application to an input source.
    Map {
        /// Application bundle id
        app: String,
        /// Input source id
        source: String,
    },
    /// Remove an application's mapping.
    Unmap {
        /// Application bundle id
        app: String,
    },
    /// Reorder a mapping.
    Move {
        /// Application bundle id
        app: String,
        /// up or down
        #[arg(value_enum)]
        direction: Direction,
    },
    /// Edit the application filter.
    Filter {
        /// Filter action
        #[command(subcommand)]
        action: FilterAction,
    },
    /// Set an indicator dot color.
    Indicator {
        /// status or switch
        #[arg(value_enum)]
        dot: Dot,
        /// green, yellow, orange, red, blue, pink or white
        color: String,
    },
    /// List selectable keyboard input sources.
    Sources,
    /// List installed applications.
    Apps,
    /// Switch to an input source once, bypassing policy.
    Switch {
        /// Input source id
        source: String,
    },
}

#[derive(Subcommand, Debug)]
/// `filter` actions.
pub enum FilterAction {
    /// Set the filter mode (all, whitelist or blacklist).
    Mode {
        /// Mode name
        mode: String,
    },
    /// Add an application to the filter list.
    Add {
        /// Application bundle id
        app: String,
    },
    /// Remove an application from the filter list.
    Remove {
        /// Application bundle id
        app: String,
    },
}

/// Report for a mutation: what happened, or that nothing changed.
fn changed(did: bool, what: &str) -> String {
    if did {
        format!("{what}\n")
    } else {
        "unchanged\n".to_string()
    }
}

/// Multi-line description of `policy`.
pub fn describe_policy(policy: &Policy) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "enabled: {}", policy.enabled);
    let lock = &policy.global_lock;
    let _ = writeln!(
        out,
        "global lock: {}{}",
        if lock.active { "on" } else { "off" },
        if lock.source_id.is_empty() {
            String::new()
        } else {
            format!(" ({})", lock.source_id)
        }
    );
    let _ = writeln!(out, "filter: {}", policy.filter_mode.display_name());
    for app in &policy.filter_list {
        let _ = writeln!(out, "  {app}");
    }
    let _ = writeln!(out, "mappings: {}", policy.mappings.len());
    for m in &policy.mappings {
        let _ = writeln!(out, "  {} -> {}", m.app_id, m.source_id);
    }
    let _ = writeln!(
        out,
        "indicator: status {} / switch {}",
        policy.indicator.status_dot.name(),
        policy.indicator.switch_dot.name()
    );
    out
}

/// Parse a color preset name.
fn parse_color(name: &str) -> Result<IndicatorColor, Error> {
    IndicatorColor::from_name(name).ok_or_else(|| {
        let names: Vec<_> = IndicatorColor::ALL.iter().map(|c| c.name()).collect();
        Error::Usage(format!(
            "unknown color {name:?}; expected one of {}",
            names.join(", ")
        ))
    })
}

/// Run the policy-only subcommands. Returns `None` for commands that need the OS.
pub fn run_policy(cmd: &Command, store: &PolicyStore) -> Option<Result<String, Error>> {
    let res = match cmd {
        Command::Enable => store.set_enabled(true).map(|c| changed(c, "enabled")),
        Command::Disable => store.set_enabled(false).map(|c| changed(c, "disabled")),
        Command::Lock { state: Toggle::Off } => store
            .set_global_lock(false, "")
            .map(|c| changed(c, "global lock released")),
        Command::Map { app, source } => store
            .upsert_mapping(app, source.trim())
            .map(|c| changed(c, &format!("{} -> {}", app.trim(), source.trim()))),
        Command::Unmap { app } => store
            .remove_mapping(app.trim())
            .map(|c| changed(c, &format!("removed {}", app.trim()))),
        Command::Move { app, direction } => {
            let app = app.trim();
            let movable = match direction {
                Direction::Up => store.can_move_up(app),
                Direction::Down => store.can_move_down(app),
            };
            if !movable {
                if store.snapshot().mapping_for(app).is_none() {
                    return Some(Err(Error::Usage(format!("no mapping for {app}"))));
                }
                return Some(Ok(changed(false, "")));
            }
            let moved = match direction {
                Direction::Up => store.move_mapping_up(app),
                Direction::Down => store.move_mapping_down(app),
            };
            moved.map(|c| changed(c, "moved"))
        }
        Command::Filter { action } => return Some(run_filter(action, store)),
        Command::Indicator { dot, color } => {
            let color = match parse_color(color) {
                Ok(c) => c,
                Err(e) => return Some(Err(e)),
            };
            let set = match dot {
                Dot::Status => store.set_status_dot_color(color),
                Dot::Switch => store.set_switch_dot_color(color),
            };
            set.map(|c| changed(c, color.name()))
        }
        _ => return None,
    };
    Some(res.map_err(Error::from))
}

/// `filter` subcommands.
fn run_filter(action: &FilterAction, store: &PolicyStore) -> Result<String, Error> {
    match action {
        FilterAction::Mode { mode } => {
            let mode = FilterMode::from_name(mode).ok_or_else(|| {
                Error::Usage(format!(
                    "unknown filter mode {mode:?}; expected all, whitelist or blacklist"
                ))
            })?;
            Ok(changed(store.set_filter_mode(mode)?, mode.display_name()))
        }
        FilterAction::Add { app } => Ok(changed(
            store.add_filtered_app(app)?,
            &format!("added {}", app.trim()),
        )),
        FilterAction::Remove { app } => Ok(changed(
            store.remove_filtered_app(app.trim())?,
            &format!("removed {}", app.trim()),
        )),
    }
}

/// Run any subcommand, consulting the OS where needed.
pub fn run(cmd: &Command, store: &PolicyStore) -> Result<String, Error> {
    if let Some(res) = run_policy(cmd, store) {
        return res;
    }
    match cmd {
        Command::Status => {
            let mut out = describe_policy(&store.snapshot());
            let current = mac_input_source::current_source_id().unwrap_or_default();
            let _ = writeln!(
                out,
                "current source: {} ({})",
                current,
                mac_input_source::display_name(&current)
            );
            Ok(out)
        }
        Command::Lock { state: Toggle::On } => {
            let current = mac_input_source::current_source_id().unwrap_or_default();
            let did = store.set_global_lock(true, &current)?;
            let target = store.snapshot().global_lock.source_id;
            Ok(changed(did, &format!("global lock on ({target})")))
        }
        Command::Sources => {
            let mut out = String::new();
            for s in mac_input_source::selectable_keyboard_sources() {
                let _ = writeln!(out, "{}\t{}", s.id, s.name);
            }
            Ok(out)
        }
        Command::Apps => {
            let mut out = String::new();
            for a in app_catalog::discover() {
                let _ = writeln!(out, "{}\t{}", a.bundle_id, a.display_name);
            }
            Ok(out)
        }
        Command::Switch { source } => {
            let mut engine = Engine::with_real_services();
            engine.refresh_context();
            engine.switch_input_source(source)?;
            Ok(format!("switched to {}\n", engine.context().current_source_id))
        }
        _ => Err(Error::Usage("unsupported command".into())),
    }
}
