//! inputswitch Engine
//!
//! The engine decides, for every foreground-application activation, whether
//! and to which keyboard input source the system should switch:
//! - a global lock overrides everything else
//! - otherwise the enabled flag, the filter and the per-app mapping apply
//! - every switch goes through [`Engine::switch_input_source`]
//! - every non-trivial decision is recorded in a bounded [`LogHistory`]
//!
//! The engine is a single actor. All state mutation happens on the task that
//! owns the [`Engine`]; other threads observe it through an [`EngineHandle`]
//! and talk to it with [`Command`]s.
use std::{future, sync::Arc};

mod activation;
mod context;
mod deps;
mod error;
mod history;
pub mod test_support;

use parking_lot::RwLock;
use tokio::sync::{
    broadcast,
    mpsc::{self, UnboundedReceiver, UnboundedSender},
};
use tracing::{debug, info, warn};

pub use context::{Command, EngineContext, EngineEvent, EngineState, Outcome};
pub use deps::{
    ActivationApi, FrontmostApi, InputSourceApi, PolicySource, RealActivationApi,
    RealFrontmostApi, RealInputSourceApi,
};
pub use error::{Error, Result};
pub use history::{CAPACITY as LOG_CAPACITY, LogEntry, LogHistory};
pub use mac_focus_watcher::ActivationEvent;
pub use mac_input_source::InputSource;
pub use test_support::{MockActivationApi, MockFrontmostApi, MockInputSourceApi};

// Capacity of the engine event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// State shared between the engine actor and its handles.
struct Shared {
    /// Last published state.
    state: RwLock<EngineState>,
    /// Change notifications.
    events: broadcast::Sender<EngineEvent>,
}

/// Clonable, thread-safe read side of the engine.
#[derive(Clone)]
pub struct EngineHandle {
    /// Published state and notifications
    shared: Arc<Shared>,
    /// Command channel into the actor
    commands: UnboundedSender<Command>,
    /// Gateway for source listings
    sources: Arc<dyn InputSourceApi>,
}

impl EngineHandle {
    /// Latest published state.
    pub fn snapshot(&self) -> EngineState {
        self.shared.state.read().clone()
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.shared.events.subscribe()
    }

    /// Post a command to the engine actor.
    pub fn request(&self, cmd: Command) -> Result<()> {
        self.commands.send(cmd).map_err(|_| Error::ChannelClosed)
    }

    /// Selectable keyboard sources ordered by display name.
    pub fn available_sources(&self) -> Vec<InputSource> {
        self.sources.selectable_sources()
    }

    /// Display name for a source id, falling back to the id.
    pub fn source_display_name(&self, id: &str) -> String {
        display_name(self.sources.as_ref(), id)
    }
}

/// Localized name of `id` via `api`, or `id` itself.
fn display_name(api: &dyn InputSourceApi, id: &str) -> String {
    api.resolve(id.trim())
        .map(|s| s.name)
        .unwrap_or_else(|| id.to_string())
}

/// The switching engine.
///
/// Construct via [`Engine::new`], call [`Engine::start`] once to seed the
/// context and subscribe to activations, then drive it with [`Engine::run`].
/// The decision and switch operations can also be called directly.
pub struct Engine {
    /// Input source gateway
    sources: Arc<dyn InputSourceApi>,
    /// Foreground application reader
    frontmost: Arc<dyn FrontmostApi>,
    /// Engine-owned context
    context: EngineContext,
    /// Decision log
    history: LogHistory,
    /// Latch set by the first successful `start`
    started: bool,
    /// Activation subscription established by `start`
    activations: Option<UnboundedReceiver<ActivationEvent>>,
    /// Command receiver, taken by `run`
    commands: Option<UnboundedReceiver<Command>>,
    /// Sender side handed out to handles
    command_tx: UnboundedSender<Command>,
    /// Published state
    shared: Arc<Shared>,
    /// Events accumulated by the current operation, published together
    pending: Vec<EngineEvent>,
}

impl Engine {
    /// Create an engine over the given gateway and foreground-app reader.
    pub fn new(sources: Arc<dyn InputSourceApi>, frontmost: Arc<dyn FrontmostApi>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            sources,
            frontmost,
            context: EngineContext::default(),
            history: LogHistory::new(),
            started: false,
            activations: None,
            commands: Some(command_rx),
            command_tx,
            shared: Arc::new(Shared {
                state: RwLock::new(EngineState::default()),
                events,
            }),
            pending: Vec::new(),
        }
    }

    /// Engine wired to the real macOS services.
    pub fn with_real_services() -> Self {
        Self::new(Arc::new(RealInputSourceApi), Arc::new(RealFrontmostApi))
    }

    /// A handle for the presentation layer.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: self.shared.clone(),
            commands: self.command_tx.clone(),
            sources: self.sources.clone(),
        }
    }

    /// Current context.
    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    /// Decision log, newest-first.
    pub fn logs(&self) -> &LogHistory {
        &self.history
    }

    /// Whether [`Engine::start`] has completed.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Seed the context from the OS and subscribe to activation events.
    ///
    /// Only the first successful call does anything; later calls return
    /// `Ok(false)`. A failed subscription leaves the engine unstarted.
    pub fn start(&mut self, activations: &dyn ActivationApi) -> Result<bool> {
        if self.started {
            return Ok(false);
        }
        self.refresh_inner();
        let rx = activations.subscribe();
        self.flush();
        self.activations = Some(rx?);
        self.started = true;
        info!(
            "engine started app={} source={}",
            self.context.current_app_id, self.context.current_source_id
        );
        Ok(true)
    }

    /// Re-read the foreground app and current source. Unreadable values become empty.
    pub fn refresh_context(&mut self) {
        self.refresh_inner();
        self.flush();
    }

    fn refresh_inner(&mut self) {
        self.context.current_app_id = self.frontmost.frontmost_app_id().unwrap_or_default();
        self.context.current_source_id = self.sources.current_source_id().unwrap_or_default();
        self.pending.push(EngineEvent::ContextChanged);
    }

    /// Switch to `source_id`, bypassing policy.
    ///
    /// The id is trimmed; a blank id fails with [`Error::InvalidArgument`]
    /// without touching the gateway. This call never logs.
    pub fn switch_input_source(&mut self, source_id: &str) -> Result<()> {
        let res = self.switch_inner(source_id);
        self.flush();
        res
    }

    fn switch_inner(&mut self, source_id: &str) -> Result<()> {
        let id = source_id.trim();
        if id.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let selected = match self.sources.resolve(id) {
            None => Err(Error::SourceNotFound(id.to_string())),
            Some(source) => self.sources.select(&source).map_err(Error::from),
        };
        if let Err(err) = selected {
            debug!("switch to {} failed: {}", id, err);
            self.context.last_error = Some(err.to_string());
            self.pending.push(EngineEvent::ContextChanged);
            return Err(err);
        }
        self.context.last_switch_at = Some(history::now());
        self.context.last_switch_signal = self.context.last_switch_signal.wrapping_add(1);
        self.context.current_source_id = self
            .sources
            .current_source_id()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| id.to_string());
        self.context.last_error = None;
        self.pending.push(EngineEvent::Switched {
            signal: self.context.last_switch_signal,
        });
        self.pending.push(EngineEvent::ContextChanged);
        Ok(())
    }

    /// Remove every log entry.
    pub fn clear_logs(&mut self) {
        self.history.clear();
        self.pending.push(EngineEvent::LogsCleared);
        self.flush();
    }

    /// Selectable keyboard sources ordered by display name.
    pub fn available_sources(&self) -> Vec<InputSource> {
        self.sources.selectable_sources()
    }

    /// Display name for a source id, falling back to the id.
    pub fn source_display_name(&self, id: &str) -> String {
        display_name(self.sources.as_ref(), id)
    }

    /// Insert a log entry at the front of the history.
    fn log(&mut self, app_id: &str, source_id: &str, success: bool, message: &str) {
        let entry = LogEntry::now(app_id, source_id, success, message);
        if success {
            info!("{} -> {}: {}", app_id, source_id, message);
        } else {
            warn!("{} -> {}: {}", app_id, source_id, message);
        }
        self.history.push(entry.clone());
        self.pending.push(EngineEvent::Logged(entry));
    }

    /// Publish the accumulated events as one state version.
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        {
            let mut state = self.shared.state.write();
            state.version += 1;
            state.context = self.context.clone();
            state.logs = self.history.to_vec();
        }
        for ev in self.pending.drain(..) {
            // No subscribers is fine
            let _ = self.shared.events.send(ev);
        }
    }

    /// Apply one command.
    pub fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::TestSwitch(id) => self.test_switch(&id),
            Command::Refresh => self.refresh_context(),
            Command::ClearLogs => self.clear_logs(),
            Command::Shutdown => {}
        }
    }

    /// Manual switch that records its outcome in the log.
    fn test_switch(&mut self, source_id: &str) {
        let res = self.switch_inner(source_id);
        let app = self.context.current_app_id.clone();
        let id = source_id.trim();
        match res {
            Ok(()) => self.log(&app, id, true, "manual switch"),
            Err(err) => self.log(&app, id, false, &err.to_string()),
        }
        self.flush();
    }

    /// Run the actor loop until [`Command::Shutdown`] or until every handle is gone.
    ///
    /// Commands and activation events are handled one at a time; the policy
    /// is re-read from `policy` for every activation.
    pub async fn run<P: PolicySource>(mut self, policy: P) -> Result<()> {
        let Some(mut commands) = self.commands.take() else {
            return Err(Error::ChannelClosed);
        };
        // Handles hold senders; drop ours so the loop ends when they are gone
        let (closed_tx, _) = mpsc::unbounded_channel();
        self.command_tx = closed_tx;
        let mut activations = self.activations.take();
        loop {
            let step = tokio::select! {
                cmd = commands.recv() => Step::Command(cmd),
                ev = next_activation(&mut activations) => Step::Activation(ev),
            };
            match step {
                Step::Command(None) | Step::Command(Some(Command::Shutdown)) => break,
                Step::Command(Some(cmd)) => self.handle_command(cmd),
                Step::Activation(Some(ev)) => {
                    let p = policy.policy();
                    self.on_activation(&ev.app_id, &p);
                }
                Step::Activation(None) => {
                    warn!("activation channel closed");
                    activations = None;
                }
            }
        }
        info!("engine stopped");
        Ok(())
    }
}

/// One unit of work for the actor loop.
enum Step {
    /// A command, or `None` when the channel closed.
    Command(Option<Command>),
    /// An activation, or `None` when the channel closed.
    Activation(Option<ActivationEvent>),
}

/// Next activation, or never when there is no subscription.
async fn next_activation(
    rx: &mut Option<UnboundedReceiver<ActivationEvent>>,
) -> Option<ActivationEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}
