//! The menu bar agent.
//!
//! Layout:
//! - the tao event loop owns the main thread, the NSWorkspace observer and the tray
//! - the engine actor runs on a current-thread tokio runtime in its own thread
//! - engine and policy notifications wake the main loop through the tao proxy

use std::{
    thread::{self, JoinHandle},
    time::Instant,
};

use config::PolicyStore;
use inputswitch_engine::{Command, Engine, EngineHandle, RealActivationApi};
use tao::{
    event::{Event, StartCause},
    event_loop::{ControlFlow, EventLoop},
    platform::macos::{ActivationPolicy, EventLoopExtMacOS},
};
use tokio::{runtime::Builder, sync::broadcast::error::RecvError};
use tracing::{debug, error, info, trace, warn};

use crate::tray::{self, Action, Tray};

/// Run the agent until Quit. Never returns.
pub fn run(store: PolicyStore) {
    let mut event_loop = EventLoop::new();
    event_loop.set_activation_policy(ActivationPolicy::Accessory);
    mac_focus_watcher::set_main_proxy(event_loop.create_proxy());

    let mut engine = Engine::with_real_services();
    if let Err(e) = engine.start(&RealActivationApi) {
        error!("activation watcher unavailable: {}", e);
    }
    let handle = engine.handle();
    let mut engine_thread = Some(spawn_engine(engine, store.clone()));

    let mut tray: Option<Tray> = None;
    let mut quitting = false;

    trace!("starting tao event loop");
    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Wait;
        if quitting {
            *control_flow = ControlFlow::Exit;
            return;
        }

        match event {
            Event::NewEvents(StartCause::Init) => {
                tray = Tray::build(handle.clone());
            }
            Event::NewEvents(StartCause::ResumeTimeReached { .. }) => {}
            Event::UserEvent(()) => {
                if let Err(e) = mac_focus_watcher::install_ns_workspace_observer() {
                    error!("failed to install NSWorkspace observer: {}", e);
                }
            }
            Event::LoopDestroyed => {
                if let Some(h) = engine_thread.take() {
                    if let Err(e) = h.join() {
                        error!("engine thread join failed: {:?}", e);
                    }
                }
                info!("shutdown complete");
                return;
            }
            Event::MainEventsCleared | Event::RedrawEventsCleared | Event::NewEvents(_) => return,
            _ => {
                trace!("event loop received: {:?}", event);
                return;
            }
        }

        let Some(t) = tray.as_mut() else {
            return;
        };
        for action in t.drain_actions() {
            if apply(action, &store, &handle) {
                quitting = true;
                *control_flow = ControlFlow::Exit;
                return;
            }
        }
        let now = Instant::now();
        if let Some(until) = t.sync(&store.snapshot(), &handle.snapshot(), now) {
            *control_flow = ControlFlow::WaitUntil(until);
        }
    });
}

/// Perform a menu action. Returns `true` when the agent should exit.
fn apply(action: Action, store: &PolicyStore, handle: &EngineHandle) -> bool {
    let res = match action {
        Action::ToggleEnabled => store.toggle_enabled().map(|_| ()),
        Action::ToggleLock => {
            let active = store.snapshot().global_lock.active;
            let current = mac_input_source::current_source_id()
                .unwrap_or_else(|| handle.snapshot().context.current_source_id);
            store.set_global_lock(!active, &current).map(|_| ())
        }
        Action::Refresh => {
            request(handle, Command::Refresh);
            Ok(())
        }
        Action::ClearLogs => {
            request(handle, Command::ClearLogs);
            Ok(())
        }
        Action::TestRule => {
            let policy = store.snapshot();
            let state = handle.snapshot();
            match tray::mapped_source(&policy, &state.context) {
                Some(id) => request(handle, Command::TestSwitch(id.to_string())),
                None => debug!("no rule to test for {}", state.context.current_app_id),
            }
            Ok(())
        }
        Action::AddRule => {
            let state = handle.snapshot();
            match tray::rule_for_current(&state.context) {
                Some((app, source)) => store.upsert_mapping(app, source).map(|_| ()),
                None => Ok(()),
            }
        }
        Action::StatusDot(c) => store.set_status_dot_color(c).map(|_| ()),
        Action::SwitchDot(c) => store.set_switch_dot_color(c).map(|_| ()),
        Action::Quit => {
            info!("quit requested");
            request(handle, Command::Shutdown);
            return true;
        }
    };
    if let Err(e) = res {
        warn!("{:?} failed: {}", action, e.pretty());
    }
    false
}

/// Post `cmd`, logging a stopped engine.
fn request(handle: &EngineHandle, cmd: Command) {
    if let Err(e) = handle.request(cmd) {
        warn!("engine unavailable: {}", e);
    }
}

/// Run `engine` on its own thread until it stops.
fn spawn_engine(engine: Engine, store: PolicyStore) -> JoinHandle<()> {
    thread::spawn(move || {
        let runtime = match Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                error!("failed to create tokio runtime: {}", e);
                return;
            }
        };
        runtime.block_on(async move {
            let mut events = engine.handle().subscribe();
            let mut policy = store.subscribe();
            tokio::spawn(async move {
                loop {
                    let res = tokio::select! {
                        r = events.recv() => r.map(|_| ()),
                        r = policy.recv() => r.map(|_| ()),
                    };
                    match res {
                        Ok(()) | Err(RecvError::Lagged(_)) => {}
                        Err(RecvError::Closed) => break,
                    }
                    if let Err(e) = mac_focus_watcher::wake_main_loop() {
                        debug!("wake failed: {}", e);
                        break;
                    }
                }
            });
            if let Err(e) = engine.run(store).await {
                error!("engine stopped with error: {}", e);
            }
        });
    })
}
