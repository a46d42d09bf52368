use std::{sync::Arc, time::Duration};

use config::{FilterMode, GlobalLock, Mapping, Policy, PolicyStore};
use inputswitch_engine::{
    Command, Engine, EngineEvent, Error, LOG_CAPACITY, MockActivationApi, MockFrontmostApi,
    MockInputSourceApi, Outcome,
};

const US: &str = "com.apple.keylayout.US";
const ABC: &str = "com.apple.keylayout.ABC";
const PINYIN: &str = "com.apple.inputmethod.SCIM.ITABC";
const TERMINAL: &str = "com.apple.Terminal";
const SAFARI: &str = "com.apple.Safari";

/// Test helper to create an engine over mock services with `current` selected.
fn create_test_engine(current: &str) -> (Engine, Arc<MockInputSourceApi>) {
    let sources = Arc::new(MockInputSourceApi::new(&[US, ABC, PINYIN], current));
    let frontmost = Arc::new(MockFrontmostApi::new(Some("com.apple.finder")));
    let mut engine = Engine::new(sources.clone(), frontmost);
    engine.refresh_context();
    sources.clear_calls();
    (engine, sources)
}

fn policy_with_mapping(app: &str, source: &str) -> Policy {
    Policy {
        mappings: vec![Mapping::new(app, source)],
        ..Policy::default()
    }
}

fn locked(source: &str) -> Policy {
    Policy {
        global_lock: GlobalLock {
            active: true,
            source_id: source.into(),
        },
        ..Policy::default()
    }
}

#[test]
fn test_mapping_switches_terminal() {
    let (mut engine, sources) = create_test_engine(PINYIN);
    let policy = policy_with_mapping(TERMINAL, US);

    let outcome = engine.on_activation(TERMINAL, &policy);

    assert_eq!(outcome, Outcome::Switched);
    assert_eq!(sources.select_calls(), vec![US.to_string()]);
    assert_eq!(engine.context().current_source_id, US);
    assert_eq!(engine.context().current_app_id, TERMINAL);
    assert_eq!(engine.logs().len(), 1);
    let e = engine.logs().latest().expect("entry");
    assert!(e.success);
    assert_eq!(e.message, "switched");
    assert_eq!(e.source_id, US);
    assert!(engine.context().last_switch_at.is_some());
}

#[test]
fn test_lock_held_makes_no_select() {
    let (mut engine, sources) = create_test_engine(US);
    for app in [TERMINAL, SAFARI, "com.example.Other"] {
        assert_eq!(engine.on_activation(app, &locked(US)), Outcome::LockHeld);
    }
    assert!(sources.select_calls().is_empty());
    assert_eq!(engine.logs().len(), 3);
    assert!(
        engine
            .logs()
            .iter()
            .all(|e| e.success && e.message == "lock held")
    );
}

#[test]
fn test_lock_applies_once_then_holds() {
    let (mut engine, sources) = create_test_engine(PINYIN);
    // A mapping that disagrees with the lock must be ignored
    let mut policy = locked(US);
    policy.mappings.push(Mapping::new(TERMINAL, ABC));

    assert_eq!(engine.on_activation(TERMINAL, &policy), Outcome::LockApplied);
    assert_eq!(engine.on_activation(TERMINAL, &policy), Outcome::LockHeld);

    assert_eq!(sources.select_calls(), vec![US.to_string()]);
    let msgs: Vec<_> = engine.logs().iter().map(|e| e.message.clone()).collect();
    assert_eq!(msgs, ["lock held", "lock applied"]);
}

#[test]
fn test_lock_failure_logs_error() {
    let (mut engine, sources) = create_test_engine(PINYIN);
    sources.set_fail_select(true, -50);

    assert_eq!(engine.on_activation(SAFARI, &locked(US)), Outcome::LockFailed);

    assert_eq!(sources.select_calls(), vec![US.to_string()]);
    let e = engine.logs().latest().expect("entry");
    assert!(!e.success);
    assert!(e.message.contains("-50"), "{}", e.message);
    assert_eq!(engine.context().last_error.as_deref(), Some(e.message.as_str()));
    assert_eq!(engine.context().current_source_id, PINYIN);
}

#[test]
fn test_lock_with_empty_target_is_noop() {
    let (mut engine, sources) = create_test_engine(PINYIN);
    assert_eq!(engine.on_activation(SAFARI, &locked("")), Outcome::Ignored);
    assert!(sources.select_calls().is_empty());
    assert!(engine.logs().is_empty());
    assert_eq!(engine.context().current_app_id, SAFARI);
}

#[test]
fn test_lock_overrides_disabled() {
    let (mut engine, sources) = create_test_engine(PINYIN);
    let mut policy = locked(US);
    policy.enabled = false;
    assert_eq!(engine.on_activation(SAFARI, &policy), Outcome::LockApplied);
    assert_eq!(sources.select_calls(), vec![US.to_string()]);
}

#[test]
fn test_disabled_makes_no_calls_and_no_logs() {
    let (mut engine, sources) = create_test_engine(PINYIN);
    let mut policy = policy_with_mapping(TERMINAL, US);
    policy.enabled = false;
    for app in [TERMINAL, SAFARI] {
        assert_eq!(engine.on_activation(app, &policy), Outcome::Ignored);
    }
    assert!(sources.select_calls().is_empty());
    assert!(engine.logs().is_empty());
}

#[test]
fn test_filter_excludes_apps() {
    let (mut engine, sources) = create_test_engine(PINYIN);
    let mut whitelist = policy_with_mapping(TERMINAL, US);
    whitelist.filter_mode = FilterMode::Whitelist;
    whitelist.filter_list = vec![SAFARI.into()];

    let mut blacklist = policy_with_mapping(TERMINAL, US);
    blacklist.filter_mode = FilterMode::Blacklist;
    blacklist.filter_list = vec![TERMINAL.into()];

    // The user switched by hand; the skip path picks that up
    sources.set_current(Some(ABC));
    assert_eq!(engine.on_activation(TERMINAL, &whitelist), Outcome::SkippedByFilter);
    assert_eq!(engine.on_activation(TERMINAL, &blacklist), Outcome::SkippedByFilter);

    assert!(sources.select_calls().is_empty());
    assert_eq!(engine.context().current_source_id, ABC);
    for e in engine.logs().iter() {
        assert!(e.success);
        assert_eq!(e.message, "skipped: outside filter scope");
        assert_eq!(e.source_id, ABC);
    }
}

#[test]
fn test_whitelisted_app_is_switched() {
    let (mut engine, sources) = create_test_engine(PINYIN);
    let mut policy = policy_with_mapping(TERMINAL, US);
    policy.filter_mode = FilterMode::Whitelist;
    policy.filter_list = vec![TERMINAL.into()];
    assert_eq!(engine.on_activation(TERMINAL, &policy), Outcome::Switched);
    assert_eq!(sources.select_calls(), vec![US.to_string()]);
}

#[test]
fn test_no_rule_skips() {
    let (mut engine, sources) = create_test_engine(PINYIN);
    let policy = policy_with_mapping(TERMINAL, US);

    assert_eq!(engine.on_activation(SAFARI, &policy), Outcome::SkippedNoRule);

    assert!(sources.select_calls().is_empty());
    let e = engine.logs().latest().expect("entry");
    assert!(e.success);
    assert_eq!(e.message, "skipped: no rule configured");
    assert_eq!(e.source_id, PINYIN);
}

#[test]
fn test_skip_keeps_source_when_unreadable() {
    let (mut engine, sources) = create_test_engine(PINYIN);
    sources.set_current_unreadable(true);
    engine.on_activation(SAFARI, &Policy::default());
    assert_eq!(engine.context().current_source_id, PINYIN);
}

#[test]
fn test_mapping_failure_logs_not_found() {
    let (mut engine, sources) = create_test_engine(PINYIN);
    let policy = policy_with_mapping(TERMINAL, "com.example.Removed");

    assert_eq!(engine.on_activation(TERMINAL, &policy), Outcome::SwitchFailed);

    assert!(sources.select_calls().is_empty());
    let e = engine.logs().latest().expect("entry");
    assert!(!e.success);
    assert_eq!(e.message, "input source not found: com.example.Removed");
    assert_eq!(engine.context().last_error.as_deref(), Some(e.message.as_str()));
}

#[test]
fn test_blank_mapping_target_uses_fallback_message() {
    let (mut engine, sources) = create_test_engine(PINYIN);
    let policy = policy_with_mapping(TERMINAL, "   ");
    assert_eq!(engine.on_activation(TERMINAL, &policy), Outcome::SwitchFailed);
    assert!(sources.calls().is_empty());
    assert_eq!(
        engine.logs().latest().map(|e| e.message.as_str()),
        Some("switch failed")
    );
}

#[test]
fn test_success_clears_last_error() {
    let (mut engine, sources) = create_test_engine(PINYIN);
    sources.set_fail_select(true, -1);
    assert!(engine.switch_input_source(US).is_err());
    assert!(engine.context().last_error.is_some());
    sources.set_fail_select(false, 0);
    engine.switch_input_source(US).expect("switch");
    assert_eq!(engine.context().last_error, None);
}

#[test]
fn test_blank_switch_is_invalid_argument() {
    let (mut engine, sources) = create_test_engine(PINYIN);
    for id in ["", "   "] {
        assert!(matches!(
            engine.switch_input_source(id),
            Err(Error::InvalidArgument)
        ));
    }
    assert!(sources.calls().is_empty());
    assert!(engine.logs().is_empty());
    assert_eq!(engine.context().last_error, None);
}

#[test]
fn test_switch_trims_and_reports_status() {
    let (mut engine, sources) = create_test_engine(PINYIN);
    engine.switch_input_source(&format!("  {ABC}\n")).expect("switch");
    assert_eq!(sources.select_calls(), vec![ABC.to_string()]);

    sources.set_fail_select(true, -25);
    match engine.switch_input_source(US) {
        Err(Error::SelectionFailed { id, status }) => {
            assert_eq!(id, US);
            assert_eq!(status, -25);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(engine.context().current_source_id, ABC);
}

#[test]
fn test_manual_switch_is_not_deduped() {
    let (mut engine, sources) = create_test_engine(US);
    engine.switch_input_source(US).expect("first");
    let first = engine.context().last_switch_signal;
    engine.switch_input_source(US).expect("second");
    assert_eq!(sources.select_calls(), vec![US.to_string(), US.to_string()]);
    assert_ne!(engine.context().last_switch_signal, first);
    assert!(engine.logs().is_empty());
}

#[test]
fn test_switch_falls_back_to_requested_id() {
    let (mut engine, sources) = create_test_engine(PINYIN);
    sources.set_current_unreadable(true);
    engine.switch_input_source(ABC).expect("switch");
    assert_eq!(engine.context().current_source_id, ABC);
}

#[test]
fn test_log_history_is_bounded() {
    let (mut engine, _sources) = create_test_engine(PINYIN);
    let policy = Policy::default();
    for n in 0..(LOG_CAPACITY + 20) {
        engine.on_activation(&format!("com.example.App{n}"), &policy);
        assert!(engine.logs().len() <= LOG_CAPACITY);
    }
    assert_eq!(engine.logs().len(), LOG_CAPACITY);
    let newest = format!("com.example.App{}", LOG_CAPACITY + 19);
    assert_eq!(
        engine.logs().latest().map(|e| e.app_id.clone()),
        Some(newest)
    );
    assert_eq!(
        engine.logs().iter().last().map(|e| e.app_id.clone()),
        Some("com.example.App20".to_string())
    );
    engine.clear_logs();
    assert!(engine.logs().is_empty());
}

#[test]
fn test_start_is_idempotent() {
    let sources = Arc::new(MockInputSourceApi::new(&[US], US));
    let frontmost = Arc::new(MockFrontmostApi::new(Some(SAFARI)));
    let activations = MockActivationApi::new();
    let mut engine = Engine::new(sources, frontmost.clone());

    assert!(engine.start(&activations).expect("start"));
    assert_eq!(engine.context().current_app_id, SAFARI);
    assert_eq!(engine.context().current_source_id, US);

    frontmost.set(Some(TERMINAL));
    assert!(!engine.start(&activations).expect("second start"));
    assert_eq!(activations.subscriptions(), 1);
    // A second start does not re-read the context
    assert_eq!(engine.context().current_app_id, SAFARI);
}

#[test]
fn test_refresh_uses_empty_on_failure() {
    let sources = Arc::new(MockInputSourceApi::new(&[US], US));
    let frontmost = Arc::new(MockFrontmostApi::new(None));
    let mut engine = Engine::new(sources.clone(), frontmost);
    sources.set_current_unreadable(true);
    engine.refresh_context();
    assert_eq!(engine.context().current_app_id, "");
    assert_eq!(engine.context().current_source_id, "");
}

#[test]
fn test_handle_publishes_state() {
    let (mut engine, _sources) = create_test_engine(PINYIN);
    let handle = engine.handle();
    let mut events = handle.subscribe();
    let before = handle.snapshot().version;

    engine.on_activation(TERMINAL, &policy_with_mapping(TERMINAL, US));

    let snap = handle.snapshot();
    assert!(snap.version > before);
    assert_eq!(snap.context.current_source_id, US);
    assert_eq!(snap.logs.len(), 1);

    let mut got_switched = false;
    let mut got_logged = false;
    while let Ok(ev) = events.try_recv() {
        match ev {
            EngineEvent::Switched { signal } => {
                got_switched = true;
                assert_eq!(signal, snap.context.last_switch_signal);
            }
            EngineEvent::Logged(e) => {
                got_logged = true;
                assert_eq!(e.message, "switched");
            }
            _ => {}
        }
    }
    assert!(got_switched && got_logged);
    assert_eq!(handle.source_display_name("com.example.Unknown"), "com.example.Unknown");
    assert_eq!(handle.available_sources().len(), 3);
}

/// Wait until the published state satisfies `pred`.
async fn wait_state<F>(handle: &inputswitch_engine::EngineHandle, mut pred: F) -> bool
where
    F: FnMut(&inputswitch_engine::EngineState) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if pred(&handle.snapshot()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .is_ok()
}

#[tokio::test]
async fn test_run_loop_reads_latest_policy() {
    let sources = Arc::new(MockInputSourceApi::new(&[US, ABC, PINYIN], PINYIN));
    let frontmost = Arc::new(MockFrontmostApi::new(Some(SAFARI)));
    let activations = Arc::new(MockActivationApi::new());
    let store = PolicyStore::in_memory(Policy::default());

    let mut engine = Engine::new(sources.clone(), frontmost);
    engine.start(activations.as_ref()).expect("start");
    let handle = engine.handle();
    let task = tokio::spawn(engine.run(store.clone()));

    activations.activate(TERMINAL);
    assert!(wait_state(&handle, |s| s.logs.len() == 1).await);
    assert!(sources.select_calls().is_empty());

    // Edits are visible on the very next activation
    store.upsert_mapping(TERMINAL, US).expect("upsert");
    activations.activate(TERMINAL);
    assert!(wait_state(&handle, |s| s.context.current_source_id == US).await);
    assert_eq!(sources.select_calls(), vec![US.to_string()]);

    handle.request(Command::ClearLogs).expect("clear");
    assert!(wait_state(&handle, |s| s.logs.is_empty()).await);

    handle.request(Command::Shutdown).expect("shutdown");
    task.await.expect("join").expect("run");
    assert!(matches!(
        handle.request(Command::Refresh),
        Err(Error::ChannelClosed)
    ));
}

#[tokio::test]
async fn test_test_switch_command_logs_outcome() {
    let (engine, sources) = create_test_engine(PINYIN);
    let handle = engine.handle();
    let task = tokio::spawn(engine.run(Policy::default()));

    handle
        .request(Command::TestSwitch(ABC.into()))
        .expect("request");
    handle
        .request(Command::TestSwitch("com.example.Missing".into()))
        .expect("request");
    assert!(wait_state(&handle, |s| s.logs.len() == 2).await);

    let snap = handle.snapshot();
    let failed = &snap.logs[0];
    assert!(!failed.success);
    assert_eq!(failed.message, "input source not found: com.example.Missing");
    let ok = &snap.logs[1];
    assert!(ok.success);
    assert_eq!(ok.message, "manual switch");
    assert_eq!(ok.app_id, "com.apple.finder");
    assert_eq!(sources.select_calls(), vec![ABC.to_string()]);

    drop(handle);
    task.await.expect("join").expect("run");
}
