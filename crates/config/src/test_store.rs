use std::fs;

use crate::{Error, FilterMode, IndicatorColor, Mapping, Policy, PolicyStore, load_from_path};

fn app_ids(store: &PolicyStore) -> Vec<String> {
    store
        .snapshot()
        .mappings
        .into_iter()
        .map(|m| m.app_id)
        .collect()
}

#[test]
fn mutations_are_durable_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("policy.json");

    let store = PolicyStore::open(&path).expect("open");
    assert!(!path.exists(), "opening must not create the file");
    assert!(store.set_enabled(false).expect("set_enabled"));
    assert!(
        store
            .upsert_mapping("com.apple.Terminal", "com.apple.keylayout.US")
            .expect("upsert")
    );
    assert!(store.set_filter_mode(FilterMode::Whitelist).expect("mode"));
    assert!(store.add_filtered_app("com.apple.Terminal").expect("add"));

    let reopened = PolicyStore::open(&path).expect("reopen");
    let p = reopened.snapshot();
    assert!(!p.enabled);
    assert_eq!(p.filter_mode, FilterMode::Whitelist);
    assert_eq!(p.filter_list, vec!["com.apple.Terminal".to_string()]);
    assert_eq!(
        p.mappings,
        vec![Mapping::new("com.apple.Terminal", "com.apple.keylayout.US")]
    );
    assert_eq!(load_from_path(&path).expect("load"), p);
}

#[test]
fn upsert_updates_in_place_and_ignores_blank_app() {
    let store = PolicyStore::in_memory(Policy::default());
    store.upsert_mapping(" a ", "s1").expect("upsert");
    store.upsert_mapping("b", "s2").expect("upsert");
    store.upsert_mapping("a", "s3").expect("upsert");
    assert!(!store.upsert_mapping("   ", "s4").expect("upsert blank"));

    let p = store.snapshot();
    assert_eq!(p.mappings, vec![Mapping::new("a", "s3"), Mapping::new("b", "s2")]);
}

#[test]
fn reorder_and_remove_mappings() {
    let store = PolicyStore::in_memory(Policy::default());
    for app in ["a", "b", "c"] {
        store.upsert_mapping(app, "s").expect("upsert");
    }
    assert!(!store.can_move_up("a"));
    assert!(store.can_move_down("a"));
    assert!(!store.move_mapping_up("a").expect("up at front"));
    assert!(store.move_mapping_down("a").expect("down"));
    assert_eq!(app_ids(&store), ["b", "a", "c"]);
    assert!(store.move_mapping_up("c").expect("up"));
    assert_eq!(app_ids(&store), ["b", "c", "a"]);
    assert!(!store.can_move_down("a"));
    assert!(!store.move_mapping_down("missing").expect("missing"));

    assert!(store.remove_mapping("c").expect("remove"));
    assert!(!store.remove_mapping("c").expect("remove again"));
    assert_eq!(app_ids(&store), ["b", "a"]);
}

#[test]
fn global_lock_captures_current_source() {
    let store = PolicyStore::in_memory(Policy::default());
    store
        .set_global_lock(true, "  com.apple.keylayout.US ")
        .expect("lock");
    let p = store.snapshot();
    assert!(p.global_lock.active);
    assert_eq!(p.global_lock.source_id, "com.apple.keylayout.US");

    store.set_global_lock(false, "ignored").expect("unlock");
    let p = store.snapshot();
    assert!(!p.global_lock.active);
    assert_eq!(p.global_lock.source_id, "com.apple.keylayout.US");

    store.set_global_lock(true, "").expect("relock");
    assert_eq!(store.snapshot().global_lock.source_id, "com.apple.keylayout.US");
}

#[test]
fn filter_list_rejects_blank_and_duplicates() {
    let store = PolicyStore::in_memory(Policy::default());
    assert!(store.add_filtered_app("x").expect("add"));
    assert!(!store.add_filtered_app(" x ").expect("dup"));
    assert!(!store.add_filtered_app("").expect("blank"));
    assert!(store.add_filtered_app("y").expect("add"));
    assert_eq!(store.snapshot().filter_list, ["x", "y"]);
    assert!(store.remove_filtered_app("x").expect("remove"));
    assert_eq!(store.snapshot().filter_list, ["y"]);
}

#[test]
fn unreadable_file_fails_mutation_and_keeps_policy() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("policy.json");
    let store = PolicyStore::open(&path).expect("open");

    // A directory at the file path can be neither read nor replaced.
    fs::create_dir(&path).expect("mkdir");
    let err = store.set_enabled(false).expect_err("mutation must fail");
    assert!(matches!(err, Error::Read { .. }));
    assert_eq!(err.path(), Some(path.as_path()));
    assert!(store.snapshot().enabled);
    assert!(path.is_dir());
}

#[test]
fn edits_from_another_store_are_seen_and_kept() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("policy.json");
    let agent = PolicyStore::open(&path).expect("open agent");
    let cli = PolicyStore::open(&path).expect("open cli");

    assert!(
        cli.upsert_mapping("com.apple.Terminal", "com.apple.keylayout.US")
            .expect("cli upsert")
    );
    assert_eq!(
        agent.snapshot().mapping_for("com.apple.Terminal"),
        Some(&Mapping::new("com.apple.Terminal", "com.apple.keylayout.US"))
    );

    assert!(agent.toggle_enabled().expect("agent toggle"));
    let on_disk = load_from_path(&path).expect("load");
    assert!(!on_disk.enabled);
    assert_eq!(
        on_disk.mappings,
        vec![Mapping::new("com.apple.Terminal", "com.apple.keylayout.US")]
    );

    // The other direction: the cli's next edit starts from the agent's toggle.
    assert!(cli.add_filtered_app("com.apple.Safari").expect("cli filter"));
    let on_disk = load_from_path(&path).expect("load");
    assert!(!on_disk.enabled);
    assert_eq!(on_disk.filter_list, ["com.apple.Safari"]);
    assert_eq!(agent.snapshot(), on_disk);
}

#[test]
fn mutation_starts_from_file_even_without_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("policy.json");
    let agent = PolicyStore::open(&path).expect("open agent");
    let cli = PolicyStore::open(&path).expect("open cli");

    cli.upsert_mapping("a", "s1").expect("cli upsert");
    // No snapshot in between: the agent's write must still keep the mapping.
    agent.set_switch_dot_color(IndicatorColor::Blue).expect("agent color");
    let reopened = PolicyStore::open(&path).expect("reopen").snapshot();
    assert_eq!(reopened.mappings, vec![Mapping::new("a", "s1")]);
    assert_eq!(reopened.indicator.switch_dot, IndicatorColor::Blue);
}

#[test]
fn malformed_file_keeps_previous_snapshot_and_blocks_writes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("policy.json");
    let store = PolicyStore::open(&path).expect("open");
    store.upsert_mapping("a", "s1").expect("upsert");

    fs::write(&path, "{ not json").expect("corrupt");
    assert_eq!(store.snapshot().mappings, vec![Mapping::new("a", "s1")]);
    let err = store.set_enabled(false).expect_err("parse must fail");
    assert!(matches!(err, Error::Parse { .. }));
    assert_eq!(fs::read_to_string(&path).expect("read"), "{ not json");
}

#[tokio::test]
async fn subscribers_see_committed_changes_only() {
    let store = PolicyStore::in_memory(Policy::default());
    let mut rx = store.subscribe();

    assert!(!store.set_enabled(true).expect("no-op"));
    assert!(store.toggle_enabled().expect("toggle"));

    let p = rx.recv().await.expect("change");
    assert!(!p.enabled);
    assert!(rx.try_recv().is_err(), "no-op must not notify");
}

#[tokio::test]
async fn external_edit_is_published_on_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("policy.json");
    let agent = PolicyStore::open(&path).expect("open agent");
    let cli = PolicyStore::open(&path).expect("open cli");
    let mut rx = agent.subscribe();

    cli.set_enabled(false).expect("cli disable");
    assert!(rx.try_recv().is_err(), "nothing published before a read");
    assert!(!agent.snapshot().enabled);

    let p = rx.recv().await.expect("reload notification");
    assert!(!p.enabled);
    let _unchanged = agent.snapshot();
    assert!(rx.try_recv().is_err(), "an unchanged file is not republished");
}
