use crate::{FilterMode, IndicatorColor, Mapping, Policy, loader::parse};

fn policy_with_filter(mode: FilterMode, list: &[&str]) -> Policy {
    Policy {
        filter_mode: mode,
        filter_list: list.iter().map(|s| s.to_string()).collect(),
        ..Policy::default()
    }
}

#[test]
fn default_policy_matches_fresh_install() {
    let p = Policy::default();
    assert!(p.enabled);
    assert!(!p.global_lock.active);
    assert!(p.global_lock.source_id.is_empty());
    assert_eq!(p.filter_mode, FilterMode::All);
    assert!(p.filter_list.is_empty());
    assert!(p.mappings.is_empty());
    assert_eq!(p.indicator.status_dot, IndicatorColor::Green);
    assert_eq!(p.indicator.switch_dot, IndicatorColor::Yellow);
}

#[test]
fn filter_all_allows_everything() {
    let p = policy_with_filter(FilterMode::All, &["com.apple.Safari"]);
    assert!(p.filter_allows("com.apple.Safari"));
    assert!(p.filter_allows("com.apple.Terminal"));
}

#[test]
fn filter_whitelist_allows_only_listed() {
    let p = policy_with_filter(FilterMode::Whitelist, &["com.apple.Safari"]);
    assert!(p.filter_allows("com.apple.Safari"));
    assert!(!p.filter_allows("com.apple.Terminal"));
}

#[test]
fn filter_blacklist_excludes_listed() {
    let p = policy_with_filter(FilterMode::Blacklist, &["com.apple.Safari"]);
    assert!(!p.filter_allows("com.apple.Safari"));
    assert!(p.filter_allows("com.apple.Terminal"));
}

#[test]
fn mapping_lookup_is_exact_and_first_match_wins() {
    let p = Policy {
        mappings: vec![
            Mapping::new("com.apple.Terminal", "com.apple.keylayout.US"),
            Mapping::new("com.apple.Terminal", "com.apple.keylayout.ABC"),
        ],
        ..Policy::default()
    };
    let m = p.mapping_for("com.apple.Terminal").expect("mapping");
    assert_eq!(m.source_id, "com.apple.keylayout.US");
    assert!(p.mapping_for("com.apple.terminal").is_none());
    assert!(p.mapping_for("").is_none());
}

#[test]
fn parse_fills_missing_fields_with_defaults() {
    let p = parse(r#"{ "mappings": [ { "app_id": "a", "source_id": "b" } ] }"#).expect("parse");
    assert!(p.enabled);
    assert_eq!(p.mappings, vec![Mapping::new("a", "b")]);
    assert_eq!(p.indicator.switch_dot, IndicatorColor::Yellow);
}

#[test]
fn parse_reads_lock_and_filter() {
    let p = parse(
        r#"{
            "enabled": false,
            "global_lock": { "active": true, "source_id": "com.apple.keylayout.US" },
            "filter_mode": "blacklist",
            "filter_list": ["com.apple.Safari"],
            "indicator": { "status_dot": "blue", "switch_dot": "pink" }
        }"#,
    )
    .expect("parse");
    assert!(!p.enabled);
    assert!(p.global_lock.active);
    assert_eq!(p.global_lock.source_id, "com.apple.keylayout.US");
    assert_eq!(p.filter_mode, FilterMode::Blacklist);
    assert_eq!(p.indicator.status_dot, IndicatorColor::Blue);
    assert_eq!(p.indicator.switch_dot, IndicatorColor::Pink);
}

#[test]
fn parse_rejects_unknown_fields_with_location() {
    let err = parse("{\n  \"enabeld\": true\n}").expect_err("unknown field");
    match err {
        crate::Error::Parse { line, .. } => assert_eq!(line, 2),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn empty_document_is_default_policy() {
    assert_eq!(parse("  \n").expect("parse"), Policy::default());
}

#[test]
fn names_parse_case_insensitively() {
    assert_eq!(FilterMode::from_name("Whitelist"), Some(FilterMode::Whitelist));
    assert_eq!(FilterMode::from_name("nope"), None);
    assert_eq!(IndicatorColor::from_name(" ORANGE "), Some(IndicatorColor::Orange));
    for c in IndicatorColor::ALL {
        assert_eq!(IndicatorColor::from_name(c.name()), Some(c));
    }
}
