//! Unused-key guard
//!
//! GREEN when:
//! 1) Unknown sections are reported in WARN mode without error.
//! 2) Unknown sections fail in FAIL mode.
//! 3) Keys under consumed sections are never flagged.
//! 4) Unused pointers are sorted.

use csp_config::{load_layered_yaml_from_strings, report_unused_keys, UnusedKeyPolicy};

const YAML_WITH_STRAY: &str = r#"
reconciler:
  interval_secs: 30
license:
  base_url: "http://127.0.0.1:9000"
zeta:
  b: 1
  a: 2
"#;

#[test]
fn warn_mode_reports_unused_keys_without_error() {
    let loaded = load_layered_yaml_from_strings(&[YAML_WITH_STRAY]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)
        .expect("warn mode must not error");

    assert!(!report.is_clean());
    assert_eq!(
        report.unused_leaf_pointers,
        vec!["/zeta/a".to_string(), "/zeta/b".to_string()]
    );
}

#[test]
fn fail_mode_errors_on_unused_keys() {
    let loaded = load_layered_yaml_from_strings(&[YAML_WITH_STRAY]).unwrap();
    let err = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).unwrap_err();
    assert!(err.to_string().contains("CONFIG_UNUSED_KEYS"));
}

#[test]
fn consumed_sections_are_clean() {
    let yaml = r#"
adapter:
  csp: aws
reconciler:
  dimension: RKE_NODE_SUPP
state:
  backend: file
output:
  dir: ./out
daemon:
  addr: "127.0.0.1:8899"
"#;
    let loaded = load_layered_yaml_from_strings(&[yaml]).unwrap();
    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail)
        .expect("all keys are consumed");
    assert!(report.is_clean());
}
