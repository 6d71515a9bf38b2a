//! Config hash stability
//!
//! GREEN when:
//! - Loading the same layers twice yields the same `config_hash`.
//! - Reordering keys within YAML does not change the hash.
//! - A changed value changes the hash.
//! - Overlays override base values and the hash follows the merged result.

use csp_config::load_layered_yaml_from_strings;

const BASE_YAML: &str = r#"
reconciler:
  interval_secs: 30
  nodes_per_license: 20
license:
  base_url: "https://license.internal:8443"
  token_env: "CSP_LICENSE_TOKEN"
metrics:
  url: "https://manager.internal/metrics"
"#;

const BASE_YAML_REORDERED: &str = r#"
metrics:
  url: "https://manager.internal/metrics"
license:
  token_env: "CSP_LICENSE_TOKEN"
  base_url: "https://license.internal:8443"
reconciler:
  nodes_per_license: 20
  interval_secs: 30
"#;

const OVERLAY_YAML: &str = r#"
reconciler:
  interval_secs: 10
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn key_order_does_not_change_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        a.config_hash, b.config_hash,
        "canonicalization must make the hash independent of key order"
    );
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_overrides_base_and_keeps_siblings() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    assert_eq!(loaded.config_json["reconciler"]["interval_secs"], 10);
    assert_eq!(loaded.config_json["reconciler"]["nodes_per_license"], 20);

    let cfg = loaded.adapter().unwrap();
    assert_eq!(cfg.reconciler.interval_secs, 10);
    assert_eq!(cfg.reconciler.nodes_per_license, 20);
}

#[test]
fn hash_is_lowercase_sha256_hex() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded
        .config_hash
        .chars()
        .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}
