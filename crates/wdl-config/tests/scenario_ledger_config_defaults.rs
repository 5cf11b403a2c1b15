//! Typed ledger config
//!
//! # Invariants under test
//!
//! 1. No config at all yields threshold 6, memory store, teardown on, no journal.
//! 2. A finality threshold below 1 is refused.
//! 3. Unknown backends are refused; backend names parse case-insensitively.

use std::str::FromStr;

use wdl_config::{load_layered_yaml_from_strings, LedgerConfig, StoreBackend};

#[test]
fn defaults_apply_without_any_layer() {
    let cfg = load_layered_yaml_from_strings(&[]).unwrap().ledger().unwrap();
    assert_eq!(cfg, LedgerConfig::default());
    assert_eq!(cfg.reconcile.finality_threshold, 6);
    assert_eq!(cfg.store.backend, StoreBackend::Memory);
    assert!(cfg.store.teardown);
    assert!(cfg.journal.path.is_none());
    assert!(cfg.journal.hash_chain);
    assert!(cfg.feed.snapshots.is_empty());
}

#[test]
fn threshold_below_one_is_refused() {
    for bad in ["0", "-2"] {
        let yaml = format!("reconcile:\n  finality_threshold: {bad}\n");
        let err = load_layered_yaml_from_strings(&[yaml.as_str()])
            .unwrap()
            .ledger()
            .unwrap_err();
        assert!(err.to_string().contains("CONFIG_INVALID"), "{err:#}");
    }
}

#[test]
fn unknown_backend_is_refused() {
    let yaml = "store:\n  backend: mongo\n";
    assert!(load_layered_yaml_from_strings(&[yaml])
        .unwrap()
        .ledger()
        .is_err());

    assert_eq!(StoreBackend::from_str("Postgres"), Ok(StoreBackend::Postgres));
    assert_eq!(StoreBackend::from_str("memory"), Ok(StoreBackend::Memory));
    assert!(StoreBackend::from_str("sqlite").is_err());
}

#[test]
fn journal_section_is_typed() {
    let yaml = "journal:\n  path: exports/journal.jsonl\n  hash_chain: false\n";
    let cfg = load_layered_yaml_from_strings(&[yaml]).unwrap().ledger().unwrap();
    assert_eq!(
        cfg.journal.path.as_deref(),
        Some(std::path::Path::new("exports/journal.jsonl"))
    );
    assert!(!cfg.journal.hash_chain);
}
