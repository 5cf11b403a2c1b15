//! Scenario: `wdl replay` against the in-memory store
//!
//! # Invariants under test
//!
//! 1. The Alice scenario prints the exact report on stdout.
//! 2. Config layers supply the feed; CLI flags override them.
//! 3. The journal written during the run verifies with `wdl journal verify`.
//! 4. A malformed snapshot fails the command and names the snapshot.
//! 5. An empty ledger prints "no data" for the range.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use wdl_testkit::{directory_doc, obs, snapshot_doc, write_json, ReplayFixture};

fn wdl(cwd: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("wdl").unwrap();
    cmd.current_dir(cwd).env_remove("WDL_DATABASE_URL");
    cmd
}

#[test]
fn alice_report_is_exact() {
    let fx = ReplayFixture::alice_ages_out().unwrap();
    let mut cmd = wdl(fx.dir.path());
    cmd.arg("replay");
    for s in fx.snapshot_paths() {
        cmd.arg("--snapshot").arg(s);
    }
    cmd.arg("--directory").arg(&fx.directory);

    cmd.assert().success().stdout(
        "Deposited for Alice: count=1 sum=1.00000000\n\
         Deposited without reference: count=0 sum=0.00000000\n\
         Smallest valid deposit: 1.00000000\n\
         Largest valid deposit: 1.00000000\n",
    );
}

#[test]
fn config_feed_and_journal() {
    let fx = ReplayFixture::mixed_wallet().unwrap();
    let journal = fx.dir.path().join("exports/journal.jsonl");
    let snaps = fx
        .snapshot_paths()
        .iter()
        .map(|s| format!("    - \"{s}\"\n"))
        .collect::<String>();
    let yaml = format!(
        "reconcile:\n  finality_threshold: 6\nfeed:\n  snapshots:\n{snaps}  directory: \"{}\"\nstore:\n  backend: memory\njournal:\n  path: \"{}\"\n",
        fx.directory.display(),
        journal.display()
    );
    let cfg = fx.dir.path().join("ledger.yaml");
    fs::write(&cfg, yaml).unwrap();

    wdl(fx.dir.path())
        .args(["replay", "--config"])
        .arg(&cfg)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Deposited for Alice: count=2 sum=0.75000000\n",
        ))
        .stdout(predicate::str::contains(
            "Deposited for Bob: count=1 sum=2.00000000\n",
        ))
        .stdout(predicate::str::contains(
            "Deposited without reference: count=2 sum=4.50000001\n",
        ))
        .stdout(predicate::str::contains("Smallest valid deposit: 0.00000001\n"))
        .stdout(predicate::str::contains("Largest valid deposit: 4.50000000\n"));

    wdl(fx.dir.path())
        .args(["journal", "verify"])
        .arg(&journal)
        .assert()
        .success()
        .stdout(predicate::str::contains("journal_valid=true lines=5"));

    // Tampering is caught.
    let content = fs::read_to_string(&journal).unwrap();
    fs::write(&journal, content.replacen("\"inserted\":4", "\"inserted\":5", 1)).unwrap();
    wdl(fx.dir.path())
        .args(["journal", "verify"])
        .arg(&journal)
        .assert()
        .failure()
        .stdout(predicate::str::contains("journal_valid=false line=1"));
}

#[test]
fn flag_overrides_config_directory() {
    let fx = ReplayFixture::alice_ages_out().unwrap();
    let other_dir = write_json(
        fx.dir.path(),
        "renamed.json",
        &directory_doc(&[("Alicia", "X")]),
    )
    .unwrap();
    let cfg = fx.dir.path().join("ledger.yaml");
    fs::write(
        &cfg,
        format!(
            "feed:\n  snapshots: [\"{}\", \"{}\"]\n  directory: \"{}\"\n",
            fx.snapshot_paths()[0],
            fx.snapshot_paths()[1],
            fx.directory.display()
        ),
    )
    .unwrap();

    wdl(fx.dir.path())
        .args(["replay", "--config"])
        .arg(&cfg)
        .arg("--directory")
        .arg(&other_dir)
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "Deposited for Alicia: count=1 sum=1.00000000\n",
        ));
}

#[test]
fn malformed_snapshot_fails_the_run() {
    let fx = ReplayFixture::write(
        &[
            snapshot_doc(vec![obs("a", "X", 1.0, "b1", 2)]),
            serde_json::json!({"transactions": [{"address": "X", "amount": 1.0, "confirmations": 1}]}),
        ],
        &directory_doc(&[("Alice", "X")]),
    )
    .unwrap();

    let mut cmd = wdl(fx.dir.path());
    cmd.arg("replay");
    for s in fx.snapshot_paths() {
        cmd.arg("--snapshot").arg(s);
    }
    cmd.arg("--directory").arg(&fx.directory);

    cmd.assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("snapshot #2"))
        .stderr(predicate::str::contains("txid"));
}

#[test]
fn empty_ledger_reports_no_data() {
    let fx = ReplayFixture::write(
        &[snapshot_doc(vec![obs("n", "X", 1.0, "", -2)])],
        &directory_doc(&[("Alice", "X")]),
    )
    .unwrap();

    wdl(fx.dir.path())
        .arg("replay")
        .arg("--snapshot")
        .arg(&fx.snapshots[0])
        .arg("--directory")
        .arg(&fx.directory)
        .assert()
        .success()
        .stdout(predicate::str::contains("Deposited for Alice: count=0 sum=0.00000000"))
        .stdout(predicate::str::contains("Smallest valid deposit: no data"))
        .stdout(predicate::str::contains("Largest valid deposit: no data"));
}

#[test]
fn replay_without_snapshots_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    wdl(dir.path())
        .args(["replay", "--directory", "address.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no snapshot documents"));
}
