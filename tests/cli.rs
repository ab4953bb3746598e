//! CLI surface checks that do not need a running daemon.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn sd() -> Command {
    Command::cargo_bin("sd").expect("sd binary")
}

#[test]
fn help_describes_the_surface() {
    sd().arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Service desk slot reservations"))
        .stdout(predicate::str::contains("book"))
        .stdout(predicate::str::contains("watch"));
}

#[test]
fn book_help_shows_flags() {
    sd().args(["book", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--kiosk"))
        .stdout(predicate::str::contains("--name"));
}

#[test]
fn client_without_daemon_fails_cleanly() {
    let runtime = TempDir::new().unwrap();
    let config = TempDir::new().unwrap();
    let data = TempDir::new().unwrap();
    sd().arg("ping")
        .env("SLOTDESK_RUNTIME_DIR", runtime.path())
        .env("SLOTDESK_CONFIG_DIR", config.path())
        .env("SLOTDESK_DATA_DIR", data.path())
        .env("SLOTDESK_TESTING", "1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("daemon"));
}

#[test]
fn missing_subcommand_prints_usage() {
    sd().assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
