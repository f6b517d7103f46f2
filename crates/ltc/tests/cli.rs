//! End-to-end checks of the `ltc` binary that need no cluster.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ltc(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ltc").expect("ltc binary");
    cmd.env("LATTICE_CLI_HOME", home.path()).env_remove("RUST_LOG");
    cmd
}

#[test]
fn unknown_command_fails() {
    let home = TempDir::new().expect("tempdir");
    ltc(&home)
        .arg("foo")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("ltc: 'foo' is not a registered command"));
}

#[test]
fn target_without_config() {
    let home = TempDir::new().expect("tempdir");
    ltc(&home)
        .arg("target")
        .assert()
        .success()
        .stdout("Target not set.\n");
}

#[test]
fn blob_target_without_config() {
    let home = TempDir::new().expect("tempdir");
    ltc(&home)
        .arg("target-blob")
        .assert()
        .success()
        .stdout(predicate::str::contains("Blob store not set"));
}

#[test]
fn help_lists_commands() {
    let home = TempDir::new().expect("tempdir");
    ltc(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("create")
                .and(predicate::str::contains("submit-task"))
                .and(predicate::str::contains("debug-logs")),
        );
}

#[test]
fn invalid_timeout_flag_is_incorrect_usage() {
    let home = TempDir::new().expect("tempdir");
    ltc(&home)
        .args(["test", "--timeout", "soon"])
        .assert()
        .code(13)
        .stdout(
            predicate::str::starts_with("Incorrect Usage: ")
                .and(predicate::str::contains("invalid duration")),
        );
}

#[test]
fn out_of_range_port_is_incorrect_usage() {
    let home = TempDir::new().expect("tempdir");
    ltc(&home)
        .args(["create", "app", "image", "--ports", "70000", "--", "/run"])
        .assert()
        .code(13)
        .stdout(predicate::str::starts_with("Incorrect Usage: ").and(predicate::str::contains("--ports")));
}

#[test]
fn non_numeric_instances_is_incorrect_usage() {
    let home = TempDir::new().expect("tempdir");
    ltc(&home)
        .args(["create", "app", "image", "--instances", "lots", "--", "/run"])
        .assert()
        .code(13)
        .stdout(predicate::str::starts_with("Incorrect Usage: "));
}
