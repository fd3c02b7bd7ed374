use assert_cmd::Command;
use predicates::prelude::*;

fn hiveot(home: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("hiveot").unwrap();
    cmd.env("HIVEOT_HOME", home)
        .env("HIVEOT_PASSWORD_HASH", "bcrypt")
        .env("RUST_LOG", "error");
    cmd
}

#[test]
fn version_prints_package_version() {
    let dir = tempfile::tempdir().unwrap();
    hiveot(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn init_creates_bootstrap_accounts() {
    let dir = tempfile::tempdir().unwrap();
    hiveot(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("launcher").and(predicate::str::contains("Administrator")));
    assert!(dir.path().join("certs").join("admin.token").exists());
    assert!(dir.path().join("stores/authn/hub.passwd").exists());
}

#[test]
fn add_consumer_then_list_and_remove() {
    let dir = tempfile::tempdir().unwrap();
    hiveot(dir.path())
        .args(["add-consumer", "alice", "--name", "Alice", "--password", "hunter22"])
        .assert()
        .success();
    hiveot(dir.path())
        .args(["set-role", "alice", "operator"])
        .assert()
        .success();
    hiveot(dir.path())
        .arg("clients")
        .assert()
        .success()
        .stdout(predicate::str::contains("alice").and(predicate::str::contains("operator")));
    hiveot(dir.path())
        .args(["remove", "alice"])
        .assert()
        .success();
    hiveot(dir.path())
        .arg("clients")
        .assert()
        .success()
        .stdout(predicate::str::contains("alice").not());
}

#[test]
fn add_agent_prints_token() {
    let dir = tempfile::tempdir().unwrap();
    hiveot(dir.path())
        .args(["add-agent", "temp01", "--name", "Temp Sensor"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("v4.public."));
    assert!(dir.path().join("certs").join("temp01.key").exists());
}

#[test]
fn short_password_fails_with_exit_code_one() {
    let dir = tempfile::tempdir().unwrap();
    hiveot(dir.path())
        .args(["add-consumer", "alice"])
        .assert()
        .success();
    hiveot(dir.path())
        .args(["set-password", "alice", "1234"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("invalid-argument"));
}

#[test]
fn new_token_for_unknown_client_fails() {
    let dir = tempfile::tempdir().unwrap();
    hiveot(dir.path())
        .args(["new-token", "ghost"])
        .assert()
        .code(1);
}
