use assert_cmd::Command;
use predicates::prelude::*;

/// A custom settings path that does not exist, with nothing at the default
/// location either, must abort with the configuration-missing exit code
/// before anything else runs.
#[test]
fn missing_custom_settings_exits_with_code_2() {
    let home = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("somnosync").expect("binary exists");
    cmd.arg("sync")
        .arg("--settings")
        .arg("/no/such/somnosync.conf")
        .env("HOME", home.path());

    cmd.assert()
        .code(2)
        .stdout(predicate::str::contains("configuration missing"));
}

/// Without --settings and without a file at the default location, startup
/// fails the same way.
#[test]
fn missing_default_settings_exits_with_code_2() {
    let home = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("somnosync").expect("binary exists");
    cmd.arg("sync").env("HOME", home.path());

    cmd.assert()
        .code(2)
        .stdout(predicate::str::contains("configuration missing"));
}

/// A blank required key is rejected during startup, not mid-run.
#[test]
fn blank_client_secret_exits_with_code_2() {
    let tmp = tempfile::tempdir().unwrap();
    let conf = tmp.path().join("somnosync.conf");
    std::fs::write(
        &conf,
        "base_dir=/tmp/somnosync\nclient_id=abc\nclient_secret=\nremote_name=cpap\n",
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("somnosync").expect("binary exists");
    cmd.arg("sync").arg("--settings").arg(&conf);

    cmd.assert()
        .code(2)
        .stdout(predicate::str::contains("client_secret"));
}

#[test]
fn help_names_the_sync_subcommand() {
    let mut cmd = Command::cargo_bin("somnosync").expect("binary exists");
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("sync"));
}
