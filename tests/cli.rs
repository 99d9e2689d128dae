use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::tempdir;

fn bin() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("pwsafe3"))
}

fn run(store: &Path, password: &str, args: &[&str]) -> assert_cmd::assert::Assert {
    bin()
        .env("PWSAFE_PASSWORD", password)
        .env_remove("PWSAFE_NEW_PASSWORD")
        .arg("--file")
        .arg(store)
        .args(args)
        .assert()
}

fn init(store: &Path) {
    run(store, "pw", &["init"])
        .success()
        .stdout(predicate::str::contains("safe initialized"));
}

#[test]
fn init_creates_safe_file() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.psafe3");

    init(&store);

    assert!(store.exists());
    let bytes = std::fs::read(&store).unwrap();
    assert_eq!(&bytes[..4], b"PWS3");
}

#[test]
fn init_fails_if_safe_exists() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.psafe3");

    init(&store);
    run(&store, "pw", &["init"])
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn add_list_show_roundtrip() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.psafe3");
    init(&store);

    run(
        &store,
        "pw",
        &["add", "--group", "Work", "--title", "Email", "--password", "hunter2"],
    )
    .success()
    .stdout(predicate::str::contains("added 'Email'"));

    run(&store, "pw", &["add", "--group", "Home", "--title", "Router"]).success();

    run(&store, "pw", &["list"])
        .success()
        .stdout(predicate::str::contains("[00] Home/Router"))
        .stdout(predicate::str::contains("[01] Work/Email"));

    run(&store, "pw", &["show", "1"])
        .success()
        .stdout(predicate::str::contains("Title:    Email"))
        .stdout(predicate::str::contains("hunter2").not());

    run(&store, "pw", &["show", "1", "--reveal"])
        .success()
        .stdout(predicate::str::contains("hunter2"));
}

#[test]
fn add_requires_title() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.psafe3");
    init(&store);

    run(&store, "pw", &["add", "--group", "Work"])
        .failure()
        .stderr(predicate::str::contains("needs a title"));
}

#[test]
fn edit_and_remove() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.psafe3");
    init(&store);

    run(&store, "pw", &["add", "--title", "Bank", "--username", "old"]).success();
    run(&store, "pw", &["edit", "0", "--username", "new"])
        .success()
        .stdout(predicate::str::contains("updated 'Bank'"));

    run(&store, "pw", &["show", "0"])
        .success()
        .stdout(predicate::str::contains("Username: new"));

    run(&store, "pw", &["remove", "0"])
        .success()
        .stdout(predicate::str::contains("removed 'Bank'"));

    run(&store, "pw", &["list"])
        .success()
        .stdout(predicate::str::contains("No entries stored."));
}

#[test]
fn show_unknown_index_fails() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.psafe3");
    init(&store);

    run(&store, "pw", &["show", "3"])
        .failure()
        .stderr(predicate::str::contains("no entry with index 3"));
}

#[test]
fn wrong_password_fails() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.psafe3");
    init(&store);

    run(&store, "wrong", &["list"])
        .failure()
        .stderr(predicate::str::contains("invalid passphrase"));
}

#[test]
fn info_reports_last_save() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.psafe3");
    init(&store);

    run(&store, "pw", &["info"])
        .success()
        .stdout(predicate::str::contains("Version:      3.13"))
        .stdout(predicate::str::contains("Last program: pwsafe3"))
        .stdout(predicate::str::contains("Records:      0"));
}

#[test]
fn passwd_changes_passphrase() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.psafe3");
    init(&store);
    run(&store, "pw", &["add", "--title", "Keep"]).success();

    bin()
        .env("PWSAFE_PASSWORD", "pw")
        .env("PWSAFE_NEW_PASSWORD", "fresh")
        .arg("--file")
        .arg(&store)
        .arg("passwd")
        .assert()
        .success()
        .stdout(predicate::str::contains("passphrase changed"));

    run(&store, "pw", &["list"]).failure();
    run(&store, "fresh", &["list"])
        .success()
        .stdout(predicate::str::contains("Keep"));
}

#[test]
fn corrupted_file_is_rejected() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.psafe3");
    init(&store);

    let mut bytes = std::fs::read(&store).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    std::fs::write(&store, bytes).unwrap();

    run(&store, "pw", &["list"])
        .failure()
        .stderr(predicate::str::contains("integrity check failed"));
}

#[test]
fn password_from_stdin() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("test.psafe3");
    init(&store);

    bin()
        .env_remove("PWSAFE_PASSWORD")
        .arg("--file")
        .arg(&store)
        .arg("list")
        .write_stdin("pw\n")
        .assert()
        .success();
}

#[test]
fn missing_file_argument_fails() {
    bin()
        .env_remove("PWSAFE_PATH")
        .env("PWSAFE_PASSWORD", "pw")
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no safe file given"));
}
