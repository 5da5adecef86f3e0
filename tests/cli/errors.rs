//! Tests for error handling and CLI flags.

use crate::support::*;
use predicates::prelude::*;

#[test]
fn test_help() {
    let t = Test::new();
    t.cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_unknown_command_fails() {
    let t = Test::new();
    let output = t.cmd().arg("unknown-command").output().unwrap();
    assert_failure(&output);
}

#[test]
fn test_version_flag() {
    let t = Test::new();
    t.cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("s3seal"));
}

#[test]
fn test_verbose_and_json_logs_accepted() {
    let t = Test::init();
    t.put(BUCKET, "v.txt", b"v");

    let output = t
        .cmd()
        .args(["--verbose", "--log-json", "encrypt", BUCKET, "v.txt"])
        .output()
        .unwrap();
    assert_success(&output);
    assert_stderr_contains(&output, "\"level\"");
}

#[test]
fn test_completions_bash_outputs_script() {
    let t = Test::new();
    t.cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("s3seal"));
}

#[test]
fn test_local_key_refuses_overwrite() {
    let t = Test::init();
    let output = t.local_key();
    assert_failure(&output);
    assert_stderr_contains(&output, "already exists");
}

#[test]
fn test_local_key_hints() {
    let t = Test::new();
    let output = t.local_key();
    assert_success(&output);
    assert_stderr_contains(&output, "S3SEAL_KMS_KEY=local:default");
}

#[test]
fn test_unrecognized_master_key() {
    let t = Test::init();
    t.put(BUCKET, "a.txt", b"a");

    let output = t
        .cmd()
        .env("S3SEAL_KMS_KEY", "vault:transit/key")
        .args(["encrypt", BUCKET, "a.txt"])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "unrecognized master key");
    assert_stderr_contains(&output, "local:<name>");
}

#[test]
fn test_fs_store_requires_root() {
    let t = Test::init();
    let output = t
        .cmd()
        .env_remove("S3SEAL_FS_ROOT")
        .args(["encrypt", BUCKET, "a.txt"])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "store.root");
}

#[cfg(not(feature = "aws"))]
#[test]
fn test_s3_store_needs_aws_feature() {
    let t = Test::init();
    let output = t
        .cmd()
        .env("S3SEAL_STORE", "s3")
        .args(["encrypt", BUCKET, "a.txt"])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "--features aws");
}
