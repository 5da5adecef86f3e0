//! Tests for `s3seal handle`.

use crate::support::*;

#[test]
fn test_handle_encrypts_every_record() {
    let t = Test::init();
    t.put(BUCKET, "one.txt", b"first");
    t.put(BUCKET, "dir/my file.txt", b"second");

    let event = t.write_event(&event_json(&[
        (BUCKET, "one.txt"),
        (BUCKET, "dir/my+file.txt"),
    ]));
    let output = t.handle(&event);
    assert_success(&output);

    assert!(!t.exists(BUCKET, "one.txt"));
    assert!(t.exists(BUCKET, "one.txt.encrypted"));
    assert!(!t.exists(BUCKET, "dir/my file.txt"));
    assert!(t.exists(BUCKET, "dir/my file.txt.encrypted"));
}

#[test]
fn test_handle_reads_stdin() {
    let t = Test::init();
    t.put(BUCKET, "stdin.txt", b"piped");

    let output = t
        .cmd()
        .arg("handle")
        .write_stdin(event_json(&[(BUCKET, "stdin.txt")]))
        .output()
        .unwrap();
    assert_success(&output);
    assert!(t.exists(BUCKET, "stdin.txt.encrypted"));
}

#[test]
fn test_handle_ignores_its_own_output() {
    let t = Test::init();
    t.put(BUCKET, "a.txt", b"plain");
    assert_success(&t.encrypt(BUCKET, "a.txt"));
    let before = t.read(BUCKET, "a.txt.encrypted");

    let event = t.write_event(&event_json(&[(BUCKET, "a.txt.encrypted")]));
    let output = t.handle(&event);
    assert_success(&output);
    assert_stdout_contains(&output, "skipped");
    assert_eq!(t.read(BUCKET, "a.txt.encrypted"), before);
}

#[test]
fn test_handle_record_failure_does_not_fail_invocation() {
    let t = Test::init();
    t.put(BUCKET, "present.txt", b"here");

    let event = t.write_event(&event_json(&[
        (BUCKET, "missing.txt"),
        (BUCKET, "present.txt"),
    ]));
    let output = t.handle(&event);
    assert_success(&output);
    assert_stderr_contains(&output, "missing.txt");
    assert!(t.exists(BUCKET, "present.txt.encrypted"));
}

#[test]
fn test_handle_missing_master_key_touches_nothing() {
    let t = Test::init();
    t.put(BUCKET, "keep.txt", b"keep me");

    let event = t.write_event(&event_json(&[(BUCKET, "keep.txt")]));
    let output = t
        .cmd()
        .env_remove("S3SEAL_KMS_KEY")
        .args(["handle", "--event"])
        .arg(&event)
        .output()
        .unwrap();
    assert_success(&output);
    assert_stderr_contains(&output, "config stage");
    assert_eq!(t.read(BUCKET, "keep.txt"), b"keep me");
    assert!(!t.exists(BUCKET, "keep.txt.encrypted"));
}

#[test]
fn test_handle_invalid_event_fails() {
    let t = Test::init();
    let event = t.write_event("{ not json");

    let output = t.handle(&event);
    assert_failure(&output);
    assert_stderr_contains(&output, "invalid event notification");
}

#[test]
fn test_handle_empty_event() {
    let t = Test::init();
    let event = t.write_event(r#"{"Records": []}"#);

    let output = t.handle(&event);
    assert_success(&output);
    assert_stderr_contains(&output, "no records");
}

#[test]
fn test_handle_skips_encrypted_key_with_unusable_config() {
    let t = Test::init();
    t.put(BUCKET, "a.txt.encrypted", b"sealed");

    let event = t.write_event(&event_json(&[(BUCKET, "a.txt.encrypted")]));
    let output = t
        .cmd()
        .env("S3SEAL_KMS_KEY", "mystery-key")
        .args(["handle", "--event"])
        .arg(&event)
        .output()
        .unwrap();
    assert_success(&output);
    assert_stdout_contains(&output, "skipped");
    assert_eq!(t.read(BUCKET, "a.txt.encrypted"), b"sealed");
}

#[test]
fn test_handle_missing_key_file_fails_each_record() {
    // No local-key run, so the key file does not exist.
    let t = Test::new();
    t.put(BUCKET, "plain.txt", b"plain");
    t.put(BUCKET, "done.txt.encrypted", b"sealed");

    let event = t.write_event(&event_json(&[
        (BUCKET, "plain.txt"),
        (BUCKET, "done.txt.encrypted"),
    ]));
    let output = t.handle(&event);
    assert_success(&output);
    assert_stderr_contains(&output, "config stage");
    assert_stderr_contains(&output, "local key file");
    assert_stdout_contains(&output, "skipped");
    assert_eq!(t.read(BUCKET, "plain.txt"), b"plain");
    assert!(!t.exists(BUCKET, "plain.txt.encrypted"));
}

#[test]
fn test_handle_invalid_config_fails_each_record() {
    let t = Test::init();
    t.put(BUCKET, "plain.txt", b"plain");

    let event = t.write_event(&event_json(&[(BUCKET, "plain.txt")]));
    let output = t
        .cmd()
        .env("S3SEAL_FRAME_SIZE", "16")
        .args(["handle", "--event"])
        .arg(&event)
        .output()
        .unwrap();
    assert_success(&output);
    assert_stderr_contains(&output, "config stage");
    assert_eq!(t.read(BUCKET, "plain.txt"), b"plain");
}

#[cfg(not(feature = "aws"))]
#[test]
fn test_handle_s3_store_without_feature_fails_each_record() {
    let t = Test::init();
    let event = t.write_event(&event_json(&[(BUCKET, "plain.txt")]));

    let output = t
        .cmd()
        .env("S3SEAL_STORE", "s3")
        .args(["handle", "--event"])
        .arg(&event)
        .output()
        .unwrap();
    assert_success(&output);
    assert_stderr_contains(&output, "--features aws");
}
