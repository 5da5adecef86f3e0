//! Tests for `s3seal encrypt`.

use crate::support::*;

#[test]
fn test_encrypt_replaces_object() {
    let t = Test::init();
    t.put(BUCKET, "reports/q1.csv", &sample_payload());

    let output = t.encrypt(BUCKET, "reports/q1.csv");
    assert_success(&output);
    assert_stdout_contains(&output, "reports/q1.csv.encrypted");

    assert!(!t.exists(BUCKET, "reports/q1.csv"));
    let ciphertext = t.read(BUCKET, "reports/q1.csv.encrypted");
    assert!(ciphertext.starts_with(b"S3SL"));
    assert!(ciphertext.len() > sample_payload().len());
}

#[test]
fn test_encrypt_empty_object() {
    let t = Test::init();
    t.put(BUCKET, "empty.txt", b"");

    assert_success(&t.encrypt(BUCKET, "empty.txt"));
    assert!(!t.exists(BUCKET, "empty.txt"));
    assert!(t.exists(BUCKET, "empty.txt.encrypted"));
}

#[test]
fn test_encrypt_skips_encrypted_key() {
    let t = Test::init();
    t.put(BUCKET, "a.txt.encrypted", b"not really ciphertext");

    let output = t.encrypt(BUCKET, "a.txt.encrypted");
    assert_success(&output);
    assert_stdout_contains(&output, "skipped");
    assert_eq!(t.read(BUCKET, "a.txt.encrypted"), b"not really ciphertext");
    assert!(!t.exists(BUCKET, "a.txt.encrypted.encrypted"));
}

#[test]
fn test_encrypt_missing_object_fails() {
    let t = Test::init();

    let output = t.encrypt(BUCKET, "nope.txt");
    assert_failure(&output);
    assert_stderr_contains(&output, "source stage");
    assert!(!t.exists(BUCKET, "nope.txt.encrypted"));
}

#[test]
fn test_encrypt_without_master_key_leaves_source() {
    let t = Test::init();
    t.put(BUCKET, "plain.txt", b"hello");

    let output = t
        .cmd()
        .env_remove("S3SEAL_KMS_KEY")
        .args(["encrypt", BUCKET, "plain.txt"])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "S3SEAL_KMS_KEY");
    assert_eq!(t.read(BUCKET, "plain.txt"), b"hello");
    assert!(!t.exists(BUCKET, "plain.txt.encrypted"));
}

#[test]
fn test_encrypt_respects_frame_size_override() {
    let t = Test::init();
    t.put(BUCKET, "f.bin", &sample_payload());

    let output = t
        .cmd()
        .env("S3SEAL_FRAME_SIZE", "1024")
        .args(["encrypt", BUCKET, "f.bin"])
        .output()
        .unwrap();
    assert_success(&output);

    let inspected = t.inspect(&t.object_path(BUCKET, "f.bin.encrypted"));
    assert_success(&inspected);
    assert_stdout_contains(&inspected, "1024");
}
