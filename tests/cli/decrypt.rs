//! Tests for `s3seal decrypt`.

use crate::support::*;

#[test]
fn test_decrypt_roundtrip_to_file() {
    let t = Test::init();
    let payload = sample_payload();
    t.put(BUCKET, "data.bin", &payload);
    assert_success(&t.encrypt(BUCKET, "data.bin"));

    let out = t.work_path("data.out");
    let output = t.decrypt_to(BUCKET, "data.bin.encrypted", &out);
    assert_success(&output);
    assert_eq!(std::fs::read(&out).unwrap(), payload);
}

#[test]
fn test_decrypt_to_stdout() {
    let t = Test::init();
    t.put(BUCKET, "greeting.txt", b"hello, sealed world");
    assert_success(&t.encrypt(BUCKET, "greeting.txt"));

    let output = t
        .cmd()
        .args(["decrypt", BUCKET, "greeting.txt.encrypted"])
        .output()
        .unwrap();
    assert_success(&output);
    assert_eq!(output.stdout, b"hello, sealed world");
}

#[test]
fn test_decrypt_moved_ciphertext_fails() {
    let t = Test::init();
    t.put(BUCKET, "a.txt", b"secret a");
    assert_success(&t.encrypt(BUCKET, "a.txt"));

    // The context names the original key, so a renamed object is rejected.
    std::fs::rename(
        t.object_path(BUCKET, "a.txt.encrypted"),
        t.object_path(BUCKET, "b.txt.encrypted"),
    )
    .unwrap();

    let out = t.work_path("b.out");
    let output = t.decrypt_to(BUCKET, "b.txt.encrypted", &out);
    assert_failure(&output);
    assert_stderr_contains(&output, "encryption context");
    assert!(!out.exists());
}

#[test]
fn test_decrypt_with_other_master_key_fails() {
    let t = Test::init();
    t.put(BUCKET, "a.txt", b"secret a");
    assert_success(&t.encrypt(BUCKET, "a.txt"));

    let other = t.work_path("other.key");
    assert_success(&t.cmd().arg("local-key").arg(&other).output().unwrap());

    let out = t.work_path("a.out");
    let output = t
        .cmd()
        .env("S3SEAL_LOCAL_KEY_FILE", &other)
        .args(["decrypt", BUCKET, "a.txt.encrypted", "--output"])
        .arg(&out)
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "decryption failed");
    assert!(!out.exists());
}

#[test]
fn test_decrypt_truncated_ciphertext_fails() {
    let t = Test::init();
    t.put(BUCKET, "a.bin", &sample_payload());
    assert_success(&t.encrypt(BUCKET, "a.bin"));

    let mut ciphertext = t.read(BUCKET, "a.bin.encrypted");
    ciphertext.truncate(ciphertext.len() - 10);
    t.put(BUCKET, "a.bin.encrypted", &ciphertext);

    let out = t.work_path("a.out");
    let output = t.decrypt_to(BUCKET, "a.bin.encrypted", &out);
    assert_failure(&output);
    assert_stderr_contains(&output, "truncated");
    assert!(!out.exists());
}

#[test]
fn test_decrypt_requires_master_key() {
    let t = Test::init();
    t.put(BUCKET, "a.txt.encrypted", b"whatever");

    let output = t
        .cmd()
        .env_remove("S3SEAL_KMS_KEY")
        .args(["decrypt", BUCKET, "a.txt.encrypted"])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "master key");
}
