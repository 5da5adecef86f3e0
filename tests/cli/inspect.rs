//! Tests for `s3seal inspect`.

use crate::support::*;

fn encrypted(t: &Test, key: &str) -> std::path::PathBuf {
    t.put(BUCKET, key, b"inspect me");
    assert_success(&t.encrypt(BUCKET, key));
    t.object_path(BUCKET, &format!("{}.encrypted", key))
}

#[test]
fn test_inspect_shows_header() {
    let t = Test::init();
    let path = encrypted(&t, "x.txt");

    let output = t.inspect(&path);
    assert_success(&output);
    assert_stdout_contains(&output, "local:test");
    assert_stdout_contains(&output, "key=x.txt.encrypted");
    assert_stdout_contains(&output, "0x0578");
    assert_stdout_contains(&output, "4096");
}

#[test]
fn test_inspect_json() {
    let t = Test::init();
    let path = encrypted(&t, "y.txt");

    let output = t.cmd().arg("inspect").arg(&path).arg("--json").output().unwrap();
    assert_success(&output);

    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["master_key"], "local:test");
    assert_eq!(doc["provider"], "local");
    assert_eq!(doc["context"]["key"], "y.txt.encrypted");
    assert_eq!(doc["frame_size"], 4096);
    assert_eq!(doc["suite_id"], 0x0578);
}

#[test]
fn test_inspect_needs_no_key() {
    let t = Test::init();
    let path = encrypted(&t, "z.txt");

    let output = t
        .cmd()
        .env_remove("S3SEAL_KMS_KEY")
        .env_remove("S3SEAL_LOCAL_KEY_FILE")
        .arg("inspect")
        .arg(&path)
        .output()
        .unwrap();
    assert_success(&output);
}

#[test]
fn test_inspect_plaintext_fails() {
    let t = Test::new();
    let path = t.work_path("plain.txt");
    std::fs::write(&path, b"just some text, no header here").unwrap();

    let output = t.inspect(&path);
    assert_failure(&output);
    assert_stderr_contains(&output, "bad magic");
}
