//! Test support utilities for s3seal integration tests.
//!
//! Provides an isolated bucket root and key directory per test, plus
//! helpers for driving the binary against the filesystem store.

#![allow(dead_code)]

pub mod assertions;
pub mod commands;
pub mod fixtures;
pub mod skip;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;

use std::path::PathBuf;

use tempfile::TempDir;

/// Test environment with isolated temp directories.
///
/// No process-global state is mutated; child processes get everything they
/// need through their own environment, so tests can run in parallel.
pub struct Test {
    /// Root of the filesystem object store (one directory per bucket)
    pub root: TempDir,
    /// Key files, event files and decrypted output
    pub work: TempDir,
}

impl Test {
    /// Create a new empty test environment. No master key exists yet.
    pub fn new() -> Self {
        let root = TempDir::new().expect("failed to create temp bucket root");
        let work = TempDir::new().expect("failed to create temp work dir");
        Self { root, work }
    }

    /// Create a test environment with a local master key generated.
    pub fn init() -> Self {
        let t = Self::new();
        let output = t.local_key();
        assert!(
            output.status.success(),
            "Failed to generate master key: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        t
    }

    /// Path of the local master key file.
    pub fn key_file(&self) -> PathBuf {
        self.work.path().join("master.key")
    }

    /// Path in the work directory.
    pub fn work_path(&self, name: &str) -> PathBuf {
        self.work.path().join(name)
    }

    /// Path of an object in the store.
    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.root.path().join(bucket).join(key)
    }

    /// Write an object straight into the store.
    pub fn put(&self, bucket: &str, key: &str, data: &[u8]) {
        let path = self.object_path(bucket, key);
        std::fs::create_dir_all(path.parent().expect("object has a parent"))
            .expect("failed to create bucket dir");
        std::fs::write(path, data).expect("failed to write object");
    }

    /// Read an object straight from the store.
    pub fn read(&self, bucket: &str, key: &str) -> Vec<u8> {
        std::fs::read(self.object_path(bucket, key)).expect("failed to read object")
    }

    pub fn exists(&self, bucket: &str, key: &str) -> bool {
        self.object_path(bucket, key).exists()
    }

    /// Write an event file into the work directory and return its path.
    pub fn write_event(&self, json: &str) -> PathBuf {
        let path = self.work_path("event.json");
        std::fs::write(&path, json).expect("failed to write event");
        path
    }
}
