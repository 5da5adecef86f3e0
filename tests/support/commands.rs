//! Command helper methods for Test.

use super::Test;
use assert_cmd::Command;
use std::path::Path;
use std::process::Output;

/// Master key reference used by every test environment.
pub const MASTER_KEY: &str = "local:test";

impl Test {
    /// Create an s3seal command wired to this environment.
    ///
    /// Returns a Command configured with:
    /// - the filesystem store rooted at the temp bucket root
    /// - the local master key file in the work directory
    /// - colors disabled and no ambient config file
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("s3seal").expect("failed to find s3seal binary");
        for var in ["S3SEAL_CONFIG", "S3SEAL_LOG", "S3SEAL_FRAME_SIZE", "KMS_KEY", "AWS_REGION"] {
            cmd.env_remove(var);
        }
        cmd.env("NO_COLOR", "1");
        cmd.env("S3SEAL_STORE", "fs");
        cmd.env("S3SEAL_FS_ROOT", self.root.path());
        cmd.env("S3SEAL_KMS_KEY", MASTER_KEY);
        cmd.env("S3SEAL_LOCAL_KEY_FILE", self.key_file());
        cmd.current_dir(self.work.path());
        cmd
    }

    /// Shortcut for `s3seal local-key`.
    pub fn local_key(&self) -> Output {
        self.cmd()
            .arg("local-key")
            .arg(self.key_file())
            .output()
            .expect("failed to run s3seal local-key")
    }

    /// Shortcut for `s3seal encrypt`.
    pub fn encrypt(&self, bucket: &str, key: &str) -> Output {
        self.cmd()
            .args(["encrypt", bucket, key])
            .output()
            .expect("failed to run s3seal encrypt")
    }

    /// Shortcut for `s3seal decrypt --output`.
    pub fn decrypt_to(&self, bucket: &str, key: &str, out: &Path) -> Output {
        self.cmd()
            .args(["decrypt", bucket, key, "--output"])
            .arg(out)
            .output()
            .expect("failed to run s3seal decrypt")
    }

    /// Shortcut for `s3seal handle --event`.
    pub fn handle(&self, event: &Path) -> Output {
        self.cmd()
            .args(["handle", "--event"])
            .arg(event)
            .output()
            .expect("failed to run s3seal handle")
    }

    /// Shortcut for `s3seal inspect`.
    pub fn inspect(&self, path: &Path) -> Output {
        self.cmd()
            .arg("inspect")
            .arg(path)
            .output()
            .expect("failed to run s3seal inspect")
    }
}
