//! Filesystem object store.
//!
//! Objects live at `<root>/<bucket>/<key>`. Uploads are written to a hidden
//! temporary file next to the destination and renamed into place on
//! completion, so a partial upload is never visible under the final name.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};

use super::{ObjectStore, SourceBody, Upload};
use crate::core::object::ObjectRef;
use crate::error::{Result, StoreError};

/// Directory-backed object store
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an object reference to its path, rejecting anything that would
    /// escape the bucket directory.
    pub fn path_of(&self, object: &ObjectRef) -> Result<PathBuf> {
        let bucket = object.bucket();
        let bad_bucket = bucket.is_empty()
            || bucket == "."
            || bucket == ".."
            || bucket.contains(|c: char| c == '/' || c == '\\');
        if bad_bucket {
            return Err(StoreError::InvalidReference(format!("bucket '{}'", bucket)).into());
        }

        let key = Path::new(object.key());
        let valid = !object.key().is_empty()
            && !object.key().ends_with('/')
            && key.components().all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(StoreError::InvalidReference(format!("key '{}'", object.key())).into());
        }

        Ok(self.root.join(bucket).join(key))
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    fn name(&self) -> &'static str {
        "fs"
    }

    async fn get(&self, object: &ObjectRef) -> Result<SourceBody> {
        let path = self.path_of(object)?;
        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(object.to_string()).into())
            }
            Err(e) => return Err(StoreError::ReadFailed(format!("{}: {}", object, e)).into()),
        };
        if !meta.is_file() {
            debug!(path = %path.display(), "source is not a regular file");
            return Ok(SourceBody::Absent);
        }

        let file = fs::File::open(&path)
            .await
            .map_err(|e| StoreError::ReadFailed(format!("{}: {}", object, e)))?;
        trace!(path = %path.display(), size = meta.len(), "opened source file");
        Ok(SourceBody::Stream(Box::pin(file)))
    }

    async fn start_upload(&self, object: &ObjectRef) -> Result<Box<dyn Upload>> {
        let dest = self.path_of(object)?;
        let parent = dest
            .parent()
            .ok_or_else(|| StoreError::InvalidReference(object.to_string()))?;
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::WriteFailed(format!("{}: {}", object, e)))?;

        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = parent.join(format!(".{}.partial-{}", name, uuid::Uuid::new_v4()));
        let file = fs::File::create(&temp)
            .await
            .map_err(|e| StoreError::WriteFailed(format!("{}: {}", object, e)))?;

        debug!(temp = %temp.display(), "started upload");
        Ok(Box::new(FsUpload {
            file,
            temp,
            dest,
            written: 0,
        }))
    }

    async fn delete(&self, object: &ObjectRef) -> Result<()> {
        let path = self.path_of(object)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(object = %object, "delete of missing object");
                Ok(())
            }
            Err(e) => Err(StoreError::DeleteFailed(format!("{}: {}", object, e)).into()),
        }
    }
}

struct FsUpload {
    file: fs::File,
    temp: PathBuf,
    dest: PathBuf,
    written: u64,
}

#[async_trait]
impl Upload for FsUpload {
    async fn write(&mut self, chunk: Bytes) -> Result<()> {
        self.file
            .write_all(&chunk)
            .await
            .map_err(|e| StoreError::WriteFailed(format!("{}: {}", self.temp.display(), e)))?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    async fn complete(mut self: Box<Self>) -> Result<()> {
        let committed = async {
            self.file.flush().await?;
            self.file.sync_all().await?;
            fs::rename(&self.temp, &self.dest).await
        }
        .await;

        if let Err(e) = committed {
            if let Err(rm) = fs::remove_file(&self.temp).await {
                warn!(temp = %self.temp.display(), error = %rm, "failed to remove partial upload");
            }
            return Err(StoreError::WriteFailed(format!("{}: {}", self.dest.display(), e)).into());
        }
        debug!(path = %self.dest.display(), bytes = self.written, "upload completed");
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        let FsUpload { file, temp, .. } = *self;
        drop(file);
        if let Err(e) = fs::remove_file(&temp).await {
            warn!(temp = %temp.display(), error = %e, "failed to remove partial upload");
            return Err(StoreError::WriteFailed(format!("{}: {}", temp.display(), e)).into());
        }
        debug!(temp = %temp.display(), "upload aborted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn store() -> (TempDir, FsStore) {
        let tmp = TempDir::new().unwrap();
        let store = FsStore::new(tmp.path());
        (tmp, store)
    }

    #[test]
    fn test_path_of_rejects_escapes() {
        let (_tmp, store) = store();
        for (bucket, key) in [
            ("b", "../x"),
            ("b", "/etc/passwd"),
            ("b", "a/../../x"),
            ("b", ""),
            ("b", "dir/"),
            ("..", "x"),
            ("a/b", "x"),
            ("", "x"),
        ] {
            assert!(store.path_of(&ObjectRef::new(bucket, key)).is_err(), "{bucket}/{key}");
        }
        assert!(store.path_of(&ObjectRef::new("b", "a/b.txt")).is_ok());
    }

    #[tokio::test]
    async fn test_upload_visible_only_after_complete() {
        let (_tmp, store) = store();
        let obj = ObjectRef::new("bucket", "a/b.txt");

        let mut upload = store.start_upload(&obj).await.unwrap();
        upload.write(Bytes::from_static(b"hello ")).await.unwrap();
        upload.write(Bytes::from_static(b"world")).await.unwrap();
        assert!(!store.path_of(&obj).unwrap().exists());

        upload.complete().await.unwrap();
        let SourceBody::Stream(mut reader) = store.get(&obj).await.unwrap() else {
            panic!("expected stream");
        };
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "hello world");
    }

    #[tokio::test]
    async fn test_abort_leaves_nothing() {
        let (tmp, store) = store();
        let obj = ObjectRef::new("bucket", "x.bin");
        let mut upload = store.start_upload(&obj).await.unwrap();
        upload.write(Bytes::from_static(b"partial")).await.unwrap();
        upload.abort().await.unwrap();

        let entries: Vec<_> = std::fs::read_dir(tmp.path().join("bucket")).unwrap().collect();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_failed_complete_removes_temp() {
        let (tmp, store) = store();
        let obj = ObjectRef::new("bucket", "taken");
        let mut upload = store.start_upload(&obj).await.unwrap();
        upload.write(Bytes::from_static(b"data")).await.unwrap();

        // A non-empty directory at the destination makes the rename fail.
        std::fs::create_dir_all(tmp.path().join("bucket").join("taken").join("child")).unwrap();
        assert!(upload.complete().await.is_err());

        let names: Vec<String> = std::fs::read_dir(tmp.path().join("bucket"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["taken".to_string()]);
    }

    #[tokio::test]
    async fn test_get_missing_and_directory() {
        let (tmp, store) = store();
        assert!(matches!(
            store.get(&ObjectRef::new("bucket", "nope")).await,
            Err(crate::error::Error::Store(StoreError::NotFound(_)))
        ));

        std::fs::create_dir_all(tmp.path().join("bucket").join("dir")).unwrap();
        assert!(matches!(
            store.get(&ObjectRef::new("bucket", "dir")).await.unwrap(),
            SourceBody::Absent
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (tmp, store) = store();
        let obj = ObjectRef::new("bucket", "f.txt");
        std::fs::create_dir_all(tmp.path().join("bucket")).unwrap();
        std::fs::write(tmp.path().join("bucket").join("f.txt"), b"x").unwrap();

        store.delete(&obj).await.unwrap();
        assert!(!tmp.path().join("bucket").join("f.txt").exists());
        store.delete(&obj).await.unwrap();
    }
}
