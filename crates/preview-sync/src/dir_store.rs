//! Directory-backed object store.
//!
//! Layout under the store root:
//!
//! ```text
//! objects/<key>        object body
//! meta/<key>.json      {"content_type": ..., "acl": ..., "fingerprint": ...}
//! ```
//!
//! Used by the CLI to stage a deployment locally and by integration tests.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use preview_core::Fingerprint;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::store::{ObjectStore, PutObject};

#[derive(Debug, Serialize, Deserialize)]
struct ObjectMeta {
    content_type: String,
    #[serde(default)]
    acl: String,
    fingerprint: Fingerprint,
    size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of an object body.
    pub fn object_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        Ok(self.root.join("objects").join(checked_key(key)?))
    }

    fn meta_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        Ok(self
            .root
            .join("meta")
            .join(format!("{}.json", checked_key(key)?)))
    }

    /// Content-type recorded for `key`.
    pub async fn content_type(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_meta(key).await?.map(|m| m.content_type))
    }

    /// Access control recorded for `key`.
    pub async fn acl(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_meta(key).await?.map(|m| m.acl))
    }

    async fn read_meta(&self, key: &str) -> Result<Option<ObjectMeta>, StoreError> {
        let path = self.meta_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Metadata(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

/// Keys become relative paths; refuse anything that could escape the root.
fn checked_key(key: &str) -> Result<&str, StoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|s| s.is_empty() || s == "." || s == "..");
    if bad {
        return Err(StoreError::Rejected {
            key: key.to_string(),
            reason: "key is not a relative slash-separated path".to_string(),
        });
    }
    Ok(key)
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

#[async_trait]
impl ObjectStore for DirStore {
    async fn put(&self, object: PutObject) -> Result<(), StoreError> {
        let body_path = self.object_path(&object.key)?;
        let meta_path = self.meta_path(&object.key)?;
        let meta = ObjectMeta {
            content_type: object.content_type,
            acl: object.acl,
            fingerprint: object.fingerprint,
            size_bytes: object.body.len() as u64,
        };
        let meta_bytes =
            serde_json::to_vec_pretty(&meta).map_err(|e| StoreError::Metadata(e.to_string()))?;

        // Metadata last: a body without metadata reads as absent.
        write_file(&body_path, &object.body).await?;
        write_file(&meta_path, &meta_bytes).await?;

        debug!(key = %object.key, path = %body_path.display(), "dir store put");
        Ok(())
    }

    async fn head(&self, key: &str) -> Result<Option<Fingerprint>, StoreError> {
        Ok(self.read_meta(key).await?.map(|m| m.fingerprint))
    }
}
