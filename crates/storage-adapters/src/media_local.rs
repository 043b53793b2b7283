//! # Local MediaStore
//!
//! Content-addressable storage with directory sharding. Identical payloads
//! collapse onto one file; the original extension is kept so the file can
//! be re-sent with a sensible name.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use domains::{MediaStore, StoreError};
use sha2::{Digest, Sha256};
use tokio::fs;

pub struct LocalMediaStore {
    /// Root directory for all uploads (e.g. "./uploads").
    root_path: PathBuf,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_path
    }

    /// Relative locator: "ab/cd/abcd...hash.ext".
    fn sharded_locator(hash: &str, file_name: &str) -> String {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();
        format!("{}/{}/{}{}", &hash[0..2], &hash[2..4], hash, ext)
    }

    /// Absolute path of a previously returned locator.
    pub fn resolve(&self, locator: &str) -> PathBuf {
        self.root_path.join(locator)
    }
}

fn io_err(err: std::io::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn save_upload(&self, data: Bytes, file_name: &str) -> Result<String, StoreError> {
        let hash = hex::encode(Sha256::digest(&data));
        let locator = Self::sharded_locator(&hash, file_name);
        let target = self.resolve(&locator);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        if fs::try_exists(&target).await.map_err(io_err)? {
            tracing::debug!(%locator, "upload already stored");
        } else {
            fs::write(&target, &data).await.map_err(io_err)?;
            tracing::debug!(%locator, bytes = data.len(), "stored upload");
        }

        Ok(locator)
    }
}
