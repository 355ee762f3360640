use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::{fs, io::AsyncWriteExt};
use tracing::trace;

use crate::cache::{CacheLayer, LayerError};

/// Filesystem-backed tier that survives process restarts.
///
/// Each key is stored at `<root>/<xx>/<sha256(key)>`, where `xx` is the first
/// byte of the digest in hex. Writes land in a temporary file that is renamed
/// into place, so readers never observe a partially written value.
#[derive(Debug)]
pub struct DirectoryLayer {
    root: PathBuf,
    next_temp: AtomicU64,
}

impl DirectoryLayer {
    /// Open a directory tier rooted at `root`, creating it if necessary.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            next_temp: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let digest = hex::encode(hasher.finalize());
        self.root.join(&digest[..2]).join(digest)
    }
}

async fn persist(temp: &Path, path: &Path, value: &[u8]) -> Result<(), std::io::Error> {
    let mut file = fs::File::create(temp).await?;
    file.write_all(value).await?;
    file.flush().await?;
    drop(file);
    fs::rename(temp, path).await
}

#[async_trait]
impl CacheLayer for DirectoryLayer {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, LayerError> {
        match fs::read(self.path_for(key)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), LayerError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let sequence = self.next_temp.fetch_add(1, Ordering::Relaxed);
        let temp = path.with_extension(format!("tmp-{}-{sequence}", std::process::id()));

        if let Err(err) = persist(&temp, &path, &value).await {
            let _ = fs::remove_file(&temp).await;
            return Err(err.into());
        }
        trace!(key, path = %path.display(), bytes = value.len(), "Directory layer stored value");
        Ok(())
    }

    fn name(&self) -> &str {
        "directory"
    }
}
