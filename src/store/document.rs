use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard};

use super::StoreError;

/// One JSON document on disk holding a whole collection.
///
/// Writers hold `lock` across the full read-modify-write cycle, so two
/// concurrent updates to the same collection never interleave. Writes land in
/// a sibling temp file that is fsynced and renamed over the document.
pub(crate) struct Document<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Document<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `default` if the document does not exist yet. Returns whether it
    /// was created.
    pub async fn ensure(&self, default: &T) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let exists = tokio::fs::try_exists(&self.path)
            .await
            .map_err(|source| self.io_error(source))?;
        if exists {
            return Ok(false);
        }
        self.write(default).await?;
        Ok(true)
    }

    pub async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    /// Read the document. Callers must hold the guard from [`Document::lock`].
    pub async fn load(&self, _guard: &MutexGuard<'_, ()>) -> Result<T, StoreError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| self.io_error(source))?;
        serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    pub async fn read(&self) -> Result<T, StoreError> {
        let guard = self.lock.lock().await;
        self.load(&guard).await
    }

    /// Replace the document wholesale.
    pub async fn replace(&self, value: &T) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.write(value).await
    }

    /// Read, mutate in memory, write back. Nothing is written if `f` fails.
    pub async fn modify<R, F>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut T) -> Result<R, StoreError>,
    {
        let guard = self.lock.lock().await;
        let mut value = self.load(&guard).await?;
        let result = f(&mut value)?;
        self.write(&value).await?;
        Ok(result)
    }

    async fn write(&self, value: &T) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(value).map_err(|source| StoreError::Encode {
            path: self.path.clone(),
            source,
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        let result = async {
            write_synced(&tmp_path, content.as_bytes()).await?;
            tokio::fs::rename(&tmp_path, &self.path).await
        }
        .await;
        if let Err(source) = result {
            if let Err(e) = tokio::fs::remove_file(&tmp_path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Could not remove {}: {}", tmp_path.display(), e);
                }
            }
            return Err(self.io_error(source));
        }

        self.sync_parent().await
    }

    /// Flush the directory entry so the rename survives a crash.
    #[cfg(unix)]
    async fn sync_parent(&self) -> Result<(), StoreError> {
        let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };
        let dir = tokio::fs::File::open(parent)
            .await
            .map_err(|source| self.io_error(source))?;
        dir.sync_all().await.map_err(|source| self.io_error(source))
    }

    #[cfg(not(unix))]
    async fn sync_parent(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}
