use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use puzzle_core::{Puzzle, PuzzleId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::comments::Comment;

/// Everything the service keeps. Serialized as one JSON document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collections {
    #[serde(default)]
    pub puzzles: BTreeMap<PuzzleId, Puzzle>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not read store file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("store file {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("could not encode store: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("could not write store file: {0}")]
    Write(#[from] std::io::Error),
}

/// Document store with serialized transactions.
///
/// Every mutation goes through [`Store::transaction`]: the closure works on a
/// draft copy while the write guard is held, and the draft only replaces the
/// live data once it has been persisted. Concurrent transactions therefore
/// observe each other's committed results and a failed write changes nothing.
#[derive(Clone, Default)]
pub struct Store {
    data: Arc<RwLock<Collections>>,
    persist_path: Option<PathBuf>,
}

impl Store {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn from_collections(data: Collections, persist_path: Option<PathBuf>) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            persist_path,
        }
    }

    /// Loads the snapshot at `path`, or starts empty if there is none yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let data = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Collections>(&bytes).map_err(|source| {
                StoreError::Corrupt {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(err) if err.kind() == ErrorKind::NotFound => Collections::default(),
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        info!(
            path = %path.display(),
            puzzles = data.puzzles.len(),
            comments = data.comments.len(),
            "store loaded"
        );
        Ok(Self::from_collections(data, Some(path)))
    }

    pub async fn read<R>(&self, f: impl FnOnce(&Collections) -> R) -> R {
        let guard = self.data.read().await;
        f(&*guard)
    }

    pub async fn transaction<R, E>(
        &self,
        f: impl FnOnce(&mut Collections) -> Result<R, E>,
    ) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.data.write().await;
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        if draft != *guard {
            self.persist(&draft).await?;
            *guard = draft;
        }
        Ok(out)
    }

    async fn persist(&self, data: &Collections) -> Result<(), StoreError> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };
        let json = serde_json::to_vec_pretty(data)?;
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), "store persisted");
        Ok(())
    }
}
