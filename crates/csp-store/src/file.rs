//! JSON-file checkout store: `<dir>/<name>.json`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use csp_reconcile::{CheckoutStateStore, CollaboratorError};
use csp_schemas::CheckoutInfo;
use tracing::debug;

use crate::record::StateRecord;

#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl AsRef<Path>, name: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{name}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Filesystem failure on `path`, reported as a transport error.
pub fn io_err(action: &str, path: &Path, err: std::io::Error) -> CollaboratorError {
    CollaboratorError::Transport(format!("{action} {}: {err}", path.display()))
}

/// Write `bytes` next to `path` and rename over it, so readers never see a
/// half-written file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CollaboratorError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_err("create dir", parent, e))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| io_err("write", &tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| io_err("rename into", path, e))
}

#[async_trait]
impl CheckoutStateStore for FileStateStore {
    async fn read(&self) -> Result<Option<CheckoutInfo>, CollaboratorError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err("read", &self.path, e)),
        };
        let record: StateRecord = serde_json::from_slice(&bytes)
            .map_err(|e| CollaboratorError::Decode(format!("{}: {e}", self.path.display())))?;
        record.into_checkout_info().map(Some)
    }

    async fn write(&self, info: &CheckoutInfo) -> Result<(), CollaboratorError> {
        let bytes = serde_json::to_vec_pretty(&StateRecord::from(info))
            .map_err(|e| CollaboratorError::Decode(e.to_string()))?;
        write_atomic(&self.path, &bytes).await?;
        debug!(path = %self.path.display(), "saved checkout state");
        Ok(())
    }
}
