//! Small JSON documents kept under the agent data directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Read a JSON document. A missing file is `Ok(None)`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::Io(path.to_path_buf(), e)),
    };
    let value =
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Parse(path.to_path_buf(), e))?;
    Ok(Some(value))
}

/// Write a JSON document via a sibling temp file and rename.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::Io(parent.to_path_buf(), e))?;
    }
    let payload =
        serde_json::to_vec_pretty(value).map_err(|e| StoreError::Parse(path.to_path_buf(), e))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, payload).map_err(|e| StoreError::Io(tmp.clone(), e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::Io(path.to_path_buf(), e))?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Invalid JSON in {0}: {1}")]
    Parse(PathBuf, #[source] serde_json::Error),
}
