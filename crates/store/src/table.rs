//! Shared load/persist helpers for the JSON tables.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;

/// Load a table from disk.
///
/// A missing file is a fresh deployment and yields the default value. A
/// file that fails to parse is logged and treated as empty rather than
/// wedging every operation behind an unreadable table.
pub(crate) async fn load_or_default<T>(path: &Path) -> Result<T, StoreError>
where
    T: DeserializeOwned + Default,
{
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(value),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "State file is corrupt, starting from an empty table"
            );
            Ok(T::default())
        }
    }
}

/// Persist a table atomically: write a sibling temp file, then rename it
/// over the destination.
pub(crate) async fn persist<T>(path: &Path, value: &T) -> Result<(), StoreError>
where
    T: Serialize,
{
    let encoded = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Encode {
        path: path.to_path_buf(),
        source: e,
    })?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::Write {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &encoded)
        .await
        .map_err(|e| StoreError::Write {
            path: tmp.clone(),
            source: e,
        })?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::Write {
            path: path.to_path_buf(),
            source: e,
        })
}
