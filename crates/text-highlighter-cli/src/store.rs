//! Highlight descriptors persisted next to the document they belong to.

use std::path::{Path, PathBuf};

use text_highlighter_engine::{HighlightDescriptor, HighlightError, descriptors_from_json};

/// One decoded sidecar entry. Entries that fail to decode keep their slot.
pub type Record = Result<HighlightDescriptor, HighlightError>;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read highlights from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write highlights to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Highlights file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        source: HighlightError,
    },

    #[error("Failed to encode highlights: {0}")]
    Encode(#[from] serde_json::Error),
}

/// `notes.md` -> `notes.md.highlights.json`, in the same directory.
pub fn sidecar_path(document: &Path) -> PathBuf {
    let mut name = document.file_name().unwrap_or_default().to_os_string();
    name.push(".highlights.json");
    document.with_file_name(name)
}

/// Read the sidecar at `path`. Only a file that is not a JSON array is
/// [`StoreError::Malformed`].
pub fn load(path: &Path) -> Result<Option<Vec<Record>>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let records = descriptors_from_json(&json).map_err(|source| StoreError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(records))
}

pub fn save(path: &Path, descriptors: &[HighlightDescriptor]) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(descriptors)?;
    std::fs::write(path, json).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Saved {} highlight(s) to {}", descriptors.len(), path.display());
    Ok(())
}
