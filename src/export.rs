//! The exported `games.json` catalog document.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::catalog::{Catalog, GameRecord};

/// Errors that can occur while writing or reading the exported catalog.
#[derive(Debug, Error)]
pub enum ExportError {
    /// File system error.
    #[error("IO error at {}: {source}", path.display())]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The document could not be encoded or decoded.
    #[error("invalid catalog document {}: {source}", path.display())]
    Json {
        /// The path involved.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

impl ExportError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One object of the exported document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEntry {
    /// Catalog identifier.
    pub id: String,
    /// Folder or file name on the mirror, relative to its base path.
    pub relative_path: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Where the item was downloaded from, first-party or not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    /// Language codes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    /// Display name of the platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    /// Fields injected by overrides.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl From<&GameRecord> for ExportEntry {
    fn from(record: &GameRecord) -> Self {
        Self {
            id: record.id.clone(),
            relative_path: record.target_name().to_string(),
            description: record.description.clone(),
            download_url: record.download_url().map(str::to_string),
            languages: record.languages.clone(),
            platform: record.platform.clone(),
            extensions: record.extensions.clone(),
        }
    }
}

/// Builds the sorted, duplicate-free entry list for `processed` targets.
///
/// Entries are ordered case-insensitively by id, ties broken by
/// `relative_path`. Targets missing from the catalog are ignored.
pub fn export_entries<'a>(
    catalog: &Catalog,
    processed: impl IntoIterator<Item = &'a str>,
) -> Vec<ExportEntry> {
    let mut seen = BTreeSet::new();
    let mut entries: Vec<ExportEntry> = processed
        .into_iter()
        .filter(|target| seen.insert(*target))
        .filter_map(|target| catalog.get(target))
        .map(ExportEntry::from)
        .collect();
    entries.sort_by(|a, b| {
        a.id.to_lowercase()
            .cmp(&b.id.to_lowercase())
            .then_with(|| a.relative_path.cmp(&b.relative_path))
    });
    entries
}

/// Writes the processed items to `path`.
///
/// Nothing is written when `processed` is empty, so a run that did no work
/// keeps the previous document. The file is replaced atomically through a
/// sibling `.tmp` file. Returns the number of entries written.
///
/// # Errors
///
/// Returns [`ExportError`] if the document cannot be encoded or written.
pub async fn export_catalog<'a>(
    catalog: &Catalog,
    processed: impl IntoIterator<Item = &'a str>,
    path: &Path,
) -> Result<Option<usize>, ExportError> {
    let entries = export_entries(catalog, processed);
    if entries.is_empty() {
        debug!(path = %path.display(), "nothing processed, catalog not rewritten");
        return Ok(None);
    }

    let body = serde_json::to_string_pretty(&entries).map_err(|e| ExportError::json(path, e))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ExportError::io(parent, e))?;
    }

    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);
    tokio::fs::write(&temp, body)
        .await
        .map_err(|e| ExportError::io(&temp, e))?;
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(ExportError::io(path, e));
    }

    info!(path = %path.display(), entries = entries.len(), "catalog exported");
    Ok(Some(entries.len()))
}

/// Reads an exported document back.
///
/// # Errors
///
/// Returns [`ExportError`] if the file cannot be read or parsed.
pub async fn read_export(path: &Path) -> Result<Vec<ExportEntry>, ExportError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ExportError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| ExportError::json(path, e))
}
