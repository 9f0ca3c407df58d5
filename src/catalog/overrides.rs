//! Local override file (`metadata.json`) loading.
//!
//! The override file is a JSON object keyed by target name. Each value holds
//! field overrides plus the optional `id` and `skip` controls; keys outside
//! the known field set are carried through to the exported catalog.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Field overrides for one target name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OverrideEntry {
    /// Catalog identifier; entries without one never create records.
    #[serde(default)]
    pub id: Option<String>,
    /// `true` excludes the item from transfer.
    #[serde(default)]
    pub skip: Option<bool>,
    /// Description override.
    #[serde(default)]
    pub description: Option<String>,
    /// Platform display name override.
    #[serde(default)]
    pub platform: Option<String>,
    /// Language list override.
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    /// Download URL override.
    #[serde(default)]
    pub download_url: Option<String>,
    /// Redundant with the object key; ignored.
    #[serde(default)]
    pub relative_path: Option<String>,
    /// Any other keys, exported verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl OverrideEntry {
    /// Whether the entry excludes its item from transfer.
    #[must_use]
    pub fn is_skip(&self) -> bool {
        self.skip == Some(true)
    }
}

/// Errors that can occur while loading the override file.
#[derive(Debug, Error)]
pub enum OverrideError {
    /// The file exists but could not be read.
    #[error("IO error reading overrides {path}: {source}")]
    Io {
        /// The override file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON.
    #[error("invalid JSON in overrides {path}: {source}")]
    Json {
        /// The override file path.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The top level is not a JSON object.
    #[error("overrides {path} must contain an object at the top level")]
    NotAnObject {
        /// The override file path.
        path: PathBuf,
    },

    /// One entry has a field of the wrong type.
    #[error("invalid override entry '{target}' in {path}: {source}")]
    Entry {
        /// The override file path.
        path: PathBuf,
        /// The target name of the bad entry.
        target: String,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Loads the override file; a missing file means no overrides.
///
/// Entries whose value is not an object are treated as empty.
///
/// # Errors
///
/// Returns [`OverrideError`] when the file cannot be read or parsed.
pub async fn load_overrides(
    path: &Path,
) -> Result<BTreeMap<String, OverrideEntry>, OverrideError> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no override file");
            return Ok(BTreeMap::new());
        }
        Err(source) => {
            return Err(OverrideError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    parse_overrides(&text, path)
}

/// Parses override file contents; `path` is only used for error context.
///
/// # Errors
///
/// Returns [`OverrideError`] on invalid JSON or a non-object top level.
pub fn parse_overrides(
    text: &str,
    path: &Path,
) -> Result<BTreeMap<String, OverrideEntry>, OverrideError> {
    let raw: Value = serde_json::from_str(text).map_err(|source| OverrideError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let Value::Object(entries) = raw else {
        return Err(OverrideError::NotAnObject {
            path: path.to_path_buf(),
        });
    };

    entries
        .into_iter()
        .map(|(target, value)| {
            let value = if value.is_object() {
                value
            } else {
                Value::Object(serde_json::Map::new())
            };
            serde_json::from_value(value)
                .map(|entry| (target.clone(), entry))
                .map_err(|source| OverrideError::Entry {
                    path: path.to_path_buf(),
                    target,
                    source,
                })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_yields_no_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let overrides = load_overrides(&dir.path().join("metadata.json")).await.unwrap();
        assert!(overrides.is_empty());
    }

    #[tokio::test]
    async fn test_load_overrides_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        tokio::fs::write(&path, r#"{"sky-demo": {"id": "sky"}}"#).await.unwrap();

        let overrides = load_overrides(&path).await.unwrap();

        assert_eq!(overrides["sky-demo"].id.as_deref(), Some("sky"));
    }

    #[test]
    fn test_parse_overrides_reads_known_and_extra_fields() {
        let text = r#"{
            "sky-demo": {"id": "sky", "skip": false, "languages": ["de"], "extra": 3},
            "lure-demo": {"skip": true}
        }"#;
        let overrides = parse_overrides(text, Path::new("metadata.json")).unwrap();

        let sky = &overrides["sky-demo"];
        assert_eq!(sky.id.as_deref(), Some("sky"));
        assert!(!sky.is_skip());
        assert_eq!(sky.languages, Some(vec!["de".to_string()]));
        assert_eq!(sky.extra.get("extra"), Some(&serde_json::json!(3)));

        assert!(overrides["lure-demo"].is_skip());
        assert!(overrides["lure-demo"].id.is_none());
    }

    #[test]
    fn test_parse_overrides_rejects_non_object_top_level() {
        let err = parse_overrides("[1, 2]", Path::new("metadata.json")).unwrap_err();
        assert!(matches!(err, OverrideError::NotAnObject { .. }));
    }

    #[test]
    fn test_parse_overrides_treats_non_object_entry_as_empty() {
        let overrides = parse_overrides(r#"{"odd": 5}"#, Path::new("m.json")).unwrap();
        assert_eq!(overrides["odd"], OverrideEntry::default());
    }

    #[test]
    fn test_parse_overrides_relative_path_key_is_not_an_extension() {
        let overrides =
            parse_overrides(r#"{"a": {"id": "x", "relative_path": "a"}}"#, Path::new("m.json"))
                .unwrap();
        assert!(overrides["a"].extra.is_empty());
    }

    #[test]
    fn test_parse_overrides_reports_bad_entry_type() {
        let err = parse_overrides(r#"{"a": {"languages": "en"}}"#, Path::new("m.json"))
            .unwrap_err();
        match err {
            OverrideError::Entry { target, .. } => assert_eq!(target, "a"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
