//! Remote `index.json` directory documents.
//!
//! One recursive listing of the mirror is turned into an [`IndexTree`]. The
//! root directory's index is rewritten on every run; a subdirectory's index
//! is only written when it does not exist yet.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::remote::{RemoteTransport, TransportError, remote_join, shell_quote};

/// File name of a directory index document.
pub const INDEX_FILE_NAME: &str = "index.json";

/// Local staging file for documents before they are copied up.
const STAGING_FILE_NAME: &str = ".index.json.staging";

/// One entry of an [`IndexTree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexNode {
    /// A subdirectory.
    Directory(IndexTree),
    /// A file and its size in bytes.
    File(u64),
}

/// Directory tree of the mirror, name to node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexTree {
    entries: BTreeMap<String, IndexNode>,
}

impl IndexTree {
    /// Inserts a file at a `/`-separated relative path, creating parents.
    ///
    /// A path that would descend through an existing file is ignored.
    pub fn insert_file(&mut self, path: &str, size: u64) {
        let mut parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let Some(file_name) = parts.pop() else {
            return;
        };
        let mut current = self;
        for part in parts {
            let node = current
                .entries
                .entry(part.to_string())
                .or_insert_with(|| IndexNode::Directory(IndexTree::default()));
            match node {
                IndexNode::Directory(tree) => current = tree,
                IndexNode::File(_) => return,
            }
        }
        current
            .entries
            .insert(file_name.to_string(), IndexNode::File(size));
    }

    /// The index document for this directory: immediate children only,
    /// subdirectories as `{}` and files as their size.
    #[must_use]
    pub fn document(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .map(|(name, node)| {
                let value = match node {
                    IndexNode::Directory(_) => Value::Object(Map::new()),
                    IndexNode::File(size) => Value::from(*size),
                };
                (name.clone(), value)
            })
            .collect();
        Value::Object(map)
    }

    /// Immediate subdirectories.
    pub fn directories(&self) -> impl Iterator<Item = (&str, &IndexTree)> {
        self.entries.iter().filter_map(|(name, node)| match node {
            IndexNode::Directory(tree) => Some((name.as_str(), tree)),
            IndexNode::File(_) => None,
        })
    }

    /// Looks up a direct child.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&IndexNode> {
        self.entries.get(name)
    }

    /// Returns true if the directory has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds the tree from `<size> <path>` lines as printed by `stat -c '%s %n'`.
///
/// Leading `./` is dropped. Paths with a hidden component and existing
/// index documents are excluded; malformed lines are skipped.
#[must_use]
pub fn parse_listing(listing: &str) -> IndexTree {
    let mut tree = IndexTree::default();
    for line in listing.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some((size, path)) = line.split_once(' ') else {
            continue;
        };
        let Ok(size) = size.parse::<u64>() else {
            continue;
        };
        let path = path.strip_prefix("./").unwrap_or(path);
        let hidden = path.split('/').any(|part| part.starts_with('.'));
        let is_index = path.rsplit('/').next() == Some(INDEX_FILE_NAME);
        if hidden || is_index {
            continue;
        }
        tree.insert_file(path, size);
    }
    tree
}

/// Shell command listing every file under `base` with its size.
#[must_use]
pub fn listing_command(base: &str) -> String {
    format!(
        "cd {} && find . -type f -exec stat -c '%s %n' {{}} \\; 2>/dev/null",
        shell_quote(base)
    )
}

/// Counters for one materialization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Documents written.
    pub written: usize,
    /// Subdirectory documents left untouched because they exist.
    pub kept: usize,
    /// Directories whose document could not be written.
    pub failed: usize,
}

/// Writes directory index documents to the mirror.
pub struct IndexMaterializer<'a, T: RemoteTransport + ?Sized> {
    transport: &'a T,
    remote_base: String,
    staging_dir: PathBuf,
}

impl<'a, T: RemoteTransport + ?Sized> IndexMaterializer<'a, T> {
    /// Creates a materializer; documents are staged in `staging_dir`.
    pub fn new(
        transport: &'a T,
        remote_base: impl Into<String>,
        staging_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            transport,
            remote_base: remote_base.into(),
            staging_dir: staging_dir.into(),
        }
    }

    /// Lists the mirror and builds its [`IndexTree`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the listing command fails.
    pub async fn fetch_tree(&self) -> Result<IndexTree, TransportError> {
        let command = listing_command(&self.remote_base);
        let output = self.transport.run(&command).await?;
        if !output.success() {
            return Err(TransportError::from_status(
                "index listing",
                output.status,
                &output.stderr,
            ));
        }
        Ok(parse_listing(&output.stdout))
    }

    /// Lists the mirror and writes every due index document.
    ///
    /// A failure on one directory is logged and the walk goes on;
    /// connectivity failures stop it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the listing fails or the mirror
    /// becomes unreachable.
    pub async fn materialize(&self) -> Result<IndexStats, TransportError> {
        let tree = self.fetch_tree().await?;
        tokio::fs::create_dir_all(&self.staging_dir)
            .await
            .map_err(|e| TransportError::io(self.staging_dir.display().to_string(), e))?;

        let mut stats = IndexStats::default();
        let mut pending: Vec<(String, &IndexTree)> = vec![(String::new(), &tree)];

        while let Some((relative, directory)) = pending.pop() {
            let remote_dir = if relative.is_empty() {
                self.remote_base.clone()
            } else {
                remote_join(&self.remote_base, &relative)
            };
            let index_path = remote_join(&remote_dir, INDEX_FILE_NAME);

            match self.write_if_due(&relative, &index_path, directory).await {
                Ok(true) => stats.written += 1,
                Ok(false) => stats.kept += 1,
                Err(e) if e.is_connectivity() => return Err(e),
                Err(e) => {
                    warn!(directory = %display_dir(&relative), error = %e, "could not write index");
                    stats.failed += 1;
                }
            }

            for (name, child) in directory.directories() {
                let child_path = if relative.is_empty() {
                    name.to_string()
                } else {
                    format!("{relative}/{name}")
                };
                pending.push((child_path, child));
            }
        }

        info!(
            written = stats.written,
            kept = stats.kept,
            failed = stats.failed,
            "index documents refreshed"
        );
        Ok(stats)
    }

    async fn write_if_due(
        &self,
        relative: &str,
        index_path: &str,
        directory: &IndexTree,
    ) -> Result<bool, TransportError> {
        if !relative.is_empty() && self.transport.file_exists(index_path).await? {
            debug!(directory = %relative, "index exists, keeping");
            return Ok(false);
        }

        let staging = self.staging_dir.join(STAGING_FILE_NAME);
        let body = serde_json::to_string_pretty(&directory.document())
            .map_err(|e| TransportError::io(staging.display().to_string(), e.into()))?;
        tokio::fs::write(&staging, body)
            .await
            .map_err(|e| TransportError::io(staging.display().to_string(), e))?;

        let copied = self.transport.copy(&staging, index_path, false).await;
        let _ = tokio::fs::remove_file(&staging).await;
        copied?;
        debug!(directory = %display_dir(relative), "index written");
        Ok(true)
    }
}

fn display_dir(relative: &str) -> &str {
    if relative.is_empty() { "<root>" } else { relative }
}
