//! Archive pipeline: atomic download, extraction and local cleanup.
//!
//! Everything an item leaves on local disk lives under the download
//! directory, named after its target:
//! - `<file>.downloading` while a download is in flight
//! - `<file>` once downloaded
//! - `<target>/` once extracted

pub mod constants;
mod client;
mod error;
mod extract;

pub use client::{HttpClient, temp_download_path};
pub use error::{ArchiveError, DownloadError};
pub use extract::{Layout, destination_for, extract_archive, plan_layout};

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::catalog::UPSTREAM_BASE;

/// Downloads, extracts and cleans up local copies of catalog items.
#[derive(Debug, Clone)]
pub struct ArchivePipeline {
    client: HttpClient,
    download_dir: PathBuf,
    upstream_base: Option<String>,
}

impl ArchivePipeline {
    /// Creates a pipeline storing files under `download_dir`.
    pub fn new(client: HttpClient, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            download_dir: download_dir.into(),
            upstream_base: None,
        }
    }

    /// Fetches first-party downloads from `base` instead of the upstream
    /// server, e.g. a local copy of its `/frs` tree.
    #[must_use]
    pub fn with_upstream_base(mut self, base: impl Into<String>) -> Self {
        self.upstream_base = Some(base.into().trim_end_matches('/').to_string());
        self
    }

    /// The URL actually fetched for `url`.
    #[must_use]
    pub fn resolve_url(&self, url: &str) -> String {
        match (&self.upstream_base, url.strip_prefix(UPSTREAM_BASE)) {
            (Some(base), Some(path)) => format!("{base}{path}"),
            _ => url.to_string(),
        }
    }

    /// The local working directory.
    #[must_use]
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Local path of a downloaded file or extracted folder.
    #[must_use]
    pub fn local_path(&self, name: &str) -> PathBuf {
        self.download_dir.join(name)
    }

    /// Downloads `url` as `file_name`.
    ///
    /// Failures are logged and reported as `None`; the item is abandoned for
    /// this run and no partial file is left behind.
    pub async fn download(&self, url: &str, file_name: &str) -> Option<PathBuf> {
        let url = self.resolve_url(url);
        match self
            .client
            .download_atomic(&url, &self.download_dir, file_name)
            .await
        {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(url = %url, error = %e, "download failed");
                None
            }
        }
    }

    /// Extracts an archive on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] from extraction, or
    /// [`ArchiveError::Task`] if the blocking task fails.
    pub async fn extract(&self, archive_path: &Path) -> Result<PathBuf, ArchiveError> {
        let path = archive_path.to_path_buf();
        tokio::task::spawn_blocking(move || extract_archive(&path))
            .await
            .map_err(|e| ArchiveError::Task {
                path: archive_path.to_path_buf(),
                message: e.to_string(),
            })?
    }

    /// Removes a stale in-progress download for `file_name`.
    pub async fn remove_stale_download(&self, file_name: &str) {
        remove_path(&temp_download_path(&self.download_dir, file_name)).await;
    }

    /// Removes every local artifact of an item: the extracted folder or
    /// file, the archive and any in-progress download.
    pub async fn clean_local(&self, target: &str, file_name: Option<&str>) {
        remove_path(&self.local_path(target)).await;
        if let Some(file_name) = file_name {
            remove_path(&self.local_path(file_name)).await;
            remove_path(&temp_download_path(&self.download_dir, file_name)).await;
        }
    }
}

/// Removes a file or directory tree; a missing path is fine, other
/// failures are logged.
async fn remove_path(path: &Path) {
    let result = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => debug!(path = %path.display(), "removed local artifact"),
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove local artifact"),
    }
}
