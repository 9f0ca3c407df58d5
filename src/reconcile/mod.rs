//! Reconciliation engine.
//!
//! Walks the work list in order, decides each item against the remote
//! snapshot, and drives the archive pipeline and the remote transport for
//! items that must be transferred. Uploads land under a `.uploading` name
//! and are renamed into place, so the mirror never shows a partial item
//! under its final name.

mod decision;

pub use decision::{RemoteSnapshot, TransferDecision, decide};

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::archive::ArchivePipeline;
use crate::archive::constants::UPLOADING_SUFFIX;
use crate::catalog::{Catalog, GameRecord, is_safe_target_name};
use crate::error::SyncError;
use crate::remote::{RemoteTransport, TransportError, remote_join};

/// What happened to one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    /// Target name of the item.
    pub target: String,
    /// The decision taken.
    pub decision: TransferDecision,
    /// Whether the item ends up in the exported catalog.
    pub processed: bool,
}

/// Summary of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// One outcome per work-list item, in order.
    pub outcomes: Vec<ItemOutcome>,
    /// Transfer attempts started (each consumes budget).
    pub transfers_attempted: usize,
    /// Items uploaded successfully.
    pub uploaded: usize,
    /// Items whose transfer failed and was abandoned for this run.
    pub abandoned: Vec<String>,
    /// Items left untransferred because the budget ran out.
    pub deferred: Vec<String>,
}

impl RunReport {
    /// Target names to export, in work-list order.
    pub fn processed(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.processed)
            .map(|o| o.target.as_str())
    }

    fn record(&mut self, target: &str, decision: TransferDecision, processed: bool) {
        self.outcomes.push(ItemOutcome {
            target: target.to_string(),
            decision,
            processed,
        });
    }
}

/// Drives per-item decisions and transfers for one run.
pub struct Reconciler<'a, T: RemoteTransport + ?Sized> {
    transport: &'a T,
    pipeline: &'a ArchivePipeline,
    remote_base: String,
    max_transfers: Option<usize>,
}

impl<'a, T: RemoteTransport + ?Sized> Reconciler<'a, T> {
    /// Creates a reconciler uploading under `remote_base`.
    ///
    /// `max_transfers` caps transfer attempts; `None` is unlimited.
    pub fn new(
        transport: &'a T,
        pipeline: &'a ArchivePipeline,
        remote_base: impl Into<String>,
        max_transfers: Option<usize>,
    ) -> Self {
        Self {
            transport,
            pipeline,
            remote_base: remote_base.into(),
            max_transfers,
        }
    }

    /// Reconciles every item of `work_list` against `snapshot`.
    ///
    /// Items are handled strictly in order. Once all are decided, every
    /// catalog target claims its snapshot entry and the remaining names are
    /// orphans.
    ///
    /// # Errors
    ///
    /// - [`SyncError::MissingSource`] for the first item that is neither on
    ///   the mirror nor downloadable
    /// - [`SyncError::Transport`] for connectivity failures or timeouts
    /// - [`SyncError::Orphans`] with every orphan name
    pub async fn run(
        &self,
        catalog: &Catalog,
        work_list: &[String],
        snapshot: &mut RemoteSnapshot,
    ) -> Result<RunReport, SyncError> {
        let mut report = RunReport::default();

        for target in work_list {
            let Some(record) = catalog.get(target) else {
                warn!(target = %target, "work list item not in catalog");
                continue;
            };
            self.reconcile_item(record, snapshot, &mut report).await?;
        }

        for record in catalog.iter() {
            snapshot.take(record.target_name());
        }
        let orphans = std::mem::take(snapshot).into_orphans();
        for name in &orphans {
            report.record(name, TransferDecision::OrphanOnRemote, false);
        }

        info!(
            items = work_list.len(),
            processed = report.processed().count(),
            transfers = report.transfers_attempted,
            uploaded = report.uploaded,
            abandoned = report.abandoned.len(),
            deferred = report.deferred.len(),
            orphans = orphans.len(),
            "reconciliation finished"
        );

        if orphans.is_empty() {
            Ok(report)
        } else {
            for name in &orphans {
                warn!(name = %name, "orphan on mirror");
            }
            Err(SyncError::Orphans { names: orphans })
        }
    }

    async fn reconcile_item(
        &self,
        record: &GameRecord,
        snapshot: &mut RemoteSnapshot,
        report: &mut RunReport,
    ) -> Result<(), SyncError> {
        let target = record.target_name();
        if !is_safe_target_name(target) {
            warn!(target = %target, "target is not a plain folder name, not touched");
            report.abandoned.push(target.to_string());
            report.record(target, TransferDecision::Skipped, false);
            return Ok(());
        }
        let file_name = record.file_name();
        if let Some(name) = &file_name {
            self.pipeline.remove_stale_download(name).await;
        }

        let exists = snapshot.take(target) || self.single_file_on_remote(record).await?;
        let decision = decide(record.source_url().is_some(), exists, record.skip);
        debug!(target = %target, decision = %decision, origin = %record.origin, "item decided");

        match decision {
            TransferDecision::AlreadyRemote => {
                if record.skip {
                    info!(target = %target, "marked skip but on mirror, exporting");
                }
                self.pipeline.clean_local(target, file_name.as_deref()).await;
                report.record(target, decision, true);
            }
            TransferDecision::Skipped => {
                info!(target = %target, "skipped");
                report.record(target, decision, false);
            }
            TransferDecision::MissingSource => {
                return Err(SyncError::MissingSource {
                    target: target.to_string(),
                    id: record.id.clone(),
                });
            }
            TransferDecision::UploadNeeded => {
                let processed = self.transfer(record, file_name.as_deref(), report).await?;
                report.record(target, decision, processed);
            }
            TransferDecision::OrphanOnRemote => {}
        }
        Ok(())
    }

    /// Non-archive items are uploaded as plain files, which the directory
    /// snapshot does not list; probe for them directly.
    async fn single_file_on_remote(&self, record: &GameRecord) -> Result<bool, SyncError> {
        if record.is_archive() || record.file_name().is_none() {
            return Ok(false);
        }
        let path = remote_join(&self.remote_base, record.target_name());
        match self.transport.file_exists(&path).await {
            Ok(found) => Ok(found),
            Err(e) if e.is_connectivity() => Err(e.into()),
            Err(e) => {
                warn!(target = %record.target_name(), error = %e, "existence probe failed, treating as absent");
                Ok(false)
            }
        }
    }

    fn budget_left(&self, report: &RunReport) -> bool {
        self.max_transfers
            .is_none_or(|max| report.transfers_attempted < max)
    }

    /// Returns whether the item was uploaded.
    async fn transfer(
        &self,
        record: &GameRecord,
        file_name: Option<&str>,
        report: &mut RunReport,
    ) -> Result<bool, SyncError> {
        let target = record.target_name();
        if !self.budget_left(report) {
            info!(target = %target, "transfer budget reached, deferring");
            self.pipeline.clean_local(target, file_name).await;
            report.deferred.push(target.to_string());
            return Ok(false);
        }
        report.transfers_attempted += 1;

        let Some(local) = self.prepare_local(record, file_name).await else {
            report.abandoned.push(target.to_string());
            return Ok(false);
        };

        match self.upload(&local, target).await {
            Ok(()) => {
                info!(target = %target, "uploaded");
                report.uploaded += 1;
                self.pipeline.clean_local(target, file_name).await;
                Ok(true)
            }
            Err(e) if e.is_connectivity() => Err(e.into()),
            Err(e) => {
                warn!(target = %target, error = %e, "upload failed, keeping local copy");
                report.abandoned.push(target.to_string());
                Ok(false)
            }
        }
    }

    /// Produces the local folder or file to upload, reusing earlier work.
    async fn prepare_local(&self, record: &GameRecord, file_name: Option<&str>) -> Option<PathBuf> {
        let target = record.target_name();
        let url = record.source_url()?;
        let file_name = file_name?;

        if record.is_archive() {
            let folder = self.pipeline.local_path(target);
            if folder.is_dir() {
                debug!(target = %target, "reusing extracted folder");
                return Some(folder);
            }
            let archive = self.pipeline.local_path(file_name);
            let archive = if archive.is_file() {
                archive
            } else {
                self.pipeline.download(url, file_name).await?
            };
            match self.pipeline.extract(&archive).await {
                Ok(folder) => Some(folder),
                Err(e) => {
                    warn!(target = %target, error = %e, "extraction failed");
                    self.pipeline.clean_local(target, Some(file_name)).await;
                    None
                }
            }
        } else {
            let file = self.pipeline.local_path(file_name);
            if file.is_file() {
                Some(file)
            } else {
                self.pipeline.download(url, file_name).await
            }
        }
    }

    /// Copies `local` to `<name>.uploading` and renames it into place.
    ///
    /// A leftover temp path is removed first; on failure the temp path is
    /// removed again so nothing partial remains.
    async fn upload(&self, local: &Path, name: &str) -> Result<(), TransportError> {
        let final_path = remote_join(&self.remote_base, name);
        let temp_path = format!("{final_path}{UPLOADING_SUFFIX}");

        if let Err(e) = self.transport.remove_tree(&temp_path).await {
            if e.is_connectivity() {
                return Err(e);
            }
            debug!(path = %temp_path, error = %e, "stale upload cleanup failed");
        }

        let recursive = local.is_dir();
        let result = match self.transport.copy(local, &temp_path, recursive).await {
            Ok(()) => self.transport.rename(&temp_path, &final_path).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            if let Err(cleanup) = self.transport.remove_tree(&temp_path).await {
                warn!(path = %temp_path, error = %cleanup, "could not remove failed upload");
            }
            return Err(e);
        }
        Ok(())
    }
}
