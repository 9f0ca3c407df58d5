//! Phase orchestration for one sync run.

use tracing::{info, warn};

use crate::archive::ArchivePipeline;
use crate::catalog::{CatalogBuilder, load_overrides};
use crate::context::RunContext;
use crate::error::SyncError;
use crate::export::export_catalog;
use crate::index::{IndexMaterializer, IndexStats};
use crate::reconcile::{Reconciler, RemoteSnapshot, RunReport};
use crate::remote::RemoteTransport;
use crate::sheet::SheetSource;

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records in the merged catalog.
    pub catalog_size: usize,
    /// Items reconciled this run.
    pub work_items: usize,
    /// Reconciliation details.
    pub report: RunReport,
    /// Entries written to the exported catalog, `None` if not rewritten.
    pub exported: Option<usize>,
    /// Index pass counters, `None` if the pass failed.
    pub index: Option<IndexStats>,
}

/// Runs every phase in order against the mirror.
///
/// 1. load overrides and build the catalog
/// 2. resolve the work list
/// 3. check the remote base path and snapshot its child directories
/// 4. reconcile
/// 5. export the processed items
/// 6. refresh index documents
///
/// Index failures are logged and do not fail the run.
///
/// # Errors
///
/// Returns the first fatal [`SyncError`]; later phases do not run.
pub async fn run_sync<S, T>(
    ctx: &mut RunContext,
    sheets: &S,
    transport: &T,
    pipeline: &ArchivePipeline,
) -> Result<RunSummary, SyncError>
where
    S: SheetSource + ?Sized,
    T: RemoteTransport + ?Sized,
{
    let overrides = load_overrides(&ctx.settings.overrides_path).await?;
    info!(entries = overrides.len(), path = %ctx.settings.overrides_path.display(), "overrides loaded");

    ctx.catalog = CatalogBuilder::new(sheets).build(&overrides).await?;
    let work_list = ctx.catalog.work_list(&ctx.settings.items)?;
    info!(items = work_list.len(), catalog = ctx.catalog.len(), "work list resolved");

    let base = ctx.settings.remote.path.clone();
    if !transport.exists(&base).await? {
        return Err(SyncError::config(format!(
            "mirror path '{base}' does not exist on {}",
            ctx.settings.remote.server
        )));
    }
    ctx.snapshot = RemoteSnapshot::new(transport.list_child_directories(&base).await?);
    info!(directories = ctx.snapshot.len(), "mirror listed");

    tokio::fs::create_dir_all(&ctx.settings.download_dir)
        .await
        .map_err(|e| SyncError::io(ctx.settings.download_dir.display().to_string(), e))?;

    let reconciler = Reconciler::new(transport, pipeline, base.as_str(), ctx.settings.max_transfers);
    let report = reconciler
        .run(&ctx.catalog, &work_list, &mut ctx.snapshot)
        .await?;
    ctx.processed = report.processed().map(str::to_string).collect();

    let exported = export_catalog(
        &ctx.catalog,
        ctx.processed.iter().map(String::as_str),
        &ctx.settings.output_path,
    )
    .await?;

    let materializer = IndexMaterializer::new(transport, base.as_str(), &ctx.settings.download_dir);
    let index = match materializer.materialize().await {
        Ok(stats) => Some(stats),
        Err(e) => {
            warn!(error = %e, "index refresh failed");
            None
        }
    };

    Ok(RunSummary {
        catalog_size: ctx.catalog.len(),
        work_items: work_list.len(),
        report,
        exported,
        index,
    })
}
