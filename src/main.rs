//! CLI entry point for the mirror sync tool.

use anyhow::{Context, Result};
use clap::Parser;
use games_sync_core::{
    ArchivePipeline, HttpClient, RunContext, SheetClient, SshTransport, SyncError, SyncSettings,
    run_sync,
};
use tracing::{debug, error, info};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(args.default_log_level()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    if let Err(e) = run(&args).await {
        error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(args: &Args) -> Result<()> {
    let settings = SyncSettings::resolve(args.settings_input(), |key| std::env::var(key).ok())?;
    info!(
        server = %settings.remote.server,
        path = %settings.remote.path,
        items = settings.items.len(),
        "sync starting"
    );

    let sheets = SheetClient::new(settings.sheet_url.clone()).context("creating sheet client")?;
    let pipeline = ArchivePipeline::new(
        HttpClient::new().context("creating download client")?,
        settings.download_dir.clone(),
    );
    let transport = SshTransport::new(settings.remote.clone(), settings.timeouts);
    let session = transport.open_session(&settings.auth).await?;

    let mut ctx = RunContext::new(settings);
    let result = tokio::select! {
        result = run_sync(&mut ctx, &sheets, &transport, &pipeline) => result,
        _ = tokio::signal::ctrl_c() => Err(SyncError::Interrupted),
    };
    session.close().await;

    let summary = result?;
    info!(
        catalog = summary.catalog_size,
        items = summary.work_items,
        uploaded = summary.report.uploaded,
        abandoned = summary.report.abandoned.len(),
        deferred = summary.report.deferred.len(),
        exported = ?summary.exported,
        "sync complete"
    );
    Ok(())
}
