//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use games_sync_core::config::{
    DEFAULT_DOWNLOAD_DIR, DEFAULT_OUTPUT_PATH, DEFAULT_OVERRIDES_PATH, SettingsInput,
};

/// Synchronize the game archive catalog to the mirror.
///
/// Builds the catalog from the published spreadsheet and local overrides,
/// transfers missing items to the mirror over SSH, writes the processed
/// catalog and refreshes the mirror's index documents.
#[derive(Parser, Debug)]
#[command(name = "sync-games")]
#[command(author, version, about)]
pub struct Args {
    /// Items to sync (id, short id, id/file or download URL); all when empty
    pub items: Vec<String>,

    /// Local working directory for downloads and extraction
    #[arg(long, default_value = DEFAULT_DOWNLOAD_DIR)]
    pub download_dir: PathBuf,

    /// Mirror server as user@host (falls back to SSH_USER and SSH_HOST)
    #[arg(long)]
    pub scp_server: Option<String>,

    /// Base path on the mirror (falls back to SSH_PATH)
    #[arg(long)]
    pub scp_path: Option<String>,

    /// SSH port of the mirror (falls back to SSH_PORT)
    #[arg(long)]
    pub scp_port: Option<u16>,

    /// Maximum number of transfers this run
    #[arg(long)]
    pub max_transfers: Option<usize>,

    /// JSON file of per-item overrides
    #[arg(long, default_value = DEFAULT_OVERRIDES_PATH)]
    pub overrides: PathBuf,

    /// Where to write the exported catalog
    #[arg(long, default_value = DEFAULT_OUTPUT_PATH)]
    pub output: PathBuf,

    /// Published spreadsheet TSV URL
    #[arg(long)]
    pub sheet_url: Option<String>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Settings input for [`games_sync_core::SyncSettings::resolve`].
    pub fn settings_input(&self) -> SettingsInput {
        SettingsInput {
            items: self.items.clone(),
            download_dir: Some(self.download_dir.clone()),
            scp_server: self.scp_server.clone(),
            scp_path: self.scp_path.clone(),
            scp_port: self.scp_port,
            max_transfers: self.max_transfers,
            overrides: Some(self.overrides.clone()),
            output: Some(self.output.clone()),
            sheet_url: self.sheet_url.clone(),
        }
    }

    /// Default log level: quiet wins over verbose.
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}
