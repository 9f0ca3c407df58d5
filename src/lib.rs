//! Games Sync Core Library
//!
//! This library keeps a mirror of downloadable game archives in step with a
//! spreadsheet-driven catalog published by the upstream distribution server.
//!
//! # Architecture
//!
//! The library is organized into the following modules, leaves first:
//! - [`sheet`] - Published spreadsheet fetching and TSV parsing
//! - [`catalog`] - Merging spreadsheet rows and local overrides into one catalog
//! - [`remote`] - Persistent SSH session and remote shell/copy primitives
//! - [`archive`] - Atomic downloads and zip extraction with folder unwrapping
//! - [`reconcile`] - Per-item transfer decisions, transfer budget, orphan detection
//! - [`index`] - Remote `index.json` directory documents
//! - [`export`] - The sorted `games.json` catalog document
//!
//! [`runner::run_sync`] drives the phases in order over a single [`RunContext`].

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod catalog;
pub mod config;
pub mod context;
pub mod error;
pub mod export;
pub mod index;
pub mod reconcile;
pub mod remote;
pub mod runner;
pub mod sheet;
mod user_agent;

// Re-export commonly used types
pub use archive::{ArchiveError, ArchivePipeline, DownloadError, HttpClient, extract_archive};
pub use catalog::{
    Catalog, CatalogBuilder, GameRecord, OverrideEntry, Origin, RecordSeed, SourceKind,
};
pub use config::{RemoteTarget, SshAuth, SyncSettings};
pub use context::RunContext;
pub use error::SyncError;
pub use export::{ExportEntry, export_catalog, read_export};
pub use index::{IndexMaterializer, IndexTree};
pub use reconcile::{Reconciler, RemoteSnapshot, RunReport, TransferDecision, decide};
pub use remote::{RemoteTransport, SshSession, SshTransport, TransportError, TransportTimeouts};
pub use runner::{RunSummary, run_sync};
pub use sheet::{FetchError, Row, SheetClient, SheetId, SheetSource, parse_tsv};
