//! Published spreadsheet access.
//!
//! The catalog inventory lives in a spreadsheet published as TSV. Each tab is
//! addressed by its `gid`; [`SheetClient`] fetches a tab, follows the single
//! redirect the publishing endpoint answers with, and [`parse_tsv`] turns the
//! body into [`Row`]s keyed by the header line.

mod client;
mod error;
mod tsv;

pub use client::SheetClient;
pub use error::FetchError;
pub use tsv::{Row, parse_tsv};

use std::fmt;

use async_trait::async_trait;

/// Default TSV publishing URL of the catalog spreadsheet.
pub const DEFAULT_SHEET_URL: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-1vQamumX0p-DYQa5Umi3RxX-pHM6RZhAj1qvUP0jTmaqutN9FwzyriRSXlO9rq6kR60pGIuPvCDzZL3s/pub?output=tsv";

/// The spreadsheet tabs the catalog is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SheetId {
    /// Ids of games the engine supports.
    Compatibility,
    /// Platform id to display name.
    Platforms,
    /// Game id to game details.
    Games,
    /// Full game downloads hosted under `/frs/extras`.
    GameDownloads,
    /// Game demos.
    GameDemos,
    /// Director engine demos.
    DirectorDemos,
}

impl SheetId {
    /// The `gid` of this tab in the published spreadsheet.
    #[must_use]
    pub const fn gid(self) -> &'static str {
        match self {
            Self::Compatibility => "1989596967",
            Self::Platforms => "1061029686",
            Self::Games => "1775285192",
            Self::GameDownloads => "810295288",
            Self::GameDemos => "1303420306",
            Self::DirectorDemos => "1256563740",
        }
    }
}

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Compatibility => "compatibility",
            Self::Platforms => "platforms",
            Self::Games => "games",
            Self::GameDownloads => "game_downloads",
            Self::GameDemos => "game_demos",
            Self::DirectorDemos => "director_demos",
        };
        f.write_str(name)
    }
}

/// Source of parsed sheet rows.
///
/// [`SheetClient`] is the production implementation; the catalog builder only
/// depends on this trait.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Fetches and parses one tab.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the tab cannot be retrieved. An empty body
    /// yields an empty row list, not an error.
    async fn fetch(&self, sheet: SheetId) -> Result<Vec<Row>, FetchError>;
}
