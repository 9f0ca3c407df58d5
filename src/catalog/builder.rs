//! Catalog construction from spreadsheet tabs and the override file.
//!
//! Tabs are fetched sequentially in a fixed order: the compatibility list and
//! the platform and game lookups first, then the three download lists that
//! create records, then the override file.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, info, warn};

use super::overrides::OverrideEntry;
use super::record::{RecordSeed, is_safe_target_name, target_name_from_url};
use super::Catalog;
use crate::sheet::{FetchError, Row, SheetId, SheetSource};

/// Columns probed, in order, for a row's id.
const ID_COLUMNS: &[&str] = &["id", "game_id", "gameid"];

/// Columns probed, in order, for language codes.
const LANGUAGE_COLUMNS: &[&str] = &["lang", "language", "language1", "language2", "language3"];

/// Description prefix on engine-specific game download names.
const ENGINE_PREFIX: &str = "SLUDGE engine game.";

/// Description used when stripping the engine prefix leaves nothing.
const FREEWARE_DESCRIPTION: &str = "Freeware";

/// Category a game download row must carry.
const GAMES_CATEGORY: &str = "games";

/// Upstream path prefix of full game downloads.
const EXTRAS_PATH: &str = "/frs/extras/";

/// Counters reported after each load step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Rows that created or touched a record.
    pub added: usize,
    /// Rows dropped because their id is not in the compatibility list.
    pub incompatible: usize,
    /// Rows dropped by a source-specific exclusion rule.
    pub excluded: usize,
}

/// Lookup tables loaded before any record is built.
#[derive(Debug, Clone, Default)]
pub struct Lookups {
    compatible: HashSet<String>,
    platforms: HashMap<String, String>,
    games: HashMap<String, Row>,
}

impl Lookups {
    /// Builds the lookups from the compatibility, platform and game tabs.
    #[must_use]
    pub fn from_rows(compatibility: &[Row], platforms: &[Row], games: &[Row]) -> Self {
        let compatible = compatibility
            .iter()
            .filter_map(|row| row.first_of(ID_COLUMNS))
            .map(str::to_string)
            .collect();

        let platforms = platforms
            .iter()
            .filter_map(|row| {
                let id = row.field("id");
                (!id.is_empty()).then(|| (id.to_string(), row.field("name").to_string()))
            })
            .collect();

        let games = games
            .iter()
            .filter_map(|row| {
                let id = row.field("id");
                (!id.is_empty()).then(|| (id.to_string(), row.clone()))
            })
            .collect();

        Self {
            compatible,
            platforms,
            games,
        }
    }

    /// Whether `id` is in the compatibility list.
    #[must_use]
    pub fn is_compatible(&self, id: &str) -> bool {
        self.compatible.contains(id)
    }

    /// Display name of a platform, falling back to the raw id.
    #[must_use]
    pub fn platform_name(&self, platform_id: &str) -> String {
        self.platforms
            .get(platform_id)
            .filter(|name| !name.is_empty())
            .map_or_else(|| platform_id.to_string(), Clone::clone)
    }

    /// Name of a game from the games tab, if known.
    #[must_use]
    pub fn game_name(&self, id: &str) -> Option<&str> {
        self.games
            .get(id)
            .map(|row| row.field("name"))
            .filter(|name| !name.is_empty())
    }

    /// Number of compatible ids.
    #[must_use]
    pub fn compatible_count(&self) -> usize {
        self.compatible.len()
    }
}

/// Collects language codes from the candidate columns, first-seen order,
/// without duplicates. Blank columns contribute nothing.
#[must_use]
pub fn extract_languages(row: &Row) -> Vec<String> {
    let mut languages: Vec<String> = Vec::new();
    for column in LANGUAGE_COLUMNS {
        let value = row.field(column);
        if !value.is_empty() && !languages.iter().any(|l| l == value) {
            languages.push(value.to_string());
        }
    }
    languages
}

fn game_download_description(name: &str) -> String {
    match name.strip_prefix(ENGINE_PREFIX) {
        Some(rest) if rest.trim().is_empty() => FREEWARE_DESCRIPTION.to_string(),
        Some(rest) => rest.trim().to_string(),
        None => name.to_string(),
    }
}

fn demo_description(platform: &str, label: &str) -> String {
    format!("{platform} {label} Demo").trim().to_string()
}

/// Fields common to every download row, after the compatibility check.
struct DownloadRow<'r> {
    id: &'r str,
    url: String,
    platform: String,
}

fn compatible_download<'r>(
    row: &'r Row,
    lookups: &Lookups,
    stats: &mut LoadStats,
) -> Option<DownloadRow<'r>> {
    let Some(id) = row.first_of(ID_COLUMNS) else {
        stats.excluded += 1;
        return None;
    };
    if !lookups.is_compatible(id) {
        stats.incompatible += 1;
        return None;
    }
    let url = row.field("url");
    if url.is_empty() {
        stats.excluded += 1;
        return None;
    }
    Some(DownloadRow {
        id,
        url: url.to_string(),
        platform: lookups.platform_name(row.field("platform")),
    })
}

fn add_row(catalog: &mut Catalog, row: &Row, download: DownloadRow<'_>, description: String) -> bool {
    let Some(target) = target_name_from_url(&download.url) else {
        return false;
    };
    let seed = RecordSeed {
        id: download.id.to_string(),
        description: Some(description),
        download_url: Some(download.url),
        languages: extract_languages(row),
        platform: Some(download.platform),
    };
    catalog.add_or_update(&target, seed, None);
    true
}

/// Adds full game downloads.
///
/// Rows naming an addon or manuals, or outside the `games` category, are
/// excluded. The url column is relative to the upstream extras tree.
pub fn add_game_downloads(catalog: &mut Catalog, lookups: &Lookups, rows: &[Row]) -> LoadStats {
    let mut stats = LoadStats::default();
    for row in rows {
        let name = row.field("name");
        let lowered = name.to_lowercase();
        if lowered.contains("addon")
            || lowered.contains("manuals")
            || row.field("category") != GAMES_CATEGORY
        {
            stats.excluded += 1;
            continue;
        }
        let Some(mut download) = compatible_download(row, lookups, &mut stats) else {
            continue;
        };
        download.url = format!("{EXTRAS_PATH}{}", download.url.trim_start_matches('/'));
        if add_row(catalog, row, download, game_download_description(name)) {
            stats.added += 1;
        } else {
            stats.excluded += 1;
        }
    }
    info!(
        added = stats.added,
        incompatible = stats.incompatible,
        excluded = stats.excluded,
        "game downloads loaded"
    );
    stats
}

/// Adds game demos, described as `<platform> <category> Demo`.
pub fn add_demos(catalog: &mut Catalog, lookups: &Lookups, rows: &[Row]) -> LoadStats {
    add_labelled_demos(catalog, lookups, rows, "category", "game demos loaded")
}

/// Adds director demos, described as `<platform> <title> Demo`.
pub fn add_director_demos(catalog: &mut Catalog, lookups: &Lookups, rows: &[Row]) -> LoadStats {
    add_labelled_demos(catalog, lookups, rows, "title", "director demos loaded")
}

fn add_labelled_demos(
    catalog: &mut Catalog,
    lookups: &Lookups,
    rows: &[Row],
    label_column: &str,
    message: &'static str,
) -> LoadStats {
    let mut stats = LoadStats::default();
    for row in rows {
        let Some(download) = compatible_download(row, lookups, &mut stats) else {
            continue;
        };
        // A blank label takes the game's name instead of leaving
        // "<platform>  Demo" with an empty middle.
        let label = match row.field(label_column) {
            "" => lookups.game_name(download.id).unwrap_or_default(),
            label => label,
        };
        let description = demo_description(&download.platform, label);
        if add_row(catalog, row, download, description) {
            stats.added += 1;
        } else {
            stats.excluded += 1;
        }
    }
    info!(
        added = stats.added,
        incompatible = stats.incompatible,
        excluded = stats.excluded,
        "{message}"
    );
    stats
}

/// Merges override entries into the catalog.
///
/// `skip: true` entries only mark an existing record skipped. Entries without
/// an `id` are ignored. Everything else goes through
/// [`Catalog::add_or_update`].
pub fn apply_overrides(catalog: &mut Catalog, overrides: &BTreeMap<String, OverrideEntry>) -> LoadStats {
    let mut stats = LoadStats::default();
    for (target, entry) in overrides {
        if !is_safe_target_name(target) {
            warn!(target = %target, "override key is not a plain folder name, ignored");
            stats.excluded += 1;
            continue;
        }
        if entry.is_skip() {
            if catalog.mark_skip(target) {
                debug!(target = %target, "override marks item skipped");
            }
            stats.excluded += 1;
            continue;
        }
        let Some(id) = entry.id.as_deref().filter(|id| !id.is_empty()) else {
            debug!(target = %target, "override without id ignored");
            stats.excluded += 1;
            continue;
        };
        let record = catalog.add_or_update(target, RecordSeed::new(id), Some(entry));
        debug!(target = %target, origin = %record.origin, "override applied");
        stats.added += 1;
    }
    info!(
        applied = stats.added,
        ignored = stats.excluded,
        "overrides applied"
    );
    stats
}

/// Builds a [`Catalog`] from a [`SheetSource`] and loaded overrides.
pub struct CatalogBuilder<'a, S: SheetSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: SheetSource + ?Sized> CatalogBuilder<'a, S> {
    /// Creates a builder reading tabs from `source`.
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Fetches the lookup tabs.
    ///
    /// # Errors
    ///
    /// Returns the first [`FetchError`]; nothing is retried.
    pub async fn load_lookups(&self) -> Result<Lookups, FetchError> {
        let compatibility = self.source.fetch(SheetId::Compatibility).await?;
        let platforms = self.source.fetch(SheetId::Platforms).await?;
        let games = self.source.fetch(SheetId::Games).await?;
        let lookups = Lookups::from_rows(&compatibility, &platforms, &games);
        info!(
            compatible = lookups.compatible_count(),
            platforms = lookups.platforms.len(),
            games = lookups.games.len(),
            "lookups loaded"
        );
        Ok(lookups)
    }

    /// Runs every load step in order and returns the merged catalog.
    ///
    /// # Errors
    ///
    /// Returns the first [`FetchError`]; a failed tab aborts the build.
    pub async fn build(
        &self,
        overrides: &BTreeMap<String, OverrideEntry>,
    ) -> Result<Catalog, FetchError> {
        let lookups = self.load_lookups().await?;
        let mut catalog = Catalog::new();

        let rows = self.source.fetch(SheetId::GameDownloads).await?;
        add_game_downloads(&mut catalog, &lookups, &rows);
        let rows = self.source.fetch(SheetId::GameDemos).await?;
        add_demos(&mut catalog, &lookups, &rows);
        let rows = self.source.fetch(SheetId::DirectorDemos).await?;
        add_director_demos(&mut catalog, &lookups, &rows);

        apply_overrides(&mut catalog, overrides);
        info!(records = catalog.len(), "catalog built");
        Ok(catalog)
    }
}
