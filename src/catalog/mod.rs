//! The merged game catalog.
//!
//! Records are keyed by target name, the folder (or file) name an item
//! occupies locally and on the mirror. Spreadsheet rows and override entries
//! both go through [`Catalog::add_or_update`], the single mutation entry point.
//!
//! # Example
//!
//! ```
//! use games_sync_core::catalog::{Catalog, Origin, RecordSeed};
//!
//! let mut catalog = Catalog::new();
//! catalog.add_or_update("sky-demo", RecordSeed::new("sky:sky-demo"), None);
//! assert_eq!(catalog.get("sky-demo").map(|r| r.origin), Some(Origin::Spreadsheet));
//! ```

mod builder;
mod overrides;
mod record;

pub use builder::{CatalogBuilder, LoadStats, Lookups, extract_languages};
pub use overrides::{OverrideEntry, OverrideError, load_overrides, parse_overrides};
pub use record::{
    ARCHIVE_EXTENSION, GameRecord, Origin, RecordSeed, SourceKind, UPSTREAM_BASE,
    file_name_from_url, is_safe_target_name, normalize_download_url, target_name_from_url,
};

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

/// A requested identifier that matches no catalog record.
#[derive(Debug, Clone, Error)]
#[error("item '{requested}' is not known to the catalog")]
pub struct UnknownItemError {
    /// The identifier or URL as given.
    pub requested: String,
}

/// In-memory catalog keyed by target name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: BTreeMap<String, GameRecord>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record or patches the existing one for `target`.
    ///
    /// When no record exists, a fresh one is built from `seed` and then
    /// patched by `overrides`. When one exists, the seed is ignored and only
    /// `overrides` patch it, preserving every unspecified field. A
    /// spreadsheet record patched by an override becomes [`Origin::Merged`].
    pub fn add_or_update(
        &mut self,
        target: &str,
        seed: RecordSeed,
        overrides: Option<&OverrideEntry>,
    ) -> &GameRecord {
        match self.records.entry(target.to_string()) {
            Entry::Occupied(occupied) => {
                let record = occupied.into_mut();
                if let Some(entry) = overrides {
                    record.apply_override(entry);
                    if record.origin == Origin::Spreadsheet {
                        record.origin = Origin::Merged;
                    }
                }
                record
            }
            Entry::Vacant(vacant) => {
                let origin = if overrides.is_some() {
                    Origin::OverrideOnly
                } else {
                    Origin::Spreadsheet
                };
                let mut record = GameRecord::from_seed(target, seed, origin);
                if let Some(entry) = overrides {
                    record.apply_override(entry);
                }
                vacant.insert(record)
            }
        }
    }

    /// Marks an existing record as skipped. Returns false if there is none.
    pub fn mark_skip(&mut self, target: &str) -> bool {
        self.records
            .get_mut(target)
            .map(|record| record.skip = true)
            .is_some()
    }

    /// Looks up a record by target name.
    #[must_use]
    pub fn get(&self, target: &str) -> Option<&GameRecord> {
        self.records.get(target)
    }

    /// Iterates records in target-name order.
    pub fn iter(&self) -> impl Iterator<Item = &GameRecord> {
        self.records.values()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the catalog has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Resolves the target names to reconcile this run.
    ///
    /// An empty request selects every record. Otherwise each requested
    /// identifier selects every record it matches (see
    /// [`matches_request`]), and every override-backed record is added on
    /// top. The result is sorted case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownItemError`] for the first identifier that matches nothing.
    pub fn work_list(&self, requested: &[String]) -> Result<Vec<String>, UnknownItemError> {
        let mut selected: BTreeSet<&str> = BTreeSet::new();

        if requested.is_empty() {
            selected.extend(self.records.keys().map(String::as_str));
        } else {
            for request in requested {
                let before = selected.len();
                let mut matched = false;
                for record in self.records.values() {
                    if matches_request(record, request) {
                        matched = true;
                        selected.insert(record.target_name());
                    }
                }
                if !matched {
                    return Err(UnknownItemError {
                        requested: request.clone(),
                    });
                }
                tracing::debug!(
                    request = %request,
                    added = selected.len() - before,
                    "request resolved"
                );
            }
            selected.extend(
                self.records
                    .values()
                    .filter(|r| r.origin != Origin::Spreadsheet)
                    .map(GameRecord::target_name),
            );
        }

        let mut targets: Vec<String> = selected.into_iter().map(str::to_string).collect();
        targets.sort_by_cached_key(|t| (t.to_lowercase(), t.clone()));
        Ok(targets)
    }
}

/// Whether a requested identifier or URL selects `record`.
///
/// Identifiers match the full id, the short id, or either followed by
/// `/<file name>`. Absolute URLs match the normalized download URL or the
/// target name derived from the URL.
#[must_use]
pub fn matches_request(record: &GameRecord, request: &str) -> bool {
    let request = request.trim();
    if request.starts_with("http://") || request.starts_with("https://") {
        let normalized = normalize_download_url(request);
        return record.download_url() == Some(normalized.as_str())
            || target_name_from_url(&normalized).as_deref() == Some(record.target_name());
    }

    if request == record.id || request == record.short_id() {
        return true;
    }
    let Some(file_name) = record.file_name() else {
        return false;
    };
    request == format!("{}/{file_name}", record.id)
        || request == format!("{}/{file_name}", record.short_id())
}
