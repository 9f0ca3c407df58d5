//! Catalog record types and download URL helpers.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use super::overrides::OverrideEntry;

/// Base URL of the upstream distribution server.
pub const UPSTREAM_BASE: &str = "https://downloads.scummvm.org";

/// Path prefix of first-party downloads on the upstream server.
const FIRST_PARTY_PATH: &str = "/frs/";

/// Archive extension that triggers extraction.
pub const ARCHIVE_EXTENSION: &str = ".zip";

/// Where a record's download comes from, classified once when the URL is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Hosted under the upstream `/frs` tree; the mirror may download it.
    FirstParty,
    /// Any other absolute URL; exported but never downloaded.
    External,
    /// No download URL at all.
    Metadata,
}

impl SourceKind {
    /// Classifies a normalized download URL.
    #[must_use]
    pub fn classify(url: Option<&str>) -> Self {
        let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            return Self::Metadata;
        };
        let host_relative = url
            .strip_prefix(UPSTREAM_BASE)
            .or_else(|| url.strip_prefix("http://downloads.scummvm.org"));
        match host_relative {
            Some(path) if path.starts_with(FIRST_PARTY_PATH) => Self::FirstParty,
            _ => Self::External,
        }
    }
}

/// Which inputs a record was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Built from a spreadsheet row only.
    Spreadsheet,
    /// Built from an override entry only.
    OverrideOnly,
    /// A spreadsheet record patched by an override entry.
    Merged,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Spreadsheet => "spreadsheet",
            Self::OverrideOnly => "override-only",
            Self::Merged => "merged",
        })
    }
}

/// Fields supplied when a record is first created.
///
/// A seed only applies when no record exists yet for the target name; an
/// existing record keeps its fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSeed {
    /// Catalog identifier, e.g. `scumm:monkey`.
    pub id: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Download URL, normalized on record creation.
    pub download_url: Option<String>,
    /// Language codes in first-seen order.
    pub languages: Vec<String>,
    /// Display name of the platform.
    pub platform: Option<String>,
}

impl RecordSeed {
    /// Creates a seed carrying only an identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// One entry of the merged catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRecord {
    /// Catalog identifier, e.g. `scumm:monkey-demo`.
    pub id: String,
    target_name: String,
    /// Human-readable description.
    pub description: Option<String>,
    /// Display name of the platform.
    pub platform: Option<String>,
    /// Language codes.
    pub languages: Vec<String>,
    download_url: Option<String>,
    source: SourceKind,
    /// Excluded from transfer; still exported when already on the mirror.
    pub skip: bool,
    /// Which inputs produced this record.
    pub origin: Origin,
    /// Override keys outside the known field set, exported verbatim.
    pub extensions: BTreeMap<String, Value>,
}

impl GameRecord {
    /// Creates a record from a seed.
    ///
    /// A bare `en` language entry is dropped: upstream tags English
    /// inconsistently and a wrong tag prevents the game from launching.
    #[must_use]
    pub fn from_seed(target_name: impl Into<String>, seed: RecordSeed, origin: Origin) -> Self {
        let mut record = Self {
            id: seed.id,
            target_name: target_name.into(),
            description: seed.description,
            platform: seed.platform,
            languages: seed.languages.into_iter().filter(|l| l != "en").collect(),
            download_url: None,
            source: SourceKind::Metadata,
            skip: false,
            origin,
            extensions: BTreeMap::new(),
        };
        record.set_download_url(seed.download_url);
        record
    }

    /// Local and remote folder (or file) name; the catalog join key.
    #[must_use]
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// The id without its `engine:` prefix.
    #[must_use]
    pub fn short_id(&self) -> &str {
        self.id.rsplit_once(':').map_or(self.id.as_str(), |(_, s)| s)
    }

    /// Normalized download URL, whatever its source kind.
    #[must_use]
    pub fn download_url(&self) -> Option<&str> {
        self.download_url.as_deref()
    }

    /// Source classification of [`download_url`](Self::download_url).
    #[must_use]
    pub fn source_kind(&self) -> SourceKind {
        self.source
    }

    /// URL the mirror may download from; only first-party sources qualify.
    #[must_use]
    pub fn source_url(&self) -> Option<&str> {
        match self.source {
            SourceKind::FirstParty => self.download_url.as_deref(),
            SourceKind::External | SourceKind::Metadata => None,
        }
    }

    /// Replaces the download URL and reclassifies the source.
    pub fn set_download_url(&mut self, url: Option<String>) {
        self.download_url = url
            .map(|u| normalize_download_url(&u))
            .filter(|u| !u.is_empty());
        self.source = SourceKind::classify(self.download_url.as_deref());
    }

    /// File name the download is stored under locally.
    #[must_use]
    pub fn file_name(&self) -> Option<String> {
        self.download_url.as_deref().and_then(file_name_from_url)
    }

    /// Whether the download is an archive that must be extracted.
    #[must_use]
    pub fn is_archive(&self) -> bool {
        self.file_name()
            .is_some_and(|name| name.to_ascii_lowercase().ends_with(ARCHIVE_EXTENSION))
    }

    /// Applies an override entry field by field.
    ///
    /// Every field present in the entry replaces the record's value; unknown
    /// keys land in [`extensions`](Self::extensions). The target name never
    /// changes.
    pub fn apply_override(&mut self, entry: &OverrideEntry) {
        if let Some(id) = &entry.id {
            self.id.clone_from(id);
        }
        if let Some(description) = &entry.description {
            self.description = Some(description.clone());
        }
        if let Some(platform) = &entry.platform {
            self.platform = Some(platform.clone());
        }
        if let Some(languages) = &entry.languages {
            self.languages.clone_from(languages);
        }
        if let Some(url) = &entry.download_url {
            self.set_download_url(Some(url.clone()));
        }
        for (key, value) in &entry.extra {
            self.extensions.insert(key.clone(), value.clone());
        }
    }
}

/// Turns the upstream server's shorthand URL forms into absolute URLs.
#[must_use]
pub fn normalize_download_url(url: &str) -> String {
    let value = url.trim();
    if value.starts_with("/frs/") {
        format!("{UPSTREAM_BASE}{value}")
    } else if value.starts_with("frs/") {
        format!("{UPSTREAM_BASE}/{value}")
    } else if value.starts_with("//") {
        format!("https:{value}")
    } else if value.starts_with("downloads.scummvm.org") {
        format!("https://{value}")
    } else {
        value.to_string()
    }
}

/// Whether `name` can be used as a single folder or file name, locally and
/// on the mirror.
///
/// Rejects empty names, names starting with `.` (which covers `.` and `..`
/// and the mirror's hidden temp paths), and names containing a path
/// separator or NUL.
#[must_use]
pub fn is_safe_target_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
}

/// Returns the percent-decoded last path segment of a URL.
///
/// A segment that decodes to anything but a plain file name yields `None`.
#[must_use]
pub fn file_name_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next()?.trim();
    let decoded = urlencoding::decode(segment).map_or_else(|_| segment.to_string(), |d| d.into_owned());
    is_safe_target_name(&decoded).then_some(decoded)
}

/// Derives the target name from a URL: the file name with `.zip` stripped.
#[must_use]
pub fn target_name_from_url(url: &str) -> Option<String> {
    let file_name = file_name_from_url(url)?;
    let target = if file_name.to_ascii_lowercase().ends_with(ARCHIVE_EXTENSION) {
        file_name[..file_name.len() - ARCHIVE_EXTENSION.len()].to_string()
    } else {
        file_name
    };
    is_safe_target_name(&target).then_some(target)
}
