//! Per-item transfer decisions and the remote directory snapshot.

use std::collections::BTreeSet;
use std::fmt;

/// What to do with one catalog item this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferDecision {
    /// Already on the mirror; exported, local leftovers removed.
    AlreadyRemote,
    /// Not on the mirror but downloadable; transfer it.
    UploadNeeded,
    /// Marked skip and not on the mirror; left alone.
    Skipped,
    /// On the mirror with no catalog item.
    OrphanOnRemote,
    /// Not on the mirror and not downloadable; aborts the run.
    MissingSource,
}

impl fmt::Display for TransferDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AlreadyRemote => "already-remote",
            Self::UploadNeeded => "upload-needed",
            Self::Skipped => "skipped",
            Self::OrphanOnRemote => "orphan",
            Self::MissingSource => "missing-source",
        })
    }
}

/// Decides an item's fate from the three facts gathered up front.
///
/// Presence on the mirror wins over `skip`: a skipped item that is already
/// there is still exported.
#[must_use]
pub const fn decide(has_source: bool, exists_on_remote: bool, skip: bool) -> TransferDecision {
    match (has_source, exists_on_remote, skip) {
        (_, true, _) => TransferDecision::AlreadyRemote,
        (_, false, true) => TransferDecision::Skipped,
        (true, false, false) => TransferDecision::UploadNeeded,
        (false, false, false) => TransferDecision::MissingSource,
    }
}

/// Child directory names on the mirror, captured once per run.
///
/// Names are taken out as catalog items claim them; whatever is left at the
/// end has no catalog item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSnapshot {
    names: BTreeSet<String>,
}

impl RemoteSnapshot {
    /// Wraps a directory listing.
    #[must_use]
    pub fn new(names: BTreeSet<String>) -> Self {
        Self { names }
    }

    /// Claims `name`; returns whether it was present.
    pub fn take(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    /// Whether `name` is still unclaimed.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of unclaimed names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if every name has been claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Consumes the snapshot, returning the unclaimed names sorted.
    #[must_use]
    pub fn into_orphans(self) -> Vec<String> {
        self.names.into_iter().collect()
    }
}

impl FromIterator<String> for RemoteSnapshot {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_table() {
        use TransferDecision as D;
        let cases = [
            ((true, true, true), D::AlreadyRemote),
            ((false, true, true), D::AlreadyRemote),
            ((true, true, false), D::AlreadyRemote),
            ((false, true, false), D::AlreadyRemote),
            ((true, false, true), D::Skipped),
            ((false, false, true), D::Skipped),
            ((true, false, false), D::UploadNeeded),
            ((false, false, false), D::MissingSource),
        ];
        for ((source, exists, skip), expected) in cases {
            assert_eq!(
                decide(source, exists, skip),
                expected,
                "source={source} exists={exists} skip={skip}"
            );
        }
    }

    #[test]
    fn test_snapshot_take_shrinks_set() {
        let mut snapshot: RemoteSnapshot = ["A".to_string(), "B".to_string()].into_iter().collect();
        assert!(snapshot.take("A"));
        assert!(!snapshot.take("A"), "a name can only be claimed once");
        assert_eq!(snapshot.into_orphans(), vec!["B".to_string()]);
    }
}
