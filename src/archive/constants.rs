//! Constants for the archive module (timeouts, temp suffixes).

/// HTTP connect timeout for archive downloads (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// HTTP read timeout for archive downloads (1 hour for large archives).
pub const READ_TIMEOUT_SECS: u64 = 3600;

/// Suffix of a download in progress.
pub const DOWNLOADING_SUFFIX: &str = ".downloading";

/// Suffix of an upload in progress on the mirror.
pub const UPLOADING_SUFFIX: &str = ".uploading";

/// Archive entries under this prefix are resource-fork junk and never extracted.
pub const JUNK_PREFIX: &str = "__MACOSX/";
