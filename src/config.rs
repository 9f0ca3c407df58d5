//! Run settings resolved from command-line values and the environment.

use std::fmt;
use std::path::PathBuf;

use crate::error::SyncError;
use crate::remote::TransportTimeouts;
use crate::sheet::DEFAULT_SHEET_URL;

/// Identifiers that are never distributed, whatever the request.
pub const RESERVED_IDS: &[&str] = &["testbed", "playground3d"];

/// Default local working directory.
pub const DEFAULT_DOWNLOAD_DIR: &str = "games";

/// Default override file.
pub const DEFAULT_OVERRIDES_PATH: &str = "assets/metadata.json";

/// Default exported catalog path.
pub const DEFAULT_OUTPUT_PATH: &str = "games.json";

/// The mirror to synchronize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    /// `user@host` passed to ssh and scp.
    pub server: String,
    /// Base directory holding one entry per item.
    pub path: String,
    /// SSH port, when not the default.
    pub port: Option<u16>,
}

/// How the master connection authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum SshAuth {
    /// Agent or default identity, batch mode.
    Default,
    /// Explicit private key file, batch mode.
    KeyFile(PathBuf),
    /// Password fed to `sshpass -e`.
    Password(String),
}

impl fmt::Debug for SshAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::KeyFile(path) => f.debug_tuple("KeyFile").field(path).finish(),
            Self::Password(_) => f.write_str("Password(<redacted>)"),
        }
    }
}

/// Raw values as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct SettingsInput {
    /// Requested identifiers or URLs.
    pub items: Vec<String>,
    /// Local working directory.
    pub download_dir: Option<PathBuf>,
    /// `user@host` of the mirror.
    pub scp_server: Option<String>,
    /// Base path on the mirror.
    pub scp_path: Option<String>,
    /// SSH port.
    pub scp_port: Option<u16>,
    /// Cap on transfer attempts.
    pub max_transfers: Option<usize>,
    /// Override file path.
    pub overrides: Option<PathBuf>,
    /// Exported catalog path.
    pub output: Option<PathBuf>,
    /// Published sheet URL.
    pub sheet_url: Option<String>,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Requested identifiers with reserved ids removed; empty means all.
    pub items: Vec<String>,
    /// Local working directory.
    pub download_dir: PathBuf,
    /// The mirror.
    pub remote: RemoteTarget,
    /// Master connection authentication.
    pub auth: SshAuth,
    /// Cap on transfer attempts; `None` is unlimited.
    pub max_transfers: Option<usize>,
    /// Override file path.
    pub overrides_path: PathBuf,
    /// Exported catalog path.
    pub output_path: PathBuf,
    /// Published sheet URL.
    pub sheet_url: String,
    /// Remote call timeouts.
    pub timeouts: TransportTimeouts,
}

impl SyncSettings {
    /// Resolves settings, falling back to the environment for remote values.
    ///
    /// `env` looks up one variable; pass `|k| std::env::var(k).ok()` in
    /// production. Command-line values win over the environment.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] when the mirror server or path is
    /// missing, or `SSH_PORT` is not a port number.
    pub fn resolve(
        input: SettingsInput,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SyncError> {
        let lookup = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let server = input
            .scp_server
            .filter(|s| !s.trim().is_empty())
            .or_else(|| match (lookup("SSH_USER"), lookup("SSH_HOST")) {
                (Some(user), Some(host)) => Some(format!("{user}@{host}")),
                _ => None,
            })
            .ok_or_else(|| {
                SyncError::config("mirror server not set (use --scp-server or SSH_USER and SSH_HOST)")
            })?;

        let path = input
            .scp_path
            .filter(|p| !p.trim().is_empty())
            .or_else(|| lookup("SSH_PATH"))
            .ok_or_else(|| SyncError::config("mirror path not set (use --scp-path or SSH_PATH)"))?;

        let port = match input.scp_port {
            Some(port) => Some(port),
            None => lookup("SSH_PORT")
                .map(|raw| {
                    raw.parse::<u16>()
                        .map_err(|_| SyncError::config(format!("SSH_PORT '{raw}' is not a port number")))
                })
                .transpose()?,
        };

        let auth = if let Some(password) = env("SSH_PASSWORD").filter(|p| !p.is_empty()) {
            SshAuth::Password(password)
        } else if let Some(key) = lookup("SSH_KEY_PATH") {
            SshAuth::KeyFile(PathBuf::from(key))
        } else {
            SshAuth::Default
        };

        Ok(Self {
            items: filter_reserved(input.items),
            download_dir: input
                .download_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_DIR)),
            remote: RemoteTarget { server, path, port },
            auth,
            max_transfers: input.max_transfers,
            overrides_path: input
                .overrides
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OVERRIDES_PATH)),
            output_path: input
                .output
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
            sheet_url: input
                .sheet_url
                .unwrap_or_else(|| DEFAULT_SHEET_URL.to_string()),
            timeouts: TransportTimeouts::default(),
        })
    }
}

/// Drops reserved identifiers from a request list.
#[must_use]
pub fn filter_reserved(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .filter(|item| !RESERVED_IDS.contains(&item.trim()))
        .collect()
}
