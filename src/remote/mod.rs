//! Remote transport to the mirror.
//!
//! All mirror access goes through the [`RemoteTransport`] trait: list child
//! directories, probe existence, run a shell command, copy a local path.
//! [`SshTransport`] implements it over a single multiplexed OpenSSH session
//! held open by an [`SshSession`] guard.

mod error;
mod ssh;

pub use error::{TransportError, mentions_connectivity};
pub use ssh::{CONTROL_PATH, SshSession, SshTransport};

use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

/// Timeouts applied to remote calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportTimeouts {
    /// Existence probes (`test -d`, `test -f`).
    pub probe: Duration,
    /// Other remote commands.
    pub command: Duration,
    /// Opening the master session.
    pub session: Duration,
    /// A single copy of one item.
    pub copy: Duration,
}

impl Default for TransportTimeouts {
    fn default() -> Self {
        Self {
            probe: Duration::from_secs(10),
            command: Duration::from_secs(30),
            session: Duration::from_secs(30),
            copy: Duration::from_secs(3600),
        }
    }
}

/// Result of a remote shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; -1 when killed by a signal.
    pub status: i32,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status 0.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Primitive operations on the mirror.
///
/// Every call is bounded by a timeout; expiry surfaces as
/// [`TransportError::Timeout`]. Nothing is retried.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Names of the immediate child directories of `path`.
    ///
    /// An empty directory yields an empty set; a failed listing is an error.
    async fn list_child_directories(&self, path: &str) -> Result<BTreeSet<String>, TransportError>;

    /// Whether `path` is a directory. Exit 0/1 map to true/false.
    async fn exists(&self, path: &str) -> Result<bool, TransportError>;

    /// Whether `path` is a regular file. Exit 0/1 map to true/false.
    async fn file_exists(&self, path: &str) -> Result<bool, TransportError>;

    /// Runs a shell command. A non-zero exit is returned, not raised.
    async fn run(&self, command: &str) -> Result<CommandOutput, TransportError>;

    /// Copies a local file, or a directory when `recursive`, to `remote`.
    async fn copy(&self, local: &Path, remote: &str, recursive: bool) -> Result<(), TransportError>;

    /// Removes `path` recursively; a missing path is not an error.
    async fn remove_tree(&self, path: &str) -> Result<(), TransportError> {
        let output = self.run(&format!("rm -rf {}", shell_quote(path))).await?;
        check_output("rm", &output)
    }

    /// Renames `from` to `to` on the mirror.
    async fn rename(&self, from: &str, to: &str) -> Result<(), TransportError> {
        let output = self
            .run(&format!("mv {} {}", shell_quote(from), shell_quote(to)))
            .await?;
        check_output("mv", &output)
    }
}

fn check_output(operation: &str, output: &CommandOutput) -> Result<(), TransportError> {
    if output.success() {
        Ok(())
    } else {
        Err(TransportError::from_status(
            operation,
            output.status,
            &output.stderr,
        ))
    }
}

/// Quotes `value` for a POSIX shell.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Joins a remote base path and a child name.
#[must_use]
pub fn remote_join(base: &str, name: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        format!("/{name}")
    } else {
        format!("{base}/{name}")
    }
}

/// Maps a probe exit status to existence; anything but 0/1 is an error.
pub(crate) fn probe_result(
    operation: &str,
    status: i32,
    stderr: &str,
) -> Result<bool, TransportError> {
    match status {
        0 => Ok(true),
        1 => Ok(false),
        _ => Err(TransportError::from_status(operation, status, stderr)),
    }
}
