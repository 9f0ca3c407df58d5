//! Error types for the remote transport.

use std::time::Duration;

use thiserror::Error;

/// Exit status ssh and scp use for their own failures.
const SSH_FAILURE_STATUS: i32 = 255;

/// Stderr fragments that identify an unreachable host or rejected credentials.
const CONNECTIVITY_MARKERS: &[&str] = &[
    "connection refused",
    "no route to host",
    "connection timed out",
    "permission denied",
    "authentication failed",
    "could not resolve hostname",
];

/// Errors that can occur while talking to the mirror.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A remote call did not finish within its timeout.
    #[error("timeout after {}s running {operation}", elapsed.as_secs())]
    Timeout {
        /// Short description of the operation.
        operation: String,
        /// The timeout that expired.
        elapsed: Duration,
    },

    /// The host is unreachable or rejected authentication.
    #[error("cannot reach mirror during {operation}: {detail}")]
    Connection {
        /// Short description of the operation.
        operation: String,
        /// Stderr of the failed call.
        detail: String,
    },

    /// A remote command exited with an unexpected status.
    #[error("{operation} failed with exit status {status}: {stderr}")]
    CommandFailed {
        /// Short description of the operation.
        operation: String,
        /// Exit status, or -1 when the process was killed by a signal.
        status: i32,
        /// Stderr of the failed call.
        stderr: String,
    },

    /// The local `ssh`/`scp` process could not be started or awaited.
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        /// The program that failed to start.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Local file system error while staging remote content.
    #[error("IO error staging {path}: {source}")]
    Io {
        /// The local path involved.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl TransportError {
    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed,
        }
    }

    /// Classifies a failed call.
    ///
    /// Exit 255 is always connectivity, whatever stderr says: ssh itself
    /// failed and the remote command may never have run. Any other status is
    /// connectivity only when ssh printed a connection error, as `scp` does
    /// with exit 1.
    pub fn from_status(operation: impl Into<String>, status: i32, stderr: &str) -> Self {
        let operation = operation.into();
        let stderr = stderr.trim().to_string();
        if status == SSH_FAILURE_STATUS || reported_by_ssh(&stderr) {
            Self::Connection {
                operation,
                detail: stderr,
            }
        } else {
            Self::CommandFailed {
                operation,
                status,
                stderr,
            }
        }
    }

    /// Creates a spawn error.
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            program: program.into(),
            source,
        }
    }

    /// Creates a local IO error.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the mirror is unreachable or refused us.
    ///
    /// Timeouts count: a call that never answers cannot be told apart from an
    /// unreachable host.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// Whether `stderr` contains one of the connectivity markers.
#[must_use]
pub fn mentions_connectivity(stderr: &str) -> bool {
    let lowered = stderr.to_lowercase();
    CONNECTIVITY_MARKERS.iter().any(|marker| lowered.contains(marker))
}

/// Whether a line of `stderr` is an ssh connection error.
fn reported_by_ssh(stderr: &str) -> bool {
    stderr
        .lines()
        .any(|line| line.trim_start().starts_with("ssh:") && mentions_connectivity(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_detects_connectivity_on_255() {
        let err = TransportError::from_status(
            "exists",
            255,
            "ssh: connect to host mirror port 22: Connection refused\n",
        );
        assert!(err.is_connectivity(), "expected connectivity error, got {err}");
    }

    #[test]
    fn test_from_status_plain_failure_is_not_connectivity() {
        let err = TransportError::from_status("ls", 2, "ls: cannot access 'x': Permission denied");
        assert!(
            matches!(err, TransportError::CommandFailed { status: 2, .. }),
            "marker without exit 255 is a command failure"
        );
        assert!(!err.is_connectivity());
    }

    #[test]
    fn test_from_status_255_is_connectivity_without_marker() {
        let err = TransportError::from_status(
            "test -f",
            255,
            "mux_client_request_session: read from master failed: Broken pipe",
        );
        assert!(
            matches!(err, TransportError::Connection { .. }),
            "ssh exit 255 must never pass as a command failure, got {err}"
        );
        assert!(TransportError::from_status("mv", 255, "").is_connectivity());
    }

    #[test]
    fn test_from_status_scp_connection_error_is_connectivity() {
        let err = TransportError::from_status(
            "scp",
            1,
            "ssh: connect to host mirror port 22: No route to host\nlost connection",
        );
        assert!(err.is_connectivity(), "got {err}");
    }

    #[test]
    fn test_timeout_is_connectivity() {
        let err = TransportError::timeout("list", Duration::from_secs(10));
        assert!(err.is_connectivity());
        assert_eq!(err.to_string(), "timeout after 10s running list");
    }
}
