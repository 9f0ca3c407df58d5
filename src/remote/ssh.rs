//! OpenSSH-backed transport sharing one multiplexed master connection.

use std::collections::BTreeSet;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use super::error::TransportError;
use super::{CommandOutput, RemoteTransport, TransportTimeouts, probe_result, remote_join, shell_quote};
use crate::config::{RemoteTarget, SshAuth};

/// Control socket template; `%r@%h:%p` keys it by user, host and port.
pub const CONTROL_PATH: &str = "/tmp/games-sync-ssh-%r@%h:%p";

/// Seconds the master stays alive after its last client disconnects.
const CONTROL_PERSIST_SECS: u64 = 600;

/// Exit status ssh uses for its own errors, including "no master running".
const SSH_ERROR_STATUS: i32 = 255;

fn control_path_option() -> String {
    format!("ControlPath={CONTROL_PATH}")
}

/// Remote transport that runs `ssh`/`scp` through the shared control socket.
///
/// The master connection must be opened first with
/// [`SshTransport::open_session`]; every call here only passes `ControlPath`.
#[derive(Debug, Clone)]
pub struct SshTransport {
    target: RemoteTarget,
    timeouts: TransportTimeouts,
}

impl SshTransport {
    /// Creates a transport for `target`.
    #[must_use]
    pub fn new(target: RemoteTarget, timeouts: TransportTimeouts) -> Self {
        Self { target, timeouts }
    }

    /// The mirror this transport talks to.
    #[must_use]
    pub fn target(&self) -> &RemoteTarget {
        &self.target
    }

    /// Opens the multiplexed master connection.
    ///
    /// A password wraps ssh in `sshpass -e`; a key file adds `-i` and batch
    /// mode. The returned guard closes the master when closed or dropped.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when ssh cannot be started, times out or
    /// exits non-zero.
    #[instrument(skip(self, auth), fields(server = %self.target.server))]
    pub async fn open_session(&self, auth: &SshAuth) -> Result<SshSession, TransportError> {
        let mut command = match auth {
            SshAuth::Password(password) => {
                let mut c = Command::new("sshpass");
                c.arg("-e").arg("ssh").env("SSHPASS", password);
                c
            }
            SshAuth::KeyFile(_) | SshAuth::Default => Command::new("ssh"),
        };
        command.arg("-MNf");
        if let SshAuth::KeyFile(key) = auth {
            command.arg("-i").arg(key);
        }
        if let Some(port) = self.target.port {
            command.arg("-p").arg(port.to_string());
        }
        command
            .arg("-o")
            .arg("ControlMaster=auto")
            .arg("-o")
            .arg(control_path_option())
            .arg("-o")
            .arg(format!("ControlPersist={CONTROL_PERSIST_SECS}"))
            .arg("-o")
            .arg("StrictHostKeyChecking=no");
        if !matches!(auth, SshAuth::Password(_)) {
            command.arg("-o").arg("BatchMode=yes");
        }
        command
            .arg(&self.target.server)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());

        let program = if matches!(auth, SshAuth::Password(_)) { "sshpass" } else { "ssh" };
        let status = tokio::time::timeout(self.timeouts.session, command.status())
            .await
            .map_err(|_| TransportError::timeout("open ssh session", self.timeouts.session))?
            .map_err(|e| TransportError::spawn(program, e))?;

        match status.code() {
            Some(0) => {
                info!("ssh session opened");
                Ok(SshSession {
                    target: self.target.clone(),
                    closed: false,
                })
            }
            Some(code) if code == SSH_ERROR_STATUS => Err(TransportError::Connection {
                operation: "open ssh session".to_string(),
                detail: format!("ssh exited with status {code}"),
            }),
            code => Err(TransportError::CommandFailed {
                operation: "open ssh session".to_string(),
                status: code.unwrap_or(-1),
                stderr: String::new(),
            }),
        }
    }

    fn ssh(&self) -> Command {
        let mut command = Command::new("ssh");
        if let Some(port) = self.target.port {
            command.arg("-p").arg(port.to_string());
        }
        command.arg("-o").arg(control_path_option());
        command.arg(&self.target.server);
        command
    }

    fn scp(&self) -> Command {
        let mut command = Command::new("scp");
        if let Some(port) = self.target.port {
            command.arg("-P").arg(port.to_string());
        }
        command.arg("-o").arg(control_path_option());
        command
    }

    async fn execute(
        &self,
        mut command: Command,
        program: &str,
        operation: &str,
        limit: Duration,
    ) -> Result<CommandOutput, TransportError> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let output = tokio::time::timeout(limit, command.output())
            .await
            .map_err(|_| TransportError::timeout(operation, limit))?
            .map_err(|e| TransportError::spawn(program, e))?;
        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn remote(&self, script: &str, limit: Duration) -> Result<CommandOutput, TransportError> {
        let mut command = self.ssh();
        command.arg(script);
        debug!(command = %script, "remote command");
        self.execute(command, "ssh", script, limit).await
    }

    async fn probe(&self, flag: &str, path: &str) -> Result<bool, TransportError> {
        let script = format!("test {flag} {}", shell_quote(path));
        let output = self.remote(&script, self.timeouts.probe).await?;
        probe_result(&script, output.status, &output.stderr)
    }
}

#[async_trait]
impl RemoteTransport for SshTransport {
    async fn list_child_directories(&self, path: &str) -> Result<BTreeSet<String>, TransportError> {
        let script = format!("ls -1 {}", shell_quote(path));
        let output = self.remote(&script, self.timeouts.command).await?;
        if !output.success() {
            return Err(TransportError::from_status(&script, output.status, &output.stderr));
        }

        let mut directories = BTreeSet::new();
        for name in output.stdout.lines().map(str::trim).filter(|n| !n.is_empty()) {
            if self.probe("-d", &remote_join(path, name)).await? {
                directories.insert(name.to_string());
            }
        }
        debug!(path = %path, count = directories.len(), "remote directories listed");
        Ok(directories)
    }

    async fn exists(&self, path: &str) -> Result<bool, TransportError> {
        self.probe("-d", path).await
    }

    async fn file_exists(&self, path: &str) -> Result<bool, TransportError> {
        self.probe("-f", path).await
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, TransportError> {
        self.remote(command, self.timeouts.command).await
    }

    async fn copy(&self, local: &Path, remote: &str, recursive: bool) -> Result<(), TransportError> {
        let mut command = self.scp();
        if recursive {
            command.arg("-r");
        }
        command
            .arg(local)
            .arg(format!("{}:{remote}", self.target.server));
        debug!(local = %local.display(), remote = %remote, recursive, "copying to mirror");

        let operation = format!("scp {}", local.display());
        let output = self
            .execute(command, "scp", &operation, self.timeouts.copy)
            .await?;
        if output.success() {
            Ok(())
        } else {
            Err(TransportError::from_status(operation, output.status, &output.stderr))
        }
    }
}

/// Guard for the multiplexed master connection.
///
/// Call [`SshSession::close`] on every normal exit path; dropping an open
/// session closes it synchronously as a fallback.
#[derive(Debug)]
pub struct SshSession {
    target: RemoteTarget,
    closed: bool,
}

impl SshSession {
    fn exit_args(&self) -> Vec<String> {
        let mut args = vec!["-O".to_string(), "exit".to_string()];
        if let Some(port) = self.target.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        args.push("-o".to_string());
        args.push(control_path_option());
        args.push(self.target.server.clone());
        args
    }

    /// Closes the master connection with `ssh -O exit`.
    ///
    /// Exit 255 means the master is already gone and is not reported.
    pub async fn close(mut self) {
        self.closed = true;
        let result = Command::new("ssh")
            .args(self.exit_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await;
        match result {
            Ok(output) => log_close_status(output.status.code(), &output.stderr),
            Err(e) => warn!(error = %e, "could not close ssh session"),
        }
    }
}

fn log_close_status(code: Option<i32>, stderr: &[u8]) {
    match code {
        Some(0) => info!("ssh session closed"),
        Some(SSH_ERROR_STATUS) => debug!("ssh session already closed"),
        code => warn!(
            status = code.unwrap_or(-1),
            stderr = %String::from_utf8_lossy(stderr).trim(),
            "could not close ssh session"
        ),
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let result = std::process::Command::new("ssh")
            .args(self.exit_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();
        match result {
            Ok(output) => log_close_status(output.status.code(), &output.stderr),
            Err(e) => warn!(error = %e, "could not close ssh session"),
        }
    }
}
