//! Shared test doubles: an in-memory mirror and an in-memory spreadsheet.
//!
//! `FakeTransport` keeps the mirror as a set of directory paths and a map of
//! file paths to contents. It understands the shell commands the library
//! issues (`rm -rf`, `mv`, the index listing) well enough for integration
//! tests, and can be told to fail copies, renames, `test -f` checks, or every call.
//! Commands and copies are also kept in one ordered event log.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use games_sync_core::remote::{CommandOutput, RemoteTransport, TransportError};
use games_sync_core::sheet::{FetchError, Row, SheetId, SheetSource};

/// Stderr of an unreachable host as ssh reports it.
pub const REFUSED: &str = "ssh: connect to host mirror port 22: Connection refused";

#[derive(Debug, Default)]
pub struct MirrorState {
    pub dirs: BTreeSet<String>,
    pub files: BTreeMap<String, Vec<u8>>,
    pub commands: Vec<String>,
    pub copies: Vec<String>,
    pub events: Vec<String>,
    pub fail_copy: bool,
    pub fail_rename: bool,
    /// Exit status and stderr every `test -f` probe fails with.
    pub file_check_failure: Option<(i32, &'static str)>,
    pub unreachable: bool,
}

#[derive(Debug, Default)]
pub struct FakeTransport {
    pub state: Mutex<MirrorState>,
}

impl FakeTransport {
    /// A mirror whose base directory exists and holds `children` folders.
    pub fn with_base(base: &str, children: &[&str]) -> Self {
        let transport = Self::default();
        {
            let mut state = transport.state.lock().unwrap();
            state.dirs.insert(base.to_string());
            for child in children {
                state.dirs.insert(format!("{base}/{child}"));
            }
        }
        transport
    }

    pub fn set(&self, update: impl FnOnce(&mut MirrorState)) {
        update(&mut self.state.lock().unwrap());
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.state.lock().unwrap().dirs.contains(path)
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.state.lock().unwrap().files.contains_key(path)
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    /// Every path (directory or file) at or below `prefix`.
    pub fn paths_under(&self, prefix: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .dirs
            .iter()
            .chain(state.files.keys())
            .filter(|p| is_at_or_below(p, prefix))
            .cloned()
            .collect()
    }

    pub fn copies(&self) -> Vec<String> {
        self.state.lock().unwrap().copies.clone()
    }

    /// `run <command>` and `copy <remote>` entries in call order.
    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    /// Adds a file, creating its parent directories.
    pub fn put_file(&self, path: &str, body: &[u8]) {
        let mut state = self.state.lock().unwrap();
        let mut parent = path;
        while let Some((dir, _)) = parent.rsplit_once('/') {
            if dir.is_empty() {
                break;
            }
            state.dirs.insert(dir.to_string());
            parent = dir;
        }
        state.files.insert(path.to_string(), body.to_vec());
    }

    fn check_reachable(&self, operation: &str) -> Result<(), TransportError> {
        if self.state.lock().unwrap().unreachable {
            return Err(TransportError::from_status(operation, 255, REFUSED));
        }
        Ok(())
    }
}

fn is_at_or_below(path: &str, prefix: &str) -> bool {
    path == prefix || path.starts_with(&format!("{prefix}/"))
}

fn ok(stdout: String) -> CommandOutput {
    CommandOutput {
        status: 0,
        stdout,
        stderr: String::new(),
    }
}

/// Splits `'a' 'b'` style quoted arguments.
fn unquote_args(rest: &str) -> Vec<String> {
    rest.split("' '")
        .map(|s| s.trim().trim_matches('\'').replace(r"'\''", "'"))
        .collect()
}

fn move_prefix(state: &mut MirrorState, from: &str, to: &str) {
    let rebase = |p: &String| format!("{to}{}", &p[from.len()..]);
    let dirs: Vec<String> = state.dirs.iter().filter(|p| is_at_or_below(p, from)).cloned().collect();
    for dir in dirs {
        state.dirs.remove(&dir);
        state.dirs.insert(rebase(&dir));
    }
    let files: Vec<String> = state.files.keys().filter(|p| is_at_or_below(p, from)).cloned().collect();
    for file in files {
        if let Some(body) = state.files.remove(&file) {
            state.files.insert(rebase(&file), body);
        }
    }
}

fn remove_prefix(state: &mut MirrorState, path: &str) {
    state.dirs.retain(|p| !is_at_or_below(p, path));
    state.files.retain(|p, _| !is_at_or_below(p, path));
}

fn upload_tree(state: &mut MirrorState, local: &Path, remote: &str) {
    state.dirs.insert(remote.to_string());
    let mut entries: Vec<PathBuf> = std::fs::read_dir(local)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    entries.sort();
    for entry in entries {
        let name = entry.file_name().unwrap().to_string_lossy().into_owned();
        let child = format!("{remote}/{name}");
        if entry.is_dir() {
            upload_tree(state, &entry, &child);
        } else {
            state.files.insert(child, std::fs::read(&entry).unwrap());
        }
    }
}

#[async_trait]
impl RemoteTransport for FakeTransport {
    async fn list_child_directories(&self, path: &str) -> Result<BTreeSet<String>, TransportError> {
        self.check_reachable("list")?;
        let state = self.state.lock().unwrap();
        let prefix = format!("{}/", path.trim_end_matches('/'));
        Ok(state
            .dirs
            .iter()
            .filter_map(|d| d.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(str::to_string)
            .collect())
    }

    async fn exists(&self, path: &str) -> Result<bool, TransportError> {
        self.check_reachable("test -d")?;
        Ok(self.has_dir(path))
    }

    async fn file_exists(&self, path: &str) -> Result<bool, TransportError> {
        self.check_reachable("test -f")?;
        if let Some((status, stderr)) = self.state.lock().unwrap().file_check_failure {
            return Err(TransportError::from_status("test -f", status, stderr));
        }
        Ok(self.has_file(path))
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, TransportError> {
        self.check_reachable("run")?;
        let mut state = self.state.lock().unwrap();
        state.commands.push(command.to_string());
        state.events.push(format!("run {command}"));

        if let Some(rest) = command.strip_prefix("rm -rf ") {
            let path = unquote_args(rest).remove(0);
            remove_prefix(&mut state, &path);
            return Ok(ok(String::new()));
        }
        if let Some(rest) = command.strip_prefix("mv ") {
            if state.fail_rename {
                return Ok(CommandOutput {
                    status: 1,
                    stdout: String::new(),
                    stderr: "mv: cannot move: Disk quota exceeded".to_string(),
                });
            }
            let args = unquote_args(rest);
            move_prefix(&mut state, &args[0], &args[1]);
            return Ok(ok(String::new()));
        }
        if let Some(rest) = command.strip_prefix("cd '") {
            let base = rest.split('\'').next().unwrap_or_default().to_string();
            let listing: String = state
                .files
                .iter()
                .filter_map(|(path, body)| {
                    path.strip_prefix(&format!("{base}/"))
                        .map(|rel| format!("{} ./{rel}\n", body.len()))
                })
                .collect();
            return Ok(ok(listing));
        }
        Ok(ok(String::new()))
    }

    async fn copy(&self, local: &Path, remote: &str, recursive: bool) -> Result<(), TransportError> {
        self.check_reachable("scp")?;
        let mut state = self.state.lock().unwrap();
        state.copies.push(remote.to_string());
        state.events.push(format!("copy {remote}"));
        if state.fail_copy {
            // a partial copy leaves something behind at the destination
            state.dirs.insert(remote.to_string());
            return Err(TransportError::from_status("scp", 1, "scp: write failed: No space left"));
        }
        if recursive {
            upload_tree(&mut state, local, remote);
        } else {
            let body = std::fs::read(local).map_err(|e| TransportError::io(local.display().to_string(), e))?;
            state.files.insert(remote.to_string(), body);
        }
        Ok(())
    }
}

/// Spreadsheet tabs served from memory; unknown tabs are empty.
#[derive(Debug, Default)]
pub struct MemorySheets {
    pub tabs: HashMap<SheetId, Vec<Row>>,
    pub failing: Option<SheetId>,
}

impl MemorySheets {
    pub fn with_tab(mut self, sheet: SheetId, rows: Vec<Row>) -> Self {
        self.tabs.insert(sheet, rows);
        self
    }
}

#[async_trait]
impl SheetSource for MemorySheets {
    async fn fetch(&self, sheet: SheetId) -> Result<Vec<Row>, FetchError> {
        if self.failing == Some(sheet) {
            return Err(FetchError::HttpStatus {
                url: format!("memory://{sheet}"),
                status: 500,
            });
        }
        Ok(self.tabs.get(&sheet).cloned().unwrap_or_default())
    }
}

pub fn row(pairs: &[(&str, &str)]) -> Row {
    Row::from_pairs(pairs.iter().copied())
}

/// Writes a zip with the given entries.
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    use std::io::Write;

    let file = std::fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    for (name, body) in entries {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body).unwrap();
    }
    writer.finish().unwrap();
}
