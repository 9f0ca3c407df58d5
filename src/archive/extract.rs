//! Zip extraction with top-level folder unwrapping.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};
use zip::ZipArchive;

use super::constants::JUNK_PREFIX;
use super::error::ArchiveError;

/// One archive member to extract.
struct Member {
    index: usize,
    path: PathBuf,
    is_dir: bool,
}

/// How the members map onto the destination folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// All members sit inside one folder, which is stripped.
    Unwrap(String),
    /// Members keep their paths.
    Verbatim,
}

/// Decides the layout from member paths (relative, junk already removed).
///
/// A single root folder and no root files unwraps; anything else is verbatim.
#[must_use]
pub fn plan_layout<'a>(members: impl IntoIterator<Item = (&'a Path, bool)>) -> Layout {
    let mut root_files = 0usize;
    let mut root_folders: BTreeSet<String> = BTreeSet::new();

    for (path, is_dir) in members {
        let mut components = path.components().filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        });
        let Some(first) = components.next() else {
            continue;
        };
        if components.next().is_some() || is_dir {
            root_folders.insert(first);
        } else {
            root_files += 1;
        }
    }

    match (root_files, root_folders.len()) {
        (0, 1) => root_folders
            .into_iter()
            .next()
            .map_or(Layout::Verbatim, Layout::Unwrap),
        _ => Layout::Verbatim,
    }
}

/// Folder an archive extracts into: its path with the extension removed.
///
/// # Errors
///
/// Returns [`ArchiveError::NoStem`] when the path has no file stem.
pub fn destination_for(archive_path: &Path) -> Result<PathBuf, ArchiveError> {
    let stem = archive_path
        .file_stem()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ArchiveError::NoStem {
            path: archive_path.to_path_buf(),
        })?;
    Ok(archive_path.with_file_name(stem))
}

/// Extracts a zip archive next to itself and deletes the archive.
///
/// If the destination folder already exists nothing is extracted and the
/// folder is returned as is. Entries under `__MACOSX/` are ignored. A
/// partially written destination is removed on failure and the archive is
/// kept.
///
/// This is blocking; async callers go through
/// [`ArchivePipeline::extract`](super::ArchivePipeline::extract).
///
/// # Errors
///
/// Returns [`ArchiveError`] if the archive cannot be read or written out.
pub fn extract_archive(archive_path: &Path) -> Result<PathBuf, ArchiveError> {
    let destination = destination_for(archive_path)?;
    if destination.is_dir() {
        debug!(folder = %destination.display(), "already extracted");
        return Ok(destination);
    }

    if let Err(e) = extract_into(archive_path, &destination) {
        let _ = std::fs::remove_dir_all(&destination);
        return Err(e);
    }

    std::fs::remove_file(archive_path).map_err(|e| ArchiveError::io(archive_path, e))?;
    Ok(destination)
}

fn extract_into(archive_path: &Path, destination: &Path) -> Result<(), ArchiveError> {
    let file = File::open(archive_path).map_err(|e| ArchiveError::io(archive_path, e))?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|e| ArchiveError::zip(archive_path, e))?;

    let mut members = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .map_err(|e| ArchiveError::zip(archive_path, e))?;
        if entry.name().starts_with(JUNK_PREFIX) {
            continue;
        }
        let Some(path) = entry.enclosed_name() else {
            debug!(name = %entry.name(), "skipping unsafe archive entry");
            continue;
        };
        members.push(Member {
            index,
            path: PathBuf::from(path),
            is_dir: entry.is_dir(),
        });
    }

    let layout = plan_layout(members.iter().map(|m| (m.path.as_path(), m.is_dir)));
    std::fs::create_dir_all(destination).map_err(|e| ArchiveError::io(destination, e))?;

    let mut written = 0usize;
    for member in &members {
        let relative = match &layout {
            Layout::Unwrap(root) => match member.path.strip_prefix(root) {
                Ok(rest) => rest.to_path_buf(),
                Err(_) => member.path.clone(),
            },
            Layout::Verbatim => member.path.clone(),
        };
        if relative.as_os_str().is_empty() {
            continue;
        }

        let out_path = destination.join(&relative);
        if member.is_dir {
            std::fs::create_dir_all(&out_path).map_err(|e| ArchiveError::io(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ArchiveError::io(parent, e))?;
        }
        let mut entry = archive
            .by_index(member.index)
            .map_err(|e| ArchiveError::zip(archive_path, e))?;
        let mut out_file = File::create(&out_path).map_err(|e| ArchiveError::io(&out_path, e))?;
        std::io::copy(&mut entry, &mut out_file).map_err(|e| ArchiveError::io(&out_path, e))?;
        written += 1;
    }

    info!(
        archive = %archive_path.display(),
        files = written,
        unwrapped = matches!(layout, Layout::Unwrap(_)),
        "archive extracted"
    );
    Ok(())
}
