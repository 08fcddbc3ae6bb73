use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Files that desktop operating systems drop into directories on their own.
const OS_ARTIFACTS: &[&str] = &[".DS_Store", "Thumbs.db", "ehthumbs.db", "desktop.ini"];
const TORRENT_SUFFIXES: &[&str] = &[".torrent", ".added"];

#[derive(Debug)]
pub enum Candidate {
    Torrent(PathBuf),
    /// Named explicitly but does not look like a torrent file.
    NotATorrent(PathBuf),
    Unreadable(PathBuf, io::Error),
}

/// Names in legacy encodings still match on their ASCII suffix.
fn file_name(path: &Path) -> Option<Cow<'_, str>> {
    path.file_name().map(|name| name.to_string_lossy())
}

pub fn is_os_artifact(path: &Path) -> bool {
    match file_name(path) {
        // AppleDouble resource forks
        Some(name) if name.starts_with("._") => true,
        Some(name) => OS_ARTIFACTS.iter().any(|artifact| artifact.eq_ignore_ascii_case(&name)),
        None => false,
    }
}

/// Matches `.torrent` and `.added` (as in `.torrent.added`), ignoring case.
pub fn is_torrent_name(path: &Path) -> bool {
    match file_name(path) {
        Some(name) => {
            let name = name.to_ascii_lowercase();
            TORRENT_SUFFIXES.iter().any(|suffix| name.len() > suffix.len() && name.ends_with(suffix))
        },
        None => false,
    }
}

/// Expands the inputs into the files to decode, in a stable order.
///
/// Directories are expanded one level deep and only their torrent files are
/// kept. OS artifacts are dropped wherever they appear.
pub fn collect_candidates<P: AsRef<Path>>(inputs: &[P]) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for input in inputs {
        let path = input.as_ref();
        if path.is_dir() {
            expand_directory(path, &mut candidates);
        } else if is_os_artifact(path) {
            debug!(path = %path.display(), "skipping OS artifact");
        } else if is_torrent_name(path) {
            candidates.push(Candidate::Torrent(path.to_path_buf()));
        } else {
            candidates.push(Candidate::NotATorrent(path.to_path_buf()));
        }
    }
    candidates
}

fn expand_directory(dir: &Path, candidates: &mut Vec<Candidate>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            candidates.push(Candidate::Unreadable(dir.to_path_buf(), e));
            return;
        }
    };
    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => paths.push(entry.path()),
            Err(e) => candidates.push(Candidate::Unreadable(dir.to_path_buf(), e)),
        }
    }
    paths.sort();
    for path in paths {
        if is_os_artifact(&path) {
            debug!(path = %path.display(), "skipping OS artifact");
        } else if path.is_file() && is_torrent_name(&path) {
            candidates.push(Candidate::Torrent(path));
        } else {
            debug!(path = %path.display(), "skipping directory entry that is not a torrent file");
        }
    }
}
