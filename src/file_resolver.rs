//! File resolver module for collecting episode files
//!
//! This module expands the paths given on the command line into the list of
//! files to rename. Directories are scanned (optionally recursively), files
//! are filtered by extension and by the configured blacklist.

use crate::config::{BlacklistEntry, Config, ConfigValueError};
use crate::replacements::compile_regex;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during file resolution
#[derive(Debug, Error)]
pub enum FileResolverError {
    /// Path does not exist
    #[error("Path does not exist: {0}")]
    InvalidPath(PathBuf),

    /// Failed to read directory
    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed { path: PathBuf, source: io::Error },

    /// Failed to read directory entry
    #[error("Failed to read directory entry: {0}")]
    ReadEntryFailed(#[from] io::Error),

    /// A blacklist pattern is invalid
    #[error(transparent)]
    Config(#[from] ConfigValueError),
}

#[derive(Debug)]
enum BlacklistMatcher {
    Literal { name: String, full_path: bool },
    Regex { regex: Regex, full_path: bool },
}

impl BlacklistMatcher {
    fn compile(entry: &BlacklistEntry) -> Result<Self, ConfigValueError> {
        Ok(match entry {
            BlacklistEntry::Literal(name) => BlacklistMatcher::Literal {
                name: name.clone(),
                full_path: false,
            },
            BlacklistEntry::Pattern {
                pattern,
                is_regex: false,
                full_path,
            } => BlacklistMatcher::Literal {
                name: pattern.clone(),
                full_path: *full_path,
            },
            BlacklistEntry::Pattern {
                pattern,
                is_regex: true,
                full_path,
            } => BlacklistMatcher::Regex {
                regex: compile_regex("filename_blacklist", &format!("^(?:{pattern})"))?,
                full_path: *full_path,
            },
        })
    }

    fn matches(&self, path: &Path) -> bool {
        let subject = |full_path: bool| {
            if full_path {
                path.to_string_lossy().into_owned()
            } else {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            }
        };

        match self {
            BlacklistMatcher::Literal { name, full_path } => subject(*full_path) == *name,
            BlacklistMatcher::Regex { regex, full_path } => regex.is_match(&subject(*full_path)),
        }
    }
}

/// Decides which files are considered for renaming
#[derive(Debug)]
pub struct FileFilter {
    valid_extensions: Vec<String>,
    blacklist: Vec<BlacklistMatcher>,
    recursive: bool,
}

impl FileFilter {
    pub fn new(config: &Config) -> Result<Self, ConfigValueError> {
        Ok(Self {
            valid_extensions: config
                .valid_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            blacklist: config
                .filename_blacklist
                .iter()
                .map(BlacklistMatcher::compile)
                .collect::<Result<_, _>>()?,
            recursive: config.recursive,
        })
    }

    /// Whether `path` passes the extension whitelist and the blacklist
    pub fn accepts(&self, path: &Path) -> bool {
        if !self.valid_extensions.is_empty() {
            let extension = path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            if !self.valid_extensions.contains(&extension) {
                return false;
            }
        }

        !self.blacklist.iter().any(|entry| entry.matches(path))
    }
}

/// Expands files and directories into the sorted list of files to process
///
/// Directories are scanned one level deep, or completely when the filter is
/// recursive. Hidden entries inside directories are skipped.
///
/// # Returns
///
/// The accepted files without duplicates, or `InvalidPath` for the first
/// path that does not exist.
pub fn find_files(
    paths: &[PathBuf],
    filter: &FileFilter,
) -> Result<Vec<PathBuf>, FileResolverError> {
    let mut files = BTreeSet::new();

    for path in paths {
        if path.is_dir() {
            scan_directory(path, filter, &mut files)?;
        } else if path.is_file() {
            if filter.accepts(path) {
                files.insert(path.clone());
            }
        } else {
            return Err(FileResolverError::InvalidPath(path.clone()));
        }
    }

    debug!(count = files.len(), "Collected files");
    Ok(files.into_iter().collect())
}

/// Scans a directory and collects accepted files
fn scan_directory(
    dir_path: &Path,
    filter: &FileFilter,
    files: &mut BTreeSet<PathBuf>,
) -> Result<(), FileResolverError> {
    for entry in fs::read_dir(dir_path).map_err(|e| FileResolverError::ReadDirectoryFailed {
        path: dir_path.to_path_buf(),
        source: e,
    })? {
        let entry = entry?;
        let path = entry.path();

        if is_hidden(&path) {
            continue;
        }

        if path.is_dir() {
            if filter.recursive {
                scan_directory(&path, filter, files)?;
            }
        } else if path.is_file() && filter.accepts(&path) {
            files.insert(path);
        }
    }

    Ok(())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}
