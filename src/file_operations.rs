use crate::config::{Config, ConfigValueError};
use crate::episode::{EpisodeIdentity, EpisodeKind};
use crate::replacements::{ExtensionSplitter, Replacements};
use crate::sanitize::FilenameSanitizer;
use crate::template::{self, Fields, Value};
use chrono::Datelike;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur during file operations
#[derive(Debug, Error)]
pub enum FileOperationError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("Invalid path: {0}")]
    InvalidPath(PathBuf),

    #[error(transparent)]
    Config(#[from] ConfigValueError),
}

/// What to do with the source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    /// Move the file, falls back to copy and remove across filesystems
    Rename,
    /// Leave the source in place
    Copy,
}

/// Represents a planned file operation (rename or copy)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOperation {
    /// Source file path
    pub source: PathBuf,
    /// Destination file path
    pub destination: PathBuf,
    pub action: FileAction,
}

impl PlannedOperation {
    /// The file already has the right name and location
    pub fn is_noop(&self) -> bool {
        self.source == self.destination
    }
}

/// Turns new filenames into destination paths
#[derive(Debug, Clone)]
pub struct OperationPlanner {
    move_files: bool,
    move_only: bool,
    lowercase_destination: bool,
    destination: String,
    destination_date: String,
    episode_single: String,
    episode_separator: String,
    action: FileAction,
    fullpath_replacements: Replacements,
    extension: ExtensionSplitter,
    sanitizer: FilenameSanitizer,
}

impl OperationPlanner {
    pub fn new(config: &Config, sanitizer: &FilenameSanitizer) -> Result<Self, ConfigValueError> {
        Ok(Self {
            move_files: config.move_files_enable,
            move_only: config.move_files_only,
            lowercase_destination: config.move_files_lowercase_destination,
            destination: config.move_files_destination.clone(),
            destination_date: config.move_files_destination_date.clone(),
            episode_single: config.episode_single.clone(),
            episode_separator: config.episode_separator.clone(),
            action: if config.copy_files {
                FileAction::Copy
            } else {
                FileAction::Rename
            },
            fullpath_replacements: Replacements::compile(
                "move_files_fullpath_replacements",
                &config.move_files_fullpath_replacements,
            )?,
            extension: ExtensionSplitter::new(&config.extension_pattern)?,
            sanitizer: sanitizer.clone(),
        })
    }

    /// Plans where the file described by `identity` ends up
    ///
    /// Without moving, the file stays in its directory under `new_name`.
    /// Relative move destinations are resolved against the source directory.
    pub fn plan_operation(
        &self,
        source: &Path,
        new_name: &str,
        identity: &EpisodeIdentity,
    ) -> Result<PlannedOperation, FileOperationError> {
        let source_dir = source
            .parent()
            .ok_or_else(|| FileOperationError::InvalidPath(source.to_path_buf()))?;

        let destination = if self.move_files {
            let directory = self.destination_directory(identity)?;
            let filename = if self.move_only {
                source
                    .file_name()
                    .ok_or_else(|| FileOperationError::InvalidPath(source.to_path_buf()))?
                    .to_string_lossy()
                    .into_owned()
            } else {
                new_name.to_string()
            };

            let full = source_dir.join(directory).join(filename);
            let full = full.to_string_lossy();
            PathBuf::from(self.fullpath_replacements.apply(&full, &self.extension))
        } else {
            source_dir.join(new_name)
        };

        debug!(
            source = %source.display(),
            destination = %destination.display(),
            "Planned operation"
        );

        Ok(PlannedOperation {
            source: source.to_path_buf(),
            destination,
            action: self.action,
        })
    }

    /// Renders the move destination template for `identity`
    fn destination_directory(
        &self,
        identity: &EpisodeIdentity,
    ) -> Result<PathBuf, ConfigValueError> {
        let mut fields = Fields::new();
        let safe = |text: &str| Value::from(self.sanitizer.make_valid(text));

        fields.insert("seriesname".to_string(), safe(&identity.series_name));
        fields.insert("originalfilename".to_string(), safe(&identity.original_filename()));

        let destination_template = match &identity.kind {
            EpisodeKind::Dated { dates } => {
                if let Some(date) = dates.first() {
                    fields.insert("year".to_string(), Value::Number(i64::from(date.year())));
                    fields.insert("month".to_string(), Value::from(date.month()));
                    fields.insert("day".to_string(), Value::from(date.day()));
                }
                let formatted: Vec<String> =
                    dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();
                fields.insert(
                    "episodenumbers".to_string(),
                    formatted.join(&self.episode_separator).into(),
                );
                &self.destination_date
            }
            kind => {
                if let EpisodeKind::Seasoned { season, .. } = kind {
                    fields.insert("seasonnumber".to_string(), Value::from(*season));
                }
                let formatted = identity
                    .episode_numbers()
                    .iter()
                    .map(|&n| template::format_number(&self.episode_single, i64::from(n)))
                    .collect::<Result<Vec<_>, _>>()?;
                fields.insert(
                    "episodenumbers".to_string(),
                    formatted.join(&self.episode_separator).into(),
                );
                &self.destination
            }
        };

        let mut directory = template::render(destination_template, &fields)?;
        if self.lowercase_destination {
            directory = directory.to_lowercase();
        }

        Ok(PathBuf::from(directory))
    }
}

/// Executes a planned operation
///
/// Parent directories of the destination are created. An existing destination
/// is only replaced when `overwrite` is set.
pub fn execute(operation: &PlannedOperation, overwrite: bool) -> Result<(), FileOperationError> {
    if operation.is_noop() {
        return Ok(());
    }

    if operation.destination.exists() && !overwrite {
        return Err(FileOperationError::DestinationExists(
            operation.destination.clone(),
        ));
    }

    if let Some(parent) = operation.destination.parent() {
        fs::create_dir_all(parent)?;
    }

    match operation.action {
        FileAction::Copy => {
            fs::copy(&operation.source, &operation.destination)?;
        }
        FileAction::Rename => match fs::rename(&operation.source, &operation.destination) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                debug!("Rename across filesystems, copying instead");
                fs::copy(&operation.source, &operation.destination)?;
                fs::remove_file(&operation.source)?;
            }
            Err(e) => return Err(e.into()),
        },
    }

    info!(
        source = %operation.source.display(),
        destination = %operation.destination.display(),
        "File processed"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitize::Platform;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn sanitizer() -> FilenameSanitizer {
        FilenameSanitizer::new(
            Platform::Unix,
            ExtensionSplitter::new(r"(\.[a-zA-Z0-9]+)$").unwrap(),
        )
    }

    fn identity(source: &Path, kind: EpisodeKind) -> EpisodeIdentity {
        EpisodeIdentity {
            series_name: "Scrubs".to_string(),
            series_id: None,
            kind,
            episode_name: None,
            original_path: source.to_path_buf(),
            extension: ".avi".to_string(),
            extra: BTreeMap::new(),
        }
    }

    fn seasoned() -> EpisodeKind {
        EpisodeKind::Seasoned {
            season: 1,
            episodes: vec![1],
        }
    }

    fn planner(json: &str) -> OperationPlanner {
        OperationPlanner::new(&Config::from_json(json).unwrap(), &sanitizer()).unwrap()
    }

    #[test]
    fn test_rename_in_place() {
        let source = Path::new("/tv/scrubs.s01e01.avi");
        let op = planner("{}")
            .plan_operation(source, "Scrubs - [01x01].avi", &identity(source, seasoned()))
            .unwrap();

        assert_eq!(op.destination, PathBuf::from("/tv/Scrubs - [01x01].avi"));
        assert_eq!(op.action, FileAction::Rename);
        assert!(!op.is_noop());
    }

    #[test]
    fn test_move_destination_template() {
        let source = Path::new("/downloads/scrubs.s01e01.avi");
        let op = planner(
            r#"{"move_files_enable": true,
                "move_files_destination": "/tv/%(seriesname)s/Season %(seasonnumber)d",
                "move_files_lowercase_destination": true}"#,
        )
        .plan_operation(source, "Scrubs - [01x01].avi", &identity(source, seasoned()))
        .unwrap();

        assert_eq!(op.destination, PathBuf::from("/tv/scrubs/season 1/Scrubs - [01x01].avi"));
    }

    #[test]
    fn test_move_only_keeps_original_name() {
        let source = Path::new("/downloads/scrubs.s01e01.avi");
        let op = planner(
            r#"{"move_files_enable": true, "move_files_only": true,
                "move_files_destination": "sorted/%(seriesname)s"}"#,
        )
        .plan_operation(source, "Scrubs - [01x01].avi", &identity(source, seasoned()))
        .unwrap();

        assert_eq!(op.destination, PathBuf::from("/downloads/sorted/Scrubs/scrubs.s01e01.avi"));
    }

    #[test]
    fn test_dated_destination() {
        let source = Path::new("/downloads/show.2010.01.02.avi");
        let kind = EpisodeKind::Dated {
            dates: vec![NaiveDate::from_ymd_opt(2010, 1, 2).unwrap()],
        };
        let op = planner(
            r#"{"move_files_enable": true,
                "move_files_destination_date": "/tv/%(seriesname)s/%(year)d/%(month)02d"}"#,
        )
        .plan_operation(source, "Scrubs - [2010-01-02].avi", &identity(source, kind))
        .unwrap();

        assert_eq!(op.destination, PathBuf::from("/tv/Scrubs/2010/01/Scrubs - [2010-01-02].avi"));
    }

    #[test]
    fn test_fullpath_replacements() {
        let source = Path::new("/downloads/scrubs.s01e01.avi");
        let op = planner(
            r#"{"move_files_enable": true,
                "move_files_destination": "/tv/%(seriesname)s",
                "move_files_fullpath_replacements": [
                    {"match": "/tv/", "replacement": "/media/tv/"}
                ]}"#,
        )
        .plan_operation(source, "Scrubs - [01x01].avi", &identity(source, seasoned()))
        .unwrap();

        assert_eq!(op.destination, PathBuf::from("/media/tv/Scrubs/Scrubs - [01x01].avi"));
    }

    #[test]
    fn test_copy_action() {
        let source = Path::new("/tv/a.avi");
        let op = planner(r#"{"copy_files": true}"#)
            .plan_operation(source, "b.avi", &identity(source, seasoned()))
            .unwrap();
        assert_eq!(op.action, FileAction::Copy);
    }

    #[test]
    fn test_execute_rename_and_copy() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.avi");
        fs::write(&source, "video").unwrap();

        let copy = PlannedOperation {
            source: source.clone(),
            destination: dir.path().join("copies/b.avi"),
            action: FileAction::Copy,
        };
        execute(&copy, false).unwrap();
        assert!(source.exists());
        assert_eq!(fs::read_to_string(&copy.destination).unwrap(), "video");

        let rename = PlannedOperation {
            source: source.clone(),
            destination: dir.path().join("c.avi"),
            action: FileAction::Rename,
        };
        execute(&rename, false).unwrap();
        assert!(!source.exists());
        assert!(rename.destination.exists());
    }

    #[test]
    fn test_existing_destination_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.avi");
        let destination = dir.path().join("b.avi");
        fs::write(&source, "new").unwrap();
        fs::write(&destination, "old").unwrap();

        let op = PlannedOperation {
            source: source.clone(),
            destination: destination.clone(),
            action: FileAction::Rename,
        };
        assert!(matches!(
            execute(&op, false),
            Err(FileOperationError::DestinationExists(_))
        ));
        assert_eq!(fs::read_to_string(&destination).unwrap(), "old");

        execute(&op, true).unwrap();
        assert_eq!(fs::read_to_string(&destination).unwrap(), "new");
    }

    #[test]
    fn test_noop_is_not_executed() {
        let op = PlannedOperation {
            source: PathBuf::from("/does/not/exist.avi"),
            destination: PathBuf::from("/does/not/exist.avi"),
            action: FileAction::Rename,
        };
        assert!(op.is_noop());
        execute(&op, false).unwrap();
    }
}
