//! tvrename - Rename tv series episode files using episode metadata
//!
//! This library extracts series, season and episode numbers from free-form
//! filenames, looks the episodes up with a metadata provider and renders new
//! filenames from configurable templates.

mod cache;
mod config;
mod episode;
mod file_operations;
mod file_resolver;
mod metadata_retrieval;
mod multi_episode;
mod parser;
mod patterns;
mod replacements;
mod sanitize;
mod synthesizer;
mod template;

// Re-export error types
pub use cache::CacheError;
pub use config::ConfigValueError;
pub use file_operations::FileOperationError;
pub use file_resolver::FileResolverError;
pub use metadata_retrieval::MetadataRetrievalError;
pub use parser::ParseError;

pub use cache::CacheStorage;
pub use config::{BlacklistEntry, Config, ReplacementRuleConfig, SeriesTarget};
pub use episode::{EpisodeIdentity, EpisodeKind, EpisodeName, EpisodeOrdinal};
pub use file_operations::{FileAction, OperationPlanner, PlannedOperation, execute};
pub use file_resolver::{FileFilter, find_files};
pub use metadata_retrieval::{
    CachedMetadataProvider, Episode, MetadataProvider, Season, SeriesQuery, TVSeries,
    TvMazeProvider,
};
pub use multi_episode::aggregate_names;
pub use parser::{FilenameParser, clean_series_name, expand_year};
pub use patterns::{
    DEFAULT_PATTERNS, EpisodeNumbering, EpisodePattern, EpisodeShape, PatternLibrary,
};
pub use replacements::{ExtensionSplitter, Replacements};
pub use sanitize::{FilenameSanitizer, Platform, strip_accents};
pub use synthesizer::{NameSynthesizer, title_case};

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Progress event emitted during a batch run
///
/// These events allow library users to track progress and provide feedback
/// while files are processed.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Batch started
    Started { file_count: usize },

    /// A filename matched none of the patterns
    ParseFailed { path: PathBuf, error: String },

    /// All filenames have been parsed
    Parsed { valid: usize, invalid: usize },

    /// Processing a specific file
    ProcessingFile {
        index: usize,
        total: usize,
        path: PathBuf,
        series_name: String,
    },

    /// The metadata lookup failed, `partial` lookups still rename the file
    LookupFailed {
        path: PathBuf,
        error: String,
        partial: bool,
    },

    /// The file already has the right name
    AlreadyNamed { path: PathBuf },

    /// The file would be renamed, nothing was changed
    DryRun { operation: PlannedOperation },

    /// The user skipped the file
    Skipped { path: PathBuf },

    /// The file was renamed, moved or copied
    Renamed { operation: PlannedOperation },

    /// The rename operation failed
    OperationFailed { path: PathBuf, error: String },

    /// Batch complete
    Complete { summary: BatchSummary },
}

/// Answer of the confirmation callback for one planned operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Apply,
    Skip,
    /// Stop the whole run, already processed files stay renamed
    Abort,
}

/// Outcome counts of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub renamed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub already_correct: usize,
    pub unparsed: usize,
    pub dry_run: usize,
}

/// Top-level error type for tvrename operations
#[derive(Debug, Error)]
pub enum TvRenameError {
    /// A path given by the user does not exist
    #[error("Path does not exist: {0}")]
    InvalidPath(PathBuf),

    /// None of the files could be parsed
    #[error("None of the files could be parsed")]
    NoValidFiles,

    /// The user stopped the run
    #[error("Aborted by user")]
    UserAbort,

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigValueError),

    /// Error during file resolution
    #[error("File resolution error: {0}")]
    FileResolver(#[from] FileResolverError),

    /// Error during metadata retrieval
    #[error("Metadata retrieval error: {0}")]
    MetadataRetrieval(#[from] MetadataRetrievalError),

    /// Error during file operations
    #[error("File operation error: {0}")]
    FileOperation(#[from] FileOperationError),

    /// Error during cache operations
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// The configured parsing, naming and planning pipeline
#[derive(Debug)]
pub struct Renamer {
    config: Config,
    parser: FilenameParser,
    synthesizer: NameSynthesizer,
    planner: OperationPlanner,
}

impl Renamer {
    /// Compiles all patterns, replacements and templates of `config`
    pub fn new(config: Config) -> Result<Self, ConfigValueError> {
        let parser = FilenameParser::new(&config)?;
        let synthesizer = NameSynthesizer::new(&config)?;
        let planner = OperationPlanner::new(&config, synthesizer.sanitizer())?;

        Ok(Self {
            config,
            parser,
            synthesizer,
            planner,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn parse(&self, path: &Path) -> Result<EpisodeIdentity, ParseError> {
        self.parser.parse(path)
    }

    /// Looks the episode up and applies the result to `identity`
    pub fn lookup<P>(
        &self,
        identity: &mut EpisodeIdentity,
        provider: &P,
    ) -> Result<(), MetadataRetrievalError>
    where
        P: MetadataProvider + ?Sized,
    {
        let query = identity.lookup_query(&self.config);
        let series = provider.fetch_series(&query, &self.config.language)?;
        identity.apply_lookup(&series, &self.config.output_series_replacements)
    }

    /// Renders the new filename, without output replacements or sanitizing
    pub fn preview_name(&self, identity: &EpisodeIdentity) -> Result<String, ConfigValueError> {
        self.synthesizer.preview(identity)
    }

    /// Renders the final new filename
    pub fn new_name(&self, identity: &EpisodeIdentity) -> Result<String, ConfigValueError> {
        self.synthesizer.render(identity)
    }

    pub fn plan(
        &self,
        identity: &EpisodeIdentity,
        new_name: &str,
    ) -> Result<PlannedOperation, FileOperationError> {
        self.planner
            .plan_operation(&identity.original_path, new_name, identity)
    }
}

/// Collects the files to process from files and directories
pub fn collect_files(paths: &[PathBuf], config: &Config) -> Result<Vec<PathBuf>, TvRenameError> {
    let filter = FileFilter::new(config)?;
    find_files(paths, &filter).map_err(|e| match e {
        FileResolverError::InvalidPath(path) => TvRenameError::InvalidPath(path),
        other => other.into(),
    })
}

/// Renames a batch of files, one file at a time
///
/// All files are parsed first; unparsable files are reported and left alone.
/// The parsed episodes are processed in series, season and episode order:
/// lookup, name rendering, planning, confirmation and execution.
///
/// # Arguments
///
/// * `files` - The files to rename
/// * `renamer` - The configured pipeline
/// * `provider` - Metadata provider used for the episode lookup
/// * `confirm` - Decides for each planned operation whether it is applied
/// * `progress_callback` - Closure called with progress events
///
/// # Returns
///
/// The outcome counts, `NoValidFiles` if no file could be parsed or
/// `UserAbort` if `confirm` aborted the run.
///
/// # Examples
///
/// ```no_run
/// use tvrename::{Config, Decision, Renamer, TvMazeProvider, run_batch};
/// use std::path::PathBuf;
///
/// let renamer = Renamer::new(Config::default()).unwrap();
/// let summary = run_batch(
///     &[PathBuf::from("scrubs.s01e01.avi")],
///     &renamer,
///     &TvMazeProvider::new(),
///     |_, _| Decision::Apply,
///     |_| {},
/// )
/// .unwrap();
/// println!("Renamed {} file(s)", summary.renamed);
/// ```
pub fn run_batch<P, C, F>(
    files: &[PathBuf],
    renamer: &Renamer,
    provider: &P,
    mut confirm: C,
    mut progress_callback: F,
) -> Result<BatchSummary, TvRenameError>
where
    P: MetadataProvider + ?Sized,
    C: FnMut(&EpisodeIdentity, &PlannedOperation) -> Decision,
    F: FnMut(ProgressEvent),
{
    let config = renamer.config();
    let mut summary = BatchSummary::default();

    progress_callback(ProgressEvent::Started {
        file_count: files.len(),
    });

    let mut episodes = Vec::new();
    for path in files {
        match renamer.parse(path) {
            Ok(identity) => episodes.push(identity),
            Err(ParseError::Config(e)) => return Err(e.into()),
            Err(e @ ParseError::InvalidFilename { .. }) => {
                summary.unparsed += 1;
                progress_callback(ProgressEvent::ParseFailed {
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    progress_callback(ProgressEvent::Parsed {
        valid: episodes.len(),
        invalid: summary.unparsed,
    });

    if episodes.is_empty() {
        return Err(TvRenameError::NoValidFiles);
    }

    episodes.sort_by_cached_key(EpisodeIdentity::sort_key);

    let total = episodes.len();
    for (index, mut identity) in episodes.into_iter().enumerate() {
        progress_callback(ProgressEvent::ProcessingFile {
            index,
            total,
            path: identity.original_path.clone(),
            series_name: identity.series_name.clone(),
        });

        let identified = !identity.series_name.is_empty()
            || identity.series_id.is_some()
            || config.force_name.is_some()
            || config.series_id.is_some();
        if !identified {
            warn!(file = %identity.original_path.display(), "No series name in filename, skipping");
            summary.failed += 1;
            progress_callback(ProgressEvent::LookupFailed {
                path: identity.original_path.clone(),
                error: "Could not determine series name".to_string(),
                partial: false,
            });
            continue;
        }

        match renamer.lookup(&mut identity, provider) {
            Ok(()) => {}
            Err(MetadataRetrievalError::UserAbort) => return Err(TvRenameError::UserAbort),
            Err(e) => {
                let partial = e.is_partial();
                warn!(
                    file = %identity.original_path.display(),
                    error = %e,
                    "Episode lookup failed"
                );
                progress_callback(ProgressEvent::LookupFailed {
                    path: identity.original_path.clone(),
                    error: e.to_string(),
                    partial,
                });

                if !partial && config.skip_file_on_error {
                    summary.failed += 1;
                    continue;
                }
            }
        }

        let new_name = renamer.new_name(&identity)?;
        let operation = match renamer.plan(&identity, &new_name) {
            Ok(operation) => operation,
            Err(FileOperationError::Config(e)) => return Err(e.into()),
            Err(e) => {
                summary.failed += 1;
                progress_callback(ProgressEvent::OperationFailed {
                    path: identity.original_path.clone(),
                    error: e.to_string(),
                });
                continue;
            }
        };

        if operation.is_noop() {
            summary.already_correct += 1;
            progress_callback(ProgressEvent::AlreadyNamed {
                path: operation.source,
            });
            continue;
        }

        if config.dry_run {
            summary.dry_run += 1;
            progress_callback(ProgressEvent::DryRun { operation });
            continue;
        }

        match confirm(&identity, &operation) {
            Decision::Abort => return Err(TvRenameError::UserAbort),
            Decision::Skip => {
                summary.skipped += 1;
                progress_callback(ProgressEvent::Skipped {
                    path: operation.source,
                });
            }
            Decision::Apply => {
                match file_operations::execute(&operation, config.overwrite_destination_on_rename)
                {
                    Ok(()) => {
                        summary.renamed += 1;
                        progress_callback(ProgressEvent::Renamed { operation });
                    }
                    Err(e) => {
                        summary.failed += 1;
                        progress_callback(ProgressEvent::OperationFailed {
                            path: operation.source,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    info!(?summary, "Batch complete");
    progress_callback(ProgressEvent::Complete {
        summary: summary.clone(),
    });

    Ok(summary)
}
