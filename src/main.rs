use clap::{ArgAction, Parser};
use dialoguer::Select;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tvrename::{
    CacheStorage, CachedMetadataProvider, Config, Decision, EpisodeIdentity, FileAction,
    PlannedOperation, ProgressEvent, Renamer, TvMazeProvider, TvRenameError, collect_files,
    run_batch,
};

/// Metadata older than this is fetched again
const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Parser, Debug)]
#[command(name = "tvrename")]
#[command(about = "Rename tv series episode files using episode metadata", long_about = None)]
#[command(version)]
struct Cli {
    /// Files or directories to process
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rename without asking for confirmation
    #[arg(short, long)]
    batch: bool,

    /// Only show what would be renamed
    #[arg(long)]
    dry_run: bool,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// Use this series name for every lookup
    #[arg(short, long)]
    name: Option<String>,

    /// Use this series id for every lookup
    #[arg(long)]
    series_id: Option<u64>,

    /// Move renamed files into this directory (may contain name fields)
    #[arg(short, long)]
    move_to: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply_to(&self, config: &mut Config) {
        config.batch |= self.batch;
        config.dry_run |= self.dry_run;
        config.recursive |= self.recursive;
        if let Some(name) = &self.name {
            config.force_name = Some(name.clone());
        }
        if let Some(id) = self.series_id {
            config.series_id = Some(id);
        }
        if let Some(destination) = &self.move_to {
            config.move_files_enable = true;
            config.move_files_destination = destination.clone();
        }
    }
}

/// Asks on the console whether to apply each operation
///
/// Answering "Always" applies this and every following operation.
struct ConsoleConfirmer {
    always: bool,
}

impl ConsoleConfirmer {
    fn decide(&mut self, _identity: &EpisodeIdentity, operation: &PlannedOperation) -> Decision {
        if self.always {
            return Decision::Apply;
        }

        let items = ["Yes", "No", "Always", "Quit"];
        let answer = Select::new()
            .with_prompt(format!("  {} '{}'?", verb(operation), file_name(&operation.destination)))
            .items(&items)
            .default(0)
            .interact();

        match answer {
            Ok(0) => Decision::Apply,
            Ok(1) => Decision::Skip,
            Ok(2) => {
                self.always = true;
                Decision::Apply
            }
            Ok(_) => Decision::Abort,
            Err(e) => {
                eprintln!("  Failed to read answer: {}", e);
                Decision::Abort
            }
        }
    }
}

fn verb(operation: &PlannedOperation) -> &'static str {
    match operation.action {
        FileAction::Rename => "Rename to",
        FileAction::Copy => "Copy to",
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Handles progress events and prints formatted output to stdout
fn handle_progress_event(event: ProgressEvent) {
    match event {
        ProgressEvent::Started { file_count } => {
            println!("Found {} file(s)", file_count);
        }
        ProgressEvent::ParseFailed { path, .. } => {
            println!("  Could not parse: {}", path.display());
        }
        ProgressEvent::Parsed { valid, invalid } => {
            println!("Parsed {} episode(s), {} invalid\n", valid, invalid);
        }
        ProgressEvent::ProcessingFile {
            index,
            total,
            path,
            series_name,
        } => {
            println!(
                "[{}/{}] {} ({})",
                index + 1,
                total,
                file_name(&path),
                series_name
            );
        }
        ProgressEvent::LookupFailed { error, partial, .. } => {
            if partial {
                println!("  {} (renaming without episode name)", error);
            } else {
                println!("  {}", error);
            }
        }
        ProgressEvent::AlreadyNamed { .. } => {
            println!("  Already correctly named");
        }
        ProgressEvent::DryRun { operation } => {
            println!("  Would {}", describe(&operation));
        }
        ProgressEvent::Skipped { .. } => {
            println!("  Skipped");
        }
        ProgressEvent::Renamed { operation } => {
            println!("  Done: {}", describe(&operation));
        }
        ProgressEvent::OperationFailed { error, .. } => {
            println!("  Failed: {}", error);
        }
        ProgressEvent::Complete { summary } => {
            println!(
                "\nComplete! {} renamed, {} skipped, {} failed, {} already correct.",
                summary.renamed, summary.skipped, summary.failed, summary.already_correct
            );
            if summary.dry_run > 0 {
                println!("Dry run: {} file(s) would have been renamed.", summary.dry_run);
            }
        }
    }
}

fn describe(operation: &PlannedOperation) -> String {
    let action = match operation.action {
        FileAction::Rename => "rename",
        FileAction::Copy => "copy",
    };
    format!(
        "{} {} -> {}",
        action,
        operation.source.display(),
        operation.destination.display()
    )
}

fn run(cli: &Cli) -> Result<(), TvRenameError> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };
    cli.apply_to(&mut config);

    let files = collect_files(&cli.paths, &config)?;
    let mut confirmer = ConsoleConfirmer {
        always: config.batch || config.always_rename,
    };
    let renamer = Renamer::new(config)?;

    let cache = CacheStorage::open("metadata", Some(CACHE_TTL))?;
    let provider = CachedMetadataProvider::new(TvMazeProvider::new(), cache);

    run_batch(
        &files,
        &renamer,
        &provider,
        |identity, operation| confirmer.decide(identity, operation),
        handle_progress_event,
    )?;

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        match cli.verbose {
            0 => "tvrename=warn",
            1 => "tvrename=debug",
            _ => "tvrename=trace",
        }
        .to_string()
    });
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("\nError: {}", e);
        process::exit(1);
    }
}
