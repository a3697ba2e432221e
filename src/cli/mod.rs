//! # CLI Module
//!
//! Command-line interface for media-dedup.
//!
//! ## Usage
//! ```bash
//! # Preview how a collection would be organized
//! media-dedup organize ~/Pictures/Import --dest ~/Pictures/Library --dry-run
//!
//! # Move files, grouping by keyword and renaming by camera
//! media-dedup organize ~/Import --dest ~/Library --action move --structure keywords --rename
//!
//! # Report duplicate groups without touching anything
//! media-dedup scan ~/Pictures --output json
//! ```

use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use media_dedup::core::catalog::DEFAULT_RATING_WEIGHT;
use media_dedup::core::grouper::HashGroup;
use media_dedup::core::metadata::exiftool::DEFAULT_TIMEOUT;
use media_dedup::core::metadata::ExifTool;
use media_dedup::core::organize::{ActionMode, DuplicateStrategy, FolderStructure, NamingScheme};
use media_dedup::core::pipeline::{
    run_stamp, CancellationToken, Pipeline, PipelineBuilder, PipelineResult, RunSnapshot,
    WorkerProfile, DEFAULT_BATCH_SIZE,
};
use media_dedup::core::ScoreWeights;
use media_dedup::error::{MediaDedupError, Result};
use media_dedup::events::{
    Event, EventChannel, EventReceiver, OrganizeEvent, PipelineEvent, ProcessEvent, ScanEvent,
};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::info;
use walkdir::WalkDir;

/// Media Dedup - organize photos and videos, set duplicates aside
#[derive(Parser, Debug)]
#[command(name = "media-dedup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Organize media into a dated destination tree
    Organize(OrganizeArgs),
    /// Report duplicate groups without touching any file
    Scan(ScanArgs),
}

/// Options shared by every subcommand that processes files
#[derive(Args, Debug)]
struct ProcessingArgs {
    /// Worker threads (overrides --profile)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Worker count preset
    #[arg(long, default_value = "fast")]
    profile: Profile,

    /// Files per batch; 1 processes each file on its own
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Score added per rating star when choosing among duplicates
    #[arg(long, default_value_t = DEFAULT_RATING_WEIGHT)]
    rating_weight: f64,

    /// Include hidden files
    #[arg(long)]
    include_hidden: bool,

    /// ExifTool executable
    #[arg(long, default_value = "exiftool")]
    exiftool: String,

    /// ExifTool time limit per file, in seconds (one call is capped at 5 minutes)
    #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout_secs: u64,

    /// Output format
    #[arg(short, long, default_value = "pretty")]
    output: OutputFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct OrganizeArgs {
    /// Directories to organize
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Destination root (optional with --action rename-only)
    #[arg(short, long)]
    dest: Option<PathBuf>,

    /// Log every action without touching any file
    #[arg(long)]
    dry_run: bool,

    /// What to do with each file
    #[arg(long, default_value = "copy")]
    action: Action,

    /// Folder layout under the destination
    #[arg(long, default_value = "simple")]
    structure: Structure,

    /// Where duplicates go
    #[arg(long, default_value = "folder")]
    duplicates: Duplicates,

    /// File naming scheme
    #[arg(long, default_value = "original")]
    naming: Naming,

    /// Shorthand for --naming camera
    #[arg(long)]
    rename: bool,

    /// Directory for orphaned .xmp sidecars [default: {dest}/XMP_Orphans]
    #[arg(long)]
    orphans: Option<PathBuf>,

    /// Also place non-media files, deduplicated by content
    #[arg(long)]
    include_other: bool,

    /// Directory for run logs and configuration snapshots
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(flatten)]
    processing: ProcessingArgs,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Directories to scan
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    #[command(flatten)]
    processing: ProcessingArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Action {
    /// Copy files, leaving the sources in place
    Copy,
    /// Move files into the destination
    Move,
    /// Rename in place; duplicates are left alone
    RenameOnly,
}

impl From<Action> for ActionMode {
    fn from(action: Action) -> Self {
        match action {
            Action::Copy => ActionMode::Copy,
            Action::Move => ActionMode::Move,
            Action::RenameOnly => ActionMode::RenameOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Structure {
    /// YYYY/MM
    Simple,
    /// Keywords/<up to 4 sorted keywords>/YYYY/MM, or No Keywords/YYYY/MM when untagged
    Keywords,
}

impl From<Structure> for FolderStructure {
    fn from(structure: Structure) -> Self {
        match structure {
            Structure::Simple => FolderStructure::Simple,
            Structure::Keywords => FolderStructure::Keywords,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Duplicates {
    /// A `duplicates` folder next to the winner
    Folder,
    /// Beside the winner
    Alongside,
    /// Leave duplicates where they are
    Skip,
    /// Organize every copy as a normal file
    Keep,
}

impl From<Duplicates> for DuplicateStrategy {
    fn from(duplicates: Duplicates) -> Self {
        match duplicates {
            Duplicates::Folder => DuplicateStrategy::Folder,
            Duplicates::Alongside => DuplicateStrategy::Alongside,
            Duplicates::Skip => DuplicateStrategy::Skip,
            Duplicates::Keep => DuplicateStrategy::Keep,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Naming {
    /// Keep the original name
    Original,
    /// YYYY-MM-DD-HHMMSS-Make-Model-<8-char hash>
    Camera,
    /// YYYY-MM-DD_HH-MM-SS_{IMG|VID}_<16-char hash>
    Content,
}

impl From<Naming> for NamingScheme {
    fn from(naming: Naming) -> Self {
        match naming {
            Naming::Original => NamingScheme::Original,
            Naming::Camera => NamingScheme::Camera,
            Naming::Content => NamingScheme::ContentAddressed,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Profile {
    Conservative,
    Balanced,
    Fast,
    Maximum,
}

impl From<Profile> for WorkerProfile {
    fn from(profile: Profile) -> Self {
        match profile {
            Profile::Conservative => WorkerProfile::Conservative,
            Profile::Balanced => WorkerProfile::Balanced,
            Profile::Fast => WorkerProfile::Fast,
            Profile::Maximum => WorkerProfile::Maximum,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Organize(args) => run_organize(args),
        Commands::Scan(args) => run_scan(args),
    }
}

impl ProcessingArgs {
    fn apply(&self, builder: PipelineBuilder) -> PipelineBuilder {
        let builder = builder
            .profile(self.profile.into())
            .batch_size(self.batch_size)
            .rating_weight(self.rating_weight)
            .include_hidden(self.include_hidden)
            .exiftool(self.exiftool.clone())
            .timeout(Duration::from_secs(self.timeout_secs));

        match self.workers {
            Some(workers) => builder.workers(workers),
            None => builder,
        }
    }
}

fn run_organize(args: OrganizeArgs) -> Result<()> {
    let action: ActionMode = args.action.into();
    if args.dest.is_none() && action != ActionMode::RenameOnly {
        return Err(MediaDedupError::Config(
            "--dest is required unless --action rename-only is used".to_string(),
        ));
    }

    let started = Local::now();
    let stamp = run_stamp(started);
    let log_dir = args.log_dir.clone().unwrap_or_else(default_log_dir);
    let log_path = media_dedup::init_logging(&log_dir, &stamp)?;

    let term = Term::stderr();
    let output = args.processing.output;
    if matches!(output, OutputFormat::Pretty) {
        print_header(&term);
    }

    let version = ExifTool::new(args.processing.exiftool.clone()).check_available()?;
    info!("Using ExifTool {}", version);

    let naming = if args.rename {
        NamingScheme::Camera
    } else {
        args.naming.into()
    };

    let mut builder = Pipeline::builder()
        .sources(args.sources.clone())
        .action(action)
        .structure(args.structure.into())
        .duplicates(args.duplicates.into())
        .naming(naming)
        .dry_run(args.dry_run)
        .include_other(args.include_other);
    if let Some(dest) = &args.dest {
        builder = builder.destination(dest);
    }
    if let Some(orphans) = &args.orphans {
        builder = builder.orphan_directory(orphans);
    }

    let token = CancellationToken::new();
    let pipeline = args
        .processing
        .apply(builder)
        .cancellation(token.clone())
        .build();

    let snapshot_path = RunSnapshot::new(pipeline.config(), started).write_to(&log_dir, &stamp)?;
    info!("Run log: {}", log_path.display());
    info!("Configuration snapshot: {}", snapshot_path.display());

    if let Some(dest) = &args.dest {
        warn_if_populated(&term, dest);
    }

    install_interrupt_handler(token)?;

    let pretty = matches!(output, OutputFormat::Pretty);
    let (sender, receiver) = EventChannel::new();
    let event_thread = spawn_progress(receiver, pretty);

    let result = pipeline.run_with_events(&sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();
    let result = result?;

    match output {
        OutputFormat::Pretty => {
            print_organize_summary(&term, &result, args.processing.verbose);
            term.write_line(&format!(
                "  {} {}",
                style("Log:").dim(),
                style(log_path.display()).dim()
            ))
            .ok();
        }
        OutputFormat::Json => print_json(&organize_json(&result, &log_path))?,
    }

    Ok(())
}

fn run_scan(args: ScanArgs) -> Result<()> {
    media_dedup::init_tracing();
    let term = Term::stderr();
    let output = args.processing.output;
    if matches!(output, OutputFormat::Pretty) {
        print_header(&term);
    }

    ExifTool::new(args.processing.exiftool.clone()).check_available()?;

    let token = CancellationToken::new();
    let pipeline = args
        .processing
        .apply(Pipeline::builder().sources(args.sources.clone()))
        .cancellation(token.clone())
        .build();
    install_interrupt_handler(token)?;

    let (sender, receiver) = EventChannel::new();
    let event_thread = spawn_progress(receiver, matches!(output, OutputFormat::Pretty));

    let result = pipeline.analyze_with_events(&sender);
    drop(sender);
    event_thread.join().ok();
    let result = result?;

    let weights = ScoreWeights {
        rating: args.processing.rating_weight,
    };
    match output {
        OutputFormat::Pretty => print_scan_results(&term, &result, &weights, args.processing.verbose),
        OutputFormat::Json => print_json(&scan_json(&result, &weights))?,
    }

    Ok(())
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("media-dedup")
}

fn install_interrupt_handler(token: CancellationToken) -> Result<()> {
    ctrlc::set_handler(move || {
        eprintln!("Interrupted, finishing in-flight work...");
        token.cancel();
    })
    .map_err(|e| MediaDedupError::Config(format!("Failed to install Ctrl-C handler: {}", e)))
}

/// Count the files already under `dest` and their total size
fn existing_contents(dest: &Path) -> (usize, u64) {
    WalkDir::new(dest)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .fold((0, 0), |(count, bytes), e| {
            let size = e.metadata().map(|m| m.len()).unwrap_or(0);
            (count + 1, bytes + size)
        })
}

fn warn_if_populated(term: &Term, dest: &Path) {
    if !dest.is_dir() {
        return;
    }
    let (count, bytes) = existing_contents(dest);
    if count > 0 {
        tracing::warn!(
            "Destination {} already holds {} file(s), {}",
            dest.display(),
            count,
            format_bytes(bytes)
        );
        term.write_line(&format!(
            "{} Destination already holds {} file(s) ({}); identical files will be left unchanged",
            style("!").yellow().bold(),
            style(count).yellow(),
            format_bytes(bytes)
        ))
        .ok();
    }
}

fn spawn_progress(receiver: EventReceiver, enabled: bool) -> thread::JoinHandle<()> {
    let progress = if enabled {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    // Handle events in a separate thread
    thread::spawn(move || {
        for event in receiver.iter() {
            let Some(ref pb) = progress else {
                continue;
            };
            match event {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => {
                    pb.set_message(format!("{}", phase));
                }
                Event::Scan(ScanEvent::Progress(p)) => {
                    pb.set_position(p.files_found as u64);
                }
                Event::Process(ProcessEvent::Started { total_files, .. }) => {
                    pb.set_length(total_files as u64);
                    pb.set_position(0);
                }
                Event::Process(ProcessEvent::Progress(p)) => {
                    pb.set_position(p.completed as u64);
                }
                Event::Process(ProcessEvent::Warning { message }) => {
                    pb.println(format!("{} {}", style("warning:").yellow(), message));
                }
                Event::Organize(OrganizeEvent::Started { total_actions }) => {
                    pb.set_length(total_actions as u64);
                    pb.set_position(0);
                }
                Event::Organize(OrganizeEvent::Progress { completed, .. }) => {
                    pb.set_position(completed as u64);
                }
                Event::Pipeline(PipelineEvent::Completed { .. }) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
    })
}

fn print_header(term: &Term) {
    term.write_line(&format!(
        "{} {}",
        style("Media Dedup").bold().cyan(),
        style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
    ))
    .ok();
    term.write_line("").ok();
}

fn print_organize_summary(term: &Term, result: &PipelineResult, verbose: bool) {
    let summary = &result.summary;

    term.write_line("").ok();
    if summary.cancelled {
        term.write_line(&format!(
            "{} Cancelled, partial results below",
            style("✗").yellow().bold()
        ))
        .ok();
    } else {
        term.write_line(&format!(
            "{} Organize Complete",
            style("✓").green().bold()
        ))
        .ok();
    }
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} media files scanned in {:.1}s",
        style(summary.files_scanned).cyan(),
        summary.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!(
        "  {} unique, {} duplicate(s) in {} group(s)",
        style(summary.unique_files).cyan(),
        style(summary.duplicate_files).cyan(),
        style(summary.duplicate_groups).cyan()
    ))
    .ok();

    let verb = if summary.dry_run { "would be placed" } else { "placed" };
    term.write_line(&format!(
        "  {} file(s) {} ({})",
        style(summary.actions_succeeded).cyan(),
        verb,
        format_bytes(result.outcome.total_size_bytes)
    ))
    .ok();

    if summary.unchanged > 0 {
        term.write_line(&format!(
            "  {} already in place",
            style(summary.unchanged).dim()
        ))
        .ok();
    }
    if summary.skipped > 0 {
        term.write_line(&format!("  {} duplicate(s) left where they are", style(summary.skipped).dim()))
            .ok();
    }
    if summary.orphans > 0 {
        term.write_line(&format!("  {} orphaned sidecar(s)", style(summary.orphans).cyan()))
            .ok();
    }
    if summary.other_files > 0 {
        term.write_line(&format!("  {} other file(s)", style(summary.other_files).cyan()))
            .ok();
    }

    let wasted: u64 = result.duplicate_groups().map(HashGroup::wasted_bytes).sum();
    if wasted > 0 {
        term.write_line(&format!(
            "  {} held by duplicates",
            style(format_bytes(wasted)).yellow()
        ))
        .ok();
    }

    print_errors(term, &result.errors, verbose);

    term.write_line("").ok();
    if summary.dry_run {
        term.write_line(&format!(
            "{}",
            style("Dry run: no files were touched. Re-run without --dry-run to apply.").dim()
        ))
        .ok();
    }
}

fn print_errors(term: &Term, errors: &[String], verbose: bool) {
    if errors.is_empty() {
        return;
    }
    term.write_line(&format!(
        "  {} error(s), see the log for details",
        style(errors.len()).red()
    ))
    .ok();

    let shown = if verbose { errors.len() } else { errors.len().min(5) };
    for error in &errors[..shown] {
        term.write_line(&format!("    {} {}", style("•").red(), error)).ok();
    }
}

fn print_scan_results(term: &Term, result: &PipelineResult, weights: &ScoreWeights, verbose: bool) {
    let summary = &result.summary;

    term.write_line("").ok();
    term.write_line(&format!("{} Scan Complete", style("✓").green().bold()))
        .ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} media files scanned in {:.1}s",
        style(summary.files_scanned).cyan(),
        summary.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!(
        "  {} duplicate groups found",
        style(summary.duplicate_groups).cyan()
    ))
    .ok();
    term.write_line(&format!(
        "  {} duplicate files",
        style(summary.duplicate_files).cyan()
    ))
    .ok();

    let savings: u64 = result.duplicate_groups().map(HashGroup::wasted_bytes).sum();
    term.write_line(&format!(
        "  {} potential space savings",
        style(format_bytes(savings)).yellow()
    ))
    .ok();
    term.write_line("").ok();

    if summary.duplicate_groups == 0 {
        term.write_line(&format!("  {} No duplicates found!", style("✓").green()))
            .ok();
    } else {
        term.write_line(&format!("{}", style("Duplicate Groups:").bold().underlined()))
            .ok();
        term.write_line("").ok();

        for (i, group) in result.duplicate_groups().enumerate() {
            let winner = group.winner(weights);
            term.write_line(&format!(
                "  {} {} ({} files, {})",
                style(format!("Group {}:", i + 1)).bold(),
                style(group.hash.prefix(12)).yellow(),
                group.members.len(),
                format_bytes(group.wasted_bytes())
            ))
            .ok();

            for member in &group.members {
                let marker = if member.path == winner.path {
                    style("★").green().to_string()
                } else {
                    style("○").dim().to_string()
                };
                term.write_line(&format!("    {} {}", marker, display_path(&member.path)))
                    .ok();
            }
            term.write_line("").ok();
        }
    }

    print_errors(term, &result.errors, verbose);

    term.write_line(&format!(
        "{}",
        style("No files were touched. The starred (★) copy is the one organize would keep.").dim()
    ))
    .ok();
}

fn group_json(group: &HashGroup, weights: &ScoreWeights) -> serde_json::Value {
    serde_json::json!({
        "id": group.id.to_string(),
        "hash": group.hash.as_str(),
        "winner": group.winner(weights).path,
        "members": group.members.iter().map(|m| &m.path).collect::<Vec<_>>(),
        "wasted_bytes": group.wasted_bytes(),
    })
}

fn scan_json(result: &PipelineResult, weights: &ScoreWeights) -> serde_json::Value {
    serde_json::json!({
        "summary": result.summary,
        "groups": result.duplicate_groups().map(|g| group_json(g, weights)).collect::<Vec<_>>(),
        "errors": result.errors,
        "warnings": result.warnings,
    })
}

fn organize_json(result: &PipelineResult, log_path: &Path) -> serde_json::Value {
    let actions: Vec<_> = result
        .plans()
        .flat_map(|plan| plan.actions())
        .map(|a| {
            serde_json::json!({
                "op": a.op.to_string(),
                "role": a.role,
                "source": a.source,
                "destination": a.destination,
                "size_bytes": a.size_bytes,
            })
        })
        .collect();

    serde_json::json!({
        "summary": result.summary,
        "actions": actions,
        "folders_created": result.outcome.folders_created,
        "total_size_bytes": result.outcome.total_size_bytes,
        "errors": result.errors,
        "warnings": result.warnings,
        "log": log_path,
    })
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| MediaDedupError::Config(format!("Failed to encode JSON output: {}", e)))?;
    println!("{}", text);
    Ok(())
}

/// Shorten paths under the home directory to `~/...`
fn display_path(path: &Path) -> String {
    dirs::home_dir()
        .and_then(|home| path.strip_prefix(home).ok().map(Path::to_path_buf))
        .map(|rest| format!("~/{}", rest.display()))
        .unwrap_or_else(|| path.display().to_string())
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
