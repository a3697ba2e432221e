//! Pipeline execution implementation.

use super::config::{PipelineConfig, WorkerProfile};
use crate::core::catalog::{CatalogEntry, NonMediaEntry};
use crate::core::grouper::{group_by_hash, HashGroup, PairingMap};
use crate::core::hasher::hash_file;
use crate::core::metadata::{ExifTool, MetadataReader};
use crate::core::organize::{
    ActionMode, DuplicateStrategy, FolderStructure, NamingScheme, OrganizeExecutor, OrganizeOptions,
    OrganizePlan, OrganizePlanner, OrganizeResult,
};
use crate::core::scanner::{LooseFile, MediaFile, MediaScanner, ScanConfig, ScanResult, WalkDirScanner};
use crate::error::MediaDedupError;
use crate::events::{
    null_sender, Event, EventSender, GroupEvent, OrganizeEvent, PipelineEvent, PipelinePhase,
    PipelineSummary, ProcessEvent, ProcessProgress,
};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Cooperative cancellation flag shared between the pipeline and whoever
/// wants to stop it (a Ctrl-C handler, a test).
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Result of pipeline execution
#[derive(Debug, Default)]
pub struct PipelineResult {
    /// Content-hash groups, singletons included
    pub groups: Vec<HashGroup>,
    /// RAW+JPEG links
    pub pairs: PairingMap,
    /// Hashed non-media files (only with `include_other`)
    pub non_media: Vec<NonMediaEntry>,
    /// Media placement plan
    pub plan: Option<OrganizePlan>,
    /// Orphaned sidecar plan
    pub orphan_plan: Option<OrganizePlan>,
    /// Non-media placement plan
    pub non_media_plan: Option<OrganizePlan>,
    /// Combined outcome of every executed plan
    pub outcome: OrganizeResult,
    pub summary: PipelineSummary,
    /// Non-fatal errors, one line each
    pub errors: Vec<String>,
    /// ExifTool warnings
    pub warnings: Vec<String>,
}

impl PipelineResult {
    pub fn duplicate_groups(&self) -> impl Iterator<Item = &HashGroup> {
        self.groups.iter().filter(|g| g.is_duplicate())
    }

    /// Every non-empty plan, in execution order
    pub fn plans(&self) -> impl Iterator<Item = &OrganizePlan> {
        [&self.plan, &self.orphan_plan, &self.non_media_plan]
            .into_iter()
            .flatten()
    }
}

/// Builder for pipeline configuration
pub struct PipelineBuilder {
    config: PipelineConfig,
    reader: Option<Arc<dyn MetadataReader>>,
    cancel: CancellationToken,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            reader: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Start from a complete configuration
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Add directories to scan
    pub fn sources(mut self, sources: Vec<PathBuf>) -> Self {
        self.config.sources = sources;
        self
    }

    /// Set the destination root
    pub fn destination(mut self, dest: impl Into<PathBuf>) -> Self {
        self.config.organize.destination = Some(dest.into());
        self
    }

    /// Set the orphaned-sidecar directory
    pub fn orphan_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.organize.orphan_directory = Some(dir.into());
        self
    }

    /// Replace the whole placement policy
    pub fn organize(mut self, options: OrganizeOptions) -> Self {
        self.config.organize = options;
        self
    }

    pub fn action(mut self, action: ActionMode) -> Self {
        self.config.organize.action = action;
        self
    }

    pub fn structure(mut self, structure: FolderStructure) -> Self {
        self.config.organize.structure = structure;
        self
    }

    pub fn naming(mut self, naming: NamingScheme) -> Self {
        self.config.organize.naming = naming;
        self
    }

    pub fn duplicates(mut self, strategy: DuplicateStrategy) -> Self {
        self.config.organize.duplicates = strategy;
        self
    }

    /// Only log what would happen
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.organize.dry_run = dry_run;
        self
    }

    /// Score contribution per rating star
    pub fn rating_weight(mut self, weight: f64) -> Self {
        self.config.organize.weights.rating = weight;
        self
    }

    /// Set the worker count
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers.max(1);
        self
    }

    /// Set the worker count from a preset
    pub fn profile(mut self, profile: WorkerProfile) -> Self {
        self.config.workers = profile.workers(num_cpus::get());
        self
    }

    /// Files per batch
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size.max(1);
        self
    }

    /// Set scanner configuration
    pub fn scan_config(mut self, config: ScanConfig) -> Self {
        self.config.scan_config = config;
        self
    }

    /// Include hidden files
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.config.scan_config.include_hidden = include;
        self
    }

    /// Collect and place non-media files too
    pub fn include_other(mut self, include: bool) -> Self {
        self.config.scan_config.include_other = include;
        self
    }

    /// ExifTool executable
    pub fn exiftool(mut self, program: impl Into<String>) -> Self {
        self.config.exiftool = program.into();
        self
    }

    /// Per-file ExifTool time limit
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Use a custom metadata reader instead of ExifTool
    pub fn metadata_reader(mut self, reader: Arc<dyn MetadataReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Share a cancellation token with the pipeline
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Pipeline {
        let reader = self.reader.unwrap_or_else(|| {
            Arc::new(
                ExifTool::new(self.config.exiftool.clone())
                    .timeout(Duration::from_secs(self.config.timeout_secs)),
            )
        });

        Pipeline {
            config: self.config,
            reader,
            cancel: self.cancel,
        }
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Output of the hashing and metadata phase
#[derive(Default)]
struct Processed {
    entries: Vec<CatalogEntry>,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// The organize/deduplicate pipeline
pub struct Pipeline {
    config: PipelineConfig,
    reader: Arc<dyn MetadataReader>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the full pipeline without events
    pub fn run(&self) -> Result<PipelineResult, MediaDedupError> {
        self.run_with_events(&null_sender())
    }

    /// Scan, hash and group without planning or touching any file
    pub fn analyze(&self) -> Result<PipelineResult, MediaDedupError> {
        self.analyze_with_events(&null_sender())
    }

    /// Scan, hash and group with event reporting
    pub fn analyze_with_events(&self, events: &EventSender) -> Result<PipelineResult, MediaDedupError> {
        self.execute(events, false)
    }

    /// Run the full pipeline with event reporting
    pub fn run_with_events(&self, events: &EventSender) -> Result<PipelineResult, MediaDedupError> {
        self.execute(events, true)
    }

    fn execute(&self, events: &EventSender, organize: bool) -> Result<PipelineResult, MediaDedupError> {
        let start_time = Instant::now();
        let mut result = PipelineResult::default();
        result.summary.dry_run = self.config.organize.dry_run;

        let options = self.resolved_options();
        // Validate the destination before spending time on hashing
        let mut planner = if organize {
            Some(OrganizePlanner::new(options.clone())?)
        } else {
            None
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.max(1))
            .build()
            .map_err(|e| MediaDedupError::Config(format!("Failed to build worker pool: {}", e)))?;

        events.send(Event::Pipeline(PipelineEvent::Started));

        // Phase 1: Scanning
        self.phase(events, PipelinePhase::Scanning);
        let mut scan_config = self.config.scan_config.clone();
        if organize {
            scan_config.exclude.extend(options.destination.iter().cloned());
            scan_config.exclude.extend(options.effective_orphan_directory());
        }
        let scanner = WalkDirScanner::new(scan_config);
        let scan = scanner.scan_with_events(&self.config.sources, events)?;
        result.errors.extend(scan.errors.iter().map(|e| e.to_string()));
        result.summary.files_scanned = scan.media.len();
        result.summary.other_files = scan.other.len();

        if self.cancel.is_cancelled() {
            return Ok(self.finish_cancelled(result, events, start_time));
        }

        // Phase 2: Hashing & metadata
        self.phase(events, PipelinePhase::Processing);
        let processed = pool.install(|| self.process_media(&scan.media, events));
        result.summary.files_processed = processed.entries.len();
        result.errors.extend(processed.errors);
        result.warnings.extend(processed.warnings);

        if !scan.other.is_empty() {
            let (non_media, errors) = pool.install(|| self.hash_non_media(&scan.other));
            result.non_media = non_media;
            result.errors.extend(errors);
        }

        // Phase 3: Grouping
        self.phase(events, PipelinePhase::Grouping);
        let mut entries = processed.entries;
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        result.pairs = PairingMap::build(&entries);
        events.send(Event::Group(GroupEvent::PairsLinked {
            pairs: result.pairs.len(),
        }));
        result.groups = group_by_hash(entries);

        result.summary.unique_files = result.groups.len();
        result.summary.duplicate_groups = result.duplicate_groups().count();
        result.summary.duplicate_files = result.duplicate_groups().map(|g| g.duplicate_count()).sum();
        events.send(Event::Group(GroupEvent::Completed {
            unique: result.summary.unique_files,
            duplicate_groups: result.summary.duplicate_groups,
            duplicate_files: result.summary.duplicate_files,
        }));
        info!(
            "{} unique file(s), {} duplicate group(s), {} pair(s)",
            result.summary.unique_files,
            result.summary.duplicate_groups,
            result.pairs.len()
        );

        let Some(planner) = planner.as_mut() else {
            return Ok(self.finish(result, events, start_time));
        };
        if self.cancel.is_cancelled() {
            return Ok(self.finish_cancelled(result, events, start_time));
        }

        // Phase 4: Planning
        self.phase(events, PipelinePhase::Planning);
        let plan = planner.plan_groups(&result.groups, &result.pairs);
        let orphan_plan = planner.plan_orphans(&scan.sidecars);
        let non_media_plan = planner.plan_non_media(&result.non_media);

        for p in [&plan, &orphan_plan, &non_media_plan] {
            result.errors.extend(p.errors.iter().cloned());
            result.summary.unchanged += p.unchanged.len();
            result.summary.skipped += p.skipped;
        }
        result.summary.orphans = orphan_plan.items.len();
        events.send(Event::Organize(OrganizeEvent::Planned {
            actions: plan.action_count() + orphan_plan.action_count() + non_media_plan.action_count(),
            conflicts: plan.conflict_count + orphan_plan.conflict_count + non_media_plan.conflict_count,
            unchanged: result.summary.unchanged,
        }));

        if self.cancel.is_cancelled() {
            result.plan = Some(plan);
            result.orphan_plan = Some(orphan_plan);
            result.non_media_plan = Some(non_media_plan);
            return Ok(self.finish_cancelled(result, events, start_time));
        }

        // Phase 5-7: Executing
        let dry_run = options.dry_run;
        for (phase, p) in [
            (PipelinePhase::Executing, &plan),
            (PipelinePhase::Orphans, &orphan_plan),
            (PipelinePhase::NonMedia, &non_media_plan),
        ] {
            if p.items.is_empty() {
                continue;
            }
            self.phase(events, phase);
            let outcome = pool.install(|| execute_plan(p, dry_run, events));
            result.outcome.merge(outcome);
        }

        result.errors.extend(result.outcome.errors.iter().cloned());
        result.summary.actions_succeeded = result.outcome.succeeded;
        result.plan = Some(plan);
        result.orphan_plan = Some(orphan_plan);
        result.non_media_plan = Some(non_media_plan);

        Ok(self.finish(result, events, start_time))
    }

    /// Hash and read metadata for every media file, batch by batch
    fn process_media(&self, media: &[MediaFile], events: &EventSender) -> Processed {
        let batch_size = self.config.batch_size.max(1);
        let batches: Vec<&[MediaFile]> = media.chunks(batch_size).collect();
        let total = media.len();

        events.send(Event::Process(ProcessEvent::Started {
            total_files: total,
            batches: batches.len(),
        }));

        let completed = AtomicUsize::new(0);
        let outcomes: Vec<Processed> = batches
            .par_iter()
            .map(|batch| {
                if self.cancel.is_cancelled() {
                    return Processed::default();
                }
                let outcome = self.process_batch(batch, events);
                let done = completed.fetch_add(batch.len(), Ordering::SeqCst) + batch.len();
                if let Some(last) = batch.last() {
                    events.send(Event::Process(ProcessEvent::Progress(ProcessProgress {
                        completed: done,
                        total,
                        current_path: last.path.clone(),
                    })));
                }
                outcome
            })
            .collect();

        let mut processed = Processed::default();
        for outcome in outcomes {
            processed.entries.extend(outcome.entries);
            processed.errors.extend(outcome.errors);
            processed.warnings.extend(outcome.warnings);
        }

        events.send(Event::Process(ProcessEvent::Completed {
            processed: processed.entries.len(),
            failed: processed.errors.len(),
        }));
        processed
    }

    fn process_batch(&self, batch: &[MediaFile], events: &EventSender) -> Processed {
        let mut processed = Processed::default();

        let mut hashed = Vec::with_capacity(batch.len());
        for file in batch {
            match hash_file(&file.path) {
                Ok(hash) => hashed.push((file, hash)),
                Err(e) => {
                    warn!("{}", e);
                    events.send(Event::Process(ProcessEvent::Error {
                        path: file.path.clone(),
                        message: e.to_string(),
                    }));
                    processed.errors.push(e.to_string());
                }
            }
        }

        let request: Vec<_> = hashed.iter().map(|(f, _)| (f.path.clone(), f.kind)).collect();
        let metadata = self.reader.read_batch(&request);
        for warning in &metadata.warnings {
            events.send(Event::Process(ProcessEvent::Warning {
                message: warning.clone(),
            }));
        }
        processed.warnings = metadata.warnings;

        processed.entries = hashed
            .into_iter()
            .map(|(file, hash)| CatalogEntry::build(file, hash, metadata.tags.get(&file.path)))
            .collect();
        processed
    }

    fn hash_non_media(&self, files: &[LooseFile]) -> (Vec<NonMediaEntry>, Vec<String>) {
        let results: Vec<_> = files
            .par_iter()
            .filter(|_| !self.cancel.is_cancelled())
            .map(|file| {
                hash_file(&file.path).map(|content_hash| NonMediaEntry {
                    path: file.path.clone(),
                    root: file.root.clone(),
                    size: file.size,
                    content_hash,
                })
            })
            .collect();

        let mut entries = Vec::new();
        let mut errors = Vec::new();
        for r in results {
            match r {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!("{}", e);
                    errors.push(e.to_string());
                }
            }
        }
        (entries, errors)
    }

    /// Organize options with the destination made absolute
    fn resolved_options(&self) -> OrganizeOptions {
        let mut options = self.config.organize.clone();
        options.destination = options.destination.as_deref().map(absolute_path);
        options.orphan_directory = options.orphan_directory.as_deref().map(absolute_path);
        options
    }

    fn phase(&self, events: &EventSender, phase: PipelinePhase) {
        info!("Phase: {}", phase);
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged { phase }));
    }

    fn finish(&self, mut result: PipelineResult, events: &EventSender, start: Instant) -> PipelineResult {
        result.summary.errors = result.errors.len();
        result.summary.duration_ms = start.elapsed().as_millis() as u64;
        events.send(Event::Pipeline(PipelineEvent::Completed {
            summary: result.summary.clone(),
        }));
        result
    }

    fn finish_cancelled(&self, mut result: PipelineResult, events: &EventSender, start: Instant) -> PipelineResult {
        warn!("Run cancelled; reporting partial results");
        result.summary.cancelled = true;
        events.send(Event::Pipeline(PipelineEvent::Cancelled));
        self.finish(result, events, start)
    }
}

fn execute_plan(plan: &OrganizePlan, dry_run: bool, events: &EventSender) -> OrganizeResult {
    events.send(Event::Organize(OrganizeEvent::Started {
        total_actions: plan.action_count(),
    }));

    let outcome = OrganizeExecutor::execute(plan, dry_run, |completed, total, _| {
        events.send(Event::Organize(OrganizeEvent::Progress { completed, total }));
    });

    events.send(Event::Organize(OrganizeEvent::Completed {
        succeeded: outcome.succeeded,
        failed: outcome.failed,
    }));
    outcome
}

/// Canonical form when the path exists, otherwise joined onto the working directory
fn absolute_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::metadata::{BatchMetadata, TagMap, TagValue};
    use crate::core::scanner::MediaKind;
    use crate::events::EventChannel;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Reader that answers from a fixed table keyed by file name
    #[derive(Default)]
    struct FakeReader {
        tags: HashMap<String, TagMap>,
        calls: Mutex<usize>,
    }

    impl FakeReader {
        fn with(mut self, name: &str, tags: &[(&str, TagValue)]) -> Self {
            let mut map = TagMap::new();
            for (k, v) in tags {
                map.insert(*k, v.clone());
            }
            self.tags.insert(name.to_string(), map);
            self
        }
    }

    impl MetadataReader for FakeReader {
        fn read_batch(&self, files: &[(PathBuf, MediaKind)]) -> BatchMetadata {
            *self.calls.lock().unwrap() += 1;
            let mut batch = BatchMetadata::default();
            for (path, _) in files {
                let name = path.file_name().unwrap().to_string_lossy().to_string();
                if let Some(tags) = self.tags.get(&name) {
                    batch.tags.insert(path.clone(), tags.clone());
                }
            }
            batch
        }
    }

    fn date(s: &str) -> TagValue {
        TagValue::Text(s.to_string())
    }

    fn write(path: &Path, content: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn pipeline_builder_sets_config() {
        let pipeline = Pipeline::builder()
            .sources(vec![PathBuf::from("/photos")])
            .destination("/library")
            .workers(0)
            .batch_size(0)
            .rating_weight(10.0)
            .build();

        assert_eq!(pipeline.config().workers, 1);
        assert_eq!(pipeline.config().batch_size, 1);
        assert_eq!(pipeline.config().organize.weights.rating, 10.0);
        assert_eq!(
            pipeline.config().organize.destination,
            Some(PathBuf::from("/library"))
        );
    }

    #[test]
    fn pipeline_handles_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("dest");

        let result = Pipeline::builder()
            .sources(vec![temp_dir.path().to_path_buf()])
            .destination(&dest)
            .metadata_reader(Arc::new(FakeReader::default()))
            .build()
            .run()
            .unwrap();

        assert_eq!(result.summary.files_scanned, 0);
        assert!(result.groups.is_empty());
        assert!(!result.summary.cancelled);
    }

    #[test]
    fn missing_destination_fails_before_scanning() {
        let temp_dir = TempDir::new().unwrap();
        let result = Pipeline::builder()
            .sources(vec![temp_dir.path().to_path_buf()])
            .metadata_reader(Arc::new(FakeReader::default()))
            .build()
            .run();

        assert!(matches!(result, Err(MediaDedupError::Plan(_))));
    }

    #[test]
    fn organizes_duplicates_by_metadata_date() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dest = temp.path().join("dest");
        write(&src.join("a/photo.jpg"), b"same bytes");
        write(&src.join("b/photo.jpg"), b"same bytes");
        write(&src.join("c/other.jpg"), b"other bytes");

        let reader = FakeReader::default()
            .with("photo.jpg", &[("EXIF:DateTimeOriginal", date("2024:05:17 14:03:22"))])
            .with("other.jpg", &[("EXIF:DateTimeOriginal", date("2023:01:02 03:04:05"))]);

        let result = Pipeline::builder()
            .sources(vec![src.clone()])
            .destination(&dest)
            .batch_size(2)
            .workers(2)
            .metadata_reader(Arc::new(reader))
            .build()
            .run()
            .unwrap();

        assert_eq!(result.summary.files_scanned, 3);
        assert_eq!(result.summary.duplicate_groups, 1);
        assert_eq!(result.summary.duplicate_files, 1);
        assert_eq!(result.summary.actions_succeeded, 3);
        assert!(result.errors.is_empty());

        assert!(dest.join("2024/05/photo.jpg").exists());
        assert!(dest.join("2024/05/duplicates/photo_duplicate-1.jpg").exists());
        assert!(dest.join("2023/01/other.jpg").exists());
        // Copy mode keeps the originals
        assert!(src.join("b/photo.jpg").exists());
    }

    #[test]
    fn dry_run_changes_nothing() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dest = temp.path().join("dest");
        write(&src.join("photo.jpg"), b"bytes");

        let result = Pipeline::builder()
            .sources(vec![src.clone()])
            .destination(&dest)
            .dry_run(true)
            .action(ActionMode::Move)
            .metadata_reader(Arc::new(FakeReader::default()))
            .build()
            .run()
            .unwrap();

        assert!(result.summary.dry_run);
        assert_eq!(result.summary.actions_succeeded, 1);
        assert!(src.join("photo.jpg").exists());
        assert!(!dest.exists());
    }

    #[test]
    fn missing_metadata_falls_back_to_mtime() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        write(&src.join("undated.jpg"), b"bytes");

        let result = Pipeline::builder()
            .sources(vec![src])
            .metadata_reader(Arc::new(FakeReader::default()))
            .build()
            .analyze()
            .unwrap();

        let entry = &result.groups[0].members[0];
        assert!(!entry.dated_from_metadata);
        let mtime = fs::metadata(&entry.path).unwrap().modified().unwrap();
        assert_eq!(
            entry.captured_at,
            chrono::DateTime::<chrono::Local>::from(mtime).naive_local()
        );
    }

    #[test]
    fn batches_make_one_reader_call_each() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        for i in 0..5 {
            write(&src.join(format!("{}.jpg", i)), format!("content {}", i).as_bytes());
        }
        let reader = Arc::new(FakeReader::default());

        let result = Pipeline::builder()
            .sources(vec![src])
            .batch_size(2)
            .metadata_reader(reader.clone())
            .build()
            .analyze()
            .unwrap();

        assert_eq!(result.summary.files_processed, 5);
        assert_eq!(*reader.calls.lock().unwrap(), 3);
    }

    #[test]
    fn cancelled_before_processing_runs_no_batches() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        write(&src.join("photo.jpg"), b"bytes");
        let reader = Arc::new(FakeReader::default());
        let token = CancellationToken::new();
        token.cancel();

        let (tx, rx) = EventChannel::new();
        let result = Pipeline::builder()
            .sources(vec![src])
            .destination(temp.path().join("dest"))
            .metadata_reader(reader.clone())
            .cancellation(token)
            .build()
            .run_with_events(&tx)
            .unwrap();
        drop(tx);

        assert!(result.summary.cancelled);
        assert_eq!(result.summary.files_scanned, 1);
        assert_eq!(result.summary.files_processed, 0);
        assert_eq!(*reader.calls.lock().unwrap(), 0);
        assert!(rx
            .iter()
            .any(|e| matches!(e, Event::Pipeline(PipelineEvent::Cancelled))));
    }

    #[test]
    fn events_report_phases_in_order() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        write(&src.join("photo.jpg"), b"bytes");

        let (tx, rx) = EventChannel::new();
        Pipeline::builder()
            .sources(vec![src])
            .destination(temp.path().join("dest"))
            .dry_run(true)
            .metadata_reader(Arc::new(FakeReader::default()))
            .build()
            .run_with_events(&tx)
            .unwrap();
        drop(tx);

        let phases: Vec<PipelinePhase> = rx
            .iter()
            .filter_map(|e| match e {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => Some(phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![
                PipelinePhase::Scanning,
                PipelinePhase::Processing,
                PipelinePhase::Grouping,
                PipelinePhase::Planning,
                PipelinePhase::Executing,
            ]
        );
    }
}
