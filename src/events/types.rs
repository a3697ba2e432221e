//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the organize pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Scanning phase events
    Scan(ScanEvent),
    /// Hashing and metadata extraction events
    Process(ProcessEvent),
    /// Grouping and pairing events
    Group(GroupEvent),
    /// Planning and file action events
    Organize(OrganizeEvent),
    /// Pipeline-level events
    Pipeline(PipelineEvent),
}

/// Events during the scanning phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Scanning has started
    Started { paths: Vec<PathBuf> },
    /// Progress update during scanning
    Progress(ScanProgress),
    /// An error occurred but scanning continues
    Error { path: PathBuf, message: String },
    /// Scanning completed
    Completed {
        media_files: usize,
        other_files: usize,
    },
}

/// Progress information during scanning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Number of directories entered so far
    pub directories_scanned: usize,
    /// Number of media files found so far
    pub files_found: usize,
    /// Directory currently being scanned
    pub current_path: PathBuf,
}

/// Events during hashing and metadata extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ProcessEvent {
    /// Processing has started
    Started { total_files: usize, batches: usize },
    /// A batch finished
    Progress(ProcessProgress),
    /// A file failed and was dropped from the catalog
    Error { path: PathBuf, message: String },
    /// ExifTool reported a problem but its output was still used
    Warning { message: String },
    /// Processing completed
    Completed { processed: usize, failed: usize },
}

/// Progress information during processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessProgress {
    /// Files finished so far (successful or not)
    pub completed: usize,
    /// Total number of files to process
    pub total: usize,
    /// Last file of the batch that just finished
    pub current_path: PathBuf,
}

/// Events during grouping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GroupEvent {
    /// RAW+JPEG pairs were linked
    PairsLinked { pairs: usize },
    /// Hash grouping completed
    Completed {
        unique: usize,
        duplicate_groups: usize,
        duplicate_files: usize,
    },
}

/// Events during planning and execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrganizeEvent {
    /// The plan was built
    Planned {
        actions: usize,
        conflicts: usize,
        unchanged: usize,
    },
    /// Execution has started
    Started { total_actions: usize },
    /// An action finished
    Progress { completed: usize, total: usize },
    /// Execution completed
    Completed { succeeded: usize, failed: usize },
}

/// Pipeline-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Pipeline has started
    Started,
    /// Moving to a new phase
    PhaseChanged { phase: PipelinePhase },
    /// Pipeline completed
    Completed { summary: PipelineSummary },
    /// Cancellation was observed; partial results follow
    Cancelled,
}

/// Phases of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Scanning,
    Processing,
    Grouping,
    Planning,
    Executing,
    Orphans,
    NonMedia,
}

/// Summary of pipeline results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Media files found by the scanner
    pub files_scanned: usize,
    /// Media files hashed and catalogued
    pub files_processed: usize,
    /// Distinct content hashes
    pub unique_files: usize,
    /// Hash groups with two or more members
    pub duplicate_groups: usize,
    /// Group members that lost winner selection
    pub duplicate_files: usize,
    /// Actions performed (or that would be performed in a dry run)
    pub actions_succeeded: usize,
    /// Files already in place with identical content
    pub unchanged: usize,
    /// Duplicates left untouched by the skip strategy
    pub skipped: usize,
    /// Orphaned sidecars relocated
    pub orphans: usize,
    /// Non-media files organized
    pub other_files: usize,
    /// Per-file errors across all phases
    pub errors: usize,
    /// Whether this was a dry run
    pub dry_run: bool,
    /// Whether the run stopped early on interrupt
    pub cancelled: bool,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Scanning => write!(f, "Scanning"),
            PipelinePhase::Processing => write!(f, "Hashing & metadata"),
            PipelinePhase::Grouping => write!(f, "Grouping"),
            PipelinePhase::Planning => write!(f, "Planning"),
            PipelinePhase::Executing => write!(f, "Organizing"),
            PipelinePhase::Orphans => write!(f, "Orphaned sidecars"),
            PipelinePhase::NonMedia => write!(f, "Non-media files"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Process(ProcessEvent::Progress(ProcessProgress {
            completed: 10,
            total: 50,
            current_path: PathBuf::from("/photos/a.jpg"),
        }));

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Process(ProcessEvent::Progress(p)) => {
                assert_eq!(p.completed, 10);
                assert_eq!(p.total, 50);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn pipeline_summary_is_serializable() {
        let summary = PipelineSummary {
            files_scanned: 1000,
            duplicate_groups: 50,
            dry_run: true,
            ..Default::default()
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"dry_run\":true"));
        assert!(json.contains("1000"));
    }

    #[test]
    fn phase_display_is_human_readable() {
        assert_eq!(PipelinePhase::Orphans.to_string(), "Orphaned sidecars");
    }
}
