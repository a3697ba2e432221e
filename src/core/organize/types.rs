//! Types for the organize module.

use crate::core::catalog::ScoreWeights;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Folder layout under the destination
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FolderStructure {
    /// `YYYY/MM`
    #[default]
    Simple,
    /// `Keywords/<first four keywords>/YYYY/MM`, or `No Keywords/YYYY/MM`
    Keywords,
}

/// How placed files are named
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NamingScheme {
    /// Keep the source file name
    #[default]
    Original,
    /// `YYYY-MM-DD-HHMMSS-make-model-hash8.ext`
    Camera,
    /// `YYYY-MM-DD_HH-MM-SS_{IMG|VID}_hash16.ext`
    ContentAddressed,
}

/// What happens to the non-winning copies of a duplicate group
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateStrategy {
    /// Into a `duplicates/` folder beside the winner
    #[default]
    Folder,
    /// Next to the winner
    Alongside,
    /// Left where they are
    Skip,
    /// Placed like winners, with no separation
    Keep,
}

/// Operation mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionMode {
    /// Copy files to destination (keep originals)
    #[default]
    Copy,
    /// Move files to destination
    Move,
    /// Rename files inside their current folder
    RenameOnly,
}

/// Everything the planner needs to decide destinations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizeOptions {
    /// Destination root; optional only for rename-only runs
    pub destination: Option<PathBuf>,
    /// Where orphaned sidecars go; defaults to `{destination}/XMP_Orphans`
    pub orphan_directory: Option<PathBuf>,
    pub structure: FolderStructure,
    pub naming: NamingScheme,
    pub duplicates: DuplicateStrategy,
    pub action: ActionMode,
    pub dry_run: bool,
    pub weights: ScoreWeights,
}

impl Default for OrganizeOptions {
    fn default() -> Self {
        Self {
            destination: None,
            orphan_directory: None,
            structure: FolderStructure::default(),
            naming: NamingScheme::default(),
            duplicates: DuplicateStrategy::default(),
            action: ActionMode::default(),
            dry_run: false,
            weights: ScoreWeights::default(),
        }
    }
}

impl OrganizeOptions {
    /// Orphan directory after applying the default
    pub fn effective_orphan_directory(&self) -> Option<PathBuf> {
        self.orphan_directory
            .clone()
            .or_else(|| self.destination.as_ref().map(|d| d.join("XMP_Orphans")))
    }

    /// Filesystem operation for media and non-media placements
    pub fn file_op(&self) -> FileOp {
        match self.action {
            ActionMode::Copy => FileOp::Copy,
            ActionMode::Move => FileOp::Move,
            ActionMode::RenameOnly => FileOp::Rename,
        }
    }
}

/// A single filesystem operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileOp {
    Copy,
    Move,
    Rename,
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileOp::Copy => "COPY",
            FileOp::Move => "MOVE",
            FileOp::Rename => "RENAME",
        })
    }
}

/// Why a file is being placed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionRole {
    Winner,
    Duplicate,
    Sidecar,
    Paired,
    Orphan,
    NonMedia,
}

/// One source-to-destination operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedAction {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub op: FileOp,
    pub role: ActionRole,
    pub size_bytes: u64,
    /// The preferred destination was taken and a suffix was added
    pub has_conflict: bool,
}

/// A primary action plus the files that travel with it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedItem {
    pub primary: PlannedAction,
    /// Sidecar and paired-file actions, run after the primary succeeds
    pub attached: Vec<PlannedAction>,
}

impl PlannedItem {
    pub fn new(primary: PlannedAction) -> Self {
        Self {
            primary,
            attached: Vec::new(),
        }
    }

    /// Primary and attached actions, in execution order
    pub fn actions(&self) -> impl Iterator<Item = &PlannedAction> {
        std::iter::once(&self.primary).chain(self.attached.iter())
    }
}

/// A file whose destination already holds identical content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnchangedFile {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub role: ActionRole,
}

/// The organization plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizePlan {
    pub id: String,
    pub items: Vec<PlannedItem>,
    pub unchanged: Vec<UnchangedFile>,
    /// Files deliberately left in place (skipped duplicates)
    pub skipped: usize,
    pub conflict_count: usize,
    /// Files that could not be planned
    pub errors: Vec<String>,
}

impl OrganizePlan {
    pub(crate) fn new(id: String) -> Self {
        Self {
            id,
            items: Vec::new(),
            unchanged: Vec::new(),
            skipped: 0,
            conflict_count: 0,
            errors: Vec::new(),
        }
    }

    /// Total number of filesystem operations, attached ones included
    pub fn action_count(&self) -> usize {
        self.items.iter().map(|i| 1 + i.attached.len()).sum()
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.items
            .iter()
            .flat_map(PlannedItem::actions)
            .map(|a| a.size_bytes)
            .sum()
    }

    /// Every planned action, in plan order
    pub fn actions(&self) -> impl Iterator<Item = &PlannedAction> {
        self.items.iter().flat_map(PlannedItem::actions)
    }

    /// Destination planned for `source`, if any
    pub fn destination_of(&self, source: &Path) -> Option<&Path> {
        self.actions()
            .find(|a| a.source == source)
            .map(|a| a.destination.as_path())
            .or_else(|| {
                self.unchanged
                    .iter()
                    .find(|u| u.source == source)
                    .map(|u| u.destination.as_path())
            })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.unchanged.is_empty()
    }
}

/// Result of executing a plan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizeResult {
    pub succeeded: usize,
    pub failed: usize,
    pub folders_created: usize,
    pub total_size_bytes: u64,
    pub duration_ms: u64,
    pub errors: Vec<String>,
}

impl OrganizeResult {
    /// Fold another pass into this one
    pub fn merge(&mut self, other: OrganizeResult) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.folders_created += other.folders_created;
        self.total_size_bytes += other.total_size_bytes;
        self.duration_ms += other.duration_ms;
        self.errors.extend(other.errors);
    }
}
