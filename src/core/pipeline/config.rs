//! Pipeline configuration and the run-configuration snapshot.

use crate::core::metadata::exiftool::DEFAULT_TIMEOUT;
use crate::core::organize::{
    ActionMode, DuplicateStrategy, FolderStructure, NamingScheme, OrganizeOptions,
};
use crate::core::scanner::ScanConfig;
use crate::error::MediaDedupError;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default number of files per processing batch
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Timestamp format used in artifact file names
pub const RUN_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Preset worker counts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkerProfile {
    /// Two workers
    Conservative,
    /// Half the cores, at least four
    Balanced,
    /// All but two cores on larger machines
    #[default]
    Fast,
    /// Every core
    Maximum,
}

impl WorkerProfile {
    /// Worker count for a machine with `cores` logical CPUs
    pub fn workers(self, cores: usize) -> usize {
        let cores = cores.max(1);
        match self {
            WorkerProfile::Conservative => 2,
            WorkerProfile::Balanced => (cores / 2).max(4),
            WorkerProfile::Fast => optimal_workers(cores),
            WorkerProfile::Maximum => cores,
        }
    }
}

/// Default worker count: leave headroom for the system on larger machines
pub fn optimal_workers(cores: usize) -> usize {
    if cores > 4 {
        cores.saturating_sub(2).max(2)
    } else {
        cores.saturating_sub(1).max(1)
    }
}

/// Configuration for the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Source roots to scan
    pub sources: Vec<PathBuf>,
    /// Placement policy
    pub organize: OrganizeOptions,
    /// Scanner configuration
    pub scan_config: ScanConfig,
    /// Worker threads
    pub workers: usize,
    /// Files per batch (1 hashes and reads each file on its own)
    pub batch_size: usize,
    /// ExifTool executable
    pub exiftool: String,
    /// Per-file ExifTool time limit in seconds
    pub timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            organize: OrganizeOptions::default(),
            scan_config: ScanConfig::default(),
            workers: optimal_workers(num_cpus::get()),
            batch_size: DEFAULT_BATCH_SIZE,
            exiftool: "exiftool".to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

/// Audit record of a run's settings, written once at start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub timestamp: String,
    pub version: String,
    pub sources: Vec<PathBuf>,
    pub destination: Option<PathBuf>,
    pub orphan_directory: Option<PathBuf>,
    pub action: ActionMode,
    pub structure: FolderStructure,
    pub naming: NamingScheme,
    pub duplicate_strategy: DuplicateStrategy,
    pub dry_run: bool,
    pub workers: usize,
    pub batch_size: usize,
    pub rating_weight: f64,
    pub include_other: bool,
    pub cpu_cores: usize,
}

impl RunSnapshot {
    pub fn new(config: &PipelineConfig, at: DateTime<Local>) -> Self {
        let organize = &config.organize;
        Self {
            timestamp: at.to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            sources: config.sources.clone(),
            destination: organize.destination.clone(),
            orphan_directory: organize.effective_orphan_directory(),
            action: organize.action,
            structure: organize.structure,
            naming: organize.naming,
            duplicate_strategy: organize.duplicates,
            dry_run: organize.dry_run,
            workers: config.workers,
            batch_size: config.batch_size,
            rating_weight: organize.weights.rating,
            include_other: config.scan_config.include_other,
            cpu_cores: num_cpus::get(),
        }
    }

    /// Write `configs/config_{stamp}.json` under `dir`, returning its path
    pub fn write_to(&self, dir: &Path, stamp: &str) -> Result<PathBuf, MediaDedupError> {
        let configs = dir.join("configs");
        let path = configs.join(format!("config_{}.json", stamp));
        let artifact = |source| MediaDedupError::Artifact {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&configs).map_err(artifact)?;
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| artifact(std::io::Error::other(e)))?;
        fs::write(&path, json).map_err(artifact)?;
        Ok(path)
    }
}

/// `YYYYmmdd_HHMMSS` stamp shared by a run's artifacts
pub fn run_stamp(at: DateTime<Local>) -> String {
    at.format(RUN_STAMP_FORMAT).to_string()
}
