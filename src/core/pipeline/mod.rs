//! # Pipeline Module
//!
//! Orchestrates the full organize workflow.
//!
//! ## Pipeline Stages
//! 1. **Scan** - Discover media, sidecars and (optionally) other files
//! 2. **Process** - Hash content and read metadata, one ExifTool call per batch
//! 3. **Group** - Link RAW+JPEG pairs and group byte-identical files
//! 4. **Plan** - Reserve a destination for every file, in order
//! 5. **Execute** - Copy, move or rename (or just log, in a dry run)
//!
//! ## Parallelism
//! Uses a dedicated rayon pool sized by the configured worker count.

mod config;
mod executor;

pub use config::{
    optimal_workers, run_stamp, PipelineConfig, RunSnapshot, WorkerProfile, DEFAULT_BATCH_SIZE,
    RUN_STAMP_FORMAT,
};
pub use executor::{CancellationToken, Pipeline, PipelineBuilder, PipelineResult};
