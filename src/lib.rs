//! # Media Dedup
//!
//! Organizes photo and video collections into a dated folder tree and
//! separates byte-identical duplicates, keeping the best copy of each.
//!
//! ## Core Philosophy
//! - **Never lose a file** - duplicates are set aside, not deleted
//! - **Dry run first** - every action can be logged before anything moves
//! - **Leave an audit trail** - each run writes its log and its settings
//!
//! ## Architecture
//! - `core` - Scanning, hashing, metadata, grouping, planning and execution
//! - `events` - Event-driven progress reporting
//! - `error` - Error types per phase
//! - `cli` - Command-line interface (binary only)

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{MediaDedupError, Result};

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::prelude::*;

fn stderr_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Initialize stderr-only tracing, filtered by `RUST_LOG` (default `warn`)
pub fn init_tracing() {
    // A subscriber may already be installed (tests, embedding applications)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(stderr_filter())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Initialize tracing with a run log at `{log_dir}/logs/organize_{stamp}.log`.
///
/// Stderr keeps the `RUST_LOG` filter; the file receives everything at INFO
/// and above, without colors, written straight through so a crash loses
/// nothing. Returns the log path.
pub fn init_logging(log_dir: &Path, stamp: &str) -> Result<PathBuf> {
    let logs = log_dir.join("logs");
    let path = logs.join(format!("organize_{}.log", stamp));
    let artifact = |source| MediaDedupError::Artifact {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(&logs).map_err(artifact)?;
    let file = File::create(&path).map_err(artifact)?;

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(stderr_filter());
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .with_filter(LevelFilter::INFO);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| MediaDedupError::Config(format!("Failed to initialize logging: {}", e)))?;

    Ok(path)
}
