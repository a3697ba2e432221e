//! # Error Module
//!
//! Error types for the media deduplicator.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, file names, what went wrong
//! - **Per-file errors are recoverable** - hashing, metadata and file action
//!   errors are counted and logged; only setup errors reach `MediaDedupError`

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum MediaDedupError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    #[error("ExifTool not found at '{program}'. Install it and add it to PATH (macOS: brew install exiftool, Debian/Ubuntu: apt install libimage-exiftool-perl).")]
    ToolMissing { program: String },

    #[error("Failed to write run artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors that occur while discovering files
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("None of the source directories exist")]
    NoSources,

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while hashing file content
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while talking to ExifTool
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ExifTool timed out after {seconds}s on {files} file(s)")]
    Timeout { seconds: u64, files: usize },

    #[error("ExifTool exited with {code:?} and produced no output")]
    Failed { code: Option<i32> },

    #[error("Could not parse ExifTool output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors that occur while building the placement plan
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("A destination directory is required unless renaming in place")]
    MissingDestination,

    #[error("Destination {path} exists but is not a directory")]
    DestinationNotDirectory { path: PathBuf },

    #[error("Source has no file name: {path}")]
    NoFileName { path: PathBuf },
}

/// Errors that occur while copying, moving, or renaming a single file
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Source file not found: {path}")]
    SourceMissing { path: PathBuf },

    #[error("Failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to {verb} {from} -> {to}: {source}")]
    Transfer {
        verb: &'static str,
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Copy verification failed for {path}: source {expected} bytes, destination {actual} bytes")]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, MediaDedupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_includes_path() {
        let error = ScanError::DirectoryNotFound {
            path: PathBuf::from("/photos/vacation"),
        };
        assert!(error.to_string().contains("/photos/vacation"));
    }

    #[test]
    fn transfer_error_names_both_paths() {
        let error = ActionError::Transfer {
            verb: "copy",
            from: PathBuf::from("/src/a.jpg"),
            to: PathBuf::from("/dest/2024/05/a.jpg"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        let message = error.to_string();
        assert!(message.contains("/src/a.jpg"));
        assert!(message.contains("/dest/2024/05/a.jpg"));
        assert!(message.contains("disk full"));
    }

    #[test]
    fn tool_missing_suggests_install() {
        let error = MediaDedupError::ToolMissing {
            program: "exiftool".to_string(),
        };
        assert!(error.to_string().contains("Install it"));
    }

    #[test]
    fn phase_errors_convert_to_top_level() {
        let error: MediaDedupError = PlanError::MissingDestination.into();
        assert!(matches!(error, MediaDedupError::Plan(_)));

        let error: MediaDedupError = ScanError::NoSources.into();
        assert!(matches!(error, MediaDedupError::Scan(ScanError::NoSources)));
    }
}
