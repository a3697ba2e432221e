//! ExifTool subprocess reader.
//!
//! Each invocation asks for a fixed allow-list of tags in JSON form. Photos
//! are read with `-fast2` (stop before the image data); videos need the full
//! pass because QuickTime dates live at the end of many containers.
//!
//! Invocations run under a wall-clock limit. A hung ExifTool is killed and
//! its files come back with no tags, so callers fall back to filesystem dates.

use super::tags::TagMap;
use super::{BatchMetadata, MetadataReader};
use crate::core::scanner::MediaKind;
use crate::error::{MediaDedupError, MetadataError};
use crossbeam_channel::{bounded, RecvTimeoutError};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-file time limit
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound for one invocation, whatever the batch size
pub const MAX_INVOCATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Tags requested from ExifTool
pub const TAG_ARGS: &[&str] = &[
    "-FileType",
    "-DateTimeOriginal",
    "-CreateDate",
    "-QuickTime:CreationDate",
    "-QuickTime:CreateDate",
    "-ModifyDate",
    "-Subject",
    "-Keywords",
    "-Rating",
    "-ImageWidth",
    "-ImageHeight",
    "-Make",
    "-Model",
];

/// Parsed output of one invocation
#[derive(Debug, Default)]
pub struct Invocation {
    /// Tags keyed by the `SourceFile` string ExifTool echoed back
    pub by_source: HashMap<String, TagMap>,
    /// Set when ExifTool exited non-zero but still produced output
    pub warning: Option<String>,
}

/// Runs the `exiftool` binary
#[derive(Debug, Clone)]
pub struct ExifTool {
    program: String,
    timeout: Duration,
}

impl ExifTool {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-file time limit
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Wall-clock limit for one call over `files` paths
    pub fn batch_limit(&self, files: usize) -> Duration {
        let scaled = self.timeout.saturating_mul(files.max(1).min(u32::MAX as usize) as u32);
        scaled.min(MAX_INVOCATION_TIMEOUT.max(self.timeout))
    }

    /// Verify the binary runs, returning its version
    pub fn check_available(&self) -> Result<String, MediaDedupError> {
        let missing = || MediaDedupError::ToolMissing {
            program: self.program.clone(),
        };

        let output = Command::new(&self.program)
            .arg("-ver")
            .stdin(Stdio::null())
            .output()
            .map_err(|_| missing())?;

        if !output.status.success() {
            return Err(missing());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn build_command(&self, files: &[PathBuf], fast: bool) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-j", "-G", "-q"]).args(TAG_ARGS);
        if fast {
            cmd.arg("-fast2");
        }
        cmd.args(files)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Run one invocation over `files`
    pub fn invoke(&self, files: &[PathBuf], fast: bool) -> Result<Invocation, MetadataError> {
        if files.is_empty() {
            return Ok(Invocation::default());
        }

        let mut child = self
            .build_command(files, fast)
            .spawn()
            .map_err(|source| MetadataError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // Drain both pipes off-thread so a chatty stderr can't block the child
        let (tx, rx) = bounded(1);
        let stdout = child.stdout.take();
        thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut out) = stdout {
                let _ = out.read_to_end(&mut buf);
            }
            let _ = tx.send(buf);
        });
        let stderr = child.stderr.take();
        let stderr_reader = thread::spawn(move || {
            let mut text = String::new();
            if let Some(mut err) = stderr {
                let _ = err.read_to_string(&mut text);
            }
            text
        });

        let limit = self.batch_limit(files.len());
        let stdout = match rx.recv_timeout(limit) {
            Ok(buf) => buf,
            Err(RecvTimeoutError::Timeout) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(MetadataError::Timeout {
                    seconds: limit.as_secs(),
                    files: files.len(),
                });
            }
            Err(RecvTimeoutError::Disconnected) => Vec::new(),
        };

        let status = child.wait().map_err(|source| MetadataError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        let stderr = stderr_reader.join().unwrap_or_default();

        if stdout.iter().all(u8::is_ascii_whitespace) {
            if status.success() {
                return Ok(Invocation::default());
            }
            debug!("exiftool stderr: {}", stderr.trim());
            return Err(MetadataError::Failed {
                code: status.code(),
            });
        }

        let mut invocation = parse_output(&stdout)?;
        if !status.success() {
            let detail = stderr.lines().next().unwrap_or("").trim();
            invocation.warning = Some(format!(
                "exiftool exited with {:?} on {} file(s){}{}",
                status.code(),
                files.len(),
                if detail.is_empty() { "" } else { ": " },
                detail
            ));
        }
        Ok(invocation)
    }
}

impl Default for ExifTool {
    fn default() -> Self {
        Self::new("exiftool")
    }
}

impl MetadataReader for ExifTool {
    fn read_batch(&self, files: &[(PathBuf, MediaKind)]) -> BatchMetadata {
        let mut batch = BatchMetadata::default();

        let (videos, photos): (Vec<_>, Vec<_>) =
            files.iter().partition(|(_, kind)| kind.is_video());

        for (group, fast) in [(photos, true), (videos, false)] {
            if group.is_empty() {
                continue;
            }
            let paths: Vec<PathBuf> = group.iter().map(|(p, _)| p.clone()).collect();

            match self.invoke(&paths, fast) {
                Ok(invocation) => {
                    if let Some(warning) = invocation.warning {
                        warn!("{}", warning);
                        batch.warnings.push(warning);
                    }
                    let mut by_source = invocation.by_source;
                    for path in paths {
                        if let Some(tags) = by_source.remove(&source_key(&path)) {
                            batch.tags.insert(path, tags);
                        }
                    }
                }
                Err(e) => {
                    let message = format!("No metadata for {} file(s): {}", paths.len(), e);
                    warn!("{}", message);
                    batch.warnings.push(message);
                }
            }
        }

        batch
    }
}

/// How ExifTool echoes a path back in `SourceFile`
fn source_key(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Parse the JSON array ExifTool prints
pub fn parse_output(stdout: &[u8]) -> Result<Invocation, MetadataError> {
    let objects: Vec<Map<String, Value>> = serde_json::from_slice(stdout)?;
    let mut invocation = Invocation::default();

    for object in objects {
        let (source, tags) = TagMap::from_json_object(object);
        if let Some(source) = source {
            invocation.by_source.insert(source.replace('\\', "/"), tags);
        }
    }

    Ok(invocation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_output_keys_by_source_file() {
        let stdout = br#"[
            {"SourceFile": "/photos/a.jpg", "File:FileType": "JPEG", "XMP:Rating": 4},
            {"SourceFile": "/photos/b.mov", "QuickTime:CreationDate": "2024:05:01 10:00:00+02:00"}
        ]"#;

        let invocation = parse_output(stdout).unwrap();

        assert_eq!(invocation.by_source.len(), 2);
        let a = &invocation.by_source["/photos/a.jpg"];
        assert_eq!(a.get("XMP:Rating").and_then(|v| v.as_u32()), Some(4));
    }

    #[test]
    fn parse_output_rejects_garbage() {
        assert!(matches!(
            parse_output(b"Warning: not json"),
            Err(MetadataError::Parse(_))
        ));
    }

    #[test]
    fn photo_command_uses_fast_profile() {
        let tool = ExifTool::default();
        let cmd = tool.build_command(&[PathBuf::from("/p/a.jpg")], true);
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().to_string()).collect();

        assert_eq!(&args[..3], &["-j", "-G", "-q"]);
        assert!(args.contains(&"-fast2".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("/p/a.jpg"));
    }

    #[test]
    fn video_command_uses_full_profile() {
        let tool = ExifTool::default();
        let cmd = tool.build_command(&[PathBuf::from("/p/a.mov")], false);
        assert!(!cmd.get_args().any(|a| a == "-fast2"));
    }

    #[test]
    fn missing_binary_is_reported_as_tool_missing() {
        let tool = ExifTool::new("/nonexistent/bin/exiftool-xyz");
        assert!(matches!(
            tool.check_available(),
            Err(MediaDedupError::ToolMissing { .. })
        ));
    }

    #[test]
    fn missing_binary_yields_empty_batch_with_warning() {
        let tool = ExifTool::new("/nonexistent/bin/exiftool-xyz");
        let batch = tool.read_batch(&[(PathBuf::from("/p/a.jpg"), MediaKind::Photo)]);

        assert!(batch.tags.is_empty());
        assert_eq!(batch.warnings.len(), 1);
    }

    #[test]
    fn batch_limit_scales_then_caps() {
        let tool = ExifTool::default().timeout(Duration::from_secs(2));
        assert_eq!(tool.batch_limit(0), Duration::from_secs(2));
        assert_eq!(tool.batch_limit(4), Duration::from_secs(8));
        assert_eq!(tool.batch_limit(1000), MAX_INVOCATION_TIMEOUT);

        let slow = ExifTool::default().timeout(Duration::from_secs(600));
        assert_eq!(slow.batch_limit(3), Duration::from_secs(600));
    }

    /// Write an executable shell script standing in for ExifTool
    #[cfg(unix)]
    fn stub_tool(dir: &tempfile::TempDir, body: &str) -> ExifTool {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("exiftool");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        ExifTool::new(path.to_string_lossy().to_string())
    }

    #[cfg(unix)]
    #[test]
    fn hung_tool_is_killed_and_yields_no_tags() {
        let dir = tempfile::TempDir::new().unwrap();
        let tool = stub_tool(&dir, "exec sleep 10").timeout(Duration::from_secs(1));
        let photo = dir.path().join("a.jpg");

        let started = std::time::Instant::now();
        let result = tool.invoke(&[photo.clone()], true);
        assert!(matches!(
            result,
            Err(MetadataError::Timeout { seconds: 1, files: 1 })
        ));
        assert!(started.elapsed() < Duration::from_secs(5));

        let batch = tool.read_batch(&[(photo, MediaKind::Photo)]);
        assert!(batch.tags.is_empty());
        assert_eq!(batch.warnings.len(), 1);
        assert!(batch.warnings[0].contains("timed out"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_exit_with_output_is_a_warning() {
        let dir = tempfile::TempDir::new().unwrap();
        let photo = dir.path().join("a.jpg");
        let body = format!(
            "echo '[{{\"SourceFile\": \"{}\", \"EXIF:DateTimeOriginal\": \"2024:05:17 14:03:22\"}}]'\n\
             echo 'Error: File format error' >&2\n\
             exit 1",
            source_key(&photo)
        );
        let tool = stub_tool(&dir, &body);

        let batch = tool.read_batch(&[(photo.clone(), MediaKind::Photo)]);

        assert_eq!(batch.tags.len(), 1);
        assert!(batch.tags[&photo].get("DateTimeOriginal").is_some());
        assert_eq!(batch.warnings.len(), 1);
        assert!(batch.warnings[0].contains("File format error"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_exit_without_output_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let tool = stub_tool(&dir, "exit 2");

        let result = tool.invoke(&[dir.path().join("a.jpg")], true);
        assert!(matches!(result, Err(MetadataError::Failed { code: Some(2) })));
    }

    #[test]
    fn empty_invocation_is_a_no_op() {
        let tool = ExifTool::new("/nonexistent/bin/exiftool-xyz");
        let invocation = tool.invoke(&[], true).unwrap();
        assert!(invocation.by_source.is_empty());
    }
}
