//! Executor for organization plans.

use super::types::*;
use crate::error::ActionError;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;
use tracing::{info, warn};

/// Executes organization plans
pub struct OrganizeExecutor;

impl OrganizeExecutor {
    /// Execute a plan with a progress callback.
    ///
    /// Items run in parallel on the current rayon pool; destinations were
    /// reserved by the planner so no two items touch the same path. A failed
    /// action is recorded and the rest of the plan carries on.
    pub fn execute<F>(plan: &OrganizePlan, dry_run: bool, on_progress: F) -> OrganizeResult
    where
        F: Fn(usize, usize, &Path) + Sync,
    {
        let start = Instant::now();
        let total = plan.action_count();

        let done = AtomicUsize::new(0);
        let succeeded = AtomicUsize::new(0);
        let total_size = AtomicU64::new(0);
        let errors: Mutex<Vec<String>> = Mutex::new(Vec::new());
        let created_dirs: Mutex<HashSet<PathBuf>> = Mutex::new(HashSet::new());

        plan.items.par_iter().for_each(|item| {
            for (i, action) in item.actions().enumerate() {
                let outcome = if dry_run {
                    info!(
                        "WOULD {} {} -> {}",
                        action.op,
                        action.source.display(),
                        action.destination.display()
                    );
                    Ok(())
                } else {
                    perform(action, &created_dirs)
                };

                let completed = done.fetch_add(1, Ordering::Relaxed) + 1;
                on_progress(completed, total, &action.source);

                match outcome {
                    Ok(()) => {
                        succeeded.fetch_add(1, Ordering::Relaxed);
                        total_size.fetch_add(action.size_bytes, Ordering::Relaxed);
                    }
                    Err(e) => {
                        warn!("{}", e);
                        if let Ok(mut errors) = errors.lock() {
                            errors.push(e.to_string());
                        }
                        // Attached files stay with their primary
                        if i == 0 {
                            let remaining = item.attached.len();
                            done.fetch_add(remaining, Ordering::Relaxed);
                            break;
                        }
                    }
                }
            }
        });

        let errors = errors.into_inner().unwrap_or_default();
        let folders_created = created_dirs.into_inner().map(|d| d.len()).unwrap_or(0);

        OrganizeResult {
            succeeded: succeeded.into_inner(),
            failed: errors.len(),
            folders_created,
            total_size_bytes: total_size.into_inner(),
            duration_ms: start.elapsed().as_millis() as u64,
            errors,
        }
    }
}

/// Run one action against the filesystem
fn perform(action: &PlannedAction, created_dirs: &Mutex<HashSet<PathBuf>>) -> Result<(), ActionError> {
    let source = action.source.as_path();
    let dest = action.destination.as_path();

    if !source.exists() {
        return Err(ActionError::SourceMissing {
            path: source.to_path_buf(),
        });
    }

    // Create parent directories if needed
    if let Some(parent) = dest.parent() {
        let known = created_dirs
            .lock()
            .map(|dirs| dirs.contains(parent))
            .unwrap_or(false);
        if !known {
            fs::create_dir_all(parent).map_err(|source| ActionError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
            if let Ok(mut dirs) = created_dirs.lock() {
                dirs.insert(parent.to_path_buf());
            }
        }
    }

    let transfer = |verb: &'static str| {
        move |source_err: std::io::Error| ActionError::Transfer {
            verb,
            from: source.to_path_buf(),
            to: dest.to_path_buf(),
            source: source_err,
        }
    };

    match action.op {
        FileOp::Copy => fs::copy(source, dest).map(|_| ()).map_err(transfer("copy")),
        FileOp::Rename => fs::rename(source, dest).map_err(transfer("rename")),
        FileOp::Move => {
            if fs::rename(source, dest).is_ok() {
                return Ok(());
            }
            // rename fails across filesystems, fall back to copy+delete
            // with size verification before deleting source
            let expected = fs::metadata(source).map_err(transfer("move"))?.len();
            fs::copy(source, dest).map_err(transfer("move"))?;

            let actual = fs::metadata(dest).map_err(transfer("move"))?.len();
            if actual != expected {
                let _ = fs::remove_file(dest);
                return Err(ActionError::SizeMismatch {
                    path: dest.to_path_buf(),
                    expected,
                    actual,
                });
            }

            fs::remove_file(source).map_err(transfer("move"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    fn action(source: PathBuf, destination: PathBuf, op: FileOp, role: ActionRole) -> PlannedAction {
        PlannedAction {
            source,
            destination,
            op,
            role,
            size_bytes: 12,
            has_conflict: false,
        }
    }

    fn plan_of(items: Vec<PlannedItem>) -> OrganizePlan {
        let mut plan = OrganizePlan::new("test".to_string());
        plan.items = items;
        plan
    }

    fn write(path: &Path) {
        let mut f = fs::File::create(path).unwrap();
        f.write_all(b"test content").unwrap();
    }

    #[test]
    fn test_execute_copy() {
        let temp_src = TempDir::new().unwrap();
        let temp_dest = TempDir::new().unwrap();
        let src_file = temp_src.path().join("test.jpg");
        write(&src_file);

        let dest = temp_dest.path().join("2024/01/test.jpg");
        let plan = plan_of(vec![PlannedItem::new(action(
            src_file.clone(),
            dest.clone(),
            FileOp::Copy,
            ActionRole::Winner,
        ))]);

        let result = OrganizeExecutor::execute(&plan, false, |_, _, _| {});

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.folders_created, 1);
        assert!(src_file.exists()); // Original still exists
        assert_eq!(fs::read(&dest).unwrap(), b"test content");
    }

    #[test]
    fn test_execute_move_with_sidecar() {
        let temp_src = TempDir::new().unwrap();
        let temp_dest = TempDir::new().unwrap();
        let src_file = temp_src.path().join("test.jpg");
        let src_xmp = temp_src.path().join("test.xmp");
        write(&src_file);
        write(&src_xmp);

        let dest = temp_dest.path().join("2024/01/renamed.jpg");
        let dest_xmp = temp_dest.path().join("2024/01/renamed.xmp");
        let mut item = PlannedItem::new(action(src_file.clone(), dest.clone(), FileOp::Move, ActionRole::Winner));
        item.attached.push(action(src_xmp.clone(), dest_xmp.clone(), FileOp::Move, ActionRole::Sidecar));

        let result = OrganizeExecutor::execute(&plan_of(vec![item]), false, |_, _, _| {});

        assert_eq!(result.succeeded, 2);
        assert!(!src_file.exists()); // Original moved
        assert!(!src_xmp.exists());
        assert!(dest.exists());
        assert!(dest_xmp.exists());
    }

    #[test]
    fn test_execute_rename_in_place() {
        let temp = TempDir::new().unwrap();
        let src_file = temp.path().join("IMG_0001.jpg");
        write(&src_file);
        let dest = temp.path().join("2024-05-17-140322-abcdef12.jpg");

        let plan = plan_of(vec![PlannedItem::new(action(
            src_file.clone(),
            dest.clone(),
            FileOp::Rename,
            ActionRole::Winner,
        ))]);
        let result = OrganizeExecutor::execute(&plan, false, |_, _, _| {});

        assert_eq!(result.succeeded, 1);
        assert!(!src_file.exists());
        assert!(dest.exists());
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp_src = TempDir::new().unwrap();
        let temp_dest = TempDir::new().unwrap();
        let src_file = temp_src.path().join("test.jpg");
        write(&src_file);
        let dest = temp_dest.path().join("2024/01/test.jpg");

        let plan = plan_of(vec![PlannedItem::new(action(
            src_file.clone(),
            dest.clone(),
            FileOp::Move,
            ActionRole::Winner,
        ))]);
        let result = OrganizeExecutor::execute(&plan, true, |_, _, _| {});

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.folders_created, 0);
        assert!(src_file.exists());
        assert!(!temp_dest.path().join("2024").exists());
    }

    #[test]
    fn test_missing_source_does_not_abort_others() {
        let temp_src = TempDir::new().unwrap();
        let temp_dest = TempDir::new().unwrap();
        let present = temp_src.path().join("present.jpg");
        write(&present);

        let mut broken = PlannedItem::new(action(
            PathBuf::from("/nonexistent/file.jpg"),
            temp_dest.path().join("a/file.jpg"),
            FileOp::Copy,
            ActionRole::Winner,
        ));
        broken.attached.push(action(
            PathBuf::from("/nonexistent/file.xmp"),
            temp_dest.path().join("a/file.xmp"),
            FileOp::Copy,
            ActionRole::Sidecar,
        ));
        let fine = PlannedItem::new(action(
            present,
            temp_dest.path().join("b/present.jpg"),
            FileOp::Copy,
            ActionRole::Winner,
        ));

        let calls = AtomicUsize::new(0);
        let last_total = AtomicUsize::new(0);
        let result = OrganizeExecutor::execute(&plan_of(vec![broken, fine]), false, |_, total, _| {
            calls.fetch_add(1, Ordering::Relaxed);
            last_total.store(total, Ordering::Relaxed);
        });

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 1);
        assert!(result.errors[0].contains("/nonexistent/file.jpg"));
        assert!(temp_dest.path().join("b/present.jpg").exists());
        assert_eq!(calls.load(Ordering::Relaxed), 2);
        assert_eq!(last_total.load(Ordering::Relaxed), 3);
    }
}
