//! Best-effort deletion of transient files.

use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::{debug, warn};

/// Deletes temporary files once they have served their response.
///
/// Deletion never fails from the caller's point of view: files that are
/// already gone are ignored, other errors are logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TempFileReaper;

impl TempFileReaper {
    pub fn new() -> Self {
        Self
    }

    /// Schedule deletion of `paths` without waiting for it.
    ///
    /// Runs on a background task when called inside a Tokio runtime and
    /// falls back to synchronous removal otherwise.
    pub fn delete(&self, paths: Vec<PathBuf>) {
        if paths.is_empty() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let reaper = *self;
                handle.spawn(async move { reaper.delete_now(paths).await });
            }
            Err(_) => {
                for path in paths {
                    log_outcome(&path, std::fs::remove_file(&path));
                }
            }
        }
    }

    /// Delete `paths` and wait for completion.
    pub async fn delete_now(&self, paths: Vec<PathBuf>) {
        for path in paths {
            let result = tokio::fs::remove_file(&path).await;
            log_outcome(&path, result);
        }
    }
}

fn log_outcome(path: &std::path::Path, result: std::io::Result<()>) {
    match result {
        Ok(()) => debug!(path = %path.display(), "Reaped temporary file"),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "Temporary file already gone")
        }
        Err(e) => warn!(path = %path.display(), "Failed to delete temporary file: {}", e),
    }
}
