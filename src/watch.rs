//! Model file watcher for continuous checking
//!
//! Watches model documents and reports which of them changed, so the caller
//! can reload the graph and scan again.

use crate::check::CancellationToken;
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

/// Extensions of loadable model documents
pub const MODEL_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

const DEBOUNCE: Duration = Duration::from_millis(300);

/// How often the watch loop polls the cancellation token
const POLL_INTERVAL: Duration = Duration::from_millis(200);

type EventResult = Result<Vec<DebouncedEvent>, notify::Error>;

/// Debounced watcher over model files and directories
pub struct ModelWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    receiver: Receiver<EventResult>,
    paths: Vec<PathBuf>,
}

impl ModelWatcher {
    /// Watch the given files or directories
    pub fn new(paths: &[PathBuf]) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let mut debouncer = new_debouncer(DEBOUNCE, tx)?;

        for path in paths {
            let watch_path = if path.is_file() {
                path.parent().unwrap_or(Path::new("."))
            } else {
                path.as_path()
            };
            debouncer
                .watcher()
                .watch(watch_path, RecursiveMode::Recursive)?;
        }

        Ok(Self {
            _debouncer: debouncer,
            receiver: rx,
            paths: paths.to_vec(),
        })
    }

    /// Wait up to `timeout` for changed model files
    ///
    /// Returns `Ok(None)` on timeout or when only unrelated files changed.
    pub fn next_change(&self, timeout: Duration) -> Result<Option<Vec<PathBuf>>, notify::Error> {
        match self.receiver.recv_timeout(timeout) {
            Ok(Ok(events)) => Ok(self.relevant(events)),
            Ok(Err(e)) => Err(e),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    fn relevant(&self, events: Vec<DebouncedEvent>) -> Option<Vec<PathBuf>> {
        let mut changed: Vec<PathBuf> = Vec::new();
        for event in events {
            if self.is_watched(&event.path)
                && is_model_file(&event.path)
                && !changed.contains(&event.path)
            {
                changed.push(event.path);
            }
        }
        (!changed.is_empty()).then_some(changed)
    }

    fn is_watched(&self, path: &Path) -> bool {
        self.paths.iter().any(|watched| {
            if watched.is_file() {
                path == watched
            } else {
                path.starts_with(watched)
            }
        })
    }

    /// Get the watched paths
    pub fn watched_paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

/// Whether `path` looks like a model document
pub fn is_model_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| MODEL_EXTENSIONS.contains(&ext.as_str()))
}

/// Run `callback` once, then again after each batch of model changes
///
/// The loop ends when `cancel` is set. The callback receives the changed
/// paths, or the full watched set for the initial run.
pub fn watch_and_run<F>(
    paths: &[PathBuf],
    clear_screen: bool,
    cancel: &CancellationToken,
    mut callback: F,
) -> Result<(), notify::Error>
where
    F: FnMut(&[PathBuf]),
{
    let watcher = ModelWatcher::new(paths)?;

    if clear_screen {
        print!("\x1B[2J\x1B[1;1H");
    }
    callback(paths);

    while !cancel.is_cancelled() {
        match watcher.next_change(POLL_INTERVAL) {
            Ok(Some(changed)) => {
                log::debug!("model files changed: {:?}", changed);
                if clear_screen {
                    print!("\x1B[2J\x1B[1;1H");
                }
                callback(&changed);
            }
            Ok(None) => {}
            Err(e) => log::warn!("watch error: {}", e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_watcher_creation() {
        let temp = TempDir::new().unwrap();
        assert!(ModelWatcher::new(&[temp.path().to_path_buf()]).is_ok());
    }

    #[test]
    fn test_model_file_filter() {
        assert!(is_model_file(Path::new("forms/products.yaml")));
        assert!(is_model_file(Path::new("products.YML")));
        assert!(is_model_file(Path::new("products.json")));
        assert!(!is_model_file(Path::new("products.bsl")));
        assert!(!is_model_file(Path::new("Makefile")));
    }

    #[test]
    fn test_path_matching() {
        let temp = TempDir::new().unwrap();
        let watched_file = temp.path().join("form.yaml");
        fs::write(&watched_file, "kind: form").unwrap();

        let watcher = ModelWatcher::new(&[watched_file.clone()]).unwrap();
        assert!(watcher.is_watched(&watched_file));
        assert!(!watcher.is_watched(Path::new("/other/form.yaml")));
    }

    #[test]
    fn test_directory_matching() {
        let temp = TempDir::new().unwrap();
        let watcher = ModelWatcher::new(&[temp.path().to_path_buf()]).unwrap();
        assert!(watcher.is_watched(&temp.path().join("sub/form.yaml")));
    }

    #[test]
    fn test_cancelled_loop_runs_once() {
        let temp = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut runs = 0;
        watch_and_run(&[temp.path().to_path_buf()], false, &cancel, |_| runs += 1).unwrap();
        assert_eq!(runs, 1);
    }
}
