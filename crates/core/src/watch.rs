//! Source watcher
//!
//! Watches the source tree with a debounced `notify` watcher and re-runs the dev task
//! responsible for each changed path. Every re-run uses a fresh runner so a task runs
//! again even if it already ran earlier in the process. Successful re-runs are
//! announced on the live-reload channel; failures are logged and watching continues.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::configs::build::BuildConfig;
use crate::execution::TaskRunner;
use crate::registry::TaskRegistry;
use crate::server::LiveReload;
use crate::types::{MarshalError, MarshalResult};

/// Changes below `path` (with a matching extension, if one is set) re-run `task`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRule {
    pub path: PathBuf,
    pub extension: Option<&'static str>,
    pub task: &'static str,
}

impl WatchRule {
    fn new(path: PathBuf, extension: Option<&'static str>, task: &'static str) -> Self {
        Self {
            path,
            extension,
            task,
        }
    }

    pub fn matches(&self, changed: &Path) -> bool {
        if !changed.starts_with(&self.path) {
            return false;
        }
        match self.extension {
            Some(ext) => changed.extension().is_some_and(|e| e == ext),
            None => true,
        }
    }
}

/// The source-to-task mapping for a project
pub fn watch_rules(root: &Path, build: &BuildConfig) -> Vec<WatchRule> {
    let src = &build.src;
    let scss_dir = Path::new(&src.app_scss)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    vec![
        WatchRule::new(root.join(&src.images), None, "copy-images"),
        WatchRule::new(root.join(&src.app_views), Some("html"), "copy-views"),
        WatchRule::new(root.join(&src.common_views), Some("html"), "copy-views-common"),
        WatchRule::new(root.join(&src.fonts), None, "copy-fonts"),
        WatchRule::new(root.join(scss_dir), Some("scss"), "sass"),
        WatchRule::new(root.join(&src.app_js), Some("js"), "build-js-linear"),
        WatchRule::new(root.join(&src.common_js), Some("js"), "build-js-vendor"),
        WatchRule::new(root.join(&src.index), None, "index"),
    ]
}

/// Tasks to re-run for a batch of changed paths, in rule order and without repeats
pub fn tasks_for_changes(rules: &[WatchRule], changed: &[PathBuf]) -> Vec<&'static str> {
    let mut tasks = Vec::new();
    for rule in rules {
        if tasks.contains(&rule.task) {
            continue;
        }
        if changed.iter().any(|path| rule.matches(path)) {
            tasks.push(rule.task);
        }
    }
    tasks
}

/// A running watcher; dropping it stops the file notifications
pub struct WatchHandle {
    _debouncer: Debouncer<RecommendedWatcher>,
    join: JoinHandle<()>,
}

impl WatchHandle {
    pub fn stop(self) {
        self.join.abort();
    }
}

/// Start watching the rule paths that exist
pub fn spawn(
    rules: Vec<WatchRule>,
    interval: Duration,
    registry: Weak<TaskRegistry>,
    livereload: LiveReload,
) -> MarshalResult<WatchHandle> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut debouncer = new_debouncer(interval, move |result: DebounceEventResult| {
        let _ = tx.send(result);
    })
    .map_err(watch_error)?;

    for rule in &rules {
        if !rule.path.exists() {
            debug!(path = %rule.path.display(), "Skipping missing watch path");
            continue;
        }
        let mode = if rule.path.is_dir() {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        debouncer
            .watcher()
            .watch(&rule.path, mode)
            .map_err(watch_error)?;
    }

    let join = tokio::spawn(watch_loop(rules, rx, registry, livereload));
    info!("Watching for changes");
    Ok(WatchHandle {
        _debouncer: debouncer,
        join,
    })
}

async fn watch_loop(
    rules: Vec<WatchRule>,
    mut rx: mpsc::UnboundedReceiver<DebounceEventResult>,
    registry: Weak<TaskRegistry>,
    livereload: LiveReload,
) {
    while let Some(result) = rx.recv().await {
        let events = match result {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Watch error");
                continue;
            }
        };

        let changed: Vec<PathBuf> = events.into_iter().map(|event| event.path).collect();
        let tasks = tasks_for_changes(&rules, &changed);
        if tasks.is_empty() {
            continue;
        }

        let Some(registry) = registry.upgrade() else {
            break;
        };
        for task in tasks {
            debug!(task, changes = changed.len(), "Source changed");
            match TaskRunner::new(Arc::clone(&registry)).run(task).await {
                Ok(()) => {
                    livereload.notify(task);
                }
                Err(e) => error!(task, error = %e, "Rebuild failed"),
            }
        }
    }
}

fn watch_error(e: notify::Error) -> MarshalError {
    MarshalError::Config(format!("Failed to watch sources: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Task;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_changes_map_to_tasks() {
        let root = Path::new("/project");
        let rules = watch_rules(root, &BuildConfig::default());

        let changed = vec![
            root.join("src/app/scss/partials/_buttons.scss"),
            root.join("src/app/js/controllers/home.js"),
            root.join("src/app/js/controllers/about.js"),
            root.join("src/index.html"),
        ];
        assert_eq!(
            tasks_for_changes(&rules, &changed),
            vec!["sass", "build-js-linear", "index"]
        );
    }

    #[test]
    fn test_extension_filter() {
        let root = Path::new("/project");
        let rules = watch_rules(root, &BuildConfig::default());
        assert!(tasks_for_changes(&rules, &[root.join("src/app/views/notes.txt")]).is_empty());
        assert_eq!(
            tasks_for_changes(&rules, &[root.join("src/common/views/header.html")]),
            vec!["copy-views-common"]
        );
        assert_eq!(
            tasks_for_changes(&rules, &[root.join("src/images/icons/logo.svg")]),
            vec!["copy-images"]
        );
    }

    #[tokio::test]
    async fn test_change_reruns_task_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(root.join("src/images")).unwrap();

        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let mut registry = TaskRegistry::new();
        registry
            .register(Task::sync("copy-images", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .unwrap();
        let registry = Arc::new(registry);

        let livereload = LiveReload::default();
        let mut rx = livereload.subscribe();
        let rules = vec![WatchRule::new(root.join("src/images"), None, "copy-images")];
        let handle = spawn(
            rules,
            Duration::from_millis(100),
            Arc::downgrade(&registry),
            livereload,
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        std::fs::write(root.join("src/images/logo.png"), "png").unwrap();

        let task = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(task, "copy-images");
        assert!(runs.load(Ordering::SeqCst) >= 1);
        handle.stop();
    }
}
