//! Reloading a changelog when it changes on disk.
//!
//! The parent directory is watched rather than the file itself, since
//! editors commonly save by replacing the file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};

/// Default quiet period before a burst of events counts as one change.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Collapses bursts of change notifications into one.
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet: Duration,
    pending_since: Option<Instant>,
}

impl Debouncer {
    pub const fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending_since: None,
        }
    }

    /// Record a change seen at `now`. Restarts the quiet period.
    pub fn touch(&mut self, now: Instant) {
        self.pending_since = Some(now);
    }

    /// True once, when the quiet period after the last touch has passed.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.pending_since {
            Some(since) if now.saturating_duration_since(since) >= self.quiet => {
                self.pending_since = None;
                true
            }
            _ => false,
        }
    }

    pub const fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }
}

/// Watches one changelog file for modifications.
pub struct ChangelogWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    dir: PathBuf,
    file: PathBuf,
    file_name: Option<OsString>,
    debouncer: Debouncer,
}

impl ChangelogWatcher {
    /// Start watching `path`.
    ///
    /// # Errors
    /// Returns an error if the watcher cannot be created or the containing
    /// directory cannot be watched.
    pub fn new(path: impl AsRef<Path>, debounce: Duration) -> Result<Self> {
        // OS events carry canonical paths.
        let file = path
            .as_ref()
            .canonicalize()
            .unwrap_or_else(|_| path.as_ref().to_path_buf());
        let file_name = file.file_name().map(std::ffi::OsStr::to_os_string);
        let dir = parent_dir(&file);

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })
        .context("Failed to create file watcher")?;
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;
        tracing::debug!(file = %file.display(), "watching changelog");

        Ok(Self {
            _watcher: watcher,
            rx,
            dir,
            file,
            file_name,
            debouncer: Debouncer::new(debounce),
        })
    }

    /// The canonical path of the watched changelog.
    pub fn path(&self) -> &Path {
        &self.file
    }

    /// Drain pending events; true once a debounced change is ready.
    pub fn poll_changed(&mut self) -> bool {
        let mut relevant = 0u32;
        let mut ignored = 0u32;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                Ok(ev) if self.concerns_file(&ev) => relevant += 1,
                Ok(ev) => {
                    ignored += 1;
                    tracing::trace!(kind = ?ev.kind, paths = ?ev.paths, "ignoring unrelated event");
                }
                Err(err) => {
                    tracing::warn!(%err, "file watcher error");
                    crate::perf::log_event("watcher.error", format!("{err}"));
                }
            }
        }
        if relevant + ignored > 0 {
            crate::perf::log_event(
                "watcher.poll",
                format!(
                    "relevant={relevant} ignored={ignored} file={}",
                    self.file.display()
                ),
            );
        }

        let now = Instant::now();
        if relevant > 0 {
            self.debouncer.touch(now);
        }
        self.debouncer.ready(now)
    }

    fn concerns_file(&self, event: &Event) -> bool {
        event.paths.iter().any(|path| {
            path == &self.dir
                || path == &self.file
                || self
                    .file_name
                    .as_ref()
                    .is_some_and(|name| path.file_name().is_some_and(|f| f == name))
        })
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}
