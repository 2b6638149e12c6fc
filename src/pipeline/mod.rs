//! Changelog loading: parse, slug, segment, filter and project a ToC.
//!
//! [`load`] runs the whole flow synchronously. [`Worker`] runs it on a
//! background thread where only the most recent request matters: older
//! queued jobs are skipped and results for superseded requests are dropped.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::changelog::{Segment, SegmentFilter, Segmentation, segment, segments_toc};
use crate::document::{Node, TocEntry, parse_with_ids};

/// How the filter expression of a load was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FilterStatus {
    /// No expression; all segments selected.
    Unset,
    Applied { expr: String },
    /// The expression did not parse and was ignored.
    Invalid { expr: String, reason: String },
}

impl FilterStatus {
    fn of(filter: &SegmentFilter, expr: &str) -> Self {
        match filter {
            SegmentFilter::All => Self::Unset,
            SegmentFilter::Range(range) => Self::Applied {
                expr: range.to_string(),
            },
            SegmentFilter::Invalid { error, .. } => Self::Invalid {
                expr: expr.trim().to_string(),
                reason: error.to_string(),
            },
        }
    }
}

/// Everything derived from one changelog source.
#[derive(Debug, Clone)]
pub struct Loaded {
    /// Parsed tree with heading ids assigned.
    pub root: Node,
    pub segmentation: Segmentation,
    /// Indices into `segmentation.segments()` that passed the filter.
    pub selected: Vec<usize>,
    /// Table of contents of the selected segments.
    pub toc: Vec<TocEntry>,
    pub filter: FilterStatus,
}

impl Loaded {
    /// Selected segments in document order.
    pub fn selected_segments(&self) -> Vec<&Segment> {
        let all = self.segmentation.segments();
        self.selected.iter().filter_map(|&idx| all.get(idx)).collect()
    }

    pub fn preamble(&self) -> Option<&Segment> {
        self.segmentation.preamble()
    }
}

/// Parse `source` and narrow it down to the segments matching `filter`.
///
/// Never fails: malformed markdown still yields a tree and a bad filter
/// expression selects everything (see [`FilterStatus::Invalid`]).
pub fn load(source: &str, filter: &str) -> Loaded {
    let _scope = crate::perf::scope("pipeline.load");
    let root = parse_with_ids(source);
    let segmentation = segment(&root, source);
    let segment_filter = SegmentFilter::from_expr(filter);
    let selected = segment_filter.apply_indices(segmentation.segments());
    let toc = segments_toc(
        selected
            .iter()
            .filter_map(|&idx| segmentation.segments().get(idx)),
    );
    let status = FilterStatus::of(&segment_filter, filter);

    crate::perf::log_event(
        "pipeline.load",
        format!(
            "bytes={} segments={} selected={} toc={}",
            source.len(),
            segmentation.segments().len(),
            selected.len(),
            toc.len()
        ),
    );

    Loaded {
        root,
        segmentation,
        selected,
        toc,
        filter: status,
    }
}

/// Identifies one submitted load. Later requests compare greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Job {
    id: RequestId,
    source: String,
    filter: String,
}

/// A finished load.
#[derive(Debug)]
pub struct Response {
    pub id: RequestId,
    pub loaded: Loaded,
}

/// Background loader with last-request-wins semantics.
pub struct Worker {
    jobs: Option<Sender<Job>>,
    results: Receiver<Response>,
    latest: Arc<AtomicU64>,
    next: u64,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start the worker thread.
    ///
    /// # Errors
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn() -> std::io::Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (result_tx, result_rx) = mpsc::channel();
        let latest = Arc::new(AtomicU64::new(0));
        let worker_latest = Arc::clone(&latest);

        let handle = thread::Builder::new()
            .name("changelog-loader".to_string())
            .spawn(move || run(&job_rx, &result_tx, &worker_latest))?;

        Ok(Self {
            jobs: Some(job_tx),
            results: result_rx,
            latest,
            next: 0,
            handle: Some(handle),
        })
    }

    /// Queue a load. Does not wait for any earlier request to finish.
    pub fn submit(&mut self, source: impl Into<String>, filter: impl Into<String>) -> RequestId {
        self.next += 1;
        let id = RequestId(self.next);
        self.latest.store(id.0, Ordering::SeqCst);
        let job = Job {
            id,
            source: source.into(),
            filter: filter.into(),
        };
        let sent = self.jobs.as_ref().is_some_and(|jobs| jobs.send(job).is_ok());
        if !sent {
            tracing::warn!(%id, "changelog loader has stopped; request dropped");
        }
        id
    }

    /// The most recently submitted request, if any.
    pub fn latest(&self) -> Option<RequestId> {
        match self.latest.load(Ordering::SeqCst) {
            0 => None,
            id => Some(RequestId(id)),
        }
    }

    /// Wait up to `timeout` for the result of the latest request.
    ///
    /// Results of superseded requests are discarded along the way.
    pub fn recv_latest(&self, timeout: Duration) -> Option<Response> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.results.recv_timeout(remaining) {
                Ok(response) if self.is_latest(response.id) => return Some(response),
                Ok(stale) => {
                    tracing::trace!(id = %stale.id, "dropping stale load result");
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
            }
        }
    }

    /// Non-blocking variant of [`Worker::recv_latest`].
    pub fn try_recv_latest(&self) -> Option<Response> {
        while let Ok(response) = self.results.try_recv() {
            if self.is_latest(response.id) {
                return Some(response);
            }
            tracing::trace!(id = %response.id, "dropping stale load result");
        }
        None
    }

    fn is_latest(&self, id: RequestId) -> bool {
        id.0 == self.latest.load(Ordering::SeqCst)
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop.
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(jobs: &Receiver<Job>, results: &Sender<Response>, latest: &AtomicU64) {
    for job in jobs {
        if job.id.0 < latest.load(Ordering::SeqCst) {
            tracing::trace!(id = %job.id, "skipping superseded load");
            crate::perf::log_event("pipeline.skip", format!("id={}", job.id));
            continue;
        }
        let loaded = load(&job.source, &job.filter);
        if results.send(Response { id: job.id, loaded }).is_err() {
            break;
        }
    }
    tracing::debug!("changelog loader stopped");
}
