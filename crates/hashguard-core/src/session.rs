use parking_lot::{Condvar, Mutex};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::hasher::FileHasher;
use crate::model::{FileRecord, MatchList, ScanEvent, ScanState, Verdict};
use crate::progress::ProgressReporter;
use crate::scanner::walk::DirectoryWalker;
use crate::signatures::SignatureStore;

/// Upper bound on how long a paused scan sleeps before re-checking its
/// state, in case a wake-up is missed.
const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Suspension and cancellation token shared between a running session and
/// whoever controls it. Clones refer to the same session.
#[derive(Debug, Clone)]
pub struct ScanControl {
    inner: Arc<ControlInner>,
}

#[derive(Debug)]
struct ControlInner {
    state: Mutex<ScanState>,
    wake: Condvar,
}

enum Checkpoint {
    Continue,
    Stop,
}

impl ScanControl {
    fn new() -> Self {
        Self {
            inner: Arc::new(ControlInner {
                state: Mutex::new(ScanState::Idle),
                wake: Condvar::new(),
            }),
        }
    }

    pub fn state(&self) -> ScanState {
        *self.inner.state.lock()
    }

    /// Running → Paused. Returns false when there was nothing to pause.
    pub fn pause(&self) -> bool {
        let mut state = self.inner.state.lock();
        if *state == ScanState::Running {
            *state = ScanState::Paused;
            true
        } else {
            false
        }
    }

    /// Paused → Running.
    pub fn resume(&self) -> bool {
        let mut state = self.inner.state.lock();
        if *state == ScanState::Paused {
            *state = ScanState::Running;
            self.inner.wake.notify_all();
            true
        } else {
            false
        }
    }

    /// Request a stop. Irreversible; observed at the next file boundary.
    pub fn stop(&self) -> bool {
        let mut state = self.inner.state.lock();
        if state.is_terminal() || *state == ScanState::Stopping {
            return false;
        }
        *state = ScanState::Stopping;
        self.inner.wake.notify_all();
        true
    }

    fn begin(&self) -> Result<(), ScanState> {
        let mut state = self.inner.state.lock();
        match *state {
            ScanState::Idle => {
                *state = ScanState::Running;
                Ok(())
            }
            other => Err(other),
        }
    }

    /// Blocks while paused; tells the caller whether to keep going.
    fn checkpoint(&self) -> Checkpoint {
        let mut state = self.inner.state.lock();
        loop {
            match *state {
                ScanState::Running => return Checkpoint::Continue,
                ScanState::Paused => {
                    self.inner.wake.wait_for(&mut state, PAUSE_POLL_INTERVAL);
                }
                _ => return Checkpoint::Stop,
            }
        }
    }

    pub(crate) fn finish(&self, final_state: ScanState) {
        let mut state = self.inner.state.lock();
        *state = final_state;
        self.inner.wake.notify_all();
    }
}

/// Result of one session run.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub event: ScanEvent,
    pub matches: MatchList,
    pub processed: usize,
    pub total: usize,
    pub unreadable: usize,
    pub duration: Duration,
}

/// Fails with `InvalidTarget` unless `root` is an existing directory.
pub fn validate_target(root: &Path) -> Result<(), Error> {
    match fs::metadata(root) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::InvalidTarget {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        }),
        Err(e) => Err(Error::InvalidTarget {
            path: root.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// One walk → hash → match → report pass over a directory tree.
pub struct ScanSession {
    root: PathBuf,
    walker: DirectoryWalker,
    hasher: FileHasher,
    control: ScanControl,
}

impl ScanSession {
    pub fn new(root: impl Into<PathBuf>, walker: DirectoryWalker) -> Result<Self, Error> {
        let root = root.into();
        validate_target(&root)?;
        Ok(Self {
            root,
            walker,
            hasher: FileHasher::new(),
            control: ScanControl::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn control(&self) -> ScanControl {
        self.control.clone()
    }

    pub fn state(&self) -> ScanState {
        self.control.state()
    }

    pub fn run(&self, store: &SignatureStore, reporter: &dyn ProgressReporter) -> SessionOutcome {
        self.run_with(store, reporter, |_| {})
    }

    /// Runs the session to completion, stop, or failure. `on_match` sees each
    /// infected record as soon as it is found, before the reporter does.
    ///
    /// Total progress comes from a full pre-pass count; files created after it
    /// are still scanned but the total is raised to match.
    pub fn run_with<F>(
        &self,
        store: &SignatureStore,
        reporter: &dyn ProgressReporter,
        mut on_match: F,
    ) -> SessionOutcome
    where
        F: FnMut(&FileRecord),
    {
        let started = Instant::now();
        let mut outcome = SessionOutcome {
            event: ScanEvent::Stopped,
            matches: MatchList::new(),
            processed: 0,
            total: 0,
            unreadable: 0,
            duration: Duration::ZERO,
        };

        match self.control.begin() {
            Ok(()) => {}
            Err(ScanState::Stopping) => return self.finish(outcome, started, reporter),
            Err(state) => {
                outcome.event = ScanEvent::Failed(format!("session already {}", state));
                outcome.duration = started.elapsed();
                return outcome;
            }
        }

        reporter.on_scan_start(&self.root);
        info!("Scanning directory: {}", self.root.display());

        if let Err(err) = validate_target(&self.root) {
            outcome.event = ScanEvent::Failed(err.to_string());
            return self.finish(outcome, started, reporter);
        }

        let count_start = Instant::now();
        for _ in self.walker.walk(&self.root) {
            if let Checkpoint::Stop = self.control.checkpoint() {
                return self.finish(outcome, started, reporter);
            }
            outcome.total += 1;
        }
        debug!(
            "Counted {} files in {:.2}s",
            outcome.total,
            count_start.elapsed().as_secs_f64()
        );
        reporter.on_count_complete(outcome.total);
        if outcome.total == 0 {
            info!("No files found to scan in {}", self.root.display());
        }

        let mut paths = self.walker.walk(&self.root);
        loop {
            if let Checkpoint::Stop = self.control.checkpoint() {
                info!(
                    "Scan stopped by user after {} of {} files",
                    outcome.processed, outcome.total
                );
                return self.finish(outcome, started, reporter);
            }
            let Some(path) = paths.next() else {
                break;
            };

            let record = self.examine(path, store);
            match record.verdict {
                Verdict::Infected => {
                    warn!("Infected: {}", record.path.display());
                    outcome.matches.push(record.clone());
                    on_match(&record);
                }
                Verdict::Unreadable => outcome.unreadable += 1,
                Verdict::Safe => {}
            }
            reporter.on_file_scanned(&record);

            outcome.processed += 1;
            outcome.total = outcome.total.max(outcome.processed);
            reporter.on_scan_progress(outcome.processed, outcome.total);
        }

        outcome.event = if outcome.matches.is_empty() {
            ScanEvent::CompletedClean
        } else {
            ScanEvent::CompletedWithMatches(outcome.matches.clone())
        };
        self.finish(outcome, started, reporter)
    }

    fn examine(&self, path: PathBuf, store: &SignatureStore) -> FileRecord {
        match self.hasher.hash(&path) {
            Ok(fingerprint) => {
                let verdict = if store.contains(&fingerprint) {
                    Verdict::Infected
                } else {
                    Verdict::Safe
                };
                FileRecord {
                    path,
                    fingerprint: Some(fingerprint),
                    verdict,
                }
            }
            Err(err) => {
                warn!("{}", err);
                FileRecord {
                    path,
                    fingerprint: None,
                    verdict: Verdict::Unreadable,
                }
            }
        }
    }

    fn finish(
        &self,
        mut outcome: SessionOutcome,
        started: Instant,
        reporter: &dyn ProgressReporter,
    ) -> SessionOutcome {
        outcome.duration = started.elapsed();
        self.control.finish(outcome.event.final_state());

        match &outcome.event {
            ScanEvent::CompletedClean => info!(
                "Scan completed in {:.2}s: {} files, no infected files detected",
                outcome.duration.as_secs_f64(),
                outcome.processed
            ),
            ScanEvent::CompletedWithMatches(matches) => warn!(
                "Scan completed in {:.2}s: {} infected files found among {}",
                outcome.duration.as_secs_f64(),
                matches.len(),
                outcome.processed
            ),
            ScanEvent::Stopped => info!(
                "Scan stopped: {} of {} files processed, {} infected",
                outcome.processed,
                outcome.total,
                outcome.matches.len()
            ),
            ScanEvent::Failed(reason) => warn!("Scan failed: {}", reason),
        }

        reporter.on_scan_finished(&outcome.event);
        outcome
    }
}
