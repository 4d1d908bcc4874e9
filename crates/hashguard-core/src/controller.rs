use parking_lot::Mutex;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::model::{ActionReport, MatchList, ScanEvent, ScanState};
use crate::progress::ProgressReporter;
use crate::quarantine;
use crate::scanner::walk::DirectoryWalker;
use crate::schedule::Ticker;
use crate::session::ScanSession;
use crate::signatures::{SignatureSource, SignatureStore};

/// Single entry point for manual scans, the auto-scan timer, the
/// signature-refresh timer, and quarantine/delete.
///
/// At most one session is active at a time; a trigger arriving while one is
/// running, paused, or stopping is rejected with `AlreadyRunning`.
/// Quarantine and delete take the same lock as scan starts, so they never
/// overlap each other or a scan.
///
/// The signature store is synchronised separately. A refresh during a scan
/// takes effect from the next file onward.
#[derive(Clone)]
pub struct ScanController {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<SignatureStore>,
    reporter: Arc<dyn ProgressReporter>,
    walker: DirectoryWalker,
    state: Mutex<ControllerState>,
    next_id: AtomicU64,
}

struct ControllerState {
    active: Option<ActiveScan>,
    last_state: ScanState,
    last_event: Option<ScanEvent>,
    matches: MatchList,
}

struct ActiveScan {
    id: u64,
    root: PathBuf,
    control: crate::session::ScanControl,
    handle: Option<JoinHandle<()>>,
}

impl ControllerState {
    fn current(&self) -> ScanState {
        match &self.active {
            // Idle here means the worker has not picked the session up yet.
            Some(active) => match active.control.state() {
                ScanState::Idle => ScanState::Running,
                state => state,
            },
            None => self.last_state,
        }
    }
}

impl ScanController {
    pub fn new(
        store: Arc<SignatureStore>,
        walker: DirectoryWalker,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                reporter,
                walker,
                state: Mutex::new(ControllerState {
                    active: None,
                    last_state: ScanState::Idle,
                    last_event: None,
                    matches: MatchList::new(),
                }),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn signature_store(&self) -> &Arc<SignatureStore> {
        &self.inner.store
    }

    pub fn state(&self) -> ScanState {
        self.inner.state.lock().current()
    }

    /// Root of the active scan, if any.
    pub fn active_root(&self) -> Option<PathBuf> {
        let state = self.inner.state.lock();
        match state.current() {
            s if s.is_active() => state.active.as_ref().map(|a| a.root.clone()),
            _ => None,
        }
    }

    /// Matches of the most recent (or current) scan.
    pub fn matches(&self) -> MatchList {
        self.inner.state.lock().matches.clone()
    }

    pub fn last_event(&self) -> Option<ScanEvent> {
        self.inner.state.lock().last_event.clone()
    }

    /// Start scanning `root` on a background thread.
    ///
    /// The previous match list is replaced as soon as the scan is accepted.
    pub fn request_scan(&self, root: impl AsRef<Path>) -> Result<(), Error> {
        let root = root.as_ref().to_path_buf();
        let result = self.start_session(&root);
        if let Err(err) = &result {
            warn!("Scan of {} rejected: {}", root.display(), err);
            self.inner.reporter.on_scan_rejected(&root, err);
        }
        result
    }

    fn start_session(&self, root: &Path) -> Result<(), Error> {
        let mut state = self.inner.state.lock();
        if state.current().is_active() {
            return Err(Error::AlreadyRunning);
        }

        let session = ScanSession::new(root, self.inner.walker.clone())?;
        let control = session.control();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name("hashguard-scan".to_string())
            .spawn(move || inner.run_session(id, session))?;

        state.matches = MatchList::new();
        state.last_event = None;
        state.active = Some(ActiveScan {
            id,
            root: root.to_path_buf(),
            control,
            handle: Some(handle),
        });
        Ok(())
    }

    pub fn pause_scan(&self) -> bool {
        let paused = self.with_active(|a| a.control.pause());
        if paused {
            info!("Scan paused");
        }
        paused
    }

    pub fn resume_scan(&self) -> bool {
        let resumed = self.with_active(|a| a.control.resume());
        if resumed {
            info!("Scan resumed");
        }
        resumed
    }

    pub fn stop_scan(&self) -> bool {
        let stopping = self.with_active(|a| a.control.stop());
        if stopping {
            info!("Scan stop requested");
        }
        stopping
    }

    fn with_active<F>(&self, f: F) -> bool
    where
        F: FnOnce(&ActiveScan) -> bool,
    {
        let state = self.inner.state.lock();
        state.active.as_ref().map(f).unwrap_or(false)
    }

    /// Block until the active scan's worker exits, then return its event.
    pub fn wait(&self) -> Option<ScanEvent> {
        let handle = {
            let mut state = self.inner.state.lock();
            state.active.as_mut().and_then(|a| a.handle.take())
        };
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Scan worker thread panicked");
            }
        }
        self.last_event()
    }

    /// Move every matched file into `quarantine_dir`. Moved entries leave the
    /// match list; failed ones stay with their error recorded.
    pub fn quarantine(&self, quarantine_dir: &Path) -> Result<ActionReport, Error> {
        let mut state = self.inner.state.lock();
        if state.current().is_active() {
            return Err(Error::AlreadyRunning);
        }
        if state.matches.is_empty() {
            info!("No infected files to quarantine");
            return Ok(ActionReport::default());
        }

        fs::create_dir_all(quarantine_dir)?;
        let report = state.matches.drain_with(|path| {
            let destination = quarantine::move_to_quarantine(path, quarantine_dir)?;
            info!("Quarantined {} -> {}", path.display(), destination.display());
            Ok(())
        });
        for err in &report.errors {
            warn!("{}", err);
        }
        info!(
            "Moved {} files to quarantine folder {}",
            report.processed,
            quarantine_dir.display()
        );
        Ok(report)
    }

    /// Remove every matched file. Refuses unless `confirmed` is set; asking
    /// the user is the caller's job.
    pub fn delete(&self, confirmed: bool) -> Result<ActionReport, Error> {
        if !confirmed {
            return Err(Error::ConfirmationRequired);
        }
        let mut state = self.inner.state.lock();
        if state.current().is_active() {
            return Err(Error::AlreadyRunning);
        }
        if state.matches.is_empty() {
            info!("No infected files to delete");
            return Ok(ActionReport::default());
        }

        let report = state.matches.drain_with(|path| {
            quarantine::delete_file(path)?;
            info!("Deleted {}", path.display());
            Ok(())
        });
        for err in &report.errors {
            warn!("{}", err);
        }
        info!("Deleted {} infected files", report.processed);
        Ok(report)
    }

    /// Refresh the signature store once, reporting the outcome.
    pub fn refresh_signatures(&self, source: &dyn SignatureSource) -> Result<usize, Error> {
        match self.inner.store.refresh(source) {
            Ok(count) => {
                let at = self
                    .inner
                    .store
                    .last_refresh_time()
                    .unwrap_or_else(chrono::Local::now);
                self.inner.reporter.on_signatures_updated(count, at);
                Ok(count)
            }
            Err(err) => {
                error!("Error updating signature database: {}", err);
                self.inner.reporter.on_signature_update_failed(&err);
                Err(err)
            }
        }
    }

    /// Refresh signatures every `interval`, independently of any scan. The
    /// first refresh happens one interval from now; failures keep the
    /// previous set and retry on the next tick.
    pub fn start_signature_refresh(
        &self,
        source: Arc<dyn SignatureSource>,
        interval: Duration,
    ) -> io::Result<Ticker> {
        let controller = self.clone();
        Ticker::spawn("hashguard-refresh", interval, interval, move || {
            let _ = controller.refresh_signatures(source.as_ref());
        })
    }

    /// Load signatures synchronously, then start the periodic refresh (when
    /// `refresh_every` is set) and the auto-scan timer (when `auto_scan` is
    /// set). The first auto-scan therefore never runs ahead of the initial
    /// load. A failed initial load is reported and the timers start anyway.
    pub fn start_background(
        &self,
        source: Arc<dyn SignatureSource>,
        refresh_every: Option<Duration>,
        auto_scan: Option<(PathBuf, Duration)>,
    ) -> io::Result<Vec<Ticker>> {
        if self.refresh_signatures(source.as_ref()).is_err() {
            warn!("Starting without signatures from {}", source.describe());
        }

        let mut tickers = Vec::new();
        if let Some(interval) = refresh_every {
            tickers.push(self.start_signature_refresh(source, interval)?);
        }
        if let Some((root, interval)) = auto_scan {
            tickers.push(self.start_auto_scan(root, interval)?);
        }
        Ok(tickers)
    }

    /// Request a scan of `root` now and then every `interval`. Ticks that
    /// land while a scan is active are dropped.
    pub fn start_auto_scan(&self, root: PathBuf, interval: Duration) -> io::Result<Ticker> {
        let controller = self.clone();
        Ticker::spawn("hashguard-auto-scan", Duration::ZERO, interval, move || {
            match controller.request_scan(&root) {
                Ok(()) => info!("[Auto Scan] Scanning folder: {}", root.display()),
                Err(Error::AlreadyRunning) => {
                    info!("[Auto Scan] Skipped, a scan is already in progress")
                }
                Err(err) => info!("[Auto Scan] Skipped: {}", err),
            }
        })
    }
}

impl Inner {
    fn run_session(self: Arc<Self>, id: u64, session: ScanSession) {
        let control = session.control();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            session.run_with(&self.store, self.reporter.as_ref(), |record| {
                self.state.lock().matches.push(record.clone());
            })
        }));

        let event = match result {
            Ok(outcome) => outcome.event,
            Err(_) => {
                let event = ScanEvent::Failed("scan worker panicked".to_string());
                control.finish(event.final_state());
                error!("Scan of {} aborted by a panic", session.root().display());
                self.reporter.on_scan_finished(&event);
                event
            }
        };

        let mut state = self.state.lock();
        if state.active.as_ref().map(|a| a.id) == Some(id) {
            state.active = None;
            state.last_state = event.final_state();
            state.last_event = Some(event);
        }
    }
}
