use chrono::{DateTime, Local};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::error::Error;
use crate::model::{FileRecord, ScanEvent};

/// Trait for reporting scan progress, per-file verdicts, session results and
/// signature-refresh status.
///
/// Callbacks run on the scanning or timer thread, so implementations must
/// return quickly. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_scan_start(&self, _root: &Path) {}
    fn on_count_complete(&self, _total_files: usize) {}
    fn on_file_scanned(&self, _record: &FileRecord) {}
    fn on_scan_progress(&self, _processed: usize, _total: usize) {}
    fn on_scan_finished(&self, _event: &ScanEvent) {}
    fn on_scan_rejected(&self, _root: &Path, _error: &Error) {}
    fn on_signatures_updated(&self, _count: usize, _at: DateTime<Local>) {}
    fn on_signature_update_failed(&self, _error: &Error) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

#[derive(Debug, Clone)]
pub enum ReporterMessage {
    ScanStarted(PathBuf),
    Counted(usize),
    File(FileRecord),
    Progress { processed: usize, total: usize },
    Finished(ScanEvent),
    Rejected { root: PathBuf, reason: String },
    SignaturesUpdated { count: usize, at: DateTime<Local> },
    SignatureUpdateFailed(String),
}

impl ReporterMessage {
    /// Replay this message on `reporter`, typically on a thread that drains
    /// a `ChannelReporter`. Rejections and refresh failures arrive as text
    /// and are replayed as `Error::Other`.
    pub fn deliver(self, reporter: &dyn ProgressReporter) {
        match self {
            ReporterMessage::ScanStarted(root) => reporter.on_scan_start(&root),
            ReporterMessage::Counted(total) => reporter.on_count_complete(total),
            ReporterMessage::File(record) => reporter.on_file_scanned(&record),
            ReporterMessage::Progress { processed, total } => {
                reporter.on_scan_progress(processed, total)
            }
            ReporterMessage::Finished(event) => reporter.on_scan_finished(&event),
            ReporterMessage::Rejected { root, reason } => {
                reporter.on_scan_rejected(&root, &Error::Other(reason))
            }
            ReporterMessage::SignaturesUpdated { count, at } => {
                reporter.on_signatures_updated(count, at)
            }
            ReporterMessage::SignatureUpdateFailed(reason) => {
                reporter.on_signature_update_failed(&Error::Other(reason))
            }
        }
    }
}

/// Forwards reporter callbacks over a bounded channel.
///
/// Progress and per-file messages are dropped when the channel is full so
/// a slow consumer never stalls the scan; `dropped()` counts them.
/// Session completion waits up to `FINISH_SEND_TIMEOUT` for room.
pub struct ChannelReporter {
    tx: Sender<ReporterMessage>,
    dropped: AtomicU64,
}

const FINISH_SEND_TIMEOUT: Duration = Duration::from_secs(1);

impl ChannelReporter {
    pub fn bounded(capacity: usize) -> (Self, Receiver<ReporterMessage>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn offer(&self, message: ReporterMessage) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(message) {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl ProgressReporter for ChannelReporter {
    fn on_scan_start(&self, root: &Path) {
        self.offer(ReporterMessage::ScanStarted(root.to_path_buf()));
    }

    fn on_count_complete(&self, total_files: usize) {
        self.offer(ReporterMessage::Counted(total_files));
    }

    fn on_file_scanned(&self, record: &FileRecord) {
        self.offer(ReporterMessage::File(record.clone()));
    }

    fn on_scan_progress(&self, processed: usize, total: usize) {
        self.offer(ReporterMessage::Progress { processed, total });
    }

    fn on_scan_finished(&self, event: &ScanEvent) {
        if self
            .tx
            .send_timeout(ReporterMessage::Finished(event.clone()), FINISH_SEND_TIMEOUT)
            .is_err()
        {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn on_scan_rejected(&self, root: &Path, error: &Error) {
        self.offer(ReporterMessage::Rejected {
            root: root.to_path_buf(),
            reason: error.to_string(),
        });
    }

    fn on_signatures_updated(&self, count: usize, at: DateTime<Local>) {
        self.offer(ReporterMessage::SignaturesUpdated { count, at });
    }

    fn on_signature_update_failed(&self, error: &Error) {
        self.offer(ReporterMessage::SignatureUpdateFailed(error.to_string()));
    }
}
