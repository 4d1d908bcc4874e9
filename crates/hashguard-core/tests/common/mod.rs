#![allow(dead_code)]

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

use hashguard_core::{FileHasher, FileRecord, Fingerprint, ProgressReporter, ScanEvent};

/// Write `files` (relative path, contents) under `root` and return their
/// canonical paths in the same order.
pub fn write_files(root: &Path, files: &[(&str, &str)]) -> Vec<PathBuf> {
    for (rel, contents) in files {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
    }
    let root = fs::canonicalize(root).unwrap();
    files.iter().map(|(rel, _)| root.join(rel)).collect()
}

/// `count` files named `file_00.txt`, `file_01.txt`, ... with distinct contents.
pub fn numbered_files(root: &Path, count: usize) -> Vec<PathBuf> {
    let names: Vec<(String, String)> = (0..count)
        .map(|i| (format!("file_{:02}.txt", i), format!("contents of file {}", i)))
        .collect();
    let refs: Vec<(&str, &str)> = names
        .iter()
        .map(|(n, c)| (n.as_str(), c.as_str()))
        .collect();
    write_files(root, &refs)
}

pub fn fingerprint_of(path: &Path) -> Fingerprint {
    FileHasher::new().hash(path).unwrap()
}

/// Records everything it is told and forwards finished events.
pub struct RecordingReporter {
    pub records: Mutex<Vec<FileRecord>>,
    pub progress: Mutex<Vec<(usize, usize)>>,
    pub rejected: Mutex<Vec<String>>,
    pub refresh_failures: Mutex<Vec<String>>,
    pub refreshed: Mutex<Vec<usize>>,
    finished_tx: Sender<ScanEvent>,
}

impl RecordingReporter {
    pub fn new() -> (Self, Receiver<ScanEvent>) {
        let (finished_tx, finished_rx) = crossbeam_channel::unbounded();
        (
            Self {
                records: Mutex::new(Vec::new()),
                progress: Mutex::new(Vec::new()),
                rejected: Mutex::new(Vec::new()),
                refresh_failures: Mutex::new(Vec::new()),
                refreshed: Mutex::new(Vec::new()),
                finished_tx,
            },
            finished_rx,
        )
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.records.lock().iter().map(|r| r.path.clone()).collect()
    }
}

impl ProgressReporter for RecordingReporter {
    fn on_file_scanned(&self, record: &FileRecord) {
        self.records.lock().push(record.clone());
    }

    fn on_scan_progress(&self, processed: usize, total: usize) {
        self.progress.lock().push((processed, total));
    }

    fn on_scan_finished(&self, event: &ScanEvent) {
        let _ = self.finished_tx.send(event.clone());
    }

    fn on_scan_rejected(&self, _root: &Path, error: &hashguard_core::Error) {
        self.rejected.lock().push(error.to_string());
    }

    fn on_signatures_updated(&self, count: usize, _at: chrono::DateTime<chrono::Local>) {
        self.refreshed.lock().push(count);
    }

    fn on_signature_update_failed(&self, error: &hashguard_core::Error) {
        self.refresh_failures.lock().push(error.to_string());
    }
}
