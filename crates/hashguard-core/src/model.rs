use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::signatures::Fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Safe,
    Infected,
    Unreadable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub fingerprint: Option<Fingerprint>,
    pub verdict: Verdict,
}

/// An infected file awaiting user action. `last_error` holds the reason
/// the most recent quarantine/delete attempt on it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEntry {
    pub record: FileRecord,
    pub last_error: Option<String>,
}

impl MatchEntry {
    pub fn path(&self) -> &Path {
        &self.record.path
    }
}

/// Infected files from the most recent scan, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchList {
    entries: Vec<MatchEntry>,
}

impl MatchList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: FileRecord) {
        self.entries.push(MatchEntry {
            record,
            last_error: None,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MatchEntry> {
        self.entries.iter()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().map(|e| e.record.path.clone()).collect()
    }

    /// Runs `action` on every entry; entries it succeeds on are removed,
    /// the rest keep the error text.
    pub(crate) fn drain_with<F>(&mut self, mut action: F) -> ActionReport
    where
        F: FnMut(&Path) -> Result<(), Error>,
    {
        let mut report = ActionReport::default();
        self.entries.retain_mut(|entry| match action(entry.path()) {
            Ok(()) => {
                report.processed += 1;
                false
            }
            Err(err) => {
                entry.last_error = Some(err.to_string());
                report.errors.push(err);
                true
            }
        });
        report
    }
}

impl<'a> IntoIterator for &'a MatchList {
    type Item = &'a MatchEntry;
    type IntoIter = std::slice::Iter<'a, MatchEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Running,
    Paused,
    Stopping,
    Completed,
    Stopped,
    Failed,
}

impl ScanState {
    pub fn is_active(self) -> bool {
        matches!(self, ScanState::Running | ScanState::Paused | ScanState::Stopping)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ScanState::Completed | ScanState::Stopped | ScanState::Failed)
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanState::Idle => "idle",
            ScanState::Running => "running",
            ScanState::Paused => "paused",
            ScanState::Stopping => "stopping",
            ScanState::Completed => "completed",
            ScanState::Stopped => "stopped",
            ScanState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    CompletedClean,
    CompletedWithMatches(MatchList),
    Stopped,
    Failed(String),
}

impl ScanEvent {
    pub fn final_state(&self) -> ScanState {
        match self {
            ScanEvent::CompletedClean | ScanEvent::CompletedWithMatches(_) => ScanState::Completed,
            ScanEvent::Stopped => ScanState::Stopped,
            ScanEvent::Failed(_) => ScanState::Failed,
        }
    }
}

/// Outcome of a quarantine or delete pass.
#[derive(Debug, Default)]
pub struct ActionReport {
    pub processed: usize,
    pub errors: Vec<Error>,
}
