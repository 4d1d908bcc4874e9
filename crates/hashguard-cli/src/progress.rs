use colored::*;
use hashguard_core::{Error, FileRecord, ProgressReporter, ScanEvent, Verdict};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

/// CLI progress reporter using indicatif progress bars.
///
/// - Count phase: spinner (total unknown until the pre-pass ends)
/// - Scan phase: progress bar over the counted files
///
/// Detection alerts and the terminal bell are the `alerts`/`sound`
/// settings.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
    alerts: bool,
    sound: bool,
    verbose: bool,
}

impl CliReporter {
    pub fn new(alerts: bool, sound: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            alerts,
            sound,
            verbose: false,
        }
    }

    /// Also print safe and unreadable files, not only detections.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn set_bar(&self, pb: ProgressBar) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(old) = guard.take() {
            old.finish_and_clear();
        }
        *guard = Some(pb);
    }

    fn finish_bar(&self) {
        let mut guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.take() {
            pb.finish_and_clear();
        }
    }

    fn println(&self, line: String) {
        let guard = self.bar.lock().unwrap();
        match guard.as_ref() {
            Some(pb) => pb.println(line),
            None => eprintln!("{}", line),
        }
    }

    fn ring_bell(&self) {
        if self.sound {
            let mut stderr = io::stderr();
            let _ = stderr.write_all(b"\x07");
            let _ = stderr.flush();
        }
    }
}

impl ProgressReporter for CliReporter {
    fn on_scan_start(&self, root: &Path) {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.set_message(format!("Counting files in {}...", root.display()));
        pb.enable_steady_tick(std::time::Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_count_complete(&self, total_files: usize) {
        let pb = ProgressBar::new(total_files as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "  {spinner:.cyan} Scanning [{bar:30.cyan/dim}] {pos}/{len} files ({percent}%)",
            )
            .unwrap()
            .progress_chars("━╸─")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(80));
        self.set_bar(pb);
    }

    fn on_file_scanned(&self, record: &FileRecord) {
        match record.verdict {
            Verdict::Infected => {
                if self.alerts {
                    self.println(format!(
                        "  {} Infected: {}",
                        "[!]".red().bold(),
                        record.path.display()
                    ));
                }
                self.ring_bell();
            }
            Verdict::Safe if self.verbose => {
                self.println(format!("  {} Safe: {}", "[+]".green(), record.path.display()))
            }
            Verdict::Unreadable if self.verbose => self.println(format!(
                "  {} Unreadable: {}",
                "[?]".yellow(),
                record.path.display()
            )),
            _ => {}
        }
    }

    fn on_scan_progress(&self, processed: usize, total: usize) {
        let guard = self.bar.lock().unwrap();
        if let Some(pb) = guard.as_ref() {
            if pb.length() != Some(total as u64) {
                pb.set_length(total as u64);
            }
            pb.set_position(processed as u64);
        }
    }

    fn on_scan_finished(&self, event: &ScanEvent) {
        self.finish_bar();
        match event {
            ScanEvent::CompletedClean => {
                eprintln!("  {} Scan completed. No threats found.", "✓".green())
            }
            ScanEvent::CompletedWithMatches(matches) => {
                eprintln!(
                    "  {} Scan completed. {} infected files found:",
                    "⚠".red(),
                    matches.len().to_string().red()
                );
                for entry in matches {
                    eprintln!("     - {}", entry.path().display());
                }
            }
            ScanEvent::Stopped => eprintln!("  {} Scan stopped.", "■".yellow()),
            ScanEvent::Failed(reason) => eprintln!("  {} Scan failed: {}", "✗".red(), reason),
        }
    }

    fn on_scan_rejected(&self, root: &Path, error: &Error) {
        self.println(format!(
            "  {} Scan of {} skipped: {}",
            "!".yellow(),
            root.display(),
            error
        ));
    }

    fn on_signatures_updated(&self, count: usize, at: chrono::DateTime<chrono::Local>) {
        self.println(format!(
            "  {} Signatures updated: {} ({})",
            "✓".green(),
            count,
            at.format("%Y-%m-%d %H:%M:%S")
        ));
    }

    fn on_signature_update_failed(&self, error: &Error) {
        self.println(format!("  {} Error updating signatures: {}", "⚠".yellow(), error));
    }
}
