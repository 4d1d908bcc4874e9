pub mod config;
pub mod controller;
pub mod error;
pub mod hasher;
pub mod model;
pub mod progress;
pub mod quarantine;
pub mod scanner;
pub mod schedule;
pub mod session;
pub mod signatures;

pub use config::AppConfig;
pub use controller::ScanController;
pub use error::Error;
pub use hasher::FileHasher;
pub use model::{ActionReport, FileRecord, MatchEntry, MatchList, ScanEvent, ScanState, Verdict};
pub use progress::{ChannelReporter, ProgressReporter, ReporterMessage, SilentReporter};
pub use scanner::walk::DirectoryWalker;
pub use schedule::Ticker;
pub use session::{ScanControl, ScanSession, SessionOutcome};
pub use signatures::{Fingerprint, SignatureSource, SignatureStore};
