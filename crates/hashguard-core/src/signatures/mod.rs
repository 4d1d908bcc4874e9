pub mod source;

use chrono::{DateTime, Local};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Error;

pub use source::{FileSignatureSource, HttpSignatureSource, SignatureSource};

pub const FINGERPRINT_LEN: usize = 32;

/// SHA-256 digest of a file's contents.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; FINGERPRINT_LEN]);

impl Fingerprint {
    pub fn from_bytes(bytes: [u8; FINGERPRINT_LEN]) -> Self {
        Self(bytes)
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    /// Parses 64 hex digits, either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != FINGERPRINT_LEN * 2 || !s.is_ascii() {
            return Err(Error::InvalidFingerprint(s.to_string()));
        }
        let mut bytes = [0u8; FINGERPRINT_LEN];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::InvalidFingerprint(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

/// One published signature set. Never mutated after construction.
#[derive(Debug)]
pub struct SignatureSet {
    fingerprints: HashSet<Fingerprint>,
    refreshed_at: Option<DateTime<Local>>,
}

impl SignatureSet {
    pub fn empty() -> Self {
        Self {
            fingerprints: HashSet::new(),
            refreshed_at: None,
        }
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Local>> {
        self.refreshed_at
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ParsedSignatures {
    pub fingerprints: HashSet<Fingerprint>,
    pub rejected_lines: usize,
}

/// One signature per non-empty, trimmed line. Lines that are not a
/// hex SHA-256 digest are counted and skipped.
pub fn parse_signatures(text: &str) -> ParsedSignatures {
    let mut parsed = ParsedSignatures::default();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match line.parse::<Fingerprint>() {
            Ok(fp) => {
                parsed.fingerprints.insert(fp);
            }
            Err(_) => parsed.rejected_lines += 1,
        }
    }
    parsed
}

/// Holds the currently published signature set.
///
/// Readers clone the `Arc` under a short read lock, so a refresh only ever
/// swaps the pointer; a reader holding an older set keeps a consistent view.
#[derive(Debug)]
pub struct SignatureStore {
    current: RwLock<Arc<SignatureSet>>,
}

impl Default for SignatureStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(SignatureSet::empty())),
        }
    }

    /// Builds a store already holding `fingerprints`, stamped now.
    pub fn with_fingerprints<I>(fingerprints: I) -> Self
    where
        I: IntoIterator<Item = Fingerprint>,
    {
        let store = Self::new();
        store.publish(fingerprints.into_iter().collect());
        store
    }

    /// Fetch the full list from `source` and publish it.
    ///
    /// On failure the previously published set stays in place.
    pub fn refresh(&self, source: &dyn SignatureSource) -> Result<usize, Error> {
        debug!("Fetching signatures from {}", source.describe());
        let text = source.fetch()?;
        let parsed = parse_signatures(&text);

        if parsed.fingerprints.is_empty() && parsed.rejected_lines > 0 {
            return Err(Error::SignatureFetchFailed(format!(
                "{} returned {} lines and none were valid SHA-256 signatures",
                source.describe(),
                parsed.rejected_lines
            )));
        }
        if parsed.rejected_lines > 0 {
            warn!(
                "Skipped {} malformed signature lines from {}",
                parsed.rejected_lines,
                source.describe()
            );
        }

        let count = parsed.fingerprints.len();
        self.publish(parsed.fingerprints);
        info!("Signature database updated: {} signatures", count);
        Ok(count)
    }

    fn publish(&self, fingerprints: HashSet<Fingerprint>) {
        let next = Arc::new(SignatureSet {
            fingerprints,
            refreshed_at: Some(Local::now()),
        });
        *self.current.write() = next;
    }

    pub fn snapshot(&self) -> Arc<SignatureSet> {
        Arc::clone(&self.current.read())
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.current.read().contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }

    pub fn last_refresh_time(&self) -> Option<DateTime<Local>> {
        self.current.read().refreshed_at()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    struct StaticSource(Result<String, String>);

    impl SignatureSource for StaticSource {
        fn fetch(&self) -> Result<String, Error> {
            self.0.clone().map_err(Error::SignatureFetchFailed)
        }

        fn describe(&self) -> String {
            "static".to_string()
        }
    }

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::from_bytes([byte; FINGERPRINT_LEN])
    }

    #[test]
    fn test_fingerprint_hex_parse_is_case_insensitive() {
        let lower = "ab".repeat(32);
        let upper = lower.to_uppercase();
        assert_eq!(lower.parse::<Fingerprint>().unwrap(), fp(0xab));
        assert_eq!(upper.parse::<Fingerprint>().unwrap(), fp(0xab));
        assert_eq!(fp(0xab).to_string(), lower);
    }

    #[test]
    fn test_fingerprint_rejects_wrong_length_and_non_hex() {
        assert!("abc".parse::<Fingerprint>().is_err());
        assert!("zz".repeat(32).parse::<Fingerprint>().is_err());
        assert!("é".repeat(32).parse::<Fingerprint>().is_err());
    }

    #[test]
    fn test_parse_skips_blank_and_malformed_lines() {
        let text = format!("\n  {}  \n\nnot-a-hash\n{}\n{}\n", fp(1), fp(2), fp(1));
        let parsed = parse_signatures(&text);
        assert_eq!(parsed.fingerprints.len(), 2);
        assert_eq!(parsed.rejected_lines, 1);
    }

    #[test]
    fn test_refresh_publishes_new_set() {
        let store = SignatureStore::new();
        assert!(store.last_refresh_time().is_none());

        let source = StaticSource(Ok(format!("{}\n{}\n", fp(1), fp(2))));
        assert_eq!(store.refresh(&source).unwrap(), 2);
        assert!(store.contains(&fp(1)));
        assert!(store.contains(&fp(2)));
        assert!(!store.contains(&fp(3)));
        assert!(store.last_refresh_time().is_some());
    }

    #[test]
    fn test_failed_fetch_keeps_previous_set() {
        let store = SignatureStore::with_fingerprints([fp(7)]);
        let before = store.last_refresh_time();

        let err = store
            .refresh(&StaticSource(Err("connection reset".to_string())))
            .unwrap_err();
        assert!(matches!(err, Error::SignatureFetchFailed(_)));
        assert!(store.contains(&fp(7)));
        assert_eq!(store.last_refresh_time(), before);
    }

    #[test]
    fn test_garbage_response_keeps_previous_set() {
        let store = SignatureStore::with_fingerprints([fp(7)]);
        let html = "<!DOCTYPE html>\n<html>\n<body>oops</body>\n</html>\n".to_string();
        assert!(store.refresh(&StaticSource(Ok(html))).is_err());
        assert_eq!(store.len(), 1);
        assert!(store.contains(&fp(7)));
    }

    #[test]
    fn test_snapshot_survives_refresh() {
        let store = SignatureStore::with_fingerprints([fp(1)]);
        let old = store.snapshot();
        store
            .refresh(&StaticSource(Ok(format!("{}\n", fp(2)))))
            .unwrap();
        assert!(old.contains(&fp(1)));
        assert!(!old.contains(&fp(2)));
        assert!(store.contains(&fp(2)));
    }

    #[test]
    fn test_readers_never_observe_partial_set() {
        let store = Arc::new(SignatureStore::with_fingerprints((0..50).map(fp)));
        let next: String = (100..150).map(|b| format!("{}\n", fp(b))).collect();
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    while !done.load(Ordering::Relaxed) {
                        let set = store.snapshot();
                        let old = (0..50).filter(|b| set.contains(&fp(*b))).count();
                        let new = (100..150).filter(|b| set.contains(&fp(*b))).count();
                        assert!(
                            (old == 50 && new == 0) || (old == 0 && new == 50),
                            "torn set: {} old, {} new",
                            old,
                            new
                        );
                    }
                })
            })
            .collect();

        for _ in 0..20 {
            store.refresh(&StaticSource(Ok(next.clone()))).unwrap();
        }
        done.store(true, Ordering::Relaxed);
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.len(), 50);
    }
}
