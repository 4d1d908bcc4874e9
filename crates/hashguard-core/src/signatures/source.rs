use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the signature list comes from.
///
/// `fetch` returns the raw newline-delimited text; parsing and publication
/// belong to [`super::SignatureStore`].
pub trait SignatureSource: Send + Sync {
    fn fetch(&self) -> Result<String, Error>;

    fn describe(&self) -> String;
}

pub struct HttpSignatureSource {
    url: String,
    agent: ureq::Agent,
}

impl HttpSignatureSource {
    pub fn new(url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(FETCH_TIMEOUT).build();
        Self {
            url: url.into(),
            agent,
        }
    }
}

impl SignatureSource for HttpSignatureSource {
    fn fetch(&self) -> Result<String, Error> {
        let response = self
            .agent
            .get(&self.url)
            .set("User-Agent", concat!("hashguard/", env!("CARGO_PKG_VERSION")))
            .call()
            .map_err(|e| Error::SignatureFetchFailed(format!("{}: {}", self.url, e)))?;

        response
            .into_string()
            .map_err(|e| Error::SignatureFetchFailed(format!("{}: {}", self.url, e)))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

pub struct FileSignatureSource {
    path: PathBuf,
}

impl FileSignatureSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SignatureSource for FileSignatureSource {
    fn fetch(&self) -> Result<String, Error> {
        fs::read_to_string(&self.path).map_err(|e| {
            Error::SignatureFetchFailed(format!("{}: {}", self.path.display(), e))
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
