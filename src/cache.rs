//! Download cache for remote tag files and object inventories.
//!
//! Every run needs the same handful of reference files (doxygen tag files for
//! the manual and the reference guide, plus any Sphinx inventories a notebook
//! asks for). They change at most daily, so each one is kept on disk and only
//! fetched again once it is older than the configured maximum age (24 hours
//! by default).
//!
//! # Design
//!
//! ## Cache keys
//!
//! Files the tool knows by name (tag files) are stored under an explicit
//! local name such as `ref-nightly-tags.xml`. Arbitrary URLs (inventories
//! named in a notebook) get a deterministic name from
//! [`local_name_for`]: a SHA-256 prefix of the URL followed by the URL's last
//! path component, so two inventories called `objects.inv` never collide.
//!
//! ## Freshness
//!
//! Freshness is mtime-based: a cached file is reused when its modification
//! time is within `max_age` of now. A fetch replaces the whole file through a
//! rename, so concurrent runs racing on the same URL at worst download it
//! twice.
//!
//! ## Transport
//!
//! Network access goes through the [`Fetch`] trait. [`HttpFetcher`] is the
//! production implementation (blocking `reqwest`); tests substitute a fetcher
//! that serves fixture files and records the URLs it was asked for.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Could not fetch {url}: {message}")]
    Unavailable { url: String, message: String },
}

/// Something that can retrieve the bytes behind a URL.
pub trait Fetch {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, CacheError>;
}

/// Blocking HTTP transport.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Build a client that identifies itself; python.org refuses to serve
    /// `objects.inv` to requests without a user agent.
    pub fn new() -> Result<Self, CacheError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("tutorial-tools/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, CacheError> {
        let response = self.client.get(url).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

/// How a cached file was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Cached,
    Downloaded,
}

/// On-disk URL cache.
pub struct UrlCache<'a, F: Fetch> {
    dir: PathBuf,
    max_age: Duration,
    fetcher: &'a F,
    stats: CacheStats,
}

impl<'a, F: Fetch> UrlCache<'a, F> {
    pub fn new(dir: impl Into<PathBuf>, max_age: Duration, fetcher: &'a F) -> Self {
        Self {
            dir: dir.into(),
            max_age,
            fetcher,
            stats: CacheStats::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Return the local path of `url`, stored as `local` inside the cache
    /// directory, fetching it first if it is missing or stale.
    pub fn get(&mut self, url: &str, local: &str) -> Result<(PathBuf, FetchOutcome), CacheError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(local);
        if is_fresh(&path, self.max_age) {
            log::debug!("cache hit for {url} ({})", path.display());
            self.stats.hit();
            return Ok((path, FetchOutcome::Cached));
        }

        log::info!("downloading {url}");
        let bytes = self.fetcher.fetch(url)?;
        let tmp = self
            .dir
            .join(format!(".{local}.{}.tmp", std::process::id()));
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &path)?;
        self.stats.download();
        Ok((path, FetchOutcome::Downloaded))
    }

    /// Like [`get`](Self::get), with the local name derived from the URL.
    pub fn get_url(&mut self, url: &str) -> Result<(PathBuf, FetchOutcome), CacheError> {
        let local = local_name_for(url);
        self.get(url, &local)
    }
}

/// Whether `path` exists and was modified less than `max_age` ago.
///
/// A modification time in the future (clock skew) counts as fresh.
fn is_fresh(path: &Path, max_age: Duration) -> bool {
    let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) else {
        return false;
    };
    match SystemTime::now().duration_since(modified) {
        Ok(age) => age < max_age,
        Err(_) => true,
    }
}

/// Deterministic cache file name for an arbitrary URL.
///
/// `https://docs.python.org/3/objects.inv` →
/// `<16 hex chars of sha256(url)>-objects.inv`.
pub fn local_name_for(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    let hex = format!("{:x}", digest);
    let basename: String = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    if basename.is_empty() {
        hex[..16].to_string()
    } else {
        format!("{}-{}", &hex[..16], basename)
    }
}

/// Summary of cache use for a run.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u32,
    pub downloads: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn download(&mut self) {
        self.downloads += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.downloads
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} downloaded ({} total)",
                self.hits,
                self.downloads,
                self.total()
            )
        } else {
            write!(f, "{} downloaded", self.downloads)
        }
    }
}
