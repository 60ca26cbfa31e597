//! Downloader module for retrieving dataset documents over HTTP
//!
//! Documents are mirrored into a local cache directory so each one is only
//! downloaded once across runs. Every base URL gets its own directory below
//! the cache, so switching data roots never serves another root's files.

use std::env;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;

use super::source::{DataSource, PendingFetch};
use crate::{ClockError, Result};

/// Timeout for a single document download
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

lazy_static! {
    /// Runs of characters not allowed in a cache directory name
    static ref UNSAFE_NAME_CHARS: Regex =
        Regex::new(r"[^A-Za-z0-9.-]+").expect("cache name pattern is valid");
}

/// Get the cache directory path
pub fn get_cache_dir() -> PathBuf {
    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".cache").join("ecliptic-clock")
}

/// Directory name below the cache for documents from `base_url`
fn cache_namespace(base_url: &str) -> String {
    let location = base_url
        .split_once("://")
        .map_or(base_url, |(_, rest)| rest)
        .trim_end_matches('/');
    UNSAFE_NAME_CHARS.replace_all(location, "_").into_owned()
}

/// Check if a file exists and is not empty
fn file_exists_and_not_empty<P: AsRef<Path>>(path: P) -> bool {
    match fs::metadata(path) {
        Ok(metadata) => metadata.is_file() && metadata.len() > 0,
        Err(_) => false,
    }
}

/// Build a blocking HTTP client with the given timeout
fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ClockError::FetchError(format!("Failed to create HTTP client: {}", e)))
}

/// Fetch the body of `url` into memory
fn download_bytes(url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let client = http_client(timeout)?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| ClockError::FetchError(format!("Failed to download {}: {}", url, e)))?;

    // Check if the request was successful
    if !response.status().is_success() {
        return Err(ClockError::FetchError(format!(
            "Failed to download {}, status: {}",
            url,
            response.status()
        )));
    }

    let mut bytes = Vec::new();
    response
        .read_to_end(&mut bytes)
        .map_err(|e| ClockError::FetchError(format!("Failed to read response: {}", e)))?;
    Ok(bytes)
}

/// Download a file from URL to a local path
fn download_file<P: AsRef<Path>>(url: &str, path: P, timeout: Duration) -> Result<()> {
    // Create parent directories if they don't exist
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }

    let bytes = download_bytes(url, timeout)?;

    // Write a temporary file first to avoid partial downloads
    let temp_path = path.as_ref().with_extension("tmp");
    let mut file = BufWriter::new(File::create(&temp_path)?);
    file.write_all(&bytes)?;
    file.flush()?;
    drop(file);

    // Rename the temporary file to the final path
    fs::rename(temp_path, path)?;

    Ok(())
}

/// Fetch the document `path` from `url`, mirrored below `cache_dir` when
/// there is one
fn fetch_document(
    url: &str,
    path: &str,
    cache_dir: Option<&Path>,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let Some(cache_dir) = cache_dir else {
        debug!("downloading {}", url);
        return download_bytes(url, timeout);
    };

    let cached = cache_dir.join(path);
    if file_exists_and_not_empty(&cached) {
        debug!("using cached {}", cached.display());
        return Ok(fs::read(&cached)?);
    }

    info!("downloading {} to {}", url, cached.display());
    download_file(url, &cached, timeout)?;
    Ok(fs::read(&cached)?)
}

/// Documents served over HTTP(S) below a base URL
#[derive(Debug, Clone)]
pub struct HttpSource {
    base_url: String,
    /// Cache directory for this base URL, already namespaced
    cache_dir: Option<PathBuf>,
}

impl HttpSource {
    /// Serve documents from below `base_url`, without caching
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            cache_dir: None,
        }
    }

    /// Mirror downloaded documents below `cache_dir`
    pub fn with_cache_dir<P: AsRef<Path>>(mut self, cache_dir: P) -> Self {
        self.cache_dir = Some(cache_dir.as_ref().join(cache_namespace(&self.base_url)));
        self
    }

    /// URL of the document at `path`
    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl DataSource for HttpSource {
    fn request(&self, path: &str) -> PendingFetch {
        let url = self.url_for(path);
        let document = path.to_string();
        let cache_dir = self.cache_dir.clone();
        PendingFetch::spawn(path, move || {
            fetch_document(&url, &document, cache_dir.as_deref(), DOWNLOAD_TIMEOUT)
        })
    }

    fn describe(&self) -> String {
        match &self.cache_dir {
            Some(dir) => format!("{} (cached in {})", self.base_url, dir.display()),
            None => self.base_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_cache_dir() {
        let cache_dir = get_cache_dir();
        assert!(cache_dir.to_str().unwrap().contains(".cache/ecliptic-clock"));
    }

    #[test]
    fn test_url_for() {
        let source = HttpSource::new("https://example.org/data/");
        assert_eq!(
            source.url_for("full/index.json"),
            "https://example.org/data/full/index.json"
        );
    }

    #[test]
    fn test_cached_document_skips_download() {
        let temp_dir = tempdir().unwrap();
        fs::create_dir_all(temp_dir.path().join("lite")).unwrap();
        fs::write(temp_dir.path().join("lite/sun.json"), "{}").unwrap();

        // The URL is never contacted because the cache has the file
        let bytes = fetch_document(
            "http://127.0.0.1:9/lite/sun.json",
            "lite/sun.json",
            Some(temp_dir.path()),
            Duration::from_millis(10),
        )
        .unwrap();
        assert_eq!(bytes, b"{}");
    }

    #[test]
    fn test_cache_is_namespaced_by_root() {
        assert_eq!(cache_namespace("https://example.org/clock/data/"), "example.org_clock_data");
        assert_eq!(cache_namespace("http://127.0.0.1:8080"), "127.0.0.1_8080");
        assert_ne!(
            cache_namespace("https://example.org/a"),
            cache_namespace("https://example.org/b")
        );
    }

    #[test]
    fn test_sources_do_not_share_cached_documents() {
        let temp_dir = tempdir().unwrap();
        let first = HttpSource::new("http://127.0.0.1:9/first").with_cache_dir(temp_dir.path());
        let second = HttpSource::new("http://127.0.0.1:9/second").with_cache_dir(temp_dir.path());

        let first_cache = temp_dir.path().join("127.0.0.1_9_first");
        fs::create_dir_all(first_cache.join("lite")).unwrap();
        fs::write(first_cache.join("lite/sun.json"), "{}").unwrap();

        let cached = |source: &HttpSource| {
            fetch_document(
                &source.url_for("lite/sun.json"),
                "lite/sun.json",
                source.cache_dir.as_deref(),
                Duration::from_millis(10),
            )
        };
        assert_eq!(cached(&first).unwrap(), b"{}");
        // Nothing cached for the second root and nothing listening on port 9
        assert!(matches!(cached(&second), Err(ClockError::FetchError(_))));
        assert!(!temp_dir.path().join("127.0.0.1_9_second/lite/sun.json").exists());
    }
}
