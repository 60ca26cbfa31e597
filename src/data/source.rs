//! Where dataset documents come from
//!
//! A [`DataSource`] turns a relative document path (for example
//! `lite/sun.json`) into a [`PendingFetch`]. Fetches never block the caller:
//! the work runs on a worker thread and its result is handed back over a
//! channel that the tick loop polls once per tick.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use log::debug;

use crate::{ClockError, Result};

/// Outcome of a fetch: the raw document bytes
pub type FetchResult = Result<Vec<u8>>;

/// Result of polling a [`PendingFetch`]
#[derive(Debug)]
pub enum FetchPoll {
    /// Still in flight
    Pending,
    /// Finished, successfully or not
    Done(FetchResult),
}

/// Handle on a fetch whose result arrives later
#[derive(Debug)]
pub struct PendingFetch {
    rx: Receiver<FetchResult>,
}

impl PendingFetch {
    /// Create a fetch completed by sending on the returned sender
    pub fn channel() -> (Sender<FetchResult>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self { rx })
    }

    /// Create a fetch that is already finished
    pub fn completed(result: FetchResult) -> Self {
        let (tx, pending) = Self::channel();
        // The receiver is alive, so the send cannot fail
        let _ = tx.send(result);
        pending
    }

    /// Run `job` on a worker thread
    pub fn spawn<F>(name: &str, job: F) -> Self
    where
        F: FnOnce() -> FetchResult + Send + 'static,
    {
        let (tx, pending) = Self::channel();
        let spawned = thread::Builder::new()
            .name(format!("fetch {}", name))
            .spawn(move || {
                // The receiver may be gone if the clock shut down meanwhile
                let _ = tx.send(job());
            });

        match spawned {
            Ok(_) => pending,
            Err(e) => Self::completed(Err(ClockError::IoError(e))),
        }
    }

    /// Take the result if it has arrived
    ///
    /// Once `Done` has been returned the handle has nothing more to give.
    pub fn try_take(&mut self) -> FetchPoll {
        match self.rx.try_recv() {
            Ok(result) => FetchPoll::Done(result),
            Err(TryRecvError::Empty) => FetchPoll::Pending,
            Err(TryRecvError::Disconnected) => FetchPoll::Done(Err(ClockError::FetchError(
                "fetch worker exited without a result".to_string(),
            ))),
        }
    }
}

/// Provider of dataset documents addressed by relative path
pub trait DataSource {
    /// Begin fetching the document at `path`
    fn request(&self, path: &str) -> PendingFetch;

    /// Human readable location, for logs
    fn describe(&self) -> String;
}

impl<S: DataSource + ?Sized> DataSource for Rc<S> {
    fn request(&self, path: &str) -> PendingFetch {
        (**self).request(path)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Documents stored as files below a root directory
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Serve documents from below `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl DataSource for DirectorySource {
    fn request(&self, path: &str) -> PendingFetch {
        let full_path = self.root.join(path);
        debug!("reading {}", full_path.display());
        PendingFetch::spawn(path, move || fs::read(&full_path).map_err(ClockError::IoError))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// Documents held in memory
///
/// Requests complete immediately. Every requested path is recorded, which
/// makes it easy to check how often a document was fetched.
#[derive(Debug, Default)]
pub struct MemorySource {
    documents: HashMap<String, Vec<u8>>,
    requests: RefCell<Vec<String>>,
}

impl MemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the document at `path`
    pub fn insert<B: Into<Vec<u8>>>(&mut self, path: &str, bytes: B) {
        self.documents.insert(path.to_string(), bytes.into());
    }

    /// Builder form of [`MemorySource::insert`]
    pub fn with_document<B: Into<Vec<u8>>>(mut self, path: &str, bytes: B) -> Self {
        self.insert(path, bytes);
        self
    }

    /// Number of times `path` has been requested
    pub fn request_count(&self, path: &str) -> usize {
        self.requests.borrow().iter().filter(|p| *p == path).count()
    }

    /// Every request made so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl DataSource for MemorySource {
    fn request(&self, path: &str) -> PendingFetch {
        self.requests.borrow_mut().push(path.to_string());
        let result = self
            .documents
            .get(path)
            .cloned()
            .ok_or_else(|| ClockError::FetchError(format!("no document at {}", path)));
        PendingFetch::completed(result)
    }

    fn describe(&self) -> String {
        format!("memory ({} documents)", self.documents.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    /// Poll until the fetch finishes, for sources backed by worker threads
    fn wait(mut pending: PendingFetch) -> FetchResult {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let FetchPoll::Done(result) = pending.try_take() {
                return result;
            }
            assert!(Instant::now() < deadline, "fetch did not finish");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_channel_fetch_is_pending_until_sent() {
        let (tx, mut pending) = PendingFetch::channel();
        assert!(matches!(pending.try_take(), FetchPoll::Pending));
        tx.send(Ok(b"{}".to_vec())).unwrap();
        match pending.try_take() {
            FetchPoll::Done(Ok(bytes)) => assert_eq!(bytes, b"{}"),
            other => panic!("unexpected poll result {:?}", other),
        }
    }

    #[test]
    fn test_dropped_sender_finishes_with_error() {
        let (tx, mut pending) = PendingFetch::channel();
        drop(tx);
        assert!(matches!(
            pending.try_take(),
            FetchPoll::Done(Err(ClockError::FetchError(_)))
        ));
    }

    #[test]
    fn test_memory_source_records_requests() {
        let source = MemorySource::new().with_document("lite/sun.json", "{}");
        assert!(matches!(
            source.request("lite/sun.json").try_take(),
            FetchPoll::Done(Ok(_))
        ));
        assert!(matches!(
            source.request("lite/moon.json").try_take(),
            FetchPoll::Done(Err(_))
        ));
        assert_eq!(source.request_count("lite/sun.json"), 1);
        assert_eq!(source.requests(), vec!["lite/sun.json", "lite/moon.json"]);
    }

    #[test]
    fn test_directory_source_reads_files() {
        let temp_dir = tempdir().unwrap();
        fs::create_dir_all(temp_dir.path().join("lite")).unwrap();
        fs::write(temp_dir.path().join("lite/sun.json"), "{\"20240101\": 0.5}").unwrap();

        let source = DirectorySource::new(temp_dir.path());
        let bytes = wait(source.request("lite/sun.json")).unwrap();
        assert_eq!(bytes, b"{\"20240101\": 0.5}");

        let missing = wait(source.request("lite/moon.json"));
        assert!(matches!(missing, Err(ClockError::IoError(_))));
    }
}
