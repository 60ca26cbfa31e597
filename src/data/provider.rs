//! Lazily loaded dataset for one (body, tier)

use log::{debug, warn};

use super::dataset::Dataset;
use super::source::{DataSource, FetchPoll, FetchResult, PendingFetch};
use crate::bodies::Body;

/// What a provider can offer right now
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Availability<'a> {
    /// Requested but not arrived yet
    Loading,
    /// Loaded and decoded
    Ready(&'a Dataset),
    /// The fetch or the decoding failed; it is not retried
    Absent,
}

#[derive(Debug)]
enum LoadState {
    Idle,
    Requested(PendingFetch),
    Ready(Dataset),
    Absent,
}

/// Samples of one body in one tier, fetched at most once
#[derive(Debug)]
pub struct DatasetProvider {
    body: Body,
    tier: String,
    path: String,
    state: LoadState,
}

impl DatasetProvider {
    /// Create a provider for the document at `path`; nothing is fetched yet
    pub fn new(body: Body, tier: &str, path: String) -> Self {
        Self {
            body,
            tier: tier.to_string(),
            path,
            state: LoadState::Idle,
        }
    }

    /// Body the samples belong to
    pub fn body(&self) -> Body {
        self.body
    }

    /// Tier name
    pub fn tier(&self) -> &str {
        &self.tier
    }

    /// Whether the fetch has been issued
    pub fn is_requested(&self) -> bool {
        !matches!(self.state, LoadState::Idle)
    }

    /// Begin fetching, unless that already happened
    pub fn load(&mut self, source: &dyn DataSource) {
        if self.is_requested() {
            return;
        }
        debug!("requesting {} {} from {}", self.body, self.tier, self.path);
        self.state = LoadState::Requested(source.request(&self.path));
    }

    /// Load if needed and report what is available
    pub fn poll(&mut self, source: &dyn DataSource) -> Availability<'_> {
        self.load(source);

        let arrived = match &mut self.state {
            LoadState::Requested(pending) => match pending.try_take() {
                FetchPoll::Done(result) => Some(result),
                FetchPoll::Pending => None,
            },
            _ => None,
        };
        if let Some(result) = arrived {
            self.state = self.decode(result);
        }

        match &self.state {
            LoadState::Idle | LoadState::Requested(_) => Availability::Loading,
            LoadState::Ready(dataset) => Availability::Ready(dataset),
            LoadState::Absent => Availability::Absent,
        }
    }

    fn decode(&self, result: FetchResult) -> LoadState {
        match result.and_then(|bytes| Dataset::from_bytes(&bytes)) {
            Ok(dataset) => {
                debug!(
                    "loaded {} {}: {} samples",
                    self.body,
                    self.tier,
                    dataset.len()
                );
                LoadState::Ready(dataset)
            }
            Err(e) => {
                warn!("{} {} unavailable ({}): {}", self.body, self.tier, self.path, e);
                LoadState::Absent
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MemorySource;
    use crate::ClockError;
    use std::cell::RefCell;
    use std::sync::mpsc::Sender;

    /// Source whose fetches complete only when the test says so
    #[derive(Default)]
    struct GatedSource {
        senders: RefCell<Vec<Sender<FetchResult>>>,
    }

    impl DataSource for GatedSource {
        fn request(&self, _path: &str) -> PendingFetch {
            let (tx, pending) = PendingFetch::channel();
            self.senders.borrow_mut().push(tx);
            pending
        }

        fn describe(&self) -> String {
            "gated".to_string()
        }
    }

    #[test]
    fn test_loading_until_fetch_completes() {
        let source = GatedSource::default();
        let mut provider = DatasetProvider::new(Body::Sun, "lite", "lite/sun.json".to_string());
        assert!(!provider.is_requested());

        assert_eq!(provider.poll(&source), Availability::Loading);
        assert_eq!(provider.poll(&source), Availability::Loading);
        assert!(provider.is_requested());
        assert_eq!(source.senders.borrow().len(), 1);

        source.senders.borrow()[0]
            .send(Ok(br#"{"20240101": 1.5}"#.to_vec()))
            .unwrap();
        match provider.poll(&source) {
            Availability::Ready(dataset) => assert_eq!(dataset.samples()[0].longitude, 1.5),
            other => panic!("expected ready, got {:?}", other),
        }
        assert!(matches!(provider.poll(&source), Availability::Ready(_)));
    }

    #[test]
    fn test_single_fetch_per_provider() {
        let source = MemorySource::new().with_document("lite/mars.json", "{}");
        let mut provider = DatasetProvider::new(Body::Mars, "lite", "lite/mars.json".to_string());
        provider.load(&source);
        provider.load(&source);
        for _ in 0..5 {
            provider.poll(&source);
        }
        assert_eq!(source.request_count("lite/mars.json"), 1);
    }

    #[test]
    fn test_failed_fetch_is_absent_and_not_retried() {
        let source = GatedSource::default();
        let mut provider = DatasetProvider::new(Body::Moon, "lite", "lite/moon.json".to_string());
        provider.load(&source);
        source.senders.borrow()[0]
            .send(Err(ClockError::FetchError("offline".to_string())))
            .unwrap();

        assert_eq!(provider.poll(&source), Availability::Absent);
        assert_eq!(provider.poll(&source), Availability::Absent);
        assert_eq!(source.senders.borrow().len(), 1);
    }

    #[test]
    fn test_malformed_document_is_absent() {
        let source = MemorySource::new().with_document("lite/venus.json", "[1, 2, 3]");
        let mut provider = DatasetProvider::new(Body::Venus, "lite", "lite/venus.json".to_string());
        assert_eq!(provider.poll(&source), Availability::Absent);
    }
}
