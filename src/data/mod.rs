//! Data module for fetching and decoding longitude datasets
//!
//! This module provides the data sources documents are fetched from, the
//! decoded [`Dataset`] and the [`DatasetProvider`] that loads one dataset
//! in the background.

mod dataset;
mod downloader;
mod provider;
mod source;

use std::path::PathBuf;

pub use dataset::{Bracket, Dataset, Sample};
pub use downloader::{get_cache_dir, HttpSource};
pub use provider::{Availability, DatasetProvider};
pub use source::{DataSource, DirectorySource, FetchPoll, FetchResult, MemorySource, PendingFetch};

/// Open the data source for a data root
///
/// `http://` and `https://` roots are downloaded, mirrored into `cache_dir`
/// when one is given. Anything else is a local directory.
pub fn open_source(root: &str, cache_dir: Option<PathBuf>) -> Box<dyn DataSource> {
    if root.starts_with("http://") || root.starts_with("https://") {
        let source = HttpSource::new(root);
        match cache_dir {
            Some(dir) => Box::new(source.with_cache_dir(dir)),
            None => Box::new(source),
        }
    } else {
        Box::new(DirectorySource::new(root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_source_picks_by_scheme() {
        let http = open_source("https://example.org/data", None);
        assert_eq!(http.describe(), "https://example.org/data");

        let cached = open_source("http://example.org", Some(PathBuf::from("/tmp/cache")));
        assert!(cached.describe().contains("/tmp/cache"));

        let local = open_source("data", None);
        assert_eq!(local.describe(), "data");
    }
}
