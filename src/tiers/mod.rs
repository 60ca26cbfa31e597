//! Fine tier manifest and tier selection
//!
//! Besides its coarse tier, a body may have dense tiers covering a span of
//! years each. The manifest lists them per body:
//!
//! ```json
//! { "sun": ["1900-2000", "2001-2100"], "moon": ["1900-2100"] }
//! ```
//!
//! A tier name is its inclusive year range. Years may be negative
//! (`"-3000--2001"`).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;

use crate::bodies::Body;
use crate::data::{DataSource, FetchPoll, PendingFetch};
use crate::{ClockError, Result};

lazy_static! {
    /// `<start>-<stop>`, both possibly negative
    static ref TIER_NAME: Regex =
        Regex::new(r"^(-?\d+)-(-?\d+)$").expect("tier name pattern is valid");
}

/// A fine tier and the inclusive range of years it covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierSpan {
    name: String,
    start: i32,
    stop: i32,
}

impl TierSpan {
    /// Tier name, as listed in the manifest
    pub fn name(&self) -> &str {
        &self.name
    }

    /// First year covered
    pub fn start(&self) -> i32 {
        self.start
    }

    /// Last year covered
    pub fn stop(&self) -> i32 {
        self.stop
    }

    /// Whether `year` falls in this tier
    pub fn contains(&self, year: i32) -> bool {
        self.start <= year && year <= self.stop
    }

    /// Number of years covered
    pub fn width(&self) -> i64 {
        i64::from(self.stop) - i64::from(self.start) + 1
    }
}

impl FromStr for TierSpan {
    type Err = ClockError;

    fn from_str(name: &str) -> Result<Self> {
        let invalid = || ClockError::InvalidTierName(name.to_string());
        let captures = TIER_NAME.captures(name).ok_or_else(invalid)?;
        let start: i32 = captures[1].parse().map_err(|_| invalid())?;
        let stop: i32 = captures[2].parse().map_err(|_| invalid())?;
        if start > stop {
            return Err(invalid());
        }
        Ok(Self {
            name: name.to_string(),
            start,
            stop,
        })
    }
}

impl fmt::Display for TierSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Pick the tier covering `year`
///
/// When several tiers cover the year the narrowest wins, then the one
/// starting earliest, then the one listed first.
pub fn select_tier(tiers: &[TierSpan], year: i32) -> Option<&TierSpan> {
    select_tier_index(tiers, year).map(|position| &tiers[position])
}

/// Position in `tiers` of the tier [`select_tier`] picks
pub fn select_tier_index(tiers: &[TierSpan], year: i32) -> Option<usize> {
    tiers
        .iter()
        .enumerate()
        .filter(|(_, tier)| tier.contains(year))
        .min_by_key(|(position, tier)| (tier.width(), tier.start, *position))
        .map(|(position, _)| position)
}

/// Decoded manifest: the fine tiers of each body, in manifest order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    tiers: BTreeMap<Body, Vec<TierSpan>>,
}

impl Manifest {
    /// Decode a manifest document
    ///
    /// Unknown bodies and malformed tier names are skipped with a warning
    /// rather than failing the whole manifest.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: BTreeMap<String, Vec<String>> = serde_json::from_slice(bytes)?;

        let mut tiers = BTreeMap::new();
        for (body_name, names) in raw {
            let body: Body = match body_name.parse() {
                Ok(body) => body,
                Err(_) => {
                    warn!("manifest lists unknown body {:?}", body_name);
                    continue;
                }
            };

            let spans = names
                .iter()
                .filter_map(|name| match name.parse::<TierSpan>() {
                    Ok(span) => Some(span),
                    Err(e) => {
                        warn!("skipping {} tier: {}", body, e);
                        None
                    }
                })
                .collect();
            tiers.insert(body, spans);
        }

        Ok(Self { tiers })
    }

    /// Fine tiers of `body`, in manifest order
    pub fn tiers_for(&self, body: Body) -> &[TierSpan] {
        self.tiers.get(&body).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug)]
enum IndexState {
    Idle,
    Requested(PendingFetch),
    Ready(Manifest),
}

/// The fine tier manifest, fetched once
#[derive(Debug)]
pub struct TierIndex {
    path: String,
    state: IndexState,
}

impl TierIndex {
    /// Index read from `path` in the data source; nothing is fetched yet
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            state: IndexState::Idle,
        }
    }

    /// Begin fetching the manifest, unless that already happened
    pub fn load(&mut self, source: &dyn DataSource) {
        if matches!(self.state, IndexState::Idle) {
            debug!("requesting tier manifest {}", self.path);
            self.state = IndexState::Requested(source.request(&self.path));
        }
    }

    /// Collect the manifest if it has arrived
    ///
    /// A manifest that cannot be fetched or decoded counts as an empty one:
    /// every body then stays on its coarse tier.
    pub fn poll(&mut self, source: &dyn DataSource) -> Option<&Manifest> {
        self.load(source);

        let arrived = match &mut self.state {
            IndexState::Requested(pending) => match pending.try_take() {
                FetchPoll::Done(result) => Some(result),
                FetchPoll::Pending => None,
            },
            _ => None,
        };
        if let Some(result) = arrived {
            let manifest = match result.and_then(|bytes| Manifest::from_bytes(&bytes)) {
                Ok(manifest) => {
                    debug!("tier manifest loaded from {}", self.path);
                    manifest
                }
                Err(e) => {
                    warn!(
                        "tier manifest {} unavailable, only coarse tiers will be used: {}",
                        self.path, e
                    );
                    Manifest::default()
                }
            };
            self.state = IndexState::Ready(manifest);
        }

        self.manifest()
    }

    /// The manifest, once loaded
    pub fn manifest(&self) -> Option<&Manifest> {
        match &self.state {
            IndexState::Ready(manifest) => Some(manifest),
            _ => None,
        }
    }
}
