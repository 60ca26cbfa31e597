//! Per-body longitude interpolation
//!
//! A [`BodyInterpolator`] answers "where is this body at time t" from the
//! daily samples of whichever tier covers t. It keeps the two samples around
//! the last requested time as its [`Window`] and only looks up new samples
//! when the time leaves that window, which at normal speeds is once every
//! few days of simulated time.
//!
//! Tier choice, by preference:
//!
//! 1. the fine tier covering the year of t, once the manifest is loaded
//! 2. the coarse tier, when no fine tier covers the year, when the fine tier
//!    has no samples close enough to t, or when it failed to load
//!
//! While the chosen tier is still loading there is no longitude.

use std::f64::consts::PI;

use log::{info, trace};

use crate::bodies::Body;
use crate::config::ClockConfig;
use crate::constants::TAU;
use crate::data::{Availability, Bracket, DataSource, DatasetProvider};
use crate::tiers::{select_tier_index, Manifest, TierSpan};
use crate::time::{utc_year, Timestamp};

/// Bring `lon2` within half a turn of `lon1`
///
/// Only `lon2` moves, by a whole number of turns, and only when the pair is
/// more than half a turn apart.
pub fn unwrap_pair(lon1: f64, lon2: f64) -> (f64, f64) {
    let delta = lon2 - lon1;
    if delta.abs() <= PI {
        return (lon1, lon2);
    }
    (lon1, lon1 + (delta + PI).rem_euclid(TAU) - PI)
}

/// The two samples in effect around the current time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub date1: Timestamp,
    pub lon1: f64,
    pub date2: Timestamp,
    pub lon2: f64,
    /// `date2 - date1`, always positive
    pub span: f64,
}

impl Window {
    /// Window between two bracketing samples
    pub fn from_bracket(bracket: &Bracket) -> Self {
        let date1 = bracket.before.timestamp();
        let date2 = bracket.after.timestamp();
        let (lon1, lon2) = unwrap_pair(bracket.before.longitude, bracket.after.longitude);
        // Samples are on distinct days, so the span cannot be zero
        debug_assert!(date2 > date1);
        Self {
            date1,
            lon1,
            date2,
            lon2,
            span: date2 - date1,
        }
    }

    /// Whether `timestamp` lies in [date1, date2]
    pub fn contains(&self, timestamp: Timestamp) -> bool {
        self.date1 <= timestamp && timestamp <= self.date2
    }

    /// Interpolated hand angle at `timestamp`
    ///
    /// The result is the negated longitude: ecliptic longitude grows
    /// counter-clockwise while the dial is drawn clockwise.
    pub fn longitude_at(&self, timestamp: Timestamp) -> f64 {
        let x = (timestamp - self.date1) / self.span;
        -(self.lon1 * (1.0 - x) + self.lon2 * x)
    }
}

/// Why there is no usable window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// The chosen tier has not finished loading
    Loading,
    /// No tier has samples close enough to the requested time
    OutOfBounds,
}

/// Observable state of an interpolator
///
/// `AwaitingTierIndex → TierSelected → WindowReady ⇄ WindowStale`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolatorState {
    /// No manifest yet; the coarse tier serves in the meantime
    AwaitingTierIndex,
    /// Manifest seen and a tier chosen, but no window resolved from it yet
    TierSelected,
    /// A window is in effect
    WindowReady,
    /// The last resolution produced no window
    WindowStale(Staleness),
}

/// Identifies one of the interpolator's tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierChoice {
    Coarse,
    /// Position in the body's fine tier list
    Fine(usize),
}

/// How far tier selection has come
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    AwaitingTierIndex,
    TierSelected,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum WindowState {
    Unresolved,
    Ready(Window),
    Stale(Staleness),
}

enum Lookup {
    Found(Window),
    Missing,
    Loading,
    Absent,
}

/// Longitude source for one body
#[derive(Debug)]
pub struct BodyInterpolator {
    body: Body,
    coarse: DatasetProvider,
    fine_spans: Vec<TierSpan>,
    fine: Vec<DatasetProvider>,
    /// Fine providers are created the first time a manifest is seen
    phase: Phase,
    /// Document layout and scan window
    layout: ClockConfig,
    current: TierChoice,
    window: WindowState,
}

impl BodyInterpolator {
    /// Create the interpolator for `body`; nothing is fetched yet
    pub fn new(body: Body, config: &ClockConfig) -> Self {
        Self {
            body,
            coarse: DatasetProvider::new(body, &config.coarse_tier, config.coarse_path(body)),
            fine_spans: Vec::new(),
            fine: Vec::new(),
            phase: Phase::AwaitingTierIndex,
            layout: config.clone(),
            current: TierChoice::Coarse,
            window: WindowState::Unresolved,
        }
    }

    /// The body this interpolator follows
    pub fn body(&self) -> Body {
        self.body
    }

    /// Start fetching the coarse tier
    pub fn preload(&mut self, source: &dyn DataSource) {
        self.coarse.load(source);
    }

    /// Tier currently in effect
    pub fn current_tier(&self) -> TierChoice {
        self.current
    }

    /// Name of the tier currently in effect
    pub fn current_tier_name(&self) -> &str {
        match self.current {
            TierChoice::Coarse => self.coarse.tier(),
            TierChoice::Fine(position) => self.fine_spans[position].name(),
        }
    }

    /// The window in effect, if any
    pub fn window(&self) -> Option<&Window> {
        match &self.window {
            WindowState::Ready(window) => Some(window),
            _ => None,
        }
    }

    /// Current state
    pub fn state(&self) -> InterpolatorState {
        match (self.phase, self.window) {
            (Phase::AwaitingTierIndex, _) => InterpolatorState::AwaitingTierIndex,
            (Phase::TierSelected, _) | (Phase::Resolved, WindowState::Unresolved) => {
                InterpolatorState::TierSelected
            }
            (Phase::Resolved, WindowState::Ready(_)) => InterpolatorState::WindowReady,
            (Phase::Resolved, WindowState::Stale(reason)) => InterpolatorState::WindowStale(reason),
        }
    }

    /// Hand angle of the body at `timestamp`, or `None` if the data for that
    /// time is not available (yet)
    pub fn longitude(
        &mut self,
        timestamp: Timestamp,
        source: &dyn DataSource,
        manifest: Option<&Manifest>,
    ) -> Option<f64> {
        let fresh = match &self.window {
            WindowState::Ready(window) => window.contains(timestamp),
            _ => false,
        };
        // A newly arrived manifest may offer a finer tier for the same time
        let upgrade = manifest.is_some() && self.phase == Phase::AwaitingTierIndex;

        if !fresh || upgrade {
            self.resolve_window(timestamp, source, manifest);
        }

        self.window().map(|window| window.longitude_at(timestamp))
    }

    /// Choose the tier for `timestamp`
    ///
    /// Without a manifest this is always the coarse tier. Once a manifest is
    /// available the body's fine tiers are registered (without fetching) and
    /// the one covering the year of `timestamp` is chosen.
    pub fn select_tier(&mut self, timestamp: Timestamp, manifest: Option<&Manifest>) -> TierChoice {
        let Some(manifest) = manifest else {
            return TierChoice::Coarse;
        };
        self.register_fine_tiers(manifest);

        utc_year(timestamp)
            .and_then(|year| select_tier_index(&self.fine_spans, year))
            .map_or(TierChoice::Coarse, TierChoice::Fine)
    }

    fn register_fine_tiers(&mut self, manifest: &Manifest) {
        if self.phase != Phase::AwaitingTierIndex {
            return;
        }
        self.phase = Phase::TierSelected;
        self.fine_spans = manifest.tiers_for(self.body).to_vec();
        self.fine = self
            .fine_spans
            .iter()
            .map(|span| {
                let path = self.layout.fine_path(span.name(), self.body);
                DatasetProvider::new(self.body, span.name(), path)
            })
            .collect();
        info!("{}: {} fine tiers available", self.body, self.fine.len());
    }

    /// Find the samples around `timestamp`, switching tiers as needed
    pub fn resolve_window(
        &mut self,
        timestamp: Timestamp,
        source: &dyn DataSource,
        manifest: Option<&Manifest>,
    ) {
        let preferred = self.select_tier(timestamp, manifest);

        let mut choice = preferred;
        let outcome = loop {
            match (self.lookup(choice, timestamp, source), choice) {
                // A fine tier that cannot help hands over to the coarse tier
                (Lookup::Missing | Lookup::Absent, TierChoice::Fine(_)) => {
                    trace!(
                        "{}: tier {} has nothing near {}, falling back",
                        self.body,
                        self.tier_name(choice),
                        timestamp
                    );
                    choice = TierChoice::Coarse;
                }
                (lookup, _) => break lookup,
            }
        };

        if choice != self.current {
            info!(
                "{}: switching from tier {} to {}",
                self.body,
                self.current_tier_name(),
                self.tier_name(choice)
            );
            self.current = choice;
        }

        self.window = match outcome {
            Lookup::Found(window) => WindowState::Ready(window),
            Lookup::Missing => {
                trace!("{}: no samples near {}", self.body, timestamp);
                WindowState::Stale(Staleness::OutOfBounds)
            }
            // A failed coarse tier looks the same as one still loading
            Lookup::Loading | Lookup::Absent => WindowState::Stale(Staleness::Loading),
        };

        // Selection is settled once some tier's samples decided the window
        let decided = matches!(
            self.window,
            WindowState::Ready(_) | WindowState::Stale(Staleness::OutOfBounds)
        );
        if self.phase == Phase::TierSelected && decided {
            self.phase = Phase::Resolved;
        }
    }

    fn lookup(&mut self, choice: TierChoice, timestamp: Timestamp, source: &dyn DataSource) -> Lookup {
        let window_days = self.layout.scan_window_days;
        let provider = match choice {
            TierChoice::Coarse => &mut self.coarse,
            TierChoice::Fine(position) => &mut self.fine[position],
        };

        match provider.poll(source) {
            Availability::Ready(dataset) => match dataset.bracket(timestamp, window_days) {
                Some(bracket) => Lookup::Found(Window::from_bracket(&bracket)),
                None => Lookup::Missing,
            },
            Availability::Loading => Lookup::Loading,
            Availability::Absent => Lookup::Absent,
        }
    }

    fn tier_name(&self, choice: TierChoice) -> &str {
        match choice {
            TierChoice::Coarse => self.coarse.tier(),
            TierChoice::Fine(position) => self.fine_spans[position].name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FetchResult, MemorySource, PendingFetch, Sample};
    use crate::time::key_to_date;
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::sync::mpsc::Sender;

    fn config() -> ClockConfig {
        ClockConfig::default().without_cache()
    }

    fn sample(key: &str, longitude: f64) -> Sample {
        Sample {
            day: key.parse::<crate::time::DateKey>().unwrap().day_number(),
            longitude,
        }
    }

    fn window(lon1: f64, lon2: f64) -> Window {
        let bracket = Bracket {
            before: sample("20240101", lon1),
            after: sample("20240201", lon2),
        };
        Window::from_bracket(&bracket)
    }

    #[test]
    fn test_endpoints_and_midpoint() {
        let w = window(1.0, 1.5);
        assert_eq!(w.longitude_at(w.date1), -1.0);
        assert_eq!(w.longitude_at(w.date2), -1.5);
        assert_relative_eq!(w.longitude_at(w.date1 + w.span / 2.0), -1.25);
        assert_relative_eq!(w.longitude_at(w.date1 + w.span / 4.0), -1.125);
    }

    #[test]
    fn test_wraparound_goes_the_short_way() {
        let w = window(0.1, TAU - 0.1);
        assert!((w.lon1 - w.lon2).abs() <= PI);
        assert_relative_eq!(w.lon1, 0.1);
        assert_relative_eq!(w.lon2, -0.1, epsilon = 1e-12);

        // Hand angles move monotonically through zero
        let mut previous = w.longitude_at(w.date1);
        for step in 1..=10 {
            let angle = w.longitude_at(w.date1 + w.span * step as f64 / 10.0);
            assert!(angle > previous);
            assert!(angle.abs() <= 0.1 + 1e-12);
            previous = angle;
        }

        // And the other way round
        let w = window(TAU - 0.1, 0.1);
        assert_relative_eq!(w.lon2, TAU + 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_unwrap_pair_leaves_close_pairs_alone() {
        assert_eq!(unwrap_pair(1.0, 2.0), (1.0, 2.0));
        assert_eq!(unwrap_pair(7.0, 7.2), (7.0, 7.2));
        let (a, b) = unwrap_pair(0.0, 3.0 * TAU + 0.5);
        assert_eq!(a, 0.0);
        assert_relative_eq!(b, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let w = window(0.0, 1.0);
        assert!(w.contains(w.date1));
        assert!(w.contains(w.date2));
        assert!(!w.contains(w.date2 + 1.0));
        assert!(!w.contains(w.date1 - 1.0));
    }

    #[test]
    fn test_coarse_only_until_manifest() {
        let source = MemorySource::new()
            .with_document("lite/sun.json", r#"{"20240101": 0.0, "20240201": 1.0}"#);
        let mut sun = BodyInterpolator::new(Body::Sun, &config());
        assert_eq!(sun.state(), InterpolatorState::AwaitingTierIndex);

        let t = key_to_date("20240116").unwrap() + 43_200_000.0;
        assert_eq!(sun.longitude(t, &source, None), Some(-0.5));
        // The coarse tier serves, but the index is still outstanding
        assert_eq!(sun.state(), InterpolatorState::AwaitingTierIndex);
        assert_eq!(sun.current_tier(), TierChoice::Coarse);
    }

    /// Fetches that finish only when the test says so
    #[derive(Default)]
    struct HeldSource {
        held: RefCell<HashMap<String, Sender<FetchResult>>>,
    }

    impl HeldSource {
        fn finish(&self, path: &str, document: &str) {
            let tx = self.held.borrow_mut().remove(path).unwrap();
            tx.send(Ok(document.as_bytes().to_vec())).unwrap();
        }
    }

    impl DataSource for HeldSource {
        fn request(&self, path: &str) -> PendingFetch {
            let (tx, pending) = PendingFetch::channel();
            self.held.borrow_mut().insert(path.to_string(), tx);
            pending
        }

        fn describe(&self) -> String {
            "held".to_string()
        }
    }

    #[test]
    fn test_states_through_manifest_and_fine_tier() {
        let source = HeldSource::default();
        let mut sun = BodyInterpolator::new(Body::Sun, &config());
        let t = key_to_date("20240116").unwrap() + 43_200_000.0;

        assert_eq!(sun.longitude(t, &source, None), None);
        assert_eq!(sun.state(), InterpolatorState::AwaitingTierIndex);

        source.finish("lite/sun.json", r#"{"20240101": 0.0, "20240201": 1.0}"#);
        assert_eq!(sun.longitude(t, &source, None), Some(-0.5));
        assert_eq!(sun.state(), InterpolatorState::AwaitingTierIndex);

        // The manifest picks a fine tier that has yet to arrive
        let manifest = Manifest::from_bytes(br#"{"sun": ["2000-2100"]}"#).unwrap();
        for _ in 0..3 {
            assert_eq!(sun.longitude(t, &source, Some(&manifest)), None);
            assert_eq!(sun.state(), InterpolatorState::TierSelected);
        }
        assert_eq!(sun.current_tier(), TierChoice::Fine(0));

        source.finish("full/2000-2100/sun.json", r#"{"20240116": 0.2, "20240117": 0.4}"#);
        assert_relative_eq!(
            sun.longitude(t, &source, Some(&manifest)).unwrap(),
            -0.3,
            epsilon = 1e-12
        );
        assert_eq!(sun.state(), InterpolatorState::WindowReady);

        // Nothing near June in either tier
        let june = key_to_date("20240601").unwrap();
        assert_eq!(sun.longitude(june, &source, Some(&manifest)), None);
        assert_eq!(
            sun.state(),
            InterpolatorState::WindowStale(Staleness::OutOfBounds)
        );

        assert!(sun.longitude(t, &source, Some(&manifest)).is_some());
        assert_eq!(sun.state(), InterpolatorState::WindowReady);
    }

    #[test]
    fn test_select_tier_registers_without_fetching() {
        let source = HeldSource::default();
        let mut sun = BodyInterpolator::new(Body::Sun, &config());
        let manifest = Manifest::from_bytes(br#"{"sun": ["1900-2000", "2001-2100"]}"#).unwrap();

        let t = key_to_date("20500101").unwrap();
        assert_eq!(sun.select_tier(t, Some(&manifest)), TierChoice::Fine(1));
        assert_eq!(sun.select_tier(t, None), TierChoice::Coarse);
        assert_eq!(sun.state(), InterpolatorState::TierSelected);
        assert!(source.held.borrow().is_empty());
    }
}
