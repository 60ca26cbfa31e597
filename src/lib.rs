//! Ecliptic clock: an analog clock of the Sun, Moon and planets
//!
//! Each hand of the clock shows the ecliptic longitude of one body at a
//! simulation time that can run at any speed, forward or backward, and be
//! moved to far past or future dates. Longitudes are not computed from
//! orbital mechanics; they are interpolated from precomputed daily samples
//! organised in tiers: one sparse "lite" tier covering all time and a set of
//! dense per-era tiers listed in a manifest.
//!
//! The pieces, leaf first:
//!
//! - [`data`]: data sources and the per-(body, tier) [`DatasetProvider`]
//! - [`tiers`]: the [`TierIndex`] manifest and tier span selection
//! - [`interpolator`]: the per-body [`BodyInterpolator`]
//! - [`time`]: date keys and the seekable, variable speed [`VirtualClock`]
//! - [`clock`]: the [`Orrery`] context that ties them together each tick

use thiserror::Error;

pub mod bodies;
pub mod clock;
pub mod config;
pub mod constants;
pub mod data;
pub mod interpolator;
pub mod tiers;
pub mod time;

// Re-export commonly used types
pub use bodies::Body;
pub use clock::{Frame, Hand, Orrery};
pub use config::ClockConfig;
pub use data::{Availability, DataSource, DatasetProvider};
pub use interpolator::BodyInterpolator;
pub use tiers::TierIndex;
pub use time::{DateKey, Timestamp, VirtualClock};

/// Main error type for the ecliptic clock
#[derive(Debug, Error)]
pub enum ClockError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Fetch error: {0}")]
    FetchError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Malformed dataset: {0}")]
    DataError(String),

    #[error("Invalid date key: {0:?}")]
    InvalidDateKey(String),

    #[error("Invalid tier name: {0:?}")]
    InvalidTierName(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for ecliptic clock operations
pub type Result<T> = std::result::Result<T, ClockError>;
