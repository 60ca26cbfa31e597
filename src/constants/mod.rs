//! Constants module for the clock engine

use std::f64::consts::PI;

// Time constants
/// Milliseconds in a day
pub const DAY_MS: f64 = 86_400_000.0;
/// Seconds in half a day, one turn of the globe relative to the Sun hand
pub const HALF_DAY_S: f64 = 43_200.0;

// Angles
/// Tau (2*PI) for full circle
pub const TAU: f64 = 2.0 * PI;

// Interpolation
/// Bracketing samples must lie fewer than this many calendar days from the
/// requested day
pub const SCAN_WINDOW_DAYS: i64 = 60;

// Tiers and file layout
/// Name of the coarse tier every body has
pub const COARSE_TIER: &str = "lite";
/// Location of the fine tier manifest below the data root
pub const MANIFEST_PATH: &str = "full/index.json";
/// Directory holding the fine tiers below the data root
pub const FINE_TIER_DIR: &str = "full";

// Virtual clock
/// Animation ticks per second
pub const TICK_HZ: f64 = 50.0;
/// Each tick closes 1/SPEED_RELAXATION of the gap between speed and target
pub const SPEED_RELAXATION: f64 = 5.0;
/// Relative speed error under which the speed snaps to its target
pub const SPEED_SNAP_TOLERANCE: f64 = 0.001;
/// Real time
pub const REAL_TIME: f64 = 1.0;
/// Speed multipliers offered by the speed controls, backward to forward
pub const SPEED_PRESETS: [f64; 9] = [
    -10_000_000.0,
    -1_000_000.0,
    -100_000.0,
    -10_000.0,
    REAL_TIME,
    10_000.0,
    100_000.0,
    1_000_000.0,
    10_000_000.0,
];
/// The Moon hand is hidden at or above this absolute speed
pub const MOON_HIDE_SPEED: f64 = 5_000_000.0;
