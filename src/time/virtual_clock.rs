//! Variable speed, seekable simulation clock
//!
//! The displayed time follows `current = offset + speed * wall` between user
//! actions. Speed changes are eased over several ticks, and the offset is
//! re-derived after every change so the displayed time never jumps.
//!
//! Internally the clock keeps the time displayed at the last tick together
//! with the wall time of that tick rather than the offset itself. The two are
//! equivalent (`offset = current - speed * wall`), but the anchored form keeps
//! magnitudes small when the speed is large and makes seeks exact.

use log::{debug, warn};

use super::Timestamp;
use crate::constants::{REAL_TIME, SPEED_RELAXATION, SPEED_SNAP_TOLERANCE};

/// Mapping from wall time to simulation time
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualClock {
    /// Simulation time shown at the anchor
    current: Timestamp,
    /// Wall time at which `current` was shown
    anchor_wall: Timestamp,
    speed: f64,
    target_speed: f64,
    relaxation: f64,
    snap_tolerance: f64,
}

impl VirtualClock {
    /// Create a real-time clock showing the wall time `wall_now`
    pub fn new(wall_now: Timestamp) -> Self {
        Self::starting_at(wall_now, wall_now)
    }

    /// Create a real-time clock showing `timestamp` at wall time `wall_now`
    pub fn starting_at(timestamp: Timestamp, wall_now: Timestamp) -> Self {
        Self {
            current: timestamp,
            anchor_wall: wall_now,
            speed: REAL_TIME,
            target_speed: REAL_TIME,
            relaxation: SPEED_RELAXATION,
            snap_tolerance: SPEED_SNAP_TOLERANCE,
        }
    }

    /// Override the easing constants
    ///
    /// Each tick closes `1 / relaxation` of the remaining gap to the target
    /// speed and snaps once the relative gap is under `snap_tolerance`.
    pub fn with_easing(mut self, relaxation: f64, snap_tolerance: f64) -> Self {
        self.relaxation = relaxation;
        self.snap_tolerance = snap_tolerance;
        self
    }

    /// Advance to wall time `wall_now` and return the simulation time to show
    pub fn tick(&mut self, wall_now: Timestamp) -> Timestamp {
        // offset + speed * wall_now, with offset = current - speed * anchor_wall
        self.current += self.speed * (wall_now - self.anchor_wall);
        self.anchor_wall = wall_now;
        self.ease_speed();
        self.current
    }

    /// Nudge the speed toward its target
    fn ease_speed(&mut self) {
        if self.speed == self.target_speed {
            return;
        }

        let gap = self.target_speed - self.speed;
        let settled = if self.target_speed == 0.0 {
            self.speed.abs() < self.snap_tolerance
        } else {
            (gap / self.target_speed).abs() < self.snap_tolerance
        };

        if settled {
            self.speed = self.target_speed;
            debug!("clock speed settled at {}x", self.speed);
        } else {
            self.speed += gap / self.relaxation;
        }
    }

    /// Request a new speed multiplier, reached smoothly over the next ticks
    pub fn set_target_speed(&mut self, multiplier: f64) {
        if !multiplier.is_finite() {
            warn!("ignoring non-finite clock speed {}", multiplier);
            return;
        }
        self.target_speed = multiplier;
    }

    /// Show exactly `timestamp` at the tick for wall time `wall_now`, then
    /// return to real time
    pub fn seek(&mut self, timestamp: Timestamp, wall_now: Timestamp) {
        self.current = timestamp;
        self.anchor_wall = wall_now;
        self.target_speed = REAL_TIME;
    }

    /// Show the wall time at the tick for wall time `wall_now`, keeping the
    /// current speed
    pub fn jump_to_now(&mut self, wall_now: Timestamp) {
        self.current = wall_now;
        self.anchor_wall = wall_now;
    }

    /// Simulation time shown at the last tick (or set by the last seek)
    pub fn current_timestamp(&self) -> Timestamp {
        self.current
    }

    /// Current speed multiplier
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Speed multiplier being eased toward
    pub fn target_speed(&self) -> f64 {
        self.target_speed
    }

    /// Time origin correction: `current = offset + speed * wall`
    pub fn offset(&self) -> f64 {
        self.current - self.speed * self.anchor_wall
    }
}
