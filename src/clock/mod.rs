//! The clock context: one object owning every moving part
//!
//! An [`Orrery`] holds the data source, the tier index, one interpolator per
//! body and the virtual clock. The animation loop calls [`Orrery::tick`]
//! once per frame and draws the returned [`Frame`]; user controls call
//! [`Orrery::set_target_speed`], [`Orrery::seek`] and
//! [`Orrery::jump_to_now`] between ticks.

use std::f64::consts::PI;

use log::debug;

use crate::bodies::Body;
use crate::config::ClockConfig;
use crate::constants::{HALF_DAY_S, SPEED_PRESETS};
use crate::data::DataSource;
use crate::interpolator::BodyInterpolator;
use crate::tiers::TierIndex;
use crate::time::{seconds_of_day, SystemClock, Timestamp, VirtualClock, WallClock};
use crate::Result;

/// One hand of the clock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hand {
    pub body: Body,
    /// Hand angle in radians (negated ecliptic longitude), `None` while the
    /// data for this time is unavailable
    pub longitude: Option<f64>,
}

/// Everything needed to draw one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Simulation time shared by every hand of the frame
    pub timestamp: Timestamp,
    /// Clock speed multiplier at this frame
    pub speed: f64,
    /// Hands of the bodies visible at this speed, in drawing order
    pub hands: Vec<Hand>,
    /// Rotation of the Earth globe, when the Sun hand is known
    pub globe_rotation: Option<f64>,
}

impl Frame {
    /// The hand of `body`, if it is part of this frame
    pub fn hand(&self, body: Body) -> Option<&Hand> {
        self.hands.iter().find(|hand| hand.body == body)
    }

    /// Hand angle of `body`, if it is drawn in this frame
    pub fn longitude(&self, body: Body) -> Option<f64> {
        self.hand(body).and_then(|hand| hand.longitude)
    }
}

/// Rotation of the Earth globe under the hands
///
/// The globe turns once per day so that local noon faces the Sun hand.
pub fn globe_rotation(timestamp: Timestamp, sun_longitude: f64) -> Option<f64> {
    let seconds = seconds_of_day(timestamp)?;
    Some(sun_longitude - PI * (1.0 + seconds / HALF_DAY_S))
}

/// Speed multiplier of preset `step`, from -4 (fastest backward) through 0
/// (real time) to 4 (fastest forward)
pub fn speed_preset(step: i32) -> Option<f64> {
    let index = usize::try_from(step.checked_add(4)?).ok()?;
    SPEED_PRESETS.get(index).copied()
}

/// The clock: data, interpolators and virtual time
pub struct Orrery {
    source: Box<dyn DataSource>,
    wall: Box<dyn WallClock>,
    index: TierIndex,
    interpolators: Vec<BodyInterpolator>,
    clock: VirtualClock,
}

impl Orrery {
    /// Create a clock reading data from `config.data_root`, showing the
    /// current time at real speed
    pub fn new(config: ClockConfig) -> Result<Self> {
        config.validate()?;
        let source = config.open_source();
        Self::with_parts(config, source, Box::new(SystemClock))
    }

    /// Create a clock from explicit parts
    ///
    /// The tier manifest and every body's coarse tier start loading right
    /// away.
    pub fn with_parts(
        config: ClockConfig,
        source: Box<dyn DataSource>,
        wall: Box<dyn WallClock>,
    ) -> Result<Self> {
        config.validate()?;
        debug!("clock data from {}", source.describe());

        let mut index = TierIndex::new(&config.manifest_path);
        index.load(source.as_ref());

        let interpolators = Body::ALL
            .iter()
            .map(|&body| {
                let mut interpolator = BodyInterpolator::new(body, &config);
                interpolator.preload(source.as_ref());
                interpolator
            })
            .collect();

        let clock = VirtualClock::new(wall.now())
            .with_easing(config.speed_relaxation, config.speed_snap_tolerance);

        Ok(Self {
            source,
            wall,
            index,
            interpolators,
            clock,
        })
    }

    /// Advance the virtual clock to the current wall time and resolve every
    /// hand at the resulting simulation time
    pub fn tick(&mut self) -> Frame {
        let timestamp = self.clock.tick(self.wall.now());
        self.frame_at(timestamp)
    }

    /// Resolve every visible hand at `timestamp`
    pub fn frame_at(&mut self, timestamp: Timestamp) -> Frame {
        let speed = self.clock.speed();
        let source = self.source.as_ref();
        let manifest = self.index.poll(source);

        let hands: Vec<Hand> = self
            .interpolators
            .iter_mut()
            .filter(|interpolator| interpolator.body().hand_visible(speed))
            .map(|interpolator| Hand {
                body: interpolator.body(),
                longitude: interpolator.longitude(timestamp, source, manifest),
            })
            .collect();

        let globe_rotation = hands
            .iter()
            .find(|hand| hand.body == Body::Sun)
            .and_then(|hand| hand.longitude)
            .and_then(|sun| globe_rotation(timestamp, sun));

        Frame {
            timestamp,
            speed,
            hands,
            globe_rotation,
        }
    }

    /// Ease toward a new speed multiplier
    pub fn set_target_speed(&mut self, multiplier: f64) {
        debug!("target speed {}x", multiplier);
        self.clock.set_target_speed(multiplier);
    }

    /// Show `timestamp` at the next tick and return to real time
    pub fn seek(&mut self, timestamp: Timestamp) {
        debug!("seeking to {}", timestamp);
        self.clock.seek(timestamp, self.wall.now());
    }

    /// Show the current wall time at the next tick
    pub fn jump_to_now(&mut self) {
        self.clock.jump_to_now(self.wall.now());
    }

    /// The virtual clock
    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    /// The interpolator of `body`
    pub fn interpolator(&self, body: Body) -> Option<&BodyInterpolator> {
        self.interpolators
            .iter()
            .find(|interpolator| interpolator.body() == body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::TAU;
    use approx::assert_relative_eq;

    #[test]
    fn test_globe_rotation() {
        // At midnight the globe sits half a turn behind the Sun hand
        assert_relative_eq!(globe_rotation(0.0, 1.0).unwrap(), 1.0 - PI);
        // At noon a full turn behind
        assert_relative_eq!(globe_rotation(43_200_000.0, 1.0).unwrap(), 1.0 - TAU);
        // Six hours later, three quarters of a turn
        assert_relative_eq!(
            globe_rotation(86_400_000.0 * 3.0 + 21_600_000.0, 0.0).unwrap(),
            -1.5 * PI
        );
        assert!(globe_rotation(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn test_speed_presets() {
        assert_eq!(speed_preset(0), Some(1.0));
        assert_eq!(speed_preset(4), Some(10_000_000.0));
        assert_eq!(speed_preset(-1), Some(-10_000.0));
        assert_eq!(speed_preset(-4), Some(-10_000_000.0));
        assert_eq!(speed_preset(5), None);
        assert_eq!(speed_preset(-5), None);
        assert_eq!(speed_preset(i32::MAX), None);
        assert_eq!(speed_preset(i32::MIN), None);
    }
}
