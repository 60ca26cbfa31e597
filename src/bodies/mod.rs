//! The bodies shown on the clock face

use std::fmt;
use std::str::FromStr;

use crate::constants::MOON_HIDE_SPEED;
use crate::ClockError;

/// Enum representing the bodies that get a hand on the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Body {
    Sun,
    Moon,
    Mercury,
    Venus,
    Mars,
    Jupiter,
    Saturn,
    Uranus,
    Neptune,
    Vesta,
    Iris,
    Ceres,
    Pallas,
}

impl Body {
    /// Every body, in drawing order
    pub const ALL: [Body; 13] = [
        Body::Sun,
        Body::Moon,
        Body::Mercury,
        Body::Venus,
        Body::Mars,
        Body::Jupiter,
        Body::Saturn,
        Body::Uranus,
        Body::Neptune,
        Body::Vesta,
        Body::Iris,
        Body::Ceres,
        Body::Pallas,
    ];

    /// Get the body's name as used in data paths and the tier manifest
    pub fn name(&self) -> &'static str {
        match self {
            Body::Sun => "sun",
            Body::Moon => "moon",
            Body::Mercury => "mercury",
            Body::Venus => "venus",
            Body::Mars => "mars",
            Body::Jupiter => "jupiter",
            Body::Saturn => "saturn",
            Body::Uranus => "uranus",
            Body::Neptune => "neptune",
            Body::Vesta => "vesta",
            Body::Iris => "iris",
            Body::Ceres => "ceres",
            Body::Pallas => "pallas",
        }
    }

    /// Whether this body's hand is drawn at the given clock speed
    ///
    /// At very high speeds the Moon laps the dial several times per frame,
    /// so its hand is left out.
    pub fn hand_visible(&self, speed: f64) -> bool {
        match self {
            Body::Moon => speed.abs() < MOON_HIDE_SPEED,
            _ => true,
        }
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Body {
    type Err = ClockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Body::ALL
            .iter()
            .copied()
            .find(|body| body.name() == lower)
            .ok_or_else(|| ClockError::ConfigError(format!("unknown body {:?}", s)))
    }
}
