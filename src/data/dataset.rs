//! Decoded longitude samples for one (body, tier)

use std::collections::BTreeMap;
use std::io::Read;

use flate2::read::GzDecoder;
use serde::Deserialize;

use crate::constants::DAY_MS;
use crate::time::{DateKey, Timestamp};
use crate::{ClockError, Result};

/// gzip streams start with these two bytes
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// One longitude sample, taken at UTC midnight of its day
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Days since 1970-01-01
    pub day: i64,
    /// Ecliptic longitude in radians, not normalized
    pub longitude: f64,
}

impl Sample {
    /// Timestamp of the sample
    pub fn timestamp(&self) -> Timestamp {
        self.day as f64 * DAY_MS
    }
}

/// The two samples surrounding a requested time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    /// Latest sample on or before the requested day
    pub before: Sample,
    /// Earliest sample after the requested day
    pub after: Sample,
}

/// The two layouts a dataset document may use
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Document {
    /// `{ "YYYYMMDD": longitude, ... }`
    Keyed(BTreeMap<String, f64>),
    /// `[ ["YYYYMMDD", longitude], ... ]`
    Rows(Vec<(String, f64)>),
}

/// Samples of one tier, strictly ordered by day
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    /// Build a dataset from samples in any order
    ///
    /// Two samples on the same day are rejected.
    pub fn from_samples(mut samples: Vec<Sample>) -> Result<Self> {
        samples.sort_by_key(|sample| sample.day);
        if let Some(pair) = samples.windows(2).find(|pair| pair[0].day == pair[1].day) {
            return Err(ClockError::DataError(format!(
                "duplicate sample for day {}",
                pair[0].day
            )));
        }
        Ok(Self { samples })
    }

    /// Decode a JSON document, inflating it first if it is gzip-compressed
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.starts_with(&GZIP_MAGIC) {
            let mut json = Vec::new();
            GzDecoder::new(bytes)
                .read_to_end(&mut json)
                .map_err(|e| ClockError::DataError(format!("failed to decompress: {}", e)))?;
            return Self::from_json(&json);
        }
        Self::from_json(bytes)
    }

    fn from_json(json: &[u8]) -> Result<Self> {
        let rows: Vec<(String, f64)> = match serde_json::from_slice(json)? {
            Document::Keyed(map) => map.into_iter().collect(),
            Document::Rows(rows) => rows,
        };

        let samples = rows
            .into_iter()
            .map(|(key, longitude)| {
                let key: DateKey = key.parse()?;
                Ok(Sample {
                    day: key.day_number(),
                    longitude,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_samples(samples)
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether there are no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The samples, ordered by day
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Find the samples surrounding `timestamp`
    ///
    /// `before` is the latest sample on or before the UTC day containing
    /// `timestamp` and `after` the earliest sample on a later day. Each must
    /// lie fewer than `window_days` days from that day, otherwise there is no
    /// bracket.
    pub fn bracket(&self, timestamp: Timestamp, window_days: i64) -> Option<Bracket> {
        if !timestamp.is_finite() {
            return None;
        }
        let day = (timestamp / DAY_MS).floor() as i64;

        let index = self.samples.partition_point(|sample| sample.day <= day);
        let before = *self.samples.get(index.checked_sub(1)?)?;
        let after = *self.samples.get(index)?;

        if day - before.day >= window_days || after.day - day >= window_days {
            return None;
        }
        Some(Bracket { before, after })
    }
}
