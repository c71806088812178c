use crate::error::InvalidPostalCode;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const POSTAL_CODE_LEN: usize = 4;

/// Stored distances are whole multiples of this many meters.
pub const DISTANCE_RESOLUTION_METERS: f64 = 100.0;

/// Quantized distance units per kilometer.
pub const DISTANCE_UNITS_PER_KM: f64 = 1000.0 / DISTANCE_RESOLUTION_METERS;

/// Canonical 4-digit, left-zero-padded postal-area code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostalCode(String);

impl PostalCode {
    /// Trims and zero-pads `raw`. `"21"`, `" 021 "` and `"0021"` all become `"0021"`.
    pub fn parse(raw: &str) -> Result<Self, InvalidPostalCode> {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.len() > POSTAL_CODE_LEN
            || !trimmed.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(InvalidPostalCode {
                raw: raw.to_string(),
            });
        }
        Ok(Self(format!("{trimmed:0>width$}", width = POSTAL_CODE_LEN)))
    }

    /// Values read back from the store were canonicalized on the way in.
    pub(crate) fn from_stored(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PostalCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Directed, quantized matrix cell keyed by `(from, to)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: PostalCode,
    pub to: PostalCode,
    pub time_minutes: u32,
    pub distance_units: u32,
}

impl Edge {
    pub fn new(from: PostalCode, to: PostalCode, time_minutes: u32, distance_units: u32) -> Self {
        Self {
            from,
            to,
            time_minutes,
            distance_units,
        }
    }

    /// Same measurements with the endpoints swapped.
    pub fn reversed(&self) -> Self {
        Self {
            from: self.to.clone(),
            to: self.from.clone(),
            time_minutes: self.time_minutes,
            distance_units: self.distance_units,
        }
    }

    /// Distance in kilometers at the store resolution (one decimal for 100 m units).
    pub fn distance_km(&self) -> f64 {
        f64::from(self.distance_units) / DISTANCE_UNITS_PER_KM
    }
}

/// Whole minutes, or `None` when the result does not fit a stored cell.
pub fn quantize_minutes(duration_seconds: f64) -> Option<u32> {
    quantize(duration_seconds / 60.0)
}

/// Whole [`DISTANCE_RESOLUTION_METERS`] units, or `None` when the result does not fit a stored
/// cell.
pub fn quantize_distance(distance_meters: f64) -> Option<u32> {
    quantize(distance_meters / DISTANCE_RESOLUTION_METERS)
}

// Exact halves go to the even neighbour: 150 s is 2 min, 50 m is 0 units.
fn quantize(value: f64) -> Option<u32> {
    let rounded = value.round_ties_even();
    (rounded >= 0.0 && rounded <= f64::from(u32::MAX)).then_some(rounded as u32)
}
