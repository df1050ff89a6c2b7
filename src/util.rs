//! Miscellaneous utility structs and functions.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Tolerance absorbing floating point round-off in boundary comparisons.
pub const EPS: f64 = 1e-10;

/// Tolerance used when snapping a computed position onto a section boundary.
pub const SNAP_EPS: f64 = 1e-6;

/// A closed interval on the real number line.
#[derive(Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub min: f64,
    pub max: f64,
}

impl Interval {
    /// Creates a new interval.
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// The intersection of two intervals, allowing them to miss each other by up to [EPS].
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let min = f64::max(self.min, other.min);
        let max = f64::min(self.max, other.max);
        if min > max + EPS {
            None
        } else {
            Some(Self::new(min, f64::max(min, max)))
        }
    }

    /// Returns true if the value lies strictly inside the interval, by more than [EPS].
    pub fn contains_strictly(&self, value: f64) -> bool {
        self.min + EPS < value && value + EPS < self.max
    }

    /// Returns true if the value lies inside the interval, within [EPS].
    pub fn contains(&self, value: f64) -> bool {
        self.min - EPS <= value && value <= self.max + EPS
    }

    /// Gets the magnitude of the interval.
    pub fn length(&self) -> f64 {
        self.max - self.min
    }

    /// Clamps a value into the interval.
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

impl std::ops::Add<f64> for Interval {
    type Output = Interval;

    fn add(self, rhs: f64) -> Self::Output {
        Self {
            min: self.min + rhs,
            max: self.max + rhs,
        }
    }
}

impl Debug for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interval({:?}, {:?})", &self.min, &self.max)
    }
}

/// Returns `true` if the two values are equal within [EPS].
pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPS
}
