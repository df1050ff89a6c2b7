//! The circular track and its section indices.

use crate::error::RingError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Debug, Display};

/// An index into a ring of `modulus` sections, with wraparound arithmetic.
///
/// Comparing indices of rings with different section counts is a programming error and panics.
#[derive(Clone, Copy, Serialize, Deserialize)]
pub struct RingIndex {
    index: usize,
    modulus: usize,
}

impl RingIndex {
    /// Creates a ring index, reducing `index` modulo `modulus`.
    pub fn new(index: i64, modulus: usize) -> Self {
        if modulus == 0 {
            panic!("Ring index requires a positive modulus");
        }
        let index = index.rem_euclid(modulus as i64) as usize;
        Self { index, modulus }
    }

    /// The reduced index, in `[0, modulus)`.
    pub fn get(self) -> usize {
        self.index
    }

    /// The number of sections in the ring.
    pub fn modulus(self) -> usize {
        self.modulus
    }

    /// Moves `steps` sections forward, wrapping at the seam.
    pub fn add_mod(self, steps: usize) -> Self {
        Self {
            index: (self.index + steps % self.modulus) % self.modulus,
            modulus: self.modulus,
        }
    }

    /// Moves `steps` sections backward, wrapping at the seam.
    pub fn sub_mod(self, steps: usize) -> Self {
        let steps = steps % self.modulus;
        Self {
            index: (self.index + self.modulus - steps) % self.modulus,
            modulus: self.modulus,
        }
    }

    /// The next section along the direction of travel.
    pub fn next(self) -> Self {
        self.add_mod(1)
    }

    /// The number of forward steps from `other` to `self`.
    pub fn offset_from(self, other: Self) -> usize {
        self.assert_same_ring(other);
        (self.index + self.modulus - other.index) % self.modulus
    }

    /// Iterates over the sections from `self` (inclusive) to `end` (exclusive).
    pub fn until(self, end: Self) -> impl Iterator<Item = RingIndex> {
        let count = end.offset_from(self);
        (0..count).map(move |i| self.add_mod(i))
    }

    fn assert_same_ring(self, other: Self) {
        if self.modulus != other.modulus {
            panic!(
                "Compared ring indices of different rings ({} and {} sections)",
                self.modulus, other.modulus
            );
        }
    }
}

impl PartialEq for RingIndex {
    fn eq(&self, other: &Self) -> bool {
        self.assert_same_ring(*other);
        self.index == other.index
    }
}

impl Eq for RingIndex {}

impl PartialOrd for RingIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RingIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.assert_same_ring(*other);
        self.index.cmp(&other.index)
    }
}

impl Debug for RingIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.index, self.modulus)
    }
}

impl Display for RingIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index)
    }
}

/// One fixed-length segment of the ring.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// The index of the section.
    pub index: usize,
    /// The length of the section in m.
    pub length: f64,
    /// The distance from the ring's seam to the start of the section, in m.
    pub start: f64,
}

/// The circular sequence of sections making up the roundabout.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ring {
    sections: Vec<Section>,
    total_length: f64,
}

impl Ring {
    /// Creates a ring from its section lengths, in order of travel.
    pub fn new(lengths: &[f64]) -> Result<Self, RingError> {
        if lengths.is_empty() {
            return Err(RingError::Empty);
        }
        let mut start = 0.0;
        let mut sections = Vec::with_capacity(lengths.len());
        for (index, &length) in lengths.iter().enumerate() {
            if !(length.is_finite() && length > 0.0) {
                return Err(RingError::InvalidLength { index, length });
            }
            sections.push(Section {
                index,
                length,
                start,
            });
            start += length;
        }
        Ok(Self {
            sections,
            total_length: start,
        })
    }

    /// The number of sections.
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// The length of the ring in m.
    pub fn total_length(&self) -> f64 {
        self.total_length
    }

    /// Creates a [RingIndex] for this ring, reducing `index` modulo the section count.
    pub fn index(&self, index: i64) -> RingIndex {
        RingIndex::new(index, self.section_count())
    }

    /// Gets the section at `index`, reduced modulo the section count.
    pub fn section(&self, index: i64) -> &Section {
        &self.sections[self.index(index).get()]
    }

    /// The length of the section at `index` in m.
    pub fn length_of(&self, index: i64) -> f64 {
        self.section(index).length
    }

    /// The start offset of the section at `index` in m.
    pub fn position_of(&self, index: i64) -> f64 {
        self.section(index).start
    }

    /// The sections in order of travel.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// The total length of the sections from `entry` (inclusive) to `exit` (exclusive).
    pub fn distance(&self, entry: RingIndex, exit: RingIndex) -> f64 {
        entry
            .until(exit)
            .map(|i| self.sections[i.get()].length)
            .sum()
    }
}
