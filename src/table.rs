//! Per-section ordering of the vehicles claiming a slot in each section.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A vehicle's claim on a section.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// The internal index of the vehicle.
    pub vehicle: usize,
    /// The time at which the vehicle enters the section in s.
    pub time: f64,
    /// Whether the vehicle's trajectory through the section is committed.
    pub scheduled: bool,
    /// Whether this is the vehicle's request to enter the ring.
    pub is_entry: bool,
}

impl Entry {
    fn order(&self, other: &Entry) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.vehicle.cmp(&other.vehicle))
    }
}

/// One list of entries per section, ordered by entry time and then vehicle index.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SchedulingTable {
    sections: Vec<Vec<Entry>>,
    time_gap: f64,
}

impl SchedulingTable {
    /// Creates an empty table.
    pub fn new(section_count: usize, time_gap: f64) -> Self {
        Self {
            sections: vec![vec![]; section_count],
            time_gap,
        }
    }

    /// Clears the table and loads the ring entry requests,
    /// given as `(section, vehicle, arrival time)`.
    ///
    /// Requests for the same section are spaced at least the time gap apart, in order of arrival.
    pub fn load(&mut self, requests: impl IntoIterator<Item = (usize, usize, f64)>) {
        self.sections.iter_mut().for_each(Vec::clear);
        for (section, vehicle, time) in requests {
            self.sections[section].push(Entry {
                vehicle,
                time,
                scheduled: false,
                is_entry: true,
            });
        }
        for section in 0..self.sections.len() {
            self.sort(section);
            let mut prev: Option<f64> = None;
            for entry in &mut self.sections[section] {
                if let Some(prev) = prev {
                    entry.time = f64::max(entry.time, prev + self.time_gap);
                }
                prev = Some(entry.time);
            }
        }
    }

    /// The entries of a section, in order.
    pub fn entries(&self, section: usize) -> &[Entry] {
        &self.sections[section]
    }

    /// Gets a vehicle's entry in a section.
    pub fn get(&self, section: usize, vehicle: usize) -> Option<&Entry> {
        self.sections[section].iter().find(|e| e.vehicle == vehicle)
    }

    /// The time at which a vehicle is booked to enter a section.
    pub fn entry_time(&self, section: usize, vehicle: usize) -> Option<f64> {
        self.get(section, vehicle).map(|e| e.time)
    }

    /// Inserts a new entry in order.
    /// Does nothing and returns `false` if the vehicle already has an entry in the section.
    pub fn insert(&mut self, section: usize, vehicle: usize, time: f64, scheduled: bool) -> bool {
        if self.get(section, vehicle).is_some() {
            return false;
        }
        let entry = Entry {
            vehicle,
            time,
            scheduled,
            is_entry: false,
        };
        let entries = &mut self.sections[section];
        let idx = entries.partition_point(|e| e.order(&entry) == Ordering::Less);
        entries.insert(idx, entry);
        true
    }

    /// Rewrites a vehicle's entry and restores the order.
    /// Returns `false` if the vehicle has no entry in the section.
    pub fn update(&mut self, section: usize, vehicle: usize, time: f64, scheduled: bool) -> bool {
        match self.sections[section].iter_mut().find(|e| e.vehicle == vehicle) {
            Some(entry) => {
                entry.time = time;
                entry.scheduled = scheduled;
            }
            None => return false,
        }
        self.sort(section);
        true
    }

    /// Updates a vehicle's entry, or inserts one if it has none.
    pub fn upsert(&mut self, section: usize, vehicle: usize, time: f64, scheduled: bool) {
        if !self.update(section, vehicle, time, scheduled) {
            self.insert(section, vehicle, time, scheduled);
        }
    }

    /// Removes a vehicle's entry from a section.
    pub fn remove(&mut self, section: usize, vehicle: usize) -> Option<Entry> {
        let entries = &mut self.sections[section];
        let idx = entries.iter().position(|e| e.vehicle == vehicle)?;
        Some(entries.remove(idx))
    }

    /// Bumps pending ring entry requests lying within the time gap of a slot at `from`,
    /// chaining each bumped request onto the next.
    pub fn push(&mut self, section: usize, from: f64) {
        let gap = self.time_gap;
        let mut prev = from;
        for entry in &mut self.sections[section] {
            if entry.scheduled || !entry.is_entry {
                continue;
            }
            if entry.time <= prev - gap {
                continue;
            }
            if entry.time >= prev + gap {
                break;
            }
            entry.time = prev + gap;
            prev = entry.time;
        }
        self.sort(section);
    }

    /// The vehicle of the latest scheduled entry strictly before `time`.
    pub fn nearest_scheduled_before(&self, section: usize, time: f64) -> Option<usize> {
        self.sections[section]
            .iter()
            .rev()
            .find(|e| e.scheduled && e.time < time)
            .map(|e| e.vehicle)
    }

    /// The earliest unscheduled entry strictly before `time`.
    pub fn earliest_unscheduled_before(&self, section: usize, time: f64) -> Option<Entry> {
        self.sections[section]
            .iter()
            .take_while(|e| e.time < time)
            .find(|e| !e.scheduled)
            .copied()
    }

    /// The vehicle of the nearest scheduled entry ordered before `vehicle`'s own entry.
    pub fn front_of(&self, section: usize, vehicle: usize) -> Option<usize> {
        let entries = &self.sections[section];
        let idx = entries.iter().position(|e| e.vehicle == vehicle)?;
        entries[..idx]
            .iter()
            .rev()
            .find(|e| e.scheduled)
            .map(|e| e.vehicle)
    }

    fn sort(&mut self, section: usize) {
        self.sections[section].sort_by(|a, b| a.order(b));
    }
}
