//! Independent checking of a written schedule against its problem.
//!
//! The validator only sees the schedule file, so it re-integrates each vehicle's motion
//! from its arcs rather than trusting any of the scheduler's own data structures.

use crate::config::Limits;
use crate::error::Violation;
use crate::format::{Problem, ScheduledVehicle};
use crate::math::{displacement, travel_time};
use crate::ring::RingIndex;
use crate::vehicle::VehicleAttributes;
use std::collections::HashMap;

/// Slack on acceleration and velocity bounds.
const BOUND_TOL: f64 = 1e-6;
/// Slack on the total distance travelled, in m.
const DISTANCE_TOL: f64 = 1e-4;
/// Slack on times and time gaps, in s.
const TIME_TOL: f64 = 1e-5;
/// The number of points sampled along each shared section.
const GAP_SAMPLES: usize = 21;

/// One constant-acceleration piece of a vehicle's motion.
#[derive(Clone, Copy, Debug)]
struct Segment {
    start: f64,
    end: f64,
    pos: f64,
    vel: f64,
    acc: f64,
}

impl Segment {
    fn leave_pos(&self) -> f64 {
        self.pos + displacement(self.vel, self.acc, self.end - self.start)
    }

    fn leave_vel(&self) -> f64 {
        self.vel + self.acc * (self.end - self.start)
    }
}

/// A vehicle's motion, with positions measured from its ring entry.
struct Profile {
    id: u32,
    entry: RingIndex,
    exit: RingIndex,
    segments: Vec<Segment>,
}

impl Profile {
    /// The first time the vehicle reaches `dist` m along its journey.
    fn time_at(&self, dist: f64) -> Option<f64> {
        let segment = match self.segments.iter().find(|s| dist <= s.leave_pos()) {
            Some(s) => s,
            None => self
                .segments
                .last()
                .filter(|s| dist <= s.leave_pos() + DISTANCE_TOL)?,
        };
        let dt = travel_time(segment.vel, segment.acc, f64::max(dist - segment.pos, 0.0))
            .unwrap_or(segment.end - segment.start);
        Some(f64::min(segment.start + dt, segment.end))
    }

    fn distance(&self) -> f64 {
        self.segments.last().map_or(0.0, Segment::leave_pos)
    }
}

/// Checks a schedule, returning every violation found.
pub fn validate(problem: &Problem, schedule: &[ScheduledVehicle], limits: &Limits) -> Vec<Violation> {
    let mut violations = vec![];
    let attributes: HashMap<u32, &VehicleAttributes> = problem.vehicles.iter().map(|v| (v.id, v)).collect();

    let mut seen: HashMap<u32, &ScheduledVehicle> = HashMap::new();
    for line in schedule {
        if !attributes.contains_key(&line.id) {
            violations.push(Violation::UnknownVehicle { id: line.id });
        } else if seen.insert(line.id, line).is_some() {
            violations.push(Violation::DuplicateVehicle { id: line.id });
        }
    }

    let mut profiles = vec![];
    for attrs in &problem.vehicles {
        let line = match seen.get(&attrs.id) {
            Some(line) => line,
            None => {
                violations.push(Violation::MissingVehicle { id: attrs.id });
                continue;
            }
        };
        if let Some(profile) = check_vehicle(problem, attrs, line, limits, &mut violations) {
            profiles.push(profile);
        }
    }

    for (i, a) in profiles.iter().enumerate() {
        for b in &profiles[i + 1..] {
            check_gaps(problem, a, b, limits.time_gap, &mut violations);
        }
    }
    violations
}

/// Integrates a vehicle's arcs, checking its kinematics and timing.
fn check_vehicle(
    problem: &Problem,
    attrs: &VehicleAttributes,
    line: &ScheduledVehicle,
    limits: &Limits,
    violations: &mut Vec<Violation>,
) -> Option<Profile> {
    let id = attrs.id;
    if line.exit_time + TIME_TOL < attrs.arrival_time {
        violations.push(Violation::ExitBeforeArrival {
            id,
            exit: line.exit_time,
            arrival: attrs.arrival_time,
        });
    }
    let start = match line.arcs.first() {
        Some(&(start, _)) => start,
        None => {
            violations.push(Violation::NoArcs { id });
            return None;
        }
    };
    if start + TIME_TOL < attrs.arrival_time {
        violations.push(Violation::EarlyStart {
            id,
            start,
            arrival: attrs.arrival_time,
        });
    }

    let ends = line.arcs.iter().skip(1).map(|&(t, _)| t).chain(std::iter::once(line.exit_time));
    let mut segments = Vec::with_capacity(line.arcs.len());
    let (mut pos, mut vel) = (0.0, attrs.initial_vel);
    for (&(time, acc), end) in line.arcs.iter().zip(ends) {
        if end + TIME_TOL < time {
            violations.push(Violation::Unordered { id, time: end });
            return None;
        }
        if acc < limits.min_acc - BOUND_TOL || acc > limits.max_acc + BOUND_TOL {
            violations.push(Violation::Acceleration { id, time, acc });
        }
        let segment = Segment {
            start: time,
            end: f64::max(end, time),
            pos,
            vel,
            acc,
        };
        pos = segment.leave_pos();
        vel = segment.leave_vel();
        if vel < -BOUND_TOL || vel > limits.max_vel + BOUND_TOL {
            violations.push(Violation::Velocity { id, time: segment.end, vel });
        }
        segments.push(segment);
    }

    let ring = &problem.ring;
    let (entry, exit) = (ring.index(attrs.entry as i64), ring.index(attrs.exit as i64));
    let profile = Profile {
        id,
        entry,
        exit,
        segments,
    };
    let expected = ring.distance(entry, exit);
    if (profile.distance() - expected).abs() > DISTANCE_TOL {
        violations.push(Violation::Distance {
            id,
            expected,
            actual: profile.distance(),
        });
    }
    Some(profile)
}

/// Checks the time gap between two vehicles in every section both pass through.
fn check_gaps(problem: &Problem, a: &Profile, b: &Profile, time_gap: f64, violations: &mut Vec<Violation>) {
    let ring = &problem.ring;
    for section in a.entry.until(a.exit) {
        if section.offset_from(b.entry) >= b.exit.offset_from(b.entry) {
            continue;
        }
        let length = ring.length_of(section.get() as i64);
        let (offset_a, offset_b) = (ring.distance(a.entry, section), ring.distance(b.entry, section));
        let times = (0..GAP_SAMPLES)
            .map(|k| {
                let d = length * k as f64 / (GAP_SAMPLES - 1) as f64;
                Some((a.time_at(offset_a + d)?, b.time_at(offset_b + d)?))
            })
            .collect::<Option<Vec<_>>>();
        // A vehicle falling short of its exit is reported as a distance violation
        let times = match times {
            Some(times) if !times.is_empty() => times,
            _ => continue,
        };
        let (first_a, first_b) = times[0];
        let (front, follower, flipped) = if (first_a, a.id) <= (first_b, b.id) {
            (a, b, false)
        } else {
            (b, a, true)
        };
        let gap = times
            .iter()
            .map(|&(ta, tb)| if flipped { ta - tb } else { tb - ta })
            .fold(f64::INFINITY, f64::min);
        if gap + TIME_TOL < time_gap {
            violations.push(Violation::Gap {
                front: front.id,
                follower: follower.id,
                section: section.get(),
                gap,
            });
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::format::parse_problem;
    use assert_approx_eq::assert_approx_eq;

    fn problem() -> Problem {
        parse_problem("2 4 10 10 10 10\n0 0 2 0 0\n1 1 3 0 0\n", &Limits::default()).unwrap()
    }

    /// Accelerates from rest over `dist` m, starting at `start`.
    fn accelerate(id: u32, start: f64, dist: f64) -> ScheduledVehicle {
        let t = (2.0 * dist / 3.0).sqrt();
        ScheduledVehicle {
            id,
            exit_time: start + t,
            arcs: vec![(start, 3.0)],
        }
    }

    #[test]
    fn accepts_separated_vehicles() {
        let schedule = [accelerate(0, 0.0, 20.0), accelerate(1, 10.0, 20.0)];
        assert_eq!(validate(&problem(), &schedule, &Limits::default()), vec![]);
    }

    #[test]
    fn reports_close_vehicles() {
        let schedule = [accelerate(0, 0.0, 20.0), accelerate(1, 0.5, 20.0)];
        let violations = validate(&problem(), &schedule, &Limits::default());
        assert_eq!(violations.len(), 1);
        assert!(matches!(
            violations[0],
            Violation::Gap {
                front: 1,
                follower: 0,
                section: 1,
                ..
            }
        ));
    }

    #[test]
    fn reports_bad_kinematics() {
        let mut fast = accelerate(0, 0.0, 20.0);
        fast.arcs = vec![(0.0, 5.0)];
        let short = accelerate(1, 10.0, 10.0);
        let violations = validate(&problem(), &[fast, short], &Limits::default());
        assert!(violations.contains(&Violation::Acceleration {
            id: 0,
            time: 0.0,
            acc: 5.0
        }));
        assert!(violations.iter().any(|v| matches!(v, Violation::Distance { id: 0, .. })));
        assert!(violations.iter().any(|v| matches!(v, Violation::Distance { id: 1, .. })));
    }

    #[test]
    fn reports_bookkeeping_errors() {
        let schedule = [accelerate(0, 0.0, 20.0), accelerate(0, 20.0, 20.0), accelerate(7, 0.0, 20.0)];
        let violations = validate(&problem(), &schedule, &Limits::default());
        assert!(violations.contains(&Violation::DuplicateVehicle { id: 0 }));
        assert!(violations.contains(&Violation::UnknownVehicle { id: 7 }));
        assert!(violations.contains(&Violation::MissingVehicle { id: 1 }));
    }

    #[test]
    fn reports_early_start() {
        let mut problem = problem();
        problem.vehicles[1].arrival_time = 14.0;
        let schedule = [accelerate(0, 0.0, 20.0), accelerate(1, 10.0, 20.0)];
        let violations = validate(&problem, &schedule, &Limits::default());
        assert!(violations.iter().any(|v| matches!(v, Violation::EarlyStart { id: 1, .. })));
        assert!(violations.iter().any(|v| matches!(v, Violation::ExitBeforeArrival { id: 1, .. })));
    }

    #[test]
    fn reach_time_uses_the_segment_covering_the_distance() {
        let crawl = |start: f64, pos: f64, vel: f64| Segment {
            start,
            end: start + 1.0,
            pos,
            vel,
            acc: 0.0,
        };
        let profile = Profile {
            id: 0,
            entry: problem().ring.index(0),
            exit: problem().ring.index(2),
            segments: vec![crawl(0.0, 0.0, 1.0), crawl(1.0, 1.0, 1e-3)],
        };
        assert_approx_eq!(profile.time_at(0.5).unwrap(), 0.5);
        assert_approx_eq!(profile.time_at(1.00005).unwrap(), 1.05);
        assert_approx_eq!(profile.time_at(1.001 + 5e-5).unwrap(), 2.0);
        assert!(profile.time_at(1.1).is_none());
    }
}
