use crate::math::{displacement, travel_time};
use arrayvec::ArrayVec;
use crate::util::{Interval, EPS, SNAP_EPS};
use serde::{Deserialize, Serialize};

/// Tolerance of the gap predicate in s.
pub(crate) const GAP_EPS: f64 = 1e-9;

/// A single stretch of constant acceleration within one section crossing.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    /// The time at which the arc begins in s.
    pub entry_time: f64,
    /// The time at which the arc ends in s.
    pub leave_time: f64,
    /// The unwrapped ring position at which the arc begins in m.
    pub entry_pos: f64,
    /// The unwrapped ring position at which the arc ends in m.
    pub leave_pos: f64,
    /// The velocity at the start of the arc in m/s.
    pub entry_vel: f64,
    /// The velocity at the end of the arc in m/s.
    pub leave_vel: f64,
    /// The constant acceleration in m/s<sup>2</sup>.
    pub acc: f64,
}

impl Arc {
    /// Creates the arc starting in the given state and lasting until `leave_time`.
    pub fn until_time(entry_time: f64, entry_pos: f64, entry_vel: f64, acc: f64, leave_time: f64) -> Self {
        let dt = leave_time - entry_time;
        Self {
            entry_time,
            leave_time,
            entry_pos,
            leave_pos: entry_pos + displacement(entry_vel, acc, dt),
            entry_vel,
            leave_vel: entry_vel + acc * dt,
            acc,
        }
    }

    /// The duration of the arc in s.
    pub fn duration(&self) -> f64 {
        self.leave_time - self.entry_time
    }

    /// The time window of the arc.
    pub fn times(&self) -> Interval {
        Interval::new(self.entry_time, self.leave_time)
    }

    /// The range of positions covered by the arc.
    pub fn positions(&self) -> Interval {
        Interval::new(self.entry_pos, self.leave_pos)
    }

    /// The position at time `t`, extrapolating the arc's motion beyond its window.
    pub fn position_at(&self, t: f64) -> f64 {
        self.entry_pos + displacement(self.entry_vel, self.acc, t - self.entry_time)
    }

    /// The velocity at time `t`, extrapolating the arc's motion beyond its window.
    pub fn velocity_at(&self, t: f64) -> f64 {
        self.entry_vel + self.acc * (t - self.entry_time)
    }

    /// The first time at which the arc reaches position `x`, if ever.
    pub fn time_at_position(&self, x: f64) -> Option<f64> {
        travel_time(self.entry_vel, self.acc, x - self.entry_pos).map(|dt| self.entry_time + dt)
    }

    /// Returns a copy of the arc delayed by `dt` s and moved forward by `dx` m.
    pub fn shifted(&self, dt: f64, dx: f64) -> Self {
        Self {
            entry_time: self.entry_time + dt,
            leave_time: self.leave_time + dt,
            entry_pos: self.entry_pos + dx,
            leave_pos: self.leave_pos + dx,
            ..*self
        }
    }

    /// Cuts the arc where it reaches position `x`.
    ///
    /// Returns `None` unless `x` lies strictly inside the arc's position range.
    pub fn split_at_position(&self, x: f64) -> Option<(Arc, Arc)> {
        if x <= self.entry_pos + SNAP_EPS || x >= self.leave_pos - SNAP_EPS {
            return None;
        }
        let t = self.time_at_position(x)?;
        let t = self.times().clamp(t);
        let vel = f64::max(self.velocity_at(t), 0.0);
        let head = Arc {
            leave_time: t,
            leave_pos: x,
            leave_vel: vel,
            ..*self
        };
        let tail = Arc {
            entry_time: t,
            entry_pos: x,
            entry_vel: vel,
            ..*self
        };
        Some((head, tail))
    }

    /// The time at which the arc reaches `x`, with `x` clamped to the arc's positions.
    ///
    /// Positions the arc never reaches map to its leave time.
    fn reach_time(&self, x: f64) -> f64 {
        let x = x.max(self.entry_pos).min(self.leave_pos);
        let t = self.time_at_position(x).unwrap_or(self.leave_time);
        t.max(self.entry_time).min(self.leave_time)
    }

    /// Returns `true` if this arc reaches any position they share before `front` does,
    /// where `front` has already been shifted by the required time gap.
    pub fn conflicts_with(&self, front: &Arc) -> bool {
        let shared = match self.positions().intersect(&front.positions()) {
            Some(shared) => shared,
            None => return false,
        };

        // The lead time is quadratic in velocity, so its extremes lie at the ends
        // of the shared stretch or where both velocities match
        let mut samples = ArrayVec::<f64, 3>::new();
        samples.push(shared.min);
        samples.push(shared.max);
        let da = self.acc - front.acc;
        if da.abs() > EPS {
            let x = (front.entry_vel.powi(2) - self.entry_vel.powi(2) + 2.0 * self.acc * self.entry_pos
                - 2.0 * front.acc * front.entry_pos)
                / (2.0 * da);
            if shared.contains_strictly(x) {
                samples.push(x);
            }
        }
        samples
            .iter()
            .any(|&x| front.reach_time(x) - self.reach_time(x) > GAP_EPS)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn kinematics() {
        let arc = Arc::until_time(1.0, 10.0, 2.0, 3.0, 3.0);
        assert_approx_eq!(arc.leave_pos, 20.0);
        assert_approx_eq!(arc.leave_vel, 8.0);
        assert_approx_eq!(arc.position_at(2.0), 13.5);
        assert_approx_eq!(arc.time_at_position(13.5).unwrap(), 2.0);
    }

    #[test]
    fn split_at_position() {
        let arc = Arc::until_time(0.0, 0.0, 0.0, 2.0, 4.0);
        let (head, tail) = arc.split_at_position(4.0).unwrap();
        assert_approx_eq!(head.leave_time, 2.0);
        assert_approx_eq!(head.leave_vel, 4.0);
        assert_eq!(tail.entry_time, head.leave_time);
        assert_eq!(tail.leave_pos, arc.leave_pos);
        assert!(arc.split_at_position(0.0).is_none());
        assert!(arc.split_at_position(16.0).is_none());
    }

    #[test]
    fn faster_follower_conflicts() {
        let front = Arc::until_time(0.0, 0.0, 5.0, 0.0, 4.0);
        let slow = Arc::until_time(0.0, 0.0, 4.0, 0.0, 5.0);
        let fast = Arc::until_time(0.0, 0.0, 10.0, 0.0, 2.0);
        assert!(!slow.conflicts_with(&front));
        assert!(fast.conflicts_with(&front));
    }

    #[test]
    fn overtaking_detected_by_crossing() {
        // The follower starts behind and slower, then overtakes late in the window
        let front = Arc::until_time(0.0, 10.0, 5.0, 0.0, 10.0);
        let follower = Arc::until_time(0.0, 0.0, 0.0, 2.0, 10.0);
        assert!(follower.conflicts_with(&front));
    }

    #[test]
    fn touching_is_allowed() {
        let front = Arc::until_time(0.0, 0.0, 5.0, 0.0, 4.0);
        let same = front;
        assert!(!same.conflicts_with(&front));
        let disjoint = front.shifted(10.0, 30.0);
        assert!(!disjoint.conflicts_with(&front));
    }

    #[test]
    fn follower_from_rest_keeps_the_time_gap() {
        // The front leaves the section start at 1.5 s, already shifted by the gap
        let front = Arc::until_time(1.5, 0.0, 2.0, 3.0, 3.5);
        let crawl_time = |t0: f64| t0 + (20.0f64 / 3.0).sqrt();
        let early = Arc::until_time(1.5 - 3e-5, 0.0, 0.0, 3.0, crawl_time(1.5 - 3e-5));
        assert!(early.conflicts_with(&front));
        for t0 in [1.5, 1.501] {
            let follower = Arc::until_time(t0, 0.0, 0.0, 3.0, crawl_time(t0));
            assert!(!follower.conflicts_with(&front));
        }
    }
}
