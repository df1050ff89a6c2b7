//! Fitting a trajectory behind the trajectory of the vehicle ahead.

use super::{Arc, Trajectory};
use crate::config::Limits;
use crate::error::TrajectoryError;
use crate::math::solve_quadratic;
use crate::util::EPS;
use log::trace;

/// A point at which to start braking, and where the braking ends.
#[derive(Clone, Copy, Debug)]
enum Candidate {
    /// Brake from `start` until the curve touches the front's arc `arc` at `touch`,
    /// then follow the front.
    Tangent { start: f64, touch: f64, arc: usize },
    /// Brake from `start` until the section exit, reached as the front leaves it.
    Contact { start: f64 },
}

impl Candidate {
    fn start(&self) -> f64 {
        match self {
            Candidate::Tangent { start, .. } | Candidate::Contact { start } => *start,
        }
    }
}

impl Trajectory {
    /// Fits this trajectory behind `front`, keeping at least `limits.time_gap` s behind it
    /// by braking at `limits.min_acc` as late as possible.
    ///
    /// `front` must end at the same section exit as `self`, up to a multiple of `ring_len`.
    /// Returns `self` unchanged if it already keeps its distance,
    /// and `None` if no single braking manoeuvre suffices.
    pub fn place_on_top(&self, front: &Trajectory, limits: &Limits, ring_len: f64) -> Option<Trajectory> {
        let front = self.aligned_front(front, limits.time_gap, ring_len);
        if !self.conflicts_with_aligned(&front) {
            return Some(self.clone());
        }

        let min_acc = limits.min_acc;
        for (i, arc) in self.arcs.iter().enumerate().rev() {
            if arc.acc <= min_acc + EPS {
                continue;
            }
            let mut best: Option<(f64, Trajectory)> = None;
            for candidate in self.candidates(arc, &front, min_acc) {
                let start = candidate.start();
                if best.as_ref().map_or(false, |(b, _)| *b >= start) {
                    continue;
                }
                match self.build(i, candidate, &front, min_acc) {
                    Ok(traj) if traj.is_complete() && traj.is_within(limits) => {
                        if !traj.conflicts_with_aligned(&front) {
                            best = Some((start, traj));
                        }
                    }
                    Ok(_) => {}
                    Err(err) => trace!("Discarded braking candidate {:?}: {}", candidate, err),
                }
            }
            if let Some((_, traj)) = best {
                return Some(traj);
            }
        }
        None
    }

    /// The braking manoeuvres starting during `arc` that end touching `front`.
    fn candidates(&self, arc: &Arc, front: &Trajectory, min_acc: f64) -> Vec<Candidate> {
        let mut out = vec![];
        let last = front.arcs.len().saturating_sub(1);
        for (j, f) in front.arcs.iter().enumerate().rev() {
            if f.leave_pos + EPS < arc.entry_pos {
                break;
            }
            out.extend(tangent_points(arc, f, min_acc).map(|(start, touch)| Candidate::Tangent {
                start,
                touch,
                arc: j,
            }));
            if j == last {
                out.extend(contact_point(arc, f, min_acc).map(|start| Candidate::Contact { start }));
            }
        }
        out
    }

    /// Rebuilds the trajectory, keeping the first `keep` arcs and then braking as `candidate` says.
    fn build(
        &self,
        keep: usize,
        candidate: Candidate,
        front: &Trajectory,
        min_acc: f64,
    ) -> Result<Trajectory, TrajectoryError> {
        let arc = &self.arcs[keep];
        let mut out = Trajectory::new(
            self.vehicle,
            self.entry_time,
            self.entry_pos,
            self.entry_vel,
            self.exit_pos,
        );
        out.front = self.front;
        for prev in &self.arcs[..keep] {
            out.push_arc(*prev)?;
        }
        match candidate {
            Candidate::Tangent { start, touch, arc: j } => {
                out.push_until_time(start, arc.acc)?;
                out.push_until_time(touch, min_acc)?;
                for f in &front.arcs[j..] {
                    out.push_until_position(f.acc, f.leave_pos)?;
                }
            }
            Candidate::Contact { start } => {
                out.push_until_time(start, arc.acc)?;
                out.push_until_position(min_acc, self.exit_pos)?;
            }
        }
        Ok(out)
    }
}

/// The times `(p, q)` such that switching from `mine` to braking at `min_acc` at time `p`
/// makes the curve touch `theirs` tangentially at time `q`.
fn tangent_points(mine: &Arc, theirs: &Arc, min_acc: f64) -> impl Iterator<Item = (f64, f64)> {
    let tr = mine.entry_time;
    let (x1, v1, a1) = (mine.entry_pos, mine.entry_vel, mine.acc);
    let (x2, v2, a2) = (theirs.entry_pos, theirs.entry_vel, theirs.acc);
    let t2 = theirs.entry_time - tr;
    let (d1, d2) = (a1 - min_acc, a2 - min_acc);

    let term = v1 - v2 + a2 * t2;
    let a = d1 * (a1 - a2);
    let b = 2.0 * d1 * term;
    let c = term * term + d2 * (2.0 * (x1 - x2 + v2 * t2) - a2 * t2 * t2);

    let roots = if d2 > EPS {
        solve_quadratic(a, b, c).all()
    } else {
        Default::default()
    };
    let (mine, theirs) = (*mine, *theirs);
    roots.into_iter().filter_map(move |p| {
        let q = (d1 * p + term) / d2;
        let (p, q) = (tr + p, tr + q);
        let brake_vel = mine.velocity_at(p);
        let valid = mine.times().contains(p)
            && q + EPS >= p
            && theirs.times().contains(q)
            && brake_vel + min_acc * (q - p) >= -EPS;
        valid.then(|| (f64::min(p, mine.leave_time), f64::max(q, p)))
    })
}

/// The time at which switching from `mine` to braking at `min_acc` reaches the end of `last`,
/// the front's final arc, exactly as the front leaves it.
fn contact_point(mine: &Arc, last: &Arc, min_acc: f64) -> Option<f64> {
    let end = last.leave_time;
    let overshoot = mine.position_at(end) - last.leave_pos;
    if overshoot < -EPS {
        return None;
    }
    let dwell = (2.0 * f64::max(overshoot, 0.0) / (mine.acc - min_acc)).sqrt();
    let start = end - dwell;
    let valid = mine.times().contains(start) && mine.velocity_at(start) + min_acc * dwell >= -EPS;
    valid.then(|| start.clamp(mine.entry_time, mine.leave_time))
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn cruise(entry_time: f64, vel: f64, length: f64) -> Trajectory {
        let mut traj = Trajectory::new(0, entry_time, 0.0, vel, length);
        traj.push_until_position(0.0, length).unwrap();
        traj
    }

    #[test]
    fn tangent_points_touch() {
        let mine = Arc::until_time(0.0, 0.0, 15.0, 0.0, 10.0);
        let theirs = Arc::until_time(0.0, 20.0, 5.0, 0.0, 10.0);
        let (p, q) = tangent_points(&mine, &theirs, -3.0).next().unwrap();
        // Braking from 15 to 5 m/s takes 10/3 s and 100/3 m
        assert_approx_eq!(q - p, 10.0 / 3.0);
        let pos_mine = mine.position_at(p) + 15.0 * (q - p) - 1.5 * (q - p).powi(2);
        assert_approx_eq!(pos_mine, theirs.position_at(q));
    }

    #[test]
    fn fast_follower_brakes_behind_slow_leader() {
        let limits = Limits::default();
        let leader = cruise(0.0, 5.0, 100.0);
        let follower = cruise(6.0, 15.0, 100.0);
        assert!(follower.conflicts_with(&leader, limits.time_gap, 1000.0));

        let placed = follower.place_on_top(&leader, &limits, 1000.0).unwrap();
        assert!(placed.is_complete());
        assert!(placed.is_within(&limits));
        assert!(!placed.conflicts_with(&leader, limits.time_gap, 1000.0));
        assert!(placed.arcs().iter().any(|arc| arc.acc == limits.min_acc));
        assert_approx_eq!(placed.leave_vel(), 5.0);
        assert_approx_eq!(placed.leave_time(), leader.leave_time() + limits.time_gap);
    }

    #[test]
    fn placement_is_idempotent() {
        let limits = Limits::default();
        let leader = cruise(0.0, 5.0, 100.0);
        let placed = cruise(6.0, 15.0, 100.0).place_on_top(&leader, &limits, 1000.0).unwrap();
        let again = placed.place_on_top(&leader, &limits, 1000.0).unwrap();
        assert_eq!(placed.arcs(), again.arcs());
    }

    #[test]
    fn brakes_to_point_contact_at_exit() {
        // Matching the leader's speed would take longer than the section allows
        let limits = Limits::default();
        let leader = cruise(0.0, 10.0, 20.0);
        let follower = cruise(2.0, 15.0, 20.0);
        let placed = follower.place_on_top(&leader, &limits, 1000.0).unwrap();
        assert!(!placed.conflicts_with(&leader, limits.time_gap, 1000.0));
        assert_approx_eq!(placed.leave_time(), 3.5);
        assert!(placed.leave_vel() > 10.0);
        assert_eq!(placed.arcs().last().unwrap().acc, limits.min_acc);
    }

    #[test]
    fn unreachable_without_stopping() {
        // The follower enters before the leader's gap has elapsed
        let limits = Limits::default();
        let leader = cruise(0.0, 5.0, 20.0);
        let follower = cruise(0.5, 15.0, 20.0);
        assert!(follower.place_on_top(&leader, &limits, 1000.0).is_none());
    }
}
