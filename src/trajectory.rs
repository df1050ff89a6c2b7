//! Piecewise constant-acceleration motion profiles.

pub use arc::Arc;

use crate::config::Limits;
use crate::error::TrajectoryError;
use crate::math::{displacement, travel_time};
use crate::util::{Interval, EPS, SNAP_EPS};
use crate::TrajectoryId;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

mod arc;
mod placement;

/// A handle to the trajectory a trajectory was placed behind,
/// with the revision of that trajectory observed at placement time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontRef {
    pub trajectory: TrajectoryId,
    pub revision: u32,
}

/// One vehicle's motion across one section, or across several consecutive sections
/// while a plan is being rebuilt.
///
/// Arcs tile the time from `entry_time` to the leave time without gaps,
/// and never extend past `exit_pos`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trajectory {
    /// The internal index of the vehicle that follows this trajectory.
    vehicle: usize,
    /// The time at which the section is entered in s.
    entry_time: f64,
    /// The unwrapped ring position of the section entry in m.
    entry_pos: f64,
    /// The velocity at the section entry in m/s.
    entry_vel: f64,
    /// The unwrapped ring position of the section exit in m.
    exit_pos: f64,
    /// The constant-acceleration arcs, in chronological order.
    arcs: SmallVec<[Arc; 4]>,
    /// Bumped every time the arcs are replaced.
    revision: u32,
    /// The trajectory this was placed behind.
    front: Option<FrontRef>,
}

impl Trajectory {
    /// Creates a trajectory with no arcs.
    pub fn new(vehicle: usize, entry_time: f64, entry_pos: f64, entry_vel: f64, exit_pos: f64) -> Self {
        Self {
            vehicle,
            entry_time,
            entry_pos,
            entry_vel,
            exit_pos,
            arcs: SmallVec::new(),
            revision: 0,
            front: None,
        }
    }

    /// Joins consecutive trajectories of one vehicle into a single trajectory.
    ///
    /// Returns `None` if `parts` is empty.
    pub fn concat<'a>(
        parts: impl IntoIterator<Item = &'a Trajectory>,
    ) -> Option<Result<Trajectory, TrajectoryError>> {
        let mut parts = parts.into_iter().peekable();
        let first = parts.peek()?;
        let mut out = Trajectory::new(
            first.vehicle,
            first.entry_time,
            first.entry_pos,
            first.entry_vel,
            first.exit_pos,
        );
        let result = parts
            .try_for_each(|part| {
                out.exit_pos = part.exit_pos;
                part.arcs.iter().try_for_each(|arc| out.push_arc(*arc))
            })
            .map(|_| out);
        Some(result)
    }

    /// The internal index of the vehicle that follows this trajectory.
    pub fn vehicle(&self) -> usize {
        self.vehicle
    }

    /// The section entry time in s.
    pub fn entry_time(&self) -> f64 {
        self.entry_time
    }

    /// The unwrapped section entry position in m.
    pub fn entry_pos(&self) -> f64 {
        self.entry_pos
    }

    /// The section entry velocity in m/s.
    pub fn entry_vel(&self) -> f64 {
        self.entry_vel
    }

    /// The unwrapped section exit position in m.
    pub fn exit_pos(&self) -> f64 {
        self.exit_pos
    }

    /// The time at which the last arc ends in s.
    pub fn leave_time(&self) -> f64 {
        self.arcs.last().map_or(self.entry_time, |arc| arc.leave_time)
    }

    /// The position at which the last arc ends in m.
    pub fn leave_pos(&self) -> f64 {
        self.arcs.last().map_or(self.entry_pos, |arc| arc.leave_pos)
    }

    /// The velocity at which the last arc ends in m/s.
    pub fn leave_vel(&self) -> f64 {
        self.arcs.last().map_or(self.entry_vel, |arc| arc.leave_vel)
    }

    /// The time spent on the trajectory in s.
    pub fn duration(&self) -> f64 {
        self.leave_time() - self.entry_time
    }

    /// The arcs, in chronological order.
    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    /// The number of times the arcs have been replaced.
    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// The trajectory this was placed behind, if any.
    pub fn front(&self) -> Option<FrontRef> {
        self.front
    }

    /// Records the trajectory this was placed behind.
    pub fn set_front(&mut self, front: Option<FrontRef>) {
        self.front = front;
    }

    /// Whether the arcs reach the section exit.
    pub fn is_complete(&self) -> bool {
        (self.leave_pos() - self.exit_pos).abs() <= SNAP_EPS
    }

    /// Whether every arc respects the acceleration and velocity limits.
    pub fn is_within(&self, limits: &Limits) -> bool {
        self.arcs.iter().all(|arc| {
            let acc_ok = arc.acc >= limits.min_acc - EPS && arc.acc <= limits.max_acc + EPS;
            let vel_ok = |v: f64| v >= -SNAP_EPS && v <= limits.max_vel + SNAP_EPS;
            acc_ok && vel_ok(arc.entry_vel) && vel_ok(arc.leave_vel)
        })
    }

    /// The position at time `t`, clamped to the trajectory's time window.
    pub fn position_at(&self, t: f64) -> f64 {
        match self.arc_at(t) {
            Some(arc) => arc.position_at(arc.times().clamp(t)),
            None => self.entry_pos,
        }
    }

    /// The velocity at time `t`, clamped to the trajectory's time window.
    pub fn velocity_at(&self, t: f64) -> f64 {
        match self.arc_at(t) {
            Some(arc) => arc.velocity_at(arc.times().clamp(t)),
            None => self.entry_vel,
        }
    }

    fn arc_at(&self, t: f64) -> Option<&Arc> {
        self.arcs
            .iter()
            .find(|arc| t < arc.leave_time)
            .or_else(|| self.arcs.last())
    }

    /// Appends an arc of acceleration `acc` lasting until time `end`.
    ///
    /// An end position within [SNAP_EPS] of the section exit is snapped onto it.
    pub fn push_until_time(&mut self, end: f64, acc: f64) -> Result<(), TrajectoryError> {
        let start = self.leave_time();
        if end < start - EPS {
            return Err(TrajectoryError::EndBeforeStart { start, end });
        }
        let dt = end - start;
        if dt <= EPS {
            return Ok(());
        }
        let vel = self.leave_vel();
        let leave_vel = vel + acc * dt;
        if leave_vel < -SNAP_EPS {
            return Err(TrajectoryError::NegativeVelocity { vel: leave_vel });
        }
        let mut leave_pos = self.leave_pos() + displacement(vel, acc, dt);
        if leave_pos > self.exit_pos + SNAP_EPS {
            return Err(TrajectoryError::PastExit {
                position: leave_pos,
                exit: self.exit_pos,
            });
        }
        if leave_pos > self.exit_pos - SNAP_EPS {
            leave_pos = self.exit_pos;
        }
        self.arcs.push(Arc {
            entry_time: start,
            leave_time: end,
            entry_pos: self.leave_pos(),
            leave_pos,
            entry_vel: vel,
            leave_vel: f64::max(leave_vel, 0.0),
            acc,
        });
        Ok(())
    }

    /// Appends an arc of acceleration `acc` lasting until position `target` is reached.
    pub fn push_until_position(&mut self, acc: f64, target: f64) -> Result<(), TrajectoryError> {
        let target = if (target - self.exit_pos).abs() <= SNAP_EPS {
            self.exit_pos
        } else {
            target
        };
        if target > self.exit_pos {
            return Err(TrajectoryError::PastExit {
                position: target,
                exit: self.exit_pos,
            });
        }
        let (pos, vel) = (self.leave_pos(), self.leave_vel());
        let dist = target - pos;
        if dist.abs() <= SNAP_EPS {
            return Ok(());
        }
        let unreachable = TrajectoryError::Unreachable {
            position: pos,
            vel,
            acc,
            target,
        };
        if dist < 0.0 {
            return Err(unreachable);
        }
        let dt = travel_time(vel, acc, dist).ok_or(unreachable)?;
        let start = self.leave_time();
        self.arcs.push(Arc {
            entry_time: start,
            leave_time: start + dt,
            entry_pos: pos,
            leave_pos: target,
            entry_vel: vel,
            leave_vel: f64::max(vel * vel + 2.0 * acc * dist, 0.0).sqrt(),
            acc,
        });
        Ok(())
    }

    /// Appends an existing arc, which must continue from where the trajectory leaves off.
    pub fn push_arc(&mut self, arc: Arc) -> Result<(), TrajectoryError> {
        let (leave_time, leave_pos) = (self.leave_time(), self.leave_pos());
        if (arc.entry_time - leave_time).abs() > SNAP_EPS {
            return Err(TrajectoryError::Discontinuous {
                leave: leave_time,
                start: arc.entry_time,
            });
        }
        if (arc.entry_pos - leave_pos).abs() > SNAP_EPS {
            return Err(TrajectoryError::Discontinuous {
                leave: leave_pos,
                start: arc.entry_pos,
            });
        }
        if arc.leave_pos > self.exit_pos + SNAP_EPS {
            return Err(TrajectoryError::PastExit {
                position: arc.leave_pos,
                exit: self.exit_pos,
            });
        }
        self.arcs.push(arc);
        Ok(())
    }

    /// Returns a copy delayed by `dt` s and moved forward by `dx` m.
    pub fn shifted(&self, dt: f64, dx: f64) -> Self {
        Self {
            entry_time: self.entry_time + dt,
            entry_pos: self.entry_pos + dx,
            exit_pos: self.exit_pos + dx,
            arcs: self.arcs.iter().map(|arc| arc.shifted(dt, dx)).collect(),
            ..self.clone()
        }
    }

    /// Returns a copy delayed by `dt` s.
    pub fn translated(&self, dt: f64) -> Self {
        self.shifted(dt, 0.0)
    }

    /// Replaces the motion of this trajectory with that of `piece`, bumping the revision.
    pub fn rewrite(&mut self, piece: &Trajectory) {
        self.entry_time = piece.entry_time;
        self.entry_pos = piece.entry_pos;
        self.entry_vel = piece.entry_vel;
        self.exit_pos = piece.exit_pos;
        self.arcs = piece.arcs.clone();
        self.revision += 1;
    }

    /// The range of positions covered by the arcs.
    pub fn positions(&self) -> Interval {
        Interval::new(self.entry_pos, self.leave_pos())
    }

    /// The multiple of `ring_len` that moves `other` onto the stretch of ring it shares
    /// with `self`, or `None` if they share none.
    pub fn ring_offset(&self, other: &Trajectory, ring_len: f64) -> Option<f64> {
        let mine = self.positions();
        let theirs = other.positions();
        let laps = ((mine.min - theirs.min) / ring_len).round();
        [laps, laps - 1.0, laps + 1.0]
            .iter()
            .map(|k| k * ring_len)
            .filter_map(|offset| {
                mine.intersect(&(theirs + offset))
                    .map(|shared| (offset, shared.length()))
            })
            .fold(None, |best: Option<(f64, f64)>, (offset, len)| match best {
                Some((_, best_len)) if best_len >= len => best,
                _ => Some((offset, len)),
            })
            .map(|(offset, _)| offset)
    }

    /// Returns `true` if `self` fails to stay at least `time_gap` s behind `front`
    /// wherever the two share the ring.
    pub fn conflicts_with(&self, front: &Trajectory, time_gap: f64, ring_len: f64) -> bool {
        match self.ring_offset(front, ring_len) {
            Some(offset) => self.conflicts_with_aligned(&front.shifted(time_gap, offset)),
            None => false,
        }
    }

    /// Delays `front` by `time_gap` and moves it by the multiple of `ring_len`
    /// that brings its section exit onto the exit of `self`.
    pub(crate) fn aligned_front(&self, front: &Trajectory, time_gap: f64, ring_len: f64) -> Trajectory {
        let offset = ring_len * ((self.exit_pos - front.exit_pos) / ring_len).round();
        front.shifted(time_gap, offset)
    }

    /// As [Self::conflicts_with], for a front already shifted onto `self`'s coordinates.
    pub(crate) fn conflicts_with_aligned(&self, front: &Trajectory) -> bool {
        self.arcs
            .iter()
            .any(|mine| front.arcs.iter().any(|theirs| mine.conflicts_with(theirs)))
    }

    /// Cuts the trajectory at consecutive section exits, the last of which must be `exit_pos`.
    ///
    /// Arcs are copied unchanged, except those straddling an exit which are cut in two.
    pub fn split(&self, exits: &[f64]) -> Result<Vec<Trajectory>, TrajectoryError> {
        let last_exit = match exits.last() {
            Some(exit) => *exit,
            None => return Ok(vec![]),
        };
        if !self.is_complete() || (last_exit - self.exit_pos).abs() > SNAP_EPS {
            return Err(TrajectoryError::Incomplete {
                position: self.leave_pos(),
                exit: last_exit,
            });
        }

        let mut pieces = Vec::with_capacity(exits.len());
        let mut idx = 0;
        let mut cur = Trajectory::new(
            self.vehicle,
            self.entry_time,
            self.entry_pos,
            self.entry_vel,
            exits[0],
        );
        for arc in &self.arcs {
            let mut arc = *arc;
            loop {
                let exit = exits[idx];
                if arc.leave_pos <= exit + SNAP_EPS || idx + 1 == exits.len() {
                    cur.arcs.push(arc);
                    break;
                }
                if let Some((head, tail)) = arc.split_at_position(exit) {
                    cur.arcs.push(head);
                    arc = tail;
                }
                idx += 1;
                let next = Trajectory::new(
                    self.vehicle,
                    cur.leave_time(),
                    exit,
                    cur.leave_vel(),
                    exits[idx],
                );
                pieces.push(std::mem::replace(&mut cur, next));
            }
        }
        pieces.push(cur);

        match pieces.iter().find(|piece| !piece.is_complete()) {
            Some(piece) => Err(TrajectoryError::Incomplete {
                position: piece.leave_pos(),
                exit: piece.exit_pos,
            }),
            None => Ok(pieces),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn greedy(entry_time: f64, entry_vel: f64, length: f64) -> Trajectory {
        let mut traj = Trajectory::new(0, entry_time, 0.0, entry_vel, length);
        let t_acc = (15.0 - entry_vel) / 3.0;
        let d_acc = displacement(entry_vel, 3.0, t_acc);
        if d_acc >= length {
            traj.push_until_position(3.0, length).unwrap();
        } else {
            traj.push_until_time(entry_time + t_acc, 3.0).unwrap();
            traj.push_until_position(0.0, length).unwrap();
        }
        traj
    }

    #[test]
    fn push_until_position() {
        let mut traj = Trajectory::new(0, 2.0, 0.0, 0.0, 24.0);
        traj.push_until_position(3.0, 6.0).unwrap();
        assert_approx_eq!(traj.leave_time(), 4.0);
        assert_approx_eq!(traj.leave_vel(), 6.0);
        traj.push_until_position(0.0, 24.0).unwrap();
        assert_approx_eq!(traj.leave_time(), 7.0);
        assert!(traj.is_complete());
        assert_eq!(traj.arcs().len(), 2);
    }

    #[test]
    fn push_rejects_inconsistent_arcs() {
        let mut traj = Trajectory::new(0, 0.0, 0.0, 10.0, 10.0);
        assert!(matches!(
            traj.push_until_time(2.0, 0.0),
            Err(TrajectoryError::PastExit { .. })
        ));
        traj.push_until_time(0.5, 0.0).unwrap();
        assert!(matches!(
            traj.push_until_time(0.2, 0.0),
            Err(TrajectoryError::EndBeforeStart { .. })
        ));
        assert!(matches!(
            traj.push_until_time(10.0, -3.0),
            Err(TrajectoryError::NegativeVelocity { .. })
        ));
        assert!(matches!(
            traj.push_until_position(-20.0, 10.0),
            Err(TrajectoryError::Unreachable { .. })
        ));
        traj.push_until_time(1.0 + 1e-8, 0.0).unwrap();
        assert_eq!(traj.leave_pos(), 10.0);
    }

    #[test]
    fn split_round_trip() {
        let merged = greedy(1.0, 0.0, 70.0);
        let exits = (1..=7).map(|i| 10.0 * i as f64).collect::<Vec<_>>();
        let pieces = merged.split(&exits).unwrap();
        assert_eq!(pieces.len(), 7);
        for (piece, exit) in pieces.iter().zip(&exits) {
            assert!(piece.is_complete());
            assert_approx_eq!(piece.leave_pos(), *exit);
        }
        for pair in pieces.windows(2) {
            assert_eq!(pair[0].leave_time(), pair[1].entry_time());
            assert_eq!(pair[0].leave_vel(), pair[1].entry_vel());
        }
        let joined = Trajectory::concat(&pieces).unwrap().unwrap();
        assert_approx_eq!(joined.duration(), merged.duration(), 1e-9);
        assert_approx_eq!(joined.leave_vel(), merged.leave_vel(), 1e-9);
        assert_approx_eq!(joined.leave_pos(), merged.leave_pos(), 1e-9);
        for t in [1.5, 3.0, 4.2, 6.0, 8.0] {
            assert_approx_eq!(joined.position_at(t), merged.position_at(t), 1e-9);
        }
    }

    #[test]
    fn split_rejects_incomplete() {
        let mut traj = Trajectory::new(0, 0.0, 0.0, 5.0, 20.0);
        traj.push_until_position(0.0, 15.0).unwrap();
        assert!(traj.split(&[10.0, 20.0]).is_err());
    }

    #[test]
    fn conflict_is_anti_symmetric() {
        let gap = 1.5;
        let ahead = greedy(0.0, 5.0, 30.0);
        let behind = greedy(2.0, 5.0, 30.0);
        assert!(!behind.conflicts_with(&ahead, gap, 100.0));
        assert!(ahead.conflicts_with(&behind, gap, 100.0));
        let close = greedy(1.0, 5.0, 30.0);
        assert!(close.conflicts_with(&ahead, gap, 100.0));
    }

    #[test]
    fn conflict_folds_around_the_ring() {
        let ahead = greedy(0.0, 15.0, 20.0);
        let behind = greedy(3.0, 15.0, 20.0).shifted(0.0, 100.0);
        assert!(!behind.conflicts_with(&ahead, 1.5, 100.0));
        let close = greedy(0.5, 15.0, 20.0).shifted(0.0, 100.0);
        assert!(close.conflicts_with(&ahead, 1.5, 100.0));
        let elsewhere = greedy(0.5, 15.0, 20.0).shifted(0.0, 50.0);
        assert!(!elsewhere.conflicts_with(&ahead, 1.5, 100.0));
    }
}
