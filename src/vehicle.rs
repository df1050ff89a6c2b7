use crate::config::Limits;
use crate::error::{ScheduleError, ScheduleResult, TrajectoryError};
use crate::math::{displacement, min_reach_time};
use crate::ring::{Ring, RingIndex};
use crate::trajectory::Trajectory;
use crate::util::EPS;
use crate::TrajectoryId;
use serde::{Deserialize, Serialize};

/// The attributes of a vehicle, as given in the problem.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleAttributes {
    /// The external vehicle ID.
    pub id: u32,
    /// The section in which the vehicle enters the ring.
    pub entry: usize,
    /// The section at which the vehicle leaves the ring.
    pub exit: usize,
    /// The earliest time at which the vehicle may enter, in s.
    pub arrival_time: f64,
    /// The velocity on arrival in m/s.
    pub initial_vel: f64,
}

/// The planning state of a vehicle.
#[derive(Clone, Debug)]
pub struct Vehicle {
    /// The external vehicle ID.
    id: u32,
    /// The position of the vehicle in order of arrival, which is its scheduling key.
    index: usize,
    /// The position of the vehicle in the problem's declaration order.
    declared: usize,
    entry: RingIndex,
    exit: RingIndex,
    arrival_time: f64,
    initial_vel: f64,
    /// The next section to plan.
    progress: RingIndex,
    /// The time at which the `progress` section is entered in s.
    time: f64,
    /// The velocity on entering the `progress` section in m/s.
    vel: f64,
    /// The unwrapped ring position of the `progress` section's start in m.
    pos: f64,
    /// The committed trajectories, from `entry` up to `progress`.
    trajectories: Vec<(RingIndex, TrajectoryId)>,
}

impl Vehicle {
    /// Creates a vehicle waiting to enter the ring.
    pub(crate) fn new(index: usize, declared: usize, attributes: &VehicleAttributes, ring: &Ring) -> Self {
        let entry = ring.index(attributes.entry as i64);
        Self {
            id: attributes.id,
            index,
            declared,
            entry,
            exit: ring.index(attributes.exit as i64),
            arrival_time: attributes.arrival_time,
            initial_vel: attributes.initial_vel,
            progress: entry,
            time: attributes.arrival_time,
            vel: attributes.initial_vel,
            pos: ring.position_of(entry.get() as i64),
            trajectories: vec![],
        }
    }

    /// The external vehicle ID.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The scheduling index of the vehicle.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The position of the vehicle in the problem's declaration order.
    pub fn declared(&self) -> usize {
        self.declared
    }

    pub fn entry(&self) -> RingIndex {
        self.entry
    }

    pub fn exit(&self) -> RingIndex {
        self.exit
    }

    pub fn arrival_time(&self) -> f64 {
        self.arrival_time
    }

    pub fn initial_vel(&self) -> f64 {
        self.initial_vel
    }

    /// The next section to plan.
    pub fn progress(&self) -> RingIndex {
        self.progress
    }

    /// The time at which the next section to plan is entered, in s.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The velocity on entering the next section to plan, in m/s.
    pub fn vel(&self) -> f64 {
        self.vel
    }

    /// The unwrapped position of the next section to plan, in m.
    pub fn pos(&self) -> f64 {
        self.pos
    }

    /// Whether every section up to the exit has a committed trajectory.
    pub fn is_done(&self) -> bool {
        self.progress == self.exit
    }

    /// The committed trajectories in order of travel.
    pub fn trajectories(&self) -> &[(RingIndex, TrajectoryId)] {
        &self.trajectories
    }

    /// Gets the committed trajectory through a section.
    pub fn trajectory_id(&self, section: RingIndex) -> ScheduleResult<TrajectoryId> {
        self.trajectories
            .iter()
            .find(|(s, _)| *s == section)
            .map(|(_, id)| *id)
            .ok_or(ScheduleError::MissingTrajectory {
                vehicle: self.id,
                section: section.get(),
            })
    }

    /// The fastest legal trajectory through the next `length` m, ignoring other vehicles:
    /// full acceleration until the velocity ceiling, then cruising.
    pub fn max_velocity(&self, length: f64, limits: &Limits) -> Result<Trajectory, TrajectoryError> {
        let exit = self.pos + length;
        let mut traj = Trajectory::new(self.index, self.time, self.pos, self.vel, exit);
        if self.vel >= limits.max_vel - EPS {
            traj.push_until_position(0.0, exit)?;
            return Ok(traj);
        }
        let t_acc = (limits.max_vel - self.vel) / limits.max_acc;
        if displacement(self.vel, limits.max_acc, t_acc) >= length {
            traj.push_until_position(limits.max_acc, exit)?;
        } else {
            traj.push_until_time(self.time + t_acc, limits.max_acc)?;
            traj.push_until_position(0.0, exit)?;
        }
        Ok(traj)
    }

    /// The travel time from arrival to exit if the vehicle had the ring to itself, in s.
    pub fn ideal_travel_time(&self, ring: &Ring, limits: &Limits) -> f64 {
        let dist = ring.distance(self.entry, self.exit);
        min_reach_time(self.initial_vel, dist, limits)
    }

    /// Holds the vehicle back until `time`, while it has not entered the ring.
    pub(crate) fn wait_until(&mut self, time: f64) {
        if self.trajectories.is_empty() {
            self.time = f64::max(self.time, time);
        }
    }

    /// Commits the trajectory through the `progress` section and moves on to the next.
    pub(crate) fn advance(&mut self, id: TrajectoryId, traj: &Trajectory) {
        self.trajectories.push((self.progress, id));
        self.progress = self.progress.next();
        self.time = traj.leave_time();
        self.vel = traj.leave_vel();
        self.pos = traj.exit_pos();
    }

    /// Forgets every committed trajectory and returns to the ring entry.
    pub(crate) fn reset(&mut self, ring: &Ring) {
        self.progress = self.entry;
        self.time = self.arrival_time;
        self.vel = self.initial_vel;
        self.pos = ring.position_of(self.entry.get() as i64);
        self.trajectories.clear();
    }

    /// Drops the committed trajectories from the `from`th onwards, returning them,
    /// and restarts planning at the start of the first dropped one.
    pub(crate) fn rewind(&mut self, from: usize, first: &Trajectory) -> Vec<(RingIndex, TrajectoryId)> {
        let dropped = self.trajectories.split_off(from);
        if let Some((section, _)) = dropped.first() {
            self.progress = *section;
            self.time = first.entry_time();
            self.vel = first.entry_vel();
            self.pos = first.entry_pos();
        }
        dropped
    }
}
