use crate::config::{Limits, SchedulerConfig};
use crate::error::{ConfigError, ScheduleError, ScheduleResult};
use crate::ring::{Ring, RingIndex};
use crate::table::SchedulingTable;
use crate::trajectory::{FrontRef, Trajectory};
use crate::vehicle::{Vehicle, VehicleAttributes};
use crate::{TrajectoryId, TrajectorySet};
use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// The number of bisection steps used to find the smallest entry delay.
const DELAY_BISECTIONS: usize = 60;

/// Counters describing how a schedule was reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolveStats {
    /// The number of sweeps of the repair loop which found stale placements.
    pub repair_passes: usize,
    /// The number of times a vehicle was rewound to a stale placement.
    pub repairs: usize,
    /// The number of times a vehicle gave way to an earlier unscheduled vehicle.
    pub yields: usize,
    /// The number of committed trajectories reopened to fit a vehicle behind its front.
    pub reopened_sections: usize,
    /// The number of times a vehicle's ring entry was delayed to fit it behind its front.
    pub entry_delays: usize,
    /// The number of times an entering vehicle was held back for circulating traffic.
    pub give_ways: usize,
}

/// The planned motion of one vehicle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VehicleSchedule {
    /// The external vehicle ID.
    pub id: u32,
    pub entry: usize,
    pub exit: usize,
    pub arrival_time: f64,
    pub initial_vel: f64,
    /// The travel time the vehicle would need with the ring to itself, in s.
    pub ideal_travel_time: f64,
    /// The trajectory through each section, in order of travel.
    pub sections: Vec<(usize, Trajectory)>,
}

impl VehicleSchedule {
    /// The time at which the vehicle leaves the ring.
    pub fn exit_time(&self) -> f64 {
        self.sections
            .last()
            .map_or(self.arrival_time, |(_, traj)| traj.leave_time())
    }

    /// The time at which the vehicle enters the ring.
    pub fn entry_time(&self) -> f64 {
        self.sections
            .first()
            .map_or(self.arrival_time, |(_, traj)| traj.entry_time())
    }

    /// The time from arrival to exit in s.
    pub fn travel_time(&self) -> f64 {
        self.exit_time() - self.arrival_time
    }

    /// The whole journey as a single trajectory, or `None` if the vehicle never enters the ring.
    pub fn trajectory(&self) -> Option<Trajectory> {
        Trajectory::concat(self.sections.iter().map(|(_, traj)| traj)).and_then(Result::ok)
    }
}

/// A complete, conflict-free plan for every vehicle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Schedule {
    /// The vehicles in the problem's declaration order.
    pub vehicles: Vec<VehicleSchedule>,
    pub stats: SolveStats,
}

impl Schedule {
    /// The sum of the vehicles' travel times in s.
    pub fn total_travel_time(&self) -> f64 {
        self.vehicles.iter().map(|v| v.travel_time()).sum()
    }

    /// The sum of the vehicles' travel times had each had the ring to itself, in s.
    pub fn ideal_travel_time(&self) -> f64 {
        self.vehicles.iter().map(|v| v.ideal_travel_time).sum()
    }
}

/// The outcome of fitting a vehicle behind its front in one section.
enum Fit {
    Placed {
        /// The number of committed trajectories which had to be rewritten.
        reopened: usize,
        /// The plan from the first reopened section to the end of the current section.
        plan: Trajectory,
    },
    /// The front has only just entered the ring and must wait for the vehicle instead.
    GiveWay,
}

/// Plans the motion of every vehicle through the ring.
pub struct Scheduler {
    ring: Ring,
    config: SchedulerConfig,
    /// The vehicles, in order of arrival.
    vehicles: Vec<Vehicle>,
    /// Every committed trajectory.
    trajectories: TrajectorySet,
    table: SchedulingTable,
    stats: SolveStats,
}

impl Scheduler {
    /// Creates a scheduler for the given vehicles, which are ordered by arrival time
    /// and then by their order in `vehicles`.
    pub fn new(ring: Ring, vehicles: &[VehicleAttributes], config: SchedulerConfig) -> Result<Self, ConfigError> {
        config.check()?;
        let order = vehicles
            .iter()
            .enumerate()
            .sorted_by(|(_, a), (_, b)| a.arrival_time.total_cmp(&b.arrival_time))
            .collect::<Vec<_>>();
        let vehicles = order
            .into_iter()
            .enumerate()
            .map(|(index, (declared, attributes))| Vehicle::new(index, declared, attributes, &ring))
            .collect();
        let table = SchedulingTable::new(ring.section_count(), config.limits.time_gap);
        Ok(Self {
            ring,
            config,
            vehicles,
            trajectories: TrajectorySet::with_key(),
            table,
            stats: SolveStats::default(),
        })
    }

    pub fn ring(&self) -> &Ring {
        &self.ring
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn table(&self) -> &SchedulingTable {
        &self.table
    }

    pub fn stats(&self) -> SolveStats {
        self.stats
    }

    /// The vehicles, in order of arrival.
    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    /// Finds a vehicle by its external ID.
    pub fn vehicle_by_id(&self, id: u32) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id() == id)
    }

    /// Gets the committed trajectory of a vehicle through a section.
    pub fn trajectory(&self, vehicle: usize, section: RingIndex) -> ScheduleResult<&Trajectory> {
        let id = self.vehicles[vehicle].trajectory_id(section)?;
        Ok(&self.trajectories[id])
    }

    fn limits(&self) -> &Limits {
        &self.config.limits
    }

    /// Plans every vehicle, then repairs placements made stale by later revisions.
    pub fn solve(&mut self) -> ScheduleResult<Schedule> {
        info!(
            "Scheduling {} vehicles on a ring of {} sections",
            self.vehicles.len(),
            self.ring.section_count()
        );
        self.trajectories.clear();
        self.stats = SolveStats::default();
        for vehicle in &mut self.vehicles {
            vehicle.reset(&self.ring);
        }
        let requests = self
            .vehicles
            .iter()
            .filter(|v| !v.is_done())
            .map(|v| (v.entry().get(), v.index(), v.arrival_time()))
            .collect::<Vec<_>>();
        self.table.load(requests);

        for index in 0..self.vehicles.len() {
            if !self.vehicles[index].is_done() {
                self.schedule(index)?;
            }
        }
        self.repair()?;

        info!(
            "Scheduled {} vehicles after {} repair passes",
            self.vehicles.len(),
            self.stats.repair_passes
        );
        Ok(self.schedule_result())
    }

    /// Plans a vehicle up to its exit, planning earlier entrants of each section first.
    pub fn schedule(&mut self, vehicle: usize) -> ScheduleResult<()> {
        let mut stack = vec![vehicle];
        while let Some(&v) = stack.last() {
            if self.vehicles[v].is_done() {
                stack.pop();
                continue;
            }
            let section = self.vehicles[v].progress().get();
            if let Some(booked) = self.table.entry_time(section, v) {
                self.vehicles[v].wait_until(booked);
            }
            let time = self.vehicles[v].time();
            self.table.upsert(section, v, time, false);

            if let Some(blocker) = self.table.earliest_unscheduled_before(section, time) {
                let gap = time - blocker.time;
                if !stack.contains(&blocker.vehicle) && gap > self.config.yield_cutoff {
                    debug!(
                        "Vehicle {} yields to vehicle {} in section {}",
                        self.vehicles[v].id(),
                        self.vehicles[blocker.vehicle].id(),
                        section
                    );
                    self.stats.yields += 1;
                    stack.push(blocker.vehicle);
                    continue;
                }
                debug!(
                    "Vehicle {} proceeds ahead of vehicle {} in section {} ({:.3} s apart)",
                    self.vehicles[v].id(),
                    self.vehicles[blocker.vehicle].id(),
                    section,
                    gap
                );
            }
            for held in self.step(v)? {
                if !stack.contains(&held) {
                    stack.insert(stack.len() - 1, held);
                }
            }
        }
        Ok(())
    }

    /// Commits a vehicle's trajectory through its `progress` section.
    ///
    /// Returns the vehicles whose ring entry was withdrawn to let this one pass.
    fn step(&mut self, v: usize) -> ScheduleResult<Vec<usize>> {
        let vehicle = &self.vehicles[v];
        let section = vehicle.progress();
        let greedy = vehicle.max_velocity(self.ring.length_of(section.get() as i64), self.limits())?;
        self.table.update(section.get(), v, greedy.entry_time(), true);

        let mut held = vec![];
        let (front, reopened, plan) = loop {
            let front = match self.table.front_of(section.get(), v) {
                Some(f) => self.vehicles[f].trajectory_id(section)?,
                None => break (None, 0, greedy),
            };
            match self.fit(v, &greedy, front)? {
                Fit::Placed { reopened, plan } => break (Some(front), reopened, plan),
                Fit::GiveWay => {
                    let f = self.trajectories[front].vehicle();
                    debug!(
                        "Vehicle {} holds vehicle {} at its entry to section {}",
                        self.vehicles[v].id(),
                        self.vehicles[f].id(),
                        section
                    );
                    self.stats.give_ways += 1;
                    self.rewind(f, 0);
                    let after = greedy.entry_time() + self.limits().time_gap;
                    self.table.update(section.get(), f, after, false);
                    held.push(f);
                }
            }
        };

        let committed = self.vehicles[v].trajectories();
        let reopened = committed[committed.len() - reopened..].to_vec();
        let exits = reopened
            .iter()
            .map(|(_, id)| self.trajectories[*id].exit_pos())
            .chain(std::iter::once(plan.exit_pos()))
            .collect::<Vec<_>>();
        let mut pieces = plan.split(&exits)?;
        let mut current = match pieces.pop() {
            Some(piece) => piece,
            None => {
                return Err(ScheduleError::Infeasible {
                    vehicle: self.vehicles[v].id(),
                    section: section.get(),
                })
            }
        };

        for ((prev_section, id), piece) in reopened.iter().zip(&pieces) {
            self.trajectories[*id].rewrite(piece);
            self.table.update(prev_section.get(), v, piece.entry_time(), true);
            self.table.push(prev_section.get(), piece.entry_time());
        }

        current.set_front(front.map(|id| FrontRef {
            trajectory: id,
            revision: self.trajectories[id].revision(),
        }));
        self.table.update(section.get(), v, current.entry_time(), true);
        self.table.push(section.get(), current.entry_time());
        let id = self.trajectories.insert(current);
        self.vehicles[v].advance(id, &self.trajectories[id]);
        Ok(held)
    }

    /// Fits `greedy`, the next trajectory of vehicle `v`, behind the trajectory `front`,
    /// reopening committed sections or delaying the ring entry when braking within
    /// the section does not suffice.
    ///
    /// A circulating vehicle which cannot stop behind a front that is just entering
    /// the ring keeps its way, and the front is held at its entry instead.
    fn fit(&mut self, v: usize, greedy: &Trajectory, front: TrajectoryId) -> ScheduleResult<Fit> {
        let limits = *self.limits();
        let ring_len = self.ring.total_length();
        let vehicle = &self.vehicles[v];
        let committed = vehicle.trajectories();
        let front_traj = &self.trajectories[front];

        for reopened in 0..=committed.len() {
            let parts = committed[committed.len() - reopened..]
                .iter()
                .map(|(_, id)| &self.trajectories[*id])
                .chain(std::iter::once(greedy));
            let merged = match Trajectory::concat(parts) {
                Some(merged) => merged?,
                None => continue,
            };
            if let Some(plan) = merged.place_on_top(front_traj, &limits, ring_len) {
                if reopened > 0 {
                    debug!(
                        "Vehicle {} reopened {} sections to fit behind vehicle {}",
                        vehicle.id(),
                        reopened,
                        self.vehicles[front_traj.vehicle()].id()
                    );
                    self.stats.reopened_sections += reopened;
                }
                return Ok(Fit::Placed { reopened, plan });
            }
        }

        let front_vehicle = &self.vehicles[front_traj.vehicle()];
        let front_is_entering = front_vehicle.entry() == vehicle.progress()
            && front_vehicle.trajectories().first().map(|(_, id)| *id) == Some(front);
        if !committed.is_empty() && front_is_entering {
            return Ok(Fit::GiveWay);
        }

        // Braking alone cannot help, so delay the whole plan
        let parts = committed
            .iter()
            .map(|(_, id)| &self.trajectories[*id])
            .chain(std::iter::once(greedy));
        let merged = match Trajectory::concat(parts) {
            Some(merged) => merged?,
            None => greedy.clone(),
        };
        let aligned = merged.aligned_front(front_traj, limits.time_gap, ring_len);
        let conflicts = |delay: f64| merged.translated(delay).conflicts_with_aligned(&aligned);
        let mut hi = f64::max(aligned.leave_time() - greedy.entry_time(), 0.0) + limits.time_gap;
        let mut grown = 0;
        while conflicts(hi) {
            hi *= 2.0;
            grown += 1;
            if grown > 16 {
                return Err(ScheduleError::Infeasible {
                    vehicle: vehicle.id(),
                    section: vehicle.progress().get(),
                });
            }
        }
        let mut lo = 0.0;
        for _ in 0..DELAY_BISECTIONS {
            let mid = 0.5 * (lo + hi);
            if conflicts(mid) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        debug!(
            "Vehicle {} delays its ring entry by {:.3} s to fit behind vehicle {}",
            vehicle.id(),
            hi,
            self.vehicles[front_traj.vehicle()].id()
        );
        self.stats.entry_delays += 1;
        self.stats.reopened_sections += committed.len();
        Ok(Fit::Placed {
            reopened: committed.len(),
            plan: merged.translated(hi),
        })
    }

    /// Re-plans vehicles whose placements went stale, sweeping until none remain.
    pub fn repair(&mut self) -> ScheduleResult<()> {
        let limit = self.config.repair_pass_limit(self.vehicles.len());
        loop {
            let mut repaired = false;
            for v in 0..self.vehicles.len() {
                if let Some(from) = self.first_stale(v) {
                    if !repaired {
                        if self.stats.repair_passes >= limit {
                            return Err(ScheduleError::RepairDiverged { passes: limit });
                        }
                        self.stats.repair_passes += 1;
                        repaired = true;
                    }
                    warn!(
                        "Placement of vehicle {} in section {} is stale; rescheduling",
                        self.vehicles[v].id(),
                        self.vehicles[v].trajectories()[from].0
                    );
                    self.rewind(v, from);
                    self.stats.repairs += 1;
                    self.schedule(v)?;
                }
            }
            if !repaired {
                return Ok(());
            }
        }
    }

    /// The position of the first committed trajectory of vehicle `v` whose front has changed.
    fn first_stale(&self, v: usize) -> Option<usize> {
        self.vehicles[v]
            .trajectories()
            .iter()
            .position(|(section, id)| {
                let expected = self.table.front_of(section.get(), v);
                match (self.trajectories[*id].front(), expected) {
                    (None, None) => false,
                    (Some(front), Some(f)) => match self.trajectories.get(front.trajectory) {
                        Some(traj) => traj.revision() != front.revision || traj.vehicle() != f,
                        None => true,
                    },
                    _ => true,
                }
            })
    }

    /// Discards the trajectories of vehicle `v` from the `from`th onwards.
    fn rewind(&mut self, v: usize, from: usize) {
        let first_id = self.vehicles[v].trajectories()[from].1;
        let first = self.trajectories[first_id].clone();
        let dropped = self.vehicles[v].rewind(from, &first);
        for (i, (section, id)) in dropped.into_iter().enumerate() {
            self.trajectories.remove(id);
            if i == 0 {
                self.table.update(section.get(), v, first.entry_time(), false);
            } else {
                self.table.remove(section.get(), v);
            }
        }
    }

    fn schedule_result(&self) -> Schedule {
        let limits = self.limits();
        let vehicles = self
            .vehicles
            .iter()
            .sorted_by_key(|v| v.declared())
            .map(|v| VehicleSchedule {
                id: v.id(),
                entry: v.entry().get(),
                exit: v.exit().get(),
                arrival_time: v.arrival_time(),
                initial_vel: v.initial_vel(),
                ideal_travel_time: v.ideal_travel_time(&self.ring, limits),
                sections: v
                    .trajectories()
                    .iter()
                    .map(|(section, id)| (section.get(), self.trajectories[*id].clone()))
                    .collect(),
            })
            .collect();
        Schedule {
            vehicles,
            stats: self.stats,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Limits;
    use assert_approx_eq::assert_approx_eq;

    fn attrs(id: u32, entry: usize, exit: usize, arrival_time: f64) -> VehicleAttributes {
        VehicleAttributes {
            id,
            entry,
            exit,
            arrival_time,
            initial_vel: 0.0,
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let ring = Ring::new(&[10.0; 4]).unwrap();
        let config = SchedulerConfig {
            limits: Limits {
                min_acc: 1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(Scheduler::new(ring, &[], config).is_err());
    }

    #[test]
    fn orders_vehicles_by_arrival() {
        let ring = Ring::new(&[10.0; 4]).unwrap();
        let vehicles = [attrs(7, 0, 2, 3.0), attrs(3, 1, 2, 1.0), attrs(5, 2, 0, 1.0)];
        let scheduler = Scheduler::new(ring, &vehicles, SchedulerConfig::default()).unwrap();
        let order = scheduler.vehicles().iter().map(|v| v.id()).collect::<Vec<_>>();
        assert_eq!(order, vec![3, 5, 7]);
        assert_eq!(scheduler.vehicle_by_id(7).map(|v| v.declared()), Some(0));
    }

    #[test]
    fn records_fronts() {
        let ring = Ring::new(&[10.0; 4]).unwrap();
        let vehicles = [attrs(0, 0, 2, 0.0), attrs(1, 0, 2, 0.0)];
        let mut scheduler = Scheduler::new(ring, &vehicles, SchedulerConfig::default()).unwrap();
        let schedule = scheduler.solve().unwrap();
        assert_eq!(schedule.vehicles.len(), 2);

        let section = scheduler.ring().index(1);
        let leader = scheduler.trajectory(0, section).unwrap();
        assert!(leader.front().is_none());
        let follower = scheduler.trajectory(1, section).unwrap();
        let front = follower.front().unwrap();
        assert_eq!(front.revision, leader.revision());
        assert!(scheduler.vehicles()[1].trajectory_id(section).is_ok());
        assert!(scheduler.trajectory(1, scheduler.ring().index(3)).is_err());
    }

    #[test]
    fn caps_repair_passes() {
        let config = SchedulerConfig {
            max_repair_passes: Some(3),
            ..Default::default()
        };
        assert_eq!(config.repair_pass_limit(100), 3);
        assert_eq!(SchedulerConfig::default().repair_pass_limit(4), 10);
    }

    #[test]
    fn entering_vehicle_gives_way_to_circulating_traffic() {
        let ring = Ring::new(&[10.0; 4]).unwrap();
        let circulating = VehicleAttributes {
            initial_vel: 15.0,
            ..attrs(0, 0, 3, 0.0)
        };
        let vehicles = [circulating, attrs(1, 1, 3, 0.2)];
        let mut scheduler = Scheduler::new(ring, &vehicles, SchedulerConfig::default()).unwrap();
        let schedule = scheduler.solve().unwrap();

        let stats = schedule.stats;
        assert_eq!(stats.give_ways, 1);
        assert_eq!(stats.entry_delays, 0);
        assert!(stats.repair_passes <= vehicles.len());
        let first = &schedule.vehicles[0];
        assert_approx_eq!(first.exit_time(), 2.0);
        assert!(first.sections.iter().flat_map(|(_, t)| t.arcs()).all(|arc| arc.acc == 0.0));
        let second = &schedule.vehicles[1];
        assert_approx_eq!(second.entry_time(), 10.0 / 15.0 + 1.5);
    }
}
