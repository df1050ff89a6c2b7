//! Offline scheduling of vehicles through a single-lane roundabout.
//!
//! The roundabout is a [Ring] of fixed-length sections. Every vehicle gets, for each section
//! it crosses, a [Trajectory] of constant-acceleration arcs which respects the [Limits] and
//! keeps the time gap behind the vehicle ahead of it in that section.

pub use config::{Limits, SchedulerConfig};
pub use error::{ConfigError, ParseError, RingError, ScheduleError, ScheduleResult, TrajectoryError, Violation};
pub use ring::{Ring, RingIndex, Section};
pub use scheduler::{Schedule, Scheduler, SolveStats, VehicleSchedule};
use slotmap::{new_key_type, SlotMap};
pub use slotmap::{Key, KeyData};
pub use table::{Entry, SchedulingTable};
pub use trajectory::{Arc, FrontRef, Trajectory};
pub use util::Interval;
pub use vehicle::{Vehicle, VehicleAttributes};

mod config;
mod error;
pub mod format;
pub mod generate;
pub mod math;
mod ring;
mod scheduler;
mod table;
mod trajectory;
mod util;
pub mod validate;
mod vehicle;

new_key_type! {
    /// Unique ID of a committed [Trajectory].
    pub struct TrajectoryId;
}

type TrajectorySet = SlotMap<TrajectoryId, Trajectory>;
