//! Error types.

use thiserror::Error;

/// A malformed ring.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RingError {
    #[error("a ring needs at least one section")]
    Empty,
    #[error("section {index} has invalid length {length}")]
    InvalidLength { index: usize, length: f64 },
}

/// A violation of the internal consistency rules of a [Trajectory](crate::Trajectory).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrajectoryError {
    #[error("arc end time {end} precedes its start {start}")]
    EndBeforeStart { start: f64, end: f64 },
    #[error("arc leaves at position {position}, past the section exit {exit}")]
    PastExit { position: f64, exit: f64 },
    #[error("position {target} cannot be reached from {position} at {vel} m/s with {acc} m/s^2")]
    Unreachable {
        position: f64,
        vel: f64,
        acc: f64,
        target: f64,
    },
    #[error("arc ends with negative velocity {vel}")]
    NegativeVelocity { vel: f64 },
    #[error("arc starting at {start} does not continue from {leave}")]
    Discontinuous { leave: f64, start: f64 },
    #[error("trajectory stops at {position} before the last section exit {exit}")]
    Incomplete { position: f64, exit: f64 },
}

/// A failure to produce a schedule.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScheduleError {
    #[error("no feasible plan for vehicle {vehicle} in section {section}")]
    Infeasible { vehicle: u32, section: usize },
    #[error("vehicle {vehicle} has no committed trajectory for section {section}")]
    MissingTrajectory { vehicle: u32, section: usize },
    #[error("repair did not settle after {passes} passes")]
    RepairDiverged { passes: usize },
    #[error(transparent)]
    Invariant(#[from] TrajectoryError),
}

/// An invalid configuration value.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

/// A malformed problem or schedule file.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("line {line}: duplicate vehicle id {id}")]
    DuplicateId { line: usize, id: u32 },
    #[error("expected {expected} vehicles, found {found}")]
    VehicleCount { expected: usize, found: usize },
    #[error(transparent)]
    Ring(#[from] RingError),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// A constraint broken by a schedule, as found by the validator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Violation {
    #[error("vehicle {id} has no schedule line")]
    MissingVehicle { id: u32 },
    #[error("schedule line for unknown vehicle {id}")]
    UnknownVehicle { id: u32 },
    #[error("vehicle {id} is scheduled more than once")]
    DuplicateVehicle { id: u32 },
    #[error("vehicle {id} has no arcs")]
    NoArcs { id: u32 },
    #[error("vehicle {id}: arc starting at {time} is out of order")]
    Unordered { id: u32, time: f64 },
    #[error("vehicle {id}: acceleration {acc} at {time} is out of bounds")]
    Acceleration { id: u32, time: f64, acc: f64 },
    #[error("vehicle {id}: velocity {vel} at {time} is out of bounds")]
    Velocity { id: u32, time: f64, vel: f64 },
    #[error("vehicle {id} travels {actual} m instead of {expected} m")]
    Distance { id: u32, expected: f64, actual: f64 },
    #[error("vehicle {id} enters at {start}, before arriving at {arrival}")]
    EarlyStart { id: u32, start: f64, arrival: f64 },
    #[error("vehicle {id} exits at {exit}, before arriving at {arrival}")]
    ExitBeforeArrival { id: u32, exit: f64, arrival: f64 },
    #[error("vehicle {follower} is only {gap} s behind vehicle {front} in section {section}")]
    Gap {
        front: u32,
        follower: u32,
        section: usize,
        gap: f64,
    },
}
