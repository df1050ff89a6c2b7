//! The plain-text problem and schedule files.
//!
//! A problem file starts with a line `N M l1 .. lM`, giving the vehicle count, the section
//! count and the section lengths, followed by one line `id entry exit arrival velocity` per vehicle.
//!
//! A schedule file has one line `id exit_time t1 a1 .. tk ak` per vehicle, where each pair
//! gives the start time and acceleration of one arc of the vehicle's whole journey.

use crate::config::Limits;
use crate::error::ParseError;
use crate::ring::Ring;
use crate::scheduler::{Schedule, VehicleSchedule};
use crate::util::{approx_eq, EPS};
use crate::vehicle::VehicleAttributes;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

/// A ring and the vehicles to schedule through it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Problem {
    pub ring: Ring,
    /// The vehicles, in declaration order.
    pub vehicles: Vec<VehicleAttributes>,
}

/// One line of a schedule file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledVehicle {
    pub id: u32,
    pub exit_time: f64,
    /// The `(start time, acceleration)` of each arc.
    pub arcs: Vec<(f64, f64)>,
}

/// Reads a field from a line, naming it in the error.
fn field<T: FromStr>(token: Option<&str>, line: usize, what: &str) -> Result<T, ParseError> {
    let token = token.ok_or_else(|| ParseError::Syntax {
        line,
        message: format!("missing {}", what),
    })?;
    token.parse().map_err(|_| ParseError::Syntax {
        line,
        message: format!("{} `{}` is not a number", what, token),
    })
}

fn invalid(line: usize, message: String) -> ParseError {
    ParseError::Syntax { line, message }
}

/// Parses and validates a problem file.
pub fn parse_problem(input: &str, limits: &Limits) -> Result<Problem, ParseError> {
    let mut lines = input
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let (line, header) = lines.next().ok_or_else(|| invalid(1, "empty input".into()))?;
    let mut tokens = header.split_whitespace();
    let count: usize = field(tokens.next(), line, "vehicle count")?;
    let sections: usize = field(tokens.next(), line, "section count")?;
    let lengths = tokens
        .map(|t| field::<f64>(Some(t), line, "section length"))
        .collect::<Result<Vec<_>, _>>()?;
    if lengths.len() != sections {
        return Err(invalid(
            line,
            format!("expected {} section lengths, found {}", sections, lengths.len()),
        ));
    }
    let ring = Ring::new(&lengths)?;

    let mut vehicles = Vec::with_capacity(count);
    let mut ids = HashSet::new();
    for (line, text) in lines {
        let mut tokens = text.split_whitespace();
        let id: u32 = field(tokens.next(), line, "vehicle id")?;
        let entry: usize = field(tokens.next(), line, "entry section")?;
        let exit: usize = field(tokens.next(), line, "exit section")?;
        let arrival_time: f64 = field(tokens.next(), line, "arrival time")?;
        let initial_vel: f64 = field(tokens.next(), line, "initial velocity")?;
        if tokens.next().is_some() {
            return Err(invalid(line, "expected five fields".into()));
        }
        if !ids.insert(id) {
            return Err(ParseError::DuplicateId { line, id });
        }
        if entry >= sections || exit >= sections {
            return Err(invalid(
                line,
                format!("sections {} and {} must be below {}", entry, exit, sections),
            ));
        }
        if entry == exit {
            return Err(invalid(line, format!("vehicle {} enters and exits at section {}", id, entry)));
        }
        if !(arrival_time.is_finite() && arrival_time >= 0.0) {
            return Err(invalid(line, format!("invalid arrival time {}", arrival_time)));
        }
        if !(initial_vel >= 0.0 && initial_vel <= limits.max_vel) {
            return Err(invalid(line, format!("initial velocity {} is out of bounds", initial_vel)));
        }
        vehicles.push(VehicleAttributes {
            id,
            entry,
            exit,
            arrival_time,
            initial_vel,
        });
    }
    if vehicles.len() != count {
        return Err(ParseError::VehicleCount {
            expected: count,
            found: vehicles.len(),
        });
    }
    Ok(Problem { ring, vehicles })
}

/// Writes a problem file.
pub fn write_problem(problem: &Problem) -> String {
    let sections = problem.ring.sections();
    let mut out = format!(
        "{} {} {}\n",
        problem.vehicles.len(),
        sections.len(),
        sections.iter().map(|s| s.length).join(" ")
    );
    for v in &problem.vehicles {
        out += &format!(
            "{} {} {} {} {}\n",
            v.id, v.entry, v.exit, v.arrival_time, v.initial_vel
        );
    }
    out
}

/// The `(start time, acceleration)` pairs of a vehicle's journey,
/// merging consecutive arcs of equal acceleration and dropping empty ones.
fn arc_starts(vehicle: &VehicleSchedule) -> Vec<(f64, f64)> {
    let mut out: Vec<(f64, f64)> = vec![];
    let arcs = vehicle.sections.iter().flat_map(|(_, traj)| traj.arcs());
    for arc in arcs.filter(|arc| arc.duration() > EPS) {
        match out.last() {
            Some(&(_, acc)) if approx_eq(acc, arc.acc) => {}
            _ => out.push((arc.entry_time, arc.acc)),
        }
    }
    out
}

/// Writes a schedule file, with one line per vehicle in declaration order.
pub fn write_schedule(schedule: &Schedule) -> String {
    schedule
        .vehicles
        .iter()
        .map(|v| {
            let arcs = arc_starts(v)
                .into_iter()
                .map(|(t, a)| format!(" {} {}", t, a))
                .collect::<String>();
            format!("{} {}{}\n", v.id, v.exit_time(), arcs)
        })
        .collect()
}

/// Writes the full schedule, including every section's trajectory, as JSON.
pub fn schedule_to_json(schedule: &Schedule) -> serde_json::Result<String> {
    serde_json::to_string_pretty(schedule)
}

/// Parses a schedule file.
pub fn parse_schedule(input: &str) -> Result<Vec<ScheduledVehicle>, ParseError> {
    input
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .map(|(line, text)| {
            let mut tokens = text.split_whitespace();
            let id = field(tokens.next(), line, "vehicle id")?;
            let exit_time = field(tokens.next(), line, "exit time")?;
            let numbers = tokens
                .map(|t| field::<f64>(Some(t), line, "arc field"))
                .collect::<Result<Vec<_>, _>>()?;
            if numbers.len() % 2 != 0 {
                return Err(invalid(line, "arc fields must come in pairs".into()));
            }
            let arcs = numbers.chunks(2).map(|pair| (pair[0], pair[1])).collect();
            Ok(ScheduledVehicle { id, exit_time, arcs })
        })
        .collect()
}
