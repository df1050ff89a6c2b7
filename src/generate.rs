//! Random problem generation with Poisson arrivals.

use crate::error::ConfigError;
use crate::format::Problem;
use crate::ring::Ring;
use crate::vehicle::VehicleAttributes;
use rand::Rng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};

/// The parameters of a random problem. Ranges are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub min_vehicles: usize,
    pub max_vehicles: usize,
    pub min_sections: usize,
    pub max_sections: usize,
    /// Section lengths are drawn from this range, in m.
    pub min_length: u32,
    pub max_length: u32,
    /// Whether every section of a ring shares one drawn length.
    pub uniform_lengths: bool,
    /// Whether journeys may cross the seam between the last and first sections.
    pub wrap_around: bool,
    /// Initial velocities are drawn below this bound in m/s. Zero starts every vehicle at rest.
    pub max_initial_vel: f64,
    /// The arrival rate in vehicles per s.
    pub arrival_rate: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            min_vehicles: 2,
            max_vehicles: 30,
            min_sections: 5,
            max_sections: 20,
            min_length: 5,
            max_length: 20,
            uniform_lengths: true,
            wrap_around: false,
            max_initial_vel: 0.0,
            arrival_rate: 3.0,
        }
    }
}

impl GeneratorConfig {
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.min_vehicles == 0 || self.min_vehicles > self.max_vehicles {
            return Err(ConfigError(format!(
                "invalid vehicle range {}..={}",
                self.min_vehicles, self.max_vehicles
            )));
        }
        if self.min_sections < 2 || self.min_sections > self.max_sections {
            return Err(ConfigError(format!(
                "invalid section range {}..={}, rings need at least two sections",
                self.min_sections, self.max_sections
            )));
        }
        if self.min_length == 0 || self.min_length > self.max_length {
            return Err(ConfigError(format!(
                "invalid length range {}..={}",
                self.min_length, self.max_length
            )));
        }
        if !(self.max_initial_vel.is_finite() && self.max_initial_vel >= 0.0) {
            return Err(ConfigError(format!(
                "max_initial_vel must not be negative, got {}",
                self.max_initial_vel
            )));
        }
        if !(self.arrival_rate.is_finite() && self.arrival_rate > 0.0) {
            return Err(ConfigError(format!("arrival_rate must be positive, got {}", self.arrival_rate)));
        }
        Ok(())
    }
}

/// Generates a random problem.
///
/// Vehicles are numbered from zero in order of arrival. Unless `wrap_around` is set,
/// each travels from its entry section to a later exit section without crossing the seam.
pub fn generate_problem<R: Rng>(rng: &mut R, config: &GeneratorConfig) -> Result<Problem, ConfigError> {
    config.check()?;
    let vehicle_count = rng.gen_range(config.min_vehicles..=config.max_vehicles);
    let section_count = rng.gen_range(config.min_sections..=config.max_sections);
    let lengths = if config.uniform_lengths {
        vec![rng.gen_range(config.min_length..=config.max_length) as f64; section_count]
    } else {
        (0..section_count)
            .map(|_| rng.gen_range(config.min_length..=config.max_length) as f64)
            .collect()
    };
    let ring = Ring::new(&lengths).map_err(|err| ConfigError(err.to_string()))?;

    let interarrival = Exp::new(config.arrival_rate).map_err(|err| ConfigError(err.to_string()))?;
    let mut arrival_time = 0.0;
    let mut vehicles = Vec::with_capacity(vehicle_count);
    for id in 0..vehicle_count as u32 {
        arrival_time += interarrival.sample(rng);
        let (entry, exit) = if config.wrap_around {
            let entry = rng.gen_range(0..section_count);
            (entry, (entry + rng.gen_range(1..section_count)) % section_count)
        } else {
            let entry = rng.gen_range(0..section_count - 1);
            (entry, rng.gen_range(entry + 1..section_count))
        };
        let initial_vel = if config.max_initial_vel > 0.0 {
            rng.gen_range(0.0..config.max_initial_vel)
        } else {
            0.0
        };
        vehicles.push(VehicleAttributes {
            id,
            entry,
            exit,
            arrival_time,
            initial_vel,
        });
    }
    Ok(Problem { ring, vehicles })
}
