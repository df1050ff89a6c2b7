//! Kinematic limits and scheduler tuning.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// The kinematic limits shared by every vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// The braking limit, a negative number in m/s<sup>2</sup>.
    pub min_acc: f64,
    /// The acceleration limit in m/s<sup>2</sup>.
    pub max_acc: f64,
    /// The speed ceiling in m/s.
    pub max_vel: f64,
    /// The minimum time separation behind the vehicle ahead, in s.
    pub time_gap: f64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            min_acc: -3.0,
            max_acc: 3.0,
            max_vel: 15.0,
            time_gap: 1.5,
        }
    }
}

impl Limits {
    /// Checks the signs of the limits.
    pub fn check(&self) -> Result<(), ConfigError> {
        let all_finite = [self.min_acc, self.max_acc, self.max_vel, self.time_gap]
            .iter()
            .all(|x| x.is_finite());
        if !all_finite {
            return Err(ConfigError("limits must be finite".into()));
        }
        if self.min_acc >= 0.0 {
            return Err(ConfigError(format!("min_acc must be negative, got {}", self.min_acc)));
        }
        if self.max_acc <= 0.0 {
            return Err(ConfigError(format!("max_acc must be positive, got {}", self.max_acc)));
        }
        if self.max_vel <= 0.0 {
            return Err(ConfigError(format!("max_vel must be positive, got {}", self.max_vel)));
        }
        if self.time_gap <= 0.0 {
            return Err(ConfigError(format!("time_gap must be positive, got {}", self.time_gap)));
        }
        Ok(())
    }
}

/// The configuration of a [Scheduler](crate::Scheduler).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// The kinematic limits.
    pub limits: Limits,
    /// A vehicle does not wait for an earlier, still unscheduled entrant
    /// whose section entry time is less than this many seconds before its own.
    pub yield_cutoff: f64,
    /// The maximum number of repair passes.
    /// Defaults to twice the number of vehicles, plus two.
    pub max_repair_passes: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            yield_cutoff: 0.3,
            max_repair_passes: None,
        }
    }
}

impl SchedulerConfig {
    /// Checks the configuration for nonsensical values.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.limits.check()?;
        if !(self.yield_cutoff >= 0.0) {
            return Err(ConfigError(format!(
                "yield_cutoff must be non-negative, got {}",
                self.yield_cutoff
            )));
        }
        Ok(())
    }

    /// The repair pass limit for a problem with `vehicle_count` vehicles.
    pub fn repair_pass_limit(&self, vehicle_count: usize) -> usize {
        self.max_repair_passes.unwrap_or(2 * vehicle_count + 2)
    }
}
