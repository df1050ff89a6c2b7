use crate::config::Limits;
use crate::util::EPS;

/// The displacement after `dt` s from velocity `vel` under constant acceleration `acc`.
#[inline(always)]
pub fn displacement(vel: f64, acc: f64, dt: f64) -> f64 {
    vel * dt + 0.5 * acc * dt * dt
}

/// The time taken to cover `dist` m starting at `vel` under constant acceleration `acc`,
/// or `None` if the vehicle comes to rest first.
///
/// Uses `2d / (v + sqrt(v^2 + 2ad))`, which stays accurate as `acc` approaches zero.
pub fn travel_time(vel: f64, acc: f64, dist: f64) -> Option<f64> {
    if dist.abs() <= EPS {
        return Some(0.0);
    }
    let discr = vel * vel + 2.0 * acc * dist;
    if discr < -EPS {
        return None;
    }
    let denom = vel + f64::max(discr, 0.0).sqrt();
    if denom <= EPS {
        return None;
    }
    Some(2.0 * dist / denom)
}

/// The shortest time to cover `dist` m from `vel`, accelerating as hard as `limits` allow
/// and cruising once at the speed limit.
pub fn min_reach_time(vel: f64, dist: f64, limits: &Limits) -> f64 {
    let run_up = (limits.max_vel.powi(2) - vel.powi(2)) / (2.0 * limits.max_acc);
    if dist <= run_up {
        return travel_time(vel, limits.max_acc, dist).unwrap_or(0.0);
    }
    (limits.max_vel - vel) / limits.max_acc + (dist - run_up) / limits.max_vel
}
