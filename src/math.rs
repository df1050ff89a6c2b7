//! Mathematical structs and functions.

pub use kinematics::*;
pub use quadratic::{solve_quadratic, Roots};

mod kinematics;
mod quadratic;
