//! Closed-form roots of polynomials of degree two or less.

use crate::util::EPS;
use arrayvec::ArrayVec;

/// The real roots of `a*x^2 + b*x + c = 0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Roots {
    /// No real roots, or a degenerate equation.
    None,
    /// The quadratic term vanished, leaving a single linear root.
    Linear(f64),
    /// The discriminant vanished; the curves touch without crossing.
    Double(f64),
    /// Two distinct roots, in ascending order.
    Two(f64, f64),
}

impl Roots {
    /// The roots at which the sign of the polynomial changes.
    pub fn crossings(self) -> ArrayVec<f64, 2> {
        let mut out = ArrayVec::new();
        match self {
            Roots::None | Roots::Double(_) => {}
            Roots::Linear(x) => out.push(x),
            Roots::Two(x1, x2) => {
                out.push(x1);
                out.push(x2);
            }
        }
        out
    }

    /// Every root, including a double root.
    pub fn all(self) -> ArrayVec<f64, 2> {
        let mut out = self.crossings();
        if let Roots::Double(x) = self {
            out.push(x);
        }
        out
    }
}

/// Solves `a*x^2 + b*x + c = 0`, degrading to the linear case when `a` is numerically zero.
pub fn solve_quadratic(a: f64, b: f64, c: f64) -> Roots {
    if a.abs() <= EPS {
        if b.abs() <= EPS {
            return Roots::None;
        }
        return Roots::Linear(-c / b);
    }
    let discr = b * b - 4.0 * a * c;
    if discr.abs() <= EPS {
        return Roots::Double(-b / (2.0 * a));
    }
    if discr < 0.0 {
        return Roots::None;
    }
    // Avoids cancellation between `b` and the square root
    let q = -0.5 * (b + b.signum() * discr.sqrt());
    let (x1, x2) = if q == 0.0 {
        let x = (discr.sqrt() / (2.0 * a)).abs();
        (-x, x)
    } else {
        (q / a, c / q)
    };
    Roots::Two(f64::min(x1, x2), f64::max(x1, x2))
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn two_roots() {
        match solve_quadratic(1.0, -3.0, 2.0) {
            Roots::Two(x1, x2) => {
                assert_approx_eq!(x1, 1.0);
                assert_approx_eq!(x2, 2.0);
            }
            other => panic!("unexpected {:?}", other),
        }
        match solve_quadratic(2.0, 0.0, -8.0) {
            Roots::Two(x1, x2) => {
                assert_approx_eq!(x1, -2.0);
                assert_approx_eq!(x2, 2.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn degenerate_cases() {
        assert_eq!(solve_quadratic(0.0, 2.0, -4.0), Roots::Linear(2.0));
        assert_eq!(solve_quadratic(0.0, 0.0, 1.0), Roots::None);
        assert_eq!(solve_quadratic(1.0, 0.0, 1.0), Roots::None);
        assert_eq!(solve_quadratic(1.0, -2.0, 1.0), Roots::Double(1.0));
        assert!(Roots::Double(1.0).crossings().is_empty());
        assert_eq!(Roots::Double(1.0).all().as_slice(), &[1.0]);
    }

    #[test]
    fn small_root_is_accurate() {
        match solve_quadratic(1.0, -1e8, 1.0) {
            Roots::Two(x1, x2) => {
                assert_approx_eq!(x1 * 1e8, 1.0, 1e-9);
                assert_approx_eq!(x2 / 1e8, 1.0, 1e-9);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
