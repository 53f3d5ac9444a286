use std::f64::consts::PI;
use std::fmt;

use nalgebra::{Matrix3, Vector3};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::topology::Domain;

/// MW, MVA and MVAr to W, VA and VAr.
pub const MW_TO_W: f64 = 1e6;
/// kV to V.
pub const KV_TO_V: f64 = 1e3;

pub fn angular_frequency(frequency: f64) -> f64 {
    2.0 * PI * frequency
}

/// Symmetric three-phase parameter: the single-phase value on the diagonal.
pub fn three_phase_parameter(value: f64) -> Matrix3<f64> {
    Matrix3::from_diagonal_element(value)
}

/// Balanced positive-sequence phasors for phases a, b and c.
pub fn three_phase_variable(value: Complex64) -> Vector3<Complex64> {
    let shift_b = Complex64::from_polar(1.0, -2.0 * PI / 3.0);
    let shift_c = Complex64::from_polar(1.0, 2.0 * PI / 3.0);
    Vector3::new(value, value * shift_b, value * shift_c)
}

/// A component parameter, per phase in EMT and single-valued otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    Scalar(f64),
    ThreePhase(Matrix3<f64>),
}

impl Param {
    pub fn for_domain(domain: Domain, value: f64) -> Self {
        match domain {
            Domain::Emt => Param::ThreePhase(three_phase_parameter(value)),
            _ => Param::Scalar(value),
        }
    }

    /// Value of phase a (or the scalar itself).
    pub fn value(&self) -> f64 {
        match self {
            Param::Scalar(v) => *v,
            Param::ThreePhase(m) => m[(0, 0)],
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Scalar(v) => write!(f, "{:.6e}", v),
            Param::ThreePhase(m) => write!(f, "3x[{:.6e}]", m[(0, 0)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_phase_parameter_is_diagonal() {
        let m = three_phase_parameter(2.5);
        assert_eq!(m[(0, 0)], 2.5);
        assert_eq!(m[(1, 1)], 2.5);
        assert_eq!(m[(2, 2)], 2.5);
        assert_eq!(m[(0, 1)], 0.0);
        assert_eq!(m[(2, 0)], 0.0);
    }

    #[test]
    fn three_phase_variable_is_balanced() {
        let v = three_phase_variable(Complex64::new(100.0, 0.0));
        assert!((v[1].norm() - 100.0).abs() < 1e-9);
        assert!((v[1].arg() + 2.0 * PI / 3.0).abs() < 1e-9);
        assert!((v[2].arg() - 2.0 * PI / 3.0).abs() < 1e-9);
        assert!((v[0] + v[1] + v[2]).norm() < 1e-9);
    }

    #[test]
    fn param_follows_domain() {
        assert_eq!(Param::for_domain(Domain::Dp, 3.0), Param::Scalar(3.0));
        let emt = Param::for_domain(Domain::Emt, 3.0);
        assert!(matches!(emt, Param::ThreePhase(_)));
        assert_eq!(emt.value(), 3.0);
    }
}
