//! # Occupations
//!
//! Occupation functions map a reduced energy `x = (e - mu) / kT` to an occupation number
//! in `[0, 1]`. Each also supplies its `delta`, the negative derivative `-df/dx`, which
//! the susceptibility uses for its analytic zero-transfer limit.

use ndarray::{Array, ArrayView, Dimension};
use serde::Deserialize;
use std::f64::consts::{FRAC_1_SQRT_2, PI, SQRT_2};

/// A pluggable occupation function
pub trait Occupation: Send + Sync {
    /// The occupation number at reduced energy `x`
    fn occupation(&self, x: f64) -> f64;
    /// The negative derivative of the occupation number with respect to `x`
    fn delta(&self, x: f64) -> f64;
}

/// The Fermi-Dirac distribution
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FermiDirac;

impl Occupation for FermiDirac {
    fn occupation(&self, x: f64) -> f64 {
        1_f64 / (x.exp() + 1_f64)
    }

    fn delta(&self, x: f64) -> f64 {
        // cosh overflows to infinity far from the Fermi level, which correctly gives zero
        1_f64 / (2_f64 + 2_f64 * x.cosh())
    }
}

/// Gaussian smearing
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Gauss;

impl Occupation for Gauss {
    fn occupation(&self, x: f64) -> f64 {
        libm::erfc(x) / 2_f64
    }

    fn delta(&self, x: f64) -> f64 {
        (-x * x).exp() / PI.sqrt()
    }
}

/// Marzari-Vanderbilt cold smearing
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MarzariVanderbilt;

impl Occupation for MarzariVanderbilt {
    fn occupation(&self, x: f64) -> f64 {
        let y = x + FRAC_1_SQRT_2;
        libm::erfc(y) / 2_f64 + (-y * y).exp() / (2_f64 * PI).sqrt()
    }

    fn delta(&self, x: f64) -> f64 {
        let y = x + FRAC_1_SQRT_2;
        (-y * y).exp() * (1_f64 + SQRT_2 * y) / PI.sqrt()
    }
}

/// Lorentzian smearing
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Lorentz;

impl Occupation for Lorentz {
    fn occupation(&self, x: f64) -> f64 {
        0.5_f64 - x.atan() / PI
    }

    fn delta(&self, x: f64) -> f64 {
        1_f64 / (PI * (1_f64 + x * x))
    }
}

/// The occupation functions which can be selected from a configuration file
#[derive(Copy, Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Smearing {
    #[default]
    FermiDirac,
    Gauss,
    MarzariVanderbilt,
    Lorentz,
}

impl Occupation for Smearing {
    fn occupation(&self, x: f64) -> f64 {
        match self {
            Smearing::FermiDirac => FermiDirac.occupation(x),
            Smearing::Gauss => Gauss.occupation(x),
            Smearing::MarzariVanderbilt => MarzariVanderbilt.occupation(x),
            Smearing::Lorentz => Lorentz.occupation(x),
        }
    }

    fn delta(&self, x: f64) -> f64 {
        match self {
            Smearing::FermiDirac => FermiDirac.delta(x),
            Smearing::Gauss => Gauss.delta(x),
            Smearing::MarzariVanderbilt => MarzariVanderbilt.delta(x),
            Smearing::Lorentz => Lorentz.delta(x),
        }
    }
}

/// An occupation function assembled from a pair of closures
///
/// Used for ensembles not covered by [`Smearing`], or to pass an already differentiated
/// distribution into the phonon self-energy.
#[derive(Clone)]
pub struct CustomOccupation<F, G> {
    occupation: F,
    delta: G,
}

impl<F, G> CustomOccupation<F, G>
where
    F: Fn(f64) -> f64 + Send + Sync,
    G: Fn(f64) -> f64 + Send + Sync,
{
    pub fn new(occupation: F, delta: G) -> Self {
        Self { occupation, delta }
    }
}

impl<F, G> Occupation for CustomOccupation<F, G>
where
    F: Fn(f64) -> f64 + Send + Sync,
    G: Fn(f64) -> f64 + Send + Sync,
{
    fn occupation(&self, x: f64) -> f64 {
        (self.occupation)(x)
    }

    fn delta(&self, x: f64) -> f64 {
        (self.delta)(x)
    }
}

/// Occupies every energy of `energies` at thermal energy `thermal_energy`
pub(crate) fn occupy<O, D>(
    occupation: &O,
    energies: ArrayView<'_, f64, D>,
    thermal_energy: f64,
) -> Array<f64, D>
where
    O: Occupation + ?Sized,
    D: Dimension,
{
    energies.mapv(|energy| occupation.occupation(energy / thermal_energy))
}
