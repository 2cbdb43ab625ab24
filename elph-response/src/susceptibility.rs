//! # Susceptibility
//!
//! The real part of the static electronic susceptibility of a single band
//!
//! ```text
//! chi(q) = 2/N sum[k] [f(k+q) - f(k)] / [e(k+q) - e(k) + i eta]
//! ```
//!
//! evaluated with a Lorentzian-regularised real part. The resolution in `q` is limited by the
//! resolution of the k-point mesh. At exactly zero transfer the quotient is replaced by its
//! analytic limit, the derivative of the occupation.

use crate::{
    app::SusceptibilityConfiguration,
    constants::K_BOLTZMANN,
    error::{validate_regulariser, validate_temperature},
    occupations::{occupy, FermiDirac, Occupation, Smearing},
    ResponseError,
};
use elph_mesher::{FoldedMesh, MeshOffset};
use ndarray::{Array2, Ix2, Zip};
use rayon::prelude::*;

/// Builder for a [`SusceptibilityEvaluator`]
pub struct SusceptibilityBuilder<RefEnergies, Occ> {
    energies: RefEnergies,
    temperature: f64,
    broadening: f64,
    occupation: Occ,
}

impl SusceptibilityBuilder<(), FermiDirac> {
    pub fn new() -> Self {
        let defaults = SusceptibilityConfiguration::default();
        Self {
            energies: (),
            temperature: defaults.temperature,
            broadening: defaults.broadening,
            occupation: FermiDirac,
        }
    }
}

impl Default for SusceptibilityBuilder<(), FermiDirac> {
    fn default() -> Self {
        Self::new()
    }
}

impl<RefEnergies, Occ> SusceptibilityBuilder<RefEnergies, Occ> {
    /// Attach the `nk × nk` band energies in eV
    pub fn with_energies(
        self,
        energies: &Array2<f64>,
    ) -> SusceptibilityBuilder<&Array2<f64>, Occ> {
        SusceptibilityBuilder {
            energies,
            temperature: self.temperature,
            broadening: self.broadening,
            occupation: self.occupation,
        }
    }

    /// Set the temperature in Kelvin
    pub fn with_temperature(self, temperature: f64) -> Self {
        Self {
            temperature,
            ..self
        }
    }

    /// Set the broadening `eta` of the energy denominators in eV
    pub fn with_broadening(self, broadening: f64) -> Self {
        Self { broadening, ..self }
    }

    /// Replace the default Fermi-Dirac occupation
    pub fn with_occupation<P: Occupation>(
        self,
        occupation: P,
    ) -> SusceptibilityBuilder<RefEnergies, P> {
        SusceptibilityBuilder {
            energies: self.energies,
            temperature: self.temperature,
            broadening: self.broadening,
            occupation,
        }
    }

    /// Take temperature, broadening and smearing from a configuration section
    pub fn with_configuration(
        self,
        configuration: &SusceptibilityConfiguration,
    ) -> SusceptibilityBuilder<RefEnergies, Smearing> {
        SusceptibilityBuilder {
            energies: self.energies,
            temperature: configuration.temperature,
            broadening: configuration.broadening,
            occupation: configuration.smearing,
        }
    }
}

impl<'a, Occ: Occupation> SusceptibilityBuilder<&'a Array2<f64>, Occ> {
    pub fn build(self) -> Result<SusceptibilityEvaluator, ResponseError> {
        let temperature = validate_temperature(self.temperature)?;
        let broadening = validate_regulariser("broadening", self.broadening)?;

        let thermal_energy = K_BOLTZMANN * temperature;
        let occupations = occupy(&self.occupation, self.energies.view(), thermal_energy);
        let zero_transfer_limit = self
            .energies
            .iter()
            .map(|energy| self.occupation.delta(energy / thermal_energy))
            .sum::<f64>()
            / thermal_energy;

        let energies = FoldedMesh::new(self.energies.view())?;
        let occupations = FoldedMesh::new(occupations.view())?;
        let nk = energies.nk();

        tracing::info!(
            "Built susceptibility on a {nk} × {nk} mesh at {temperature} K, eta = {broadening:e}"
        );

        Ok(SusceptibilityEvaluator {
            energies,
            occupations,
            zero_transfer_limit,
            broadening,
            prefactor: 2_f64 / (nk * nk) as f64,
        })
    }
}

/// Evaluates the static susceptibility of one band at any momentum transfer
#[derive(Clone, Debug)]
pub struct SusceptibilityEvaluator {
    energies: FoldedMesh<f64, Ix2>,
    occupations: FoldedMesh<f64, Ix2>,
    /// `sum[k] delta(e(k) / kT) / kT`
    zero_transfer_limit: f64,
    broadening: f64,
    prefactor: f64,
}

impl SusceptibilityEvaluator {
    /// The number of values returned per evaluation, always one
    pub fn size(&self) -> usize {
        1
    }

    pub fn nk(&self) -> usize {
        self.energies.nk()
    }

    /// The susceptibility at `(q1, q2)`, snapped to the nearest mesh point
    pub fn evaluate(&self, q1: f64, q2: f64) -> Result<f64, ResponseError> {
        let offset = MeshOffset::snap(q1, q2, self.nk())?;
        Ok(self.evaluate_at_offset(offset))
    }

    /// The susceptibility at every point of `path`, in order
    pub fn evaluate_path(&self, path: &[[f64; 2]]) -> Result<Vec<f64>, ResponseError> {
        path.par_iter()
            .map(|&[q1, q2]| self.evaluate(q1, q2))
            .collect()
    }

    fn evaluate_at_offset(&self, offset: MeshOffset) -> f64 {
        if offset.is_zero() {
            return -self.prefactor * self.zero_transfer_limit;
        }

        let eta2 = self.broadening * self.broadening;
        let sum = Zip::from(self.energies.folded(offset))
            .and(self.energies.base())
            .and(self.occupations.folded(offset))
            .and(self.occupations.base())
            .fold(0_f64, |sum, &e_kq, &e_k, &f_kq, &f_k| {
                let de = e_kq - e_k;
                let df = f_kq - f_k;
                sum + df * de / (de * de + eta2)
            });

        self.prefactor * sum
    }
}
