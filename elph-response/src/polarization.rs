//! # Polarization
//!
//! The density-density RPA polarization in an orbital basis
//!
//! ```text
//! Pi(q, a, b) = 2/N sum[k, n, m] <k+q m|k+q a> <k a|k n> <k n|k b> <k+q b|k+q m>
//!     [f(k+q, m) - f(k, n)] / [e(k+q, m) - e(k, n) + i0]
//! ```
//!
//! where the overlaps `<k a|k n>` are the orbital components of the band eigenvectors. Unlike
//! the susceptibility there is no special treatment of zero momentum transfer: intraband terms
//! vanish there and only interband transitions contribute.

use crate::{
    app::PolarizationConfiguration,
    constants::K_BOLTZMANN,
    error::{validate_regulariser, validate_temperature},
    occupations::{occupy, FermiDirac, Occupation, Smearing},
    ResponseError,
};
use elph_mesher::{FoldedMesh, MeshOffset};
use itertools::iproduct;
use ndarray::{Array2, Array3, Array4, ArrayView3, ArrayView4, Axis, Ix3, Ix4, Zip};
use num_complex::Complex;
use rayon::prelude::*;

/// Builder for a [`PolarizationEvaluator`]
pub struct PolarizationBuilder<RefEnergies, RefOverlaps, Occ> {
    energies: RefEnergies,
    overlaps: RefOverlaps,
    temperature: f64,
    regulariser: f64,
    occupation: Occ,
}

impl PolarizationBuilder<(), (), FermiDirac> {
    pub fn new() -> Self {
        let defaults = PolarizationConfiguration::default();
        Self {
            energies: (),
            overlaps: (),
            temperature: defaults.temperature,
            regulariser: defaults.regulariser,
            occupation: FermiDirac,
        }
    }
}

impl Default for PolarizationBuilder<(), (), FermiDirac> {
    fn default() -> Self {
        Self::new()
    }
}

impl<RefEnergies, RefOverlaps, Occ> PolarizationBuilder<RefEnergies, RefOverlaps, Occ> {
    /// Attach band energies `e[k1, k2, n]` in eV
    pub fn with_energies(
        self,
        energies: &Array3<f64>,
    ) -> PolarizationBuilder<ArrayView3<'_, f64>, RefOverlaps, Occ> {
        PolarizationBuilder {
            energies: energies.view(),
            overlaps: self.overlaps,
            temperature: self.temperature,
            regulariser: self.regulariser,
            occupation: self.occupation,
        }
    }

    /// Attach the energies `e[k1, k2]` of a single band
    pub fn with_single_band_energies(
        self,
        energies: &Array2<f64>,
    ) -> PolarizationBuilder<ArrayView3<'_, f64>, RefOverlaps, Occ> {
        PolarizationBuilder {
            energies: energies.view().insert_axis(Axis(2)),
            overlaps: self.overlaps,
            temperature: self.temperature,
            regulariser: self.regulariser,
            occupation: self.occupation,
        }
    }

    /// Attach eigenvector overlaps `c[k1, k2, a, n] = <k a|k n>`
    pub fn with_overlaps(
        self,
        overlaps: &Array4<Complex<f64>>,
    ) -> PolarizationBuilder<RefEnergies, ArrayView4<'_, Complex<f64>>, Occ> {
        PolarizationBuilder {
            energies: self.energies,
            overlaps: overlaps.view(),
            temperature: self.temperature,
            regulariser: self.regulariser,
            occupation: self.occupation,
        }
    }

    /// Attach the overlaps `c[k1, k2, a]` of a single band
    pub fn with_single_band_overlaps(
        self,
        overlaps: &Array3<Complex<f64>>,
    ) -> PolarizationBuilder<RefEnergies, ArrayView4<'_, Complex<f64>>, Occ> {
        PolarizationBuilder {
            energies: self.energies,
            overlaps: overlaps.view().insert_axis(Axis(3)),
            temperature: self.temperature,
            regulariser: self.regulariser,
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

    /// Set the imaginary part `i0` added to the energy denominators in eV
    pub fn with_regulariser(self, regulariser: f64) -> Self {
        Self {
            regulariser,
            ..self
        }
    }

    /// Replace the default Fermi-Dirac occupation
    pub fn with_occupation<P: Occupation>(
        self,
        occupation: P,
    ) -> PolarizationBuilder<RefEnergies, RefOverlaps, P> {
        PolarizationBuilder {
            energies: self.energies,
            overlaps: self.overlaps,
            temperature: self.temperature,
            regulariser: self.regulariser,
            occupation,
        }
    }

    /// Take temperature, regulariser and smearing from a configuration section
    pub fn with_configuration(
        self,
        configuration: &PolarizationConfiguration,
    ) -> PolarizationBuilder<RefEnergies, RefOverlaps, Smearing> {
        PolarizationBuilder {
            energies: self.energies,
            overlaps: self.overlaps,
            temperature: configuration.temperature,
            regulariser: configuration.regulariser,
            occupation: configuration.smearing,
        }
    }
}

impl<'a, Occ: Occupation>
    PolarizationBuilder<ArrayView3<'a, f64>, ArrayView4<'a, Complex<f64>>, Occ>
{
    pub fn build(self) -> Result<PolarizationEvaluator, ResponseError> {
        let energies = FoldedMesh::new(self.energies.view())?;
        let overlaps = FoldedMesh::new(self.overlaps.view())?;

        let (nk, _, number_of_bands) = self.energies.dim();
        let (nk_overlaps, _, number_of_orbitals, bands_overlaps) = self.overlaps.dim();
        if nk != nk_overlaps {
            return Err(ResponseError::ShapeMismatch(format!(
                "energies are on a {nk} × {nk} mesh but overlaps on a {nk_overlaps} × {nk_overlaps} mesh"
            )));
        }
        if number_of_bands != bands_overlaps {
            return Err(ResponseError::ShapeMismatch(format!(
                "energies carry {number_of_bands} bands but overlaps carry {bands_overlaps}"
            )));
        }

        let temperature = validate_temperature(self.temperature)?;
        let regulariser = validate_regulariser("regulariser", self.regulariser)?;
        let occupations = occupy(
            &self.occupation,
            self.energies.view(),
            K_BOLTZMANN * temperature,
        );
        let occupations = FoldedMesh::new(occupations.view())?;

        tracing::info!(
            "Built polarization on a {nk} × {nk} mesh: {number_of_bands} bands, {number_of_orbitals} orbitals, {temperature} K"
        );

        Ok(PolarizationEvaluator {
            energies,
            occupations,
            overlaps,
            number_of_bands,
            number_of_orbitals,
            regulariser,
            prefactor: 2_f64 / (nk * nk) as f64,
        })
    }
}

/// Evaluates the orbital-resolved polarization at any momentum transfer
#[derive(Clone, Debug)]
pub struct PolarizationEvaluator {
    energies: FoldedMesh<f64, Ix3>,
    occupations: FoldedMesh<f64, Ix3>,
    overlaps: FoldedMesh<Complex<f64>, Ix4>,
    number_of_bands: usize,
    number_of_orbitals: usize,
    regulariser: f64,
    prefactor: f64,
}

impl PolarizationEvaluator {
    /// The number of bands summed over
    pub fn size(&self) -> usize {
        self.number_of_bands
    }

    /// The dimension of each axis of the returned matrix
    pub fn number_of_orbitals(&self) -> usize {
        self.number_of_orbitals
    }

    pub fn nk(&self) -> usize {
        self.energies.nk()
    }

    /// The `no × no` polarization at `(q1, q2)`, snapped to the nearest mesh point
    pub fn evaluate(&self, q1: f64, q2: f64) -> Result<Array2<Complex<f64>>, ResponseError> {
        let offset = MeshOffset::snap(q1, q2, self.nk())?;
        Ok(self.evaluate_at_offset(offset))
    }

    /// The polarization at every point of `path`, in order
    pub fn evaluate_path(
        &self,
        path: &[[f64; 2]],
    ) -> Result<Vec<Array2<Complex<f64>>>, ResponseError> {
        path.par_iter()
            .map(|&[q1, q2]| self.evaluate(q1, q2))
            .collect()
    }

    fn evaluate_at_offset(&self, offset: MeshOffset) -> Array2<Complex<f64>> {
        let no = self.number_of_orbitals;
        let nb = self.number_of_bands;

        let energies_k = self.energies.base();
        let energies_kq = self.energies.folded(offset);
        let occupations_k = self.occupations.base();
        let occupations_kq = self.occupations.folded(offset);
        let overlaps_k = self.overlaps.base();
        let overlaps_kq = self.overlaps.folded(offset);

        let mut pi: Array2<Complex<f64>> = Array2::zeros((no, no));
        for (n, m) in iproduct!(0..nb, 0..nb) {
            let weights = Zip::from(energies_kq.index_axis(Axis(2), m))
                .and(energies_k.index_axis(Axis(2), n))
                .and(occupations_kq.index_axis(Axis(2), m))
                .and(occupations_k.index_axis(Axis(2), n))
                .map_collect(|&e_kq, &e_k, &f_kq, &f_k| {
                    Complex::from(f_kq - f_k) / Complex::new(e_kq - e_k, self.regulariser)
                });

            // cc[k, a] = <k a|k n> <k+q m|k+q a>
            let cc: Array3<Complex<f64>> = Zip::from(overlaps_k.index_axis(Axis(3), n))
                .and(overlaps_kq.index_axis(Axis(3), m))
                .map_collect(|&c_k, &c_kq| c_k * c_kq.conj());

            for (a, b) in iproduct!(0..no, 0..no) {
                pi[[a, b]] += Zip::from(cc.index_axis(Axis(2), a))
                    .and(cc.index_axis(Axis(2), b))
                    .and(&weights)
                    .fold(Complex::new(0_f64, 0_f64), |sum, &cca, &ccb, &weight| {
                        sum + cca * ccb.conj() * weight
                    });
            }
        }

        pi.mapv_into(|element| element * self.prefactor)
    }
}
