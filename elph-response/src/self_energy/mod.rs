// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! # Phonon self-energy
//!
//! The lowest-order phonon self-energy of a single electronic band along a path of momenta
//!
//! ```text
//! Pi(q, nu) = 2/N sum[k] |g(q, nu, k)|^2 [f(k+q) - f(k)] / [e(k+q) - e(k) + i0]
//! ```
//!
//! A single path point is evaluated locally with
//! [`PhononSelfEnergyEvaluator::evaluate_at`]. The whole path is split over the workers of a
//! [`Collective`](crate::distributed::Collective), each evaluating a contiguous block of path
//! points before all blocks are gathered onto every worker.

mod phonon;
mod progress;

use crate::{
    app::SelfEnergyConfiguration,
    constants::K_BOLTZMANN,
    distributed::Collective,
    error::{validate_regulariser, validate_temperature},
    occupations::{occupy, FermiDirac, Occupation, Smearing},
    ResponseError,
};
use elph_mesher::{FoldedMesh, MeshOffset};
use ndarray::{Array2, Array4, ArrayView4, Ix2};
use num_complex::Complex;

/// Builder for a [`PhononSelfEnergyEvaluator`]
pub struct PhononSelfEnergyBuilder<RefPath, RefEnergies, RefCouplings, Occ> {
    q_path: RefPath,
    energies: RefEnergies,
    couplings: RefCouplings,
    temperature: f64,
    regulariser: f64,
    number_of_workers: usize,
    occupation: Occ,
}

impl PhononSelfEnergyBuilder<(), (), (), FermiDirac> {
    pub fn new() -> Self {
        let defaults = SelfEnergyConfiguration::default();
        Self {
            q_path: (),
            energies: (),
            couplings: (),
            temperature: defaults.temperature,
            regulariser: defaults.regulariser,
            number_of_workers: defaults.number_of_workers,
            occupation: FermiDirac,
        }
    }
}

impl Default for PhononSelfEnergyBuilder<(), (), (), FermiDirac> {
    fn default() -> Self {
        Self::new()
    }
}

impl<RefPath, RefEnergies, RefCouplings, Occ>
    PhononSelfEnergyBuilder<RefPath, RefEnergies, RefCouplings, Occ>
{
    /// Attach the path of momenta `[q1, q2]`, in units where the Brillouin zone spans `2 pi`
    pub fn with_q_path(
        self,
        q_path: &[[f64; 2]],
    ) -> PhononSelfEnergyBuilder<&[[f64; 2]], RefEnergies, RefCouplings, Occ> {
        PhononSelfEnergyBuilder {
            q_path,
            energies: self.energies,
            couplings: self.couplings,
            temperature: self.temperature,
            regulariser: self.regulariser,
            number_of_workers: self.number_of_workers,
            occupation: self.occupation,
        }
    }

    /// Attach the `nk × nk` band energies in eV
    pub fn with_energies(
        self,
        energies: &Array2<f64>,
    ) -> PhononSelfEnergyBuilder<RefPath, &Array2<f64>, RefCouplings, Occ> {
        PhononSelfEnergyBuilder {
            q_path: self.q_path,
            energies,
            couplings: self.couplings,
            temperature: self.temperature,
            regulariser: self.regulariser,
            number_of_workers: self.number_of_workers,
            occupation: self.occupation,
        }
    }

    /// Attach the squared couplings `g2[iq, nu, k1, k2]` for every point of the path
    pub fn with_couplings(
        self,
        couplings: &Array4<f64>,
    ) -> PhononSelfEnergyBuilder<RefPath, RefEnergies, &Array4<f64>, Occ> {
        PhononSelfEnergyBuilder {
            q_path: self.q_path,
            energies: self.energies,
            couplings,
            temperature: self.temperature,
            regulariser: self.regulariser,
            number_of_workers: self.number_of_workers,
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

    /// Set the number of in-process workers used by
    /// [`PhononSelfEnergyEvaluator::evaluate_configured`]
    pub fn with_number_of_workers(self, number_of_workers: usize) -> Self {
        Self {
            number_of_workers,
            ..self
        }
    }

    /// Replace the default Fermi-Dirac occupation
    pub fn with_occupation<P: Occupation>(
        self,
        occupation: P,
    ) -> PhononSelfEnergyBuilder<RefPath, RefEnergies, RefCouplings, P> {
        PhononSelfEnergyBuilder {
            q_path: self.q_path,
            energies: self.energies,
            couplings: self.couplings,
            temperature: self.temperature,
            regulariser: self.regulariser,
            number_of_workers: self.number_of_workers,
            occupation,
        }
    }

    /// Take temperature, regulariser, smearing and worker count from a configuration section
    pub fn with_configuration(
        self,
        configuration: &SelfEnergyConfiguration,
    ) -> PhononSelfEnergyBuilder<RefPath, RefEnergies, RefCouplings, Smearing> {
        PhononSelfEnergyBuilder {
            q_path: self.q_path,
            energies: self.energies,
            couplings: self.couplings,
            temperature: configuration.temperature,
            regulariser: configuration.regulariser,
            number_of_workers: configuration.number_of_workers,
            occupation: configuration.smearing,
        }
    }
}

impl<'a, Occ: Occupation>
    PhononSelfEnergyBuilder<&'a [[f64; 2]], &'a Array2<f64>, &'a Array4<f64>, Occ>
{
    pub fn build(self) -> Result<PhononSelfEnergyEvaluator<'a>, ResponseError> {
        let energies = FoldedMesh::new(self.energies.view())?;
        let nk = energies.nk();

        let (number_of_q_points, number_of_branches, nk1, nk2) = self.couplings.dim();
        if number_of_q_points != self.q_path.len() {
            return Err(ResponseError::ShapeMismatch(format!(
                "the path has {} points but couplings are given for {number_of_q_points}",
                self.q_path.len()
            )));
        }
        if (nk1, nk2) != (nk, nk) {
            return Err(ResponseError::ShapeMismatch(format!(
                "energies are on a {nk} × {nk} mesh but couplings on a {nk1} × {nk2} mesh"
            )));
        }

        let temperature = validate_temperature(self.temperature)?;
        let regulariser = validate_regulariser("regulariser", self.regulariser)?;

        // Snapping happens once, here, so evaluation never fails part way through a path
        let offsets = self
            .q_path
            .iter()
            .map(|&[q1, q2]| MeshOffset::snap(q1, q2, nk))
            .collect::<Result<Vec<_>, _>>()?;

        let occupations = occupy(
            &self.occupation,
            self.energies.view(),
            K_BOLTZMANN * temperature,
        );
        let occupations = FoldedMesh::new(occupations.view())?;

        tracing::info!(
            "Built phonon self-energy for {number_of_q_points} path points and {number_of_branches} branches on a {nk} × {nk} mesh at {temperature} K"
        );

        Ok(PhononSelfEnergyEvaluator {
            energies,
            occupations,
            couplings: self.couplings.view(),
            offsets,
            regulariser,
            number_of_workers: self.number_of_workers,
            prefactor: 2_f64 / (nk * nk) as f64,
        })
    }

    /// Builds the evaluator on this worker and evaluates the whole path across `collective`
    ///
    /// If the local build fails the worker still joins the shape agreement, so its peers fail
    /// with [`CollectiveError::Desynchronised`](crate::distributed::CollectiveError) instead of
    /// waiting for it. The failing worker returns its own build error.
    pub fn build_and_evaluate<C: Collective>(
        self,
        collective: &C,
    ) -> Result<Array2<Complex<f64>>, ResponseError> {
        match self.build() {
            Ok(evaluator) => evaluator.evaluate(collective),
            Err(error) => {
                tracing::error!(rank = collective.rank(), "Failed to build evaluator: {error}");
                // Fails on every worker, this one included
                let _agreement = phonon::agree_on_shape(collective, None);
                Err(error)
            }
        }
    }
}

/// Evaluates the phonon self-energy along a fixed path of momenta
#[derive(Clone, Debug)]
pub struct PhononSelfEnergyEvaluator<'a> {
    energies: FoldedMesh<f64, Ix2>,
    occupations: FoldedMesh<f64, Ix2>,
    couplings: ArrayView4<'a, f64>,
    /// The path snapped onto the mesh
    offsets: Vec<MeshOffset>,
    regulariser: f64,
    /// Workers used by `evaluate_configured`
    number_of_workers: usize,
    prefactor: f64,
}
