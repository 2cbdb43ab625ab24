// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Linear-response building blocks for electron-phonon calculations on periodic k-point meshes
//!
//! # Overview
//! Given band energies on an `nk × nk` mesh covering the Brillouin zone of a two-dimensional
//! crystal, this crate evaluates three momentum-resolved response functions:
//!
//! - the static electronic susceptibility of a single band, [`SusceptibilityEvaluator`];
//! - the RPA polarization in an orbital basis, [`PolarizationEvaluator`];
//! - the lowest-order phonon self-energy along a path of momenta,
//!   [`PhononSelfEnergyEvaluator`], whose path can be split over a group of workers.
//!
//! Momentum transfers are snapped to the nearest mesh point, so the resolution in `q` is that
//! of the k-point mesh. Shifted copies of the mesh are served as windows into a tiled buffer by
//! [`elph_mesher::FoldedMesh`].
//!
//! # Usage
//! Evaluators are assembled by builders, which fall back to the defaults of the matching
//! [`app::Configuration`] section:
//!
//! ```no_run
//! use elph_response::SusceptibilityBuilder;
//! use ndarray::Array2;
//!
//! let energies = Array2::from_shape_fn((12, 12), |(i, j)| {
//!     let k1 = 2. * std::f64::consts::PI * i as f64 / 12.;
//!     let k2 = 2. * std::f64::consts::PI * j as f64 / 12.;
//!     -2. * (k1.cos() + k2.cos())
//! });
//! let chi = SusceptibilityBuilder::new()
//!     .with_energies(&energies)
//!     .with_temperature(300.)
//!     .build()?;
//! let _value = chi.evaluate(std::f64::consts::PI, 0.)?;
//! # Ok::<(), elph_response::ResponseError>(())
//! ```

#![allow(clippy::type_complexity)]

/// Configuration and tracing for applications built on the evaluators
pub mod app;

/// Physical constants
mod constants;

/// Partitioning of work and collective communication between workers
pub mod distributed;

/// Error handling
mod error;

/// Occupation functions and their derivatives
pub mod occupations;

/// The orbital-resolved RPA polarization
pub mod polarization;

/// The phonon self-energy along a path of momenta
pub mod self_energy;

/// The static susceptibility of a single band
pub mod susceptibility;

/// Matrix utilities
pub mod utilities;

pub use constants::K_BOLTZMANN;
pub use error::ResponseError;
pub use polarization::{PolarizationBuilder, PolarizationEvaluator};
pub use self_energy::{PhononSelfEnergyBuilder, PhononSelfEnergyEvaluator};
pub use susceptibility::{SusceptibilityBuilder, SusceptibilityEvaluator};
