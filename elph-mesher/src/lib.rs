// Copyright 2022 Chris Gubbin
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Periodic Brillouin-zone mesh primitives
//!
//! A momentum transfer `q` is only resolved to the spacing of the underlying `nk × nk`
//! k-point mesh. [`MeshOffset`] snaps a continuous transfer to the nearest mesh offset and
//! [`FoldedMesh`] holds a doubly tiled copy of a periodic array so that the array shifted by
//! any offset is a contiguous window of the tiled buffer.

mod folded;
mod offset;

pub use folded::*;
pub use offset::*;

use miette::Diagnostic;

#[derive(thiserror::Error, Debug, Diagnostic)]
/// Errors raised when a periodic mesh cannot be constructed or indexed
pub enum MeshError {
    #[error("a periodic mesh needs at least two axes, found {0}")]
    TooFewAxes(usize),
    #[error("the periodic axes of the mesh must be square, found {first} × {second}")]
    NonSquare { first: usize, second: usize },
    #[error("the periodic mesh is empty")]
    Empty,
    #[error("momentum transfer {0} cannot be snapped to the mesh")]
    NonFiniteTransfer(f64),
    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}
