use crate::{MeshError, MeshOffset};
use ndarray::{Array, ArrayView, Axis, Dimension, RemoveAxis, Slice};

/// A periodic mesh tiled twice along each of its two leading axes
///
/// The two leading axes of the wrapped array index the `nk × nk` k-point mesh, any trailing
/// axes (bands, orbitals) are carried along untouched. The tiled buffer is built once, after
/// which the mesh shifted by any [`MeshOffset`] is the contiguous window
/// `[i1..i1 + nk, i2..i2 + nk, ..]`.
#[derive(Clone, Debug)]
pub struct FoldedMesh<A, D: Dimension> {
    tiled: Array<A, D>,
    nk: usize,
}

impl<A: Clone, D: RemoveAxis> FoldedMesh<A, D> {
    /// Tiles `mesh`, whose two leading axes must be of equal, non-zero length
    pub fn new(mesh: ArrayView<'_, A, D>) -> Result<Self, MeshError> {
        let shape = mesh.shape();
        if shape.len() < 2 {
            return Err(MeshError::TooFewAxes(shape.len()));
        }
        let nk = shape[0];
        if shape[1] != nk {
            return Err(MeshError::NonSquare {
                first: shape[0],
                second: shape[1],
            });
        }
        if nk == 0 {
            return Err(MeshError::Empty);
        }

        let rows = ndarray::concatenate(Axis(0), &[mesh.view(), mesh.view()])?;
        let tiled = ndarray::concatenate(Axis(1), &[rows.view(), rows.view()])?;

        Ok(Self { tiled, nk })
    }
}

impl<A, D: Dimension> FoldedMesh<A, D> {
    /// The number of k-points along each periodic axis
    pub fn nk(&self) -> usize {
        self.nk
    }

    /// The dimension of the untiled mesh
    pub fn dim(&self) -> D {
        let mut dim = self.tiled.raw_dim();
        dim[0] = self.nk;
        dim[1] = self.nk;
        dim
    }

    /// The untiled mesh, the `k` side of a shifted pair
    pub fn base(&self) -> ArrayView<'_, A, D> {
        self.window(0, 0)
    }

    /// The mesh shifted by `offset`, the `k + q` side of a shifted pair
    pub fn folded(&self, offset: MeshOffset) -> ArrayView<'_, A, D> {
        self.window(offset.i1 % self.nk, offset.i2 % self.nk)
    }

    fn window(&self, i1: usize, i2: usize) -> ArrayView<'_, A, D> {
        let nk = self.nk;
        self.tiled
            .slice_each_axis(|description| match description.axis.index() {
                0 => Slice::from(i1..i1 + nk),
                1 => Slice::from(i2..i2 + nk),
                _ => Slice::from(..),
            })
    }
}
