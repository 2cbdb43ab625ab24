use crate::MeshError;
use num_traits::{Float, FloatConst};

/// The integer offset of a momentum transfer on an `nk × nk` periodic mesh
///
/// Both components always lie in `0..nk`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MeshOffset {
    pub i1: usize,
    pub i2: usize,
}

impl MeshOffset {
    /// Builds an offset from integer mesh indices, folding them back into `0..nk`
    pub fn new(i1: usize, i2: usize, nk: usize) -> Self {
        Self {
            i1: i1 % nk,
            i2: i2 % nk,
        }
    }

    /// Snaps the momentum transfer `(q1, q2)`, in reduced coordinates with period `2π`,
    /// to the nearest point of an `nk × nk` mesh
    ///
    /// Each component is scaled by `nk / 2π`, rounded to the nearest integer with ties
    /// going to the even neighbour, and reduced modulo `nk`. Transfers outside the first
    /// Brillouin zone alias onto their folded equivalent, the resolution in `q` is that
    /// of the mesh in `k`.
    pub fn snap<T: Float + FloatConst>(q1: T, q2: T, nk: usize) -> Result<Self, MeshError> {
        if nk == 0 {
            return Err(MeshError::Empty);
        }
        Ok(Self {
            i1: snap_component(q1, nk)?,
            i2: snap_component(q2, nk)?,
        })
    }

    /// True if the offset is the zero transfer
    pub fn is_zero(&self) -> bool {
        self.i1 == 0 && self.i2 == 0
    }
}

fn snap_component<T: Float + FloatConst>(q: T, nk: usize) -> Result<usize, MeshError> {
    let non_finite = || MeshError::NonFiniteTransfer(q.to_f64().unwrap_or(f64::NAN));
    if !q.is_finite() {
        return Err(non_finite());
    }
    let nk_as_t = T::from(nk).ok_or_else(non_finite)?;
    let period = T::PI() + T::PI();
    let scale = nk_as_t / period;

    // Very large transfers are first folded by whole periods so the scaled value stays finite
    let scaled = match q * scale {
        scaled if scaled.is_finite() => scaled,
        _ => (q % period) * scale,
    };
    // Reduced in floating point, so transfers beyond the integer range still alias
    let index = round_half_to_even(scaled) % nk_as_t;
    let index = if index < T::zero() {
        index + nk_as_t
    } else {
        index
    };
    let index = index.to_usize().ok_or_else(non_finite)?;
    Ok(index % nk)
}

/// Rounds to the nearest integer, resolving exact half-integers to the even neighbour
fn round_half_to_even<T: Float>(x: T) -> T {
    let half = T::from(0.5).unwrap_or_else(T::zero);
    if (x - x.trunc()).abs() == half {
        let two = T::one() + T::one();
        (x / two).round() * two
    } else {
        x.round()
    }
}
