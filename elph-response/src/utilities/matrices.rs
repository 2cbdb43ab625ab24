use ndarray::ArrayView2;
use num_complex::Complex;

/// The largest element norm, or one for a vanishing matrix
fn scale(matrix: &ArrayView2<Complex<f64>>) -> f64 {
    let largest = matrix
        .iter()
        .map(|element| element.norm())
        .fold(0_f64, f64::max);
    if largest == 0_f64 {
        1_f64
    } else {
        largest
    }
}

/// Tests for hermiticity of a square matrix, relative to its largest element
///
/// Polarizations of time-reversal symmetric systems are Hermitian up to the accumulated
/// rounding of the k-sum, so `tolerance` is relative rather than absolute.
pub fn is_hermitian(matrix: ArrayView2<Complex<f64>>, tolerance: f64) -> bool {
    if !matrix.is_square() {
        return false;
    }
    let scale = scale(&matrix);
    let matrix_transpose = matrix.t();
    matrix
        .iter()
        .zip(matrix_transpose.iter())
        .all(|(element, adjoint_element)| {
            (element - adjoint_element.conj()).norm() / scale < tolerance
        })
}

/// Tests whether a square matrix is real and symmetric, relative to its largest element
pub fn is_real_symmetric(matrix: ArrayView2<Complex<f64>>, tolerance: f64) -> bool {
    let scale = scale(&matrix);
    is_hermitian(matrix, tolerance)
        && matrix
            .iter()
            .all(|element| element.im.abs() / scale < tolerance)
}
