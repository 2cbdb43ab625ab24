//! Synthetic meshes shared by the tests and benchmarks of `elph-response`

use ndarray::{Array2, Array3, Array4};
use num_complex::Complex;
use rand::Rng;
use std::f64::consts::PI;

/// `cos(2 pi i / nk)`, identical for `i` and `nk - i` so that `e(k) == e(-k)` holds exactly
fn mesh_cosines(nk: usize) -> Vec<f64> {
    (0..nk)
        .map(|i| (2. * PI * i.min(nk - i) as f64 / nk as f64).cos())
        .collect()
}

/// Nearest-neighbour tight-binding band of a square lattice, `-2t (cos k1 + cos k2) - mu`
pub fn square_lattice_dispersion(nk: usize, hopping: f64, chemical_potential: f64) -> Array2<f64> {
    let cosines = mesh_cosines(nk);
    Array2::from_shape_fn((nk, nk), |(i, j)| {
        -2. * hopping * (cosines[i] + cosines[j]) - chemical_potential
    })
}

/// Band energies `e[k1, k2, n]` and real eigenvector overlaps `c[k1, k2, a, n]`
pub struct TwoBandModel {
    pub energies: Array3<f64>,
    pub overlaps: Array4<Complex<f64>>,
}

/// Two orbitals with opposite dispersions, offset in energy and mixed by `hybridisation`
///
/// The orbital Hamiltonian is real and symmetric at every k-point, so the overlaps are a
/// rotation matrix and the model is time-reversal symmetric.
pub fn two_band_model(nk: usize, hybridisation: f64) -> TwoBandModel {
    let cosines = mesh_cosines(nk);
    let mut energies = Array3::zeros((nk, nk, 2));
    let mut overlaps = Array4::zeros((nk, nk, 2, 2));

    for i in 0..nk {
        for j in 0..nk {
            let band = cosines[i] + cosines[j];
            let first = -0.5 * band + 1.5;
            let second = 0.5 * band - 1.5;

            let mean = (first + second) / 2.;
            let splitting = ((first - second).powi(2) / 4. + hybridisation.powi(2)).sqrt();
            energies[[i, j, 0]] = mean - splitting;
            energies[[i, j, 1]] = mean + splitting;

            let theta = 0.5 * (2. * hybridisation).atan2(first - second);
            let (sin, cos) = theta.sin_cos();
            // Columns are the eigenvectors of [[first, v], [v, second]]
            overlaps[[i, j, 0, 0]] = Complex::from(-sin);
            overlaps[[i, j, 1, 0]] = Complex::from(cos);
            overlaps[[i, j, 0, 1]] = Complex::from(cos);
            overlaps[[i, j, 1, 1]] = Complex::from(sin);
        }
    }

    TwoBandModel { energies, overlaps }
}

/// Random, non-negative squared couplings `g2[iq, nu, k1, k2]`
pub fn random_couplings<R: Rng>(
    number_of_q_points: usize,
    number_of_branches: usize,
    nk: usize,
    rng: &mut R,
) -> Array4<f64> {
    Array4::from_shape_fn((number_of_q_points, number_of_branches, nk, nk), |_| {
        rng.gen_range(0.0..0.05)
    })
}

/// `number_of_points` momenta along Gamma - X - M - Gamma
pub fn q_path(number_of_points: usize) -> Vec<[f64; 2]> {
    let corners = [[0., 0.], [PI, 0.], [PI, PI], [0., 0.]];
    let total: f64 = corners
        .windows(2)
        .map(|pair| segment_length(pair[0], pair[1]))
        .sum();

    (0..number_of_points)
        .map(|index| {
            let mut distance = if number_of_points > 1 {
                total * index as f64 / (number_of_points - 1) as f64
            } else {
                0.
            };
            for pair in corners.windows(2) {
                let length = segment_length(pair[0], pair[1]);
                if distance <= length {
                    let t = distance / length;
                    return [
                        pair[0][0] + t * (pair[1][0] - pair[0][0]),
                        pair[0][1] + t * (pair[1][1] - pair[0][1]),
                    ];
                }
                distance -= length;
            }
            [0., 0.]
        })
        .collect()
}

/// Mesh-commensurate momenta along Gamma - X - M - Gamma with `steps` points per segment
pub fn high_symmetry_path(nk: usize, steps: usize) -> Vec<[f64; 2]> {
    let corners = [[0., 0.], [PI, 0.], [PI, PI], [0., 0.]];
    let unit = 2. * PI / nk as f64;
    corners
        .windows(2)
        .flat_map(|pair| {
            (0..steps).map(move |step| {
                let t = step as f64 / steps as f64;
                let snap = |start: f64, end: f64| ((start + t * (end - start)) / unit).round() * unit;
                [snap(pair[0][0], pair[1][0]), snap(pair[0][1], pair[1][1])]
            })
        })
        .collect()
}

fn segment_length(start: [f64; 2], end: [f64; 2]) -> f64 {
    (end[0] - start[0]).hypot(end[1] - start[1])
}
