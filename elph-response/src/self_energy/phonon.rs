use super::{progress, PhononSelfEnergyEvaluator};
use crate::{
    distributed::{Collective, CollectiveError, ThreadedCollective},
    ResponseError,
};
use ndarray::{Array1, Array2, Axis, Zip};
use num_complex::Complex;

/// The dimensions every worker must agree on before a path is split between them
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct PathShape {
    number_of_q_points: usize,
    number_of_branches: usize,
    nk: usize,
}

impl std::fmt::Display for PathShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} path points, {} branches, {} × {} mesh",
            self.number_of_q_points, self.number_of_branches, self.nk, self.nk
        )
    }
}

/// Gathers the shape seen by every worker and checks they coincide
///
/// A worker without a valid evaluator contributes `None`, which fails the agreement everywhere.
pub(crate) fn agree_on_shape<C: Collective>(
    collective: &C,
    local: Option<PathShape>,
) -> Result<PathShape, ResponseError> {
    let counts = vec![1; collective.size()];
    let shapes = collective.all_gather_v(vec![local], &counts)?;

    let mut shapes = shapes.into_iter().enumerate();
    let reference = match shapes.next() {
        Some((_, Some(shape))) => shape,
        Some((_, None)) => {
            return Err(CollectiveError::Desynchronised(
                "worker 0 has no valid evaluator".into(),
            )
            .into())
        }
        None => return Err(CollectiveError::NoWorkers.into()),
    };
    for (rank, shape) in shapes {
        match shape {
            Some(shape) if shape == reference => {}
            Some(shape) => {
                return Err(CollectiveError::Desynchronised(format!(
                    "worker {rank} sees {shape} but worker 0 sees {reference}"
                ))
                .into())
            }
            None => {
                return Err(CollectiveError::Desynchronised(format!(
                    "worker {rank} has no valid evaluator"
                ))
                .into())
            }
        }
    }
    Ok(reference)
}

impl<'a> PhononSelfEnergyEvaluator<'a> {
    /// The number of phonon branches, the width of each row of the result
    pub fn size(&self) -> usize {
        self.couplings.len_of(Axis(1))
    }

    pub fn number_of_q_points(&self) -> usize {
        self.offsets.len()
    }

    pub fn nk(&self) -> usize {
        self.energies.nk()
    }

    fn shape(&self) -> PathShape {
        PathShape {
            number_of_q_points: self.number_of_q_points(),
            number_of_branches: self.size(),
            nk: self.nk(),
        }
    }

    /// The self-energy of every branch at path point `iq`
    pub fn evaluate_at(&self, iq: usize) -> Result<Array1<Complex<f64>>, ResponseError> {
        if iq >= self.number_of_q_points() {
            return Err(ResponseError::OutOfPath {
                index: iq,
                length: self.number_of_q_points(),
            });
        }
        Ok(self.evaluate_row(iq))
    }

    fn evaluate_row(&self, iq: usize) -> Array1<Complex<f64>> {
        let offset = self.offsets[iq];

        let chi = Zip::from(self.energies.folded(offset))
            .and(self.energies.base())
            .and(self.occupations.folded(offset))
            .and(self.occupations.base())
            .map_collect(|&e_kq, &e_k, &f_kq, &f_k| {
                Complex::from(f_kq - f_k) / Complex::new(e_kq - e_k, self.regulariser)
            });

        self.couplings
            .index_axis(Axis(0), iq)
            .outer_iter()
            .map(|g2| {
                let sum = Zip::from(&g2)
                    .and(&chi)
                    .fold(Complex::new(0_f64, 0_f64), |sum, &coupling, &response| {
                        sum + response * coupling
                    });
                sum * self.prefactor
            })
            .collect()
    }

    /// The `nQ × nb` self-energy along the whole path, split over the workers of `collective`
    ///
    /// Every worker of the group must call this. Each evaluates its contiguous block of the
    /// path, logging one progress line per point and branch, and all return the full result.
    pub fn evaluate<C: Collective>(
        &self,
        collective: &C,
    ) -> Result<Array2<Complex<f64>>, ResponseError> {
        let shape = agree_on_shape(collective, Some(self.shape()))?;

        let partition = collective.partition(shape.number_of_q_points);
        let rank = collective.rank();
        let block = partition.range(rank);
        tracing::debug!(rank, "Evaluating path points {:?}", block);

        let nb = shape.number_of_branches;
        let mut local = Vec::with_capacity(block.len() * nb);
        tracing::info!("{}", progress::header());
        for iq in block {
            let row = self.evaluate_row(iq);
            for (nu, value) in row.iter().enumerate() {
                tracing::info!("{}", progress::line(self.offsets[iq], nu, *value));
            }
            local.extend(row.iter().copied());
        }

        let gathered = collective.all_gather_v(local, &partition.counts(nb))?;
        Ok(Array2::from_shape_vec(
            (shape.number_of_q_points, nb),
            gathered,
        )?)
    }

    /// Evaluates the whole path on `number_of_workers` in-process workers
    pub fn evaluate_threaded(
        &self,
        number_of_workers: usize,
    ) -> Result<Array2<Complex<f64>>, ResponseError> {
        let results = ThreadedCollective::launch(number_of_workers, |worker| {
            self.evaluate(&worker)
        })?;
        // Every worker holds the same gathered result
        results
            .into_iter()
            .next()
            .ok_or(ResponseError::Collective(CollectiveError::NoWorkers))?
    }

    /// The number of in-process workers used by [`Self::evaluate_configured`]
    pub fn number_of_workers(&self) -> usize {
        self.number_of_workers
    }

    /// Evaluates the whole path on the configured number of in-process workers
    pub fn evaluate_configured(&self) -> Result<Array2<Complex<f64>>, ResponseError> {
        self.evaluate_threaded(self.number_of_workers)
    }
}

#[cfg(test)]
mod test {
    use crate::{
        app::SelfEnergyConfiguration,
        distributed::{Collective, CollectiveError, SerialCollective, ThreadedCollective},
        occupations::{CustomOccupation, Smearing},
        self_energy::{progress, PhononSelfEnergyBuilder},
        ResponseError,
    };
    use approx::assert_relative_eq;
    use ndarray::{Array2, Array4, Axis};
    use num_complex::Complex;
    use rand::{rngs::StdRng, SeedableRng};
    use std::{
        f64::consts::PI,
        io::Write,
        sync::{Arc, Mutex},
    };

    struct Model {
        q_path: Vec<[f64; 2]>,
        energies: Array2<f64>,
        couplings: Array4<f64>,
    }

    fn model(nk: usize, number_of_q_points: usize, number_of_branches: usize) -> Model {
        let mut rng = StdRng::seed_from_u64(31);
        let q_path = utilities::q_path(number_of_q_points);
        let energies = utilities::square_lattice_dispersion(nk, 1., 0.25);
        let couplings =
            utilities::random_couplings(number_of_q_points, number_of_branches, nk, &mut rng);
        Model {
            q_path,
            energies,
            couplings,
        }
    }

    #[test]
    fn two_workers_split_four_points_and_agree_with_local_evaluation() {
        let model = model(8, 4, 3);
        let evaluator = PhononSelfEnergyBuilder::new()
            .with_q_path(&model.q_path)
            .with_energies(&model.energies)
            .with_couplings(&model.couplings)
            .build()
            .unwrap();

        let results = ThreadedCollective::launch(2, |worker| {
            let block = worker.partition(4).range(worker.rank());
            (block, evaluator.evaluate(&worker).unwrap())
        })
        .unwrap();

        assert_eq!(results[0].0, 0..2);
        assert_eq!(results[1].0, 2..4);
        assert_eq!(results[0].1, results[1].1);

        let gathered = &results[0].1;
        assert_eq!(gathered.dim(), (4, 3));
        for iq in 0..4 {
            assert_eq!(
                gathered.index_axis(Axis(0), iq),
                evaluator.evaluate_at(iq).unwrap()
            );
        }
    }

    #[test]
    fn serial_and_threaded_evaluations_coincide() {
        let model = model(6, 7, 2);
        let evaluator = PhononSelfEnergyBuilder::new()
            .with_q_path(&model.q_path)
            .with_energies(&model.energies)
            .with_couplings(&model.couplings)
            .with_temperature(300.)
            .build()
            .unwrap();

        let serial = evaluator.evaluate(&SerialCollective).unwrap();
        let threaded = evaluator.evaluate_threaded(3).unwrap();
        assert_eq!(serial, threaded);
    }

    #[test]
    fn configured_worker_count_drives_the_in_process_evaluation() {
        let model = model(6, 5, 2);
        let configuration = SelfEnergyConfiguration {
            number_of_workers: 3,
            ..SelfEnergyConfiguration::default()
        };
        let evaluator = PhononSelfEnergyBuilder::new()
            .with_q_path(&model.q_path)
            .with_energies(&model.energies)
            .with_couplings(&model.couplings)
            .with_configuration(&configuration)
            .build()
            .unwrap();

        assert_eq!(evaluator.number_of_workers(), 3);
        assert_eq!(
            evaluator.evaluate_configured().unwrap(),
            evaluator.evaluate(&SerialCollective).unwrap()
        );
    }

    #[test]
    fn zero_configured_workers_are_rejected() {
        let model = model(4, 2, 1);
        let evaluator = PhononSelfEnergyBuilder::new()
            .with_q_path(&model.q_path)
            .with_energies(&model.energies)
            .with_couplings(&model.couplings)
            .with_number_of_workers(0)
            .build()
            .unwrap();
        assert!(matches!(
            evaluator.evaluate_configured(),
            Err(ResponseError::Collective(CollectiveError::NoWorkers))
        ));
    }

    #[test]
    fn surplus_workers_take_part_with_empty_blocks() {
        let model = model(4, 2, 1);
        let evaluator = PhononSelfEnergyBuilder::new()
            .with_q_path(&model.q_path)
            .with_energies(&model.energies)
            .with_couplings(&model.couplings)
            .build()
            .unwrap();

        let serial = evaluator.evaluate(&SerialCollective).unwrap();
        let threaded = evaluator.evaluate_threaded(5).unwrap();
        assert_eq!(threaded.dim(), (2, 1));
        assert_eq!(serial, threaded);
    }

    #[test]
    fn self_energy_is_linear_in_the_couplings() {
        let model = model(6, 3, 2);
        let doubled = model.couplings.mapv(|g2| 2. * g2);
        let single = PhononSelfEnergyBuilder::new()
            .with_q_path(&model.q_path)
            .with_energies(&model.energies)
            .with_couplings(&model.couplings)
            .build()
            .unwrap()
            .evaluate(&SerialCollective)
            .unwrap();
        let double = PhononSelfEnergyBuilder::new()
            .with_q_path(&model.q_path)
            .with_energies(&model.energies)
            .with_couplings(&doubled)
            .build()
            .unwrap()
            .evaluate(&SerialCollective)
            .unwrap();

        for (a, b) in single.iter().zip(double.iter()) {
            assert_relative_eq!(2. * a.re, b.re, max_relative = 1e-12);
            assert_relative_eq!(2. * a.im, b.im, max_relative = 1e-12);
        }
    }

    #[test]
    fn unit_couplings_reproduce_the_susceptibility_away_from_zero_transfer() {
        let nk = 8;
        let energies = utilities::square_lattice_dispersion(nk, 1., 0.1);
        let q_path = vec![[PI / 2., 0.], [PI, PI / 4.], [PI / 4., 3. * PI / 2.]];
        let couplings = Array4::from_elem((3, 1, nk, nk), 1_f64);
        let evaluator = PhononSelfEnergyBuilder::new()
            .with_q_path(&q_path)
            .with_energies(&energies)
            .with_couplings(&couplings)
            .with_regulariser(1e-8)
            .build()
            .unwrap();
        let chi = crate::susceptibility::SusceptibilityBuilder::new()
            .with_energies(&energies)
            .with_temperature(100.)
            .with_broadening(1e-8)
            .build()
            .unwrap();

        for (iq, &[q1, q2]) in q_path.iter().enumerate() {
            let value = evaluator.evaluate_at(iq).unwrap()[0];
            assert_relative_eq!(value.re, chi.evaluate(q1, q2).unwrap(), max_relative = 1e-10);
        }
    }

    #[test]
    fn zero_transfer_vanishes() {
        let model = model(6, 1, 2);
        let q_path = vec![[2. * PI, -2. * PI]];
        let evaluator = PhononSelfEnergyBuilder::new()
            .with_q_path(&q_path)
            .with_energies(&model.energies)
            .with_couplings(&model.couplings)
            .build()
            .unwrap();
        for value in evaluator.evaluate_at(0).unwrap().iter() {
            assert_eq!(*value, Complex::new(0., 0.));
        }
    }

    #[test]
    fn substituted_occupation_is_used() {
        let model = model(6, 2, 1);
        // Both points are away from zero transfer, where every occupation gives zero
        let q_path = vec![[PI / 3., 0.], [2. * PI / 3., PI / 3.]];
        let fermi_dirac = PhononSelfEnergyBuilder::new()
            .with_q_path(&q_path)
            .with_energies(&model.energies)
            .with_couplings(&model.couplings)
            .build()
            .unwrap()
            .evaluate_at(1)
            .unwrap();
        let custom = PhononSelfEnergyBuilder::new()
            .with_q_path(&q_path)
            .with_energies(&model.energies)
            .with_couplings(&model.couplings)
            .with_occupation(CustomOccupation::new(
                |x: f64| 1. / (x.exp() + 1.),
                |x: f64| 1. / (2. + 2. * x.cosh()),
            ))
            .build()
            .unwrap()
            .evaluate_at(1)
            .unwrap();
        assert!(fermi_dirac[0].norm() > 0.);
        assert_eq!(fermi_dirac, custom);

        let configuration = SelfEnergyConfiguration {
            smearing: Smearing::Lorentz,
            ..SelfEnergyConfiguration::default()
        };
        let lorentz = PhononSelfEnergyBuilder::new()
            .with_q_path(&q_path)
            .with_energies(&model.energies)
            .with_couplings(&model.couplings)
            .with_configuration(&configuration)
            .build()
            .unwrap()
            .evaluate_at(1)
            .unwrap();
        assert_ne!(fermi_dirac, lorentz);
    }

    #[test]
    fn indices_beyond_the_path_are_rejected() {
        let model = model(4, 2, 1);
        let evaluator = PhononSelfEnergyBuilder::new()
            .with_q_path(&model.q_path)
            .with_energies(&model.energies)
            .with_couplings(&model.couplings)
            .build()
            .unwrap();
        assert!(matches!(
            evaluator.evaluate_at(2),
            Err(ResponseError::OutOfPath {
                index: 2,
                length: 2
            })
        ));
    }

    #[test]
    fn couplings_must_match_the_path_and_mesh() {
        let model = model(4, 3, 1);
        let short_path = &model.q_path[..2];
        let result = PhononSelfEnergyBuilder::new()
            .with_q_path(short_path)
            .with_energies(&model.energies)
            .with_couplings(&model.couplings)
            .build();
        assert!(matches!(result, Err(ResponseError::ShapeMismatch(_))));

        let coarse = utilities::square_lattice_dispersion(2, 1., 0.);
        let result = PhononSelfEnergyBuilder::new()
            .with_q_path(&model.q_path)
            .with_energies(&coarse)
            .with_couplings(&model.couplings)
            .build();
        assert!(matches!(result, Err(ResponseError::ShapeMismatch(_))));
    }

    #[test]
    fn workers_with_different_paths_fail_together() {
        let long = model(4, 4, 1);
        let short = model(4, 3, 1);

        let results = ThreadedCollective::launch(2, |worker| {
            let model = if worker.rank() == 0 { &long } else { &short };
            PhononSelfEnergyBuilder::new()
                .with_q_path(&model.q_path)
                .with_energies(&model.energies)
                .with_couplings(&model.couplings)
                .build()
                .unwrap()
                .evaluate(&worker)
        })
        .unwrap();

        for result in results {
            assert!(matches!(
                result,
                Err(ResponseError::Collective(CollectiveError::Desynchronised(_)))
            ));
        }
    }

    #[test]
    fn a_worker_with_invalid_input_fails_the_whole_group() {
        let model = model(4, 2, 1);
        let results = ThreadedCollective::launch(3, |worker| {
            let regulariser = if worker.rank() == 1 { 0. } else { 1e-10 };
            PhononSelfEnergyBuilder::new()
                .with_q_path(&model.q_path)
                .with_energies(&model.energies)
                .with_couplings(&model.couplings)
                .with_regulariser(regulariser)
                .build_and_evaluate(&worker)
        })
        .unwrap();

        assert!(matches!(
            results[0],
            Err(ResponseError::Collective(CollectiveError::Desynchronised(_)))
        ));
        assert!(matches!(
            results[1],
            Err(ResponseError::InvalidRegulariser(_))
        ));
        assert!(matches!(
            results[2],
            Err(ResponseError::Collective(CollectiveError::Desynchronised(_)))
        ));
    }

    #[derive(Clone, Default)]
    struct CapturedLines(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLines {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn progress_lines_follow_the_local_block() {
        let model = model(4, 2, 2);
        let evaluator = PhononSelfEnergyBuilder::new()
            .with_q_path(&model.q_path)
            .with_energies(&model.energies)
            .with_couplings(&model.couplings)
            .build()
            .unwrap();

        let captured = CapturedLines::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .without_time()
            .with_level(false)
            .with_target(false)
            .with_writer(move || writer.clone())
            .finish();
        let result = tracing::subscriber::with_default(subscriber, || {
            evaluator.evaluate(&SerialCollective)
        })
        .unwrap();

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = output
            .lines()
            .filter_map(|line| line.find("Pi(").map(|start| &line[start..]))
            .collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "Pi( q1,  q2,  nu) = ...");
        let mut expected = Vec::new();
        for iq in 0..2 {
            for nu in 0..2 {
                expected.push(progress::line(
                    evaluator.offsets[iq],
                    nu,
                    result[[iq, nu]],
                ));
            }
        }
        assert_eq!(&lines[1..], expected.as_slice());
    }
}
