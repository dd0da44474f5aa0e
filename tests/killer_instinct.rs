use approx::assert_abs_diff_eq;
use ndarray::{Array1, Array2, array};
use rand::{Rng, SeedableRng, rngs::StdRng};

use killer_instinct::{
    AdamConfig, KiErr, KillerInstinct, KillerInstinctConfig, NUM_FEATURES, PredictOutput,
};

fn model(seed: u64) -> KillerInstinct {
    KillerInstinct::new(KillerInstinctConfig::default().with_seed(seed)).unwrap()
}

fn random_batch(rng: &mut StdRng, rows: usize, scale: f32) -> Array2<f32> {
    Array2::from_shape_fn((rows, NUM_FEATURES), |_| rng.random_range(-scale..scale))
}

/// The label is whether the price delta is positive, the rest of the features are noise.
fn separable_dataset(rng: &mut StdRng, rows: usize) -> (Array2<f32>, Array1<i32>) {
    let mut data = random_batch(rng, rows, 1.);
    let mut labels = Array1::zeros(rows);

    for (mut row, label) in data.rows_mut().into_iter().zip(labels.iter_mut()) {
        let positive = rng.random_bool(0.5);
        let magnitude = rng.random_range(0.5..1.5);

        row[0] = if positive { magnitude } else { -magnitude };
        *label = positive as i32;
    }

    (data, labels)
}

#[test]
fn predictions_are_probabilities() {
    let mut rng = StdRng::seed_from_u64(0);

    for seed in 0..5 {
        let ki = model(seed);

        for scale in [1e-3, 1., 1e3, 1e6] {
            let data = random_batch(&mut rng, 64, scale);
            let PredictOutput { predictions } = ki.predict(data.view()).unwrap();

            assert_eq!(predictions.dim(), (64, 1));
            assert!(
                predictions.iter().all(|p| (0. ..=1.).contains(p)),
                "seed {seed}, scale {scale}: {predictions:?}"
            );
        }
    }
}

#[test]
fn extreme_features_never_yield_nan_predictions() {
    let data = Array2::from_elem((1, NUM_FEATURES), f32::MAX);
    let mut overflowed = 0;

    for seed in 0..20 {
        match model(seed).predict(data.view()) {
            Ok(PredictOutput { predictions }) => assert!(
                predictions.iter().all(|p| (0. ..=1.).contains(p)),
                "seed {seed}: {predictions:?}"
            ),
            Err(err) => {
                assert!(matches!(err, KiErr::InvalidInput(_)), "seed {seed}: {err}");
                overflowed += 1;
            }
        }
    }

    assert!(overflowed > 0);
}

#[test]
fn overflowing_learn_leaves_the_model_untouched() {
    let data = Array2::from_elem((1, NUM_FEATURES), f32::MAX);
    let zeros = Array2::<f32>::zeros((1, NUM_FEATURES));
    let mut rejected = 0;

    for seed in 0..20 {
        let mut ki = model(seed);
        let params = ki.params().to_vec();
        let state = ki.optimizer_state().clone();

        match ki.learn(data.view(), array![1].view()) {
            Ok(output) => {
                assert!(output.loss.is_finite(), "seed {seed}");
                assert!(ki.params().iter().all(|p| p.is_finite()), "seed {seed}");
            }
            Err(err) => {
                assert!(matches!(err, KiErr::InvalidInput(_)), "seed {seed}: {err}");
                assert_eq!(ki.step(), 0);
                assert_eq!(ki.params(), params.as_slice());
                assert_eq!(ki.optimizer_state(), &state);
                rejected += 1;
            }
        }

        let PredictOutput { predictions } = ki.predict(zeros.view()).unwrap();
        assert!((0. ..=1.).contains(&predictions[[0, 0]]), "seed {seed}");
    }

    assert!(rejected > 0);
}

#[test]
fn predict_is_pure() {
    let mut rng = StdRng::seed_from_u64(1);
    let ki = model(1);
    let data = random_batch(&mut rng, 10, 2.);

    let first = ki.predict(data.view()).unwrap();
    let second = ki.predict(data.view()).unwrap();

    assert_eq!(first, second);
    assert_eq!(ki.step(), 0);
}

#[test]
fn learn_counts_one_step_per_call() {
    let mut rng = StdRng::seed_from_u64(2);
    let mut ki = model(2);

    for (i, rows) in [1, 5, 32, 100].into_iter().enumerate() {
        let (data, labels) = separable_dataset(&mut rng, rows);
        ki.learn(data.view(), labels.view()).unwrap();

        assert_eq!(ki.step(), i as u64 + 1);
    }
}

#[test]
fn learn_changes_the_parameters() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut ki = model(3);
    let before = ki.params().to_vec();

    let (data, labels) = separable_dataset(&mut rng, 32);
    let output = ki.learn(data.view(), labels.view()).unwrap();

    assert!(output.loss.is_finite() && output.loss > 0.);
    assert_ne!(ki.params(), before.as_slice());
}

#[test]
fn learning_a_separable_dataset_lowers_the_loss() {
    let mut rng = StdRng::seed_from_u64(4);
    let config = KillerInstinctConfig {
        optimizer: AdamConfig {
            learning_rate: 0.01,
            ..AdamConfig::default()
        },
        ..KillerInstinctConfig::default().with_seed(4)
    };
    let mut ki = KillerInstinct::new(config).unwrap();
    let (data, labels) = separable_dataset(&mut rng, 256);

    let losses: Vec<f32> = (0..500)
        .map(|_| ki.learn(data.view(), labels.view()).unwrap().loss)
        .collect();

    let head = losses[..20].iter().sum::<f32>() / 20.;
    let tail = losses[losses.len() - 20..].iter().sum::<f32>() / 20.;

    assert!(tail < head, "head: {head}, tail: {tail}");
    assert!(tail < 0.3, "tail: {tail}");

    let probe: Array2<f32> = array![
        [1., 0., 0., 0., 0., 0., 0.],
        [-1., 0., 0., 0., 0., 0., 0.]
    ];
    let PredictOutput { predictions } = ki.predict(probe.view()).unwrap();
    assert!(predictions[[0, 0]] > 0.5);
    assert!(predictions[[1, 0]] < 0.5);
}

#[test]
fn fresh_model_is_undecided_on_zeros() {
    for seed in 0..10 {
        let ki = model(seed);
        let data = Array2::<f32>::zeros((1, NUM_FEATURES));

        let PredictOutput { predictions } = ki.predict(data.view()).unwrap();
        assert_abs_diff_eq!(predictions[[0, 0]], 0.5, epsilon = 0.1);
    }
}

#[test]
fn out_of_domain_label_fails_fast() {
    let mut ki = model(5);
    let before = ki.params().to_vec();
    let data = Array2::<f32>::zeros((3, NUM_FEATURES));

    let err = ki.learn(data.view(), array![0, 1, 2].view()).unwrap_err();

    assert!(matches!(err, KiErr::InvalidInput(_)), "{err}");
    assert_eq!(ki.step(), 0);
    assert_eq!(ki.params(), before.as_slice());
}

#[test]
fn wrong_feature_count_is_a_shape_mismatch() {
    let mut ki = model(6);
    let data = Array2::<f32>::zeros((2, NUM_FEATURES - 1));

    let err = ki.predict(data.view()).unwrap_err();
    assert!(matches!(
        err,
        KiErr::ShapeMismatch {
            what: "features",
            got: 6,
            expected: 7
        }
    ));

    let err = ki.learn(data.view(), array![0, 1].view()).unwrap_err();
    assert!(matches!(err, KiErr::ShapeMismatch { .. }));
}
