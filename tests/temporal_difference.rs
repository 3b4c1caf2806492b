mod common;

use float_eq::assert_float_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use common::RandomWalk;
use rltools::config::TemporalDifferenceConfig;
use rltools::learner::TemporalDifferenceLearner;
use rltools::{ConvergeBudget, GreedyStrategy, Learner, Schedule, Trainer, Transition};

fn branching_episodes(count: usize, seed: u64) -> Vec<Vec<Transition<i32, i32>>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            let steps = if rng.gen::<f64>() < 0.7 {
                vec![(0, 0, 0.0), (1, 0, 1.0), (3, 0, 0.5), (4, 0, 2.0)]
            } else {
                vec![(0, 0, 0.0), (2, 0, -2.0), (3, 0, 3.0), (4, 0, 2.0)]
            };
            steps.into_iter().map(Transition::from).collect()
        })
        .collect()
}

fn converged(lambda: f64, episodes: &[Vec<Transition<i32, i32>>]) -> TemporalDifferenceLearner<i32, i32> {
    let mut learner = TemporalDifferenceLearner::new(TemporalDifferenceConfig {
        lambda,
        discount_factor: 1.0,
        learning_rate: 0.1,
        schedule: Schedule::Constant,
    })
    .unwrap();
    for episode in episodes {
        learner.fit(episode.clone().into()).unwrap();
    }
    learner
        .converge(&ConvergeBudget::default().with_atol(1e-10))
        .unwrap();
    learner
}

#[test]
fn lambda_extremes_reach_the_same_fixed_point() {
    let episodes = branching_episodes(200, 11);
    let td0 = converged(0.0, &episodes);
    let td1 = converged(1.0, &episodes);

    assert_float_eq!(td0.val(&0, &0), td1.val(&0, &0), abs <= 1e-6);
    for learner in [&td0, &td1] {
        assert_float_eq!(learner.val(&1, &0), 2.5, abs <= 1e-6);
        assert_float_eq!(learner.val(&2, &0), 5.0, abs <= 1e-6);
        assert_float_eq!(learner.val(&3, &0), 2.0, abs <= 1e-6);
    }

    let upper = episodes.iter().filter(|e| e[1].state == 1).count() as f64 / episodes.len() as f64;
    let expected = upper * 3.5 + (1.0 - upper) * 3.0;
    assert_float_eq!(td0.val(&0, &0), expected, abs <= 0.25);
}

#[test]
fn random_walk_estimates_termination_probability() {
    let learner = TemporalDifferenceLearner::new(TemporalDifferenceConfig::default()).unwrap();
    let mut strategy = GreedyStrategy::new(learner).with_seed(7);
    let mut env = RandomWalk::new(7);
    let results = Trainer::new(1000).run(&mut strategy, &mut env).unwrap();
    assert_eq!(results.episodes(), 1000);

    let learner = strategy.learner();
    let values: Vec<f64> = (1..RandomWalk::LAST).map(|s| learner.val(&s, &0)).collect();
    let mse = values
        .iter()
        .zip(1..RandomWalk::LAST)
        .map(|(value, state)| (value - RandomWalk::true_value(state)).powi(2))
        .sum::<f64>()
        / values.len() as f64;
    assert!(mse < 0.01, "mse {} for {:?}", mse, values);
    assert!(values.windows(2).all(|pair| pair[0] < pair[1]), "{:?}", values);
}
