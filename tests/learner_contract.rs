use float_eq::assert_float_eq;
use rstest::rstest;

use rltools::config::{MlmdpConfig, QLearnerConfig, TemporalDifferenceConfig};
use rltools::{EnumLearner, Error, Fit, Learner, LearnerConfig, Snapshot, Transition};

fn episode() -> Vec<Transition<i32, i32>> {
    vec![
        (0, 0, 0.0).into(),
        (1, 0, 0.1).into(),
        (2, 0, 0.5).into(),
        (3, 0, -1.0).into(),
    ]
}

fn build(config: &LearnerConfig) -> EnumLearner<i32, i32> {
    config.build().unwrap()
}

#[rstest]
#[case(LearnerConfig::TemporalDifference(TemporalDifferenceConfig::default()))]
#[case(LearnerConfig::Mlmdp(MlmdpConfig::default()))]
#[case(LearnerConfig::QLearning(QLearnerConfig::default()))]
fn batch_and_incremental_fits_agree(#[case] config: LearnerConfig) {
    let mut batch = build(&config);
    batch.fit(episode().into()).unwrap();

    let mut incremental = build(&config);
    for transition in episode() {
        incremental.fit(Fit::Step(transition)).unwrap();
    }

    for state in 0..4 {
        assert_float_eq!(
            batch.val(&state, &0),
            incremental.val(&state, &0),
            abs <= 1e-12
        );
    }
    assert_eq!(batch.episode(), incremental.episode());
}

#[rstest]
#[case(LearnerConfig::TemporalDifference(TemporalDifferenceConfig::default()))]
#[case(LearnerConfig::Mlmdp(MlmdpConfig::default()))]
#[case(LearnerConfig::QLearning(QLearnerConfig::default()))]
fn snapshot_mid_episode_is_transparent(#[case] config: LearnerConfig) {
    let mut uninterrupted = build(&config);
    uninterrupted.fit(episode().into()).unwrap();

    let mut first = build(&config);
    let mut steps = episode().into_iter();
    for transition in steps.by_ref().take(2) {
        first.fit(transition.into()).unwrap();
    }
    let snapshot = Snapshot::capture(&first).unwrap();
    drop(first);
    let mut resumed: EnumLearner<i32, i32> = snapshot.restore().unwrap();
    for transition in steps {
        resumed.fit(transition.into()).unwrap();
    }

    for state in 0..4 {
        assert_float_eq!(
            uninterrupted.val(&state, &0),
            resumed.val(&state, &0),
            abs <= 1e-12
        );
    }
}

#[test]
fn several_episodes_in_one_stream() {
    let config = LearnerConfig::QLearning(QLearnerConfig::default());
    let mut streamed = build(&config);
    let mut stream: Vec<_> = episode()
        .into_iter()
        .map(rltools::Observation::Transition)
        .collect();
    stream.push(rltools::Observation::Boundary);
    stream.extend(episode().into_iter().map(rltools::Observation::Transition));
    streamed.fit(stream.into()).unwrap();

    let mut separate = build(&config);
    separate.fit(episode().into()).unwrap();
    separate.fit(episode().into()).unwrap();

    assert_eq!(streamed.episode(), 2);
    for state in 0..4 {
        assert_float_eq!(
            streamed.val(&state, &0),
            separate.val(&state, &0),
            abs <= 1e-12
        );
    }
}

#[test]
fn unseen_pairs_read_zero() {
    let mut learner = build(&LearnerConfig::TemporalDifference(
        TemporalDifferenceConfig::default(),
    ));
    learner.fit(episode().into()).unwrap();
    assert_eq!(learner.val(&42, &7), 0.0);
    assert_eq!(learner.val(&0, &7), 0.0);
}

#[test]
fn observed_sets_include_first_transition() {
    let mut learner = build(&LearnerConfig::Mlmdp(MlmdpConfig::default()));
    learner
        .fit(vec![(5, 9, 100.0), (6, 0, 0.0)].into())
        .unwrap();
    assert!(learner.states().contains(&5));
    assert!(learner.actions().contains(&9));
    assert_eq!(learner.states().len(), 2);
}

#[test]
fn json_config_builds_requested_kind() {
    let config = LearnerConfig::from_json(r#"{"kind": "q_learning", "learning_rate": 0.5}"#).unwrap();
    let learner: EnumLearner<i32, i32> = config.build().unwrap();
    assert!(matches!(learner, EnumLearner::QLearner(_)));

    let invalid = LearnerConfig::from_json(r#"{"kind": "mlmdp", "discount_factor": 2.0}"#).unwrap();
    assert!(matches!(
        invalid.build::<i32, i32>(),
        Err(Error::InvalidConfiguration { .. })
    ));
}

#[test]
fn qlearner_does_not_converge() {
    let mut learner = build(&LearnerConfig::QLearning(QLearnerConfig::default()));
    learner.fit(episode().into()).unwrap();
    match learner.converge(&Default::default()) {
        Err(Error::NotImplemented { learner, operation }) => {
            assert!(learner.contains("QLearner"));
            assert_eq!(operation, "converge");
        }
        other => panic!("unexpected result {:?}", other.map(|_| ())),
    }
}
