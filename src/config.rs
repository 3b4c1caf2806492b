use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::learner::{EnumLearner, Key, Mlmdp, QLearner, TemporalDifferenceLearner};

/// How the learning rate evolves with the episode counter `t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    /// `lr0 ^ t`
    #[default]
    Exponential,
    /// `lr0 / t`
    Harmonic,
    /// `lr0`
    Constant,
}

impl Schedule {
    pub fn rate(&self, initial: f64, episode: u64) -> f64 {
        match self {
            Schedule::Exponential => initial.powf(episode as f64),
            Schedule::Harmonic => initial / episode.max(1) as f64,
            Schedule::Constant => initial,
        }
    }
}

/// Stopping rule for `converge`. A `max_time` of `None` puts no limit on wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergeBudget {
    pub atol: f64,
    pub max_iter: usize,
    pub max_time: Option<Duration>,
}

impl Default for ConvergeBudget {
    fn default() -> Self {
        Self {
            atol: 1e-3,
            max_iter: 1000,
            max_time: None,
        }
    }
}

impl ConvergeBudget {
    pub fn new(atol: f64, max_iter: usize, max_time: Option<Duration>) -> Self {
        Self {
            atol,
            max_iter,
            max_time,
        }
    }

    pub fn with_atol(mut self, atol: f64) -> Self {
        self.atol = atol;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalDifferenceConfig {
    pub lambda: f64,
    pub discount_factor: f64,
    pub learning_rate: f64,
    pub schedule: Schedule,
}

impl Default for TemporalDifferenceConfig {
    fn default() -> Self {
        Self {
            lambda: 0.6,
            discount_factor: 1.0,
            learning_rate: 1.0,
            schedule: Schedule::Harmonic,
        }
    }
}

impl TemporalDifferenceConfig {
    pub fn validate(&self) -> Result<()> {
        unit_interval("lambda", self.lambda)?;
        unit_interval("discount_factor", self.discount_factor)?;
        unit_interval("learning_rate", self.learning_rate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlmdpConfig {
    pub discount_factor: f64,
    pub learning_rate: f64,
    /// `None` re-solves after the first repeated transition and doubles the threshold each time,
    /// `Some(0)` never re-solves automatically.
    pub normalize_count: Option<u64>,
    /// Raw history longer than this is folded into a prior. 0 keeps all history.
    pub max_history_len: usize,
}

impl Default for MlmdpConfig {
    fn default() -> Self {
        Self {
            discount_factor: 0.86,
            learning_rate: 0.99,
            normalize_count: None,
            max_history_len: 0,
        }
    }
}

impl MlmdpConfig {
    pub fn validate(&self) -> Result<()> {
        unit_interval("discount_factor", self.discount_factor)?;
        unit_interval("learning_rate", self.learning_rate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QLearnerConfig {
    pub discount_factor: f64,
    pub learning_rate: f64,
}

impl Default for QLearnerConfig {
    fn default() -> Self {
        Self {
            discount_factor: 0.9,
            learning_rate: 0.2,
        }
    }
}

impl QLearnerConfig {
    pub fn validate(&self) -> Result<()> {
        unit_interval("discount_factor", self.discount_factor)?;
        unit_interval("learning_rate", self.learning_rate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueFunctionApproximationConfig {
    /// Number of weights kept per action.
    pub dof: usize,
    pub discount_factor: f64,
    pub learning_rate: f64,
}

impl Default for ValueFunctionApproximationConfig {
    fn default() -> Self {
        Self {
            dof: 1,
            discount_factor: 0.75,
            learning_rate: 0.9,
        }
    }
}

impl ValueFunctionApproximationConfig {
    pub fn with_dof(dof: usize) -> Self {
        Self {
            dof,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.dof == 0 {
            return Err(Error::InvalidConfiguration {
                message: "dof must be at least 1".to_string(),
            });
        }
        unit_interval("discount_factor", self.discount_factor)?;
        unit_interval("learning_rate", self.learning_rate)
    }
}

/// Serialized choice of tabular learner, e.g. `{"kind": "mlmdp", "discount_factor": 0.9}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LearnerConfig {
    TemporalDifference(TemporalDifferenceConfig),
    Mlmdp(MlmdpConfig),
    QLearning(QLearnerConfig),
}

impl LearnerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn build<S: Key, A: Key>(&self) -> Result<EnumLearner<S, A>> {
        Ok(match self {
            LearnerConfig::TemporalDifference(config) => {
                TemporalDifferenceLearner::new(*config)?.into()
            }
            LearnerConfig::Mlmdp(config) => Mlmdp::new(*config)?.into(),
            LearnerConfig::QLearning(config) => QLearner::new(*config)?.into(),
        })
    }
}

fn unit_interval(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidConfiguration {
            message: format!("{} must be within [0, 1], got {}", name, value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;
    use rstest::rstest;

    #[rstest]
    #[case(Schedule::Exponential, 0.5, 3, 0.125)]
    #[case(Schedule::Harmonic, 1.0, 4, 0.25)]
    #[case(Schedule::Harmonic, 1.0, 0, 1.0)]
    #[case(Schedule::Constant, 0.3, 10, 0.3)]
    fn schedule_rates(
        #[case] schedule: Schedule,
        #[case] initial: f64,
        #[case] episode: u64,
        #[case] expected: f64,
    ) {
        assert_float_eq!(schedule.rate(initial, episode), expected, abs <= 1e-12);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = LearnerConfig::from_json(r#"{"kind": "mlmdp", "discount_factor": 0.5}"#)
            .unwrap();
        assert_eq!(
            config,
            LearnerConfig::Mlmdp(MlmdpConfig {
                discount_factor: 0.5,
                ..MlmdpConfig::default()
            })
        );
    }

    #[test]
    fn schedule_is_snake_case() {
        let config = LearnerConfig::from_json(
            r#"{"kind": "temporal_difference", "lambda": 0.0, "schedule": "constant"}"#,
        )
        .unwrap();
        match config {
            LearnerConfig::TemporalDifference(td) => {
                assert_eq!(td.schedule, Schedule::Constant);
                assert_float_eq!(td.lambda, 0.0, abs <= 0.0);
            }
            other => panic!("unexpected config {:?}", other),
        }
    }

    #[test]
    fn unknown_kind_fails_to_parse() {
        let err = LearnerConfig::from_json(r#"{"kind": "sarsa"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let config = TemporalDifferenceConfig {
            lambda: 1.5,
            ..TemporalDifferenceConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfiguration { .. })
        ));
        assert!(ValueFunctionApproximationConfig::with_dof(0).validate().is_err());
        assert!(QLearnerConfig::default().validate().is_ok());
    }

    #[test]
    fn budget_builders() {
        let budget = ConvergeBudget::default()
            .with_atol(1e-6)
            .with_max_iter(10)
            .with_max_time(Duration::from_secs(2));
        assert_eq!(budget.max_iter, 10);
        assert_eq!(budget.max_time, Some(Duration::from_secs(2)));
        assert_float_eq!(budget.atol, 1e-6, abs <= 0.0);
    }
}
