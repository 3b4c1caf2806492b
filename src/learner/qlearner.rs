use serde::{Deserialize, Serialize};

use crate::config::{QLearnerConfig, Schedule};
use crate::error::Result;
use crate::transition::Transition;

use super::{Key, Learner, LearnerCore};

/// One-step, off-policy Q-learning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QLearner<S: Key, A: Key> {
    core: LearnerCore<S, A>,
}

impl<S: Key, A: Key> QLearner<S, A> {
    pub fn new(config: QLearnerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            core: LearnerCore::new(
                config.discount_factor,
                config.learning_rate,
                Schedule::Exponential,
            ),
        })
    }
}

impl<S: Key, A: Key> Learner<S, A> for QLearner<S, A> {
    fn core(&self) -> &LearnerCore<S, A> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LearnerCore<S, A> {
        &mut self.core
    }

    fn learn(&mut self, prev_state: S, transition: &Transition<S, A>) -> Result<()> {
        let future = self.core.values().max_value(&transition.state);
        let target = transition.reward + self.core.discount_factor() * future;
        let rate = self.core.learning_rate();
        self.core
            .values_mut()
            .blend(prev_state, transition.action.clone(), target, rate);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;

    #[test]
    fn blends_toward_one_step_target() {
        let mut learner: QLearner<i32, i32> = QLearner::new(QLearnerConfig {
            discount_factor: 0.5,
            learning_rate: 0.5,
        })
        .unwrap();
        learner.core_mut().values_mut().set(1, 1, 4.0);
        learner.fit(vec![(0, 0, 0.0), (1, 0, 1.0)].into()).unwrap();
        // 0.5 * 0 + 0.5 * (1 + 0.5 * 4)
        assert_float_eq!(learner.val(&0, &0), 1.5, abs <= 1e-12);
        assert_float_eq!(learner.learning_rate(), 0.5, abs <= 0.0);
    }

    #[test]
    fn learning_rate_decays_per_episode() {
        let mut learner: QLearner<i32, i32> = QLearner::new(QLearnerConfig::default()).unwrap();
        for _ in 0..3 {
            learner.fit(vec![(0, 0, 0.0), (1, 0, 1.0)].into()).unwrap();
        }
        assert_eq!(learner.episode(), 3);
        assert_float_eq!(learner.learning_rate(), 0.008, abs <= 1e-12);
    }
}
