use std::time::Instant;

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ConvergeBudget, TemporalDifferenceConfig};
use crate::error::{Error, Result};
use crate::transition::Transition;
use crate::utils::squared_diff;

use super::{Key, Learner, LearnerCore};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TraceRecord<S, A> {
    prev_state: S,
    action: A,
    reward: f64,
    state: S,
    eligibility: f64,
}

/// TD(lambda) with accumulating eligibility traces.
///
/// Every learned step is stored in the episode it belongs to, which lets `converge` replay the
/// whole history. Bootstrap targets are read from a copy of the table taken when the episode
/// opened, the error baseline from the live table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalDifferenceLearner<S: Key, A: Key> {
    core: LearnerCore<S, A>,
    lambda: f64,
    episodes: Vec<Vec<TraceRecord<S, A>>>,
    prev_values: FxHashMap<(S, A), f64>,
}

impl<S: Key, A: Key> TemporalDifferenceLearner<S, A> {
    pub fn new(config: TemporalDifferenceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            core: LearnerCore::new(
                config.discount_factor,
                config.learning_rate,
                config.schedule,
            ),
            lambda: config.lambda,
            episodes: Vec::new(),
            prev_values: FxHashMap::default(),
        })
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Number of stored episodes, the open one included.
    pub fn stored_episodes(&self) -> usize {
        self.episodes.len()
    }

    pub fn stored_steps(&self) -> usize {
        self.episodes.iter().map(Vec::len).sum()
    }

    fn update(&mut self, prev_state: S, action: A, reward: f64, state: S) {
        let gamma = self.core.discount_factor();
        let baseline = self.core.values().max_value(&prev_state);
        let target = self
            .prev_values
            .get(&(state.clone(), action.clone()))
            .copied()
            .unwrap_or(0.0);
        let step = self.core.learning_rate() * (reward + gamma * target - baseline);
        let decay = gamma * self.lambda;

        if self.episodes.is_empty() {
            self.episodes.push(Vec::new());
        }
        let Some(records) = self.episodes.last_mut() else {
            return;
        };
        records.push(TraceRecord {
            prev_state,
            action,
            reward,
            state,
            eligibility: 1.0,
        });
        let values = self.core.values_mut();
        for record in records.iter_mut() {
            values.add(
                record.prev_state.clone(),
                record.action.clone(),
                step * record.eligibility,
            );
            record.eligibility *= decay;
        }
    }

    fn replay(&mut self, budget: &ConvergeBudget) -> Result<()> {
        let started = Instant::now();
        let history: Vec<Vec<TraceRecord<S, A>>> = self
            .episodes
            .iter()
            .filter(|records| !records.is_empty())
            .cloned()
            .collect();
        let mut diff = f64::INFINITY;
        for iteration in 1..=budget.max_iter {
            let before = self.core.values().snapshot();
            for records in &history {
                self.core.advance_episode();
                self.episodes.push(Vec::new());
                self.prev_values = self.core.values().snapshot();
                for record in records {
                    self.update(
                        record.prev_state.clone(),
                        record.action.clone(),
                        record.reward,
                        record.state.clone(),
                    );
                }
                self.episodes.pop();
            }
            diff = squared_diff(&before, &self.core.values().snapshot());
            debug!(iteration, diff, "temporal difference replay pass");
            if diff < budget.atol {
                return Ok(());
            }
            if let Some(max_time) = budget.max_time {
                if started.elapsed() >= max_time {
                    return Err(Error::NotConverged {
                        iterations: iteration,
                        elapsed: started.elapsed(),
                        diff,
                    });
                }
            }
        }
        Err(Error::NotConverged {
            iterations: budget.max_iter,
            elapsed: started.elapsed(),
            diff,
        })
    }
}

impl<S: Key, A: Key> Learner<S, A> for TemporalDifferenceLearner<S, A> {
    fn core(&self) -> &LearnerCore<S, A> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LearnerCore<S, A> {
        &mut self.core
    }

    fn learn(&mut self, prev_state: S, transition: &Transition<S, A>) -> Result<()> {
        self.update(
            prev_state,
            transition.action.clone(),
            transition.reward,
            transition.state.clone(),
        );
        Ok(())
    }

    fn open_episode(&mut self) {
        self.episodes.push(Vec::new());
        self.prev_values = self.core.values().snapshot();
    }

    /// Replays every stored episode until a full pass changes the table by less than
    /// `budget.atol` (sum of squared differences).
    fn converge(&mut self, budget: &ConvergeBudget) -> Result<()> {
        let saved = std::mem::take(&mut self.prev_values);
        let result = self.replay(budget);
        self.prev_values = saved;
        result
    }
}
