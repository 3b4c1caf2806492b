use std::time::Instant;

use fxhash::FxHashMap;
use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{ConvergeBudget, MlmdpConfig, Schedule};
use crate::error::{Error, Result};
use crate::transition::Transition;

use super::{Key, KeySet, Learner, LearnerCore};

const ROW_TOLERANCE: f64 = 1e-9;

/// Maximum likelihood model of the environment, indexed `[action, state, next_state]` by the
/// insertion order of `states` and `actions`.
#[derive(Debug, Clone)]
pub struct Estimate<S: Key, A: Key> {
    pub states: KeySet<S>,
    pub actions: KeySet<A>,
    pub transitions: Array3<f64>,
    pub rewards: Array3<f64>,
}

impl<S: Key, A: Key> Estimate<S, A> {
    fn index(&self, state: &S, action: &A, next_state: &S) -> Option<[usize; 3]> {
        Some([
            self.actions.get_index_of(action)?,
            self.states.get_index_of(state)?,
            self.states.get_index_of(next_state)?,
        ])
    }

    pub fn transition(&self, state: &S, action: &A, next_state: &S) -> f64 {
        self.index(state, action, next_state)
            .map_or(0.0, |index| self.transitions[index])
    }

    pub fn reward(&self, state: &S, action: &A, next_state: &S) -> f64 {
        self.index(state, action, next_state)
            .map_or(0.0, |index| self.rewards[index])
    }
}

enum Compression<S, A> {
    Transitions((S, A), FxHashMap<S, f64>),
    Rewards((S, A, S), f64),
}

/// Builds an explicit MDP from the observed transitions and solves it by value iteration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mlmdp<S: Key, A: Key> {
    core: LearnerCore<S, A>,
    normalize_count: u64,
    anneal: bool,
    max_history_len: usize,
    transition_count: FxHashMap<(S, A, S), u64>,
    transition_history: FxHashMap<(S, A), Vec<S>>,
    reward_history: FxHashMap<(S, A, S), Vec<f64>>,
    transition_prior: FxHashMap<(S, A), FxHashMap<S, f64>>,
    reward_prior: FxHashMap<(S, A, S), f64>,
}

impl<S: Key, A: Key> Mlmdp<S, A> {
    pub fn new(config: MlmdpConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            core: LearnerCore::new(
                config.discount_factor,
                config.learning_rate,
                Schedule::Exponential,
            ),
            normalize_count: config.normalize_count.unwrap_or(1),
            anneal: config.normalize_count.is_none(),
            max_history_len: config.max_history_len,
            transition_count: FxHashMap::default(),
            transition_history: FxHashMap::default(),
            reward_history: FxHashMap::default(),
            transition_prior: FxHashMap::default(),
            reward_prior: FxHashMap::default(),
        })
    }

    /// Current re-solve threshold, 0 when automatic solving is off.
    pub fn normalize_count(&self) -> u64 {
        self.normalize_count
    }

    /// Raw successor history kept for `(state, action)`.
    pub fn history_len(&self, state: &S, action: &A) -> usize {
        self.transition_history
            .get(&(state.clone(), action.clone()))
            .map_or(0, Vec::len)
    }

    pub fn has_prior(&self, state: &S, action: &A) -> bool {
        self.transition_prior
            .contains_key(&(state.clone(), action.clone()))
    }

    /// Total number of raw transitions held in the history.
    pub fn sample_count(&self) -> usize {
        self.transition_history.values().map(Vec::len).sum()
    }

    /// Normalized model from the current history and priors.
    pub fn estimate(&self) -> Estimate<S, A> {
        self.model().0
    }

    fn model(&self) -> (Estimate<S, A>, Vec<Compression<S, A>>) {
        let states = self.core.values().states().clone();
        let actions = self.core.values().actions().clone();
        let shape = (actions.len(), states.len(), states.len());
        let mut estimate = Estimate {
            states,
            actions,
            transitions: Array3::zeros(shape),
            rewards: Array3::zeros(shape),
        };
        let mut compressions = Vec::new();
        let rate = self.core.learning_rate();
        let cap = self.max_history_len;

        for (key, history) in &self.transition_history {
            let share = 1.0 / history.len() as f64;
            let mut row: FxHashMap<S, f64> = FxHashMap::default();
            for next_state in history {
                *row.entry(next_state.clone()).or_insert(0.0) += share;
            }
            if let Some(prior) = self.transition_prior.get(key) {
                for next_state in prior.keys() {
                    row.entry(next_state.clone()).or_insert(0.0);
                }
                for (next_state, probability) in row.iter_mut() {
                    let old = prior.get(next_state).copied().unwrap_or(0.0);
                    *probability = *probability * rate + old * (1.0 - rate);
                }
            }
            for (next_state, probability) in &row {
                if let Some(index) = estimate.index(&key.0, &key.1, next_state) {
                    estimate.transitions[index] = *probability;
                }
            }
            if cap > 0 && history.len() > cap {
                compressions.push(Compression::Transitions(key.clone(), row));
            }
        }
        for (key, prior) in &self.transition_prior {
            if self.transition_history.contains_key(key) {
                continue;
            }
            for (next_state, probability) in prior {
                if let Some(index) = estimate.index(&key.0, &key.1, next_state) {
                    estimate.transitions[index] = *probability;
                }
            }
        }

        for (key, rewards) in &self.reward_history {
            let mut mean = rewards.iter().sum::<f64>() / rewards.len() as f64;
            if let Some(prior) = self.reward_prior.get(key) {
                mean = mean * rate + prior * (1.0 - rate);
            }
            if let Some(index) = estimate.index(&key.0, &key.1, &key.2) {
                estimate.rewards[index] = mean;
            }
            if cap > 0 && rewards.len() > cap {
                compressions.push(Compression::Rewards(key.clone(), mean));
            }
        }
        for (key, prior) in &self.reward_prior {
            if self.reward_history.contains_key(key) {
                continue;
            }
            if let Some(index) = estimate.index(&key.0, &key.1, &key.2) {
                estimate.rewards[index] = *prior;
            }
        }

        let width = estimate.states.len() as f64;
        for mut row in estimate.transitions.lanes_mut(Axis(2)) {
            let total = row.sum();
            if total < 1.0 - ROW_TOLERANCE {
                let shortfall = (1.0 - total) / width;
                row.mapv_inplace(|probability| probability + shortfall);
            } else if total > 1.0 + ROW_TOLERANCE {
                row.mapv_inplace(|probability| probability / total);
            }
        }
        (estimate, compressions)
    }

    fn compress(&mut self, compressions: Vec<Compression<S, A>>) {
        for compression in compressions {
            match compression {
                Compression::Transitions(key, row) => {
                    debug!(state = ?key.0, action = ?key.1, "folding transition history into prior");
                    self.transition_history.remove(&key);
                    self.transition_prior.insert(key, row);
                }
                Compression::Rewards(key, mean) => {
                    self.reward_history.remove(&key);
                    self.reward_prior.insert(key, mean);
                }
            }
        }
    }

    /// `V[a, s] = sum_s' T[a, s, s'] * R[a, s, s'] + gamma * sum_s' T[a, s, s'] * V[a, s']`
    ///
    /// When the budget runs out the last iterate is returned next to the error.
    fn value_iteration(
        &self,
        estimate: &Estimate<S, A>,
        budget: &ConvergeBudget,
    ) -> std::result::Result<Array2<f64>, (Array2<f64>, Error)> {
        let started = Instant::now();
        let gamma = self.core.discount_factor();
        let transitions = &estimate.transitions;
        let expected = (transitions * &estimate.rewards).sum_axis(Axis(2));
        let mut values = Array2::<f64>::zeros(expected.dim());
        let mut diff = f64::INFINITY;
        for iteration in 1..=budget.max_iter {
            let mut next = expected.clone();
            for (action, mut row) in next.outer_iter_mut().enumerate() {
                let future = transitions
                    .index_axis(Axis(0), action)
                    .dot(&values.row(action));
                row.scaled_add(gamma, &future);
            }
            diff = (&next - &values).mapv(|d| d * d).mean().unwrap_or(0.0);
            values = next;
            if diff < budget.atol {
                debug!(iteration, diff, elapsed = ?started.elapsed(), "value iteration converged");
                return Ok(values);
            }
            if let Some(max_time) = budget.max_time {
                if started.elapsed() >= max_time {
                    let err = Error::NotConverged {
                        iterations: iteration,
                        elapsed: started.elapsed(),
                        diff,
                    };
                    return Err((values, err));
                }
            }
        }
        let err = Error::NotConverged {
            iterations: budget.max_iter,
            elapsed: started.elapsed(),
            diff,
        };
        Err((values, err))
    }

    /// Re-estimates the model and overwrites the value of every known state and action. With
    /// `keep_last_iterate` an exhausted budget still writes the last iterate, otherwise the value
    /// table is left untouched and the error returned.
    fn solve(&mut self, budget: &ConvergeBudget, keep_last_iterate: bool) -> Result<()> {
        let (estimate, compressions) = self.model();
        self.compress(compressions);
        let values = match self.value_iteration(&estimate, budget) {
            Ok(values) => values,
            Err((values, err)) if keep_last_iterate => {
                warn!(%err, "keeping last iterate of automatic re-solve");
                values
            }
            Err((_, err)) => {
                warn!(%err, "model did not converge");
                return Err(err);
            }
        };
        let table = self.core.values_mut();
        for (action_index, action) in estimate.actions.iter().enumerate() {
            for (state_index, state) in estimate.states.iter().enumerate() {
                table.set(
                    state.clone(),
                    action.clone(),
                    values[[action_index, state_index]],
                );
            }
        }
        Ok(())
    }
}

impl<S: Key, A: Key> Learner<S, A> for Mlmdp<S, A> {
    fn core(&self) -> &LearnerCore<S, A> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LearnerCore<S, A> {
        &mut self.core
    }

    fn learn(&mut self, prev_state: S, transition: &Transition<S, A>) -> Result<()> {
        let Transition {
            state,
            action,
            reward,
        } = transition;
        let pair = (prev_state.clone(), action.clone());
        let triple = (prev_state, action.clone(), state.clone());
        self.transition_history
            .entry(pair)
            .or_default()
            .push(state.clone());
        self.reward_history
            .entry(triple.clone())
            .or_default()
            .push(*reward);
        let count = self.transition_count.entry(triple).or_insert(0);
        *count += 1;

        if self.normalize_count > 0 && *count >= self.normalize_count {
            debug!(threshold = self.normalize_count, "re-solving model");
            self.transition_count.clear();
            if self.anneal {
                self.normalize_count *= 2;
            }
            self.solve(&ConvergeBudget::default(), true)?;
        }
        Ok(())
    }

    /// Solves the model with `budget`. The value table is left untouched when value iteration
    /// does not converge.
    fn converge(&mut self, budget: &ConvergeBudget) -> Result<()> {
        self.solve(budget, false)
    }
}
