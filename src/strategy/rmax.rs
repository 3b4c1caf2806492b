use std::fmt::Debug;
use std::rc::Rc;

use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ConvergeBudget, MlmdpConfig, Schedule};
use crate::error::Result;
use crate::learner::{Key, Learner, LearnerCore, Mlmdp};
use crate::transition::{Fit, Observation, Transition};

use super::{no_actions, GreedyStrategy, Strategy};

const CONFIDENCE_TOLERANCE: f64 = 1e-3;

/// `1 - 1 / sqrt(max(1, count))`
pub fn default_confidence(count: u64) -> f64 {
    1.0 - 1.0 / (count.max(1) as f64).sqrt()
}

/// Learner that only counts how often each `(state, action)` pair was left.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitCounter<S: Key, A: Key> {
    core: LearnerCore<S, A>,
    counts: FxHashMap<(S, A), u64>,
}

impl<S: Key, A: Key> Default for VisitCounter<S, A> {
    fn default() -> Self {
        Self {
            core: LearnerCore::new(1.0, 1.0, Schedule::Constant),
            counts: FxHashMap::default(),
        }
    }
}

impl<S: Key, A: Key> VisitCounter<S, A> {
    pub fn count(&self, state: &S, action: &A) -> u64 {
        self.counts
            .get(&(state.clone(), action.clone()))
            .copied()
            .unwrap_or(0)
    }
}

impl<S: Key, A: Key> Learner<S, A> for VisitCounter<S, A> {
    fn core(&self) -> &LearnerCore<S, A> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LearnerCore<S, A> {
        &mut self.core
    }

    fn learn(&mut self, prev_state: S, transition: &Transition<S, A>) -> Result<()> {
        *self
            .counts
            .entry((prev_state, transition.action.clone()))
            .or_insert(0) += 1;
        Ok(())
    }
}

/// Optimism under uncertainty.
///
/// Each decision feeds a copy of the surrogate model one optimistic self-loop per poorly visited
/// pair, rewarded `(1 - confidence) * max_reward_seen`, solves it and acts greedily on the
/// result. The copy is discarded afterwards so only observed transitions accumulate.
#[derive(Clone)]
pub struct RMaxStrategy<S: Key, A: Key, L: Learner<S, A>> {
    greedy: GreedyStrategy<S, A, L>,
    visits: VisitCounter<S, A>,
    surrogate: Mlmdp<S, A>,
    confidence: Rc<dyn Fn(u64) -> f64>,
    max_reward_seen: f64,
    budget: ConvergeBudget,
}

impl<S: Key, A: Key, L: Learner<S, A> + Debug> Debug for RMaxStrategy<S, A, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RMaxStrategy")
            .field("greedy", &self.greedy)
            .field("visits", &self.visits)
            .field("surrogate", &self.surrogate)
            .field("max_reward_seen", &self.max_reward_seen)
            .field("budget", &self.budget)
            .finish()
    }
}

impl<S: Key, A: Key, L: Learner<S, A>> RMaxStrategy<S, A, L> {
    pub fn new(learner: L) -> Result<Self> {
        let surrogate = Mlmdp::new(MlmdpConfig {
            normalize_count: Some(0),
            ..MlmdpConfig::default()
        })?;
        Ok(Self {
            greedy: GreedyStrategy::new(learner),
            visits: VisitCounter::default(),
            surrogate,
            confidence: Rc::new(default_confidence),
            max_reward_seen: 0.0,
            budget: ConvergeBudget::default(),
        })
    }

    pub fn with_confidence(mut self, confidence: Rc<dyn Fn(u64) -> f64>) -> Self {
        self.confidence = confidence;
        self
    }

    /// Budget of the per-decision solve.
    pub fn with_budget(mut self, budget: ConvergeBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_valid_actions(mut self, valid_actions: Vec<A>) -> Self {
        self.greedy = self.greedy.with_valid_actions(valid_actions);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.greedy = self.greedy.with_seed(seed);
        self
    }

    pub fn learner(&self) -> &L {
        self.greedy.learner()
    }

    pub fn visits(&self) -> &VisitCounter<S, A> {
        &self.visits
    }

    pub fn surrogate(&self) -> &Mlmdp<S, A> {
        &self.surrogate
    }

    pub fn max_reward_seen(&self) -> f64 {
        self.max_reward_seen
    }

    pub fn confidence(&self, state: &S, action: &A) -> f64 {
        (self.confidence)(self.visits.count(state, action))
    }

    /// Values of `candidates` under the optimistic model, `None` when every pair is trusted.
    fn optimistic_values(&mut self, state: &S, candidates: &[A]) -> Result<Option<Vec<f64>>> {
        let pairs: Vec<(S, A)> = self
            .surrogate
            .states()
            .iter()
            .flat_map(|s| {
                self.surrogate
                    .actions()
                    .iter()
                    .map(move |a| (s.clone(), a.clone()))
            })
            .collect();
        let mut injections = 0;
        for (s, a) in pairs {
            let confidence = self.confidence(&s, &a);
            if confidence < 1.0 - CONFIDENCE_TOLERANCE {
                let bonus = (1.0 - confidence) * self.max_reward_seen;
                self.surrogate
                    .learn(s.clone(), &Transition::new(s, a, bonus))?;
                injections += 1;
            }
        }
        debug!(injections, "optimistic samples injected");
        if injections == 0 {
            return Ok(None);
        }
        self.surrogate.converge(&self.budget)?;
        Ok(Some(
            candidates
                .iter()
                .map(|action| self.surrogate.val(state, action))
                .collect(),
        ))
    }
}

impl<S: Key, A: Key, L: Learner<S, A>> Strategy<S, A> for RMaxStrategy<S, A, L> {
    fn policy(&mut self, state: &S, valid_actions: Option<&[A]>) -> Result<A> {
        let candidates = self.greedy.candidates(valid_actions);
        match candidates.as_slice() {
            [] => return Err(no_actions(state)),
            [only] => return Ok(only.clone()),
            _ => {}
        }
        let saved = self.surrogate.clone();
        let optimistic = self.optimistic_values(state, &candidates);
        self.surrogate = saved;
        let values = match optimistic? {
            Some(values) => values,
            None => self.greedy.values(state, &candidates),
        };
        self.greedy.choose(state, &candidates, &values)
    }

    fn fit(&mut self, input: Fit<S, A>) -> Result<()> {
        input.validate()?;
        let best = match &input {
            Fit::Step(transition) => transition.reward,
            Fit::Episode(transitions) => transitions
                .iter()
                .map(|t| t.reward)
                .fold(f64::NEG_INFINITY, f64::max),
            Fit::Stream(observations) => observations
                .iter()
                .filter_map(|observation| match observation {
                    Observation::Transition(t) => Some(t.reward),
                    Observation::Boundary => None,
                })
                .fold(f64::NEG_INFINITY, f64::max),
        };
        self.max_reward_seen = self.max_reward_seen.max(best);
        self.visits.fit(input.clone())?;
        self.greedy.fit(input.clone())?;
        self.surrogate.fit(input)
    }

    fn init_episode(&mut self) {
        self.visits.init_episode();
        self.greedy.init_episode();
        self.surrogate.init_episode();
    }

    fn converge(&mut self, budget: &ConvergeBudget) -> Result<()> {
        self.greedy.converge(budget)
    }
}
