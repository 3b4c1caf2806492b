mod epsilon_greedy;
mod rmax;

pub use epsilon_greedy::{default_epsilon, EpsilonGreedyStrategy};
pub use rmax::{default_confidence, RMaxStrategy, VisitCounter};

use std::marker::PhantomData;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::ConvergeBudget;
use crate::error::{Error, Result};
use crate::learner::{Key, Learner};
use crate::transition::Fit;
use crate::utils::greedy_choice;

/// Decides which action to take, wrapping exactly one learner.
pub trait Strategy<S: Key, A: Key> {
    /// Candidates come from `valid_actions` when given and non-empty, then from the actions the
    /// strategy was configured with, then from every action the learner has observed.
    fn policy(&mut self, state: &S, valid_actions: Option<&[A]>) -> Result<A>;

    fn fit(&mut self, input: Fit<S, A>) -> Result<()>;

    fn init_episode(&mut self);

    fn converge(&mut self, budget: &ConvergeBudget) -> Result<()>;
}

/// Picks the best valued action, breaking near ties uniformly at random.
#[derive(Debug, Clone)]
pub struct GreedyStrategy<S: Key, A: Key, L: Learner<S, A>> {
    learner: L,
    valid_actions: Vec<A>,
    rng: StdRng,
    _state: PhantomData<S>,
}

impl<S: Key, A: Key, L: Learner<S, A>> GreedyStrategy<S, A, L> {
    pub fn new(learner: L) -> Self {
        Self {
            learner,
            valid_actions: Vec::new(),
            rng: StdRng::from_entropy(),
            _state: PhantomData,
        }
    }

    pub fn with_valid_actions(mut self, valid_actions: Vec<A>) -> Self {
        self.valid_actions = valid_actions;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn learner(&self) -> &L {
        &self.learner
    }

    pub fn learner_mut(&mut self) -> &mut L {
        &mut self.learner
    }

    pub fn into_learner(self) -> L {
        self.learner
    }

    pub fn candidates(&self, valid_actions: Option<&[A]>) -> Vec<A> {
        match valid_actions {
            Some(actions) if !actions.is_empty() => actions.to_vec(),
            _ if !self.valid_actions.is_empty() => self.valid_actions.clone(),
            _ => self.learner.actions().iter().cloned().collect(),
        }
    }

    pub(crate) fn values(&self, state: &S, candidates: &[A]) -> Vec<f64> {
        candidates
            .iter()
            .map(|action| self.learner.val(state, action))
            .collect()
    }

    pub(crate) fn choose(&mut self, state: &S, candidates: &[A], values: &[f64]) -> Result<A> {
        greedy_choice(candidates, values, &mut self.rng).ok_or_else(|| no_actions(state))
    }

    pub(crate) fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

impl<S: Key, A: Key, L: Learner<S, A>> Strategy<S, A> for GreedyStrategy<S, A, L> {
    fn policy(&mut self, state: &S, valid_actions: Option<&[A]>) -> Result<A> {
        let candidates = self.candidates(valid_actions);
        let values = self.values(state, &candidates);
        self.choose(state, &candidates, &values)
    }

    fn fit(&mut self, input: Fit<S, A>) -> Result<()> {
        self.learner.fit(input)
    }

    fn init_episode(&mut self) {
        self.learner.init_episode();
    }

    fn converge(&mut self, budget: &ConvergeBudget) -> Result<()> {
        self.learner.converge(budget)
    }
}

pub(crate) fn no_actions<S: Key>(state: &S) -> Error {
    Error::NoActions {
        state: format!("{:?}", state),
    }
}
