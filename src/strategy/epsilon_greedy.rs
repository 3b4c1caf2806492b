use std::fmt::Debug;
use std::rc::Rc;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::config::ConvergeBudget;
use crate::error::Result;
use crate::learner::{Key, Learner};
use crate::transition::Fit;

use super::{no_actions, GreedyStrategy, Strategy};

/// `0.2 / (1 + t / 1000)`
pub fn default_epsilon(episode: u64) -> f64 {
    0.2 / (1.0 + episode as f64 / 1000.0)
}

/// Explores uniformly with probability `epsilon(t)`, `t` being the learner's episode counter,
/// and acts greedily otherwise.
#[derive(Clone)]
pub struct EpsilonGreedyStrategy<S: Key, A: Key, L: Learner<S, A>> {
    greedy: GreedyStrategy<S, A, L>,
    epsilon: Rc<dyn Fn(u64) -> f64>,
}

impl<S: Key, A: Key, L: Learner<S, A> + Debug> Debug for EpsilonGreedyStrategy<S, A, L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpsilonGreedyStrategy")
            .field("greedy", &self.greedy)
            .field("epsilon", &self.epsilon())
            .finish()
    }
}

impl<S: Key, A: Key, L: Learner<S, A>> EpsilonGreedyStrategy<S, A, L> {
    pub fn new(learner: L) -> Self {
        Self {
            greedy: GreedyStrategy::new(learner),
            epsilon: Rc::new(default_epsilon),
        }
    }

    pub fn with_epsilon(mut self, epsilon: Rc<dyn Fn(u64) -> f64>) -> Self {
        self.epsilon = epsilon;
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

    /// Exploration probability at the learner's current episode.
    pub fn epsilon(&self) -> f64 {
        (self.epsilon)(self.greedy.learner().episode())
    }

    pub fn learner(&self) -> &L {
        self.greedy.learner()
    }

    pub fn learner_mut(&mut self) -> &mut L {
        self.greedy.learner_mut()
    }
}

impl<S: Key, A: Key, L: Learner<S, A>> Strategy<S, A> for EpsilonGreedyStrategy<S, A, L> {
    fn policy(&mut self, state: &S, valid_actions: Option<&[A]>) -> Result<A> {
        let candidates = self.greedy.candidates(valid_actions);
        let epsilon = self.epsilon();
        let rng = self.greedy.rng();
        if rng.gen::<f64>() < epsilon {
            return candidates
                .choose(rng)
                .cloned()
                .ok_or_else(|| no_actions(state));
        }
        let values = self.greedy.values(state, &candidates);
        self.greedy.choose(state, &candidates, &values)
    }

    fn fit(&mut self, input: Fit<S, A>) -> Result<()> {
        self.greedy.fit(input)
    }

    fn init_episode(&mut self) {
        self.greedy.init_episode();
    }

    fn converge(&mut self, budget: &ConvergeBudget) -> Result<()> {
        self.greedy.converge(budget)
    }
}
