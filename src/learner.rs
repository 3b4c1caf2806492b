mod mlmdp;
mod qlearner;
mod temporal_difference;
mod value_function_approximation;
mod value_table;

pub use mlmdp::{Estimate, Mlmdp};
pub use qlearner::QLearner;
pub use temporal_difference::TemporalDifferenceLearner;
pub use value_function_approximation::{
    Features, LinearCombination, ValueFunction, ValueFunctionApproximation,
};
pub use value_table::ValueTable;

use std::fmt::Debug;
use std::hash::Hash;

use enum_dispatch::enum_dispatch;
use fxhash::FxBuildHasher;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::config::{ConvergeBudget, Schedule};
use crate::error::{Error, Result};
use crate::transition::{Fit, Observation, Transition};

/// Anything usable as a state or an action.
pub trait Key: Hash + Eq + Clone + Debug {}

impl<T: Hash + Eq + Clone + Debug> Key for T {}

/// Insertion ordered set; the order doubles as a dense index.
pub type KeySet<T> = IndexSet<T, FxBuildHasher>;

/// State shared by every learner: the value table plus the episode and learning rate bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerCore<S: Key, A: Key> {
    values: ValueTable<S, A>,
    discount_factor: f64,
    initial_learning_rate: f64,
    learning_rate: f64,
    schedule: Schedule,
    episode: u64,
    episode_len: usize,
    last_state: Option<S>,
}

impl<S: Key, A: Key> LearnerCore<S, A> {
    pub fn new(discount_factor: f64, learning_rate: f64, schedule: Schedule) -> Self {
        Self {
            values: ValueTable::default(),
            discount_factor,
            initial_learning_rate: learning_rate,
            learning_rate,
            schedule,
            episode: 0,
            episode_len: 0,
            last_state: None,
        }
    }

    pub fn values(&self) -> &ValueTable<S, A> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut ValueTable<S, A> {
        &mut self.values
    }

    pub fn discount_factor(&self) -> f64 {
        self.discount_factor
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn episode(&self) -> u64 {
        self.episode
    }

    pub fn last_state(&self) -> Option<&S> {
        self.last_state.as_ref()
    }

    /// Advances the episode counter and recomputes the learning rate, without touching the
    /// bookkeeping of the episode in progress.
    pub fn advance_episode(&mut self) {
        self.episode += 1;
        self.learning_rate = self.schedule.rate(self.initial_learning_rate, self.episode);
    }

    /// Returns whether a new episode was actually opened. An episode that has not learned any
    /// step yet is reused so repeated requests do not fragment the history.
    fn boundary(&mut self) -> bool {
        self.last_state = None;
        if self.episode > 0 && self.episode_len == 0 {
            return false;
        }
        self.advance_episode();
        self.episode_len = 0;
        true
    }
}

#[enum_dispatch]
pub trait Learner<S: Key, A: Key> {
    fn core(&self) -> &LearnerCore<S, A>;

    fn core_mut(&mut self) -> &mut LearnerCore<S, A>;

    /// Incremental update after moving from `prev_state` to `transition.state`.
    fn learn(&mut self, prev_state: S, transition: &Transition<S, A>) -> Result<()>;

    /// Called whenever `init_episode` really opens a new episode.
    fn open_episode(&mut self) {}

    fn val(&self, state: &S, action: &A) -> f64 {
        self.core().values().get(state, action)
    }

    fn fit(&mut self, input: Fit<S, A>) -> Result<()> {
        input.validate()?;
        match input {
            Fit::Step(transition) => {
                if self.core().last_state().is_none() {
                    self.init_episode();
                }
                fit_step(self, transition)
            }
            Fit::Episode(transitions) => {
                self.init_episode();
                transitions
                    .into_iter()
                    .try_for_each(|transition| fit_step(self, transition))
            }
            Fit::Stream(observations) => {
                self.init_episode();
                for observation in observations {
                    match observation {
                        Observation::Transition(transition) => fit_step(self, transition)?,
                        Observation::Boundary => self.init_episode(),
                    }
                }
                Ok(())
            }
        }
    }

    fn init_episode(&mut self) {
        if self.core_mut().boundary() {
            self.open_episode();
        }
    }

    /// Refines the estimates from the data already observed.
    fn converge(&mut self, _budget: &ConvergeBudget) -> Result<()> {
        Err(Error::NotImplemented {
            learner: std::any::type_name::<Self>(),
            operation: "converge",
        })
    }

    fn states<'a>(&'a self) -> &'a KeySet<S>
    where
        A: 'a,
    {
        self.core().values().states()
    }

    fn actions<'a>(&'a self) -> &'a KeySet<A>
    where
        S: 'a,
    {
        self.core().values().actions()
    }

    fn episode(&self) -> u64 {
        self.core().episode()
    }

    fn learning_rate(&self) -> f64 {
        self.core().learning_rate()
    }
}

fn fit_step<S: Key, A: Key, L: Learner<S, A> + ?Sized>(
    learner: &mut L,
    transition: Transition<S, A>,
) -> Result<()> {
    let core = learner.core_mut();
    core.values.observe(&transition.state, &transition.action);
    if let Some(prev_state) = core.last_state.replace(transition.state.clone()) {
        learner.learn(prev_state, &transition)?;
        learner.core_mut().episode_len += 1;
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[enum_dispatch(Learner<S, A>)]
pub enum EnumLearner<S: Key, A: Key> {
    TemporalDifference(TemporalDifferenceLearner<S, A>),
    Mlmdp(Mlmdp<S, A>),
    QLearner(QLearner<S, A>),
}
