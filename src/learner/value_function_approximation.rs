use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use fxhash::FxHashMap;
use ndarray::Array1;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::config::{Schedule, ValueFunctionApproximationConfig};
use crate::error::Result;
use crate::transition::Transition;

use super::{Key, Learner, LearnerCore};

/// Fixed-length feature vector describing a state. Compared and hashed by bit pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Features(pub Vec<f64>);

impl PartialEq for Features {
    fn eq(&self, other: &Self) -> bool {
        self.0.len() == other.0.len()
            && self
                .0
                .iter()
                .zip(&other.0)
                .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Eq for Features {}

impl Hash for Features {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.len().hash(state);
        for value in &self.0 {
            value.to_bits().hash(state);
        }
    }
}

impl From<Vec<f64>> for Features {
    fn from(values: Vec<f64>) -> Self {
        Features(values)
    }
}

/// Estimates the value of a feature vector from a weight vector.
pub trait ValueFunction {
    fn evaluate(&self, weights: &Array1<f64>, features: &[f64]) -> f64;
}

impl<F> ValueFunction for F
where
    F: Fn(&Array1<f64>, &[f64]) -> f64,
{
    fn evaluate(&self, weights: &Array1<f64>, features: &[f64]) -> f64 {
        self(weights, features)
    }
}

/// `sum(w_i * x_i) / n` over the first `n = min(|w|, |x|)` components.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearCombination;

impl ValueFunction for LinearCombination {
    fn evaluate(&self, weights: &Array1<f64>, features: &[f64]) -> f64 {
        let n = weights.len().min(features.len());
        if n == 0 {
            return 0.0;
        }
        weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            / n as f64
    }
}

/// Learner over feature vectors keeping one weight vector per action.
#[derive(Clone)]
pub struct ValueFunctionApproximation<A: Key> {
    core: LearnerCore<Features, A>,
    dof: usize,
    weights: FxHashMap<A, Array1<f64>>,
    value_fn: Rc<dyn ValueFunction>,
    rng: StdRng,
}

impl<A: Key> Debug for ValueFunctionApproximation<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueFunctionApproximation")
            .field("core", &self.core)
            .field("dof", &self.dof)
            .field("weights", &self.weights)
            .finish()
    }
}

impl<A: Key> ValueFunctionApproximation<A> {
    pub fn new(config: ValueFunctionApproximationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            core: LearnerCore::new(
                config.discount_factor,
                config.learning_rate,
                Schedule::Exponential,
            ),
            dof: config.dof,
            weights: FxHashMap::default(),
            value_fn: Rc::new(LinearCombination),
            rng: StdRng::from_entropy(),
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_value_fn(mut self, value_fn: impl ValueFunction + 'static) -> Self {
        self.value_fn = Rc::new(value_fn);
        self
    }

    pub fn dof(&self) -> usize {
        self.dof
    }

    pub fn weights(&self, action: &A) -> Option<&Array1<f64>> {
        self.weights.get(action)
    }

    /// Value function evaluated with every weight zeroed except the `i`-th, for each `i`.
    fn derivative(&self, state: &Features, weights: &Array1<f64>) -> Vec<f64> {
        (0..self.dof)
            .map(|i| {
                let mut only = Array1::zeros(self.dof);
                only[i] = weights[i];
                self.value_fn.evaluate(&only, &state.0)
            })
            .collect()
    }
}

impl<A: Key> Learner<Features, A> for ValueFunctionApproximation<A> {
    fn core(&self) -> &LearnerCore<Features, A> {
        &self.core
    }

    fn core_mut(&mut self) -> &mut LearnerCore<Features, A> {
        &mut self.core
    }

    fn val(&self, state: &Features, action: &A) -> f64 {
        match self.weights.get(action) {
            Some(weights) => self.value_fn.evaluate(weights, &state.0),
            None => self.value_fn.evaluate(&Array1::zeros(self.dof), &state.0),
        }
    }

    fn learn(&mut self, prev_state: Features, transition: &Transition<Features, A>) -> Result<()> {
        let dof = self.dof;
        let rng = &mut self.rng;
        self.weights
            .entry(transition.action.clone())
            .or_insert_with(|| Array1::random_using(dof, Uniform::new(0.0, 1.0), rng));

        let future = self
            .actions()
            .iter()
            .map(|action| self.val(&transition.state, action))
            .fold(f64::NEG_INFINITY, f64::max);
        let future = if future.is_finite() { future } else { 0.0 };
        let estimated = self.val(&prev_state, &transition.action);
        let error = self.core.learning_rate()
            * (transition.reward + self.core.discount_factor() * future - estimated);

        let Some(weights) = self.weights.get(&transition.action) else {
            return Ok(());
        };
        let deltas = self.derivative(&prev_state, weights);
        if let Some(weights) = self.weights.get_mut(&transition.action) {
            for (weight, delta) in weights.iter_mut().zip(deltas) {
                *weight = (*weight + error * delta).clamp(-1.0, 1.0);
            }
        }
        Ok(())
    }
}
