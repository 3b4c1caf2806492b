use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::{Key, KeySet};

/// Sparse table of action values. Missing pairs read as 0.0, and every pair ever written or
/// observed registers its state and action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueTable<S: Key, A: Key> {
    values: FxHashMap<(S, A), f64>,
    states: KeySet<S>,
    actions: KeySet<A>,
}

impl<S: Key, A: Key> Default for ValueTable<S, A> {
    fn default() -> Self {
        Self {
            values: FxHashMap::default(),
            states: KeySet::default(),
            actions: KeySet::default(),
        }
    }
}

impl<S: Key, A: Key> ValueTable<S, A> {
    pub fn get(&self, state: &S, action: &A) -> f64 {
        self.values
            .get(&(state.clone(), action.clone()))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set(&mut self, state: S, action: A, value: f64) {
        self.observe(&state, &action);
        self.values.insert((state, action), value);
    }

    pub fn add(&mut self, state: S, action: A, delta: f64) {
        self.observe(&state, &action);
        *self.values.entry((state, action)).or_insert(0.0) += delta;
    }

    /// `v <- (1 - rate) * v + rate * target`
    pub fn blend(&mut self, state: S, action: A, target: f64, rate: f64) {
        self.observe(&state, &action);
        let value = self.values.entry((state, action)).or_insert(0.0);
        *value = (1.0 - rate) * *value + rate * target;
    }

    /// Registers a state and an action without storing a value.
    pub fn observe(&mut self, state: &S, action: &A) {
        if !self.states.contains(state) {
            self.states.insert(state.clone());
        }
        if !self.actions.contains(action) {
            self.actions.insert(action.clone());
        }
    }

    /// Best value over the known actions, 0.0 when no action is known.
    pub fn max_value(&self, state: &S) -> f64 {
        self.actions
            .iter()
            .map(|action| self.get(state, action))
            .fold(None, |best: Option<f64>, value| match best {
                Some(best) if best >= value => Some(best),
                _ => Some(value),
            })
            .unwrap_or(0.0)
    }

    pub fn snapshot(&self) -> FxHashMap<(S, A), f64> {
        self.values.clone()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&(S, A), &f64)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn states(&self) -> &KeySet<S> {
        &self.states
    }

    pub fn actions(&self) -> &KeySet<A> {
        &self.actions
    }
}
