use std::hash::Hash;

use fxhash::FxHashMap;
use rand::seq::SliceRandom;
use rand::Rng;

/// Values closer than this to the best one are treated as tied.
pub const TIE_TOLERANCE: f64 = 1e-3;

/// Uniformly picks one of the candidates whose value is within `TIE_TOLERANCE` of the best.
pub fn greedy_choice<A: Clone, R: Rng + ?Sized>(
    candidates: &[A],
    values: &[f64],
    rng: &mut R,
) -> Option<A> {
    let best = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let ties: Vec<&A> = candidates
        .iter()
        .zip(values)
        .filter(|(_, value)| best - **value <= TIE_TOLERANCE)
        .map(|(candidate, _)| candidate)
        .collect();
    ties.choose(rng).map(|candidate| (*candidate).clone())
}

/// Sum of squared differences over the union of keys, missing entries counting as 0.0.
pub fn squared_diff<K: Hash + Eq>(a: &FxHashMap<K, f64>, b: &FxHashMap<K, f64>) -> f64 {
    let shared: f64 = a
        .iter()
        .map(|(key, value)| (value - b.get(key).copied().unwrap_or(0.0)).powi(2))
        .sum();
    let only_b: f64 = b
        .iter()
        .filter(|(key, _)| !a.contains_key(*key))
        .map(|(_, value)| value.powi(2))
        .sum();
    shared + only_b
}

pub fn moving_average(window: usize, vector: &[f64]) -> Vec<f64> {
    let window = window.max(1);
    vector
        .chunks(window)
        .map(|slice| slice.iter().sum::<f64>() / window as f64)
        .collect()
}
