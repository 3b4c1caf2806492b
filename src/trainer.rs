use kdam::{tqdm, BarExt};
use tracing::info;

use crate::config::ConvergeBudget;
use crate::env::Environment;
use crate::error::{Error, Result};
use crate::learner::Key;
use crate::strategy::Strategy;
use crate::transition::Transition;
use crate::utils::moving_average;

/// Per-episode outcome of a training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainResults {
    pub rewards: Vec<f64>,
    pub lengths: Vec<usize>,
}

impl TrainResults {
    pub fn episodes(&self) -> usize {
        self.rewards.len()
    }

    pub fn mean_reward(&self) -> f64 {
        if self.rewards.is_empty() {
            return 0.0;
        }
        self.rewards.iter().sum::<f64>() / self.rewards.len() as f64
    }

    pub fn smoothed_rewards(&self, window: usize) -> Vec<f64> {
        moving_average(window, &self.rewards)
    }
}

/// Drives a strategy through an environment for a number of episodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Trainer {
    episodes: usize,
    max_steps: usize,
    converge: Option<ConvergeBudget>,
    progress: bool,
}

impl Default for Trainer {
    fn default() -> Self {
        Self {
            episodes: 100,
            max_steps: 10_000,
            converge: None,
            progress: false,
        }
    }
}

impl Trainer {
    pub fn new(episodes: usize) -> Self {
        Self {
            episodes,
            ..Self::default()
        }
    }

    /// Steps after which an episode is cut as if it had reached a terminal state.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Converge the strategy once all episodes are done.
    pub fn with_converge(mut self, budget: ConvergeBudget) -> Self {
        self.converge = Some(budget);
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn run<S, A, St, E>(&self, strategy: &mut St, env: &mut E) -> Result<TrainResults>
    where
        S: Key,
        A: Key + Default,
        St: Strategy<S, A>,
        E: Environment<S, A>,
    {
        let mut results = TrainResults::default();
        if self.episodes == 0 {
            return Ok(results);
        }
        let mut pb = tqdm!(total = self.episodes, disable = !self.progress);

        let mut state = env.reset();
        strategy.fit(Transition::new(state.clone(), A::default(), 0.0).into())?;
        let mut episode_reward = 0.0;
        let mut steps = 0;
        loop {
            let outcome = if steps < self.max_steps {
                let actions = env.actions();
                let action = strategy.policy(&state, Some(&actions))?;
                env.step(&action)
            } else {
                Err(Error::TerminalState)
            };
            match outcome {
                Ok((taken, reward, next_state)) => {
                    strategy.fit(Transition::new(next_state.clone(), taken, reward).into())?;
                    episode_reward += reward;
                    steps += 1;
                    state = next_state;
                }
                Err(Error::TerminalState) => {
                    results.rewards.push(episode_reward);
                    results.lengths.push(steps);
                    info!(
                        episode = results.episodes(),
                        reward = episode_reward,
                        steps,
                        "episode finished"
                    );
                    pb.update(1)?;
                    if results.episodes() == self.episodes {
                        break;
                    }
                    strategy.init_episode();
                    state = env.reset();
                    strategy.fit(Transition::new(state.clone(), A::default(), 0.0).into())?;
                    episode_reward = 0.0;
                    steps = 0;
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(budget) = &self.converge {
            strategy.converge(budget)?;
        }
        info!(
            episodes = results.episodes(),
            mean_reward = results.mean_reward(),
            "training finished"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_eq::assert_float_eq;

    #[test]
    fn results_summaries() {
        let results = TrainResults {
            rewards: vec![1.0, 0.0, 2.0, 3.0],
            lengths: vec![3, 4, 5, 6],
        };
        assert_eq!(results.episodes(), 4);
        assert_float_eq!(results.mean_reward(), 1.5, abs <= 1e-12);
        assert_eq!(results.smoothed_rewards(2), vec![0.5, 2.5]);
        assert_float_eq!(TrainResults::default().mean_reward(), 0.0, abs <= 0.0);
    }

    #[test]
    fn builders() {
        let trainer = Trainer::new(5)
            .with_max_steps(20)
            .with_converge(ConvergeBudget::default())
            .with_progress(true);
        assert_eq!(trainer.episodes, 5);
        assert_eq!(trainer.max_steps, 20);
        assert!(trainer.converge.is_some());
        assert!(trainer.progress);
    }
}
