use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One observed step: `state` was reached by taking `action` and yielded `reward`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition<S, A> {
    pub state: S,
    pub action: A,
    pub reward: f64,
}

impl<S, A> Transition<S, A> {
    pub fn new(state: S, action: A, reward: f64) -> Self {
        Self {
            state,
            action,
            reward,
        }
    }
}

impl<S, A> From<(S, A, f64)> for Transition<S, A> {
    fn from((state, action, reward): (S, A, f64)) -> Self {
        Self::new(state, action, reward)
    }
}

/// Element of a multi-episode stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation<S, A> {
    Transition(Transition<S, A>),
    Boundary,
}

impl<S, A> From<(S, A, f64)> for Observation<S, A> {
    fn from(step: (S, A, f64)) -> Self {
        Observation::Transition(step.into())
    }
}

/// Input accepted by `Learner::fit`.
///
/// A `Step` is appended to the open episode (a new one is opened if needed), an `Episode` always
/// starts at a fresh boundary, and a `Stream` starts at a fresh boundary and may contain further
/// explicit boundaries. The first transition after any boundary only seeds the previous state:
/// its action and reward are recorded but not learned from.
#[derive(Debug, Clone, PartialEq)]
pub enum Fit<S, A> {
    Step(Transition<S, A>),
    Episode(Vec<Transition<S, A>>),
    Stream(Vec<Observation<S, A>>),
}

impl<S, A> Fit<S, A> {
    pub fn validate(&self) -> Result<()> {
        match self {
            Fit::Step(transition) => check_reward(transition),
            Fit::Episode(transitions) => {
                if transitions.is_empty() {
                    return Err(invalid("episode contains no transitions"));
                }
                transitions.iter().try_for_each(check_reward)
            }
            Fit::Stream(observations) => {
                let mut steps = 0;
                for observation in observations {
                    if let Observation::Transition(transition) = observation {
                        check_reward(transition)?;
                        steps += 1;
                    }
                }
                if steps == 0 {
                    return Err(invalid("stream contains no transitions"));
                }
                Ok(())
            }
        }
    }
}

fn check_reward<S, A>(transition: &Transition<S, A>) -> Result<()> {
    if transition.reward.is_finite() {
        Ok(())
    } else {
        Err(invalid(&format!(
            "reward must be finite, got {}",
            transition.reward
        )))
    }
}

fn invalid(reason: &str) -> Error {
    Error::InvalidInput {
        reason: reason.to_string(),
    }
}

impl<S, A> From<Transition<S, A>> for Fit<S, A> {
    fn from(transition: Transition<S, A>) -> Self {
        Fit::Step(transition)
    }
}

impl<S, A> From<(S, A, f64)> for Fit<S, A> {
    fn from(step: (S, A, f64)) -> Self {
        Fit::Step(step.into())
    }
}

impl<S, A> From<Vec<Transition<S, A>>> for Fit<S, A> {
    fn from(episode: Vec<Transition<S, A>>) -> Self {
        Fit::Episode(episode)
    }
}

impl<S, A> From<Vec<(S, A, f64)>> for Fit<S, A> {
    fn from(episode: Vec<(S, A, f64)>) -> Self {
        Fit::Episode(episode.into_iter().map(Transition::from).collect())
    }
}

impl<S, A> From<Vec<Observation<S, A>>> for Fit<S, A> {
    fn from(stream: Vec<Observation<S, A>>) -> Self {
        Fit::Stream(stream)
    }
}
