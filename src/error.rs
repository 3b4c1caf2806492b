use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid fit input: {reason}")]
    InvalidInput { reason: String },

    #[error(
        "convergence not achieved after {iterations} iterations ({elapsed:.2?} elapsed), current squared diff: {diff}"
    )]
    NotConverged {
        iterations: usize,
        elapsed: Duration,
        diff: f64,
    },

    #[error("{learner} does not implement {operation}")]
    NotImplemented {
        learner: &'static str,
        operation: &'static str,
    },

    #[error("terminal state reached, the environment must be reset before acting")]
    TerminalState,

    #[error("no candidate actions available for state {state}")]
    NoActions { state: String },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode snapshot: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("failed to parse configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("progress output failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
