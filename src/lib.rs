pub mod config;
pub mod env;
pub mod error;
pub mod learner;
pub mod snapshot;
pub mod strategy;
pub mod trainer;
pub mod transition;
pub mod utils;

pub use config::{ConvergeBudget, LearnerConfig, Schedule};
pub use env::Environment;
pub use error::{Error, Result};
pub use learner::{EnumLearner, Learner};
pub use snapshot::Snapshot;
pub use strategy::{EpsilonGreedyStrategy, GreedyStrategy, RMaxStrategy, Strategy};
pub use trainer::{TrainResults, Trainer};
pub use transition::{Fit, Observation, Transition};
