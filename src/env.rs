use crate::error::Result;

/// Domain a strategy acts in.
pub trait Environment<S, A> {
    fn state(&self) -> S;

    /// Actions available from the current state.
    fn actions(&self) -> Vec<A>;

    /// Starts a new episode and returns its initial state.
    fn reset(&mut self) -> S;

    /// Applies `action` and returns the action actually taken, the reward and the reached state.
    /// Fails with `Error::TerminalState` once the episode has ended.
    fn step(&mut self, action: &A) -> Result<(A, f64, S)>;
}
