#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rltools::{Environment, Error, Result};

/// Chain of seven states starting in the middle. Both ends are terminal and entering the right
/// end pays 1.
pub struct RandomWalk {
    state: i32,
    rng: StdRng,
}

impl RandomWalk {
    pub const START: i32 = 3;
    pub const LAST: i32 = 6;

    pub fn new(seed: u64) -> Self {
        Self {
            state: Self::START,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Probability of terminating on the right from `state`.
    pub fn true_value(state: i32) -> f64 {
        state as f64 / Self::LAST as f64
    }
}

impl Environment<i32, i32> for RandomWalk {
    fn state(&self) -> i32 {
        self.state
    }

    fn actions(&self) -> Vec<i32> {
        vec![0]
    }

    fn reset(&mut self) -> i32 {
        self.state = Self::START;
        self.state
    }

    fn step(&mut self, action: &i32) -> Result<(i32, f64, i32)> {
        if self.state == 0 || self.state == Self::LAST {
            return Err(Error::TerminalState);
        }
        self.state += if self.rng.gen_bool(0.5) { 1 } else { -1 };
        let reward = if self.state == Self::LAST { 1.0 } else { 0.0 };
        Ok((*action, reward, self.state))
    }
}

const GRID: [[i8; 4]; 3] = [[0, 0, 0, -1], [0, 1, 0, -1], [0, 0, 0, 0]];
const REWARDS: [[f64; 4]; 3] = [
    [-0.04, -0.04, -0.04, 10.0],
    [-0.04, -0.04, -0.04, -10.0],
    [-0.04, -0.04, -0.04, -0.04],
];

/// 3x4 grid with one wall and two terminal cells (+10 and -10). Actions are left, right, up and
/// down; with probability `noise` the move goes sideways instead.
pub struct GridWorld {
    state: i32,
    noise: f64,
    rng: StdRng,
}

impl GridWorld {
    pub fn new(noise: f64, seed: u64) -> Self {
        Self {
            state: 0,
            noise,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn coords(state: i32) -> (usize, usize) {
        ((state / 4) as usize, (state % 4) as usize)
    }
}

impl Environment<i32, i32> for GridWorld {
    fn state(&self) -> i32 {
        self.state
    }

    fn actions(&self) -> Vec<i32> {
        vec![0, 1, 2, 3]
    }

    fn reset(&mut self) -> i32 {
        self.state = 0;
        self.state
    }

    fn step(&mut self, action: &i32) -> Result<(i32, f64, i32)> {
        let (row, col) = Self::coords(self.state);
        if GRID[row][col] == -1 {
            return Err(Error::TerminalState);
        }
        let mut action = *action;
        if self.rng.gen::<f64>() < self.noise {
            let sideways = self.rng.gen_bool(0.5);
            action = match (action, sideways) {
                (0 | 1, true) => 2,
                (0 | 1, false) => 3,
                (_, true) => 0,
                (_, false) => 1,
            };
        }
        let (mut to_row, mut to_col) = (row, col);
        match action {
            0 => to_col = col.saturating_sub(1),
            1 => to_col = (col + 1).min(3),
            2 => to_row = row.saturating_sub(1),
            _ => to_row = (row + 1).min(2),
        }
        if GRID[to_row][to_col] == 1 {
            to_row = row;
            to_col = col;
        }
        self.state = (to_row * 4 + to_col) as i32;
        Ok((action, REWARDS[to_row][to_col], self.state))
    }
}
