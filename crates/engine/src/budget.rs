use std::cell::Cell;
use std::time::{Duration, Instant};

use crate::error::MatchError;

/// The clock is read once per this many steps.
const CLOCK_INTERVAL: u64 = 64;

/// Per (rule, file) work allowance, ticked by the matcher on every node
/// comparison and by the formula evaluator on every join step.
///
/// Once exhausted it stays exhausted, so every branch still being explored
/// fails fast with the same timeout.
#[derive(Debug)]
pub struct Budget {
    started: Instant,
    deadline: Option<Instant>,
    max_steps: Option<u64>,
    steps: Cell<u64>,
    exhausted: Cell<bool>,
}

impl Budget {
    pub fn new(timeout: Option<Duration>, max_steps: Option<u64>) -> Self {
        let started = Instant::now();
        Self {
            started,
            deadline: timeout.map(|t| started + t),
            max_steps,
            steps: Cell::new(0),
            exhausted: Cell::new(false),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None, None)
    }

    pub fn tick(&self) -> Result<(), MatchError> {
        let steps = self.steps.get() + 1;
        self.steps.set(steps);
        if self.exhausted.get() {
            return Err(self.timeout());
        }
        let over_steps = self.max_steps.is_some_and(|max| steps > max);
        let over_time = (steps == 1 || steps % CLOCK_INTERVAL == 0)
            && self.deadline.is_some_and(|d| Instant::now() >= d);
        if over_steps || over_time {
            self.exhausted.set(true);
            return Err(self.timeout());
        }
        Ok(())
    }

    pub fn steps(&self) -> u64 {
        self.steps.get()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted.get()
    }

    fn timeout(&self) -> MatchError {
        MatchError::Timeout {
            elapsed_ms: self.elapsed().as_millis() as u64,
            steps: self.steps.get(),
        }
    }
}
