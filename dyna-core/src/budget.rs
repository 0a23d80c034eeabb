use std::time::{Duration, Instant};

/// How much compute one training phase may spend. Phases run until the wall clock budget is
/// used up, `max_steps` optionally stops them earlier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingBudget {
    pub wall_clock: Duration,
    pub max_steps: Option<usize>,
}

impl TrainingBudget {
    pub fn wall_clock(wall_clock: Duration) -> Self {
        Self {
            wall_clock,
            max_steps: None,
        }
    }

    /// Negative values mean no time at all, values too large for a `Duration` mean no limit.
    pub fn from_secs_f64(secs: f64) -> Self {
        let wall_clock = Duration::try_from_secs_f64(secs.max(0.)).unwrap_or(Duration::MAX);
        Self::wall_clock(wall_clock)
    }

    pub fn steps(max_steps: usize) -> Self {
        Self {
            wall_clock: Duration::MAX,
            max_steps: Some(max_steps),
        }
    }

    /// Starts the clock.
    pub fn start(&self) -> Deadline {
        Deadline {
            until: Instant::now().checked_add(self.wall_clock),
            max_steps: self.max_steps,
        }
    }
}

/// A started [`TrainingBudget`], checked once per inner iteration of a phase.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    // None when the wall clock budget does not fit in an Instant
    until: Option<Instant>,
    max_steps: Option<usize>,
}

impl Deadline {
    pub fn expired(&self, steps_done: usize) -> bool {
        if self.max_steps.is_some_and(|max| steps_done >= max) {
            return true;
        }
        self.until.is_some_and(|until| Instant::now() >= until)
    }
}
