pub mod budget;
pub mod cancel;
pub mod env;
pub mod error;
pub mod policies;
pub mod report;
pub mod retry;
pub mod samples;
pub mod sampling;

pub use error::{DynaError, EnvError, Result};

/// A training loop that runs until it is told to stop and then summarizes the run.
pub trait Algorithm {
    type Summary;

    fn train(&mut self) -> Result<Self::Summary>;
}
