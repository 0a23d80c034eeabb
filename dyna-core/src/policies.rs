use crate::{env::Observation, error::Result};

/// Maps an observation to log-probabilities over a discrete action set.
pub trait Policy {
    fn log_probs(&self, observation: &Observation) -> Result<Vec<f32>>;

    fn action_size(&self) -> usize;
}

/// A learned forward model of the environment.
pub trait TransitionModel {
    fn predict(&self, state: &Observation, action: usize) -> Result<Observation>;
}

/// A learned model of the probability that `(state, action)` ends the episode.
pub trait TerminationPredictor {
    fn done_probability(&self, state: &Observation, action: usize) -> Result<f32>;
}

impl<P: Policy + ?Sized> Policy for &P {
    fn log_probs(&self, observation: &Observation) -> Result<Vec<f32>> {
        (**self).log_probs(observation)
    }

    fn action_size(&self) -> usize {
        (**self).action_size()
    }
}
