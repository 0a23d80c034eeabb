use crate::error::EnvError;
use derive_more::{Deref, From};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Space {
    Discrete(usize),
    Continous {
        min: Option<Vec<f32>>,
        max: Option<Vec<f32>>,
        size: usize,
    },
}

impl Space {
    pub fn continous_from_dims(dims: Vec<usize>) -> Self {
        Self::Continous {
            min: None,
            max: None,
            size: dims.iter().product(),
        }
    }

    pub fn size(&self) -> usize {
        match &self {
            Self::Discrete(size) => *size,
            Self::Continous { size, .. } => *size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentDescription {
    pub observation_space: Space,
    pub action_space: Space,
}

impl EnvironmentDescription {
    pub fn new(observation_space: Space, action_space: Space) -> Self {
        Self {
            observation_space,
            action_space,
        }
    }

    pub fn action_size(&self) -> usize {
        self.action_space.size()
    }

    pub fn observation_size(&self) -> usize {
        self.observation_space.size()
    }
}

/// The instantaneous state of a control task. Never mutated once produced.
#[derive(Debug, Clone, PartialEq, Deref, From, Serialize, Deserialize)]
pub struct Observation(Vec<f32>);

impl Observation {
    pub fn new(data: Vec<f32>) -> Self {
        Self(data)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl From<&[f32]> for Observation {
    fn from(value: &[f32]) -> Self {
        Self(value.to_vec())
    }
}

pub struct SnapShot {
    pub state: Observation,
    pub reward: f32,
    pub terminated: bool,
    pub truncated: bool,
}

impl SnapShot {
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// A control task with a discrete action set.
///
/// Every call may block on I/O. Implementations report transport problems through [`EnvError`]
/// and leave the decision to retry to the caller.
pub trait Env {
    fn reset(&mut self, seed: u64) -> Result<Observation, EnvError>;

    fn step(&mut self, action: usize) -> Result<SnapShot, EnvError>;

    fn env_description(&self) -> EnvironmentDescription;

    /// Opens whatever bookkeeping the environment keeps for a run (recording monitors etc.).
    fn start_session(&mut self) -> Result<(), EnvError> {
        Ok(())
    }

    /// Flushes and closes the session opened by `start_session`.
    fn close(&mut self) -> Result<(), EnvError> {
        Ok(())
    }
}

impl<E: Env + ?Sized> Env for Box<E> {
    fn reset(&mut self, seed: u64) -> Result<Observation, EnvError> {
        (**self).reset(seed)
    }

    fn step(&mut self, action: usize) -> Result<SnapShot, EnvError> {
        (**self).step(action)
    }

    fn env_description(&self) -> EnvironmentDescription {
        (**self).env_description()
    }

    fn start_session(&mut self) -> Result<(), EnvError> {
        (**self).start_session()
    }

    fn close(&mut self) -> Result<(), EnvError> {
        (**self).close()
    }
}
