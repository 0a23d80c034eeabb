use crate::sequential::{Activation, SequentialNet, build_sequential};
use candle_core::{D, DType, Device, Result, Tensor};
use candle_nn::{Module, VarBuilder, VarMap, ops::log_softmax};
use dyna_core::{env::Observation, policies::Policy};
use std::path::Path;
use tracing::debug;

/// Observation -> log-softmax over the discrete actions.
#[derive(Clone)]
pub struct CategoricalPolicy {
    action_size: usize,
    logits: SequentialNet,
    varmap: VarMap,
    device: Device,
}

impl CategoricalPolicy {
    /// With no hidden layers this is a single linear map followed by log-softmax.
    pub fn build(
        observation_size: usize,
        action_size: usize,
        hidden_layers: &[usize],
        activation: Activation,
        device: &Device,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let mut layers = hidden_layers.to_vec();
        layers.push(action_size);
        let logits = build_sequential(observation_size, &layers, activation, &vb, "policy")?;
        Ok(Self {
            action_size,
            logits,
            varmap,
            device: device.clone(),
        })
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Log-probabilities for a `(batch, observation_size)` tensor of states.
    pub fn batch_log_probs(&self, observations: &Tensor) -> Result<Tensor> {
        let logits = self.logits.forward(observations)?;
        log_softmax(&logits, D::Minus1)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        debug!(path = %path.as_ref().display(), "saving policy");
        self.varmap.save(path)
    }

    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.varmap.load(path)
    }
}

impl Policy for CategoricalPolicy {
    fn log_probs(&self, observation: &Observation) -> dyna_core::Result<Vec<f32>> {
        let observation =
            Tensor::from_slice(observation.as_slice(), (1, observation.len()), &self.device)?;
        let log_probs = self.batch_log_probs(&observation)?.squeeze(0)?.to_vec1()?;
        Ok(log_probs)
    }

    fn action_size(&self) -> usize {
        self.action_size
    }
}
