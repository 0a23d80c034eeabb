//! Learned models of the environment, both fed with a state concatenated with the action index.

use crate::sequential::{Activation, SequentialNet, build_sequential};
use candle_core::{DType, Device, Result, Tensor};
use candle_nn::{Module, VarBuilder, VarMap, ops::sigmoid};
use dyna_core::{
    env::Observation,
    policies::{TerminationPredictor, TransitionModel},
    samples::model_input,
};
use std::path::Path;
use tracing::debug;

/// A network trained by regression on `(input, target)` rows.
pub trait SupervisedModel {
    fn forward_batch(&self, inputs: &Tensor) -> Result<Tensor>;

    fn input_size(&self) -> usize;

    fn output_size(&self) -> usize;

    fn device(&self) -> &Device;

    fn name(&self) -> &'static str;
}

#[derive(Clone)]
pub struct WorldNet {
    net: SequentialNet,
    varmap: VarMap,
    device: Device,
    input_size: usize,
    output_size: usize,
}

impl WorldNet {
    fn build(
        input_size: usize,
        output_size: usize,
        hidden_layers: &[usize],
        activation: Activation,
        device: &Device,
        prefix: &str,
    ) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let mut layers = hidden_layers.to_vec();
        layers.push(output_size);
        let net = build_sequential(input_size, &layers, activation, &vb, prefix)?;
        Ok(Self {
            net,
            varmap,
            device: device.clone(),
            input_size,
            output_size,
        })
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Overwrites one named parameter, e.g. `dynamics0.weight`.
    pub fn set_parameter(&self, name: &str, value: &Tensor) -> Result<()> {
        let data = self
            .varmap
            .data()
            .lock()
            .map_err(|_| candle_core::Error::Msg("parameter map lock poisoned".to_owned()))?;
        match data.get(name) {
            Some(var) => var.set(value),
            None => candle_core::bail!("no parameter named {name}"),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        debug!(path = %path.as_ref().display(), "saving world model");
        self.varmap.save(path)
    }

    fn forward_single(&self, state: &Observation, action: usize) -> Result<Vec<f32>> {
        let input = model_input(state, action);
        let input = Tensor::from_vec(input, (1, self.input_size), &self.device)?;
        self.net.forward(&input)?.squeeze(0)?.to_vec1()
    }
}

/// Predicts the next observation.
#[derive(Clone)]
pub struct DynamicsModel(WorldNet);

impl DynamicsModel {
    pub fn build(
        observation_size: usize,
        hidden_layers: &[usize],
        activation: Activation,
        device: &Device,
    ) -> Result<Self> {
        let net = WorldNet::build(
            observation_size + 1,
            observation_size,
            hidden_layers,
            activation,
            device,
            "dynamics",
        )?;
        Ok(Self(net))
    }

    pub fn net(&self) -> &WorldNet {
        &self.0
    }
}

impl SupervisedModel for DynamicsModel {
    fn forward_batch(&self, inputs: &Tensor) -> Result<Tensor> {
        self.0.net.forward(inputs)
    }

    fn input_size(&self) -> usize {
        self.0.input_size
    }

    fn output_size(&self) -> usize {
        self.0.output_size
    }

    fn device(&self) -> &Device {
        &self.0.device
    }

    fn name(&self) -> &'static str {
        "dynamics"
    }
}

impl TransitionModel for DynamicsModel {
    fn predict(&self, state: &Observation, action: usize) -> dyna_core::Result<Observation> {
        Ok(Observation::new(self.0.forward_single(state, action)?))
    }
}

/// Predicts the pre-sigmoid probability that a step ends the episode.
#[derive(Clone)]
pub struct TerminationModel(WorldNet);

impl TerminationModel {
    pub fn build(
        observation_size: usize,
        hidden_layers: &[usize],
        activation: Activation,
        device: &Device,
    ) -> Result<Self> {
        let net = WorldNet::build(
            observation_size + 1,
            1,
            hidden_layers,
            activation,
            device,
            "termination",
        )?;
        Ok(Self(net))
    }

    pub fn net(&self) -> &WorldNet {
        &self.0
    }
}

impl SupervisedModel for TerminationModel {
    fn forward_batch(&self, inputs: &Tensor) -> Result<Tensor> {
        self.0.net.forward(inputs)
    }

    fn input_size(&self) -> usize {
        self.0.input_size
    }

    fn output_size(&self) -> usize {
        1
    }

    fn device(&self) -> &Device {
        &self.0.device
    }

    fn name(&self) -> &'static str {
        "termination"
    }
}

impl TerminationPredictor for TerminationModel {
    fn done_probability(&self, state: &Observation, action: usize) -> dyna_core::Result<f32> {
        let input = model_input(state, action);
        let input = Tensor::from_vec(input, (1, self.0.input_size), &self.0.device)?;
        let logit = self.0.net.forward(&input)?;
        let probability = sigmoid(&logit)?.flatten_all()?.to_vec1::<f32>()?;
        Ok(probability[0])
    }
}

#[cfg(test)]
mod test {
    use super::{DynamicsModel, SupervisedModel, TerminationModel};
    use crate::Activation;
    use candle_core::{Device, Tensor};
    use dyna_core::{
        Result,
        env::Observation,
        policies::{TerminationPredictor, TransitionModel},
    };

    #[test]
    fn dynamics_predicts_an_observation() -> Result<()> {
        let model = DynamicsModel::build(4, &[30], Activation::Tanh, &Device::Cpu)?;
        assert_eq!(model.input_size(), 5);
        let next = model.predict(&Observation::new(vec![0.; 4]), 1)?;
        assert_eq!(next.len(), 4);
        Ok(())
    }

    #[test]
    fn overwritten_parameters_make_an_identity_model() -> Result<()> {
        let model = DynamicsModel::build(2, &[], Activation::Tanh, &Device::Cpu)?;
        let weight = Tensor::from_slice(&[1f32, 0., 0., 0., 1., 0.], (2, 3), &Device::Cpu)?;
        let bias = Tensor::zeros(2, candle_core::DType::F32, &Device::Cpu)?;
        model.net().set_parameter("dynamics0.weight", &weight)?;
        model.net().set_parameter("dynamics0.bias", &bias)?;
        let state = Observation::new(vec![0.25, -1.5]);
        assert_eq!(model.predict(&state, 1)?, state);
        assert!(model.net().set_parameter("nope", &bias).is_err());
        Ok(())
    }

    #[test]
    fn termination_probability_is_a_probability() -> Result<()> {
        let model = TerminationModel::build(4, &[30], Activation::Tanh, &Device::Cpu)?;
        let p = model.done_probability(&Observation::new(vec![0.1, 0.2, 0.3, 0.4]), 0)?;
        assert!((0. ..=1.).contains(&p));
        Ok(())
    }
}
