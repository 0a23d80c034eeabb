use candle_core::{Result, Tensor};
use candle_nn::{Linear, Module, VarBuilder, linear, ops::sigmoid};
use either::Either;
use serde::{Deserialize, Serialize};

/// Nonlinearity placed between hidden layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Tanh,
    Relu,
    Sigmoid,
}

impl Module for Activation {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match self {
            Self::Tanh => xs.tanh(),
            Self::Relu => xs.relu(),
            Self::Sigmoid => sigmoid(xs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NetLayer(pub Either<Linear, Activation>);

impl NetLayer {
    pub fn linear(linear: Linear) -> Self {
        Self(Either::Left(linear))
    }

    pub fn activation(activation: Activation) -> Self {
        Self(Either::Right(activation))
    }
}

impl Module for NetLayer {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        match &self.0 {
            Either::Left(linear) => linear.forward(xs),
            Either::Right(activation) => activation.forward(xs),
        }
    }
}

/// A feed forward stack of linear layers with an activation between them.
#[derive(Default, Debug, Clone)]
pub struct SequentialNet {
    layers: Vec<NetLayer>,
}

impl SequentialNet {
    pub fn add(mut self, layer: NetLayer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl Module for SequentialNet {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mut xs = xs.clone();
        for layer in self.layers.iter() {
            xs = layer.forward(&xs)?
        }
        Ok(xs)
    }
}

/// Builds `input_dim -> layers[0] -> ... -> layers[n-1]`, with `activation` after every layer
/// but the last. Parameters are registered as `{prefix}{idx}.weight` / `{prefix}{idx}.bias`.
pub fn build_sequential(
    input_dim: usize,
    layers: &[usize],
    activation: Activation,
    vb: &VarBuilder,
    prefix: &str,
) -> Result<SequentialNet> {
    let mut last_dim = input_dim;
    let mut nn = SequentialNet::default();
    let num_layers = layers.len();
    for (layer_idx, layer_size) in layers.iter().enumerate() {
        let layer_pp = format!("{prefix}{layer_idx}");
        let layer = linear(last_dim, *layer_size, vb.pp(layer_pp))?;
        nn = nn.add(NetLayer::linear(layer));
        if layer_idx != num_layers - 1 {
            nn = nn.add(NetLayer::activation(activation));
        }
        last_dim = *layer_size;
    }
    Ok(nn)
}
