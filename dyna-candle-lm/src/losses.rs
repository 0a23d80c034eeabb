use candle_core::{Result, Tensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostKind {
    /// Mean squared error between prediction and target.
    Mse,
    /// Binary cross entropy of `sigmoid(prediction)` against a 0/1 target.
    SigmoidCrossEntropy,
}

impl CostKind {
    pub fn loss(&self, prediction: &Tensor, target: &Tensor) -> Result<Tensor> {
        match self {
            Self::Mse => candle_nn::loss::mse(prediction, target),
            Self::SigmoidCrossEntropy => sigmoid_cross_entropy(prediction, target),
        }
    }
}

/// `max(x, 0) - x * z + log(1 + exp(-|x|))`, averaged over every element.
pub fn sigmoid_cross_entropy(logits: &Tensor, targets: &Tensor) -> Result<Tensor> {
    let softplus = logits.abs()?.neg()?.exp()?.affine(1., 1.)?.log()?;
    logits
        .relu()?
        .sub(&logits.mul(targets)?)?
        .add(&softplus)?
        .mean_all()
}

/// Negative mean dot product between per-action log-probabilities and reward scaled action masks.
/// Minimizing it is gradient ascent on the expected return of the sampled actions.
pub fn dot_cost(log_probs: &Tensor, scaled_masks: &Tensor) -> Result<Tensor> {
    log_probs.mul(scaled_masks)?.sum(1)?.mean_all()?.neg()
}
