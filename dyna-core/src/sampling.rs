//! Drawing discrete actions from a policy's output.

use crate::error::{DynaError, Result};
use rand::Rng;

/// Picks an action from per-action log-probabilities given one uniform draw in `[0, 1)`.
///
/// Walks the cumulative distribution and returns the first action whose cumulative probability
/// exceeds `draw`. With two actions this is exactly "action 0 iff `exp(log_probs[0]) > draw`".
/// Probabilities are normalized first, so slightly unnormalized log-softmax output is fine.
pub fn select_action(log_probs: &[f32], draw: f32) -> Result<usize> {
    if log_probs.is_empty() {
        return Err(DynaError::InvalidDistribution(
            "no actions to choose from".to_owned(),
        ));
    }
    if log_probs.len() == 2 {
        let p0 = log_probs[0].exp();
        if !p0.is_finite() {
            return Err(DynaError::InvalidDistribution(format!(
                "non finite log-probability {}",
                log_probs[0]
            )));
        }
        return Ok(if p0 > draw { 0 } else { 1 });
    }
    let probs: Vec<f32> = log_probs.iter().map(|lp| lp.exp()).collect();
    let total: f32 = probs.iter().sum();
    if !total.is_finite() || total <= 0. {
        return Err(DynaError::InvalidDistribution(format!(
            "probabilities sum to {total}"
        )));
    }
    let threshold = draw * total;
    let mut cumulative = 0.;
    for (action, p) in probs.iter().enumerate() {
        cumulative += p;
        if cumulative > threshold {
            return Ok(action);
        }
    }
    // float rounding can leave the threshold just above the final cumulative sum
    Ok(probs.len() - 1)
}

/// Same as [`select_action`], with the draw taken from `rng`.
pub fn sample_action<R: Rng + ?Sized>(log_probs: &[f32], rng: &mut R) -> Result<usize> {
    let draw: f32 = rng.random();
    select_action(log_probs, draw)
}

/// One-hot encoding of `action`, scaled by `scale`.
pub fn action_mask(action: usize, action_size: usize, scale: f32) -> Result<Vec<f32>> {
    if action >= action_size {
        return Err(DynaError::InvalidDistribution(format!(
            "action {action} does not fit a mask of width {action_size}"
        )));
    }
    let mut mask = vec![0.; action_size];
    mask[action] = scale;
    Ok(mask)
}
