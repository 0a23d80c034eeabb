//! Rollouts played entirely inside the learned models.

use dyna_core::{
    DynaError, Result,
    env::Observation,
    policies::{Policy, TerminationPredictor, TransitionModel},
    sampling::{action_mask, sample_action},
};
use rand::{Rng, seq::IndexedRandom};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImaginationConfig {
    /// Imagined episodes per batch.
    pub episodes: usize,
    /// An imagined episode that survives this many steps is stopped as solved.
    pub max_steps: usize,
}

impl Default for ImaginationConfig {
    fn default() -> Self {
        Self {
            episodes: 10,
            max_steps: 500,
        }
    }
}

/// Per-step policy training rows from one batch of imagined episodes.
///
/// `masks[i]` is the one-hot of the action taken in `states[i]`, scaled by the length of the
/// episode the step belongs to. Every step of an episode is credited with the whole episode's
/// return, there is no discounting.
#[derive(Debug, Clone, Default)]
pub struct ImaginedBatch {
    pub states: Vec<Observation>,
    pub masks: Vec<Vec<f32>>,
    pub episode_lengths: Vec<usize>,
    /// Mean length of the kept episodes, 0 when none were kept.
    pub mean_reward: f32,
    /// Episodes dropped because a model or the policy produced a non finite value.
    pub diverged: usize,
}

impl ImaginedBatch {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

struct ImaginedEpisode {
    states: Vec<Observation>,
    actions: Vec<usize>,
}

fn imagine_episode<T, D, P, R>(
    start: &Observation,
    dynamics: &T,
    termination: &D,
    policy: &P,
    max_steps: usize,
    rng: &mut R,
) -> Result<Option<ImaginedEpisode>>
where
    T: TransitionModel,
    D: TerminationPredictor,
    P: Policy,
    R: Rng + ?Sized,
{
    let mut state = start.clone();
    let mut states = vec![];
    let mut actions = vec![];
    while states.len() < max_steps {
        let log_probs = policy.log_probs(&state)?;
        if log_probs.iter().any(|lp| lp.is_nan()) {
            return Ok(None);
        }
        let action = match sample_action(&log_probs, rng) {
            Ok(action) => action,
            // a state far outside the training data can overflow the policy's logits
            Err(DynaError::InvalidDistribution(reason)) => {
                debug!(%reason, "policy diverged on an imagined state");
                return Ok(None);
            }
            Err(err) => return Err(err),
        };
        let next_state = dynamics.predict(&state, action)?;
        let done_probability = termination.done_probability(&state, action)?;
        states.push(state);
        actions.push(action);
        if !next_state.is_finite() || !done_probability.is_finite() {
            return Ok(None);
        }
        state = next_state;
        if rng.random::<f32>() < done_probability {
            break;
        }
    }
    Ok(Some(ImaginedEpisode { states, actions }))
}

/// Plays `config.episodes` episodes through the learned models, each starting from a state drawn
/// uniformly from `starts`. The real environment is never touched.
pub fn sample_model<T, D, P, R>(
    starts: &[Observation],
    dynamics: &T,
    termination: &D,
    policy: &P,
    config: &ImaginationConfig,
    rng: &mut R,
) -> Result<ImaginedBatch>
where
    T: TransitionModel,
    D: TerminationPredictor,
    P: Policy,
    R: Rng + ?Sized,
{
    let action_size = policy.action_size();
    let mut batch = ImaginedBatch::default();
    for _ in 0..config.episodes {
        let start = starts.choose(rng).ok_or(DynaError::EmptyStartPool)?;
        let Some(episode) =
            imagine_episode(start, dynamics, termination, policy, config.max_steps, rng)?
        else {
            batch.diverged += 1;
            continue;
        };
        let length = episode.states.len();
        for &action in &episode.actions {
            batch
                .masks
                .push(action_mask(action, action_size, length as f32)?);
        }
        batch.states.extend(episode.states);
        batch.episode_lengths.push(length);
    }
    if batch.diverged > 0 {
        debug!(diverged = batch.diverged, "dropped imagined episodes");
    }
    if !batch.episode_lengths.is_empty() {
        let total: usize = batch.episode_lengths.iter().sum();
        batch.mean_reward = total as f32 / batch.episode_lengths.len() as f32;
    }
    Ok(batch)
}
