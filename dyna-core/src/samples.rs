//! Supervised examples gathered from real episodes.

use crate::env::Observation;

/// Encodes a `(state, action)` pair the way the learned models consume it: the state followed by
/// the action index as a single scalar.
pub fn model_input(state: &Observation, action: usize) -> Vec<f32> {
    let mut input = Vec::with_capacity(state.len() + 1);
    input.extend_from_slice(state.as_slice());
    input.push(action as f32);
    input
}

/// A fixed-width input/target pair for regression style training.
pub trait SupervisedSample {
    fn input(&self) -> Vec<f32>;

    fn target(&self) -> Vec<f32>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: Observation,
    pub action: usize,
    pub next_state: Observation,
}

impl SupervisedSample for Transition {
    fn input(&self) -> Vec<f32> {
        model_input(&self.state, self.action)
    }

    fn target(&self) -> Vec<f32> {
        self.next_state.to_vec()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TerminationSample {
    pub state: Observation,
    pub action: usize,
    pub terminal: bool,
}

impl SupervisedSample for TerminationSample {
    fn input(&self) -> Vec<f32> {
        model_input(&self.state, self.action)
    }

    fn target(&self) -> Vec<f32> {
        vec![if self.terminal { 1. } else { 0. }]
    }
}

/// Everything a single real episode produced.
#[derive(Debug, Clone)]
pub struct TrialRecord {
    pub start: Observation,
    pub transitions: Vec<Transition>,
    pub terminations: Vec<TerminationSample>,
    pub total_reward: f32,
}

/// The full history of a run. Append only: nothing is ever evicted, so the models are always
/// fitted on every transition seen so far.
#[derive(Debug, Clone, Default)]
pub struct Experience {
    transitions: Vec<Transition>,
    terminations: Vec<TerminationSample>,
    starts: Vec<Observation>,
    rewards: Vec<f32>,
}

impl Experience {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, trial: TrialRecord) {
        self.transitions.extend(trial.transitions);
        self.terminations.extend(trial.terminations);
        self.starts.push(trial.start);
        self.rewards.push(trial.total_reward);
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn terminations(&self) -> &[TerminationSample] {
        &self.terminations
    }

    /// Pool of real episode starts that imagined rollouts branch from.
    pub fn starts(&self) -> &[Observation] {
        &self.starts
    }

    /// Total reward of every real episode, in the order they were recorded.
    pub fn rewards(&self) -> &[f32] {
        &self.rewards
    }

    pub fn episodes(&self) -> usize {
        self.starts.len()
    }
}
