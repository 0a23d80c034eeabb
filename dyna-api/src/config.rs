use anyhow::{Context, Result};
use dyna_agents::{DynaParams, ModelSpec, imagination::ImaginationConfig};
use dyna_candle_lm::Activation;
use dyna_core::{budget::TrainingBudget, retry::RetryPolicy};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Complete configuration of a run. Every field has a default, so a JSON file only needs the
/// fields it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynaConfig {
    /// Real episodes per outer iteration (default: 5).
    pub trials_per_iteration: usize,
    /// Optimize the policy whenever the episode count is a multiple of this (default: 5).
    pub policy_interval: usize,
    /// Step reward that is never labeled for termination (default: 500).
    pub max_reward: f32,
    /// Imagined episodes per policy batch (default: 10).
    pub imagined_episodes: usize,
    /// Step cap of an imagined episode (default: 500).
    pub imagined_max_steps: usize,
    pub model_batch_size: usize,
    pub model_learning_rate: f64,
    /// Wall clock seconds spent fitting each learned model per iteration (default: 4).
    pub model_train_secs: f64,
    pub policy_learning_rate: f64,
    /// Wall clock seconds spent on the policy per iteration (default: 8).
    pub policy_train_secs: f64,
    pub model_hidden: Vec<usize>,
    pub policy_hidden: Vec<usize>,
    /// Nonlinearity between hidden layers (default: tanh).
    pub activation: Activation,
    /// Clip the global gradient norm of every update to this value.
    pub max_grad_norm: Option<f32>,
    pub retry: RetryConfig,
    pub seed: u64,
    /// Checkpoints and `summary.json` go here when set.
    pub output_dir: Option<PathBuf>,
    /// Run until interrupted when unset.
    pub max_iterations: Option<usize>,
    pub env: EnvConfig,
}

impl Default for DynaConfig {
    fn default() -> Self {
        Self {
            trials_per_iteration: 5,
            policy_interval: 5,
            max_reward: 500.,
            imagined_episodes: 10,
            imagined_max_steps: 500,
            model_batch_size: 30,
            model_learning_rate: 1e-3,
            model_train_secs: 4.,
            policy_learning_rate: 1e-3,
            policy_train_secs: 8.,
            model_hidden: vec![30],
            policy_hidden: vec![],
            activation: Activation::Tanh,
            max_grad_norm: None,
            retry: RetryConfig::default(),
            seed: 0,
            output_dir: None,
            max_iterations: None,
            env: EnvConfig::default(),
        }
    }
}

impl DynaConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config from {}", path.display()))
    }

    pub fn params(&self) -> DynaParams {
        DynaParams {
            trials_per_iteration: self.trials_per_iteration,
            policy_interval: self.policy_interval,
            max_reward: self.max_reward,
            imagination: ImaginationConfig {
                episodes: self.imagined_episodes,
                max_steps: self.imagined_max_steps,
            },
            model_batch_size: self.model_batch_size,
            model_budget: TrainingBudget::from_secs_f64(self.model_train_secs),
            policy_budget: TrainingBudget::from_secs_f64(self.policy_train_secs),
            output_dir: self.output_dir.clone(),
        }
    }

    pub fn model_spec(&self) -> ModelSpec {
        ModelSpec {
            model_hidden: self.model_hidden.clone(),
            policy_hidden: self.policy_hidden.clone(),
            model_learning_rate: self.model_learning_rate,
            policy_learning_rate: self.policy_learning_rate,
            activation: self.activation,
            max_grad_norm: self.max_grad_norm,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 5000,
            backoff_multiplier: 2.,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(value: &RetryConfig) -> Self {
        RetryPolicy {
            max_retries: value.max_retries,
            initial_backoff: Duration::from_millis(value.initial_backoff_ms),
            max_backoff: Duration::from_millis(value.max_backoff_ms),
            backoff_multiplier: value.backoff_multiplier,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvKind {
    /// In process simulator.
    CartPole,
    /// A gym-http-api server.
    Http,
    /// Gymnasium through an embedded interpreter, needs the `python` feature.
    Gymnasium,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    pub kind: EnvKind,
    pub base_url: String,
    pub env_id: String,
    pub request_timeout_secs: f64,
    /// Record the run with the service's monitor into this directory.
    pub monitor_dir: Option<String>,
    /// Upload the monitor directory once training stops.
    pub upload: bool,
    pub api_key: Option<String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            kind: EnvKind::CartPole,
            base_url: "http://localhost:5000".to_owned(),
            env_id: "CartPole-v1".to_owned(),
            request_timeout_secs: 30.,
            monitor_dir: None,
            upload: false,
            api_key: None,
        }
    }
}
