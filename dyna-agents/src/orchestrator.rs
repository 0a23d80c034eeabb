//! The outer loop: collect real episodes, fit the world models, improve the policy on imagined
//! rollouts, repeat until asked to stop.

use crate::{
    imagination::ImaginationConfig,
    model_trainer::train_model,
    policy_trainer::train_policy,
    trial::run_trial,
};
use candle_core::Device;
use dyna_candle_lm::{
    Activation,
    losses::CostKind,
    optimizer::OptimizerWithMaxGrad,
    policy::CategoricalPolicy,
    world_model::{DynamicsModel, TerminationModel},
};
use dyna_core::{
    Algorithm, Result,
    budget::TrainingBudget,
    cancel::CancellationToken,
    env::Env,
    report::{NoReport, ReportSink, RunSummary},
    samples::Experience,
};
use rand::{SeedableRng, rngs::StdRng};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct DynaParams {
    pub trials_per_iteration: usize,
    /// The policy is optimized whenever the number of recorded real episodes is a multiple of
    /// this. Zero disables policy optimization.
    pub policy_interval: usize,
    /// Reward of a step that gets no termination label.
    pub max_reward: f32,
    pub imagination: ImaginationConfig,
    pub model_batch_size: usize,
    pub model_budget: TrainingBudget,
    pub policy_budget: TrainingBudget,
    /// Where the learned parameters are exported when training stops.
    pub output_dir: Option<PathBuf>,
}

impl Default for DynaParams {
    fn default() -> Self {
        Self {
            trials_per_iteration: 5,
            policy_interval: 5,
            max_reward: 500.,
            imagination: ImaginationConfig::default(),
            model_batch_size: 30,
            model_budget: TrainingBudget::wall_clock(Duration::from_secs(4)),
            policy_budget: TrainingBudget::wall_clock(Duration::from_secs(8)),
            output_dir: None,
        }
    }
}

/// Network shapes and step sizes.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub model_hidden: Vec<usize>,
    pub policy_hidden: Vec<usize>,
    pub activation: Activation,
    pub model_learning_rate: f64,
    pub policy_learning_rate: f64,
    /// Global gradient norm cap shared by the three optimizers, unclipped when `None`.
    pub max_grad_norm: Option<f32>,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            model_hidden: vec![30],
            policy_hidden: vec![],
            activation: Activation::Tanh,
            model_learning_rate: 1e-3,
            policy_learning_rate: 1e-3,
            max_grad_norm: None,
        }
    }
}

/// Everything with parameters, each paired with the optimizer that is allowed to move them.
pub struct DynaModels {
    pub policy: CategoricalPolicy,
    pub dynamics: DynamicsModel,
    pub termination: TerminationModel,
    pub policy_optimizer: OptimizerWithMaxGrad,
    pub dynamics_optimizer: OptimizerWithMaxGrad,
    pub termination_optimizer: OptimizerWithMaxGrad,
}

impl DynaModels {
    pub fn build(
        observation_size: usize,
        action_size: usize,
        spec: &ModelSpec,
        device: &Device,
    ) -> Result<Self> {
        let policy = CategoricalPolicy::build(
            observation_size,
            action_size,
            &spec.policy_hidden,
            spec.activation,
            device,
        )?;
        let dynamics =
            DynamicsModel::build(observation_size, &spec.model_hidden, spec.activation, device)?;
        let termination =
            TerminationModel::build(observation_size, &spec.model_hidden, spec.activation, device)?;
        let policy_optimizer = OptimizerWithMaxGrad::adam(
            policy.varmap(),
            spec.policy_learning_rate,
            spec.max_grad_norm,
        )?;
        let dynamics_optimizer = OptimizerWithMaxGrad::adam(
            dynamics.net().varmap(),
            spec.model_learning_rate,
            spec.max_grad_norm,
        )?;
        let termination_optimizer = OptimizerWithMaxGrad::adam(
            termination.net().varmap(),
            spec.model_learning_rate,
            spec.max_grad_norm,
        )?;
        Ok(Self {
            policy,
            dynamics,
            termination,
            policy_optimizer,
            dynamics_optimizer,
            termination_optimizer,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Running,
    Stopping,
}

/// Observation points of the outer loop. Hooks can ask the loop to stop, but only at iteration
/// boundaries, the same place where cancellation is observed.
pub trait DynaHooks {
    /// Called once before the first iteration. Returning `true` stops before any trial runs.
    fn init_hook(&mut self) -> bool;

    /// Called after each batch of real trials has been recorded.
    fn post_collection_hook(&mut self, experience: &Experience);

    /// Called after each full iteration. Returning `true` stops the loop.
    fn post_iteration_hook(&mut self, summary: &RunSummary) -> bool;

    fn shutdown_hook(&mut self, summary: &RunSummary) -> Result<()>;
}

/// Logs progress and optionally stops after a fixed number of iterations.
#[derive(Debug, Clone, Default)]
pub struct DefaultDynaHooks {
    max_iterations: Option<usize>,
}

impl DefaultDynaHooks {
    pub fn new(max_iterations: Option<usize>) -> Self {
        Self { max_iterations }
    }
}

impl DynaHooks for DefaultDynaHooks {
    fn init_hook(&mut self) -> bool {
        self.max_iterations == Some(0)
    }

    fn post_collection_hook(&mut self, experience: &Experience) {
        let recent = experience.rewards().iter().rev().take(5);
        let count = recent.len().max(1);
        let mean = recent.sum::<f32>() / count as f32;
        info!(
            episodes = experience.episodes(),
            transitions = experience.transitions().len(),
            mean_recent_reward = mean,
            "collected real episodes"
        );
    }

    fn post_iteration_hook(&mut self, summary: &RunSummary) -> bool {
        info!(
            iteration = summary.iterations,
            dynamics_loss = ?summary.dynamics_loss,
            termination_loss = ?summary.termination_loss,
            imagined_reward = ?summary.imagined_reward,
            "iteration finished"
        );
        self.max_iterations
            .is_some_and(|max| summary.iterations >= max)
    }

    fn shutdown_hook(&mut self, summary: &RunSummary) -> Result<()> {
        info!(
            iterations = summary.iterations,
            episodes = summary.episodes,
            best_real_reward = ?summary.best_real_reward(),
            "training stopped"
        );
        Ok(())
    }
}

pub struct DynaTrainer<E: Env, H: DynaHooks = DefaultDynaHooks> {
    env: E,
    models: DynaModels,
    experience: Experience,
    params: DynaParams,
    hooks: H,
    cancel: CancellationToken,
    rng: StdRng,
    sink: Box<dyn ReportSink>,
    state: TrainerState,
    summary: RunSummary,
}

impl<E: Env, H: DynaHooks> DynaTrainer<E, H> {
    pub fn new(env: E, models: DynaModels, params: DynaParams, hooks: H) -> Self {
        Self {
            env,
            models,
            experience: Experience::new(),
            params,
            hooks,
            cancel: CancellationToken::new(),
            rng: StdRng::seed_from_u64(0),
            sink: Box::new(NoReport),
            state: TrainerState::Running,
            summary: RunSummary::default(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_report_sink(mut self, sink: Box<dyn ReportSink>) -> Self {
        self.sink = sink;
        self
    }

    /// A handle that stops the loop at the next iteration boundary.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn experience(&self) -> &Experience {
        &self.experience
    }

    pub fn models(&self) -> &DynaModels {
        &self.models
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    fn collect_trials(&mut self) -> Result<()> {
        for _ in 0..self.params.trials_per_iteration {
            let trial = run_trial(
                &mut self.env,
                &self.models.policy,
                self.params.max_reward,
                &mut self.rng,
            )?;
            info!(
                episode = self.experience.episodes(),
                reward = trial.total_reward,
                "real episode"
            );
            self.summary.real_rewards.push(trial.total_reward);
            self.experience.record(trial);
        }
        self.summary.episodes = self.experience.episodes();
        self.hooks.post_collection_hook(&self.experience);
        Ok(())
    }

    fn fit_models(&mut self) -> Result<()> {
        let models = &mut self.models;
        let dynamics_loss = train_model(
            self.experience.transitions(),
            &models.dynamics,
            &mut models.dynamics_optimizer,
            CostKind::Mse,
            &self.params.model_budget,
            self.params.model_batch_size,
            &mut self.rng,
        )?;
        let termination_loss = train_model(
            self.experience.terminations(),
            &models.termination,
            &mut models.termination_optimizer,
            CostKind::SigmoidCrossEntropy,
            &self.params.model_budget,
            self.params.model_batch_size,
            &mut self.rng,
        )?;
        if dynamics_loss.is_some() {
            self.summary.dynamics_loss = dynamics_loss;
        }
        if termination_loss.is_some() {
            self.summary.termination_loss = termination_loss;
        }
        Ok(())
    }

    fn policy_due(&self) -> bool {
        let interval = self.params.policy_interval;
        interval > 0 && self.experience.episodes() % interval == 0
    }

    fn optimize_policy(&mut self) -> Result<()> {
        let models = &mut self.models;
        let report = train_policy(
            self.experience.starts(),
            &models.dynamics,
            &models.termination,
            &models.policy,
            &mut models.policy_optimizer,
            &self.params.imagination,
            &self.params.policy_budget,
            &mut self.rng,
        )?;
        self.summary.policy_updates += report.updates;
        if report.imagined_reward.is_some() {
            self.summary.imagined_reward = report.imagined_reward;
        }
        Ok(())
    }

    fn iteration(&mut self) -> Result<()> {
        self.collect_trials()?;
        self.fit_models()?;
        if self.policy_due() {
            self.optimize_policy()?;
        }
        self.summary.iterations += 1;
        Ok(())
    }

    fn run(&mut self) -> Result<()> {
        self.env.start_session()?;
        if self.hooks.init_hook() {
            self.state = TrainerState::Stopping;
        }
        while self.state == TrainerState::Running {
            self.iteration()?;
            let hook_stop = self.hooks.post_iteration_hook(&self.summary);
            if hook_stop || self.cancel.is_cancelled() {
                info!(cancelled = self.cancel.is_cancelled(), "stopping");
                self.state = TrainerState::Stopping;
            }
        }
        Ok(())
    }

    /// Writes the three parameter sets as safetensors files into `dir`.
    pub fn export(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let policy = dir.join("policy.safetensors");
        let dynamics = dir.join("dynamics.safetensors");
        let termination = dir.join("termination.safetensors");
        self.models.policy.save(&policy)?;
        self.models.dynamics.net().save(&dynamics)?;
        self.models.termination.net().save(&termination)?;
        info!(dir = %dir.display(), "exported parameters");
        Ok(vec![policy, dynamics, termination])
    }

    fn shutdown(&mut self) -> Result<RunSummary> {
        self.env.close()?;
        if let Some(dir) = self.params.output_dir.clone() {
            self.summary.artifacts = self.export(&dir)?;
        }
        self.hooks.shutdown_hook(&self.summary)?;
        self.sink.report(&self.summary)?;
        Ok(self.summary.clone())
    }
}

impl<E: Env, H: DynaHooks> Algorithm for DynaTrainer<E, H> {
    type Summary = RunSummary;

    fn train(&mut self) -> Result<RunSummary> {
        if let Err(err) = self.run() {
            self.state = TrainerState::Stopping;
            if let Err(close_err) = self.env.close() {
                warn!(%close_err, "closing the environment after a failure");
            }
            return Err(err);
        }
        self.shutdown()
    }
}
