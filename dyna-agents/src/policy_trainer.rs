use crate::imagination::{ImaginationConfig, sample_model};
use dyna_candle_lm::{
    losses::dot_cost, optimizer::OptimizerWithMaxGrad, policy::CategoricalPolicy, rows_to_tensor,
};
use dyna_core::{
    Result,
    budget::TrainingBudget,
    env::Observation,
    policies::{Policy, TerminationPredictor, TransitionModel},
};
use rand::Rng;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PolicyReport {
    pub updates: usize,
    /// Mean imagined reward of the last sampled batch.
    pub imagined_reward: Option<f32>,
    pub diverged: usize,
}

/// Improves `policy` on imagined rollouts until `budget` runs out.
///
/// Every iteration samples a fresh imagined batch with the current policy and applies one
/// optimizer step on it. The budget is checked between sampling and updating, so the batch
/// sampled last is only used to report the imagined reward.
#[allow(clippy::too_many_arguments)]
pub fn train_policy<T, D, R>(
    starts: &[Observation],
    dynamics: &T,
    termination: &D,
    policy: &CategoricalPolicy,
    optimizer: &mut OptimizerWithMaxGrad,
    config: &ImaginationConfig,
    budget: &TrainingBudget,
    rng: &mut R,
) -> Result<PolicyReport>
where
    T: TransitionModel,
    D: TerminationPredictor,
    R: Rng + ?Sized,
{
    let deadline = budget.start();
    let mut report = PolicyReport::default();
    let mut iterations = 0;
    loop {
        let batch = sample_model(starts, dynamics, termination, policy, config, rng)?;
        report.imagined_reward = Some(batch.mean_reward);
        report.diverged += batch.diverged;

        if deadline.expired(iterations) {
            info!(
                imagined_reward = batch.mean_reward,
                updates = report.updates,
                diverged = report.diverged,
                "policy trained"
            );
            return Ok(report);
        }
        iterations += 1;
        if batch.is_empty() {
            debug!("imagined batch is empty, skipping update");
            continue;
        }

        let rows: Vec<Vec<f32>> = batch.states.iter().map(|s| s.to_vec()).collect();
        let width = rows[0].len();
        let states = rows_to_tensor(&rows, width, policy.device())?;
        let masks = rows_to_tensor(&batch.masks, policy.action_size(), policy.device())?;
        let log_probs = policy.batch_log_probs(&states)?;
        let loss = dot_cost(&log_probs, &masks)?;
        optimizer.backward_step(&loss)?;
        report.updates += 1;
    }
}
