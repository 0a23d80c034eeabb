use candle_core::Device;
use dyna_agents::{
    imagination::ImaginationConfig,
    policy_trainer::train_policy,
};
use dyna_candle_lm::{Activation, optimizer::OptimizerWithMaxGrad, policy::CategoricalPolicy};
use dyna_core::{
    Result,
    budget::TrainingBudget,
    env::Observation,
    policies::{Policy, TerminationPredictor, TransitionModel},
};
use rand::{SeedableRng, rngs::StdRng};

struct Stay;

impl TransitionModel for Stay {
    fn predict(&self, state: &Observation, _action: usize) -> Result<Observation> {
        Ok(state.clone())
    }
}

/// Action 1 always ends the episode, action 0 rarely does.
struct PunishRight;

impl TerminationPredictor for PunishRight {
    fn done_probability(&self, _state: &Observation, action: usize) -> Result<f32> {
        Ok(if action == 1 { 1. } else { 0.05 })
    }
}

#[test]
fn policy_learns_to_avoid_the_ending_action() -> Result<()> {
    let policy = CategoricalPolicy::build(1, 2, &[], Activation::Tanh, &Device::Cpu)?;
    let mut optimizer = OptimizerWithMaxGrad::adam(policy.varmap(), 0.05, None)?;
    let starts = [Observation::new(vec![1.])];
    let config = ImaginationConfig {
        episodes: 10,
        max_steps: 50,
    };
    let mut rng = StdRng::seed_from_u64(8);
    let before = policy.log_probs(&starts[0])?[0].exp();
    let report = train_policy(
        &starts,
        &Stay,
        &PunishRight,
        &policy,
        &mut optimizer,
        &config,
        &TrainingBudget::steps(300),
        &mut rng,
    )?;
    let after = policy.log_probs(&starts[0])?[0].exp();
    assert_eq!(report.updates, 300);
    assert!(report.imagined_reward.is_some());
    assert!(after > before, "{before} -> {after}");
    assert!(after > 0.7, "p(left) = {after}");
    Ok(())
}

#[test]
fn exhausted_budget_only_reports() -> Result<()> {
    let policy = CategoricalPolicy::build(1, 2, &[], Activation::Tanh, &Device::Cpu)?;
    let mut optimizer = OptimizerWithMaxGrad::adam(policy.varmap(), 0.05, None)?;
    let starts = [Observation::new(vec![1.])];
    let mut rng = StdRng::seed_from_u64(0);
    let before = policy.log_probs(&starts[0])?;
    let report = train_policy(
        &starts,
        &Stay,
        &PunishRight,
        &policy,
        &mut optimizer,
        &ImaginationConfig::default(),
        &TrainingBudget::steps(0),
        &mut rng,
    )?;
    assert_eq!(report.updates, 0);
    assert!(report.imagined_reward.is_some());
    assert_eq!(policy.log_probs(&starts[0])?, before);
    Ok(())
}
