use candle_core::{DType, Device, Tensor};
use dyna_agents::imagination::{ImaginationConfig, sample_model};
use dyna_candle_lm::{
    Activation,
    policy::CategoricalPolicy,
    world_model::{DynamicsModel, TerminationModel},
};
use dyna_core::{Result, env::Observation};
use rand::{SeedableRng, rngs::StdRng};

fn identity_dynamics(size: usize) -> Result<DynamicsModel> {
    let model = DynamicsModel::build(size, &[], Activation::Tanh, &Device::Cpu)?;
    let eye = Tensor::eye(size, DType::F32, &Device::Cpu)?;
    let action_column = Tensor::zeros((size, 1), DType::F32, &Device::Cpu)?;
    let weight = Tensor::cat(&[&eye, &action_column], 1)?;
    model.net().set_parameter("dynamics0.weight", &weight)?;
    model
        .net()
        .set_parameter("dynamics0.bias", &Tensor::zeros(size, DType::F32, &Device::Cpu)?)?;
    Ok(model)
}

fn never_done(size: usize) -> Result<TerminationModel> {
    let model = TerminationModel::build(size, &[], Activation::Tanh, &Device::Cpu)?;
    let weight = Tensor::zeros((1, size + 1), DType::F32, &Device::Cpu)?;
    model.net().set_parameter("termination0.weight", &weight)?;
    model
        .net()
        .set_parameter("termination0.bias", &Tensor::new(&[-1000f32], &Device::Cpu)?)?;
    Ok(model)
}

#[test]
fn identity_world_runs_to_the_cap() -> Result<()> {
    let dynamics = identity_dynamics(4)?;
    let termination = never_done(4)?;
    let policy = CategoricalPolicy::build(4, 2, &[], Activation::Tanh, &Device::Cpu)?;
    let start = Observation::new(vec![0.01, 0.02, -0.03, 0.04]);
    let config = ImaginationConfig {
        episodes: 3,
        max_steps: 50,
    };
    let mut rng = StdRng::seed_from_u64(2);
    let batch = sample_model(
        std::slice::from_ref(&start),
        &dynamics,
        &termination,
        &policy,
        &config,
        &mut rng,
    )?;
    assert_eq!(batch.episode_lengths, vec![50; 3]);
    assert_eq!(batch.mean_reward, 50.);
    assert_eq!(batch.len(), 150);
    assert_eq!(batch.diverged, 0);
    for (state, mask) in batch.states.iter().zip(batch.masks.iter()) {
        for (a, b) in state.iter().zip(start.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
        assert_eq!(mask.iter().sum::<f32>(), 50.);
    }
    Ok(())
}

#[test]
fn untrained_models_stay_within_the_cap() -> Result<()> {
    let dynamics = DynamicsModel::build(4, &[30], Activation::Tanh, &Device::Cpu)?;
    let termination = TerminationModel::build(4, &[30], Activation::Tanh, &Device::Cpu)?;
    let policy = CategoricalPolicy::build(4, 2, &[], Activation::Tanh, &Device::Cpu)?;
    let starts = vec![
        Observation::new(vec![0.01, 0.02, -0.03, 0.04]),
        Observation::new(vec![-0.02, 0.0, 0.01, -0.04]),
    ];
    let config = ImaginationConfig {
        episodes: 10,
        max_steps: 100,
    };
    let mut rng = StdRng::seed_from_u64(4);
    for _ in 0..5 {
        let batch = sample_model(&starts, &dynamics, &termination, &policy, &config, &mut rng)?;
        assert!((0. ..=100.).contains(&batch.mean_reward));
        assert!(batch.episode_lengths.iter().all(|&l| (1..=100).contains(&l)));
        assert_eq!(batch.episode_lengths.len() + batch.diverged, 10);
    }
    Ok(())
}

#[test]
fn runaway_states_are_dropped_instead_of_failing() -> Result<()> {
    let dynamics = DynamicsModel::build(4, &[], Activation::Tanh, &Device::Cpu)?;
    dynamics
        .net()
        .set_parameter("dynamics0.weight", &Tensor::zeros((4, 5), DType::F32, &Device::Cpu)?)?;
    dynamics
        .net()
        .set_parameter("dynamics0.bias", &Tensor::new(&[3e38f32; 4], &Device::Cpu)?)?;
    let termination = never_done(4)?;
    let policy = CategoricalPolicy::build(4, 2, &[], Activation::Tanh, &Device::Cpu)?;
    for (name, var) in policy.varmap().data().lock().unwrap().iter() {
        if name == "policy0.weight" {
            var.set(&Tensor::ones((2, 4), DType::F32, &Device::Cpu)?)?;
        }
    }

    let config = ImaginationConfig {
        episodes: 4,
        max_steps: 500,
    };
    let mut rng = StdRng::seed_from_u64(11);
    let start = Observation::new(vec![0.01, 0.02, -0.03, 0.04]);
    let batch = sample_model(
        std::slice::from_ref(&start),
        &dynamics,
        &termination,
        &policy,
        &config,
        &mut rng,
    )?;
    assert_eq!(batch.diverged, 4);
    assert!(batch.is_empty());
    assert_eq!(batch.mean_reward, 0.);
    Ok(())
}
