use candle_core::Device;
use dyna_agents::model_trainer::train_model;
use dyna_candle_lm::{
    Activation, losses::CostKind, optimizer::OptimizerWithMaxGrad, rows_to_tensor,
    world_model::{DynamicsModel, SupervisedModel},
};
use dyna_core::{
    Result,
    budget::TrainingBudget,
    env::Observation,
    samples::{SupervisedSample, Transition},
};
use rand::{Rng, SeedableRng, rngs::StdRng};

const OFFSET: [f32; 2] = [0.5, -0.25];

fn offset_dataset(n: usize, rng: &mut StdRng) -> Vec<Transition> {
    (0..n)
        .map(|_| {
            let state: Vec<f32> = (0..2).map(|_| rng.random_range(-1.0..1.0)).collect();
            let next_state = state.iter().zip(OFFSET).map(|(s, o)| s + o).collect();
            Transition {
                state: Observation::new(state),
                action: rng.random_range(0..2),
                next_state: Observation::new(next_state),
            }
        })
        .collect()
}

fn dataset_loss(model: &DynamicsModel, samples: &[Transition]) -> Result<f32> {
    let inputs: Vec<Vec<f32>> = samples.iter().map(|s| s.input()).collect();
    let targets: Vec<Vec<f32>> = samples.iter().map(|s| s.target()).collect();
    let inputs = rows_to_tensor(&inputs, model.input_size(), model.device())?;
    let targets = rows_to_tensor(&targets, model.output_size(), model.device())?;
    let prediction = model.forward_batch(&inputs)?;
    Ok(CostKind::Mse.loss(&prediction, &targets)?.to_scalar::<f32>()?)
}

#[test]
fn dynamics_learns_a_constant_offset() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(11);
    let samples = offset_dataset(300, &mut rng);
    let model = DynamicsModel::build(2, &[], Activation::Tanh, &Device::Cpu)?;
    let mut optimizer = OptimizerWithMaxGrad::adam(model.net().varmap(), 5e-3, None)?;
    let before = dataset_loss(&model, &samples)?;
    let last_batch = train_model(
        &samples,
        &model,
        &mut optimizer,
        CostKind::Mse,
        &TrainingBudget::steps(4000),
        30,
        &mut rng,
    )?;
    let after = dataset_loss(&model, &samples)?;
    assert!(last_batch.is_some());
    assert!(after < before, "{after} >= {before}");
    assert!(after < 1e-3, "mse {after}");
    Ok(())
}

#[test]
fn retraining_without_new_data_keeps_the_loss() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(5);
    let samples = offset_dataset(300, &mut rng);
    let model = DynamicsModel::build(2, &[], Activation::Tanh, &Device::Cpu)?;
    let mut optimizer = OptimizerWithMaxGrad::adam(model.net().varmap(), 5e-3, None)?;
    let budget = TrainingBudget::steps(4000);
    train_model(&samples, &model, &mut optimizer, CostKind::Mse, &budget, 30, &mut rng)?;
    let first = dataset_loss(&model, &samples)?;
    let budget = TrainingBudget::steps(200);
    train_model(&samples, &model, &mut optimizer, CostKind::Mse, &budget, 30, &mut rng)?;
    let second = dataset_loss(&model, &samples)?;
    assert!((second - first).abs() < 1e-3, "{first} -> {second}");
    Ok(())
}
