use dyna_candle_lm::{
    losses::CostKind, optimizer::OptimizerWithMaxGrad, rows_to_tensor,
    world_model::SupervisedModel,
};
use dyna_core::{Result, budget::TrainingBudget, samples::SupervisedSample};
use rand::{Rng, seq::SliceRandom};
use tracing::{info, warn};

/// Minibatch training of `model` on every sample in `samples` until `budget` runs out.
///
/// Each pass over the data is reshuffled. Returns the loss of the last minibatch, measured
/// before its update, or `None` when nothing was trained or the loss is not finite.
pub fn train_model<S, M, R>(
    samples: &[S],
    model: &M,
    optimizer: &mut OptimizerWithMaxGrad,
    cost: CostKind,
    budget: &TrainingBudget,
    batch_size: usize,
    rng: &mut R,
) -> Result<Option<f32>>
where
    S: SupervisedSample,
    M: SupervisedModel,
    R: Rng + ?Sized,
{
    if samples.is_empty() {
        return Ok(None);
    }
    let batch_size = batch_size.max(1);
    let deadline = budget.start();
    let mut order: Vec<usize> = (0..samples.len()).collect();
    let mut steps = 0;
    let mut last_loss = None;
    'epochs: loop {
        order.shuffle(rng);
        for batch in order.chunks(batch_size) {
            if deadline.expired(steps) {
                break 'epochs;
            }
            let inputs: Vec<Vec<f32>> = batch.iter().map(|&i| samples[i].input()).collect();
            let targets: Vec<Vec<f32>> = batch.iter().map(|&i| samples[i].target()).collect();
            let inputs = rows_to_tensor(&inputs, model.input_size(), model.device())?;
            let targets = rows_to_tensor(&targets, model.output_size(), model.device())?;
            let prediction = model.forward_batch(&inputs)?;
            let loss = cost.loss(&prediction, &targets)?;
            last_loss = Some(loss.to_scalar::<f32>()?);
            optimizer.backward_step(&loss)?;
            steps += 1;
        }
    }
    match last_loss {
        Some(loss) if !loss.is_finite() => {
            warn!(model = model.name(), steps, loss, "model diverged");
            Ok(None)
        }
        Some(loss) => {
            info!(model = model.name(), steps, loss, "model trained");
            Ok(Some(loss))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod test {
    use super::train_model;
    use candle_core::Device;
    use dyna_candle_lm::{
        Activation, losses::CostKind, optimizer::OptimizerWithMaxGrad, world_model::TerminationModel,
    };
    use dyna_core::{
        budget::TrainingBudget, env::Observation, samples::TerminationSample,
    };
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn nothing_to_train_on() -> dyna_core::Result<()> {
        let model = TerminationModel::build(2, &[4], Activation::Tanh, &Device::Cpu)?;
        let mut optimizer = OptimizerWithMaxGrad::adam(model.net().varmap(), 1e-3, None)?;
        let mut rng = StdRng::seed_from_u64(0);
        let samples: Vec<TerminationSample> = vec![];
        let loss = train_model(
            &samples,
            &model,
            &mut optimizer,
            CostKind::SigmoidCrossEntropy,
            &TrainingBudget::steps(10),
            30,
            &mut rng,
        )?;
        assert_eq!(loss, None);
        Ok(())
    }

    #[test]
    fn termination_model_separates_labels() -> dyna_core::Result<()> {
        let model = TerminationModel::build(1, &[8], Activation::Tanh, &Device::Cpu)?;
        let mut optimizer = OptimizerWithMaxGrad::adam(model.net().varmap(), 1e-2, None)?;
        let mut rng = StdRng::seed_from_u64(3);
        let samples: Vec<TerminationSample> = (0..40)
            .map(|i| {
                let x = i as f32 / 20. - 1.;
                TerminationSample {
                    state: Observation::new(vec![x]),
                    action: 0,
                    terminal: x > 0.5,
                }
            })
            .collect();
        let first = train_model(
            &samples,
            &model,
            &mut optimizer,
            CostKind::SigmoidCrossEntropy,
            &TrainingBudget::steps(1),
            40,
            &mut rng,
        )?
        .unwrap_or(f32::MAX);
        let last = train_model(
            &samples,
            &model,
            &mut optimizer,
            CostKind::SigmoidCrossEntropy,
            &TrainingBudget::steps(1500),
            40,
            &mut rng,
        )?
        .unwrap_or(f32::MAX);
        assert!(last < first, "{last} >= {first}");
        assert!(last < 0.2, "loss {last}");
        Ok(())
    }
}
