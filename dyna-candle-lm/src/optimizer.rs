use candle_core::{Result, Tensor, backprop::GradStore};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap};
use std::fmt::Debug;

fn clip_grad(t: &Tensor, varmap: &VarMap, max_norm: f32) -> Result<GradStore> {
    let mut total_norm_squared = 0.0f32;
    let mut grad_store = t.backward()?;
    let all_vars = varmap.all_vars();
    for var in all_vars.iter() {
        if let Some(grad) = grad_store.get(var.as_tensor()) {
            total_norm_squared += grad.sqr()?.sum_all()?.to_scalar::<f32>()?;
        }
    }
    let total_norm = total_norm_squared.sqrt();
    if total_norm > max_norm {
        let clip_coef = (max_norm / (total_norm + 1e-6)) as f64;
        for var in all_vars.iter() {
            if let Some(old_grad) = grad_store.get(var.as_tensor()) {
                let new_grad = old_grad.affine(clip_coef, 0.)?;
                grad_store.insert(var.as_tensor(), new_grad);
            }
        }
    }
    Ok(grad_store)
}

/// Adam over every variable of one `VarMap`, optionally clipping the global gradient norm.
///
/// Each learned model owns one of these, so a phase can only ever move the parameters of the
/// model it was handed.
pub struct OptimizerWithMaxGrad {
    pub optimizer: AdamW,
    pub max_grad_norm: Option<f32>,
    pub varmap: VarMap,
}

impl Debug for OptimizerWithMaxGrad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizerWithMaxGrad")
            .field("learning_rate", &self.optimizer.learning_rate())
            .field("max_grad_norm", &self.max_grad_norm)
            .finish()
    }
}

impl OptimizerWithMaxGrad {
    pub fn new(optimizer: AdamW, max_grad_norm: Option<f32>, varmap: VarMap) -> Self {
        Self {
            optimizer,
            max_grad_norm,
            varmap,
        }
    }

    /// Plain Adam (no weight decay) with the given step size.
    pub fn adam(varmap: &VarMap, learning_rate: f64, max_grad_norm: Option<f32>) -> Result<Self> {
        let params = ParamsAdamW {
            lr: learning_rate,
            weight_decay: 0.,
            ..Default::default()
        };
        let optimizer = AdamW::new(varmap.all_vars(), params)?;
        Ok(Self::new(optimizer, max_grad_norm, varmap.clone()))
    }

    pub fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        let grads = if let Some(max_norm) = self.max_grad_norm {
            clip_grad(loss, &self.varmap, max_norm)?
        } else {
            loss.backward()?
        };
        self.optimizer.step(&grads)
    }
}

#[cfg(test)]
mod test {
    use super::OptimizerWithMaxGrad;
    use candle_core::{DType, Device, Result, Tensor};
    use candle_nn::{Init, VarMap};

    #[test]
    fn adam_moves_parameters_downhill() -> Result<()> {
        let varmap = VarMap::new();
        let w = varmap.get((1,), "w", Init::Const(3.), DType::F32, &Device::Cpu)?;
        let mut optimizer = OptimizerWithMaxGrad::adam(&varmap, 0.1, None)?;
        for _ in 0..50 {
            let loss = w.sqr()?.sum_all()?;
            optimizer.backward_step(&loss)?;
        }
        let w = w.to_vec1::<f32>()?[0];
        assert!(w.abs() < 3., "w = {w}");
        Ok(())
    }

    #[test]
    fn clipping_bounds_the_step() -> Result<()> {
        let varmap = VarMap::new();
        let w = varmap.get((1,), "w", Init::Const(0.), DType::F32, &Device::Cpu)?;
        let mut optimizer = OptimizerWithMaxGrad::adam(&varmap, 0.5, Some(1.))?;
        let target = Tensor::new(&[1000f32], &Device::Cpu)?;
        let loss = w.sub(&target)?.sqr()?.sum_all()?;
        optimizer.backward_step(&loss)?;
        let w = w.to_vec1::<f32>()?[0];
        assert!(w > 0. && w <= 0.5 + 1e-4, "w = {w}");
        Ok(())
    }
}
