pub mod losses;
pub mod optimizer;
pub mod policy;
pub mod sequential;
pub mod world_model;

pub use sequential::Activation;

use candle_core::{Device, Result, Tensor};

/// Stacks equally sized rows into a `(rows.len(), width)` tensor.
pub fn rows_to_tensor(rows: &[Vec<f32>], width: usize, device: &Device) -> Result<Tensor> {
    let mut data = Vec::with_capacity(rows.len() * width);
    for row in rows {
        if row.len() != width {
            candle_core::bail!("row of width {} does not match {}", row.len(), width);
        }
        data.extend_from_slice(row);
    }
    Tensor::from_vec(data, (rows.len(), width), device)
}
