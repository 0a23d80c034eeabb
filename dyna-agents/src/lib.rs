pub mod imagination;
pub mod model_trainer;
pub mod orchestrator;
pub mod policy_trainer;
pub mod trial;

pub use orchestrator::{
    DefaultDynaHooks, DynaHooks, DynaModels, DynaParams, DynaTrainer, ModelSpec, TrainerState,
};
