pub mod env;
pub mod trainer;
