// config + builders + report sinks, everything the binary needs to assemble a run
pub mod builders;
pub mod config;
pub mod sinks;

pub use builders::{env::EnvBuilder, trainer::DynaBuilder};
pub use config::DynaConfig;
