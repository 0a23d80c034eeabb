pub mod cartpole;
pub mod http;
#[cfg(feature = "python")]
pub mod python;

pub use cartpole::CartPole;
pub use http::{GymUploadSink, HttpGymClient, HttpGymEnv, MonitorSettings};
#[cfg(feature = "python")]
pub use python::GymEnv;
