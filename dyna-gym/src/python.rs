//! Gymnasium environments driven through an embedded interpreter.

use dyna_core::{
    env::{Env, EnvironmentDescription, Observation, SnapShot, Space},
    error::EnvError,
};
use pyo3::{
    PyErr, PyObject, PyResult, Python,
    types::{PyAnyMethods, PyDict},
};

fn python_error(err: PyErr) -> EnvError {
    EnvError::fatal(format!("python: {err}"))
}

pub struct GymEnv {
    env: PyObject,
    action_space: Space,
    observation_space: Space,
}

impl GymEnv {
    pub fn new(name: &str, render_mode: Option<String>) -> Result<GymEnv, EnvError> {
        Python::with_gil(|py| {
            let gym = py.import("gymnasium")?;
            let kwargs = PyDict::new(py);
            if let Some(render_mode) = render_mode {
                kwargs.set_item("render_mode", render_mode)?;
            }
            let env = gym.getattr("make")?.call((name,), Some(&kwargs))?;
            let action_space = env.getattr("action_space")?;
            let gym_spaces = py.import("gymnasium.spaces")?;
            let action_space = if action_space.is_instance(&gym_spaces.getattr("Discrete")?)? {
                Some(Space::Discrete(action_space.getattr("n")?.extract()?))
            } else {
                None
            };
            let observation_space: Vec<usize> =
                env.getattr("observation_space")?.getattr("shape")?.extract()?;
            PyResult::Ok((env.unbind(), action_space, observation_space))
        })
        .map_err(python_error)
        .and_then(|(env, action_space, observation_space)| {
            let action_space = action_space.ok_or_else(|| {
                EnvError::Protocol(format!("{name} does not have a discrete action space"))
            })?;
            Ok(GymEnv {
                env,
                action_space,
                observation_space: Space::continous_from_dims(observation_space),
            })
        })
    }
}

impl Env for GymEnv {
    fn reset(&mut self, seed: u64) -> Result<Observation, EnvError> {
        let state: Vec<f32> = Python::with_gil(|py| {
            let kwargs = PyDict::new(py);
            kwargs.set_item("seed", seed)?;
            let state = self.env.call_method(py, "reset", (), Some(&kwargs))?;
            state.bind(py).get_item(0)?.extract()
        })
        .map_err(python_error)?;
        Ok(Observation::new(state))
    }

    fn step(&mut self, action: usize) -> Result<SnapShot, EnvError> {
        let size = self.action_space.size();
        if action >= size {
            return Err(EnvError::InvalidAction { action, size });
        }
        Python::with_gil(|py| {
            let step = self.env.call_method(py, "step", (action,), None)?;
            let step = step.bind(py);
            let state: Vec<f32> = step.get_item(0)?.extract()?;
            PyResult::Ok(SnapShot {
                state: Observation::new(state),
                reward: step.get_item(1)?.extract()?,
                terminated: step.get_item(2)?.extract()?,
                truncated: step.get_item(3)?.extract()?,
            })
        })
        .map_err(python_error)
    }

    fn env_description(&self) -> EnvironmentDescription {
        EnvironmentDescription::new(self.observation_space.clone(), self.action_space.clone())
    }

    fn close(&mut self) -> Result<(), EnvError> {
        Python::with_gil(|py| self.env.call_method0(py, "close").map(|_| ())).map_err(python_error)
    }
}
