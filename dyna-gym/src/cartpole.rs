//! In process `CartPole-v1`, so the training loop can run without a simulation service.

use dyna_core::{
    env::{Env, EnvironmentDescription, Observation, SnapShot, Space},
    error::EnvError,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

const GRAVITY: f32 = 9.8;
const CART_MASS: f32 = 1.0;
const POLE_MASS: f32 = 0.1;
const POLE_LENGTH: f32 = 0.5;
const FORCE_MAG: f32 = 10.0;
const DT: f32 = 0.02;
const X_THRESHOLD: f32 = 2.4;
const THETA_THRESHOLD: f32 = 12.0 * std::f32::consts::PI / 180.0;
pub const MAX_STEPS: usize = 500;

pub struct CartPole {
    state: [f32; 4],
    ticks: usize,
    max_steps: usize,
    init_range: f32,
    rng: StdRng,
    needs_reset: bool,
}

impl Default for CartPole {
    fn default() -> Self {
        Self::new(MAX_STEPS)
    }
}

impl CartPole {
    pub fn new(max_steps: usize) -> Self {
        Self {
            state: [0.; 4],
            ticks: 0,
            max_steps,
            init_range: 0.05,
            rng: StdRng::seed_from_u64(0),
            needs_reset: true,
        }
    }

    fn observation(&self) -> Observation {
        Observation::new(self.state.to_vec())
    }
}

impl Env for CartPole {
    fn reset(&mut self, seed: u64) -> Result<Observation, EnvError> {
        self.rng = StdRng::seed_from_u64(seed);
        for v in self.state.iter_mut() {
            *v = self.rng.random_range(-self.init_range..self.init_range);
        }
        self.ticks = 0;
        self.needs_reset = false;
        Ok(self.observation())
    }

    fn step(&mut self, action: usize) -> Result<SnapShot, EnvError> {
        if action > 1 {
            return Err(EnvError::InvalidAction { action, size: 2 });
        }
        if self.needs_reset {
            return Err(EnvError::Protocol(
                "step called on a finished episode".to_owned(),
            ));
        }
        let [x, x_dot, theta, theta_dot] = self.state;
        let force = if action == 1 { FORCE_MAG } else { -FORCE_MAG };
        let (sin_theta, cos_theta) = theta.sin_cos();

        let total_mass = CART_MASS + POLE_MASS;
        let pole_mass_length = POLE_MASS * POLE_LENGTH;
        let temp = (force + pole_mass_length * theta_dot * theta_dot * sin_theta) / total_mass;
        let theta_acc = (GRAVITY * sin_theta - cos_theta * temp)
            / (POLE_LENGTH * (4.0 / 3.0 - POLE_MASS * cos_theta * cos_theta / total_mass));
        let x_acc = temp - pole_mass_length * theta_acc * cos_theta / total_mass;

        self.state = [
            x + DT * x_dot,
            x_dot + DT * x_acc,
            theta + DT * theta_dot,
            theta_dot + DT * theta_acc,
        ];
        self.ticks += 1;

        let terminated = self.state[0].abs() > X_THRESHOLD || self.state[2].abs() > THETA_THRESHOLD;
        let truncated = !terminated && self.ticks >= self.max_steps;
        self.needs_reset = terminated || truncated;
        Ok(SnapShot {
            state: self.observation(),
            reward: 1.,
            terminated,
            truncated,
        })
    }

    fn env_description(&self) -> EnvironmentDescription {
        let high = vec![X_THRESHOLD * 2., f32::MAX, THETA_THRESHOLD * 2., f32::MAX];
        let low = high.iter().map(|h| -h).collect();
        EnvironmentDescription::new(
            Space::Continous {
                min: Some(low),
                max: Some(high),
                size: 4,
            },
            Space::Discrete(2),
        )
    }
}
