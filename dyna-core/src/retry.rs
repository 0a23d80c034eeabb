use crate::{
    env::{Env, EnvironmentDescription, Observation, SnapShot},
    error::EnvError,
};
use std::time::Duration;
use tracing::warn;

/// Bounded exponential backoff for transient transport failures.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Multiplier applied to the backoff after every failed attempt.
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Backoff to wait before retry number `retry` (zero based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.).powi(retry as i32);
        let backoff = self.initial_backoff.as_secs_f64() * factor;
        Duration::from_secs_f64(backoff.min(self.max_backoff.as_secs_f64()))
    }

    /// Runs `op` until it succeeds, fails with a non transient error, or retries run out.
    pub fn run<T>(&self, what: &str, op: impl FnMut() -> Result<T, EnvError>) -> Result<T, EnvError> {
        self.run_if(what, EnvError::is_transient, op)
    }

    /// Like [`RetryPolicy::run`], retrying only the errors accepted by `retryable`.
    pub fn run_if<T>(
        &self,
        what: &str,
        retryable: impl Fn(&EnvError) -> bool,
        mut op: impl FnMut() -> Result<T, EnvError>,
    ) -> Result<T, EnvError> {
        let mut retry = 0;
        loop {
            match op() {
                Err(err) if retryable(&err) && retry < self.max_retries => {
                    let backoff = self.backoff(retry);
                    warn!(operation = what, retry, ?backoff, error = %err, "retrying environment call");
                    std::thread::sleep(backoff);
                    retry += 1;
                }
                res => return res,
            }
        }
    }
}

/// Wraps an environment so that transient transport errors are retried.
///
/// `step` is only replayed when the failed request never left, so a step the service already
/// applied is never applied twice. Timeouts and server errors on `step` are returned as they are.
pub struct RetryingEnv<E: Env> {
    env: E,
    policy: RetryPolicy,
}

impl<E: Env> RetryingEnv<E> {
    pub fn new(env: E, policy: RetryPolicy) -> Self {
        Self { env, policy }
    }

    pub fn inner(&self) -> &E {
        &self.env
    }

}

impl<E: Env> Env for RetryingEnv<E> {
    fn reset(&mut self, seed: u64) -> Result<Observation, EnvError> {
        let env = &mut self.env;
        self.policy.run("reset", || env.reset(seed))
    }

    fn step(&mut self, action: usize) -> Result<SnapShot, EnvError> {
        let env = &mut self.env;
        self.policy
            .run_if("step", EnvError::is_resendable, || env.step(action))
    }

    fn env_description(&self) -> EnvironmentDescription {
        self.env.env_description()
    }

    fn start_session(&mut self) -> Result<(), EnvError> {
        let env = &mut self.env;
        self.policy.run("start_session", || env.start_session())
    }

    fn close(&mut self) -> Result<(), EnvError> {
        let env = &mut self.env;
        self.policy.run("close", || env.close())
    }
}
