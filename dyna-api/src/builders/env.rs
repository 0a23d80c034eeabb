use crate::config::{EnvConfig, EnvKind};
use anyhow::{Context, Result};
use dyna_core::{
    env::Env,
    retry::{RetryPolicy, RetryingEnv},
};
use dyna_gym::{CartPole, GymUploadSink, HttpGymClient, HttpGymEnv, MonitorSettings};
use std::time::Duration;

pub trait EnvBuilderTrait {
    type Env: Env;

    fn build_env(&self) -> Result<Self::Env>;
}

impl<E: Env, F> EnvBuilderTrait for F
where
    F: Fn() -> Result<E>,
{
    type Env = E;

    fn build_env(&self) -> Result<Self::Env> {
        (self)()
    }
}

/// Builds the environment named by an [`EnvConfig`]. Remote environments are wrapped in a
/// [`RetryingEnv`].
#[derive(Debug, Clone)]
pub struct EnvBuilder {
    pub config: EnvConfig,
    pub retry: RetryPolicy,
}

impl EnvBuilder {
    pub fn new(config: EnvConfig, retry: RetryPolicy) -> Self {
        Self { config, retry }
    }

    fn client(&self) -> Result<HttpGymClient> {
        let secs = self.config.request_timeout_secs;
        let timeout = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("request_timeout_secs of {secs} is not a valid timeout"))?;
        HttpGymClient::new(&self.config.base_url, timeout).context("failed to build http client")
    }

    fn http_env(&self) -> Result<RetryingEnv<HttpGymEnv>> {
        let client = self.client()?;
        let monitor = self.config.monitor_dir.as_deref().map(MonitorSettings::new);
        let env = self
            .retry
            .run("create", || {
                HttpGymEnv::create(client.clone(), &self.config.env_id, monitor.clone())
            })
            .with_context(|| {
                format!(
                    "failed to create {} on {}",
                    self.config.env_id, self.config.base_url
                )
            })?;
        Ok(RetryingEnv::new(env, self.retry.clone()))
    }

    /// The scoreboard upload, when configured for a monitored remote environment.
    pub fn upload_sink(&self) -> Result<Option<GymUploadSink>> {
        let (EnvKind::Http, true, Some(dir)) = (
            self.config.kind,
            self.config.upload,
            self.config.monitor_dir.as_deref(),
        ) else {
            return Ok(None);
        };
        let sink = GymUploadSink::new(self.client()?, dir, self.config.api_key.clone());
        Ok(Some(sink))
    }
}

impl EnvBuilderTrait for EnvBuilder {
    type Env = Box<dyn Env>;

    fn build_env(&self) -> Result<Self::Env> {
        match self.config.kind {
            EnvKind::CartPole => Ok(Box::new(CartPole::default())),
            EnvKind::Http => Ok(Box::new(self.http_env()?)),
            #[cfg(feature = "python")]
            EnvKind::Gymnasium => {
                let env = dyna_gym::GymEnv::new(&self.config.env_id, None)
                    .with_context(|| format!("failed to make {}", self.config.env_id))?;
                Ok(Box::new(env))
            }
            #[cfg(not(feature = "python"))]
            EnvKind::Gymnasium => {
                anyhow::bail!("gymnasium environments need the `python` feature")
            }
        }
    }
}
