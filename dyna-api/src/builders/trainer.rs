use crate::{
    builders::env::{EnvBuilder, EnvBuilderTrait},
    config::DynaConfig,
    sinks::JsonReportSink,
};
use anyhow::{Context, Result};
use candle_core::Device;
use dyna_agents::{DefaultDynaHooks, DynaModels, DynaTrainer};
use dyna_core::{cancel::CancellationToken, env::Env, report::ReportSink, retry::RetryPolicy};
use tracing::info;

pub struct DynaBuilder {
    pub config: DynaConfig,
    pub device: Device,
    pub cancel: CancellationToken,
}

impl DynaBuilder {
    pub fn new(config: DynaConfig) -> Self {
        Self {
            config,
            device: Device::Cpu,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn env_builder(&self) -> EnvBuilder {
        EnvBuilder::new(self.config.env.clone(), RetryPolicy::from(&self.config.retry))
    }

    fn report_sinks(&self) -> Result<Vec<Box<dyn ReportSink>>> {
        let mut sinks: Vec<Box<dyn ReportSink>> = vec![];
        if let Some(dir) = &self.config.output_dir {
            sinks.push(Box::new(JsonReportSink::in_dir(dir)));
        }
        if let Some(upload) = self.env_builder().upload_sink()? {
            sinks.push(Box::new(upload));
        }
        Ok(sinks)
    }

    /// Assembles a trainer around the environment described by the configuration.
    pub fn build(self) -> Result<DynaTrainer<Box<dyn Env>, DefaultDynaHooks>> {
        let env = self.env_builder().build_env()?;
        self.build_with_env(env)
    }

    /// Same as [`DynaBuilder::build`] with an environment constructed elsewhere.
    pub fn build_with_env<E: Env>(self, env: E) -> Result<DynaTrainer<E, DefaultDynaHooks>> {
        let description = env.env_description();
        let observation_size = description.observation_size();
        let action_size = description.action_size();
        info!(observation_size, action_size, "building models");
        let models = DynaModels::build(
            observation_size,
            action_size,
            &self.config.model_spec(),
            &self.device,
        )
        .context("failed to build models")?;
        let sinks = self.report_sinks()?;
        let hooks = DefaultDynaHooks::new(self.config.max_iterations);
        Ok(DynaTrainer::new(env, models, self.config.params(), hooks)
            .with_seed(self.config.seed)
            .with_cancellation(self.cancel)
            .with_report_sink(Box::new(sinks)))
    }
}
