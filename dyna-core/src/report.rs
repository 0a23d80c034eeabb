use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What a finished run hands to the outside world.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub iterations: usize,
    pub episodes: usize,
    pub real_rewards: Vec<f32>,
    pub dynamics_loss: Option<f32>,
    pub termination_loss: Option<f32>,
    pub policy_updates: usize,
    pub imagined_reward: Option<f32>,
    /// Files written when the learned parameters were exported.
    pub artifacts: Vec<PathBuf>,
}

impl RunSummary {
    pub fn best_real_reward(&self) -> Option<f32> {
        self.real_rewards.iter().copied().reduce(f32::max)
    }
}

/// Receives the results of a run once training stops (a scoreboard upload, a file on disk).
pub trait ReportSink {
    fn report(&mut self, summary: &RunSummary) -> Result<()>;
}

/// Discards the summary.
pub struct NoReport;

impl ReportSink for NoReport {
    fn report(&mut self, _summary: &RunSummary) -> Result<()> {
        Ok(())
    }
}

impl ReportSink for Vec<Box<dyn ReportSink>> {
    fn report(&mut self, summary: &RunSummary) -> Result<()> {
        for sink in self.iter_mut() {
            sink.report(summary)?;
        }
        Ok(())
    }
}

impl<S: ReportSink + ?Sized> ReportSink for Box<S> {
    fn report(&mut self, summary: &RunSummary) -> Result<()> {
        (**self).report(summary)
    }
}
