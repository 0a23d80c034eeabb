//! Runs model based training on a balancing task until interrupted.
//!
//! The first Ctrl+C asks the loop to stop once the current iteration (5 real episodes plus the
//! training that follows them) is done. A second Ctrl+C exits right away.

use anyhow::{Context, Result};
use clap::Parser;
use dyna_api::{
    DynaBuilder, DynaConfig,
    config::EnvKind,
};
use dyna_core::{Algorithm, cancel::CancellationToken};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, clap::ValueEnum)]
enum EnvChoice {
    Cartpole,
    Http,
    Gymnasium,
}

impl From<EnvChoice> for EnvKind {
    fn from(value: EnvChoice) -> Self {
        match value {
            EnvChoice::Cartpole => EnvKind::CartPole,
            EnvChoice::Http => EnvKind::Http,
            EnvChoice::Gymnasium => EnvKind::Gymnasium,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "dyna", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Which environment to train on.
    #[arg(long)]
    env: Option<EnvChoice>,

    /// Address of the gym-http-api server.
    #[arg(long)]
    base_url: Option<String>,

    /// Environment id, e.g. CartPole-v1.
    #[arg(long)]
    env_id: Option<String>,

    /// Record the run with the server side monitor into this directory.
    #[arg(long)]
    monitor_dir: Option<String>,

    /// Upload the monitor directory once training stops.
    #[arg(long)]
    upload: bool,

    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many iterations instead of waiting for Ctrl+C.
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Where checkpoints and the run summary are written.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut DynaConfig) {
        if let Some(env) = self.env {
            config.env.kind = env.into();
        }
        if let Some(base_url) = self.base_url {
            config.env.base_url = base_url;
        }
        if let Some(env_id) = self.env_id {
            config.env.env_id = env_id;
        }
        if self.monitor_dir.is_some() {
            config.env.monitor_dir = self.monitor_dir;
        }
        if self.upload {
            config.env.upload = true;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.max_iterations.is_some() {
            config.max_iterations = self.max_iterations;
        }
        if self.output_dir.is_some() {
            config.output_dir = self.output_dir;
        }
    }
}

fn listen_for_interrupts(cancel: CancellationToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the signal runtime")?;
    std::thread::Builder::new()
        .name("interrupts".to_owned())
        .spawn(move || {
            runtime.block_on(async move {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                warn!("interrupted, stopping after the current iteration");
                cancel.cancel();
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted again, exiting");
                    std::process::exit(130);
                }
            })
        })
        .context("failed to spawn the signal thread")?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => DynaConfig::load(path)?,
        None => DynaConfig::default(),
    };
    cli.apply(&mut config);

    let cancel = CancellationToken::new();
    listen_for_interrupts(cancel.clone())?;

    let mut trainer = DynaBuilder::new(config)
        .with_cancellation(cancel)
        .build()?;
    let summary = trainer.train().context("training failed")?;
    info!(
        iterations = summary.iterations,
        episodes = summary.episodes,
        best_real_reward = ?summary.best_real_reward(),
        "done"
    );
    Ok(())
}
