//! Training entry point
//!
//! Loads an optional JSON configuration file, applies command-line
//! overrides on top, and runs the population training loop to completion.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use mep_rl::config::TrainConfig;
use mep_rl::metrics::LogMode;
use mep_rl::train::Trainer;

#[derive(Parser, Debug)]
#[command(name = "train", version, about = "Maximum-entropy population training")]
struct Args {
    /// JSON configuration file; command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Environment layout name
    #[arg(long)]
    layout: Option<String>,

    /// Number of policies in the population
    #[arg(long)]
    population_size: Option<usize>,

    /// Coefficient on the population diversity bonus
    #[arg(long)]
    ent_pop_coeff: Option<f32>,

    /// Master seed
    #[arg(long)]
    seed: Option<u64>,

    /// Number of parallel environments
    #[arg(long)]
    num_envs: Option<usize>,

    /// Rollout horizon in timesteps
    #[arg(long)]
    num_steps: Option<usize>,

    /// Total environment-step budget
    #[arg(long)]
    total_timesteps: Option<u64>,

    /// Base learning rate
    #[arg(long)]
    lr: Option<f64>,

    /// Checkpoint directory
    #[arg(long)]
    checkpoint_path: Option<String>,

    /// Checkpoint every N updates
    #[arg(long)]
    checkpoint_freq: Option<usize>,

    /// Metrics mode: enabled, offline, or disabled
    #[arg(long)]
    mode: Option<LogMode>,

    /// Experiment grouping label
    #[arg(long)]
    group: Option<String>,
}

impl Args {
    fn into_config(self) -> Result<TrainConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => TrainConfig::default(),
        };

        if let Some(layout) = self.layout {
            config.layout_name = layout;
        }
        if let Some(size) = self.population_size {
            config.population_size = size;
        }
        if let Some(coeff) = self.ent_pop_coeff {
            config.ent_pop_coeff = coeff;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(n) = self.num_envs {
            config.num_envs = n;
        }
        if let Some(n) = self.num_steps {
            config.num_steps = n;
        }
        if let Some(n) = self.total_timesteps {
            config.total_timesteps = n;
        }
        if let Some(lr) = self.lr {
            config.lr = lr;
        }
        if let Some(path) = self.checkpoint_path {
            config.checkpoint_path = Some(path);
        }
        if let Some(freq) = self.checkpoint_freq {
            config.checkpoint_freq = freq;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(group) = self.group {
            config.group = group;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config()?;
    let mut trainer = Trainer::new(config)?;
    let last = trainer.run()?;

    if let Some(reward) = last.get("orig_reward") {
        info!(orig_reward = reward, "training complete");
    }
    Ok(())
}
