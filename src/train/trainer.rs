//! Population training loop
//!
//! The trainer runs the full MEP iteration cycle: a trainee is drawn from
//! the population, collects a rollout against its current peers, is
//! optimized with PPO, and is written back before the next trainee is
//! drawn. Adam's moment estimates deliberately persist across rotations;
//! only the policy parameters are swapped.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tch::nn;
use tracing::{debug, info};

use crate::buffer::RolloutBuffer;
use crate::checkpoint::Checkpointer;
use crate::config::TrainConfig;
use crate::env::pool::EnvPool;
use crate::env::rendezvous::{Layout, Rendezvous};
use crate::env::{CoopEnv, NUM_AGENTS};
use crate::metrics::{Metrics, MetricsSink};
use crate::policy::{ActorCritic, ParamSnapshot};
use crate::population::{other_indices, Population};
use crate::train::rollout::RolloutCollector;
use crate::train::schedule::LrSchedule;
use crate::train::update::run_update;

/// Drives a full population training run.
pub struct Trainer {
    config: TrainConfig,
    population: Population,
    collector: RolloutCollector<Rendezvous>,
    buffer: RolloutBuffer,
    trainee: ActorCritic,
    trainee_index: usize,
    peers: Vec<ActorCritic>,
    eval_policy: ActorCritic,
    optimizer: nn::Optimizer,
    schedule: LrSchedule,
    sink: MetricsSink,
    checkpointer: Option<Checkpointer>,
    rng: StdRng,
}

impl Trainer {
    /// Build a trainer from a validated configuration.
    ///
    /// Fails fast on any configuration error, including an unwritable
    /// checkpoint directory.
    pub fn new(config: TrainConfig) -> Result<Self> {
        config.validate().context("invalid training configuration")?;

        let layout = Layout::from_name(&config.layout_name)?;
        let pool = EnvPool::new(
            || Rendezvous::new(layout.clone()),
            config.num_envs,
            config.seed,
        );
        let obs_dim = pool.obs_dim() as i64;
        let action_dim = pool.num_actions();

        let mut rng = StdRng::seed_from_u64(config.seed);
        let population =
            Population::new(config.population_size, obs_dim, action_dim, config.seed as i64)?;
        let trainee_index = population.select_next_trainee(&mut rng);

        let trainee = ActorCritic::new(obs_dim, action_dim, config.seed as i64);
        population.member(trainee_index).load_into(&trainee)?;
        let peers: Vec<ActorCritic> = (1..config.population_size)
            .map(|p| ActorCritic::new(obs_dim, action_dim, config.seed as i64 + p as i64))
            .collect();
        let eval_policy = ActorCritic::new(obs_dim, action_dim, config.seed as i64);

        let optimizer = trainee.optimizer(config.lr)?;
        let schedule = LrSchedule::new(
            config.lr,
            config.anneal_lr,
            config.num_updates(),
            config.update_epochs,
            config.num_minibatches,
        );

        let checkpoint_dir = config.checkpoint_path.clone();
        let checkpointer = checkpoint_dir
            .as_deref()
            .map(|dir| Checkpointer::new(dir, obs_dim, action_dim))
            .transpose()?;
        let sink = MetricsSink::new(
            config.mode,
            &config.group,
            checkpoint_dir.as_deref().map(std::path::Path::new),
        )?;

        let buffer = RolloutBuffer::new(
            config.num_steps,
            config.num_actors(),
            pool.obs_dim(),
        );
        let collector = RolloutCollector::new(pool);

        info!(
            layout = %config.layout_name,
            population = config.population_size,
            num_updates = config.num_updates(),
            seed = config.seed,
            "trainer initialized"
        );

        Ok(Self {
            config,
            population,
            collector,
            buffer,
            trainee,
            trainee_index,
            peers,
            eval_policy,
            optimizer,
            schedule,
            sink,
            checkpointer,
            rng,
        })
    }

    /// Population being trained
    pub fn population(&self) -> &Population {
        &self.population
    }

    /// Metrics from the most recent iteration
    pub fn last_metrics(&self) -> &Metrics {
        &self.sink.last
    }

    /// Run the full training loop.
    ///
    /// Returns the metrics of the final iteration.
    pub fn run(&mut self) -> Result<Metrics> {
        let num_updates = self.config.num_updates();
        for update_step in 1..=num_updates {
            self.iterate(update_step as u64)?;
        }
        Ok(self.sink.last.clone())
    }

    /// Run one training iteration: collect, estimate, update, rotate.
    pub fn iterate(&mut self, update_step: u64) -> Result<()> {
        let steps_per_update = (self.config.num_steps * self.config.num_envs) as u64;
        let env_step = (update_step - 1) * steps_per_update;

        // Peers hold every member except the trainee, fixed for the pass.
        for (peer, &index) in self
            .peers
            .iter()
            .zip(other_indices(self.population.size(), self.trainee_index).iter())
        {
            self.population.member(index).load_into(peer)?;
        }

        self.buffer.reset();
        let report = self.collector.collect(
            &self.trainee,
            &self.peers,
            &mut self.buffer,
            &self.config,
            env_step,
            &mut self.rng,
        )?;

        self.buffer.compute_advantages(
            &report.bootstrap,
            self.config.gamma,
            self.config.gae_lambda,
        )?;
        let batch = self.buffer.batch()?;

        let stats = run_update(
            &self.trainee,
            &mut self.optimizer,
            &batch,
            &self.config,
            &mut self.schedule,
            &mut self.rng,
        )?;

        self.population
            .reinsert(self.trainee_index, ParamSnapshot::from_policy(&self.trainee));

        let mut metrics = Metrics::new();
        metrics.insert("update_step".into(), update_step as f64);
        metrics.insert("env_step".into(), (env_step + steps_per_update) as f64);
        metrics.insert("trainee".into(), self.trainee_index as f64);
        // Per-environment reward sums are halved so a cooperative success
        // counts once, not once per agent.
        metrics.insert(
            "orig_reward".into(),
            self.buffer.sum_per_env(|s| &s.orig_rewards, self.config.num_envs)
                / NUM_AGENTS as f64,
        );
        metrics.insert(
            "shaped_reward".into(),
            self.buffer.sum_per_env(|s| &s.shaped_rewards, self.config.num_envs)
                / NUM_AGENTS as f64,
        );
        metrics.insert(
            "neg_logp_pop_new".into(),
            self.buffer.mean_of(|s| &s.neg_logp_pop_new),
        );
        metrics.insert(
            "entropy_pop_delta".into(),
            self.buffer.mean_of(|s| &s.entropy_deltas),
        );
        metrics.insert(
            "neg_logp_pop_delta".into(),
            self.buffer.mean_of(|s| &s.neg_logp_deltas),
        );
        if !report.episodes.is_empty() {
            let n = report.episodes.len() as f64;
            metrics.insert(
                "episode_return".into(),
                report.episodes.iter().map(|(r, _)| r).sum::<f64>() / n,
            );
            metrics.insert(
                "episode_length".into(),
                report.episodes.iter().map(|(_, l)| *l as f64).sum::<f64>() / n,
            );
        }
        metrics.insert("total_loss".into(), stats.total_loss);
        metrics.insert("policy_loss".into(), stats.policy_loss);
        metrics.insert("value_loss".into(), stats.value_loss);
        metrics.insert("entropy".into(), stats.entropy);
        metrics.insert("lr".into(), stats.lr);
        self.sink.emit(metrics)?;

        if self.checkpointer.is_some()
            && self.config.checkpoint_freq > 0
            && update_step as usize % self.config.checkpoint_freq == 0
        {
            self.checkpoint_population(update_step)?;
        }

        // Rotate: the outgoing trainee is already reinserted; the next one
        // may be the same member again.
        self.trainee_index = self.population.select_next_trainee(&mut self.rng);
        self.population
            .member(self.trainee_index)
            .load_into(&self.trainee)?;
        debug!(trainee = self.trainee_index, "rotated trainee");

        Ok(())
    }

    /// Evaluate and persist every population member.
    fn checkpoint_population(&mut self, update_step: u64) -> Result<()> {
        for p in 0..self.population.size() {
            self.population.member(p).load_into(&self.eval_policy)?;
            let (episode_return, episode_length) = self.eval_episode()?;
            if let Some(ckpt) = self.checkpointer.as_mut() {
                let path =
                    ckpt.save_member(self.population.member(p), p, update_step, episode_return)?;
                info!(
                    member = p,
                    update_step,
                    episode_return,
                    episode_length,
                    path = %path.display(),
                    "checkpoint written"
                );
            }
        }
        Ok(())
    }

    /// Run one self-play evaluation episode with the policy currently in
    /// the evaluation slot. Returns agent 0's return and the length.
    fn eval_episode(&mut self) -> Result<(f64, u64)> {
        let mut env = Rendezvous::from_name(&self.config.layout_name)?;
        let mut obs = env.reset(&mut self.rng);
        let mut episode_return = 0.0f64;
        let mut length = 0u64;

        loop {
            let rows = vec![obs[0].clone(), obs[1].clone()];
            let (dist, _) = self.eval_policy.apply(&rows)?;
            let actions = dist.sample(&mut self.rng);
            let step = env.step(&mut self.rng, [actions[0], actions[1]])?;
            episode_return += step.reward[0] as f64;
            length += 1;
            if step.done {
                break;
            }
            obs = step.obs;
        }
        Ok((episode_return, length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::LogMode;

    fn tiny_config() -> TrainConfig {
        let mut config = TrainConfig::new()
            .num_envs(4)
            .num_steps(8)
            .num_minibatches(2)
            .update_epochs(1)
            .total_timesteps(64)
            .population_size(2)
            .checkpoint_path(None)
            .seed(11);
        config.mode = LogMode::Disabled;
        config
    }

    #[test]
    fn test_trainer_rejects_invalid_config() {
        let config = tiny_config().num_minibatches(3);
        assert!(Trainer::new(config).is_err());
    }

    #[test]
    fn test_single_iteration_emits_metrics() {
        let mut trainer = Trainer::new(tiny_config()).unwrap();
        trainer.iterate(1).unwrap();

        let metrics = trainer.last_metrics();
        assert_eq!(metrics.get("update_step"), Some(&1.0));
        assert_eq!(metrics.get("env_step"), Some(&32.0));
        assert!(metrics.get("neg_logp_pop_new").copied().unwrap_or(0.0) > 0.0);
        assert!(metrics.get("total_loss").copied().unwrap_or(f64::NAN).is_finite());
    }

    #[test]
    fn test_run_covers_all_updates() {
        // 64 timesteps / 8 steps / 4 envs = 2 updates.
        let mut trainer = Trainer::new(tiny_config()).unwrap();
        let last = trainer.run().unwrap();
        assert_eq!(last.get("update_step"), Some(&2.0));
    }

    #[test]
    fn test_checkpointing_writes_members() {
        let dir = std::env::temp_dir().join("mep_rl_trainer_ckpt_test");
        std::fs::remove_dir_all(&dir).ok();

        let mut config = tiny_config()
            .checkpoint_path(Some(dir.to_str().unwrap()))
            .checkpoint_freq(2);
        config.mode = LogMode::Disabled;

        let mut trainer = Trainer::new(config).unwrap();
        trainer.run().unwrap();

        // Two members, checkpointed at update 2.
        assert!(dir.join("member0").read_dir().unwrap().next().is_some());
        assert!(dir.join("member1").read_dir().unwrap().next().is_some());
        std::fs::remove_dir_all(&dir).ok();
    }
}
