//! Checkpoint persistence
//!
//! Population members are persisted as safetensors files under
//! `<dir>/member<p>/update<u>_reward<r>.safetensors`. The directory is
//! probed for writability when the checkpointer is built, so a bad path
//! fails before any training happens rather than after hours of it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::policy::{ActorCritic, ParamSnapshot};

/// Writes population snapshots to disk.
#[derive(Debug)]
pub struct Checkpointer {
    dir: PathBuf,
    scratch: ActorCritic,
}

impl Checkpointer {
    /// Create a checkpointer rooted at `dir`.
    ///
    /// Creates the directory if needed and verifies it is writable.
    pub fn new<P: AsRef<Path>>(dir: P, obs_dim: i64, action_dim: i64) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating checkpoint directory {}", dir.display()))?;

        let probe = dir.join(".write_probe");
        std::fs::write(&probe, b"ok")
            .with_context(|| format!("checkpoint directory {} is not writable", dir.display()))?;
        std::fs::remove_file(&probe).ok();

        Ok(Self {
            dir,
            scratch: ActorCritic::new(obs_dim, action_dim, 0),
        })
    }

    /// Directory checkpoints are written under
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist one member's parameters.
    ///
    /// `mean_reward` is the member's evaluation return; it goes into the
    /// filename so runs can be skimmed from a directory listing.
    pub fn save_member(
        &mut self,
        snapshot: &ParamSnapshot,
        member: usize,
        update_step: u64,
        mean_reward: f64,
    ) -> Result<PathBuf> {
        let member_dir = self.dir.join(format!("member{member}"));
        std::fs::create_dir_all(&member_dir)
            .with_context(|| format!("creating {}", member_dir.display()))?;

        let path = member_dir.join(format!(
            "update{update_step}_reward{mean_reward:.2}.safetensors"
        ));
        snapshot.load_into(&self.scratch)?;
        self.scratch
            .save(&path)
            .with_context(|| format!("writing checkpoint {}", path.display()))?;
        Ok(path)
    }

    /// Load a snapshot back from a checkpoint file.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<ParamSnapshot> {
        self.scratch
            .load(path.as_ref())
            .with_context(|| format!("reading checkpoint {}", path.as_ref().display()))?;
        Ok(ParamSnapshot::from_policy(&self.scratch))
    }
}
