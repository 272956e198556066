//! Grid rendezvous environment
//!
//! A small two-agent coordination task: both agents must simultaneously
//! occupy the two (distinct) target tiles of a walled grid. Success pays a
//! joint sparse reward and ends the episode; a potential-based shaped
//! reward for moving toward the nearest target is reported separately so
//! the trainer can anneal it.
//!
//! Layouts are named, fixed ASCII grids in the spirit of the classic
//! Overcooked kitchens: `#` is a wall, `x` a target tile, and spaces are
//! floor. Agents spawn on distinct random floor tiles each episode.

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::env::{CoopEnv, CoopStep, NUM_AGENTS};

/// Reward paid to each agent when both stand on distinct targets.
const SUCCESS_REWARD: f32 = 20.0;

/// Scale of the potential-based shaped reward.
const SHAPING_SCALE: f32 = 0.1;

/// Episode time limit in steps.
const MAX_STEPS: usize = 400;

/// Discrete actions: four moves, stay, and interact (a no-op here, kept so
/// the action space matches the six-action convention of the task family).
pub const NUM_ACTIONS: i64 = 6;

const LAYOUT_CRAMPED_ROOM: &[&str] = &[
    "#######",
    "#     #",
    "# x x #",
    "#     #",
    "#######",
];

const LAYOUT_COORD_RING: &[&str] = &[
    "#######",
    "#    x#",
    "# ### #",
    "# ### #",
    "#x    #",
    "#######",
];

const LAYOUT_FORCED_COORD: &[&str] = &[
    "#########",
    "#   #   #",
    "# x # x #",
    "#   #   #",
    "#########",
];

/// A parsed grid layout.
#[derive(Debug, Clone)]
pub struct Layout {
    width: i32,
    height: i32,
    walls: Vec<bool>,
    targets: [(i32, i32); 2],
    floor: Vec<(i32, i32)>,
}

impl Layout {
    /// Look up a layout by name.
    ///
    /// Unknown names are a configuration error, surfaced before training.
    pub fn from_name(name: &str) -> Result<Self> {
        let rows = match name {
            "cramped_room" => LAYOUT_CRAMPED_ROOM,
            "coord_ring" => LAYOUT_COORD_RING,
            "forced_coord" => LAYOUT_FORCED_COORD,
            other => return Err(anyhow!("unknown layout: {other}")),
        };
        Self::parse(rows)
    }

    fn parse(rows: &[&str]) -> Result<Self> {
        let height = rows.len() as i32;
        let width = rows[0].len() as i32;
        let mut walls = vec![false; (width * height) as usize];
        let mut targets = Vec::new();
        let mut floor = Vec::new();

        for (y, row) in rows.iter().enumerate() {
            if row.len() as i32 != width {
                return Err(anyhow!("ragged layout row {y}"));
            }
            for (x, c) in row.chars().enumerate() {
                let (x, y) = (x as i32, y as i32);
                match c {
                    '#' => walls[(y * width + x) as usize] = true,
                    'x' => {
                        targets.push((x, y));
                        floor.push((x, y));
                    }
                    ' ' => floor.push((x, y)),
                    other => return Err(anyhow!("unknown layout tile: {other:?}")),
                }
            }
        }

        let targets: [(i32, i32); 2] = targets
            .try_into()
            .map_err(|_| anyhow!("layout must contain exactly two target tiles"))?;
        Ok(Self { width, height, walls, targets, floor })
    }

    fn is_wall(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return true;
        }
        self.walls[(y * self.width + x) as usize]
    }
}

/// Two-agent grid rendezvous environment.
#[derive(Debug, Clone)]
pub struct Rendezvous {
    layout: Layout,
    agents: [(i32, i32); NUM_AGENTS],
    steps: usize,
}

impl Rendezvous {
    /// Build the environment for a named layout.
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(Self::new(Layout::from_name(name)?))
    }

    /// Build the environment from a parsed layout.
    pub fn new(layout: Layout) -> Self {
        Self { layout, agents: [(0, 0); NUM_AGENTS], steps: 0 }
    }

    fn dist_to_nearest_target(&self, pos: (i32, i32)) -> i32 {
        self.layout
            .targets
            .iter()
            .map(|t| (t.0 - pos.0).abs() + (t.1 - pos.1).abs())
            .min()
            .unwrap_or(0)
    }

    fn observation(&self, agent: usize) -> Vec<f32> {
        let w = self.layout.width as f32;
        let h = self.layout.height as f32;
        let own = self.agents[agent];
        let other = self.agents[1 - agent];
        let [t0, t1] = self.layout.targets;
        vec![
            own.0 as f32 / w,
            own.1 as f32 / h,
            other.0 as f32 / w,
            other.1 as f32 / h,
            t0.0 as f32 / w,
            t0.1 as f32 / h,
            t1.0 as f32 / w,
            t1.1 as f32 / h,
            self.steps as f32 / MAX_STEPS as f32,
        ]
    }

    fn observations(&self) -> [Vec<f32>; NUM_AGENTS] {
        [self.observation(0), self.observation(1)]
    }

    fn apply_move(&self, pos: (i32, i32), action: i64) -> (i32, i32) {
        let (dx, dy) = match action {
            0 => (0, -1),
            1 => (0, 1),
            2 => (-1, 0),
            3 => (1, 0),
            // 4 = stay, 5 = interact
            _ => (0, 0),
        };
        let next = (pos.0 + dx, pos.1 + dy);
        if self.layout.is_wall(next.0, next.1) {
            pos
        } else {
            next
        }
    }

    fn on_distinct_targets(&self) -> bool {
        let [t0, t1] = self.layout.targets;
        let [a, b] = self.agents;
        (a == t0 && b == t1) || (a == t1 && b == t0)
    }
}

impl CoopEnv for Rendezvous {
    fn reset(&mut self, rng: &mut StdRng) -> [Vec<f32>; NUM_AGENTS] {
        let spawns: Vec<(i32, i32)> = self
            .layout
            .floor
            .choose_multiple(rng, NUM_AGENTS)
            .copied()
            .collect();
        self.agents = [spawns[0], spawns[1]];
        self.steps = 0;
        self.observations()
    }

    fn step(&mut self, _rng: &mut StdRng, actions: [i64; NUM_AGENTS]) -> Result<CoopStep> {
        for (agent, &action) in actions.iter().enumerate() {
            if !(0..NUM_ACTIONS).contains(&action) {
                return Err(anyhow!("action {action} out of range for agent {agent}"));
            }
        }

        let dist_before = [
            self.dist_to_nearest_target(self.agents[0]),
            self.dist_to_nearest_target(self.agents[1]),
        ];

        self.agents = [
            self.apply_move(self.agents[0], actions[0]),
            self.apply_move(self.agents[1], actions[1]),
        ];
        self.steps += 1;

        let mut shaped_reward = [0.0f32; NUM_AGENTS];
        for agent in 0..NUM_AGENTS {
            let after = self.dist_to_nearest_target(self.agents[agent]);
            shaped_reward[agent] = SHAPING_SCALE * (dist_before[agent] - after) as f32;
        }

        let success = self.on_distinct_targets();
        let reward = if success { [SUCCESS_REWARD; NUM_AGENTS] } else { [0.0; NUM_AGENTS] };
        let done = success || self.steps >= MAX_STEPS;

        Ok(CoopStep { obs: self.observations(), reward, shaped_reward, done })
    }

    fn obs_dim(&self) -> usize {
        9
    }

    fn num_actions(&self) -> i64 {
        NUM_ACTIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_known_layouts_parse() {
        for name in ["cramped_room", "coord_ring", "forced_coord"] {
            assert!(Layout::from_name(name).is_ok(), "layout {name} failed to parse");
        }
    }

    #[test]
    fn test_unknown_layout_rejected() {
        assert!(Layout::from_name("open_field").is_err());
    }

    #[test]
    fn test_reset_spawns_distinct_floor_tiles() {
        let mut env = Rendezvous::from_name("cramped_room").unwrap();
        let mut rng = rng();
        for _ in 0..20 {
            env.reset(&mut rng);
            assert_ne!(env.agents[0], env.agents[1]);
            for a in env.agents {
                assert!(!env.layout.is_wall(a.0, a.1));
            }
        }
    }

    #[test]
    fn test_observation_shape() {
        let mut env = Rendezvous::from_name("cramped_room").unwrap();
        let obs = env.reset(&mut rng());
        assert_eq!(obs[0].len(), env.obs_dim());
        assert_eq!(obs[1].len(), env.obs_dim());
    }

    #[test]
    fn test_walls_block_movement() {
        let mut env = Rendezvous::from_name("cramped_room").unwrap();
        let mut rng = rng();
        env.reset(&mut rng);
        env.agents = [(1, 1), (5, 3)];

        // Moving up and left from the corner hits walls both times.
        env.step(&mut rng, [0, 4]).unwrap();
        assert_eq!(env.agents[0], (1, 1));
        env.step(&mut rng, [2, 4]).unwrap();
        assert_eq!(env.agents[0], (1, 1));
    }

    #[test]
    fn test_success_pays_both_and_ends_episode() {
        let mut env = Rendezvous::from_name("cramped_room").unwrap();
        let mut rng = rng();
        env.reset(&mut rng);

        // Place agents one tile above the two targets (2,2) and (4,2).
        env.agents = [(2, 1), (4, 1)];
        let step = env.step(&mut rng, [1, 1]).unwrap();

        assert!(step.done);
        assert_eq!(step.reward, [SUCCESS_REWARD, SUCCESS_REWARD]);
    }

    #[test]
    fn test_shaped_reward_tracks_progress() {
        let mut env = Rendezvous::from_name("cramped_room").unwrap();
        let mut rng = rng();
        env.reset(&mut rng);
        env.agents = [(1, 2), (5, 2)]; // targets at (2,2) and (4,2)

        let step = env.step(&mut rng, [3, 2]).unwrap(); // both move inward
        assert!(step.shaped_reward[0] > 0.0);
        assert!(step.shaped_reward[1] > 0.0);
    }

    #[test]
    fn test_time_limit_terminates() {
        let mut env = Rendezvous::from_name("coord_ring").unwrap();
        let mut rng = rng();
        env.reset(&mut rng);

        let mut done = false;
        for _ in 0..MAX_STEPS + 1 {
            let step = env.step(&mut rng, [4, 4]).unwrap(); // both stay put
            if step.done {
                done = true;
                break;
            }
        }
        assert!(done, "episode must terminate by the time limit");
    }

    #[test]
    fn test_invalid_action_rejected() {
        let mut env = Rendezvous::from_name("cramped_room").unwrap();
        let mut rng = rng();
        env.reset(&mut rng);
        assert!(env.step(&mut rng, [6, 0]).is_err());
        assert!(env.step(&mut rng, [0, -1]).is_err());
    }
}
