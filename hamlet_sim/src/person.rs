// Villagers and households.
//
// A `Person` is created at genesis or by a `Birth` command and is never
// removed: death clears `alive` so ids and vector slots stay stable. Every
// person belongs to exactly one `Family`, and the family's `owner` is the
// player allowed to issue commands about its members.
//
// Movement state is a `Waypoints` route plus a `TaskState` tag describing why
// the person is walking (or not). The movement executor consumes the route;
// the routine dispatcher and commands set it.
//
// Needs (`hunger`, `energy`, `health`) are integers on a 0..=100 scale.
// `effectiveness` turns them into the multiplicative work factor used by
// production and construction.
//
// See also: `movement.rs`, `routine.rs`, `world.rs` which owns the vectors.

use crate::config::PenaltyConfig;
use crate::types::{BuildingId, FamilyId, PersonId, PlayerId, TilePos};
use serde::{Deserialize, Serialize};

pub const STAT_MAX: u32 = 100;

/// What a person is doing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskState {
    #[default]
    Idle,
    TravelingToWork,
    Working,
    TravelingHome,
    Sleeping,
    /// An ad-hoc move ordered by a player.
    Walking,
}

impl TaskState {
    pub const fn is_traveling(self) -> bool {
        matches!(
            self,
            TaskState::TravelingToWork | TaskState::TravelingHome | TaskState::Walking
        )
    }
}

/// A path being walked. `cursor` indexes the next tile to enter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Waypoints {
    pub steps: Vec<TilePos>,
    pub cursor: usize,
}

impl Waypoints {
    /// Start walking `path` from `current`. A leading tile equal to `current`
    /// is skipped (the pathfinder includes the start).
    pub fn from_path(path: Vec<TilePos>, current: TilePos) -> Self {
        let cursor = usize::from(path.first() == Some(&current));
        Self {
            steps: path,
            cursor,
        }
    }

    pub fn next(&self) -> Option<TilePos> {
        self.steps.get(self.cursor).copied()
    }

    pub fn advance(&mut self) {
        self.cursor += 1;
    }

    pub fn is_done(&self) -> bool {
        self.cursor >= self.steps.len()
    }

    /// No route at all, as opposed to one walked to its end.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.steps.len().saturating_sub(self.cursor)
    }

    pub fn clear(&mut self) {
        self.steps.clear();
        self.cursor = 0;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub family: FamilyId,
    pub name: String,
    pub position: TilePos,
    pub route: Waypoints,
    pub task: TaskState,
    pub work_building: Option<BuildingId>,
    pub home: Option<BuildingId>,
    pub hunger: u32,
    pub energy: u32,
    pub health: u32,
    pub sick: bool,
    pub alive: bool,
}

impl Person {
    pub fn new(id: PersonId, family: FamilyId, name: impl Into<String>, position: TilePos) -> Self {
        Self {
            id,
            family,
            name: name.into(),
            position,
            route: Waypoints::default(),
            task: TaskState::Idle,
            work_building: None,
            home: None,
            hunger: 0,
            energy: STAT_MAX,
            health: STAT_MAX,
            sick: false,
            alive: true,
        }
    }

    /// Start walking `path` for reason `task`.
    pub fn set_route(&mut self, path: Vec<TilePos>, task: TaskState) {
        self.route = Waypoints::from_path(path, self.position);
        self.task = task;
    }

    /// Drop any route and stand still.
    pub fn stop(&mut self, task: TaskState) {
        self.route.clear();
        self.task = task;
    }

    /// Multiplicative work factor: hunger tier × sickness × low energy.
    pub fn effectiveness(&self, penalties: &PenaltyConfig) -> f32 {
        let mut factor = penalties.hunger_factor(self.hunger);
        if self.sick {
            factor *= penalties.sickness_factor;
        }
        if self.energy < penalties.low_energy_threshold {
            factor *= penalties.low_energy_factor;
        }
        factor
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub id: FamilyId,
    pub surname: String,
    pub owner: PlayerId,
    /// In birth order.
    pub members: Vec<PersonId>,
}
