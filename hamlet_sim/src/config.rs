// Data-driven game configuration.
//
// All tunable simulation parameters live in `GameConfig`, loaded from JSON at
// startup. The sim reads balance numbers from the config rather than
// hard-coding them, and in multiplayer every participant must run an
// identical config (enforced by comparing `config_hash()` at handshake).
//
// Parameters are grouped into nested structs: `RoutineHours` (from
// `clock.rs`), `NeedsConfig`, `UpkeepConfig` and `PenaltyConfig`. Per-kind
// building data lives in `BuildingLayout` entries keyed by `BuildingKind` in
// the `buildings` map (see `catalog.rs`), and per-season weather odds in the
// `weather` map (see `weather.rs`).
//
// `validate()` is run by `GameEngine::new` and `GameEngine::restore`; an
// invalid config never produces an engine.
//
// See also: `sim.rs` which owns the `GameConfig`, `catalog.rs` for the
// building table.
//
// **Critical constraint: determinism.** Config values feed directly into
// simulation logic. All participants must use identical configs.

use crate::catalog::{self, BuildingLayout};
use crate::clock::RoutineHours;
use crate::types::{BuildingKind, ResourceKind, Season};
use crate::weather::{self, WeatherWeights};
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::Hasher;
use std::ops::RangeInclusive;

pub const WORLD_SIZE_RANGE: RangeInclusive<u32> = 8..=1024;
pub const TICKS_PER_HOUR_RANGE: RangeInclusive<u32> = 1..=3600;
pub const MAX_PLAYERS_RANGE: RangeInclusive<u32> = 1..=16;

/// Why a configuration was refused.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("world size {width}x{height} is outside 8..=1024 per axis")]
    WorldSize { width: u32, height: u32 },
    #[error("ticks_per_hour {0} is outside 1..=3600")]
    TicksPerHour(u32),
    #[error("max_players {0} is outside 1..=16")]
    MaxPlayers(u32),
    #[error("routine hours must satisfy wake < work_start < work_end < sleep < 24")]
    RoutineOrder,
    #[error("tile_capacity must be at least 1")]
    TileCapacity,
    #[error("max_command_lead_ticks must be at least 1")]
    CommandLead,
    #[error("hunger penalty tiers must have strictly increasing thresholds")]
    PenaltyTiers,
    #[error("invalid layout for {kind:?}: {reason}")]
    Layout { kind: BuildingKind, reason: String },
    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Per-person need rates. Stats are integers on a 0..=100 scale.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeedsConfig {
    pub hunger_per_hour: u32,
    /// Hunger removed by one daily meal.
    pub meal_relief: u32,
    /// Energy lost per hour while awake and not working.
    pub energy_drain_per_hour: u32,
    /// Energy lost per hour while `Working`.
    pub work_energy_drain_per_hour: u32,
    /// Energy regained per hour while `Sleeping`.
    pub sleep_energy_recovery_per_hour: u32,
    /// Health lost per hour at hunger 100.
    pub starvation_damage_per_hour: u32,
    /// Health lost per hour while sick.
    pub sickness_damage_per_hour: u32,
    /// Health regained per hour when neither starving nor sick.
    pub health_recovery_per_hour: u32,
    pub sickness_chance_per_day: f64,
    pub recovery_chance_per_day: f64,
    /// Sickness-onset multiplier for people left without firewood in winter.
    pub cold_sickness_multiplier: f64,
}

/// Daily consumption by the whole village.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpkeepConfig {
    pub food_per_person: u32,
    /// Burned in cold seasons only.
    pub firewood_per_person: u32,
    /// Low-supply warning threshold, per living person.
    pub low_supply_per_person: u32,
}

/// Multiplicative work-effectiveness penalties.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PenaltyConfig {
    /// `(min_hunger, factor)` tiers, ascending. The highest tier whose
    /// threshold is met applies; below every tier the factor is 1.0.
    pub hunger_tiers: Vec<(u32, f32)>,
    pub sickness_factor: f32,
    /// Energy strictly below this applies `low_energy_factor`.
    pub low_energy_threshold: u32,
    pub low_energy_factor: f32,
}

impl PenaltyConfig {
    pub fn hunger_factor(&self, hunger: u32) -> f32 {
        self.hunger_tiers
            .iter()
            .rev()
            .find(|(min, _)| hunger >= *min)
            .map_or(1.0, |(_, factor)| *factor)
    }
}

/// Top-level game configuration. Loaded from JSON, never mutated at runtime.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Real-world milliseconds per simulation tick (server pacing only).
    pub tick_duration_ms: u32,

    /// Map size used when no external map is supplied.
    pub world_size: (u32, u32),

    /// Ticks composing one in-game hour.
    pub ticks_per_hour: u32,

    /// Session seat limit.
    pub max_players: u32,

    /// People allowed on one non-door tile at once.
    pub tile_capacity: u32,

    /// Workers allowed on an unfinished building, whatever its finished
    /// `worker_capacity`.
    pub construction_crew_limit: u32,

    /// How far ahead of the current tick a command may be scheduled.
    pub max_command_lead_ticks: u64,

    /// A single building flush at or above this size is a `LargeHaul`.
    pub large_haul_threshold: u32,

    /// Village ledger contents at genesis.
    pub starting_resources: BTreeMap<ResourceKind, u32>,

    pub routine: RoutineHours,
    pub needs: NeedsConfig,
    pub upkeep: UpkeepConfig,
    pub penalties: PenaltyConfig,

    /// Per-season weather odds.
    pub weather: BTreeMap<Season, WeatherWeights>,

    /// Per-kind building layouts. Keyed by `BuildingKind`.
    pub buildings: BTreeMap<BuildingKind, BuildingLayout>,
}

impl Default for GameConfig {
    fn default() -> Self {
        let mut starting_resources = BTreeMap::new();
        starting_resources.insert(ResourceKind::Grain, 200);
        starting_resources.insert(ResourceKind::Logs, 120);
        starting_resources.insert(ResourceKind::Firewood, 60);
        starting_resources.insert(ResourceKind::Stone, 20);

        Self {
            tick_duration_ms: 100,
            world_size: (64, 64),
            ticks_per_hour: 10,
            max_players: 4,
            tile_capacity: 2,
            construction_crew_limit: 4,
            max_command_lead_ticks: 600,
            large_haul_threshold: 50,
            starting_resources,
            routine: RoutineHours::default(),
            needs: NeedsConfig {
                hunger_per_hour: 2,
                meal_relief: 50,
                energy_drain_per_hour: 2,
                work_energy_drain_per_hour: 4,
                sleep_energy_recovery_per_hour: 10,
                starvation_damage_per_hour: 2,
                sickness_damage_per_hour: 1,
                health_recovery_per_hour: 1,
                sickness_chance_per_day: 0.01,
                recovery_chance_per_day: 0.25,
                cold_sickness_multiplier: 3.0,
            },
            upkeep: UpkeepConfig {
                food_per_person: 1,
                firewood_per_person: 1,
                low_supply_per_person: 10,
            },
            penalties: PenaltyConfig {
                hunger_tiers: vec![(60, 0.7), (75, 0.3), (90, 0.1)],
                sickness_factor: 0.5,
                low_energy_threshold: 20,
                low_energy_factor: 0.5,
            },
            weather: weather::default_table(),
            buildings: catalog::default_layouts(),
        }
    }
}

impl GameConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (width, height) = self.world_size;
        if !WORLD_SIZE_RANGE.contains(&width) || !WORLD_SIZE_RANGE.contains(&height) {
            return Err(ConfigError::WorldSize { width, height });
        }
        if !TICKS_PER_HOUR_RANGE.contains(&self.ticks_per_hour) {
            return Err(ConfigError::TicksPerHour(self.ticks_per_hour));
        }
        if !MAX_PLAYERS_RANGE.contains(&self.max_players) {
            return Err(ConfigError::MaxPlayers(self.max_players));
        }
        if !self.routine.is_ordered() {
            return Err(ConfigError::RoutineOrder);
        }
        if self.tile_capacity == 0 {
            return Err(ConfigError::TileCapacity);
        }
        if self.max_command_lead_ticks == 0 {
            return Err(ConfigError::CommandLead);
        }
        if self
            .penalties
            .hunger_tiers
            .windows(2)
            .any(|pair| pair[0].0 >= pair[1].0)
        {
            return Err(ConfigError::PenaltyTiers);
        }
        for (&kind, layout) in &self.buildings {
            layout
                .check()
                .map_err(|reason| ConfigError::Layout { kind, reason })?;
        }
        Ok(())
    }

    /// Stable fingerprint of the full config, compared at session handshake.
    pub fn config_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        match serde_json::to_vec(self) {
            Ok(bytes) => hasher.write(&bytes),
            // Serialization cannot fail for this type.
            Err(_) => hasher.write_u64(u64::MAX),
        }
        hasher.finish()
    }
}
