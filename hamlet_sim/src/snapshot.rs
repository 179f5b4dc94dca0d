// Save/restore for the whole engine.
//
// `EngineSnapshot` is the complete serializable state of a `GameEngine`:
// config, seed, tick, clock, weather, PRNG, terrain, ledger, people,
// families, buildings and the pending command queue (with its seen set).
// Restoring a snapshot and continuing produces exactly the same future as
// the engine it was taken from. Snapshots are used for save files and for
// the join handshake, where a new replica receives the authority's state.
//
// Derived data is not stored: tile occupancy is rebuilt every tick and the
// building stamps on the grid are re-applied on restore. `restore` checks
// every id and cross reference before accepting the data, so a corrupt or
// hand-edited save fails with a `RestoreError` instead of panicking later.
//
// See also: `sim.rs` (`GameEngine`), `world.rs`.
//
// **Critical constraint: determinism.** `GameEngine::state_hash` hashes the
// JSON form of this snapshot; field order here is part of that hash.

use crate::building::Building;
use crate::catalog::BuildingCatalog;
use crate::clock::{ClockError, GameTime};
use crate::command_queue::CommandQueue;
use crate::config::{ConfigError, GameConfig};
use crate::grid::{TileGrid, WorldMap};
use crate::person::{Family, Person};
use crate::prng::GameRng;
use crate::resources::ResourceLedger;
use crate::sim::{self, GameEngine};
use crate::types::*;
use crate::weather::Weather;
use crate::world::World;
use serde::{Deserialize, Serialize};

/// Stored calendar fields. Tick rate and routine come from the config.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockState {
    pub year: u32,
    pub season: Season,
    pub day: u32,
    pub hour: u32,
    pub tick: u32,
}

impl From<&GameTime> for ClockState {
    fn from(t: &GameTime) -> Self {
        Self {
            year: t.year(),
            season: t.season(),
            day: t.day(),
            hour: t.hour(),
            tick: t.tick(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub config: GameConfig,
    pub seed: u64,
    pub tick: u64,
    pub clock: ClockState,
    pub weather: Weather,
    pub rng: GameRng,
    pub terrain: WorldMap,
    pub ledger: ResourceLedger,
    pub people: Vec<Person>,
    pub families: Vec<Family>,
    pub buildings: Vec<Building>,
    pub commands: CommandQueue,
}

#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("bad clock: {0}")]
    Clock(#[from] ClockError),
    #[error("terrain has {len} cells for a {width}x{height} map")]
    Terrain { width: u32, height: u32, len: usize },
    #[error("{entity} at index {index} carries id {id}")]
    IdMismatch {
        entity: &'static str,
        index: usize,
        id: u64,
    },
    #[error("dangling reference: {0}")]
    Dangling(String),
    #[error("{building} overlaps another building or leaves the map at {pos}")]
    Placement { building: BuildingId, pos: TilePos },
    #[error("could not decode snapshot: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GameEngine {
    /// Capture the full engine state.
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            config: self.config.clone(),
            seed: self.seed,
            tick: self.tick,
            clock: ClockState::from(&self.clock),
            weather: self.weather,
            rng: self.rng.clone(),
            terrain: self.world.grid.terrain_map(),
            ledger: self.world.ledger.clone(),
            people: self.world.people.clone(),
            families: self.world.families.clone(),
            buildings: self.world.buildings.clone(),
            commands: self.commands.clone(),
        }
    }

    /// Rebuild an engine from a snapshot, validating it first.
    pub fn restore(snapshot: EngineSnapshot) -> Result<Self, RestoreError> {
        let EngineSnapshot {
            config,
            seed,
            tick,
            clock,
            weather,
            rng,
            terrain,
            ledger,
            people,
            families,
            buildings,
            commands,
        } = snapshot;

        config.validate()?;
        sim::check_map(&terrain)?;
        let cells = terrain.width as usize * terrain.height as usize;
        if terrain.terrain.len() != cells {
            return Err(RestoreError::Terrain {
                width: terrain.width,
                height: terrain.height,
                len: terrain.terrain.len(),
            });
        }
        let clock = GameTime::from_parts(
            clock.year,
            clock.season,
            clock.day,
            clock.hour,
            clock.tick,
            config.ticks_per_hour,
            config.routine,
        )?;
        check_references(&people, &families, &buildings)?;

        let mut world = World {
            grid: TileGrid::new(&terrain),
            people,
            families,
            buildings,
            ledger,
        };
        for b in &world.buildings {
            if let Some(&pos) = b
                .tiles
                .iter()
                .find(|p| world.grid.tile(**p).is_none_or(|t| t.building.is_some()))
            {
                return Err(RestoreError::Placement { building: b.id, pos });
            }
            world.grid.set_building(&b.tiles, b.door, b.id);
        }
        for p in world.people.iter().filter(|p| p.alive) {
            if world.grid.tile(p.position).is_none() {
                return Err(RestoreError::Dangling(format!(
                    "{} stands off the map at {}",
                    p.id, p.position
                )));
            }
        }

        Ok(Self {
            catalog: BuildingCatalog::new(config.buildings.clone()),
            config,
            seed,
            tick,
            clock,
            weather,
            rng,
            world,
            commands,
        })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.snapshot())
    }

    pub fn from_json(json: &str) -> Result<Self, RestoreError> {
        let snapshot: EngineSnapshot = serde_json::from_str(json)?;
        Self::restore(snapshot)
    }
}

fn check_references(
    people: &[Person],
    families: &[Family],
    buildings: &[Building],
) -> Result<(), RestoreError> {
    for (index, p) in people.iter().enumerate() {
        if p.id.index() != index {
            return Err(RestoreError::IdMismatch {
                entity: "person",
                index,
                id: u64::from(p.id.0),
            });
        }
        if p.family.index() >= families.len() {
            return Err(RestoreError::Dangling(format!("{} in {}", p.id, p.family)));
        }
        for b in [p.work_building, p.home].into_iter().flatten() {
            if b.index() >= buildings.len() {
                return Err(RestoreError::Dangling(format!("{} refers to {}", p.id, b)));
            }
        }
        if let Some(b) = p.work_building
            && !buildings[b.index()].workers.contains(&p.id)
        {
            return Err(RestoreError::Dangling(format!("{b} does not list worker {}", p.id)));
        }
        if let Some(b) = p.home
            && !buildings[b.index()].residents.contains(&p.id)
        {
            return Err(RestoreError::Dangling(format!("{b} does not list resident {}", p.id)));
        }
    }
    for (index, f) in families.iter().enumerate() {
        if f.id.index() != index {
            return Err(RestoreError::IdMismatch {
                entity: "family",
                index,
                id: u64::from(f.id.0),
            });
        }
        for m in &f.members {
            if people.get(m.index()).is_none_or(|p| p.family != f.id) {
                return Err(RestoreError::Dangling(format!("{} lists member {m}", f.id)));
            }
        }
    }
    for (index, b) in buildings.iter().enumerate() {
        if b.id.index() != index {
            return Err(RestoreError::IdMismatch {
                entity: "building",
                index,
                id: u64::from(b.id.0),
            });
        }
        if !b.tiles.contains(&b.door) {
            return Err(RestoreError::Placement {
                building: b.id,
                pos: b.door,
            });
        }
        for w in &b.workers {
            if people.get(w.index()).is_none_or(|p| p.work_building != Some(b.id)) {
                return Err(RestoreError::Dangling(format!("{} lists worker {w}", b.id)));
            }
        }
        for r in &b.residents {
            if people.get(r.index()).is_none_or(|p| p.home != Some(b.id)) {
                return Err(RestoreError::Dangling(format!("{} lists resident {r}", b.id)));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{SimAction, SimCommand};
    use crate::event::{DiscardEvents, EventLog};

    fn busy_engine() -> GameEngine {
        let config = GameConfig {
            ticks_per_hour: 2,
            ..GameConfig::default()
        };
        let map = WorldMap::from_rows(&[
            "................",
            "................",
            "....~~~.........",
            "....~~~.....TT..",
            "................",
            "........::......",
            "................",
            "................",
            "................",
            "................",
            "................",
            "................",
            "................",
            "................",
            "................",
            "................",
        ])
        .unwrap();
        let mut e = GameEngine::new(99, config, map).unwrap();
        e.spawn_family(PlayerId(0), "Moss", &["Ada", "Bram"], TilePos::new(1, 1))
            .unwrap();
        e.spawn_family(PlayerId(1), "Pike", &["Cleo"], TilePos::new(12, 12))
            .unwrap();
        let house = e
            .found_building(PlayerId(0), BuildingKind::House, TilePos::new(1, 8), Rotation::R0)
            .unwrap();
        let farm = e
            .found_building(PlayerId(0), BuildingKind::Farm, TilePos::new(6, 10), Rotation::R180)
            .unwrap();
        for (i, (action, player)) in [
            (
                SimAction::AssignHome {
                    person: PersonId(0),
                    building: house,
                },
                0,
            ),
            (
                SimAction::AssignWorker {
                    person: PersonId(1),
                    building: farm,
                },
                0,
            ),
            (
                SimAction::MovePerson {
                    person: PersonId(2),
                    target: TilePos::new(14, 1),
                },
                1,
            ),
        ]
        .into_iter()
        .enumerate()
        {
            e.submit(SimCommand::new(PlayerId(player), CommandId(i as u64), 3, action))
                .unwrap();
        }
        // Leave one command pending across the snapshot.
        e.submit(SimCommand::new(
            PlayerId(1),
            CommandId(50),
            400,
            SimAction::Birth {
                parent: PersonId(2),
                name: "Dell".to_string(),
            },
        ))
        .unwrap();
        e.advance(300, &mut DiscardEvents);
        e
    }

    #[test]
    fn restore_continues_identically() {
        let mut original = busy_engine();
        let mut restored = GameEngine::from_json(&original.to_json().unwrap()).unwrap();
        assert_eq!(restored.state_hash(), original.state_hash());
        assert_eq!(restored.pending_commands().len(), 1);

        let mut log_a = EventLog::new();
        let mut log_b = EventLog::new();
        original.advance(500, &mut log_a);
        restored.advance(500, &mut log_b);
        assert_eq!(original.state_hash(), restored.state_hash());
        assert_eq!(log_a.events(), log_b.events());
        assert_eq!(restored.world().people.len(), 4);
    }

    #[test]
    fn bincode_carries_the_snapshot_too() {
        let original = busy_engine();
        let bytes = bincode::serialize(&original.snapshot()).unwrap();
        let snapshot: EngineSnapshot = bincode::deserialize(&bytes).unwrap();
        let restored = GameEngine::restore(snapshot).unwrap();
        assert_eq!(restored.state_hash(), original.state_hash());
    }

    #[test]
    fn restamps_buildings_on_restore() {
        let original = busy_engine();
        let restored = GameEngine::restore(original.snapshot()).unwrap();
        let farm = &restored.world().buildings[1];
        for pos in &farm.tiles {
            assert_eq!(
                restored.world().grid.tile(*pos).unwrap().building,
                Some(farm.id)
            );
        }
    }

    #[test]
    fn rejects_broken_references() {
        let mut snapshot = busy_engine().snapshot();
        snapshot.people[0].home = Some(BuildingId(9));
        assert!(matches!(
            GameEngine::restore(snapshot),
            Err(RestoreError::Dangling(_))
        ));

        let mut snapshot = busy_engine().snapshot();
        snapshot.families[1].id = FamilyId(0);
        assert!(matches!(
            GameEngine::restore(snapshot),
            Err(RestoreError::IdMismatch { entity: "family", .. })
        ));

        let mut snapshot = busy_engine().snapshot();
        snapshot.buildings[1].tiles = snapshot.buildings[0].tiles.clone();
        snapshot.buildings[1].door = snapshot.buildings[0].door;
        assert!(matches!(
            GameEngine::restore(snapshot),
            Err(RestoreError::Placement { .. })
        ));
    }

    #[test]
    fn rejects_bad_clock_and_terrain() {
        let mut snapshot = busy_engine().snapshot();
        snapshot.clock.hour = 24;
        assert!(matches!(
            GameEngine::restore(snapshot),
            Err(RestoreError::Clock(_))
        ));

        let mut snapshot = busy_engine().snapshot();
        snapshot.terrain.terrain.pop();
        assert!(matches!(
            GameEngine::restore(snapshot),
            Err(RestoreError::Terrain { .. })
        ));

        assert!(matches!(
            GameEngine::from_json("{\"seed\": 1}"),
            Err(RestoreError::Decode(_))
        ));
    }
}
