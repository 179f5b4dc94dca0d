// Commands: the only way players change the world.
//
// A `SimCommand` is a unit of player intent: the originating player, a
// client-chosen command id (unique per player), the tick it must execute on,
// and a `SimAction`. Commands go through the command queue and are executed
// by `GameEngine::simulate_tick` when their target tick comes up.
//
// Each action has a validation predicate (`validate`) and an execution effect
// (`apply`). `apply` re-runs validation against the world as it stands at
// execution time, so a command that was legal when admitted but has since
// been overtaken (the building filled up, the logs were spent) fails cleanly
// without touching state.
//
// Actions:
// - `PlaceBuilding`: pay the layout cost and stamp a new construction site.
// - `AssignWorker` / `UnassignWorker`: staff a building (construction crews
//   are capped by `construction_crew_limit`, finished buildings by the
//   layout's `worker_capacity`).
// - `AssignHome`: move a person into a finished house.
// - `MovePerson`: walk a person to a tile.
// - `Birth`: add a child to a living person's family.
//
// Ownership: a person is controlled by their family's owner; a building by
// its owner. Commands about someone else's people or buildings are refused.
//
// See also: `command_queue.rs` for ordering, `authority.rs` for admission,
// `sim.rs` for execution and outcome reporting.
//
// **Critical constraint: determinism.** Commands are the sole external input
// to the sim.

use crate::building::Building;
use crate::catalog::BuildingCatalog;
use crate::config::GameConfig;
use crate::grid::NavGrid;
use crate::pathfinding;
use crate::person::{Person, TaskState};
use crate::resources::Shortfall;
use crate::types::*;
use crate::world::World;
use serde::{Deserialize, Serialize};

pub const MAX_NAME_LEN: usize = 32;

/// A player-issued command targeting a specific simulation tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimCommand {
    pub player: PlayerId,
    pub command_id: CommandId,
    /// Executes during this tick. Must be later than the tick at submission.
    pub target_tick: u64,
    pub action: SimAction,
}

/// The specific action a command performs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimAction {
    PlaceBuilding {
        kind: BuildingKind,
        anchor: TilePos,
        rotation: Rotation,
    },
    AssignWorker { person: PersonId, building: BuildingId },
    UnassignWorker { person: PersonId },
    AssignHome { person: PersonId, building: BuildingId },
    MovePerson { person: PersonId, target: TilePos },
    Birth { parent: PersonId, name: String },
}

/// Why a command was refused, at admission or at execution.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("target tick {target_tick} is not after current tick {current_tick}")]
    Stale { target_tick: u64, current_tick: u64 },
    #[error("target tick {target_tick} is beyond the lead limit (latest allowed {latest})")]
    TooFarAhead { target_tick: u64, latest: u64 },
    #[error("claimed origin {claimed} does not match sender {sender}")]
    OriginMismatch { claimed: PlayerId, sender: PlayerId },
    #[error("duplicate command {command_id} from {player}")]
    Duplicate { player: PlayerId, command_id: CommandId },
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("no such person {0}")]
    UnknownPerson(PersonId),
    #[error("no such building {0}")]
    UnknownBuilding(BuildingId),
    #[error("no layout for {0:?}")]
    UnknownLayout(BuildingKind),
    #[error("{0} is dead")]
    PersonDead(PersonId),
    #[error("{player} does not own that")]
    NotOwner { player: PlayerId },
    #[error("{0} is out of bounds")]
    OutOfBounds(TilePos),
    #[error("{0} is blocked")]
    Blocked(TilePos),
    #[error("not enough {kind:?}: need {needed}, have {available}")]
    InsufficientResources {
        kind: ResourceKind,
        needed: u32,
        available: u32,
    },
    #[error("{0} has no room")]
    BuildingFull(BuildingId),
    #[error("{0} is not finished")]
    NotComplete(BuildingId),
    #[error("{0} cannot house anyone")]
    NotAHome(BuildingId),
    #[error("{0} has no job to leave")]
    NotAssigned(PersonId),
    #[error("no path to {0}")]
    Unreachable(TilePos),
    #[error("names must be 1..={MAX_NAME_LEN} characters")]
    InvalidName,
}

impl From<Shortfall> for CommandError {
    fn from(s: Shortfall) -> Self {
        CommandError::InsufficientResources {
            kind: s.kind,
            needed: s.needed,
            available: s.available,
        }
    }
}

/// What an applied command did, for event emission by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Placed(BuildingId, BuildingKind),
    Assigned(PersonId),
    Unassigned(PersonId),
    Housed(PersonId),
    Walking(PersonId),
    Born(PersonId, FamilyId),
}

/// Encode an action as an opaque wire payload (JSON bytes).
pub fn encode_action(action: &SimAction) -> Result<Vec<u8>, CommandError> {
    serde_json::to_vec(action).map_err(|e| CommandError::Malformed(e.to_string()))
}

/// Decode a wire payload into an action.
pub fn decode_action(payload: &[u8]) -> Result<SimAction, CommandError> {
    serde_json::from_slice(payload).map_err(|e| CommandError::Malformed(e.to_string()))
}

impl SimCommand {
    pub fn new(player: PlayerId, command_id: CommandId, target_tick: u64, action: SimAction) -> Self {
        Self {
            player,
            command_id,
            target_tick,
            action,
        }
    }

    /// Check the action against the current world without changing it.
    pub fn validate(
        &self,
        world: &World,
        config: &GameConfig,
        catalog: &BuildingCatalog,
    ) -> Result<(), CommandError> {
        match &self.action {
            SimAction::PlaceBuilding {
                kind,
                anchor,
                rotation,
            } => {
                if !world.grid.in_bounds(*anchor) {
                    return Err(CommandError::OutOfBounds(*anchor));
                }
                let layout = catalog
                    .layout(*kind)
                    .ok_or(CommandError::UnknownLayout(*kind))?;
                for pos in layout.tiles(*anchor, *rotation) {
                    let tile = world.grid.tile(pos).ok_or(CommandError::OutOfBounds(pos))?;
                    if !tile.terrain.is_walkable() || tile.building.is_some() {
                        return Err(CommandError::Blocked(pos));
                    }
                }
                world.ledger.covers(&layout.cost)?;
                Ok(())
            }
            SimAction::AssignWorker { person, building } => {
                self.check_person(world, *person)?;
                let b = self.check_building(world, *building)?;
                if b.workers.contains(person) {
                    return Ok(());
                }
                let capacity = if b.completed {
                    catalog.layout(b.kind).map_or(0, |l| l.worker_capacity)
                } else {
                    config.construction_crew_limit
                };
                if b.workers.len() >= capacity as usize {
                    return Err(CommandError::BuildingFull(*building));
                }
                Ok(())
            }
            SimAction::UnassignWorker { person } => {
                let p = self.check_person(world, *person)?;
                if p.work_building.is_none() {
                    return Err(CommandError::NotAssigned(*person));
                }
                Ok(())
            }
            SimAction::AssignHome { person, building } => {
                self.check_person(world, *person)?;
                let b = self.check_building(world, *building)?;
                if b.residents.contains(person) {
                    return Ok(());
                }
                let capacity = catalog.layout(b.kind).map_or(0, |l| l.resident_capacity);
                if capacity == 0 {
                    return Err(CommandError::NotAHome(*building));
                }
                if !b.completed {
                    return Err(CommandError::NotComplete(*building));
                }
                if b.residents.len() >= capacity as usize {
                    return Err(CommandError::BuildingFull(*building));
                }
                Ok(())
            }
            SimAction::MovePerson { person, target } => {
                self.route_for(world, *person, *target).map(|_| ())
            }
            SimAction::Birth { parent, name } => {
                self.check_person(world, *parent)?;
                let len = name.chars().count();
                if len == 0 || len > MAX_NAME_LEN {
                    return Err(CommandError::InvalidName);
                }
                Ok(())
            }
        }
    }

    /// Validate, then mutate the world. On error nothing has changed.
    pub fn apply(
        &self,
        world: &mut World,
        config: &GameConfig,
        catalog: &BuildingCatalog,
    ) -> Result<Effect, CommandError> {
        self.validate(world, config, catalog)?;
        match &self.action {
            SimAction::PlaceBuilding {
                kind,
                anchor,
                rotation,
            } => {
                let layout = catalog
                    .layout(*kind)
                    .ok_or(CommandError::UnknownLayout(*kind))?;
                world.ledger.pay(&layout.cost)?;
                let id = world.add_building(*kind, self.player, *anchor, *rotation, layout);
                Ok(Effect::Placed(id, *kind))
            }
            SimAction::AssignWorker { person, building } => {
                world.assign_worker(*person, *building);
                Ok(Effect::Assigned(*person))
            }
            SimAction::UnassignWorker { person } => {
                world.unassign_worker(*person);
                if let Some(p) = world.person_mut(*person)
                    && matches!(p.task, TaskState::Working | TaskState::TravelingToWork)
                {
                    p.stop(TaskState::Idle);
                }
                Ok(Effect::Unassigned(*person))
            }
            SimAction::AssignHome { person, building } => {
                world.assign_home(*person, *building);
                Ok(Effect::Housed(*person))
            }
            SimAction::MovePerson { person, target } => {
                let path = self.route_for(world, *person, *target)?;
                if let Some(p) = world.person_mut(*person) {
                    p.set_route(path, TaskState::Walking);
                }
                Ok(Effect::Walking(*person))
            }
            SimAction::Birth { parent, name } => {
                let (family, at, home) = world
                    .person(*parent)
                    .map(|p| (p.family, p.position, p.home))
                    .ok_or(CommandError::UnknownPerson(*parent))?;
                let child = world.add_person(family, name.clone(), at);
                if let Some(home) = home {
                    let room = world.building(home).is_some_and(|b| {
                        catalog
                            .layout(b.kind)
                            .is_some_and(|l| b.residents.len() < l.resident_capacity as usize)
                    });
                    if room {
                        world.assign_home(child, home);
                    }
                }
                Ok(Effect::Born(child, family))
            }
        }
    }

    fn check_person<'w>(
        &self,
        world: &'w World,
        id: PersonId,
    ) -> Result<&'w Person, CommandError> {
        let person = world.person(id).ok_or(CommandError::UnknownPerson(id))?;
        if !person.alive {
            return Err(CommandError::PersonDead(id));
        }
        if world.owner_of(id) != Some(self.player) {
            return Err(CommandError::NotOwner { player: self.player });
        }
        Ok(person)
    }

    fn check_building<'w>(
        &self,
        world: &'w World,
        id: BuildingId,
    ) -> Result<&'w Building, CommandError> {
        let building = world.building(id).ok_or(CommandError::UnknownBuilding(id))?;
        if building.owner != self.player {
            return Err(CommandError::NotOwner { player: self.player });
        }
        Ok(building)
    }

    fn route_for(
        &self,
        world: &World,
        person: PersonId,
        target: TilePos,
    ) -> Result<Vec<TilePos>, CommandError> {
        let p = self.check_person(world, person)?;
        if !world.grid.in_bounds(target) {
            return Err(CommandError::OutOfBounds(target));
        }
        pathfinding::find_path(p.position, target, &world.grid)
            .ok_or(CommandError::Unreachable(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::WorldMap;
    use crate::resources::{ResourceLedger, ResourceStore};

    struct Fixture {
        world: World,
        config: GameConfig,
        catalog: BuildingCatalog,
    }

    fn fixture() -> Fixture {
        let config = GameConfig::default();
        let catalog = BuildingCatalog::new(config.buildings.clone());
        let ledger: ResourceLedger = [(ResourceKind::Logs, 100)].into_iter().collect();
        let mut world = World::new(&WorldMap::open(16, 16), ledger);
        let f = world.add_family("Fisher", PlayerId(0));
        world.add_person(f, "Ann", TilePos::new(0, 0));
        let g = world.add_family("Cooper", PlayerId(1));
        world.add_person(g, "Ben", TilePos::new(1, 0));
        Fixture {
            world,
            config,
            catalog,
        }
    }

    fn cmd(player: u32, action: SimAction) -> SimCommand {
        SimCommand::new(PlayerId(player), CommandId(1), 5, action)
    }

    fn run(fx: &mut Fixture, c: &SimCommand) -> Result<Effect, CommandError> {
        c.apply(&mut fx.world, &fx.config, &fx.catalog)
    }

    fn place(fx: &mut Fixture, kind: BuildingKind, at: TilePos) -> BuildingId {
        let c = cmd(
            0,
            SimAction::PlaceBuilding {
                kind,
                anchor: at,
                rotation: Rotation::R0,
            },
        );
        match run(fx, &c) {
            Ok(Effect::Placed(id, _)) => id,
            other => panic!("placement failed: {other:?}"),
        }
    }

    #[test]
    fn place_building_pays_cost() {
        let mut fx = fixture();
        let id = place(&mut fx, BuildingKind::House, TilePos::new(4, 4));
        assert_eq!(fx.world.ledger.get(ResourceKind::Logs), 80);
        assert_eq!(fx.world.building(id).unwrap().owner, PlayerId(0));
        assert_eq!(
            fx.world.grid.tile(TilePos::new(5, 5)).unwrap().building,
            Some(id)
        );
    }

    #[test]
    fn place_building_rejects_overlap_and_bounds() {
        let mut fx = fixture();
        place(&mut fx, BuildingKind::House, TilePos::new(4, 4));
        let overlap = cmd(
            0,
            SimAction::PlaceBuilding {
                kind: BuildingKind::Garden,
                anchor: TilePos::new(5, 5),
                rotation: Rotation::R0,
            },
        );
        assert_eq!(run(&mut fx, &overlap), Err(CommandError::Blocked(TilePos::new(5, 5))));
        let edge = cmd(
            0,
            SimAction::PlaceBuilding {
                kind: BuildingKind::House,
                anchor: TilePos::new(15, 15),
                rotation: Rotation::R0,
            },
        );
        assert_eq!(run(&mut fx, &edge), Err(CommandError::OutOfBounds(TilePos::new(16, 15))));
        assert_eq!(fx.world.ledger.get(ResourceKind::Logs), 80);
    }

    #[test]
    fn place_building_insufficient_resources() {
        let mut fx = fixture();
        let c = cmd(
            0,
            SimAction::PlaceBuilding {
                kind: BuildingKind::Storehouse,
                anchor: TilePos::new(4, 4),
                rotation: Rotation::R0,
            },
        );
        assert_eq!(
            run(&mut fx, &c),
            Err(CommandError::InsufficientResources {
                kind: ResourceKind::Stone,
                needed: 20,
                available: 0
            })
        );
        assert_eq!(fx.world.buildings.len(), 0);
    }

    #[test]
    fn ownership_is_enforced() {
        let mut fx = fixture();
        let farm = place(&mut fx, BuildingKind::Farm, TilePos::new(4, 4));
        let theirs = cmd(
            1,
            SimAction::AssignWorker {
                person: PersonId(1),
                building: farm,
            },
        );
        assert_eq!(
            run(&mut fx, &theirs),
            Err(CommandError::NotOwner { player: PlayerId(1) })
        );
        let not_mine = cmd(
            0,
            SimAction::MovePerson {
                person: PersonId(1),
                target: TilePos::new(3, 3),
            },
        );
        assert_eq!(
            run(&mut fx, &not_mine),
            Err(CommandError::NotOwner { player: PlayerId(0) })
        );
    }

    #[test]
    fn construction_crew_limit() {
        let mut fx = fixture();
        let farm = place(&mut fx, BuildingKind::Farm, TilePos::new(4, 4));
        let family = fx.world.person(PersonId(0)).unwrap().family;
        for i in 0..5 {
            fx.world.add_person(family, format!("w{i}"), TilePos::new(0, 1));
        }
        let mut results = Vec::new();
        for person in [0, 2, 3, 4, 5] {
            let c = cmd(
                0,
                SimAction::AssignWorker {
                    person: PersonId(person),
                    building: farm,
                },
            );
            results.push(run(&mut fx, &c).is_ok());
        }
        assert_eq!(results, vec![true, true, true, true, false]);
        assert_eq!(fx.world.building(farm).unwrap().workers.len(), 4);
    }

    #[test]
    fn unassign_requires_a_job() {
        let mut fx = fixture();
        let c = cmd(0, SimAction::UnassignWorker { person: PersonId(0) });
        assert_eq!(run(&mut fx, &c), Err(CommandError::NotAssigned(PersonId(0))));
    }

    #[test]
    fn assign_home_needs_finished_house() {
        let mut fx = fixture();
        let house = place(&mut fx, BuildingKind::House, TilePos::new(4, 4));
        let farm = place(&mut fx, BuildingKind::Farm, TilePos::new(8, 8));
        let home = |b| {
            cmd(
                0,
                SimAction::AssignHome {
                    person: PersonId(0),
                    building: b,
                },
            )
        };
        assert_eq!(run(&mut fx, &home(house)), Err(CommandError::NotComplete(house)));
        assert_eq!(run(&mut fx, &home(farm)), Err(CommandError::NotAHome(farm)));
        fx.world.building_mut(house).unwrap().finish();
        assert_eq!(run(&mut fx, &home(house)), Ok(Effect::Housed(PersonId(0))));
        assert_eq!(fx.world.person(PersonId(0)).unwrap().home, Some(house));
    }

    #[test]
    fn move_person_sets_route() {
        let mut fx = fixture();
        let c = cmd(
            0,
            SimAction::MovePerson {
                person: PersonId(0),
                target: TilePos::new(3, 0),
            },
        );
        assert_eq!(run(&mut fx, &c), Ok(Effect::Walking(PersonId(0))));
        let p = fx.world.person(PersonId(0)).unwrap();
        assert_eq!(p.task, TaskState::Walking);
        assert_eq!(p.route.remaining(), 3);
    }

    #[test]
    fn move_person_out_of_bounds_or_unreachable() {
        let mut fx = fixture();
        let c = cmd(
            0,
            SimAction::MovePerson {
                person: PersonId(0),
                target: TilePos::new(99, 0),
            },
        );
        assert_eq!(run(&mut fx, &c), Err(CommandError::OutOfBounds(TilePos::new(99, 0))));

        let map = WorldMap::from_rows(&[
            "........", "........", "........", "........", "...###..", "...#.#..", "...###..",
            "........",
        ])
        .unwrap();
        fx.world = World::new(&map, ResourceLedger::new());
        let f = fx.world.add_family("Fisher", PlayerId(0));
        fx.world.add_person(f, "Ann", TilePos::new(0, 0));
        let c = cmd(
            0,
            SimAction::MovePerson {
                person: PersonId(0),
                target: TilePos::new(4, 5),
            },
        );
        assert_eq!(run(&mut fx, &c), Err(CommandError::Unreachable(TilePos::new(4, 5))));
    }

    #[test]
    fn birth_joins_parent_family() {
        let mut fx = fixture();
        let c = cmd(
            0,
            SimAction::Birth {
                parent: PersonId(0),
                name: "Cal".to_string(),
            },
        );
        let effect = run(&mut fx, &c).unwrap();
        assert_eq!(effect, Effect::Born(PersonId(2), FamilyId(0)));
        assert_eq!(fx.world.family(FamilyId(0)).unwrap().members.len(), 2);
        let empty = cmd(
            0,
            SimAction::Birth {
                parent: PersonId(0),
                name: String::new(),
            },
        );
        assert_eq!(run(&mut fx, &empty), Err(CommandError::InvalidName));
    }

    #[test]
    fn dead_people_take_no_orders() {
        let mut fx = fixture();
        fx.world.people[0].alive = false;
        let c = cmd(
            0,
            SimAction::MovePerson {
                person: PersonId(0),
                target: TilePos::new(3, 0),
            },
        );
        assert_eq!(run(&mut fx, &c), Err(CommandError::PersonDead(PersonId(0))));
    }

    #[test]
    fn payload_roundtrip_and_garbage() {
        let action = SimAction::AssignWorker {
            person: PersonId(3),
            building: BuildingId(1),
        };
        let payload = encode_action(&action).unwrap();
        assert_eq!(decode_action(&payload), Ok(action));
        assert!(matches!(decode_action(b"{\"Nope\":1}"), Err(CommandError::Malformed(_))));
    }
}
