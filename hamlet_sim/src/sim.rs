// The simulation orchestrator.
//
// `GameEngine` is the single source of truth for a running village. It owns
// the config and building catalogue, the clock, the day's weather, the PRNG,
// the `World`, and the queue of pending commands. The engine is a pure
// function of `(state, accepted commands)`: `simulate_tick` advances it by
// exactly one tick and reports command outcomes, with notable events pushed
// into a caller-supplied `EventSink`.
//
// ## Per-tick sequence
//
// The order below is a correctness contract; every replica runs it
// identically.
//
//   1. Clear and rebuild tile occupancy from living people.
//   2. Pop and execute every queued command due this tick, in queue order.
//      Each is validated again first; failures are reported, never fatal.
//   3. Advance the clock; note hour boundary and season change.
//   4. On an hour boundary: `SeasonChanged` if the season turned, refresh
//      the weather at day start, run the routine for this hour (wake,
//      dispatch to work, recall home, bed), decay needs, and at day start
//      consume upkeep (see `routine.rs`).
//   5. If the weather allows outdoor work, each building's crew at the door
//      advances construction or production.
//   6. At day start, flush building buffers into the village ledger.
//   7. One movement step for every living person, in id order; arrivals
//      switch task tags.
//
// Tick numbering: `current_tick()` is the number of ticks completed. The
// next `simulate_tick` runs tick `current_tick() + 1` and executes commands
// targeted at it, so a command submitted at tick T must target T+1 or later.
//
// ## Genesis
//
// `spawn_family` and `found_building` place starting people and finished
// buildings without going through commands. They exist for setting up a
// world before the first tick (or on the authority before anyone joins);
// replicas receive the result in the join snapshot.
//
// See also: `routine.rs` for steps 4 and 6, `command.rs` for actions,
// `authority.rs` for networked admission, `snapshot.rs` for save/restore.
//
// **Critical constraint: determinism.** All state changes flow through
// accepted commands or this tick sequence. The only randomness is the seeded
// `GameRng`. No system time, no `HashMap` iteration, and the one parallel
// section (work dispatch pathfinding) only computes; results are applied in
// person-id order.

use crate::building::crew_size;
use crate::catalog::BuildingCatalog;
use crate::clock::GameTime;
use crate::command::{CommandError, Effect, SimCommand};
use crate::command_queue::{CommandQueue, QueuedCommand};
use crate::config::{ConfigError, GameConfig, WORLD_SIZE_RANGE};
use crate::event::{EventSink, SimEvent, SimEventKind};
use crate::grid::{NavGrid, WorldMap};
use crate::movement::{self, StepOutcome};
use crate::pathfinding;
use crate::person::TaskState;
use crate::prng::GameRng;
use crate::resources::ResourceLedger;
use crate::types::*;
use crate::weather::Weather;
use crate::world::World;
use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use tracing::{debug, info};

/// Result of executing one queued command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub command_id: CommandId,
    pub player: PlayerId,
    pub tick: u64,
    pub sequence: u64,
    pub success: bool,
    /// Failure reason, when `success` is false.
    pub reason: Option<String>,
}

/// What happened during one `simulate_tick`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub outcomes: Vec<CommandOutcome>,
    pub hour_boundary: bool,
    pub season_changed: bool,
}

#[derive(Clone, Debug)]
pub struct GameEngine {
    pub(crate) config: GameConfig,
    pub(crate) catalog: BuildingCatalog,
    pub(crate) seed: u64,
    pub(crate) tick: u64,
    pub(crate) clock: GameTime,
    pub(crate) weather: Weather,
    pub(crate) rng: GameRng,
    pub(crate) world: World,
    pub(crate) commands: CommandQueue,
}

impl GameEngine {
    /// Build an engine at tick 0 over `map`.
    pub fn new(seed: u64, config: GameConfig, map: WorldMap) -> Result<Self, ConfigError> {
        config.validate()?;
        check_map(&map)?;
        let ledger: ResourceLedger = config
            .starting_resources
            .iter()
            .map(|(&k, &v)| (k, v))
            .collect();
        Ok(Self {
            catalog: BuildingCatalog::new(config.buildings.clone()),
            clock: GameTime::new(config.ticks_per_hour, config.routine),
            seed,
            tick: 0,
            weather: Weather::default(),
            rng: GameRng::new(seed),
            world: World::new(&map, ledger),
            commands: CommandQueue::new(),
            config,
        })
    }

    /// Build an engine over an all-grass map of `config.world_size`.
    pub fn with_open_map(seed: u64, config: GameConfig) -> Result<Self, ConfigError> {
        let (w, h) = config.world_size;
        Self::new(seed, config, WorldMap::open(w, h))
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn time(&self) -> &GameTime {
        &self.clock
    }

    pub fn weather(&self) -> Weather {
        self.weather
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn catalog(&self) -> &BuildingCatalog {
        &self.catalog
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn pending_commands(&self) -> Vec<QueuedCommand> {
        self.commands.pending()
    }

    pub fn has_seen(&self, player: PlayerId, command_id: CommandId) -> bool {
        self.commands.contains(player, command_id)
    }

    /// Smallest command id above every id `player` has had accepted.
    pub fn next_command_id(&self, player: PlayerId) -> CommandId {
        let last = self.commands.highest_seen(player);
        CommandId(last.map_or(0, |id| id.0.saturating_add(1)))
    }

    /// Fingerprint of the full engine state, pending commands included.
    pub fn state_hash(&self) -> u64 {
        fingerprint(&self.snapshot())
    }

    /// Fingerprint of everything except the pending-command queue. This is
    /// what replicas compare against the authority at checkpoints: a replica
    /// may already hold commands the authority admitted after the checkpoint
    /// tick, so the queues can differ while the simulated world agrees.
    pub fn world_hash(&self) -> u64 {
        let mut snapshot = self.snapshot();
        snapshot.commands = CommandQueue::new();
        fingerprint(&snapshot)
    }

    // -----------------------------------------------------------------------
    // Genesis
    // -----------------------------------------------------------------------

    /// Create a family owned by `owner` with one member per name, all
    /// standing on `at`.
    pub fn spawn_family(
        &mut self,
        owner: PlayerId,
        surname: &str,
        names: &[&str],
        at: TilePos,
    ) -> Result<FamilyId, CommandError> {
        if !self.world.grid.in_bounds(at) {
            return Err(CommandError::OutOfBounds(at));
        }
        if !self.world.grid.is_walkable(at) {
            return Err(CommandError::Blocked(at));
        }
        let family = self.world.add_family(surname, owner);
        for name in names {
            self.world.add_person(family, *name, at);
        }
        Ok(family)
    }

    /// Place a finished building at no cost.
    pub fn found_building(
        &mut self,
        owner: PlayerId,
        kind: BuildingKind,
        anchor: TilePos,
        rotation: Rotation,
    ) -> Result<BuildingId, CommandError> {
        let layout = self
            .catalog
            .layout(kind)
            .ok_or(CommandError::UnknownLayout(kind))?;
        let tiles = layout.tiles(anchor, rotation);
        if let Some(&bad) = tiles.iter().find(|p| !self.world.grid.in_bounds(**p)) {
            return Err(CommandError::OutOfBounds(bad));
        }
        if !self.world.grid.can_place(&tiles) {
            return Err(CommandError::Blocked(anchor));
        }
        let id = self.world.add_building(kind, owner, anchor, rotation, layout);
        if let Some(b) = self.world.building_mut(id) {
            b.finish();
        }
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Command intake
    // -----------------------------------------------------------------------

    /// Local submission: timing and duplicate checks, then queue. Returns
    /// the admission sequence.
    pub fn submit(&mut self, cmd: SimCommand) -> Result<u64, CommandError> {
        self.check_timing(&cmd)?;
        self.enqueue(cmd)
    }

    /// Queue a command admitted by the session authority, keeping the
    /// authority's sequence number.
    pub fn enqueue_admitted(&mut self, cmd: SimCommand, sequence: u64) -> Result<(), CommandError> {
        if cmd.target_tick <= self.tick {
            return Err(CommandError::Stale {
                target_tick: cmd.target_tick,
                current_tick: self.tick,
            });
        }
        self.commands.enqueue_with_sequence(cmd, sequence)
    }

    /// Target tick must be in `(current, current + max_command_lead_ticks]`.
    pub fn check_timing(&self, cmd: &SimCommand) -> Result<(), CommandError> {
        if cmd.target_tick <= self.tick {
            return Err(CommandError::Stale {
                target_tick: cmd.target_tick,
                current_tick: self.tick,
            });
        }
        let latest = self.tick.saturating_add(self.config.max_command_lead_ticks);
        if cmd.target_tick > latest {
            return Err(CommandError::TooFarAhead {
                target_tick: cmd.target_tick,
                latest,
            });
        }
        Ok(())
    }

    /// Run the command's validation predicate against the current world.
    pub fn validate(&self, cmd: &SimCommand) -> Result<(), CommandError> {
        cmd.validate(&self.world, &self.config, &self.catalog)
    }

    pub(crate) fn enqueue(&mut self, cmd: SimCommand) -> Result<u64, CommandError> {
        self.commands.enqueue(cmd)
    }

    // -----------------------------------------------------------------------
    // Tick loop
    // -----------------------------------------------------------------------

    /// Advance the simulation by exactly one tick.
    pub fn simulate_tick(&mut self, sink: &mut dyn EventSink) -> TickReport {
        let tick = self.tick + 1;

        self.world.rebuild_occupancy();

        let outcomes = self.execute_due_commands(tick, sink);

        let season_before = self.clock.season();
        let hour_boundary = self.clock.advance_tick();
        let season_changed = self.clock.season() != season_before;
        let day_start = hour_boundary && self.clock.is_day_start();

        if hour_boundary {
            if season_changed {
                info!(tick, season = %self.clock.season(), year = self.clock.year(), "season changed");
                sink.emit(SimEvent {
                    tick,
                    kind: SimEventKind::SeasonChanged {
                        season: self.clock.season(),
                        year: self.clock.year(),
                    },
                });
            }
            if day_start {
                self.refresh_weather(tick, sink);
            }
            self.run_routine_hour();
            self.update_needs(tick, sink);
            if day_start {
                self.consume_upkeep(tick, sink);
            }
        }

        if self.weather.permits_outdoor_work() {
            self.run_work_step(tick, sink);
        }

        if day_start {
            self.flush_buffers(tick, sink);
        }

        self.run_movement();

        self.tick = tick;
        TickReport {
            tick,
            outcomes,
            hour_boundary,
            season_changed,
        }
    }

    /// Run `ticks` ticks, collecting the reports.
    pub fn advance(&mut self, ticks: u64, sink: &mut dyn EventSink) -> Vec<TickReport> {
        (0..ticks).map(|_| self.simulate_tick(sink)).collect()
    }

    /// Run until `current_tick() == target`. No-op if already there.
    pub fn run_until(&mut self, target: u64, sink: &mut dyn EventSink) -> Vec<TickReport> {
        let ticks = target.saturating_sub(self.tick);
        self.advance(ticks, sink)
    }

    fn execute_due_commands(&mut self, tick: u64, sink: &mut dyn EventSink) -> Vec<CommandOutcome> {
        let mut outcomes = Vec::new();
        while let Some(queued) = self.commands.pop_due(tick) {
            let cmd = &queued.command;
            let result = cmd.apply(&mut self.world, &self.config, &self.catalog);
            let reason = match result {
                Ok(effect) => {
                    self.on_effect(effect, tick, sink);
                    None
                }
                Err(e) => Some(e.to_string()),
            };
            debug!(
                tick,
                player = %cmd.player,
                command_id = %cmd.command_id,
                sequence = queued.sequence,
                ok = reason.is_none(),
                reason = reason.as_deref().unwrap_or(""),
                "command executed"
            );
            outcomes.push(CommandOutcome {
                command_id: cmd.command_id,
                player: cmd.player,
                tick,
                sequence: queued.sequence,
                success: reason.is_none(),
                reason,
            });
        }
        outcomes
    }

    fn on_effect(&mut self, effect: Effect, tick: u64, sink: &mut dyn EventSink) {
        match effect {
            Effect::Placed(building, kind) => {
                sink.emit(SimEvent {
                    tick,
                    kind: SimEventKind::BuildingPlaced { building, kind },
                });
            }
            Effect::Born(person, family) => {
                info!(tick, %person, %family, "person born");
                sink.emit(SimEvent {
                    tick,
                    kind: SimEventKind::PersonBorn { person, family },
                });
            }
            Effect::Assigned(person) => {
                let resting = self
                    .world
                    .person(person)
                    .is_some_and(|p| p.task == TaskState::Sleeping);
                if self.clock.is_work_hours() && !resting {
                    self.dispatch_to_work(person);
                }
            }
            Effect::Unassigned(_) | Effect::Housed(_) | Effect::Walking(_) => {}
        }
    }

    /// Send one person to their workplace now.
    fn dispatch_to_work(&mut self, id: PersonId) {
        let Some(building) = self.world.person(id).and_then(|p| p.work_building) else {
            return;
        };
        let Some(start) = self.world.person(id).map(|p| p.position) else {
            return;
        };
        if self.world.is_at(start, building) {
            if let Some(p) = self.world.person_mut(id) {
                p.stop(TaskState::Working);
            }
            return;
        }
        let goals = self.world.approach_tiles(building);
        match pathfinding::find_path_to_any(start, &goals, &self.world.grid) {
            Some((_, path)) => {
                if let Some(p) = self.world.person_mut(id) {
                    p.set_route(path, TaskState::TravelingToWork);
                }
            }
            None => debug!(%id, %building, "workplace unreachable"),
        }
    }

    /// Step 5: construction or production at every building with a crew.
    fn run_work_step(&mut self, tick: u64, sink: &mut dyn EventSink) {
        let season = self.clock.season();
        let mut completed = Vec::new();
        for bi in 0..self.world.buildings.len() {
            let crew = {
                let world = &self.world;
                let b = &world.buildings[bi];
                let effective: f32 = b
                    .workers
                    .iter()
                    .filter_map(|&w| world.person(w))
                    .filter(|p| {
                        p.alive && p.task == TaskState::Working && world.is_at(p.position, b.id)
                    })
                    .map(|p| p.effectiveness(&self.config.penalties))
                    .sum();
                crew_size(effective)
            };
            if crew == 0 {
                continue;
            }
            let building = &mut self.world.buildings[bi];
            if !building.completed {
                if building.apply_construction(crew) {
                    completed.push((building.id, building.kind));
                }
            } else if let Some(production) = self
                .catalog
                .layout(building.kind)
                .and_then(|l| l.production.as_ref())
                && production.active_in(season)
            {
                building.apply_production(crew, production);
            }
        }
        for (building, kind) in completed {
            info!(tick, %building, ?kind, "building completed");
            sink.emit(SimEvent {
                tick,
                kind: SimEventKind::BuildingCompleted { building, kind },
            });
            self.release_excess_workers(building);
        }
    }

    /// A finished building keeps at most its layout's `worker_capacity`.
    fn release_excess_workers(&mut self, id: BuildingId) {
        let Some(kind) = self.world.building(id).map(|b| b.kind) else {
            return;
        };
        let capacity = self.catalog.layout(kind).map_or(0, |l| l.worker_capacity) as usize;
        let excess: Vec<PersonId> = self
            .world
            .building(id)
            .map(|b| b.workers.iter().skip(capacity).copied().collect())
            .unwrap_or_default();
        for person in excess {
            self.world.unassign_worker(person);
            if let Some(p) = self.world.person_mut(person) {
                p.stop(TaskState::Idle);
            }
        }
    }

    /// Step 7: one step per living person, in id order.
    fn run_movement(&mut self) {
        let capacity = self.config.tile_capacity;
        let sleep_time = self.clock.is_sleep_time();
        for i in 0..self.world.people.len() {
            let person = &mut self.world.people[i];
            if movement::step_person(person, &mut self.world.grid, capacity) != StepOutcome::Arrived {
                continue;
            }
            person.task = match person.task {
                TaskState::TravelingToWork => TaskState::Working,
                TaskState::TravelingHome | TaskState::Walking if sleep_time => TaskState::Sleeping,
                TaskState::TravelingHome | TaskState::Walking => TaskState::Idle,
                other => other,
            };
        }
    }
}

fn fingerprint<T: Serialize>(value: &T) -> u64 {
    let mut hasher = FxHasher::default();
    match serde_json::to_vec(value) {
        Ok(bytes) => hasher.write(&bytes),
        Err(_) => hasher.write_u64(u64::MAX),
    }
    hasher.finish()
}

pub(crate) fn check_map(map: &WorldMap) -> Result<(), ConfigError> {
    if !WORLD_SIZE_RANGE.contains(&map.width) || !WORLD_SIZE_RANGE.contains(&map.height) {
        return Err(ConfigError::WorldSize {
            width: map.width,
            height: map.height,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::SimAction;
    use crate::event::{DiscardEvents, EventLog};
    use crate::resources::ResourceStore;
    use crate::weather::WeatherWeights;

    fn test_config() -> GameConfig {
        GameConfig {
            ticks_per_hour: 2,
            ..GameConfig::default()
        }
    }

    fn engine() -> GameEngine {
        GameEngine::new(42, test_config(), WorldMap::open(24, 24)).unwrap()
    }

    /// Same as `engine()` but it never storms.
    fn fair_weather_engine() -> GameEngine {
        let mut config = test_config();
        for weights in config.weather.values_mut() {
            *weights = WeatherWeights {
                clear: 1,
                ..WeatherWeights::default()
            };
        }
        GameEngine::new(42, config, WorldMap::open(24, 24)).unwrap()
    }

    fn ticks_per_day(engine: &GameEngine) -> u64 {
        u64::from(engine.config().ticks_per_hour) * 24
    }

    /// Advance to the start of `hour` on the current day (or the next day
    /// if already past it).
    fn run_to_hour(engine: &mut GameEngine, hour: u32, sink: &mut dyn EventSink) {
        loop {
            engine.simulate_tick(sink);
            if engine.time().hour() == hour && engine.time().tick() == 0 {
                return;
            }
        }
    }

    fn walk(person: u32, id: u64, tick: u64, target: TilePos) -> SimCommand {
        SimCommand::new(
            PlayerId(0),
            CommandId(id),
            tick,
            SimAction::MovePerson {
                person: PersonId(person),
                target,
            },
        )
    }

    #[test]
    fn new_rejects_bad_config_and_map() {
        let mut config = test_config();
        config.ticks_per_hour = 0;
        assert!(GameEngine::new(1, config, WorldMap::open(16, 16)).is_err());
        assert!(matches!(
            GameEngine::new(1, test_config(), WorldMap::open(4, 16)),
            Err(ConfigError::WorldSize { width: 4, .. })
        ));
    }

    #[test]
    fn simulate_tick_advances_tick_and_clock() {
        let mut e = engine();
        let report = e.simulate_tick(&mut DiscardEvents);
        assert_eq!(report.tick, 1);
        assert!(!report.hour_boundary);
        let report = e.simulate_tick(&mut DiscardEvents);
        assert!(report.hour_boundary);
        assert_eq!(e.current_tick(), 2);
        assert_eq!(e.time().hour(), 1);
    }

    #[test]
    fn starting_resources_land_in_ledger() {
        let e = engine();
        assert_eq!(e.world().ledger.get(ResourceKind::Grain), 200);
        assert_eq!(e.world().ledger.get(ResourceKind::Logs), 120);
    }

    #[test]
    fn command_executes_on_target_tick_not_before() {
        let mut e = engine();
        e.spawn_family(PlayerId(0), "Holt", &["Ida"], TilePos::new(0, 0))
            .unwrap();
        e.submit(walk(0, 1, 3, TilePos::new(5, 0))).unwrap();

        e.advance(2, &mut DiscardEvents);
        let p = e.world().person(PersonId(0)).unwrap();
        assert_eq!(p.task, TaskState::Idle);
        assert_eq!(p.position, TilePos::new(0, 0));

        let report = e.simulate_tick(&mut DiscardEvents);
        assert_eq!(report.outcomes.len(), 1);
        assert!(report.outcomes[0].success);
        let p = e.world().person(PersonId(0)).unwrap();
        assert_eq!(p.task, TaskState::Walking);
        // Command then movement in the same tick.
        assert_eq!(p.position, TilePos::new(1, 0));

        e.advance(4, &mut DiscardEvents);
        let p = e.world().person(PersonId(0)).unwrap();
        assert_eq!(p.position, TilePos::new(5, 0));
        // 03:00: the walk ends in bed.
        assert_eq!(p.task, TaskState::Sleeping);
    }

    #[test]
    fn walk_to_own_tile_ends_at_once() {
        let mut e = fair_weather_engine();
        e.spawn_family(PlayerId(0), "Holt", &["Ida"], TilePos::new(3, 3))
            .unwrap();
        e.submit(walk(0, 1, 1, TilePos::new(3, 3))).unwrap();
        let report = e.simulate_tick(&mut DiscardEvents);
        assert!(report.outcomes[0].success);
        let p = e.world().person(PersonId(0)).unwrap();
        assert_eq!(p.position, TilePos::new(3, 3));
        assert!(p.route.is_empty());
        assert_ne!(p.task, TaskState::Walking);

        // Awake by day, she is put to bed with everyone else.
        let mut sink = DiscardEvents;
        run_to_hour(&mut e, 12, &mut sink);
        assert_eq!(e.world().person(PersonId(0)).unwrap().task, TaskState::Idle);
        run_to_hour(&mut e, 23, &mut sink);
        assert_eq!(e.world().person(PersonId(0)).unwrap().task, TaskState::Sleeping);
    }

    #[test]
    fn late_walk_ends_in_bed() {
        let mut e = fair_weather_engine();
        e.spawn_family(PlayerId(0), "Holt", &["Ida"], TilePos::new(0, 0))
            .unwrap();
        let mut sink = DiscardEvents;
        run_to_hour(&mut e, 12, &mut sink);
        let noon = e.current_tick() + 1;
        e.submit(walk(0, 1, noon, TilePos::new(2, 0))).unwrap();
        e.advance(2, &mut sink);
        assert_eq!(e.world().person(PersonId(0)).unwrap().task, TaskState::Idle);

        run_to_hour(&mut e, 23, &mut sink);
        assert_eq!(e.world().person(PersonId(0)).unwrap().task, TaskState::Sleeping);
        let late = e.current_tick() + 1;
        e.submit(walk(0, 2, late, TilePos::new(4, 0))).unwrap();
        e.advance(2, &mut sink);
        let p = e.world().person(PersonId(0)).unwrap();
        assert_eq!(p.position, TilePos::new(4, 0));
        assert_eq!(p.task, TaskState::Sleeping);
    }

    #[test]
    fn stale_and_duplicate_submissions() {
        let mut e = engine();
        e.spawn_family(PlayerId(0), "Holt", &["Ida"], TilePos::new(0, 0))
            .unwrap();
        e.advance(3, &mut DiscardEvents);
        assert!(matches!(
            e.submit(walk(0, 1, 3, TilePos::new(2, 2))),
            Err(CommandError::Stale { .. })
        ));
        e.submit(walk(0, 1, 4, TilePos::new(2, 2))).unwrap();
        assert!(matches!(
            e.submit(walk(0, 1, 5, TilePos::new(2, 2))),
            Err(CommandError::Duplicate { .. })
        ));
        let report = e.advance(3, &mut DiscardEvents);
        let executed: usize = report.iter().map(|r| r.outcomes.len()).sum();
        assert_eq!(executed, 1);
        assert_eq!(e.next_command_id(PlayerId(0)), CommandId(2));
        assert_eq!(e.next_command_id(PlayerId(1)), CommandId(0));
    }

    #[test]
    fn failing_command_reports_and_continues() {
        let mut e = engine();
        e.spawn_family(PlayerId(0), "Holt", &["Ida"], TilePos::new(0, 0))
            .unwrap();
        e.submit(walk(9, 1, 1, TilePos::new(2, 2))).unwrap();
        e.submit(walk(0, 2, 1, TilePos::new(2, 2))).unwrap();
        let report = e.simulate_tick(&mut DiscardEvents);
        assert_eq!(report.outcomes.len(), 2);
        assert!(!report.outcomes[0].success);
        assert_eq!(
            report.outcomes[0].reason.as_deref(),
            Some("no such person PersonId(9)")
        );
        assert!(report.outcomes[1].success);
    }

    #[test]
    fn same_tick_commands_run_in_sequence_order() {
        let mut e = engine();
        e.spawn_family(PlayerId(0), "Holt", &["Ida"], TilePos::new(0, 0))
            .unwrap();
        // Two placements competing for the same tiles: the first admitted wins.
        let place = |id: u64, kind| {
            SimCommand::new(
                PlayerId(0),
                CommandId(id),
                2,
                SimAction::PlaceBuilding {
                    kind,
                    anchor: TilePos::new(6, 6),
                    rotation: Rotation::R0,
                },
            )
        };
        e.submit(place(7, BuildingKind::Garden)).unwrap();
        e.submit(place(3, BuildingKind::House)).unwrap();
        let reports = e.advance(2, &mut DiscardEvents);
        let outcomes = &reports[1].outcomes;
        assert_eq!(outcomes[0].command_id, CommandId(7));
        assert!(outcomes[0].success);
        assert!(!outcomes[1].success);
        assert_eq!(e.world().buildings[0].kind, BuildingKind::Garden);
    }

    #[test]
    fn workers_build_then_produce() {
        let mut e = fair_weather_engine();
        e.spawn_family(PlayerId(0), "Holt", &["Ida", "Jon"], TilePos::new(2, 10))
            .unwrap();
        let mut log = EventLog::new();
        let place = SimCommand::new(
            PlayerId(0),
            CommandId(1),
            1,
            SimAction::PlaceBuilding {
                kind: BuildingKind::Garden,
                anchor: TilePos::new(6, 6),
                rotation: Rotation::R0,
            },
        );
        e.submit(place).unwrap();
        e.simulate_tick(&mut log);
        for (n, person) in [0u32, 1].into_iter().enumerate() {
            e.submit(SimCommand::new(
                PlayerId(0),
                CommandId(10 + n as u64),
                2,
                SimAction::AssignWorker {
                    person: PersonId(person),
                    building: BuildingId(0),
                },
            ))
            .unwrap();
        }
        // 90 work units take a crew of two about three working days; the
        // rest is production.
        for _ in 0..6 * ticks_per_day(&e) {
            e.simulate_tick(&mut log);
        }
        assert!(e.world().buildings[0].completed);
        let completions = log
            .filter(|k| matches!(k, SimEventKind::BuildingCompleted { .. }))
            .count();
        assert_eq!(completions, 1);
        let made = e.world().buildings[0].buffer.get(ResourceKind::Vegetables)
            + e.world().ledger.get(ResourceKind::Vegetables);
        assert!(made > 0);
    }

    #[test]
    fn workers_go_home_and_sleep() {
        let mut e = fair_weather_engine();
        e.spawn_family(PlayerId(0), "Holt", &["Ida"], TilePos::new(2, 2))
            .unwrap();
        let house = e
            .found_building(PlayerId(0), BuildingKind::House, TilePos::new(10, 10), Rotation::R0)
            .unwrap();
        let farm = e
            .found_building(PlayerId(0), BuildingKind::Farm, TilePos::new(3, 5), Rotation::R0)
            .unwrap();
        e.submit(SimCommand::new(
            PlayerId(0),
            CommandId(1),
            1,
            SimAction::AssignHome {
                person: PersonId(0),
                building: house,
            },
        ))
        .unwrap();
        e.submit(SimCommand::new(
            PlayerId(0),
            CommandId(2),
            1,
            SimAction::AssignWorker {
                person: PersonId(0),
                building: farm,
            },
        ))
        .unwrap();

        let mut sink = DiscardEvents;
        run_to_hour(&mut e, 12, &mut sink);
        let p = e.world().person(PersonId(0)).unwrap();
        assert_eq!(p.task, TaskState::Working);
        assert!(e.world().is_at(p.position, farm));

        run_to_hour(&mut e, 23, &mut sink);
        let p = e.world().person(PersonId(0)).unwrap();
        assert_eq!(p.task, TaskState::Sleeping);
        assert!(e.world().is_at(p.position, house));

        run_to_hour(&mut e, 7, &mut sink);
        assert_eq!(e.world().person(PersonId(0)).unwrap().task, TaskState::Idle);
    }

    #[test]
    fn season_change_emits_event() {
        let mut config = test_config();
        config.ticks_per_hour = 1;
        let mut e = GameEngine::new(3, config, WorldMap::open(16, 16)).unwrap();
        let mut log = EventLog::new();
        e.advance(24 * 90, &mut log);
        let seasons: Vec<_> = log
            .filter(|k| matches!(k, SimEventKind::SeasonChanged { .. }))
            .collect();
        assert_eq!(seasons.len(), 1);
        assert_eq!(
            seasons[0].kind,
            SimEventKind::SeasonChanged {
                season: Season::Summer,
                year: 1
            }
        );
    }

    #[test]
    fn determinism_two_engines_same_commands() {
        let build = || {
            let mut e = engine();
            e.spawn_family(PlayerId(0), "Holt", &["Ida", "Jon", "Kai"], TilePos::new(1, 1))
                .unwrap();
            e.found_building(PlayerId(0), BuildingKind::Farm, TilePos::new(12, 12), Rotation::R90)
                .unwrap();
            for p in 0..3 {
                e.submit(SimCommand::new(
                    PlayerId(0),
                    CommandId(p),
                    5,
                    SimAction::AssignWorker {
                        person: PersonId(p as u32),
                        building: BuildingId(0),
                    },
                ))
                .unwrap();
            }
            e
        };
        let mut a = build();
        let mut b = build();
        let mut log_a = EventLog::new();
        let mut log_b = EventLog::new();
        a.advance(2_000, &mut log_a);
        b.advance(2_000, &mut log_b);
        assert_eq!(a.state_hash(), b.state_hash());
        assert_eq!(log_a.events(), log_b.events());
        for (pa, pb) in a.world().people.iter().zip(&b.world().people) {
            assert_eq!(pa.position, pb.position);
        }
        assert_eq!(a.time(), b.time());
    }

    #[test]
    fn world_hash_ignores_pending_commands() {
        let mut a = engine();
        a.spawn_family(PlayerId(0), "Holt", &["Ida"], TilePos::new(0, 0))
            .unwrap();
        let b = a.clone();
        a.submit(walk(0, 1, 50, TilePos::new(2, 2))).unwrap();
        assert_ne!(a.state_hash(), b.state_hash());
        assert_eq!(a.world_hash(), b.world_hash());
    }

    #[test]
    fn different_seeds_diverge_in_weather() {
        let mut config = test_config();
        config.ticks_per_hour = 1;
        let mut a = GameEngine::new(1, config.clone(), WorldMap::open(16, 16)).unwrap();
        let mut b = GameEngine::new(2, config, WorldMap::open(16, 16)).unwrap();
        let mut wa = Vec::new();
        let mut wb = Vec::new();
        for _ in 0..60 {
            a.advance(24, &mut DiscardEvents);
            b.advance(24, &mut DiscardEvents);
            wa.push(a.weather());
            wb.push(b.weather());
        }
        assert_ne!(wa, wb);
    }

    #[test]
    fn genesis_helpers_validate() {
        let mut e = engine();
        assert_eq!(
            e.spawn_family(PlayerId(0), "X", &["a"], TilePos::new(30, 0)),
            Err(CommandError::OutOfBounds(TilePos::new(30, 0)))
        );
        e.found_building(PlayerId(0), BuildingKind::House, TilePos::new(0, 0), Rotation::R0)
            .unwrap();
        assert!(
            e.found_building(PlayerId(0), BuildingKind::House, TilePos::new(1, 1), Rotation::R0)
                .is_err()
        );
        assert_eq!(
            e.spawn_family(PlayerId(0), "X", &["a"], TilePos::new(1, 1)),
            Err(CommandError::Blocked(TilePos::new(1, 1)))
        );
    }
}
