// hamlet_sim: deterministic village simulation core.
//
// This crate holds all simulation logic for Hamlet: the calendar, terrain and
// tiles, people and families, buildings, the resource ledger, pathfinding,
// movement, player commands and their queue, and the tick loop that ties
// them together. It has no networking and no rendering; hosts (the server,
// tests, a headless runner) drive it through `GameEngine`.
//
// Module overview:
// - `sim.rs`:           GameEngine, the per-tick sequence, command intake.
// - `routine.rs`:       Hourly routine, need decay, daily upkeep, buffer flush.
// - `snapshot.rs`:      EngineSnapshot save/restore with reference checks.
// - `authority.rs`:     AuthorityGate, admission of networked commands.
// - `command.rs`:       SimCommand / SimAction, validation and effects.
// - `command_queue.rs`: Pending commands ordered by (tick, sequence, ...).
// - `world.rs`:         World aggregate: grid, people, families, buildings, ledger.
// - `grid.rs`:          WorldMap terrain, TileGrid with occupancy, NavGrid trait.
// - `pathfinding.rs`:   Four-way A* over any NavGrid.
// - `movement.rs`:      One step per person per tick with tile capacity.
// - `person.rs`:        Person, Family, task tags, routes.
// - `building.rs`:      Placed buildings: construction and production progress.
// - `catalog.rs`:       BuildingLayout table: footprints, doors, costs, output.
// - `resources.rs`:     ResourceStore trait and the village ResourceLedger.
// - `clock.rs`:         GameTime calendar and routine hours.
// - `weather.rs`:       Daily weather and per-season odds.
// - `event.rs`:         Player-visible SimEvents and EventSink.
// - `config.rs`:        GameConfig and validation.
// - `types.rs`:         TilePos, entity ids, seasons, terrain, resources.
// - `prng`:             Re-exported from `hamlet_prng`, xoshiro256++ with SplitMix64 seeding.
//
// **Critical constraint: determinism.** The simulation is a pure function:
// `(state, commands) -> (new_state, events)`. All randomness comes from a
// seeded xoshiro256++ PRNG. No `HashMap`, no system time, no OS entropy. Use
// `BTreeMap` for ordered collections.

pub mod authority;
pub mod building;
pub mod catalog;
pub mod clock;
pub mod command;
pub mod command_queue;
pub mod config;
pub mod event;
pub mod grid;
pub mod movement;
pub mod pathfinding;
pub mod person;
pub use hamlet_prng as prng;
pub mod resources;
mod routine;
pub mod sim;
pub mod snapshot;
pub mod types;
pub mod weather;
pub mod world;
