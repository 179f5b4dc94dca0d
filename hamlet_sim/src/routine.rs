// Hourly and daily village routines.
//
// These are the time-driven halves of `simulate_tick`: what happens when the
// clock crosses an hour (routine transitions, need decay) or a day (weather,
// upkeep, buffer flush). They live on `GameEngine` in a separate `impl` block
// to keep `sim.rs` focused on the tick sequence itself.
//
// Routine hours come from `GameConfig::routine`:
//   - `wake`: sleepers get up (Idle).
//   - `work_start`: everyone with a workplace is sent there. Paths for the
//     whole village are computed in parallel with rayon and applied in
//     person-id order.
//   - `work_end`: people with a home walk back to it; the homeless stop.
//   - `sleep`: anyone idle goes to sleep where they stand.
//
// Daily upkeep: each living person eats `food_per_person` (grain, then
// vegetables, then fish) and in winter burns `firewood_per_person`. People
// are served in id order until stock runs out; the unfed get no meal relief,
// the unwarmed face a higher sickness chance. Then sickness and recovery are
// rolled per person.
//
// See also: `sim.rs` for where these run within a tick, `config.rs`
// (`NeedsConfig`, `UpkeepConfig`) for the numbers, `event.rs` for the
// warnings emitted here.
//
// **Critical constraint: determinism.** Every loop is in id order and every
// random draw comes from the engine's `GameRng`, in that same order.

use crate::event::{EventSink, SimEvent, SimEventKind, Supply};
use crate::pathfinding;
use crate::person::{STAT_MAX, TaskState};
use crate::resources::ResourceStore;
use crate::sim::GameEngine;
use crate::types::*;
use crate::weather;
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Outcome of planning one trip.
enum Trip {
    AlreadyThere,
    Route(Vec<TilePos>),
    Unreachable,
}

/// One person who needs to get to a building.
struct TripRequest {
    person: PersonId,
    building: BuildingId,
    start: TilePos,
    goals: Vec<TilePos>,
    at_goal: bool,
}

impl GameEngine {
    // -----------------------------------------------------------------------
    // Day start
    // -----------------------------------------------------------------------

    pub(crate) fn refresh_weather(&mut self, tick: u64, sink: &mut dyn EventSink) {
        let season = self.clock.season();
        let next = weather::roll(&mut self.rng, self.config.weather.get(&season));
        if next != self.weather {
            info!(tick, from = %self.weather, to = %next, "weather changed");
            sink.emit(SimEvent {
                tick,
                kind: SimEventKind::WeatherChanged {
                    from: self.weather,
                    to: next,
                },
            });
            self.weather = next;
        }
    }

    /// Eat, burn firewood, then roll sickness and recovery.
    pub(crate) fn consume_upkeep(&mut self, tick: u64, sink: &mut dyn EventSink) {
        let living: Vec<PersonId> = self.world.living().map(|p| p.id).collect();
        let headcount = living.len() as u64;
        let upkeep = self.config.upkeep;
        let threshold = headcount * u64::from(upkeep.low_supply_per_person);

        let fed = self.draw_supply(
            Supply::Food,
            &ResourceKind::FOOD,
            headcount,
            upkeep.food_per_person,
            threshold,
            tick,
            sink,
        );
        let warmed = if self.clock.season().is_cold() {
            self.draw_supply(
                Supply::Firewood,
                &[ResourceKind::Firewood],
                headcount,
                upkeep.firewood_per_person,
                threshold,
                tick,
                sink,
            )
        } else {
            headcount
        };

        let relief = self.config.needs.meal_relief;
        for &id in living.iter().take(fed as usize) {
            if let Some(p) = self.world.person_mut(id) {
                p.hunger = p.hunger.saturating_sub(relief);
            }
        }

        let needs = self.config.needs;
        for (i, &id) in living.iter().enumerate() {
            let Some(sick) = self.world.person(id).map(|p| p.sick) else {
                continue;
            };
            if sick {
                if self.rng.chance(needs.recovery_chance_per_day) {
                    if let Some(p) = self.world.person_mut(id) {
                        p.sick = false;
                    }
                    debug!(tick, person = %id, "recovered");
                    sink.emit(SimEvent {
                        tick,
                        kind: SimEventKind::Recovered { person: id },
                    });
                }
                continue;
            }
            let mut chance = needs.sickness_chance_per_day;
            if (i as u64) >= warmed {
                chance *= needs.cold_sickness_multiplier;
            }
            if self.rng.chance(chance) {
                if let Some(p) = self.world.person_mut(id) {
                    p.sick = true;
                }
                debug!(tick, person = %id, "fell sick");
                sink.emit(SimEvent {
                    tick,
                    kind: SimEventKind::FellSick { person: id },
                });
            }
        }
    }

    /// Take `per_person` units for each of `headcount` people from `kinds`
    /// in order. Returns how many people were served and warns when the
    /// stock crosses below `threshold`.
    #[allow(clippy::too_many_arguments)]
    fn draw_supply(
        &mut self,
        supply: Supply,
        kinds: &[ResourceKind],
        headcount: u64,
        per_person: u32,
        threshold: u64,
        tick: u64,
        sink: &mut dyn EventSink,
    ) -> u64 {
        if per_person == 0 {
            return headcount;
        }
        let ledger = &mut self.world.ledger;
        let before = ledger.total(kinds);
        let need = headcount * u64::from(per_person);
        let mut outstanding = need;
        for &kind in kinds {
            if outstanding == 0 {
                break;
            }
            let ask = u32::try_from(outstanding).unwrap_or(u32::MAX);
            outstanding -= u64::from(ledger.take_up_to(kind, ask));
        }
        let consumed = need - outstanding;
        let after = before - consumed;
        if before >= threshold && after < threshold {
            warn!(tick, ?supply, remaining = after, threshold, "supply running low");
            sink.emit(SimEvent {
                tick,
                kind: SimEventKind::LowSupply {
                    supply,
                    remaining: after,
                    threshold,
                },
            });
        }
        consumed / u64::from(per_person)
    }

    /// Move every building's produced output into the village ledger.
    pub(crate) fn flush_buffers(&mut self, tick: u64, sink: &mut dyn EventSink) {
        let threshold = self.config.large_haul_threshold;
        for i in 0..self.world.buildings.len() {
            let building = self.world.buildings[i].id;
            let haul = self.world.buildings[i].buffer.drain();
            for (kind, amount) in haul {
                self.world.ledger.add(kind, amount);
                if amount >= threshold {
                    info!(tick, %building, ?kind, amount, "large haul");
                    sink.emit(SimEvent {
                        tick,
                        kind: SimEventKind::LargeHaul {
                            building,
                            kind,
                            amount,
                        },
                    });
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Hourly
    // -----------------------------------------------------------------------

    /// Apply the routine transition for the hour the clock just entered.
    pub(crate) fn run_routine_hour(&mut self) {
        let hour = self.clock.hour();
        let routine = self.clock.routine();
        if hour == routine.wake {
            for p in self.world.people.iter_mut().filter(|p| p.alive) {
                if p.task == TaskState::Sleeping {
                    p.task = TaskState::Idle;
                }
            }
        }
        if hour == routine.work_start {
            self.send_to_work();
        }
        if hour == routine.work_end {
            self.send_home();
        }
        if hour == routine.sleep {
            for p in self.world.people.iter_mut().filter(|p| p.alive) {
                if p.task == TaskState::Idle {
                    p.task = TaskState::Sleeping;
                }
            }
        }
    }

    fn send_to_work(&mut self) {
        let requests: Vec<TripRequest> = self
            .world
            .living()
            .filter(|p| p.task != TaskState::Working)
            .filter_map(|p| p.work_building.map(|b| (p, b)))
            .map(|(p, building)| self.trip_request(p.id, p.position, building))
            .collect();
        let trips = self.plan_trips(&requests);
        for (request, trip) in requests.iter().zip(trips) {
            let Some(p) = self.world.person_mut(request.person) else {
                continue;
            };
            match trip {
                Trip::AlreadyThere => p.stop(TaskState::Working),
                Trip::Route(path) => p.set_route(path, TaskState::TravelingToWork),
                Trip::Unreachable => {
                    debug!(person = %request.person, building = %request.building, "workplace unreachable");
                }
            }
        }
    }

    fn send_home(&mut self) {
        let sleep_time = self.clock.is_sleep_time();
        let rest = if sleep_time { TaskState::Sleeping } else { TaskState::Idle };
        let mut requests = Vec::new();
        let mut stand_down = Vec::new();
        for p in self.world.living() {
            match p.home {
                Some(home) => requests.push(self.trip_request(p.id, p.position, home)),
                None if matches!(p.task, TaskState::Working | TaskState::TravelingToWork) => {
                    stand_down.push(p.id);
                }
                None => {}
            }
        }
        let trips = self.plan_trips(&requests);
        for (request, trip) in requests.iter().zip(trips) {
            let Some(p) = self.world.person_mut(request.person) else {
                continue;
            };
            match trip {
                Trip::AlreadyThere => p.stop(rest),
                Trip::Route(path) => p.set_route(path, TaskState::TravelingHome),
                Trip::Unreachable => {
                    debug!(person = %request.person, home = %request.building, "home unreachable");
                    p.stop(TaskState::Idle);
                }
            }
        }
        for id in stand_down {
            if let Some(p) = self.world.person_mut(id) {
                p.stop(TaskState::Idle);
            }
        }
    }

    fn trip_request(&self, person: PersonId, start: TilePos, building: BuildingId) -> TripRequest {
        TripRequest {
            person,
            building,
            start,
            goals: self.world.approach_tiles(building),
            at_goal: self.world.is_at(start, building),
        }
    }

    /// Pathfind every request in parallel. The output is in request order.
    fn plan_trips(&self, requests: &[TripRequest]) -> Vec<Trip> {
        let grid = &self.world.grid;
        requests
            .par_iter()
            .map(|r| {
                if r.at_goal {
                    return Trip::AlreadyThere;
                }
                match pathfinding::find_path_to_any(r.start, &r.goals, grid) {
                    Some((_, path)) => Trip::Route(path),
                    None => Trip::Unreachable,
                }
            })
            .collect()
    }

    /// Hunger, energy and health for one hour, in id order. Deaths are
    /// resolved immediately.
    pub(crate) fn update_needs(&mut self, tick: u64, sink: &mut dyn EventSink) {
        let needs = self.config.needs;
        let mut died = Vec::new();
        for p in self.world.people.iter_mut().filter(|p| p.alive) {
            p.hunger = (p.hunger + needs.hunger_per_hour).min(STAT_MAX);
            p.energy = match p.task {
                TaskState::Sleeping => (p.energy + needs.sleep_energy_recovery_per_hour).min(STAT_MAX),
                TaskState::Working => p.energy.saturating_sub(needs.work_energy_drain_per_hour),
                _ => p.energy.saturating_sub(needs.energy_drain_per_hour),
            };
            let mut damage = 0;
            if p.hunger >= STAT_MAX {
                damage += needs.starvation_damage_per_hour;
            }
            if p.sick {
                damage += needs.sickness_damage_per_hour;
            }
            p.health = if damage > 0 {
                p.health.saturating_sub(damage)
            } else {
                (p.health + needs.health_recovery_per_hour).min(STAT_MAX)
            };
            if p.health == 0 {
                p.alive = false;
                p.stop(TaskState::Idle);
                died.push(p.id);
            }
        }
        for id in died {
            self.world.release_dead(id);
            info!(tick, person = %id, "person died");
            sink.emit(SimEvent {
                tick,
                kind: SimEventKind::PersonDied { person: id },
            });
        }
    }
}
