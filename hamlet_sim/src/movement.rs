// Per-tick movement executor.
//
// Each living person with a route takes at most one step per tick. A step
// into the next waypoint succeeds only if that tile is walkable right now and
// has room: fewer than `tile_capacity` other people on it, except on doors,
// which take any number (a whole crew gathers at a workplace entrance).
// A blocked person holds position and retries next tick; there is no
// re-pathing here. Occupancy is updated as soon as a step lands, so later
// movers in the same tick see it.
//
// See also: `grid.rs` for the occupancy table, `sim.rs` for how arrival
// transitions task tags.
//
// **Critical constraint: determinism.** Callers step people in id order.

use crate::grid::TileGrid;
use crate::person::Person;

/// Result of one movement step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// No route (or dead).
    Idle,
    Moved,
    /// Next tile impassable or full; position unchanged.
    Blocked,
    /// Entered the final waypoint this tick.
    Arrived,
}

/// Advance `person` one tile along its route.
pub fn step_person(person: &mut Person, grid: &mut TileGrid, tile_capacity: u32) -> StepOutcome {
    if !person.alive {
        return StepOutcome::Idle;
    }
    let Some(next) = person.route.next() else {
        if person.route.is_empty() {
            return StepOutcome::Idle;
        }
        // Routed to the tile it already stands on.
        person.route.clear();
        return StepOutcome::Arrived;
    };

    let passable = grid
        .tile(next)
        .is_some_and(|t| t.is_walkable() && t.has_room_for(person.id, tile_capacity));
    if !passable {
        return StepOutcome::Blocked;
    }

    grid.remove_occupant(person.position, person.id);
    grid.add_occupant(next, person.id);
    person.position = next;
    person.route.advance();

    if person.route.is_done() {
        person.route.clear();
        StepOutcome::Arrived
    } else {
        StepOutcome::Moved
    }
}
