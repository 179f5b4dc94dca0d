// Starting settlements.
//
// Before anyone connects, the server founds one family for every seat the
// session can hold, so the world a joiner receives already contains their
// people. Seat `n` owns the family founded for `PlayerId(n)`.
//
// Founding points are the centres of an even grid of cells laid over the
// map (one cell per seat). When a centre is blocked, the nearest walkable
// tile by Manhattan distance is used instead, searched ring by ring in a
// fixed order.
//
// **Critical constraint: determinism.** The same config, map and seat count
// always yield the same settlements; names come from fixed tables.

use hamlet_sim::command::CommandError;
use hamlet_sim::grid::NavGrid;
use hamlet_sim::sim::GameEngine;
use hamlet_sim::types::{FamilyId, PlayerId, TilePos};
use tracing::info;

const SURNAMES: [&str; 16] = [
    "Ashdown", "Brook", "Carver", "Dale", "Elmsworth", "Fenn", "Graves", "Hollis", "Ingle",
    "Joyce", "Kettle", "Lowe", "Marsh", "Nettle", "Oakes", "Pike",
];

const GIVEN_NAMES: [&str; 20] = [
    "Ada", "Bram", "Cora", "Dunstan", "Edith", "Fulk", "Gwen", "Hugh", "Isolde", "Jory", "Kit",
    "Lettice", "Mabel", "Ned", "Osric", "Perrin", "Rowan", "Sibyl", "Tam", "Wat",
];

/// Found one family of `settlers` people for each of `seats` players.
pub fn found_settlements(
    engine: &mut GameEngine,
    seats: u32,
    settlers: u32,
) -> Result<Vec<FamilyId>, CommandError> {
    let points = founding_points(engine.world().grid.width(), engine.world().grid.height(), seats);
    let mut families = Vec::with_capacity(points.len());
    for (seat, point) in (0u32..).zip(points) {
        let at = nearest_walkable(&engine.world().grid, point).ok_or(CommandError::Blocked(point))?;
        let names: Vec<&str> = (0..settlers)
            .map(|i| GIVEN_NAMES[((seat * settlers + i) as usize) % GIVEN_NAMES.len()])
            .collect();
        let surname = SURNAMES[seat as usize % SURNAMES.len()];
        let family = engine.spawn_family(PlayerId(seat), surname, &names, at)?;
        info!(seat, %surname, %at, settlers, "settlement founded");
        families.push(family);
    }
    Ok(families)
}

/// Centres of a `cols x rows` grid of cells covering the map, in row-major
/// order, one per seat.
fn founding_points(width: u32, height: u32, seats: u32) -> Vec<TilePos> {
    let seats = seats.max(1);
    let cols = (1..=seats).find(|c| c * c >= seats).unwrap_or(seats);
    let rows = seats.div_ceil(cols);
    (0..seats)
        .map(|i| {
            let (col, row) = (i % cols, i / cols);
            let x = (2 * col + 1) * width / (2 * cols);
            let y = (2 * row + 1) * height / (2 * rows);
            TilePos::new(x as i32, y as i32)
        })
        .collect()
}

fn nearest_walkable(grid: &impl NavGrid, from: TilePos) -> Option<TilePos> {
    let limit = (grid.width() + grid.height()) as i32;
    (0..=limit).find_map(|r| {
        (-r..=r).find_map(|dx| {
            let dy = r - dx.abs();
            [from.offset(dx, -dy), from.offset(dx, dy)]
                .into_iter()
                .find(|&p| grid.in_bounds(p) && grid.is_walkable(p))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hamlet_sim::config::GameConfig;
    use hamlet_sim::grid::WorldMap;

    #[test]
    fn points_spread_over_map() {
        assert_eq!(founding_points(64, 64, 1), vec![TilePos::new(32, 32)]);
        assert_eq!(
            founding_points(64, 64, 4),
            vec![
                TilePos::new(16, 16),
                TilePos::new(48, 16),
                TilePos::new(16, 48),
                TilePos::new(48, 48),
            ]
        );
        // Three seats use a 2x2 layout with the last cell empty.
        assert_eq!(founding_points(64, 64, 3).len(), 3);
    }

    #[test]
    fn one_family_per_seat() {
        let mut engine = GameEngine::with_open_map(1, GameConfig::default()).unwrap();
        let families = found_settlements(&mut engine, 4, 3).unwrap();
        assert_eq!(families.len(), 4);
        let world = engine.world();
        assert_eq!(world.people.len(), 12);
        for (seat, family) in families.iter().enumerate() {
            let family = world.family(*family).unwrap();
            assert_eq!(family.owner, PlayerId(seat as u32));
            assert_eq!(family.members.len(), 3);
        }
        assert_eq!(world.people[0].name, "Ada");
        assert_eq!(world.people[3].name, "Dunstan");
    }

    #[test]
    fn blocked_centre_moves_to_nearest_open_tile() {
        let map = WorldMap::from_rows(&[
            "........", "........", "........", "...##...", "...###..", "........", "........",
            "........",
        ])
        .unwrap();
        let mut engine = GameEngine::new(1, GameConfig::default(), map).unwrap();
        found_settlements(&mut engine, 1, 1).unwrap();
        let pos = engine.world().people[0].position;
        assert_ne!(pos, TilePos::new(4, 4));
        assert_eq!(pos.manhattan_distance(TilePos::new(4, 4)), 1);
    }
}
