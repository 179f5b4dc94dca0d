// A* pathfinding over the tile grid.
//
// Standard A* over any `NavGrid` using a `BinaryHeap` (min-heap via reversed
// ordering, same pattern as the command queue). Scores, came-from links and
// the closed set live in `Vec`s indexed by flat tile index for O(1) access
// and deterministic behaviour (no `HashMap`).
//
// Movement is 4-directional with unit step cost; the heuristic is Manhattan
// distance, which is admissible and consistent on this grid. When two open
// entries have equal F the one with the lower heuristic pops first (it is
// closer to the goal), then the lower position, so the pop order is total.
//
// Walkability is queried from the grid while expanding; nothing is
// snapshotted. Occupancy is deliberately ignored here: crowding is the
// movement executor's concern, re-checked every tick.
//
// See also: `grid.rs` for `NavGrid`, `movement.rs` which consumes paths,
// `routine.rs` which computes dispatch paths in parallel.
//
// **Critical constraint: determinism.** Pure function of grid state and
// endpoints. Integer costs only.

use crate::grid::NavGrid;
use crate::types::TilePos;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Entry in the A* open set (min-heap via reversed ordering).
#[derive(PartialEq, Eq)]
struct OpenEntry {
    pos: TilePos,
    f_score: u32,
    h_score: u32,
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest (f, h, pos) is "greatest".
        other
            .f_score
            .cmp(&self.f_score)
            .then_with(|| other.h_score.cmp(&self.h_score))
            .then_with(|| other.pos.cmp(&self.pos))
    }
}

/// Shortest 4-connected path from `start` to `goal`, both inclusive.
///
/// Returns `None` when either endpoint is out of bounds, the goal is not
/// walkable, or no path exists. The start tile itself need not be walkable
/// (a person may be standing in a doorway that was just built over).
pub fn find_path<G: NavGrid + ?Sized>(start: TilePos, goal: TilePos, grid: &G) -> Option<Vec<TilePos>> {
    let si = grid.index_of(start)?;
    let gi = grid.index_of(goal)?;
    if start == goal {
        return Some(vec![start]);
    }
    if !grid.is_walkable(goal) {
        return None;
    }

    let n = grid.width() as usize * grid.height() as usize;
    let mut g_score = vec![u32::MAX; n];
    let mut came_from: Vec<Option<TilePos>> = vec![None; n];
    let mut closed = vec![false; n];

    g_score[si] = 0;
    let mut open = BinaryHeap::new();
    let h = start.manhattan_distance(goal);
    open.push(OpenEntry {
        pos: start,
        f_score: h,
        h_score: h,
    });

    while let Some(current) = open.pop() {
        let Some(ci) = grid.index_of(current.pos) else {
            continue;
        };
        if ci == gi {
            return Some(reconstruct_path(grid, &came_from, start, goal));
        }
        if closed[ci] {
            continue;
        }
        closed[ci] = true;

        let tentative_g = g_score[ci] + 1;
        for neighbor in current.pos.neighbors4() {
            let Some(ni) = grid.index_of(neighbor) else {
                continue;
            };
            if closed[ni] || !grid.is_walkable(neighbor) {
                continue;
            }
            if tentative_g < g_score[ni] {
                g_score[ni] = tentative_g;
                came_from[ni] = Some(current.pos);
                let h = neighbor.manhattan_distance(goal);
                open.push(OpenEntry {
                    pos: neighbor,
                    f_score: tentative_g + h,
                    h_score: h,
                });
            }
        }
    }

    None
}

/// Try each goal in order and return the first path found, with the goal it
/// reached. Used for "the door, or failing that somewhere next to it".
pub fn find_path_to_any<G: NavGrid + ?Sized>(
    start: TilePos,
    goals: &[TilePos],
    grid: &G,
) -> Option<(TilePos, Vec<TilePos>)> {
    goals
        .iter()
        .find_map(|&goal| find_path(start, goal, grid).map(|path| (goal, path)))
}

fn reconstruct_path<G: NavGrid + ?Sized>(
    grid: &G,
    came_from: &[Option<TilePos>],
    start: TilePos,
    goal: TilePos,
) -> Vec<TilePos> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match grid.index_of(current).and_then(|i| came_from[i]) {
            Some(prev) => {
                path.push(prev);
                current = prev;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{TileGrid, WorldMap};

    fn grid(rows: &[&str]) -> TileGrid {
        TileGrid::new(&WorldMap::from_rows(rows).unwrap())
    }

    fn assert_contiguous(path: &[TilePos]) {
        for pair in path.windows(2) {
            assert_eq!(pair[0].manhattan_distance(pair[1]), 1, "{path:?}");
        }
    }

    #[test]
    fn open_grid_corner_to_corner() {
        let g = TileGrid::new(&WorldMap::open(10, 10));
        let path = find_path(TilePos::new(0, 0), TilePos::new(9, 9), &g).unwrap();
        assert_eq!(path.len(), 19);
        assert_eq!(path[0], TilePos::new(0, 0));
        assert_eq!(path[18], TilePos::new(9, 9));
        assert_contiguous(&path);
    }

    #[test]
    fn same_start_and_goal() {
        let g = TileGrid::new(&WorldMap::open(8, 8));
        let p = TilePos::new(3, 3);
        assert_eq!(find_path(p, p, &g), Some(vec![p]));
    }

    #[test]
    fn full_wall_blocks() {
        let g = grid(&[
            "...#....", "...#....", "...#....", "...#....", "...#....", "...#....", "...#....",
            "...#....",
        ]);
        assert_eq!(find_path(TilePos::new(0, 0), TilePos::new(7, 7), &g), None);
    }

    #[test]
    fn routes_around_obstacle() {
        let g = grid(&[
            "........", "...#....", "...#....", "...#....", "...#....", "...#....", "...#....",
            "...#....",
        ]);
        let path = find_path(TilePos::new(0, 7), TilePos::new(7, 7), &g).unwrap();
        assert!(path.iter().all(|p| g.is_walkable(*p)));
        assert!(path.contains(&TilePos::new(3, 0)));
        assert_contiguous(&path);
        // Up 7, across 7, down 7.
        assert_eq!(path.len(), 22);
    }

    #[test]
    fn unwalkable_goal_or_out_of_bounds() {
        let g = grid(&["....~...", "........", "........", "........", "........", "........", "........", "........"]);
        assert_eq!(find_path(TilePos::new(0, 0), TilePos::new(4, 0), &g), None);
        assert_eq!(find_path(TilePos::new(0, 0), TilePos::new(8, 0), &g), None);
        assert_eq!(find_path(TilePos::new(-1, 0), TilePos::new(1, 0), &g), None);
    }

    #[test]
    fn deterministic_tie_breaking() {
        let g = TileGrid::new(&WorldMap::open(12, 12));
        let a = find_path(TilePos::new(1, 1), TilePos::new(10, 8), &g).unwrap();
        let b = find_path(TilePos::new(1, 1), TilePos::new(10, 8), &g).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 9 + 7 + 1);
    }

    #[test]
    fn to_any_falls_back_to_later_goals() {
        let g = grid(&[
            "...#~...", "...#....", "...#....", "...#....", "...#....", "...#....", "...#....",
            "...#....",
        ]);
        let goals = [TilePos::new(4, 0), TilePos::new(6, 6), TilePos::new(2, 2)];
        let (goal, path) = find_path_to_any(TilePos::new(0, 0), &goals, &g).unwrap();
        assert_eq!(goal, TilePos::new(2, 2));
        assert_eq!(path.len(), 5);
        assert!(find_path_to_any(TilePos::new(0, 0), &goals[..2], &g).is_none());
    }
}
