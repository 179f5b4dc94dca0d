// Core types shared across the simulation.
//
// Grid coordinates (`TilePos`), compact integer entity identifiers, and the
// small enums the rest of the crate keys on (seasons, terrain, resources,
// building kinds, rotations). Everything derives serde for snapshots and
// for command payloads on the wire.
//
// Entity ids are plain indices into the id-ordered vectors owned by `World`
// (see `world.rs`). They are handed out sequentially and never reused: a
// dead person keeps its id and slot. This keeps cross references (spouse,
// home, workplace) trivially serializable and removes reference cycles.
//
// **Critical constraint: determinism.** All id and position types are
// totally ordered so they can key `BTreeMap`s and break ties in the
// pathfinder and the command queue.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Spatial types
// ---------------------------------------------------------------------------

/// A tile position on the village grid. `x` grows east, `y` grows south.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan_distance(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).saturating_add(self.y.abs_diff(other.y))
    }

    /// Saturates at the `i32` limits. Positions come off the wire, and a
    /// saturated tile is out of bounds for every grid.
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }

    /// The four orthogonal neighbours in a fixed order (north, east, south,
    /// west). Callers rely on this order for reproducible expansion.
    pub const fn neighbors4(self) -> [TilePos; 4] {
        [
            self.offset(0, -1),
            self.offset(1, 0),
            self.offset(0, 1),
            self.offset(-1, 0),
        ]
    }
}

impl fmt::Display for TilePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Entity IDs
// ---------------------------------------------------------------------------

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub $inner);

        impl $name {
            /// Slot of this entity in its owning vector.
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

entity_id!(/// A villager.
PersonId(u32));
entity_id!(/// A household; people in one family share an owner.
FamilyId(u32));
entity_id!(/// A placed building (under construction or complete).
BuildingId(u32));
entity_id!(/// A participant in the session. Single-player games use `PlayerId(0)`.
PlayerId(u32));
entity_id!(/// Client-chosen command identifier, unique per player.
CommandId(u64));

// ---------------------------------------------------------------------------
// Calendar
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Autumn, Season::Winter];

    /// The following season and whether the year wrapped.
    pub const fn next(self) -> (Season, bool) {
        match self {
            Season::Spring => (Season::Summer, false),
            Season::Summer => (Season::Autumn, false),
            Season::Autumn => (Season::Winter, false),
            Season::Winter => (Season::Spring, true),
        }
    }

    /// Firewood is only burned in the cold season.
    pub const fn is_cold(self) -> bool {
        matches!(self, Season::Winter)
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Autumn => "Autumn",
            Season::Winter => "Winter",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Terrain
// ---------------------------------------------------------------------------

/// Terrain of a single tile, supplied by the external map generator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerrainKind {
    #[default]
    Grass,
    Dirt,
    Forest,
    Sand,
    Water,
    Rock,
}

impl TerrainKind {
    pub const fn is_walkable(self) -> bool {
        !matches!(self, TerrainKind::Water | TerrainKind::Rock)
    }

    /// ASCII glyph used by `WorldMap::from_rows`.
    pub const fn from_glyph(c: char) -> Option<Self> {
        match c {
            '.' => Some(TerrainKind::Grass),
            ',' => Some(TerrainKind::Dirt),
            'T' => Some(TerrainKind::Forest),
            ':' => Some(TerrainKind::Sand),
            '~' => Some(TerrainKind::Water),
            '#' => Some(TerrainKind::Rock),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Resources and buildings
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Grain,
    Vegetables,
    Fish,
    Logs,
    Firewood,
    Stone,
}

impl ResourceKind {
    /// Food kinds, in the order daily upkeep draws from them.
    pub const FOOD: [ResourceKind; 3] = [ResourceKind::Grain, ResourceKind::Vegetables, ResourceKind::Fish];

    pub const fn is_food(self) -> bool {
        matches!(self, ResourceKind::Grain | ResourceKind::Vegetables | ResourceKind::Fish)
    }
}

/// Kinds of buildings a player can place. Layout and balance data for each
/// kind lives in the building catalogue (`catalog.rs`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BuildingKind {
    House,
    Farm,
    Garden,
    FishingDock,
    Woodcutter,
    FirewoodShed,
    Quarry,
    Storehouse,
}

/// Quarter-turn rotation applied to a building footprint at placement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manhattan_distance_is_symmetric() {
        let a = TilePos::new(0, 0);
        let b = TilePos::new(3, -4);
        assert_eq!(a.manhattan_distance(b), 7);
        assert_eq!(b.manhattan_distance(a), 7);
    }

    #[test]
    fn neighbor_order_is_fixed() {
        let n = TilePos::new(5, 5).neighbors4();
        assert_eq!(
            n,
            [
                TilePos::new(5, 4),
                TilePos::new(6, 5),
                TilePos::new(5, 6),
                TilePos::new(4, 5),
            ]
        );
    }

    #[test]
    fn offsets_saturate_at_the_edges() {
        let far = TilePos::new(i32::MAX, i32::MIN);
        assert_eq!(far.offset(3, -3), far);
        assert_eq!(far.neighbors4()[1], far);
        assert_eq!(far.manhattan_distance(TilePos::new(i32::MIN, i32::MAX)), u32::MAX);
    }

    #[test]
    fn season_cycle_wraps_year_after_winter() {
        let mut season = Season::Spring;
        let mut wraps = 0;
        for _ in 0..8 {
            let (next, wrapped) = season.next();
            if wrapped {
                wraps += 1;
                assert_eq!(next, Season::Spring);
            }
            season = next;
        }
        assert_eq!(wraps, 2);
    }

    #[test]
    fn terrain_glyphs() {
        assert_eq!(TerrainKind::from_glyph('~'), Some(TerrainKind::Water));
        assert!(!TerrainKind::Rock.is_walkable());
        assert!(TerrainKind::Forest.is_walkable());
        assert_eq!(TerrainKind::from_glyph('?'), None);
    }

    #[test]
    fn entity_id_display_and_index() {
        let id = PersonId(12);
        assert_eq!(id.index(), 12);
        assert_eq!(id.to_string(), "PersonId(12)");
    }
}
