// The village tile grid.
//
// `WorldMap` is the static terrain handed to the engine by the external map
// generator (or parsed from ASCII rows in tests and by the server's `--map`
// flag). `TileGrid` is the engine's live view: one `Tile` per cell in a flat
// `Vec` indexed by `x + y * width`, carrying terrain, an optional non-owning
// building reference, a door flag, and the transient occupancy set.
//
// Occupancy is rebuilt from scratch at the start of every tick
// (`clear_occupancy` then `add_occupant` per living person) and updated
// incrementally by the movement executor within the tick. It is never
// serialized; a restored engine rebuilds it on its first tick.
//
// `NavGrid` is the narrow read-only interface the pathfinder searches over.
// `TileGrid` implements it; other grids (tests, future wildlife layers) can
// too.
//
// See also: `pathfinding.rs`, `movement.rs`, `world.rs` which owns the grid.
//
// **Critical constraint: determinism.** Occupant lists keep insertion order,
// and insertion happens in person-id order during the rebuild.

use crate::types::{BuildingId, PersonId, TerrainKind, TilePos};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Errors from parsing an ASCII terrain map.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("map has no rows")]
    Empty,
    #[error("row {row} has {found} tiles, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("unknown terrain glyph {glyph:?} at ({x}, {y})")]
    UnknownGlyph { glyph: char, x: usize, y: usize },
}

/// Static terrain, row-major.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldMap {
    pub width: u32,
    pub height: u32,
    pub terrain: Vec<TerrainKind>,
}

impl WorldMap {
    /// An all-grass map.
    pub fn open(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            terrain: vec![TerrainKind::Grass; (width as usize) * (height as usize)],
        }
    }

    /// Parse one string per row using the glyphs of `TerrainKind::from_glyph`.
    pub fn from_rows(rows: &[&str]) -> Result<Self, MapError> {
        let first = rows.first().ok_or(MapError::Empty)?;
        let width = first.chars().count();
        if width == 0 {
            return Err(MapError::Empty);
        }
        let mut terrain = Vec::with_capacity(width * rows.len());
        for (y, row) in rows.iter().enumerate() {
            let found = row.chars().count();
            if found != width {
                return Err(MapError::Ragged {
                    row: y,
                    expected: width,
                    found,
                });
            }
            for (x, glyph) in row.chars().enumerate() {
                let kind =
                    TerrainKind::from_glyph(glyph).ok_or(MapError::UnknownGlyph { glyph, x, y })?;
                terrain.push(kind);
            }
        }
        Ok(Self {
            width: width as u32,
            height: rows.len() as u32,
            terrain,
        })
    }

    /// Parse a whole text file; blank lines are ignored.
    pub fn from_ascii(text: &str) -> Result<Self, MapError> {
        let rows: Vec<&str> = text
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.is_empty())
            .collect();
        Self::from_rows(&rows)
    }

    pub fn get(&self, pos: TilePos) -> Option<TerrainKind> {
        if pos.x < 0 || pos.y < 0 || pos.x as u32 >= self.width || pos.y as u32 >= self.height {
            return None;
        }
        self.terrain
            .get(pos.x as usize + pos.y as usize * self.width as usize)
            .copied()
    }

    /// Overwrite a single tile. Out-of-bounds writes are no-ops.
    pub fn set(&mut self, pos: TilePos, kind: TerrainKind) {
        if pos.x < 0 || pos.y < 0 || pos.x as u32 >= self.width || pos.y as u32 >= self.height {
            return;
        }
        let i = pos.x as usize + pos.y as usize * self.width as usize;
        if let Some(slot) = self.terrain.get_mut(i) {
            *slot = kind;
        }
    }
}

/// Read-only grid interface searched by the pathfinder.
pub trait NavGrid {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Whether a walker may enter `pos` right now.
    fn is_walkable(&self, pos: TilePos) -> bool;

    fn in_bounds(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width() && (pos.y as u32) < self.height()
    }

    /// Flat index of an in-bounds position.
    fn index_of(&self, pos: TilePos) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| pos.x as usize + pos.y as usize * self.width() as usize)
    }
}

/// One live cell of the village.
#[derive(Clone, Debug)]
pub struct Tile {
    pub pos: TilePos,
    pub terrain: TerrainKind,
    /// Building covering this tile, if any. Non-owning.
    pub building: Option<BuildingId>,
    /// The building's entrance. Walkable despite `building` being set.
    pub is_door: bool,
    /// People standing here this tick.
    pub occupants: SmallVec<[PersonId; 4]>,
}

impl Tile {
    pub fn is_walkable(&self) -> bool {
        self.terrain.is_walkable() && (self.building.is_none() || self.is_door)
    }

    /// Whether another person may step here given `capacity`. `mover` is
    /// excluded from the count. Doors have no capacity limit.
    pub fn has_room_for(&self, mover: PersonId, capacity: u32) -> bool {
        if self.is_door {
            return true;
        }
        let others = self.occupants.iter().filter(|&&p| p != mover).count();
        others < capacity as usize
    }
}

/// Dense 2D grid of tiles.
#[derive(Clone, Debug, Default)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl TileGrid {
    pub fn new(map: &WorldMap) -> Self {
        let mut tiles = Vec::with_capacity(map.terrain.len());
        for y in 0..map.height as i32 {
            for x in 0..map.width as i32 {
                let pos = TilePos::new(x, y);
                tiles.push(Tile {
                    pos,
                    terrain: map.get(pos).unwrap_or_default(),
                    building: None,
                    is_door: false,
                    occupants: SmallVec::new(),
                });
            }
        }
        Self {
            width: map.width,
            height: map.height,
            tiles,
        }
    }

    pub fn get_tile(&self, x: i32, y: i32) -> Option<&Tile> {
        self.tile(TilePos::new(x, y))
    }

    pub fn tile(&self, pos: TilePos) -> Option<&Tile> {
        self.index_of(pos).and_then(|i| self.tiles.get(i))
    }

    fn tile_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
        self.index_of(pos).and_then(|i| self.tiles.get_mut(i))
    }

    /// Terrain only, for snapshots.
    pub fn terrain_map(&self) -> WorldMap {
        WorldMap {
            width: self.width,
            height: self.height,
            terrain: self.tiles.iter().map(|t| t.terrain).collect(),
        }
    }

    // -----------------------------------------------------------------------
    // Buildings
    // -----------------------------------------------------------------------

    /// Whether every tile is in bounds, walkable terrain, and free of
    /// buildings.
    pub fn can_place(&self, tiles: &[TilePos]) -> bool {
        tiles.iter().all(|&p| {
            self.tile(p)
                .is_some_and(|t| t.terrain.is_walkable() && t.building.is_none())
        })
    }

    pub fn set_building(&mut self, tiles: &[TilePos], door: TilePos, id: BuildingId) {
        for &p in tiles {
            if let Some(t) = self.tile_mut(p) {
                t.building = Some(id);
                t.is_door = p == door;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Occupancy
    // -----------------------------------------------------------------------

    pub fn clear_occupancy(&mut self) {
        for t in &mut self.tiles {
            t.occupants.clear();
        }
    }

    pub fn add_occupant(&mut self, pos: TilePos, person: PersonId) {
        if let Some(t) = self.tile_mut(pos) {
            t.occupants.push(person);
        }
    }

    pub fn remove_occupant(&mut self, pos: TilePos, person: PersonId) {
        if let Some(t) = self.tile_mut(pos) {
            t.occupants.retain(|p| *p != person);
        }
    }

    pub fn occupant_count(&self, pos: TilePos) -> usize {
        self.tile(pos).map_or(0, |t| t.occupants.len())
    }
}

impl NavGrid for TileGrid {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn is_walkable(&self, pos: TilePos) -> bool {
        self.tile(pos).is_some_and(Tile::is_walkable)
    }
}
