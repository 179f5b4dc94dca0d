// Building layouts: data-driven building definitions.
//
// Everything the sim needs to know about a kind of building (footprint, door,
// cost, required construction work, production, capacities) is expressed as
// data in `BuildingLayout`, keyed by `BuildingKind` in `GameConfig::buildings`.
// The sim has a single `Building` type and reads kind-specific values from the
// catalogue; no code branches per kind.
//
// Footprints are authored at rotation `R0` as a `width × height` rectangle
// whose top-left corner is the anchor. The door is one tile inside the
// footprint; it is the only footprint tile people may stand on. Rotations
// turn the rectangle a quarter at a time around the anchor corner, keeping the
// anchor as the top-left of the rotated bounding box.
//
// See also: `config.rs` where the table lives, `building.rs` for the placed
// `Building`, `command.rs` (`PlaceBuilding`) for cost and placement checks.
//
// **Critical constraint: determinism.** Costs are stored in a `BTreeMap` so
// they are always checked and deducted in the same order.

use crate::types::{BuildingKind, ResourceKind, Rotation, Season, TilePos};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a completed building produces.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductionData {
    pub output: ResourceKind,
    /// Work units (one per crew member per tick) for one unit of output.
    pub work_per_unit: u32,
    /// Seasons in which production runs. Empty means all year.
    #[serde(default)]
    pub seasons: Vec<Season>,
}

impl ProductionData {
    pub fn active_in(&self, season: Season) -> bool {
        self.seasons.is_empty() || self.seasons.contains(&season)
    }
}

/// Static layout and balance data for one building kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildingLayout {
    /// `(width, height)` at rotation `R0`.
    pub footprint: (u32, u32),
    /// Door offset from the anchor at rotation `R0`. Must lie inside the
    /// footprint.
    pub door: (u32, u32),
    pub cost: BTreeMap<ResourceKind, u32>,
    /// Construction work units needed before the building is complete.
    pub required_work: u32,
    pub worker_capacity: u32,
    pub resident_capacity: u32,
    pub production: Option<ProductionData>,
}

impl BuildingLayout {
    /// Every tile covered by the building when placed at `anchor` with
    /// `rotation`, in row-major order of the rotated box.
    pub fn tiles(&self, anchor: TilePos, rotation: Rotation) -> Vec<TilePos> {
        let (w, h) = self.rotated_size(rotation);
        let mut tiles = Vec::with_capacity((w * h) as usize);
        for dy in 0..h {
            for dx in 0..w {
                tiles.push(anchor.offset(dx as i32, dy as i32));
            }
        }
        tiles
    }

    /// Footprint size after rotation.
    pub fn rotated_size(&self, rotation: Rotation) -> (u32, u32) {
        let (w, h) = self.footprint;
        match rotation {
            Rotation::R0 | Rotation::R180 => (w, h),
            Rotation::R90 | Rotation::R270 => (h, w),
        }
    }

    /// Absolute door tile after rotation.
    pub fn door_tile(&self, anchor: TilePos, rotation: Rotation) -> TilePos {
        let (w, h) = self.footprint;
        let (dx, dy) = self.door;
        let (rx, ry) = match rotation {
            Rotation::R0 => (dx, dy),
            Rotation::R90 => (h - 1 - dy, dx),
            Rotation::R180 => (w - 1 - dx, h - 1 - dy),
            Rotation::R270 => (dy, w - 1 - dx),
        };
        anchor.offset(rx as i32, ry as i32)
    }

    /// Layout sanity: non-empty footprint with the door inside it.
    pub fn check(&self) -> Result<(), String> {
        let (w, h) = self.footprint;
        if w == 0 || h == 0 {
            return Err("footprint must be at least 1x1".to_string());
        }
        if self.door.0 >= w || self.door.1 >= h {
            return Err(format!(
                "door {:?} lies outside the {w}x{h} footprint",
                self.door
            ));
        }
        if let Some(p) = &self.production
            && p.work_per_unit == 0
        {
            return Err("work_per_unit must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Read-only view over the configured layouts.
#[derive(Clone, Debug, Default)]
pub struct BuildingCatalog {
    layouts: BTreeMap<BuildingKind, BuildingLayout>,
}

impl BuildingCatalog {
    pub fn new(layouts: BTreeMap<BuildingKind, BuildingLayout>) -> Self {
        Self { layouts }
    }

    pub fn layout(&self, kind: BuildingKind) -> Option<&BuildingLayout> {
        self.layouts.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = BuildingKind> + '_ {
        self.layouts.keys().copied()
    }
}

// ---------------------------------------------------------------------------
// Shipped layouts
// ---------------------------------------------------------------------------

fn costs(items: &[(ResourceKind, u32)]) -> BTreeMap<ResourceKind, u32> {
    items.iter().copied().collect()
}

fn producer(output: ResourceKind, work_per_unit: u32, seasons: &[Season]) -> Option<ProductionData> {
    Some(ProductionData {
        output,
        work_per_unit,
        seasons: seasons.to_vec(),
    })
}

/// The default building table loaded into `GameConfig::default()`.
pub fn default_layouts() -> BTreeMap<BuildingKind, BuildingLayout> {
    use ResourceKind::*;
    const GROWING: &[Season] = &[Season::Spring, Season::Summer, Season::Autumn];

    let mut table = BTreeMap::new();
    table.insert(
        BuildingKind::House,
        BuildingLayout {
            footprint: (2, 2),
            door: (0, 1),
            cost: costs(&[(Logs, 20)]),
            required_work: 240,
            worker_capacity: 0,
            resident_capacity: 6,
            production: None,
        },
    );
    table.insert(
        BuildingKind::Farm,
        BuildingLayout {
            footprint: (3, 3),
            door: (1, 2),
            cost: costs(&[(Logs, 10)]),
            required_work: 180,
            worker_capacity: 4,
            resident_capacity: 0,
            production: producer(Grain, 20, GROWING),
        },
    );
    table.insert(
        BuildingKind::Garden,
        BuildingLayout {
            footprint: (2, 2),
            door: (0, 1),
            cost: costs(&[(Logs, 5)]),
            required_work: 90,
            worker_capacity: 2,
            resident_capacity: 0,
            production: producer(Vegetables, 15, GROWING),
        },
    );
    table.insert(
        BuildingKind::FishingDock,
        BuildingLayout {
            footprint: (2, 2),
            door: (0, 1),
            cost: costs(&[(Logs, 15)]),
            required_work: 150,
            worker_capacity: 3,
            resident_capacity: 0,
            production: producer(Fish, 25, &[]),
        },
    );
    table.insert(
        BuildingKind::Woodcutter,
        BuildingLayout {
            footprint: (2, 2),
            door: (0, 1),
            cost: costs(&[(Logs, 5)]),
            required_work: 120,
            worker_capacity: 3,
            resident_capacity: 0,
            production: producer(Logs, 20, &[]),
        },
    );
    table.insert(
        BuildingKind::FirewoodShed,
        BuildingLayout {
            footprint: (2, 1),
            door: (0, 0),
            cost: costs(&[(Logs, 10)]),
            required_work: 90,
            worker_capacity: 2,
            resident_capacity: 0,
            production: producer(Firewood, 10, &[]),
        },
    );
    table.insert(
        BuildingKind::Quarry,
        BuildingLayout {
            footprint: (3, 3),
            door: (1, 2),
            cost: costs(&[(Logs, 20)]),
            required_work: 300,
            worker_capacity: 4,
            resident_capacity: 0,
            production: producer(Stone, 30, &[]),
        },
    );
    table.insert(
        BuildingKind::Storehouse,
        BuildingLayout {
            footprint: (3, 2),
            door: (1, 1),
            cost: costs(&[(Logs, 30), (Stone, 20)]),
            required_work: 360,
            worker_capacity: 0,
            resident_capacity: 0,
            production: None,
        },
    );
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn farm() -> BuildingLayout {
        default_layouts()[&BuildingKind::Farm].clone()
    }

    #[test]
    fn shipped_layouts_are_sane() {
        for (kind, layout) in default_layouts() {
            assert!(layout.check().is_ok(), "{kind:?}");
        }
    }

    #[test]
    fn tiles_cover_rotated_footprint() {
        let shed = default_layouts()[&BuildingKind::FirewoodShed].clone();
        let anchor = TilePos::new(4, 4);
        assert_eq!(
            shed.tiles(anchor, Rotation::R0),
            vec![TilePos::new(4, 4), TilePos::new(5, 4)]
        );
        assert_eq!(
            shed.tiles(anchor, Rotation::R90),
            vec![TilePos::new(4, 4), TilePos::new(4, 5)]
        );
    }

    #[test]
    fn door_stays_inside_footprint_for_every_rotation() {
        let layout = farm();
        let anchor = TilePos::new(10, 20);
        for rotation in [Rotation::R0, Rotation::R90, Rotation::R180, Rotation::R270] {
            let door = layout.door_tile(anchor, rotation);
            assert!(layout.tiles(anchor, rotation).contains(&door), "{rotation:?}");
        }
    }

    #[test]
    fn door_rotation_moves_bottom_middle_around_the_box() {
        let layout = farm();
        let a = TilePos::new(0, 0);
        assert_eq!(layout.door_tile(a, Rotation::R0), TilePos::new(1, 2));
        assert_eq!(layout.door_tile(a, Rotation::R90), TilePos::new(0, 1));
        assert_eq!(layout.door_tile(a, Rotation::R180), TilePos::new(1, 0));
        assert_eq!(layout.door_tile(a, Rotation::R270), TilePos::new(2, 1));
    }

    #[test]
    fn check_rejects_door_outside() {
        let mut layout = farm();
        layout.door = (3, 0);
        assert!(layout.check().is_err());
    }

    #[test]
    fn seasonal_production() {
        let p = farm().production.unwrap();
        assert!(p.active_in(Season::Summer));
        assert!(!p.active_in(Season::Winter));
    }
}
