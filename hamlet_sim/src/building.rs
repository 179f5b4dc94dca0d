// Placed buildings.
//
// A `Building` is created by a `PlaceBuilding` command (or at genesis) from a
// `BuildingLayout` in the catalogue. Placement stamps its footprint onto the
// tile grid; the door is the only walkable footprint tile. Construction
// progress climbs monotonically towards `required_work` while assigned
// workers stand at the door; once complete the same crew runs production
// into the building's local `buffer`, which is flushed to the village ledger
// at each day start.
//
// Crew size is `ceil(effective workforce)`: any non-zero effort counts as one
// full worker, so a single exhausted, sick, hungry villager still keeps the
// building running at minimum pace.
//
// See also: `catalog.rs` for layouts, `sim.rs` (`run_work_step`) for where
// the crew is summed, `routine.rs` for the daily flush.

use crate::catalog::{BuildingLayout, ProductionData};
use crate::resources::{ResourceLedger, ResourceStore};
use crate::types::{BuildingId, BuildingKind, PersonId, PlayerId, Rotation, TilePos};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    pub kind: BuildingKind,
    pub owner: PlayerId,
    pub anchor: TilePos,
    pub rotation: Rotation,
    /// Covered tiles, from the layout at placement time.
    pub tiles: Vec<TilePos>,
    pub door: TilePos,
    pub progress: u32,
    pub required_work: u32,
    pub completed: bool,
    pub workers: Vec<PersonId>,
    pub residents: Vec<PersonId>,
    pub buffer: ResourceLedger,
    /// Work accumulated towards the next unit of output.
    pub production_progress: u32,
}

impl Building {
    pub fn new(
        id: BuildingId,
        kind: BuildingKind,
        owner: PlayerId,
        anchor: TilePos,
        rotation: Rotation,
        layout: &BuildingLayout,
    ) -> Self {
        let mut building = Self {
            id,
            kind,
            owner,
            anchor,
            rotation,
            tiles: layout.tiles(anchor, rotation),
            door: layout.door_tile(anchor, rotation),
            progress: 0,
            required_work: layout.required_work,
            completed: false,
            workers: Vec::new(),
            residents: Vec::new(),
            buffer: ResourceLedger::new(),
            production_progress: 0,
        };
        if building.required_work == 0 {
            building.completed = true;
        }
        building
    }

    /// Mark as already built (genesis placements).
    pub fn finish(&mut self) {
        self.progress = self.required_work;
        self.completed = true;
    }

    /// Add `crew` units of construction work. Returns `true` on the tick the
    /// building completes.
    pub fn apply_construction(&mut self, crew: u32) -> bool {
        if self.completed || crew == 0 {
            return false;
        }
        self.progress = self.progress.saturating_add(crew).min(self.required_work);
        if self.progress >= self.required_work {
            self.completed = true;
            return true;
        }
        false
    }

    /// Add `crew` units of production work, emitting whole units of output
    /// into the buffer. Returns the number of units produced.
    pub fn apply_production(&mut self, crew: u32, production: &ProductionData) -> u32 {
        if !self.completed || crew == 0 || production.work_per_unit == 0 {
            return 0;
        }
        self.production_progress = self.production_progress.saturating_add(crew);
        let units = self.production_progress / production.work_per_unit;
        self.production_progress %= production.work_per_unit;
        if units > 0 {
            self.buffer.add(production.output, units);
        }
        units
    }
}

/// Minimum viable crew for a summed effectiveness.
pub fn crew_size(effective_workforce: f32) -> u32 {
    if effective_workforce <= 0.0 {
        0
    } else {
        effective_workforce.ceil() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_layouts;
    use crate::types::ResourceKind;

    fn farm() -> Building {
        let layout = &default_layouts()[&BuildingKind::Farm];
        Building::new(
            BuildingId(0),
            BuildingKind::Farm,
            PlayerId(0),
            TilePos::new(2, 2),
            Rotation::R0,
            layout,
        )
    }

    #[test]
    fn placement_copies_layout() {
        let b = farm();
        assert_eq!(b.tiles.len(), 9);
        assert_eq!(b.door, TilePos::new(3, 4));
        assert!(!b.completed);
    }

    #[test]
    fn construction_is_monotonic_and_completes_once() {
        let mut b = farm();
        let mut completions = 0;
        let mut last = 0;
        for _ in 0..200 {
            if b.apply_construction(1) {
                completions += 1;
            }
            assert!(b.progress >= last);
            last = b.progress;
        }
        assert_eq!(completions, 1);
        assert!(b.completed);
        assert_eq!(b.progress, b.required_work);
    }

    #[test]
    fn production_waits_for_completion() {
        let mut b = farm();
        let production = default_layouts()[&BuildingKind::Farm].production.clone().unwrap();
        assert_eq!(b.apply_production(4, &production), 0);
        b.finish();
        let mut made = 0;
        for _ in 0..10 {
            made += b.apply_production(4, &production);
        }
        // 40 work at 20 per unit.
        assert_eq!(made, 2);
        assert_eq!(b.buffer.get(ResourceKind::Grain), 2);
        assert_eq!(b.production_progress, 0);
    }

    #[test]
    fn crew_is_ceiling_of_effort() {
        assert_eq!(crew_size(0.0), 0);
        assert_eq!(crew_size(0.075), 1);
        assert_eq!(crew_size(0.15), 1);
        assert_eq!(crew_size(1.0), 1);
        assert_eq!(crew_size(2.1), 3);
    }
}
