// The mutable world aggregate.
//
// `World` owns everything the simulation mutates: the tile grid, people,
// families, buildings and the village resource ledger. Entities live in
// id-indexed `Vec`s (`PersonId(n)` is `people[n]`), ids are handed out
// sequentially and never reused, and cross references are ids, never
// pointers. Only `GameEngine` holds a `World`; everything else borrows it or
// mutates it through commands.
//
// See also: `sim.rs` (`GameEngine`), `command.rs` (mutations driven by
// players), `snapshot.rs` (reference validation on restore).
//
// **Critical constraint: determinism.** Iteration over entities is always in
// id order.

use crate::building::Building;
use crate::catalog::BuildingLayout;
use crate::grid::{NavGrid, TileGrid, WorldMap};
use crate::person::{Family, Person};
use crate::resources::ResourceLedger;
use crate::types::*;

#[derive(Clone, Debug, Default)]
pub struct World {
    pub grid: TileGrid,
    pub people: Vec<Person>,
    pub families: Vec<Family>,
    pub buildings: Vec<Building>,
    pub ledger: ResourceLedger,
}

impl World {
    pub fn new(map: &WorldMap, ledger: ResourceLedger) -> Self {
        Self {
            grid: TileGrid::new(map),
            people: Vec::new(),
            families: Vec::new(),
            buildings: Vec::new(),
            ledger,
        }
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn person(&self, id: PersonId) -> Option<&Person> {
        self.people.get(id.index())
    }

    pub fn person_mut(&mut self, id: PersonId) -> Option<&mut Person> {
        self.people.get_mut(id.index())
    }

    pub fn family(&self, id: FamilyId) -> Option<&Family> {
        self.families.get(id.index())
    }

    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(id.index())
    }

    pub fn building_mut(&mut self, id: BuildingId) -> Option<&mut Building> {
        self.buildings.get_mut(id.index())
    }

    /// The player who controls a person (their family's owner).
    pub fn owner_of(&self, id: PersonId) -> Option<PlayerId> {
        let person = self.person(id)?;
        self.family(person.family).map(|f| f.owner)
    }

    pub fn living(&self) -> impl Iterator<Item = &Person> {
        self.people.iter().filter(|p| p.alive)
    }

    pub fn living_count(&self) -> usize {
        self.living().count()
    }

    // -----------------------------------------------------------------------
    // Creation
    // -----------------------------------------------------------------------

    pub fn add_family(&mut self, surname: impl Into<String>, owner: PlayerId) -> FamilyId {
        let id = FamilyId(self.families.len() as u32);
        self.families.push(Family {
            id,
            surname: surname.into(),
            owner,
            members: Vec::new(),
        });
        id
    }

    /// Append a person to `family`. The caller has checked the family exists.
    pub fn add_person(&mut self, family: FamilyId, name: impl Into<String>, at: TilePos) -> PersonId {
        let id = PersonId(self.people.len() as u32);
        self.people.push(Person::new(id, family, name, at));
        if let Some(f) = self.families.get_mut(family.index()) {
            f.members.push(id);
        }
        id
    }

    /// Place a building and stamp its footprint on the grid. The caller has
    /// checked `can_place`.
    pub fn add_building(
        &mut self,
        kind: BuildingKind,
        owner: PlayerId,
        anchor: TilePos,
        rotation: Rotation,
        layout: &BuildingLayout,
    ) -> BuildingId {
        let id = BuildingId(self.buildings.len() as u32);
        let building = Building::new(id, kind, owner, anchor, rotation, layout);
        self.grid.set_building(&building.tiles, building.door, id);
        self.buildings.push(building);
        id
    }

    // -----------------------------------------------------------------------
    // Assignments
    // -----------------------------------------------------------------------

    /// Remove a person from whatever building employs them.
    pub fn unassign_worker(&mut self, id: PersonId) {
        let Some(old) = self.person_mut(id).and_then(|p| p.work_building.take()) else {
            return;
        };
        if let Some(b) = self.building_mut(old) {
            b.workers.retain(|w| *w != id);
        }
    }

    pub fn assign_worker(&mut self, id: PersonId, building: BuildingId) {
        self.unassign_worker(id);
        if let Some(b) = self.building_mut(building) {
            b.workers.push(id);
        }
        if let Some(p) = self.person_mut(id) {
            p.work_building = Some(building);
        }
    }

    pub fn assign_home(&mut self, id: PersonId, building: BuildingId) {
        if let Some(old) = self.person(id).and_then(|p| p.home)
            && let Some(b) = self.building_mut(old)
        {
            b.residents.retain(|r| *r != id);
        }
        if let Some(b) = self.building_mut(building) {
            b.residents.push(id);
        }
        if let Some(p) = self.person_mut(id) {
            p.home = Some(building);
        }
    }

    /// Clear every assignment of a person who has died.
    pub fn release_dead(&mut self, id: PersonId) {
        self.unassign_worker(id);
        if let Some(home) = self.person_mut(id).and_then(|p| p.home.take())
            && let Some(b) = self.building_mut(home)
        {
            b.residents.retain(|r| *r != id);
        }
    }

    // -----------------------------------------------------------------------
    // Grid bookkeeping
    // -----------------------------------------------------------------------

    /// Clear the occupancy table and repopulate it from living people, in id
    /// order.
    pub fn rebuild_occupancy(&mut self) {
        self.grid.clear_occupancy();
        for p in self.people.iter().filter(|p| p.alive) {
            self.grid.add_occupant(p.position, p.id);
        }
    }

    /// Tiles a walker can use to reach a building: the door, then its
    /// walkable orthogonal neighbours outside the footprint.
    pub fn approach_tiles(&self, building: BuildingId) -> Vec<TilePos> {
        let Some(b) = self.building(building) else {
            return Vec::new();
        };
        let mut goals = vec![b.door];
        goals.extend(
            b.door
                .neighbors4()
                .into_iter()
                .filter(|n| self.grid.is_walkable(*n)),
        );
        goals
    }

    /// Whether `pos` counts as being at the building (on or next to its door).
    pub fn is_at(&self, pos: TilePos, building: BuildingId) -> bool {
        self.building(building)
            .is_some_and(|b| b.door.manhattan_distance(pos) <= 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::default_layouts;

    fn world() -> World {
        World::new(&WorldMap::open(16, 16), ResourceLedger::new())
    }

    #[test]
    fn ids_are_sequential_indices() {
        let mut w = world();
        let f = w.add_family("Miller", PlayerId(1));
        let a = w.add_person(f, "Ann", TilePos::new(1, 1));
        let b = w.add_person(f, "Bo", TilePos::new(2, 1));
        assert_eq!((a, b), (PersonId(0), PersonId(1)));
        assert_eq!(w.family(f).unwrap().members, vec![a, b]);
        assert_eq!(w.owner_of(b), Some(PlayerId(1)));
    }

    #[test]
    fn building_stamps_grid() {
        let mut w = world();
        let layout = &default_layouts()[&BuildingKind::House];
        let id = w.add_building(BuildingKind::House, PlayerId(0), TilePos::new(4, 4), Rotation::R0, layout);
        assert_eq!(w.grid.tile(TilePos::new(5, 4)).unwrap().building, Some(id));
        assert!(w.grid.is_walkable(TilePos::new(4, 5)));
        assert!(!w.grid.is_walkable(TilePos::new(5, 5)));
        let goals = w.approach_tiles(id);
        assert_eq!(goals[0], TilePos::new(4, 5));
        assert!(goals.contains(&TilePos::new(4, 6)));
        assert!(!goals.contains(&TilePos::new(5, 5)));
    }

    #[test]
    fn reassignment_moves_worker() {
        let mut w = world();
        let layout = &default_layouts()[&BuildingKind::Farm];
        let f = w.add_family("Smith", PlayerId(0));
        let p = w.add_person(f, "Cy", TilePos::new(0, 0));
        let b1 = w.add_building(BuildingKind::Farm, PlayerId(0), TilePos::new(2, 2), Rotation::R0, layout);
        let b2 = w.add_building(BuildingKind::Farm, PlayerId(0), TilePos::new(8, 8), Rotation::R0, layout);
        w.assign_worker(p, b1);
        w.assign_worker(p, b2);
        assert!(w.building(b1).unwrap().workers.is_empty());
        assert_eq!(w.building(b2).unwrap().workers, vec![p]);
        w.release_dead(p);
        assert!(w.building(b2).unwrap().workers.is_empty());
        assert_eq!(w.person(p).unwrap().work_building, None);
    }

    #[test]
    fn occupancy_skips_the_dead() {
        let mut w = world();
        let f = w.add_family("Reed", PlayerId(0));
        let a = w.add_person(f, "A", TilePos::new(3, 3));
        w.add_person(f, "B", TilePos::new(3, 3));
        w.people[a.index()].alive = false;
        w.rebuild_occupancy();
        assert_eq!(w.grid.occupant_count(TilePos::new(3, 3)), 1);
    }
}
