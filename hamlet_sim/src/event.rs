// Player-visible notable events.
//
// The engine reports things worth telling the player (season turns, weather,
// low supply, big hauls, completions, births, deaths) as `SimEvent`s pushed
// into an `EventSink` the caller passes to `simulate_tick`. There is no
// global log: the host decides where events go. `EventLog` is the stock
// append-only sink; a plain `Vec<SimEvent>` works too.
//
// Command results are not events; they come back in `TickReport::outcomes`.
//
// See also: `sim.rs` for emission points, `routine.rs` for upkeep warnings.
//
// **Critical constraint: determinism.** Events are emitted in the fixed
// per-tick step order, so two replicas produce identical event streams.

use crate::types::*;
use crate::weather::Weather;
use serde::{Deserialize, Serialize};

/// A notable event, stamped with the tick that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimEvent {
    pub tick: u64,
    pub kind: SimEventKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEventKind {
    SeasonChanged { season: Season, year: u32 },
    WeatherChanged { from: Weather, to: Weather },
    /// Stock of a supply crossed below the warning threshold.
    LowSupply { supply: Supply, remaining: u64, threshold: u64 },
    /// A building flushed at least `large_haul_threshold` of one resource.
    LargeHaul { building: BuildingId, kind: ResourceKind, amount: u32 },
    BuildingPlaced { building: BuildingId, kind: BuildingKind },
    BuildingCompleted { building: BuildingId, kind: BuildingKind },
    PersonBorn { person: PersonId, family: FamilyId },
    PersonDied { person: PersonId },
    FellSick { person: PersonId },
    Recovered { person: PersonId },
}

/// What a low-supply warning is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Supply {
    Food,
    Firewood,
}

/// Destination for notable events.
pub trait EventSink {
    fn emit(&mut self, event: SimEvent);
}

impl EventSink for Vec<SimEvent> {
    fn emit(&mut self, event: SimEvent) {
        self.push(event);
    }
}

/// Append-only event record.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<SimEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events matching a predicate, in emission order.
    pub fn filter<'a>(
        &'a self,
        pred: impl Fn(&SimEventKind) -> bool + 'a,
    ) -> impl Iterator<Item = &'a SimEvent> + 'a {
        self.events.iter().filter(move |e| pred(&e.kind))
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: SimEvent) {
        self.events.push(event);
    }
}

/// A sink that drops everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct DiscardEvents;

impl EventSink for DiscardEvents {
    fn emit(&mut self, _event: SimEvent) {}
}
