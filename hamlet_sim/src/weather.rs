// Daily weather.
//
// At the start of every in-game day the engine rolls the day's weather from a
// per-season weighted table (`GameConfig::weather`). Weather has one
// mechanical effect: `Storm` and `Blizzard` forbid outdoor work, which pauses
// every building's production and construction step for the day.
//
// See also: `sim.rs` (`refresh_weather`) for where the roll happens and the
// `WeatherChanged` event is emitted.
//
// **Critical constraint: determinism.** The roll draws exactly one value from
// the engine's `GameRng` per day, whatever the table contents.

use crate::prng::GameRng;
use crate::types::Season;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weather {
    #[default]
    Clear,
    Overcast,
    Rain,
    Storm,
    Snow,
    Blizzard,
}

impl Weather {
    pub const ALL: [Weather; 6] = [
        Weather::Clear,
        Weather::Overcast,
        Weather::Rain,
        Weather::Storm,
        Weather::Snow,
        Weather::Blizzard,
    ];

    pub const fn permits_outdoor_work(self) -> bool {
        !matches!(self, Weather::Storm | Weather::Blizzard)
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Relative odds of each weather kind within one season.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherWeights {
    pub clear: u32,
    pub overcast: u32,
    pub rain: u32,
    pub storm: u32,
    pub snow: u32,
    pub blizzard: u32,
}

impl WeatherWeights {
    /// Weights in `Weather::ALL` order.
    pub const fn as_array(&self) -> [u32; 6] {
        [
            self.clear,
            self.overcast,
            self.rain,
            self.storm,
            self.snow,
            self.blizzard,
        ]
    }
}

/// Roll one day's weather. An all-zero (or missing) table yields `Clear`,
/// but a value is still drawn so the PRNG stream does not depend on the
/// table contents.
pub fn roll(rng: &mut GameRng, weights: Option<&WeatherWeights>) -> Weather {
    let draw = rng.next_u64();
    let Some(weights) = weights else {
        return Weather::Clear;
    };
    let table = weights.as_array();
    let total: u64 = table.iter().map(|&w| u64::from(w)).sum();
    if total == 0 {
        return Weather::Clear;
    }
    let mut pick = draw % total;
    for (weather, &w) in Weather::ALL.iter().zip(table.iter()) {
        let w = u64::from(w);
        if pick < w {
            return *weather;
        }
        pick -= w;
    }
    Weather::Clear
}

/// Shipped per-season odds.
pub fn default_table() -> BTreeMap<Season, WeatherWeights> {
    let mut table = BTreeMap::new();
    table.insert(
        Season::Spring,
        WeatherWeights {
            clear: 50,
            overcast: 25,
            rain: 20,
            storm: 5,
            snow: 0,
            blizzard: 0,
        },
    );
    table.insert(
        Season::Summer,
        WeatherWeights {
            clear: 65,
            overcast: 15,
            rain: 12,
            storm: 8,
            snow: 0,
            blizzard: 0,
        },
    );
    table.insert(
        Season::Autumn,
        WeatherWeights {
            clear: 35,
            overcast: 35,
            rain: 22,
            storm: 8,
            snow: 0,
            blizzard: 0,
        },
    );
    table.insert(
        Season::Winter,
        WeatherWeights {
            clear: 30,
            overcast: 30,
            rain: 0,
            storm: 0,
            snow: 30,
            blizzard: 10,
        },
    );
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storms_stop_outdoor_work() {
        assert!(!Weather::Storm.permits_outdoor_work());
        assert!(!Weather::Blizzard.permits_outdoor_work());
        assert!(Weather::Snow.permits_outdoor_work());
        assert!(Weather::Clear.permits_outdoor_work());
    }

    #[test]
    fn summer_never_snows() {
        let table = default_table();
        let mut rng = GameRng::new(11);
        for _ in 0..2_000 {
            let w = roll(&mut rng, table.get(&Season::Summer));
            assert!(!matches!(w, Weather::Snow | Weather::Blizzard));
        }
    }

    #[test]
    fn single_weight_always_wins() {
        let only_rain = WeatherWeights {
            rain: 1,
            ..Default::default()
        };
        let mut rng = GameRng::new(4);
        for _ in 0..100 {
            assert_eq!(roll(&mut rng, Some(&only_rain)), Weather::Rain);
        }
    }

    #[test]
    fn empty_table_still_advances_rng() {
        let mut a = GameRng::new(9);
        let mut b = GameRng::new(9);
        assert_eq!(roll(&mut a, None), Weather::Clear);
        assert_eq!(roll(&mut b, Some(&WeatherWeights::default())), Weather::Clear);
        assert_eq!(a, b);
        assert_ne!(a, GameRng::new(9));
    }
}
