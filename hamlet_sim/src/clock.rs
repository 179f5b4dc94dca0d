// In-game calendar: tick → hour → day → season → year.
//
// `GameTime` is a small pure state machine owned by `GameEngine`. The engine
// calls `advance_tick()` once per simulated tick; every `ticks_per_hour`
// calls it reports an hour boundary, which is what drives the hourly and
// daily routines in `routine.rs`.
//
// The day-phase queries (`is_work_hours`, `is_sleep_time`, `is_night`,
// `darkness_factor`) are functions of `hour` alone. The routine schedule
// (`RoutineHours`) is carried by the clock itself so the queries and the
// routine dispatcher can never disagree.
//
// See also: `sim.rs` for where the clock sits in the per-tick sequence,
// `snapshot.rs` for `from_parts`, the restore constructor.
//
// **Critical constraint: determinism.** Integer fields only; the single
// float query (`darkness_factor`) is derived and never fed back into state.

use crate::types::Season;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const HOURS_PER_DAY: u32 = 24;
pub const DAYS_PER_SEASON: u32 = 90;
pub const SEASONS_PER_YEAR: u32 = 4;

/// The four hours at which the daily routine fires. Loaded from
/// `GameConfig::routine`; `GameConfig::validate` checks the ordering
/// `wake < work_start < work_end < sleep < 24`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutineHours {
    /// Sleepers get up.
    pub wake: u32,
    /// Workers are dispatched to their buildings.
    pub work_start: u32,
    /// Everyone is recalled home.
    pub work_end: u32,
    /// People at home go to bed.
    pub sleep: u32,
}

impl Default for RoutineHours {
    fn default() -> Self {
        Self {
            wake: 6,
            work_start: 8,
            work_end: 17,
            sleep: 22,
        }
    }
}

impl RoutineHours {
    pub fn is_ordered(&self) -> bool {
        self.wake < self.work_start
            && self.work_start < self.work_end
            && self.work_end < self.sleep
            && self.sleep < HOURS_PER_DAY
    }
}

// Darkness curve: flat 0 from DAY_START to DUSK_START, ramps to 1 by
// NIGHT_START, flat 1 until DAWN_START, ramps back to 0 by DAY_START.
const DAWN_START: u32 = 5;
const DAY_START: u32 = 8;
const DUSK_START: u32 = 18;
const NIGHT_START: u32 = 21;

/// Errors from building a clock out of externally supplied fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    #[error("ticks_per_hour must be at least 1")]
    ZeroTicksPerHour,
    #[error("{field} = {value} is out of range (must be below {limit})")]
    OutOfRange {
        field: &'static str,
        value: u32,
        limit: u32,
    },
    #[error("year must start at 1")]
    ZeroYear,
    #[error("routine hours must satisfy wake < work_start < work_end < sleep < 24")]
    RoutineOrder,
}

/// The simulation calendar.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameTime {
    year: u32,
    season: Season,
    /// Zero-based day within the season.
    day: u32,
    hour: u32,
    /// Sub-hour tick accumulator, `0..ticks_per_hour`.
    tick: u32,
    ticks_per_hour: u32,
    routine: RoutineHours,
}

impl GameTime {
    /// Year 1, first day of spring, midnight.
    ///
    /// A `ticks_per_hour` of zero is treated as one; `GameConfig::validate`
    /// rejects it before an engine is ever built.
    pub fn new(ticks_per_hour: u32, routine: RoutineHours) -> Self {
        Self {
            year: 1,
            season: Season::Spring,
            day: 0,
            hour: 0,
            tick: 0,
            ticks_per_hour: ticks_per_hour.max(1),
            routine,
        }
    }

    /// Rebuild a clock from stored fields, checking every bound.
    pub fn from_parts(
        year: u32,
        season: Season,
        day: u32,
        hour: u32,
        tick: u32,
        ticks_per_hour: u32,
        routine: RoutineHours,
    ) -> Result<Self, ClockError> {
        if ticks_per_hour == 0 {
            return Err(ClockError::ZeroTicksPerHour);
        }
        if year == 0 {
            return Err(ClockError::ZeroYear);
        }
        check("day", day, DAYS_PER_SEASON)?;
        check("hour", hour, HOURS_PER_DAY)?;
        check("tick", tick, ticks_per_hour)?;
        if !routine.is_ordered() {
            return Err(ClockError::RoutineOrder);
        }
        Ok(Self {
            year,
            season,
            day,
            hour,
            tick,
            ticks_per_hour,
            routine,
        })
    }

    /// Advance one tick. Returns `true` when this tick completed an hour.
    pub fn advance_tick(&mut self) -> bool {
        self.tick += 1;
        if self.tick < self.ticks_per_hour {
            return false;
        }
        self.tick = 0;
        self.advance_hour();
        true
    }

    fn advance_hour(&mut self) {
        self.hour += 1;
        if self.hour < HOURS_PER_DAY {
            return;
        }
        self.hour = 0;
        self.day += 1;
        if self.day < DAYS_PER_SEASON {
            return;
        }
        self.day = 0;
        let (next, wrapped) = self.season.next();
        self.season = next;
        if wrapped {
            self.year += 1;
        }
    }

    pub fn year(&self) -> u32 {
        self.year
    }

    pub fn season(&self) -> Season {
        self.season
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    pub fn ticks_per_hour(&self) -> u32 {
        self.ticks_per_hour
    }

    pub fn routine(&self) -> RoutineHours {
        self.routine
    }

    /// Whole in-game hours elapsed since year 1, spring, day 0, midnight.
    pub fn total_hours(&self) -> u64 {
        let days = u64::from(self.year - 1) * u64::from(DAYS_PER_SEASON * SEASONS_PER_YEAR)
            + self.season as u64 * u64::from(DAYS_PER_SEASON)
            + u64::from(self.day);
        days * u64::from(HOURS_PER_DAY) + u64::from(self.hour)
    }

    /// Midnight on the dot: the instant a new day begins.
    pub fn is_day_start(&self) -> bool {
        self.hour == 0 && self.tick == 0
    }

    pub fn is_work_hours(&self) -> bool {
        (self.routine.work_start..self.routine.work_end).contains(&self.hour)
    }

    pub fn is_sleep_time(&self) -> bool {
        self.hour >= self.routine.sleep || self.hour < self.routine.wake
    }

    pub fn is_night(&self) -> bool {
        self.darkness_factor() >= 0.5
    }

    /// 0.0 in full daylight, 1.0 in deep night, linear across dawn and dusk.
    pub fn darkness_factor(&self) -> f32 {
        let h = self.hour;
        if (DAY_START..=DUSK_START).contains(&h) {
            0.0
        } else if h > DUSK_START && h < NIGHT_START {
            (h - DUSK_START) as f32 / (NIGHT_START - DUSK_START) as f32
        } else if h > DAWN_START && h < DAY_START {
            1.0 - (h - DAWN_START) as f32 / (DAY_START - DAWN_START) as f32
        } else {
            1.0
        }
    }

    /// Total ticks in one in-game year for this clock's tick rate.
    pub fn ticks_per_year(&self) -> u64 {
        u64::from(self.ticks_per_hour)
            * u64::from(HOURS_PER_DAY)
            * u64::from(DAYS_PER_SEASON)
            * u64::from(SEASONS_PER_YEAR)
    }
}

fn check(field: &'static str, value: u32, limit: u32) -> Result<(), ClockError> {
    if value < limit {
        Ok(())
    } else {
        Err(ClockError::OutOfRange {
            field,
            value,
            limit,
        })
    }
}

impl fmt::Display for GameTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Year {}, {} day {}, {:02}:00",
            self.year,
            self.season,
            self.day + 1,
            self.hour
        )
    }
}
