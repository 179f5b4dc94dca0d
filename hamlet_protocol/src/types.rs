// Wire-level identifiers.
//
// The protocol crate does not depend on the sim, so it carries its own
// compact newtypes. A `SeatId` is the server-assigned slot a connection
// occupies; the server maps seat `n` to the sim's `PlayerId(n)`, so a seat
// owns the family founded for it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned seat of a connected player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeatId(pub u32);

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seat {}", self.0)
    }
}
