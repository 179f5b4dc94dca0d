// Resource stores.
//
// `ResourceStore` is the small interface the sim uses for anything that holds
// resources: the village ledger and each building's local output buffer.
// `ResourceLedger` is the one implementation, a `BTreeMap` of non-zero
// counts. Removal is all-or-nothing and reports a `Shortfall` when the stock
// is too low; daily upkeep instead uses `take_up_to`, which consumes what is
// there.
//
// See also: `building.rs` (buffers), `routine.rs` (upkeep and flushes),
// `command.rs` (`PlaceBuilding` cost deduction).

use crate::types::ResourceKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Not enough of one resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shortfall {
    pub kind: ResourceKind,
    pub needed: u32,
    pub available: u32,
}

pub trait ResourceStore {
    fn get(&self, kind: ResourceKind) -> u32;
    fn add(&mut self, kind: ResourceKind, amount: u32);
    /// Remove exactly `amount`, or nothing.
    fn remove(&mut self, kind: ResourceKind, amount: u32) -> Result<(), Shortfall>;

    fn has(&self, kind: ResourceKind, amount: u32) -> bool {
        self.get(kind) >= amount
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLedger {
    stock: BTreeMap<ResourceKind, u32>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove as much as is available, up to `amount`. Returns the amount
    /// actually taken.
    pub fn take_up_to(&mut self, kind: ResourceKind, amount: u32) -> u32 {
        let have = self.get(kind);
        let taken = have.min(amount);
        self.set(kind, have - taken);
        taken
    }

    /// Check a whole bill without touching the stock.
    pub fn covers(&self, bill: &BTreeMap<ResourceKind, u32>) -> Result<(), Shortfall> {
        for (&kind, &needed) in bill {
            let available = self.get(kind);
            if available < needed {
                return Err(Shortfall {
                    kind,
                    needed,
                    available,
                });
            }
        }
        Ok(())
    }

    /// Pay a whole bill, or nothing.
    pub fn pay(&mut self, bill: &BTreeMap<ResourceKind, u32>) -> Result<(), Shortfall> {
        self.covers(bill)?;
        for (&kind, &amount) in bill {
            let have = self.get(kind);
            self.set(kind, have - amount);
        }
        Ok(())
    }

    /// Sum over several kinds.
    pub fn total(&self, kinds: &[ResourceKind]) -> u64 {
        kinds.iter().map(|&k| u64::from(self.get(k))).sum()
    }

    /// Empty the store, returning what it held in kind order.
    pub fn drain(&mut self) -> Vec<(ResourceKind, u32)> {
        std::mem::take(&mut self.stock).into_iter().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceKind, u32)> + '_ {
        self.stock.iter().map(|(&k, &v)| (k, v))
    }

    pub fn is_empty(&self) -> bool {
        self.stock.is_empty()
    }

    fn set(&mut self, kind: ResourceKind, amount: u32) {
        if amount == 0 {
            self.stock.remove(&kind);
        } else {
            self.stock.insert(kind, amount);
        }
    }
}

impl ResourceStore for ResourceLedger {
    fn get(&self, kind: ResourceKind) -> u32 {
        self.stock.get(&kind).copied().unwrap_or(0)
    }

    fn add(&mut self, kind: ResourceKind, amount: u32) {
        let have = self.get(kind);
        self.set(kind, have.saturating_add(amount));
    }

    fn remove(&mut self, kind: ResourceKind, amount: u32) -> Result<(), Shortfall> {
        let available = self.get(kind);
        if available < amount {
            return Err(Shortfall {
                kind,
                needed: amount,
                available,
            });
        }
        self.set(kind, available - amount);
        Ok(())
    }
}

impl FromIterator<(ResourceKind, u32)> for ResourceLedger {
    fn from_iter<I: IntoIterator<Item = (ResourceKind, u32)>>(iter: I) -> Self {
        let mut ledger = Self::new();
        for (kind, amount) in iter {
            ledger.add(kind, amount);
        }
        ledger
    }
}
