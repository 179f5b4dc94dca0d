// Pending player commands, ordered for execution.
//
// Commands wait here from admission until the engine runs their target tick.
// The queue is a `BinaryHeap` with reversed ordering (a min-heap), keyed on
// `(target_tick, sequence, player, command_id)`. `sequence` is the admission
// counter: the authority (or the local engine, in single player) hands them
// out in the order it accepts commands, and replicas reuse the authority's
// numbers via `enqueue_with_sequence`. Network arrival order never matters.
//
// The queue also remembers which `(player, command_id)` pairs it has
// accepted, executed or not, so a resubmitted command is refused rather than
// run twice. Per player this is a floor (every id below it is spent) plus the
// accepted ids above the floor. Clients count ids upwards, so the floor
// follows them and the set stays small. When ids above the floor pile up past
// `SEEN_WINDOW` (gaps left by refused commands), the floor jumps to the
// lowest of them and the skipped ids count as spent.
//
// See also: `command.rs`, `authority.rs`, `sim.rs` (`simulate_tick` drains
// due commands).
//
// **Critical constraint: determinism.** The four-part key is a total order,
// so every replica pops the same command sequence.

use crate::command::{CommandError, SimCommand};
use crate::types::{CommandId, PlayerId};
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap};

/// Accepted ids kept above a player's floor before the floor is forced up.
pub const SEEN_WINDOW: usize = 256;

/// A command with its admission sequence number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedCommand {
    pub sequence: u64,
    pub command: SimCommand,
}

impl QueuedCommand {
    fn key(&self) -> (u64, u64, PlayerId, CommandId) {
        (
            self.command.target_tick,
            self.sequence,
            self.command.player,
            self.command.command_id,
        )
    }
}

// Min-heap: the smallest key must compare as "greatest".
impl PartialOrd for QueuedCommand {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedCommand {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

/// Command ids one player has spent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct SeenIds {
    player: PlayerId,
    /// Every id below this is spent.
    floor: u64,
    /// Accepted ids above `floor`.
    above: BTreeSet<u64>,
}

impl SeenIds {
    fn new(player: PlayerId) -> Self {
        Self {
            player,
            floor: 0,
            above: BTreeSet::new(),
        }
    }

    fn contains(&self, id: u64) -> bool {
        id < self.floor || self.above.contains(&id)
    }

    fn insert(&mut self, id: u64) {
        self.above.insert(id);
        if self.above.len() > SEEN_WINDOW
            && let Some(lowest) = self.above.first().copied()
        {
            self.floor = lowest;
        }
        while self.floor < u64::MAX && self.above.remove(&self.floor) {
            self.floor += 1;
        }
    }

    fn highest(&self) -> Option<u64> {
        self.above.last().copied().or(self.floor.checked_sub(1))
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CommandQueue {
    /// Serialized in execution order so equal queues serialize identically.
    #[serde(serialize_with = "serialize_in_order")]
    heap: BinaryHeap<QueuedCommand>,
    /// Next sequence number to hand out.
    next_sequence: u64,
    /// Spent ids, one entry per player, sorted by player.
    seen: Vec<SeenIds>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, player: PlayerId, command_id: CommandId) -> bool {
        self.seen_for(player).is_some_and(|s| s.contains(command_id.0))
    }

    fn seen_for(&self, player: PlayerId) -> Option<&SeenIds> {
        let i = self.seen.binary_search_by_key(&player, |s| s.player).ok()?;
        self.seen.get(i)
    }

    /// Accept a command, assigning the next sequence number.
    pub fn enqueue(&mut self, command: SimCommand) -> Result<u64, CommandError> {
        let sequence = self.next_sequence;
        self.enqueue_with_sequence(command, sequence)?;
        Ok(sequence)
    }

    /// Accept a command whose sequence was assigned elsewhere (by the
    /// session authority).
    pub fn enqueue_with_sequence(&mut self, command: SimCommand, sequence: u64) -> Result<(), CommandError> {
        let (player, command_id) = (command.player, command.command_id);
        if self.contains(player, command_id) {
            return Err(CommandError::Duplicate { player, command_id });
        }
        let i = match self.seen.binary_search_by_key(&player, |s| s.player) {
            Ok(i) => i,
            Err(i) => {
                self.seen.insert(i, SeenIds::new(player));
                i
            }
        };
        self.seen[i].insert(command_id.0);
        self.next_sequence = self.next_sequence.max(sequence.saturating_add(1));
        self.heap.push(QueuedCommand { sequence, command });
        Ok(())
    }

    /// Pop the next command if its target tick is at or before `tick`.
    pub fn pop_due(&mut self, tick: u64) -> Option<QueuedCommand> {
        if self.heap.peek().is_some_and(|c| c.command.target_tick <= tick) {
            self.heap.pop()
        } else {
            None
        }
    }

    /// Earliest pending target tick.
    pub fn peek_tick(&self) -> Option<u64> {
        self.heap.peek().map(|c| c.command.target_tick)
    }

    /// Pending commands in execution order.
    pub fn pending(&self) -> Vec<QueuedCommand> {
        let mut pending: Vec<_> = self.heap.iter().cloned().collect();
        pending.sort_by_key(QueuedCommand::key);
        pending
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Highest id `player` has spent, if any.
    pub fn highest_seen(&self, player: PlayerId) -> Option<CommandId> {
        self.seen_for(player).and_then(SeenIds::highest).map(CommandId)
    }

    /// Number of pending commands.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

fn serialize_in_order<S: Serializer>(
    heap: &BinaryHeap<QueuedCommand>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut ordered: Vec<&QueuedCommand> = heap.iter().collect();
    ordered.sort_by_key(|c| c.key());
    serializer.collect_seq(ordered)
}
