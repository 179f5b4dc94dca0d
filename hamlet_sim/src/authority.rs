// Server-side admission of networked commands.
//
// The `AuthorityGate` stands between the network and the authoritative
// engine's command queue. A command is admitted only if, checked in this
// order:
//   1. the claimed origin matches the authenticated sender,
//   2. its target tick is strictly after the engine's current tick,
//   3. its target tick is within `max_command_lead_ticks`,
//   4. its `(player, command_id)` has not been seen before,
//   5. its action validates against the world as it stands now.
// Raw payloads are decoded first (`admit_payload`); a payload that does not
// decode is refused as `Malformed`.
//
// On admission the gate enqueues the command and returns the sequence number
// it was given. The caller (the server session) acks the sender and mirrors
// the identical command, sequence included, to every other participant so
// their replicas queue it in the same slot. Admission and tick execution run
// on one thread, so a command is always admitted against a settled world.
//
// Passing admission is not a promise of success: the command is validated
// again when its tick runs and may still fail then, identically everywhere.
//
// See also: `command_queue.rs`, `sim.rs` (`GameEngine::enqueue_admitted`
// on replicas), the `hamlet_server` session for the network side.

use crate::command::{self, CommandError, SimCommand};
use crate::sim::GameEngine;
use crate::types::{CommandId, PlayerId};
use tracing::debug;

/// A command the gate accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Admission {
    pub sequence: u64,
    pub command: SimCommand,
}

#[derive(Clone, Debug, Default)]
pub struct AuthorityGate {
    admitted: u64,
    rejected: u64,
}

impl AuthorityGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a wire payload and admit it.
    pub fn admit_payload(
        &mut self,
        sender: PlayerId,
        claimed: PlayerId,
        command_id: CommandId,
        target_tick: u64,
        payload: &[u8],
        engine: &mut GameEngine,
    ) -> Result<Admission, CommandError> {
        let action = match command::decode_action(payload) {
            Ok(action) => action,
            Err(e) => return Err(self.reject(sender, command_id, e)),
        };
        let cmd = SimCommand::new(claimed, command_id, target_tick, action);
        self.admit(sender, cmd, engine)
    }

    /// Admit an already-decoded command from `sender`.
    pub fn admit(
        &mut self,
        sender: PlayerId,
        cmd: SimCommand,
        engine: &mut GameEngine,
    ) -> Result<Admission, CommandError> {
        let command_id = cmd.command_id;
        match Self::check(sender, &cmd, engine) {
            Ok(()) => {}
            Err(e) => return Err(self.reject(sender, command_id, e)),
        }
        match engine.enqueue(cmd.clone()) {
            Ok(sequence) => {
                self.admitted += 1;
                debug!(%sender, %command_id, sequence, target_tick = cmd.target_tick, "command admitted");
                Ok(Admission {
                    sequence,
                    command: cmd,
                })
            }
            Err(e) => Err(self.reject(sender, command_id, e)),
        }
    }

    fn check(sender: PlayerId, cmd: &SimCommand, engine: &GameEngine) -> Result<(), CommandError> {
        if cmd.player != sender {
            return Err(CommandError::OriginMismatch {
                claimed: cmd.player,
                sender,
            });
        }
        engine.check_timing(cmd)?;
        if engine.has_seen(cmd.player, cmd.command_id) {
            return Err(CommandError::Duplicate {
                player: cmd.player,
                command_id: cmd.command_id,
            });
        }
        engine.validate(cmd)
    }

    fn reject(&mut self, sender: PlayerId, command_id: CommandId, e: CommandError) -> CommandError {
        self.rejected += 1;
        debug!(%sender, %command_id, reason = %e, "command rejected");
        e
    }

    /// `(admitted, rejected)` totals since the gate was created.
    pub fn stats(&self) -> (u64, u64) {
        (self.admitted, self.rejected)
    }
}
