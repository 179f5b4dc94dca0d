// Client-to-server and server-to-client messages.
//
// The server is authoritative: it owns the real engine, admits or refuses
// each command, and tells every client how far the simulation has run.
// Clients are replicas that queue exactly what the server admitted and step
// their own engine up to the announced tick.
//
// Command payloads are opaque bytes (an encoded `SimAction` from the sim
// crate); nothing in this crate inspects them. The join snapshot is opaque
// in the same way: the JSON of the server engine's `EngineSnapshot`.
//
// Lifecycle of one connection:
//   Hello -> Welcome (or Rejected and close)
//   Command -> Ack to the sender, Admitted to everyone else
//   ... TickSync as the server runs, Checksum from replicas at intervals ...
//   Goodbye (or EOF) -> PlayerLeft to everyone else

use serde::{Deserialize, Serialize};

use crate::types::SeatId;

/// Public info about a connected player.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub seat: SeatId,
    pub name: String,
}

/// A command the server admitted, as mirrored to other participants. The
/// sequence is the queue slot it was given on the server; replicas must use
/// the same one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmittedCommand {
    pub sender_id: SeatId,
    pub command_id: u64,
    pub target_tick: u64,
    pub sequence: u64,
    pub payload: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    Hello {
        protocol_version: u32,
        player_name: String,
        /// Hash of the client's `GameConfig`; must equal the server's.
        config_hash: u64,
        session_password: Option<String>,
    },
    Command {
        /// The seat the command claims to come from. Checked against the
        /// seat the connection was given.
        sender_id: SeatId,
        command_id: u64,
        target_tick: u64,
        payload: Vec<u8>,
    },
    /// The replica's state hash after completing `tick`.
    Checksum { tick: u64, hash: u64 },
    Goodbye,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    Welcome {
        seat: SeatId,
        session_name: String,
        players: Vec<PlayerInfo>,
        current_tick: u64,
        /// Replicas report a `Checksum` whenever their tick is a multiple
        /// of this. Zero disables checksums.
        checksum_interval: u64,
        /// First command id this seat may use; ids below it were already
        /// spent by an earlier occupant.
        first_command_id: u64,
        snapshot: Vec<u8>,
    },
    Rejected { reason: String },
    Ack {
        command_id: u64,
        accepted: bool,
        reason: Option<String>,
        /// Queue slot, present when accepted.
        sequence: Option<u64>,
    },
    Admitted(AdmittedCommand),
    /// The server has completed every tick up to and including
    /// `current_tick`.
    TickSync { current_tick: u64 },
    PlayerJoined { player: PlayerInfo },
    PlayerLeft { seat: SeatId, name: String },
    DesyncDetected { tick: u64, seat: SeatId },
}
