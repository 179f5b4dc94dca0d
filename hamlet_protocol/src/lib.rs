// hamlet_protocol: wire protocol between the Hamlet server and its clients.
//
// Shared by `hamlet_server` (authority and blocking client) and anything
// else that talks to a server. Has no dependency on the sim crate: command
// payloads and join snapshots travel as opaque bytes.
//
// Module overview:
// - `types.rs`:    `SeatId`, the server-assigned player slot.
// - `message.rs`:  `ClientMessage` / `ServerMessage` and their payload structs.
// - `framing.rs`:  4-byte big-endian length prefix + JSON body over any
//                  `Read`/`Write`, with a 16 MB cap.
//
// Plain blocking `std::io`; no async runtime.

pub mod framing;
pub mod message;
pub mod types;

pub use framing::{MAX_FRAME_SIZE, read_frame, recv, send, write_frame};
pub use message::{AdmittedCommand, ClientMessage, PlayerInfo, ServerMessage};
pub use types::SeatId;

/// Bumped whenever a message shape changes.
pub const PROTOCOL_VERSION: u32 = 1;
