// hamlet_server: authoritative multiplayer server for Hamlet, plus the
// blocking client and replica driver that talk to it.
//
// The server runs the one real `GameEngine`. Clients never simulate on their
// own authority: they send commands, the server admits or refuses each one
// through `hamlet_sim::authority::AuthorityGate`, and every client replays
// the admitted commands on its own replica in the server's order, stepping
// only to ticks the server has announced.
//
// Module overview:
// - `session.rs`:  Session state: seats, join checks, command admission with
//                  ack and mirror, tick broadcast, checksum comparison.
// - `server.rs`:   TCP listener, one reader thread per client, and the main
//                  event loop that owns the `Session` and paces ticks.
// - `genesis.rs`:  Starting families for every seat, placed before anyone joins.
// - `client.rs`:   `NetClient`, handshake plus a background reader thread.
// - `replica.rs`:  `Replica`, a client-side engine kept in lockstep with the
//                  server from the join snapshot onward.
//
// The server runs embedded (`start_server`, as the tests do) or as the
// standalone `hamlet-server` binary (`main.rs`).

pub mod client;
pub mod genesis;
pub mod replica;
pub mod server;
pub mod session;

pub use client::{ClientError, NetClient, Welcome};
pub use replica::Replica;
pub use server::{ServerConfig, ServerError, ServerHandle, start_server};
pub use session::{Session, SessionSettings};
