// Test-only game client for multiplayer integration tests.
//
// Wraps the real `NetClient` and `Replica` from `hamlet_server` in a
// synchronous, test-friendly API for exercising the whole pipeline:
// server -> join snapshot -> command -> ack/mirror -> tick sync -> replica
// step -> compare state.
//
// The only test-specific code is the blocking loops around
// `NetClient::recv_timeout`. Networking, admission and simulation all run
// through the same code as a real client.
//
// See also: `tests/full_pipeline.rs` for the scenarios.

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use hamlet_protocol::message::{ClientMessage, ServerMessage};
use hamlet_protocol::types::SeatId;
use hamlet_server::{NetClient, Replica};
use hamlet_sim::command::SimAction;
use hamlet_sim::config::GameConfig;
use hamlet_sim::types::CommandId;

/// Default timeout for blocking operations.
const POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest single wait for the next server message.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A connected player with a live replica.
pub struct TestGameClient {
    client: NetClient,
    pub replica: Replica,
    /// Ids of hand-built commands; their acks bypass the replica.
    raw_ids: BTreeSet<u64>,
    /// `command_id -> (accepted, reason)` for hand-built commands.
    raw_acks: BTreeMap<u64, (bool, Option<String>)>,
}

impl TestGameClient {
    /// Connect with the hash of `config` and restore the join snapshot.
    pub fn connect(addr: SocketAddr, name: &str, config: &GameConfig) -> Self {
        let (client, welcome) = NetClient::connect(addr, name, config.config_hash(), None)
            .expect("TestGameClient::connect failed");
        let replica = Replica::from_welcome(&welcome).expect("join snapshot did not restore");
        Self {
            client,
            replica,
            raw_ids: BTreeSet::new(),
            raw_acks: BTreeMap::new(),
        }
    }

    /// Send `action` targeting `lead` ticks past the latest server tick.
    /// Returns the command id used.
    pub fn send_action(&mut self, action: SimAction, lead: u64) -> CommandId {
        let msg = self.replica.prepare(action, lead).expect("prepare failed");
        let ClientMessage::Command { command_id, .. } = &msg else {
            unreachable!("prepare always builds a Command");
        };
        let id = CommandId(*command_id);
        self.client.send(&msg).expect("send failed");
        id
    }

    /// Send a hand-built command that the replica knows nothing about. Its
    /// ack is kept aside (see `wait_for_raw_ack`); only use this for
    /// commands the server is expected to refuse.
    pub fn send_raw_command(
        &mut self,
        sender_id: SeatId,
        command_id: u64,
        target_tick: u64,
        payload: Vec<u8>,
    ) {
        self.raw_ids.insert(command_id);
        let msg = ClientMessage::Command {
            sender_id,
            command_id,
            target_tick,
            payload,
        };
        self.client.send(&msg).expect("send failed");
    }

    /// Handle whatever has arrived, waiting at most one poll interval.
    fn pump(&mut self) {
        let first = self
            .client
            .recv_timeout(POLL_INTERVAL)
            .expect("server connection lost");
        for msg in first.into_iter().chain(self.client.poll()) {
            match msg {
                ServerMessage::Ack {
                    command_id,
                    accepted,
                    reason,
                    ..
                } if self.raw_ids.remove(&command_id) => {
                    self.raw_acks.insert(command_id, (accepted, reason));
                }
                msg => self.replica.handle(msg).expect("replica rejected a server message"),
            }
        }
    }

    /// Block until the server answers the hand-built command `command_id`.
    pub fn wait_for_raw_ack(&mut self, command_id: u64) -> (bool, Option<String>) {
        let start = Instant::now();
        loop {
            if let Some(ack) = self.raw_acks.remove(&command_id) {
                return ack;
            }
            assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for Ack");
            self.pump();
        }
    }

    fn send_checksums(&mut self, out: Vec<ClientMessage>) {
        for msg in out {
            self.client.send(&msg).expect("send failed");
        }
    }

    /// Block until the server has answered every command we sent.
    pub fn wait_for_acks(&mut self) {
        let start = Instant::now();
        while self.replica.awaiting_ack() > 0 {
            assert!(start.elapsed() < POLL_TIMEOUT, "timed out waiting for Ack");
            self.pump();
        }
    }

    /// Block until the server has passed `tick`, then step the replica to
    /// exactly `tick`, reporting checksums on the way.
    pub fn sync_to(&mut self, tick: u64) {
        let start = Instant::now();
        while self.replica.server_tick() < tick {
            assert!(
                start.elapsed() < POLL_TIMEOUT,
                "timed out waiting for server tick {tick}"
            );
            self.pump();
        }
        let out = self.replica.step_to(tick);
        self.send_checksums(out);
    }

    /// Handle pending messages and step to the latest server tick.
    pub fn catch_up(&mut self) {
        self.pump();
        let out = self.replica.catch_up();
        self.send_checksums(out);
    }

    /// Whether `id` was refused by the server.
    pub fn was_refused(&self, id: CommandId) -> Option<&str> {
        self.replica
            .refusals()
            .iter()
            .find(|(refused, _)| *refused == id)
            .map(|(_, reason)| reason.as_str())
    }

    /// Send Goodbye and close the connection.
    pub fn disconnect(self) {
        self.client.disconnect();
    }
}
