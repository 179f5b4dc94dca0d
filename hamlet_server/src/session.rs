// Session state for the authoritative server.
//
// `Session` owns the one real `GameEngine` for a game, the `AuthorityGate`
// that admits commands into it, and the roster of connected players. The
// server's main loop (`server.rs`) drives it from a single thread, so gate
// admission and tick execution never interleave and there is no locking.
//
// Responsibilities:
// - Seats: a joining player takes the lowest free seat below the config's
//   `max_players`, after the protocol version, password and config hash
//   check out. Seat `n` plays as `PlayerId(n)`.
// - Joins: the `Welcome` carries a JSON snapshot of the engine, so a player
//   joining mid-game starts from exactly the server's state.
// - Commands: each one goes through the gate. The sender gets an `Ack`
//   (with the queue sequence when accepted); every other player gets the
//   identical command as `Admitted`, before its target tick can run.
// - Ticks: `run_tick` simulates one tick and broadcasts `TickSync`.
// - Desync detection: at every `checksum_interval` the server records its
//   own world hash; replicas report theirs and any mismatch is broadcast as
//   `DesyncDetected`.
//
// Writing to clients: `Session` holds a `BufWriter` over a cloned
// `TcpStream` per player. Write errors are logged and otherwise ignored;
// the reader thread for that client sees the broken pipe and reports the
// disconnect.

use std::collections::BTreeMap;
use std::io::BufWriter;
use std::net::TcpStream;

use hamlet_protocol::framing;
use hamlet_protocol::message::{AdmittedCommand, PlayerInfo, ServerMessage};
use hamlet_protocol::types::SeatId;
use hamlet_protocol::PROTOCOL_VERSION;
use hamlet_sim::authority::AuthorityGate;
use hamlet_sim::command::CommandError;
use hamlet_sim::event::SimEvent;
use hamlet_sim::sim::{GameEngine, TickReport};
use hamlet_sim::types::{CommandId, PlayerId};
use tracing::{debug, info, warn};

use crate::genesis;

/// Server-side checkpoint hashes kept for late checksum reports.
const CHECKPOINT_HISTORY: usize = 64;

/// Session options that are not part of the game config.
#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub name: String,
    pub password: Option<String>,
    /// People in each seat's starting family.
    pub settlers_per_seat: u32,
    /// Ticks between checksum checkpoints; zero disables them.
    pub checksum_interval: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            name: "hamlet".into(),
            password: None,
            settlers_per_seat: 3,
            checksum_interval: 50,
        }
    }
}

struct PlayerState {
    name: String,
    writer: BufWriter<TcpStream>,
}

/// Why a joining player was turned away.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    #[error("protocol version {got} is not {expected}")]
    ProtocolVersion { got: u32, expected: u32 },
    #[error("incorrect password")]
    Password,
    #[error("session is full")]
    Full,
    #[error("config hash mismatch")]
    ConfigMismatch,
    #[error("could not snapshot the world: {0}")]
    Snapshot(String),
}

pub struct Session {
    pub name: String,
    password: Option<String>,
    engine: GameEngine,
    gate: AuthorityGate,
    players: BTreeMap<SeatId, PlayerState>,
    config_hash: u64,
    checksum_interval: u64,
    /// Server world hash at each recent checkpoint tick.
    checkpoints: BTreeMap<u64, u64>,
}

impl Session {
    /// Wrap `engine` and found a starting family for every seat.
    pub fn new(settings: SessionSettings, mut engine: GameEngine) -> Result<Self, CommandError> {
        let seats = engine.config().max_players;
        genesis::found_settlements(&mut engine, seats, settings.settlers_per_seat)?;
        let config_hash = engine.config().config_hash();
        info!(session = %settings.name, seats, config_hash, "session created");
        Ok(Self {
            name: settings.name,
            password: settings.password,
            engine,
            gate: AuthorityGate::new(),
            players: BTreeMap::new(),
            config_hash,
            checksum_interval: settings.checksum_interval,
            checkpoints: BTreeMap::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Players
    // -----------------------------------------------------------------------

    /// Seat a new player and send them the `Welcome`. Existing players get
    /// `PlayerJoined` first.
    pub fn add_player(
        &mut self,
        protocol_version: u32,
        player_name: String,
        config_hash: u64,
        session_password: Option<String>,
        stream: TcpStream,
    ) -> Result<SeatId, JoinError> {
        if protocol_version != PROTOCOL_VERSION {
            return Err(JoinError::ProtocolVersion {
                got: protocol_version,
                expected: PROTOCOL_VERSION,
            });
        }
        if self.password.is_some() && session_password != self.password {
            return Err(JoinError::Password);
        }
        if config_hash != self.config_hash {
            return Err(JoinError::ConfigMismatch);
        }
        let seat = (0..self.engine.config().max_players)
            .map(SeatId)
            .find(|s| !self.players.contains_key(s))
            .ok_or(JoinError::Full)?;
        let snapshot = self
            .engine
            .to_json()
            .map_err(|e| JoinError::Snapshot(e.to_string()))?;

        let info = PlayerInfo {
            seat,
            name: player_name.clone(),
        };
        self.broadcast(&ServerMessage::PlayerJoined { player: info });

        self.players.insert(
            seat,
            PlayerState {
                name: player_name.clone(),
                writer: BufWriter::new(stream),
            },
        );
        let welcome = ServerMessage::Welcome {
            seat,
            session_name: self.name.clone(),
            players: self.player_list(),
            current_tick: self.engine.current_tick(),
            checksum_interval: self.checksum_interval,
            first_command_id: self.engine.next_command_id(player_of(seat)).0,
            snapshot: snapshot.into_bytes(),
        };
        self.send_to(seat, &welcome);
        info!(%seat, name = %player_name, tick = self.engine.current_tick(), "player joined");
        Ok(seat)
    }

    /// Drop a player and tell the others. Their family stays in the world.
    pub fn remove_player(&mut self, seat: SeatId) {
        if let Some(ps) = self.players.remove(&seat) {
            info!(%seat, name = %ps.name, "player left");
            self.broadcast(&ServerMessage::PlayerLeft {
                seat,
                name: ps.name,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Run a command from `seat` through the gate. Acks the sender and, if
    /// admitted, mirrors it to everyone else.
    pub fn handle_command(
        &mut self,
        seat: SeatId,
        claimed: SeatId,
        command_id: u64,
        target_tick: u64,
        payload: Vec<u8>,
    ) {
        let result = self.gate.admit_payload(
            player_of(seat),
            player_of(claimed),
            CommandId(command_id),
            target_tick,
            &payload,
            &mut self.engine,
        );
        match result {
            Ok(admission) => {
                self.send_to(
                    seat,
                    &ServerMessage::Ack {
                        command_id,
                        accepted: true,
                        reason: None,
                        sequence: Some(admission.sequence),
                    },
                );
                let mirrored = ServerMessage::Admitted(AdmittedCommand {
                    sender_id: seat,
                    command_id,
                    target_tick,
                    sequence: admission.sequence,
                    payload,
                });
                self.broadcast_except(seat, &mirrored);
            }
            Err(e) => {
                info!(%seat, command_id, reason = %e, "command refused");
                self.send_to(
                    seat,
                    &ServerMessage::Ack {
                        command_id,
                        accepted: false,
                        reason: Some(e.to_string()),
                        sequence: None,
                    },
                );
            }
        }
    }

    // -----------------------------------------------------------------------
    // Ticks and checksums
    // -----------------------------------------------------------------------

    /// Simulate one tick and announce it.
    pub fn run_tick(&mut self) -> TickReport {
        let mut events: Vec<SimEvent> = Vec::new();
        let report = self.engine.simulate_tick(&mut events);
        for outcome in report.outcomes.iter().filter(|o| !o.success) {
            debug!(
                tick = report.tick,
                player = %outcome.player,
                command_id = %outcome.command_id,
                reason = outcome.reason.as_deref().unwrap_or(""),
                "command failed at execution"
            );
        }
        for event in &events {
            debug!(tick = event.tick, event = ?event.kind, "sim event");
        }
        if self.checksum_interval > 0 && report.tick % self.checksum_interval == 0 {
            self.checkpoints.insert(report.tick, self.engine.world_hash());
            while self.checkpoints.len() > CHECKPOINT_HISTORY {
                self.checkpoints.pop_first();
            }
        }
        self.broadcast(&ServerMessage::TickSync {
            current_tick: report.tick,
        });
        report
    }

    /// Compare a replica's hash with the server's at the same tick.
    pub fn record_checksum(&mut self, seat: SeatId, tick: u64, hash: u64) {
        match self.checkpoints.get(&tick) {
            Some(&expected) if expected != hash => {
                warn!(%seat, tick, expected, got = hash, "desync detected");
                self.broadcast(&ServerMessage::DesyncDetected { tick, seat });
            }
            Some(_) => {}
            None => debug!(%seat, tick, "checksum for unknown checkpoint ignored"),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn current_tick(&self) -> u64 {
        self.engine.current_tick()
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    pub fn player_list(&self) -> Vec<PlayerInfo> {
        self.players
            .iter()
            .map(|(seat, ps)| PlayerInfo {
                seat: *seat,
                name: ps.name.clone(),
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Writing
    // -----------------------------------------------------------------------

    fn send_to(&mut self, seat: SeatId, msg: &ServerMessage) {
        let Some(ps) = self.players.get_mut(&seat) else {
            return;
        };
        if let Err(e) = framing::send(&mut ps.writer, msg) {
            debug!(%seat, error = %e, "write to client failed");
        }
    }

    fn broadcast(&mut self, msg: &ServerMessage) {
        let seats: Vec<SeatId> = self.players.keys().copied().collect();
        for seat in seats {
            self.send_to(seat, msg);
        }
    }

    fn broadcast_except(&mut self, skip: SeatId, msg: &ServerMessage) {
        let seats: Vec<SeatId> = self.players.keys().copied().filter(|s| *s != skip).collect();
        for seat in seats {
            self.send_to(seat, msg);
        }
    }
}

/// The sim player a seat plays as.
pub fn player_of(seat: SeatId) -> PlayerId {
    PlayerId(seat.0)
}
