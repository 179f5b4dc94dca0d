// Client-side replica of the server's engine.
//
// A `Replica` starts from the snapshot in the `Welcome` and from then on
// changes only in two ways: it queues exactly the commands the server
// admitted, each in the queue slot (sequence) the server gave it, and it
// steps its engine forward to ticks the server has announced with
// `TickSync`. Because the engine is deterministic, that keeps it identical
// to the server's.
//
// Own commands: `prepare` builds a `Command` message and remembers the
// command until the server answers. An accepted `Ack` queues our copy with
// the returned sequence; other players' commands arrive as `Admitted`.
//
// Stepping is separate from message handling (`step_to` / `catch_up`) so a
// caller can stop at an exact tick. At every `checksum_interval` multiple
// the replica emits a `Checksum` of its world hash for the server to check.
//
// See also: `session.rs` for the server side of each message,
// `hamlet_sim::authority` for what admission checks.

use std::collections::BTreeMap;

use hamlet_protocol::message::{ClientMessage, ServerMessage};
use hamlet_protocol::types::SeatId;
use hamlet_sim::command::{self, SimAction, SimCommand};
use hamlet_sim::event::EventLog;
use hamlet_sim::sim::{CommandOutcome, GameEngine};
use hamlet_sim::snapshot::{EngineSnapshot, RestoreError};
use hamlet_sim::types::{CommandId, PlayerId};
use tracing::{debug, warn};

use crate::client::{ClientError, Welcome};
use crate::session::player_of;

pub struct Replica {
    engine: GameEngine,
    seat: SeatId,
    checksum_interval: u64,
    /// Latest tick the server announced as complete.
    server_tick: u64,
    next_command_id: u64,
    awaiting_ack: BTreeMap<CommandId, SimCommand>,
    roster: BTreeMap<SeatId, String>,
    events: EventLog,
    /// Execution results of this seat's commands.
    outcomes: Vec<CommandOutcome>,
    /// Commands the server refused, with its reason.
    refusals: Vec<(CommandId, String)>,
    desyncs: Vec<(u64, SeatId)>,
}

impl Replica {
    /// Rebuild the server's engine from a join snapshot.
    pub fn from_welcome(welcome: &Welcome) -> Result<Self, ClientError> {
        let snapshot: EngineSnapshot =
            serde_json::from_slice(&welcome.snapshot).map_err(RestoreError::from)?;
        let engine = GameEngine::restore(snapshot)?;
        debug!(seat = %welcome.seat, tick = engine.current_tick(), "replica restored");
        Ok(Self {
            engine,
            seat: welcome.seat,
            checksum_interval: welcome.checksum_interval,
            server_tick: welcome.current_tick,
            next_command_id: welcome.first_command_id,
            awaiting_ack: BTreeMap::new(),
            roster: welcome
                .players
                .iter()
                .map(|p| (p.seat, p.name.clone()))
                .collect(),
            events: EventLog::new(),
            outcomes: Vec::new(),
            refusals: Vec::new(),
            desyncs: Vec::new(),
        })
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    pub fn seat(&self) -> SeatId {
        self.seat
    }

    /// The sim player this replica's seat plays as.
    pub fn player(&self) -> PlayerId {
        player_of(self.seat)
    }

    pub fn server_tick(&self) -> u64 {
        self.server_tick
    }

    pub fn roster(&self) -> &BTreeMap<SeatId, String> {
        &self.roster
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn outcomes(&self) -> &[CommandOutcome] {
        &self.outcomes
    }

    pub fn refusals(&self) -> &[(CommandId, String)] {
        &self.refusals
    }

    pub fn desyncs(&self) -> &[(u64, SeatId)] {
        &self.desyncs
    }

    /// Own commands sent but not yet answered.
    pub fn awaiting_ack(&self) -> usize {
        self.awaiting_ack.len()
    }

    /// Build a command targeting `lead` ticks after the latest known server
    /// tick. The caller sends the returned message.
    pub fn prepare(&mut self, action: SimAction, lead: u64) -> Result<ClientMessage, ClientError> {
        let payload = command::encode_action(&action)?;
        let command_id = CommandId(self.next_command_id);
        self.next_command_id += 1;
        let target_tick = self.server_tick.max(self.engine.current_tick()) + lead.max(1);
        self.awaiting_ack.insert(
            command_id,
            SimCommand::new(self.player(), command_id, target_tick, action),
        );
        Ok(ClientMessage::Command {
            sender_id: self.seat,
            command_id: command_id.0,
            target_tick,
            payload,
        })
    }

    /// Apply one server message. Does not step the engine.
    pub fn handle(&mut self, msg: ServerMessage) -> Result<(), ClientError> {
        match msg {
            ServerMessage::Ack {
                command_id,
                accepted,
                reason,
                sequence,
            } => {
                let id = CommandId(command_id);
                let cmd = self
                    .awaiting_ack
                    .remove(&id)
                    .ok_or_else(|| ClientError::UnexpectedMessage(format!("ack for unknown {id}")))?;
                match (accepted, sequence) {
                    (true, Some(sequence)) => self.engine.enqueue_admitted(cmd, sequence)?,
                    _ => {
                        let reason = reason.unwrap_or_default();
                        debug!(%id, %reason, "command refused");
                        self.refusals.push((id, reason));
                    }
                }
            }
            ServerMessage::Admitted(admitted) => {
                let action = command::decode_action(&admitted.payload)?;
                let cmd = SimCommand::new(
                    player_of(admitted.sender_id),
                    CommandId(admitted.command_id),
                    admitted.target_tick,
                    action,
                );
                self.engine.enqueue_admitted(cmd, admitted.sequence)?;
            }
            ServerMessage::TickSync { current_tick } => {
                self.server_tick = self.server_tick.max(current_tick);
            }
            ServerMessage::PlayerJoined { player } => {
                self.roster.insert(player.seat, player.name);
            }
            ServerMessage::PlayerLeft { seat, .. } => {
                self.roster.remove(&seat);
            }
            ServerMessage::DesyncDetected { tick, seat } => {
                warn!(tick, %seat, "server reports desync");
                self.desyncs.push((tick, seat));
            }
            other @ (ServerMessage::Welcome { .. } | ServerMessage::Rejected { .. }) => {
                return Err(ClientError::UnexpectedMessage(format!("{other:?}")));
            }
        }
        Ok(())
    }

    /// Step toward `tick`, never past the server. Returns the checksum
    /// reports to send.
    pub fn step_to(&mut self, tick: u64) -> Vec<ClientMessage> {
        let limit = tick.min(self.server_tick);
        let me = self.player();
        let mut out = Vec::new();
        while self.engine.current_tick() < limit {
            let report = self.engine.simulate_tick(&mut self.events);
            self.outcomes
                .extend(report.outcomes.into_iter().filter(|o| o.player == me));
            if self.checksum_interval > 0 && report.tick % self.checksum_interval == 0 {
                out.push(ClientMessage::Checksum {
                    tick: report.tick,
                    hash: self.engine.world_hash(),
                });
            }
        }
        out
    }

    /// Step all the way to the latest server tick.
    pub fn catch_up(&mut self) -> Vec<ClientMessage> {
        self.step_to(self.server_tick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hamlet_protocol::message::{AdmittedCommand, PlayerInfo};
    use hamlet_sim::config::GameConfig;
    use hamlet_sim::event::DiscardEvents;
    use hamlet_sim::types::{PersonId, TilePos};

    /// A server-side engine with one family per seat and a replica of it.
    fn pair(checksum_interval: u64) -> (GameEngine, Replica) {
        let config = GameConfig {
            max_players: 2,
            ..GameConfig::default()
        };
        let mut server = GameEngine::with_open_map(3, config).unwrap();
        crate::genesis::found_settlements(&mut server, 2, 2).unwrap();
        let welcome = Welcome {
            seat: SeatId(1),
            session_name: "test".into(),
            players: vec![PlayerInfo {
                seat: SeatId(1),
                name: "Bea".into(),
            }],
            current_tick: 0,
            checksum_interval,
            first_command_id: 0,
            snapshot: server.to_json().unwrap().into_bytes(),
        };
        (server, Replica::from_welcome(&welcome).unwrap())
    }

    #[test]
    fn restores_and_steps_only_to_announced_tick() {
        let (mut server, mut replica) = pair(0);
        assert_eq!(replica.engine().state_hash(), server.state_hash());
        server.advance(5, &mut DiscardEvents);
        replica.handle(ServerMessage::TickSync { current_tick: 5 }).unwrap();
        replica.step_to(3);
        assert_eq!(replica.engine().current_tick(), 3);
        replica.step_to(100);
        assert_eq!(replica.engine().current_tick(), 5);
        assert_eq!(replica.engine().state_hash(), server.state_hash());
    }

    #[test]
    fn own_and_mirrored_commands_queue_in_server_order() {
        let (mut server, mut replica) = pair(0);
        let walk = SimAction::MovePerson {
            person: PersonId(2),
            target: TilePos::new(40, 40),
        };
        let ClientMessage::Command {
            command_id,
            target_tick,
            payload,
            ..
        } = replica.prepare(walk, 4).unwrap()
        else {
            panic!("expected Command");
        };
        assert_eq!(target_tick, 4);
        assert_eq!(replica.awaiting_ack(), 1);

        // The server admits seat 0's command first, then ours.
        let other = SimAction::MovePerson {
            person: PersonId(0),
            target: TilePos::new(1, 1),
        };
        let other_cmd = SimCommand::new(PlayerId(0), CommandId(0), 4, other.clone());
        let other_seq = server.submit(other_cmd).unwrap();
        let own = SimCommand::new(
            PlayerId(1),
            CommandId(command_id),
            target_tick,
            command::decode_action(&payload).unwrap(),
        );
        let own_seq = server.submit(own).unwrap();

        replica
            .handle(ServerMessage::Admitted(AdmittedCommand {
                sender_id: SeatId(0),
                command_id: 0,
                target_tick: 4,
                sequence: other_seq,
                payload: command::encode_action(&other).unwrap(),
            }))
            .unwrap();
        replica
            .handle(ServerMessage::Ack {
                command_id,
                accepted: true,
                reason: None,
                sequence: Some(own_seq),
            })
            .unwrap();
        assert_eq!(replica.awaiting_ack(), 0);
        assert_eq!(replica.engine().state_hash(), server.state_hash());

        server.advance(10, &mut DiscardEvents);
        replica.handle(ServerMessage::TickSync { current_tick: 10 }).unwrap();
        replica.catch_up();
        assert_eq!(replica.engine().state_hash(), server.state_hash());
        assert_eq!(replica.outcomes().len(), 1);
        assert!(replica.outcomes()[0].success);
    }

    #[test]
    fn refusal_is_recorded_and_not_queued() {
        let (_server, mut replica) = pair(0);
        let msg = replica
            .prepare(
                SimAction::UnassignWorker {
                    person: PersonId(2),
                },
                2,
            )
            .unwrap();
        let ClientMessage::Command { command_id, .. } = msg else {
            panic!("expected Command");
        };
        replica
            .handle(ServerMessage::Ack {
                command_id,
                accepted: false,
                reason: Some("PersonId(2) has no job to leave".into()),
                sequence: None,
            })
            .unwrap();
        assert!(replica.engine().pending_commands().is_empty());
        assert_eq!(replica.refusals().len(), 1);
        assert!(replica.handle(ServerMessage::Ack {
            command_id,
            accepted: true,
            reason: None,
            sequence: Some(0),
        })
        .is_err());
    }

    #[test]
    fn checksums_at_interval() {
        let (_server, mut replica) = pair(4);
        replica.handle(ServerMessage::TickSync { current_tick: 9 }).unwrap();
        let sums: Vec<u64> = replica
            .catch_up()
            .into_iter()
            .map(|m| match m {
                ClientMessage::Checksum { tick, .. } => tick,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(sums, vec![4, 8]);
    }

    #[test]
    fn roster_and_desyncs() {
        let (_server, mut replica) = pair(0);
        replica
            .handle(ServerMessage::PlayerJoined {
                player: PlayerInfo {
                    seat: SeatId(0),
                    name: "Ada".into(),
                },
            })
            .unwrap();
        assert_eq!(replica.roster().len(), 2);
        replica
            .handle(ServerMessage::PlayerLeft {
                seat: SeatId(0),
                name: "Ada".into(),
            })
            .unwrap();
        assert_eq!(replica.roster().len(), 1);
        replica
            .handle(ServerMessage::DesyncDetected {
                tick: 50,
                seat: SeatId(1),
            })
            .unwrap();
        assert_eq!(replica.desyncs(), &[(50, SeatId(1))]);
        assert!(replica
            .handle(ServerMessage::Rejected {
                reason: "late".into()
            })
            .is_err());
    }
}
