// Blocking TCP client for a Hamlet server.
//
// - `connect()` opens the stream, sends `Hello` and waits for `Welcome` (or
//   `Rejected`) on the calling thread, then spawns a reader thread.
// - The reader thread reads framed `ServerMessage`s and pushes them into an
//   `mpsc` channel until the stream closes.
// - The owner keeps a `BufWriter<TcpStream>` for sending, and drains the
//   inbox with `poll()` (non-blocking) or `recv_timeout()`.
//
// The client knows nothing about the simulation; `replica.rs` turns its
// messages into a running engine.

use std::io::{self, BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hamlet_protocol::PROTOCOL_VERSION;
use hamlet_protocol::framing::{recv, send};
use hamlet_protocol::message::{ClientMessage, PlayerInfo, ServerMessage};
use hamlet_protocol::types::SeatId;
use hamlet_sim::command::CommandError;
use hamlet_sim::snapshot::RestoreError;
use tracing::debug;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("network: {0}")]
    Io(#[from] io::Error),
    #[error("rejected by server: {0}")]
    Rejected(String),
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),
    #[error("server connection closed")]
    Disconnected,
    #[error("join snapshot: {0}")]
    Restore(#[from] RestoreError),
    #[error("command: {0}")]
    Command(#[from] CommandError),
}

/// What the server told us on joining.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Welcome {
    pub seat: SeatId,
    pub session_name: String,
    pub players: Vec<PlayerInfo>,
    pub current_tick: u64,
    pub checksum_interval: u64,
    pub first_command_id: u64,
    pub snapshot: Vec<u8>,
}

pub struct NetClient {
    writer: BufWriter<TcpStream>,
    inbox: Receiver<ServerMessage>,
    _reader_thread: JoinHandle<()>,
    seat: SeatId,
}

impl NetClient {
    /// Connect and complete the handshake.
    pub fn connect(
        addr: impl ToSocketAddrs,
        player_name: &str,
        config_hash: u64,
        password: Option<String>,
    ) -> Result<(Self, Welcome), ClientError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = BufWriter::new(stream);

        send(
            &mut writer,
            &ClientMessage::Hello {
                protocol_version: PROTOCOL_VERSION,
                player_name: player_name.into(),
                config_hash,
                session_password: password,
            },
        )?;

        let welcome = match recv::<_, ServerMessage>(&mut reader)? {
            ServerMessage::Welcome {
                seat,
                session_name,
                players,
                current_tick,
                checksum_interval,
                first_command_id,
                snapshot,
            } => Welcome {
                seat,
                session_name,
                players,
                current_tick,
                checksum_interval,
                first_command_id,
                snapshot,
            },
            ServerMessage::Rejected { reason } => return Err(ClientError::Rejected(reason)),
            other => return Err(ClientError::UnexpectedMessage(format!("{other:?}"))),
        };
        reader.get_ref().set_read_timeout(None)?;

        let (tx, rx) = mpsc::channel();
        let reader_thread = thread::spawn(move || {
            loop {
                match recv::<_, ServerMessage>(&mut reader) {
                    Ok(msg) => {
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "server read ended");
                        break;
                    }
                }
            }
        });

        Ok((
            Self {
                writer,
                inbox: rx,
                _reader_thread: reader_thread,
                seat: welcome.seat,
            },
            welcome,
        ))
    }

    pub fn seat(&self) -> SeatId {
        self.seat
    }

    pub fn send(&mut self, msg: &ClientMessage) -> Result<(), ClientError> {
        send(&mut self.writer, msg)?;
        Ok(())
    }

    /// Everything received so far, without blocking.
    pub fn poll(&self) -> Vec<ServerMessage> {
        self.inbox.try_iter().collect()
    }

    /// Wait up to `timeout` for the next message. `Ok(None)` on timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<ServerMessage>, ClientError> {
        match self.inbox.recv_timeout(timeout) {
            Ok(msg) => Ok(Some(msg)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ClientError::Disconnected),
        }
    }

    /// Say goodbye and close.
    pub fn disconnect(mut self) {
        let _ = send(&mut self.writer, &ClientMessage::Goodbye);
    }
}
