// TCP server and main event loop.
//
// Architecture: thread-per-reader feeding one `mpsc` channel.
//
// - **Listener thread**: non-blocking `accept()` loop that forwards each new
//   stream as `InternalEvent::NewConnection`.
// - **Reader threads** (one per client): read framed `ClientMessage`s and
//   forward them as `InternalEvent::MessageFrom`. EOF, a read error, a
//   malformed frame or `Goodbye` ends the thread with `Disconnected`.
// - **Main thread**: owns the `Session`. It sleeps in `recv_timeout` until
//   either an event arrives or the next tick is due, so command admission
//   and tick execution are strictly sequential. Ticks only run while at
//   least one player is connected.
//
// The main thread is the only writer to client streams; reader threads only
// read.
//
// Shutdown: `ServerHandle::stop` clears `keep_running` and joins the main
// thread.

use std::io::{self, BufReader, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use hamlet_protocol::framing::{recv, send};
use hamlet_protocol::message::{ClientMessage, ServerMessage};
use hamlet_protocol::types::SeatId;
use hamlet_sim::command::CommandError;
use hamlet_sim::config::{ConfigError, GameConfig};
use hamlet_sim::grid::WorldMap;
use hamlet_sim::sim::GameEngine;
use tracing::{debug, info, warn};

use crate::session::{Session, SessionSettings};

/// Time allowed for a new connection to send its `Hello`.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("network: {0}")]
    Io(#[from] io::Error),
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("founding settlements: {0}")]
    Genesis(#[from] CommandError),
}

/// Events sent from listener and reader threads to the main thread.
enum InternalEvent {
    NewConnection { stream: TcpStream },
    MessageFrom { seat: SeatId, message: ClientMessage },
    Disconnected { seat: SeatId },
}

/// Handle for a running server.
pub struct ServerHandle {
    keep_running: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl ServerHandle {
    /// Signal the server to stop and wait for it.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        self.join();
    }

    /// Block until the server exits on its own.
    pub fn wait(mut self) {
        self.join();
    }

    fn join(&mut self) {
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    /// Interface to bind. Tests use loopback.
    pub bind: String,
    pub session: SessionSettings,
    pub seed: u64,
    pub game: GameConfig,
    /// Terrain to play on; an open map of `game.world_size` when absent.
    pub map: Option<WorldMap>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 7979,
            bind: "127.0.0.1".into(),
            session: SessionSettings::default(),
            seed: 0,
            game: GameConfig::default(),
            map: None,
        }
    }
}

/// Build the world, bind the listener and start the server thread. Returns
/// the handle and the bound address (port 0 picks a free port).
pub fn start_server(config: ServerConfig) -> Result<(ServerHandle, SocketAddr), ServerError> {
    let tick = Duration::from_millis(u64::from(config.game.tick_duration_ms.max(1)));
    let engine = match config.map {
        Some(map) => GameEngine::new(config.seed, config.game, map)?,
        None => GameEngine::with_open_map(config.seed, config.game)?,
    };
    let session = Session::new(config.session, engine)?;

    let listener = TcpListener::bind((config.bind.as_str(), config.port))?;
    let addr = listener.local_addr()?;
    listener.set_nonblocking(true)?;
    info!(%addr, session = %session.name, tick_ms = tick.as_millis() as u64, "server listening");

    let keep_running = Arc::new(AtomicBool::new(true));
    let keep_running_main = keep_running.clone();
    let thread = thread::spawn(move || {
        run_server(listener, session, tick, keep_running_main);
    });

    Ok((
        ServerHandle {
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

fn run_server(
    listener: TcpListener,
    mut session: Session,
    tick: Duration,
    keep_running: Arc<AtomicBool>,
) {
    let (tx, rx): (Sender<InternalEvent>, Receiver<InternalEvent>) = mpsc::channel();

    let keep_running_listener = keep_running.clone();
    let tx_listener = tx.clone();
    thread::spawn(move || {
        while keep_running_listener.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    debug!(%peer, "connection accepted");
                    if stream.set_nonblocking(false).is_err() {
                        continue;
                    }
                    let _ = tx_listener.send(InternalEvent::NewConnection { stream });
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(20));
                }
                Err(e) => {
                    warn!(error = %e, "listener failed");
                    break;
                }
            }
        }
    });

    let mut next_tick = Instant::now() + tick;
    while keep_running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= next_tick {
            if session.player_count() > 0 {
                session.run_tick();
            }
            // No burst catch-up after a stall.
            next_tick = (next_tick + tick).max(now);
            continue;
        }
        match rx.recv_timeout(next_tick - now) {
            Ok(event) => handle_event(&mut session, event, &tx, &keep_running),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
    info!(tick = session.current_tick(), "server stopped");
}

fn handle_event(
    session: &mut Session,
    event: InternalEvent,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    match event {
        InternalEvent::NewConnection { stream } => {
            handle_new_connection(session, stream, tx, keep_running);
        }
        InternalEvent::MessageFrom { seat, message } => handle_message(session, seat, message),
        InternalEvent::Disconnected { seat } => session.remove_player(seat),
    }
}

/// Read the `Hello`, seat the player and start its reader thread. A bad
/// handshake gets a `Rejected` (when there is anything to say) and the
/// connection is dropped.
fn handle_new_connection(
    session: &mut Session,
    stream: TcpStream,
    tx: &Sender<InternalEvent>,
    keep_running: &Arc<AtomicBool>,
) {
    if stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT)).is_err() {
        return;
    }
    let Ok(read_half) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(read_half);

    let hello = match recv::<_, ClientMessage>(&mut reader) {
        Ok(msg) => msg,
        Err(e) => {
            debug!(error = %e, "handshake read failed");
            return;
        }
    };
    let ClientMessage::Hello {
        protocol_version,
        player_name,
        config_hash,
        session_password,
    } = hello
    else {
        debug!("first message was not Hello");
        return;
    };

    let Ok(write_half) = stream.try_clone() else {
        return;
    };
    match session.add_player(
        protocol_version,
        player_name.clone(),
        config_hash,
        session_password,
        write_half,
    ) {
        Ok(seat) => {
            if stream.set_read_timeout(None).is_err() {
                session.remove_player(seat);
                return;
            }
            let tx_reader = tx.clone();
            let keep_running_reader = keep_running.clone();
            thread::spawn(move || reader_loop(reader, seat, tx_reader, keep_running_reader));
        }
        Err(e) => {
            info!(name = %player_name, reason = %e, "join rejected");
            let mut writer = BufWriter::new(stream);
            let _ = send(
                &mut writer,
                &ServerMessage::Rejected {
                    reason: e.to_string(),
                },
            );
        }
    }
}

fn reader_loop(
    mut reader: BufReader<TcpStream>,
    seat: SeatId,
    tx: Sender<InternalEvent>,
    keep_running: Arc<AtomicBool>,
) {
    while keep_running.load(Ordering::SeqCst) {
        match recv::<_, ClientMessage>(&mut reader) {
            Ok(ClientMessage::Goodbye) => break,
            Ok(message) => {
                if tx.send(InternalEvent::MessageFrom { seat, message }).is_err() {
                    return;
                }
            }
            Err(e) => {
                debug!(%seat, error = %e, "client read ended");
                break;
            }
        }
    }
    let _ = tx.send(InternalEvent::Disconnected { seat });
}

fn handle_message(session: &mut Session, seat: SeatId, message: ClientMessage) {
    match message {
        ClientMessage::Command {
            sender_id,
            command_id,
            target_tick,
            payload,
        } => session.handle_command(seat, sender_id, command_id, target_tick, payload),
        ClientMessage::Checksum { tick, hash } => session.record_checksum(seat, tick, hash),
        ClientMessage::Hello { .. } => debug!(%seat, "repeated Hello ignored"),
        // The reader loop turns Goodbye into a disconnect.
        ClientMessage::Goodbye => {}
    }
}
