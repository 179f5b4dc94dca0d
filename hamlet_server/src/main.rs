// CLI entry point for the Hamlet authoritative server.
//
// Builds the world from defaults or files, starts the server and blocks
// until it exits. See `server.rs` for the networking architecture and
// `session.rs` for the session state.
//
// Usage:
//   hamlet-server [OPTIONS]
//     --port <PORT>          Listen port (default: 7979)
//     --bind <ADDR>          Interface to bind (default: 127.0.0.1)
//     --name <NAME>          Session name (default: hamlet)
//     --password <PASS>      Session password (optional)
//     --seed <N>             World seed (default: 0)
//     --tick-ms <N>          Milliseconds per tick (default: from config)
//     --max-players <N>      Seats (default: from config)
//     --settlers <N>         People per starting family (default: 3)
//     --checksum-interval <N> Ticks between desync checks (default: 50)
//     --config <FILE>        GameConfig JSON
//     --map <FILE>           ASCII terrain map
//
// Logging goes through `tracing`; set `RUST_LOG` to adjust (default `info`).

use std::fs;
use std::process;

use hamlet_server::server::{ServerConfig, start_server};
use hamlet_sim::config::GameConfig;
use hamlet_sim::grid::WorldMap;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = parse_args();
    let config_hash = config.game.config_hash();
    let (handle, addr) = match start_server(config) {
        Ok(started) => started,
        Err(e) => {
            error!(error = %e, "failed to start server");
            process::exit(1);
        }
    };
    info!(%addr, config_hash, "ready; clients must present this config hash");
    handle.wait();
}

/// Flags that override the loaded game config, applied after `--config`
/// regardless of argument order.
#[derive(Default)]
struct Overrides {
    tick_ms: Option<u32>,
    max_players: Option<u32>,
}

fn parse_args() -> ServerConfig {
    let mut config = ServerConfig::default();
    let mut overrides = Overrides::default();
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < args.len() {
        let flag = args[i].as_str();
        if matches!(flag, "--help" | "-h") {
            print_usage();
            process::exit(0);
        }
        i += 1;
        let value = args.get(i).map(String::as_str);
        match flag {
            "--port" => config.port = parsed(flag, value),
            "--bind" => config.bind = required(flag, value).into(),
            "--name" => config.session.name = required(flag, value).into(),
            "--password" => config.session.password = Some(required(flag, value).into()),
            "--seed" => config.seed = parsed(flag, value),
            "--tick-ms" => overrides.tick_ms = Some(parsed(flag, value)),
            "--max-players" => overrides.max_players = Some(parsed(flag, value)),
            "--settlers" => config.session.settlers_per_seat = parsed(flag, value),
            "--checksum-interval" => config.session.checksum_interval = parsed(flag, value),
            "--config" => {
                let path = required(flag, value);
                let json = read_file(path);
                config.game = GameConfig::from_json(&json).unwrap_or_else(|e| {
                    eprintln!("{path}: {e}");
                    process::exit(1);
                });
            }
            "--map" => {
                let path = required(flag, value);
                let text = read_file(path);
                config.map = Some(WorldMap::from_ascii(&text).unwrap_or_else(|e| {
                    eprintln!("{path}: {e}");
                    process::exit(1);
                }));
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    if let Some(ms) = overrides.tick_ms {
        config.game.tick_duration_ms = ms;
    }
    if let Some(n) = overrides.max_players {
        config.game.max_players = n;
    }
    config
}

fn required<'a>(flag: &str, value: Option<&'a str>) -> &'a str {
    value.unwrap_or_else(|| {
        eprintln!("{flag} requires a value");
        process::exit(1);
    })
}

fn parsed<T: std::str::FromStr>(flag: &str, value: Option<&str>) -> T {
    required(flag, value).parse().unwrap_or_else(|_| {
        eprintln!("{flag} requires a valid number");
        process::exit(1);
    })
}

fn read_file(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("cannot read {path}: {e}");
        process::exit(1);
    })
}

fn print_usage() {
    println!("Usage: hamlet-server [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --port <PORT>            Listen port (default: 7979)");
    println!("  --bind <ADDR>            Interface to bind (default: 127.0.0.1)");
    println!("  --name <NAME>            Session name (default: hamlet)");
    println!("  --password <PASS>        Session password (optional)");
    println!("  --seed <N>               World seed (default: 0)");
    println!("  --tick-ms <N>            Milliseconds per tick (default: from config)");
    println!("  --max-players <N>        Seats (default: from config)");
    println!("  --settlers <N>           People per starting family (default: 3)");
    println!("  --checksum-interval <N>  Ticks between desync checks (default: 50)");
    println!("  --config <FILE>          GameConfig JSON");
    println!("  --map <FILE>             ASCII terrain map");
    println!("  --help, -h               Show this help");
}
