//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p arena_server -- [--addr 127.0.0.1:40000] [--tick-hz 30] [--config arena.json]
//!
//! The server listens for client connections, runs the fixed tick loop and
//! broadcasts snapshots to connected clients.
//!
//! Console commands:
//!   status         - Show server status
//!   kick <id>      - Disconnect a client
//!   respawn <id>   - Revive a dead entity
//!   quit           - Shutdown server

use std::env;
use std::io::{BufRead, Write};

use anyhow::Context;
use arena_server::GameServer;
use arena_shared::config::ArenaConfig;
use tokio::sync::mpsc;
use tracing::info;

fn parse_args() -> anyhow::Result<ArenaConfig> {
    let args: Vec<String> = env::args().collect();

    // The config file is the base layer; flags override it.
    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => ArenaConfig::load(&args[i + 1])?,
        _ => ArenaConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().unwrap_or(cfg.tick_hz);
                i += 2;
            }
            "--config" => i += 2,
            _ => i += 1,
        }
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(addr = %cfg.server_addr, tick_hz = cfg.tick_hz, "Starting server");

    let mut server = GameServer::bind(cfg).await.context("create server")?;
    let local = server.local_addr()?;
    info!(%local, "Server listening");

    // Set up console input channel.
    let (console_tx, console_rx) = mpsc::channel::<String>(32);
    server.set_console_input(console_rx);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Server ready. Type 'status' for info, 'quit' to exit.");
    println!();

    server.run().await
}
