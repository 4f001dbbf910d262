//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p arena_client -- [--addr 127.0.0.1:40000] [--name Bot] [--frames 600] [--config arena.json]
//!
//! Headless: connects, wanders and picks fights with random inputs, and runs
//! prediction every frame against a null renderer. `--frames 0` runs until
//! the server goes away.

use std::env;

use anyhow::Context;
use arena_client::{client::ClientState, input::LocalInput, GameClient};
use arena_shared::{config::ArenaConfig, intent::KeyState, math::Vec2, render::NullRenderer};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::info;

/// Frames between bot decisions.
const THINK_EVERY: u64 = 45;

struct Args {
    cfg: ArenaConfig,
    frames: u64,
}

fn parse_args() -> anyhow::Result<Args> {
    let args: Vec<String> = env::args().collect();

    let cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => ArenaConfig::load(&args[i + 1])?,
        _ => ArenaConfig::default(),
    };
    let mut out = Args { cfg, frames: 0 };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                out.cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--name" if i + 1 < args.len() => {
                out.cfg.player_name = args[i + 1].clone();
                i += 2;
            }
            "--frames" if i + 1 < args.len() => {
                out.frames = args[i + 1].parse().unwrap_or(0);
                i += 2;
            }
            "--config" => i += 2,
            _ => i += 1,
        }
    }
    Ok(out)
}

fn think(client: &GameClient, rng: &mut StdRng) -> Option<LocalInput> {
    let me = client.view.local_entity()?;
    if me.is_dead() {
        return None;
    }
    let others: Vec<_> = client
        .view
        .ids()
        .into_iter()
        .filter(|id| *id != client.entity_id)
        .collect();

    match rng.gen_range(0..10) {
        0..=3 => {
            let spawn = client.cfg.rules.spawn;
            Some(LocalInput::MoveTo(Vec2::new(
                spawn.x + rng.gen_range(-200.0..200.0),
                spawn.y + rng.gen_range(-150.0..150.0),
            )))
        }
        4..=5 => Some(LocalInput::Keys(KeyState {
            left: rng.gen_bool(0.5),
            right: rng.gen_bool(0.5),
            up: rng.gen_bool(0.5),
            down: rng.gen_bool(0.5),
        })),
        6..=8 if !others.is_empty() => {
            let target = others[rng.gen_range(0..others.len())];
            Some(LocalInput::Attack(target))
        }
        _ => Some(LocalInput::Cancel),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let Args { cfg, frames } = parse_args()?;
    info!(server = %cfg.server_addr, name = %cfg.player_name, frames, "Starting client");

    let mut client = GameClient::connect(&cfg).await.context("connect")?;
    let mut renderer = NullRenderer;
    let mut rng = StdRng::from_entropy();
    let mut ticker = tokio::time::interval(cfg.frame_interval());

    let mut frame: u64 = 0;
    while frames == 0 || frame < frames {
        ticker.tick().await;

        client.poll_reliable();
        if let ClientState::Disconnected { reason } = &client.state {
            info!(%reason, "Disconnected from server");
            return Ok(());
        }
        client.recv_snapshots()?;

        if frame % THINK_EVERY == 0 {
            if let Some(input) = think(&client, &mut rng) {
                client.issue(&input).await?;
            }
        }
        client.render(&mut renderer);

        if frame % 300 == 0 {
            if let Some(me) = client.view.local_entity() {
                info!(
                    tick = ?client.view.last_tick(),
                    entities = client.view.len(),
                    hp = me.hp,
                    score = me.score(),
                    state = me.state().as_str(),
                    "Status"
                );
            }
        }
        frame += 1;
    }

    client.disconnect("client exiting").await?;
    Ok(())
}
