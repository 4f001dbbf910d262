//! Shared helpers for the socket-level tests in `tests/`.

use std::time::Duration;

use arena_client::GameClient;
use arena_server::GameServer;
use arena_shared::config::ArenaConfig;
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::info;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// Accepts `clients` connections, then steps until told to stop.
///
/// The server is handed back on stop so tests can inspect its final state.
pub fn spawn_server(
    mut server: GameServer,
    clients: usize,
) -> (oneshot::Sender<()>, JoinHandle<anyhow::Result<GameServer>>) {
    let (stop_tx, mut stop_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        for _ in 0..clients {
            server.accept_one().await?;
        }
        while stop_rx.try_recv().is_err() {
            server.step().await?;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        info!(
            ticks = server.simulation().tick_count(),
            clients = server.client_count(),
            "Test server stopped"
        );
        Ok(server)
    });
    (stop_tx, handle)
}

pub async fn connect(server_addr: &str, name: &str) -> anyhow::Result<GameClient> {
    GameClient::connect(&ArenaConfig {
        server_addr: server_addr.to_string(),
        player_name: name.to_string(),
        ..ArenaConfig::default()
    })
    .await
}

/// Pumps snapshots and prediction frames until `done` holds or the budget runs out.
pub async fn pump_until(client: &mut GameClient, mut done: impl FnMut(&GameClient) -> bool) -> bool {
    for _ in 0..200 {
        client.poll_reliable();
        let _ = client.wait_snapshot(Duration::from_millis(10)).await;
        client.frame();
        if done(client) {
            return true;
        }
    }
    false
}
