use std::time::Duration;

use arena_server::server::bind_ephemeral;
use tokio::sync::mpsc;

/// Smoke test: server can run a few ticks without panicking.
#[tokio::test]
async fn server_runs_few_ticks() -> anyhow::Result<()> {
    let (mut server, _cfg) = bind_ephemeral(64).await?;
    server.run_for_ticks(3).await?;
    assert_eq!(server.simulation().tick_count(), 3);
    Ok(())
}

/// The event loop stops on the `quit` console command.
#[tokio::test]
async fn run_loop_exits_on_quit() -> anyhow::Result<()> {
    let (mut server, _cfg) = bind_ephemeral(64).await?;
    let (tx, rx) = mpsc::channel(4);
    server.set_console_input(rx);
    tx.send("status".to_string()).await?;
    tx.send("quit".to_string()).await?;

    tokio::time::timeout(Duration::from_secs(2), server.run()).await??;
    assert!(server.is_shutdown());
    Ok(())
}
