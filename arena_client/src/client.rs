//! Client implementation.
//!
//! The client maintains:
//! - A reliable control stream (handshake, removal notices, disconnect)
//! - An unreliable datagram socket (intents out, snapshots in)
//! - A [`ClientView`] that predicts and reconciles every rendered entity

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use arena_shared::{
    config::{ArenaConfig, PredictionTuning},
    entity::EntityId,
    net::{IntentCommand, NetMsg, ReliableConn, ReliableWriter, UnreliableConn, PROTOCOL_VERSION},
    render::{RenderBackend, RenderedEntity},
};
use tokio::{
    net::TcpStream,
    sync::mpsc::{self, error::TryRecvError},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{input::LocalInput, prediction::ClientView};

/// Client connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    Connected,
    Disconnected { reason: String },
}

/// High-level game client.
pub struct GameClient {
    pub entity_id: EntityId,
    pub state: ClientState,
    pub cfg: ArenaConfig,
    pub view: ClientView,
    pub unreliable: UnreliableConn,

    tuning: PredictionTuning,
    writer: ReliableWriter,
    reliable_rx: mpsc::UnboundedReceiver<NetMsg>,
    reader_task: JoinHandle<()>,
    seq: u32,
}

impl GameClient {
    /// Connects to a server and performs handshake.
    pub async fn connect(cfg: &ArenaConfig) -> anyhow::Result<Self> {
        let server_addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;

        info!(server = %server_addr, name = %cfg.player_name, "Connecting to server");

        // Bind UDP first so we can tell the server where to send snapshots.
        let any = match server_addr.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        let unreliable = UnreliableConn::connect(SocketAddr::new(any, 0), server_addr).await?;
        let client_udp_port = unreliable.local_addr().context("udp local_addr")?.port();

        let stream = TcpStream::connect(server_addr)
            .await
            .context("tcp connect")?;
        let mut reliable = ReliableConn::new(stream);

        reliable
            .send(&NetMsg::Hello {
                protocol: PROTOCOL_VERSION,
                name: Some(cfg.player_name.clone()),
            })
            .await?;
        reliable.send(&NetMsg::UdpHello { client_udp_port }).await?;

        let entity_id = match reliable.recv().await? {
            NetMsg::Welcome { entity_id } => entity_id,
            NetMsg::Disconnect { reason } => anyhow::bail!("server refused connection: {reason}"),
            other => anyhow::bail!("expected Welcome, got {other:?}"),
        };
        info!(entity = %entity_id, "Connected to server");

        let (mut reader, writer) = reliable.split();
        let (tx, reliable_rx) = mpsc::unbounded_channel();
        let reader_task = tokio::spawn(async move {
            loop {
                match reader.recv().await {
                    Ok(msg) => {
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "Reliable stream ended");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            entity_id,
            state: ClientState::Connected,
            cfg: cfg.clone(),
            view: ClientView::new(entity_id),
            unreliable,
            tuning: cfg.prediction_tuning(),
            writer,
            reliable_rx,
            reader_task,
            seq: 0,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.state == ClientState::Connected
    }

    /// Handles every reliable message received so far.
    pub fn poll_reliable(&mut self) {
        loop {
            match self.reliable_rx.try_recv() {
                Ok(NetMsg::EntityRemoved { id }) => {
                    debug!(entity = %id, "Entity removed");
                    self.view.remove(id);
                }
                Ok(NetMsg::Disconnect { reason }) => {
                    info!(reason = %reason, "Disconnected from server");
                    self.state = ClientState::Disconnected { reason };
                }
                Ok(other) => debug!(?other, "Unhandled reliable message"),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.is_connected() {
                        warn!("Reliable connection lost");
                        self.state = ClientState::Disconnected {
                            reason: "connection lost".to_string(),
                        };
                    }
                    break;
                }
            }
        }
    }

    /// Sends one input to the server and seeds local prediction for it.
    pub async fn issue(&mut self, input: &LocalInput) -> anyhow::Result<IntentCommand> {
        input.seed_prediction(&mut self.view, &self.cfg.rules);
        self.seq = self.seq.wrapping_add(1);
        let cmd = IntentCommand {
            entity_id: self.entity_id,
            seq: self.seq,
            intent: input.to_intent(),
        };
        self.unreliable.send(&NetMsg::Intent(cmd.clone())).await?;
        Ok(cmd)
    }

    /// Applies every snapshot already queued on the socket. Returns how many were new.
    pub fn recv_snapshots(&mut self) -> anyhow::Result<usize> {
        let mut applied = 0;
        for msg in self.unreliable.drain()? {
            applied += usize::from(self.on_datagram(msg));
        }
        Ok(applied)
    }

    /// Waits up to `timeout` for one snapshot.
    pub async fn wait_snapshot(&mut self, timeout: Duration) -> anyhow::Result<bool> {
        match self.unreliable.recv_timeout(timeout).await? {
            Some(msg) => Ok(self.on_datagram(msg)),
            None => Ok(false),
        }
    }

    fn on_datagram(&mut self, msg: NetMsg) -> bool {
        match msg {
            NetMsg::Snapshot(snap) => self.view.apply_snapshot(&snap),
            other => {
                debug!(?other, "Unexpected UDP message");
                false
            }
        }
    }

    /// Runs one prediction frame.
    pub fn frame(&mut self) -> Vec<RenderedEntity> {
        self.view.frame(&self.tuning)
    }

    /// Runs one prediction frame and draws it.
    pub fn render(&mut self, backend: &mut dyn RenderBackend) {
        let entities = self.frame();
        backend.begin_frame();
        for entity in &entities {
            backend.draw_entity(entity);
        }
        backend.end_frame();
    }

    /// Tells the server we are leaving.
    pub async fn disconnect(&mut self, reason: &str) -> anyhow::Result<()> {
        self.writer
            .send(&NetMsg::Disconnect {
                reason: reason.to_string(),
            })
            .await?;
        self.state = ClientState::Disconnected {
            reason: reason.to_string(),
        };
        Ok(())
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}
