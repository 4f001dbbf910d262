//! Snapshot fan-out.
//!
//! The driver hands each post-tick snapshot to a [`SnapshotSink`]. The UDP
//! implementation sends one datagram per attached client; tests swap in
//! [`MemorySink`] to observe what would have gone out.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use arena_shared::{
    entity::EntityId,
    net::{NetMsg, Snapshot},
};
use tokio::{net::UdpSocket, sync::mpsc};

#[async_trait]
pub trait SnapshotSink: Send {
    /// Starts delivering snapshots for `id` to `addr`. Re-attaching updates the address.
    fn attach(&mut self, id: EntityId, addr: SocketAddr);
    fn detach(&mut self, id: EntityId);
    async fn publish(&mut self, snapshot: &Snapshot) -> anyhow::Result<()>;
}

/// Sends each snapshot to every attached peer over the server's UDP socket.
pub struct UdpBroadcast {
    socket: Arc<UdpSocket>,
    peers: HashMap<EntityId, SocketAddr>,
}

impl UdpBroadcast {
    pub fn new(socket: Arc<UdpSocket>) -> Self {
        Self {
            socket,
            peers: HashMap::new(),
        }
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

#[async_trait]
impl SnapshotSink for UdpBroadcast {
    fn attach(&mut self, id: EntityId, addr: SocketAddr) {
        self.peers.insert(id, addr);
    }

    fn detach(&mut self, id: EntityId) {
        self.peers.remove(&id);
    }

    async fn publish(&mut self, snapshot: &Snapshot) -> anyhow::Result<()> {
        if self.peers.is_empty() {
            return Ok(());
        }
        let payload =
            serde_json::to_vec(&NetMsg::Snapshot(snapshot.clone())).context("serialize snapshot")?;
        for (id, addr) in &self.peers {
            if let Err(e) = self.socket.send_to(&payload, addr).await {
                tracing::warn!(entity = %id, %addr, error = %e, "Snapshot send failed");
            }
        }
        Ok(())
    }
}

/// Forwards published snapshots to a channel. Used by tests.
pub struct MemorySink {
    tx: mpsc::UnboundedSender<Snapshot>,
    peers: HashMap<EntityId, SocketAddr>,
}

impl MemorySink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Snapshot>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                peers: HashMap::new(),
            },
            rx,
        )
    }
}

#[async_trait]
impl SnapshotSink for MemorySink {
    fn attach(&mut self, id: EntityId, addr: SocketAddr) {
        self.peers.insert(id, addr);
    }

    fn detach(&mut self, id: EntityId) {
        self.peers.remove(&id);
    }

    async fn publish(&mut self, snapshot: &Snapshot) -> anyhow::Result<()> {
        // A dropped receiver just means nobody is watching anymore.
        let _ = self.tx.send(snapshot.clone());
        Ok(())
    }
}
