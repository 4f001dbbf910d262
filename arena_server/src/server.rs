//! Server implementation.
//!
//! Authoritative tick loop. One task owns the [`Simulation`]; connection IO
//! runs in helper tasks that report back over channels, so intents, ticks,
//! deferred transitions and console commands are applied strictly one at a
//! time. It supports:
//! - TCP handshake with display name, and a removal notice on disconnect
//! - UDP intents in, full snapshots out after every tick
//! - Console commands (status, kick, respawn, quit)
//!
//! Determinism notes:
//! - Movement only advances on ticks, by a fixed step.
//! - Snapshots are taken after the tick completes and are ordered by id.

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use anyhow::Context;
use arena_shared::{
    config::ArenaConfig,
    dice::{Dice, RandomDice},
    entity::EntityId,
    net::{
        decode_from_bytes, IntentCommand, NetMsg, ReliableConn, ReliableListener,
        MAX_DATAGRAM_LEN, PROTOCOL_VERSION,
    },
};
use tokio::{
    net::UdpSocket,
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    notifier::{SnapshotSink, UdpBroadcast},
    simulation::Simulation,
};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const LINK_QUEUE: usize = 256;
const OUTBOX_DEPTH: usize = 64;

/// A connection that completed the handshake but has no entity yet.
pub struct Handshake {
    pub id: EntityId,
    pub name: Option<String>,
    pub udp_peer: SocketAddr,
    conn: ReliableConn,
}

enum LinkEvent {
    Connected(Handshake),
    Disconnected { id: EntityId, reason: String },
}

/// Connected client state.
struct ClientLink {
    /// Address the handshake came from; intents must match it.
    peer_ip: IpAddr,
    udp_peer: SocketAddr,
    outbox: mpsc::Sender<NetMsg>,
    last_seq: u32,
}

/// Game server.
pub struct GameServer {
    pub cfg: ArenaConfig,
    sim: Simulation,
    clients: HashMap<EntityId, ClientLink>,

    tcp: Arc<ReliableListener>,
    udp: Arc<UdpSocket>,
    sink: Box<dyn SnapshotSink>,

    link_tx: mpsc::Sender<LinkEvent>,
    link_rx: mpsc::Receiver<LinkEvent>,
    /// Channel for console commands from stdin.
    console_rx: Option<mpsc::Receiver<String>>,

    started: Instant,
    shutdown: bool,
}

impl GameServer {
    /// Binds server sockets with random dice.
    pub async fn bind(cfg: ArenaConfig) -> anyhow::Result<Self> {
        Self::bind_with_dice(cfg, Box::new(RandomDice::from_entropy())).await
    }

    /// Binds TCP, then UDP on the same port. `cfg.server_addr` is updated to
    /// the bound address, which matters when the requested port was 0.
    pub async fn bind_with_dice(mut cfg: ArenaConfig, dice: Box<dyn Dice>) -> anyhow::Result<Self> {
        let addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        let tcp = ReliableListener::bind(addr).await?;
        let local = tcp.local_addr()?;
        let udp = Arc::new(UdpSocket::bind(local).await.context("udp bind")?);
        cfg.server_addr = local.to_string();

        let (link_tx, link_rx) = mpsc::channel(LINK_QUEUE);
        Ok(Self {
            sim: Simulation::new(cfg.rules.clone(), dice),
            cfg,
            clients: HashMap::new(),
            tcp: Arc::new(tcp),
            sink: Box::new(UdpBroadcast::new(Arc::clone(&udp))),
            udp,
            link_tx,
            link_rx,
            console_rx: None,
            started: Instant::now(),
            shutdown: false,
        })
    }

    /// Replaces the snapshot sink.
    pub fn with_sink(mut self, sink: Box<dyn SnapshotSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the console input receiver.
    pub fn set_console_input(&mut self, rx: mpsc::Receiver<String>) {
        self.console_rx = Some(rx);
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.tcp.local_addr()
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn simulation_mut(&mut self) -> &mut Simulation {
        &mut self.sim
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    /// Accepts exactly one client and creates its entity.
    pub async fn accept_one(&mut self) -> anyhow::Result<EntityId> {
        let (conn, peer) = self.tcp.accept().await?;
        let hs = handshake(conn, peer)
            .await
            .with_context(|| format!("handshake with {peer}"))?;
        Ok(self.attach(hs))
    }

    /// Runs until `quit`, accepting clients in the background.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let acceptor = self.spawn_acceptor();
        let mut ticker = time::interval(self.cfg.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];

        while !self.shutdown {
            let deadline = self.sim.next_deadline().map(|d| self.started + d);
            tokio::select! {
                Some(event) = self.link_rx.recv() => self.on_link(event),
                res = self.udp.recv_from(&mut buf) => match res {
                    Ok((n, from)) => self.on_datagram(from, &buf[..n]),
                    Err(e) => warn!(error = %e, "UDP receive failed"),
                },
                _ = ticker.tick() => self.tick_once().await,
                _ = sleep_until(deadline) => {
                    self.sim.set_clock(self.started.elapsed());
                    self.flush_events();
                }
                line = next_console_line(&mut self.console_rx) => match line {
                    Some(line) => {
                        for out in self.exec_console(&line) {
                            println!("{out}");
                        }
                    }
                    None => self.console_rx = None,
                },
            }
        }

        acceptor.abort();
        info!("Server stopped");
        Ok(())
    }

    /// Runs the server for a number of ticks.
    pub async fn run_for_ticks(&mut self, ticks: u32) -> anyhow::Result<()> {
        let dt = self.cfg.tick_interval();
        let mut next = Instant::now();

        for _ in 0..ticks {
            next += dt;
            self.step().await?;
            time::sleep_until(next).await;
        }
        Ok(())
    }

    /// One non-blocking pass: console, link events, queued intents, then a tick.
    pub async fn step(&mut self) -> anyhow::Result<()> {
        self.process_console_commands();
        while let Ok(event) = self.link_rx.try_recv() {
            self.on_link(event);
        }
        self.recv_intents()?;
        self.tick_once().await;
        Ok(())
    }

    fn process_console_commands(&mut self) {
        let lines: Vec<String> = match self.console_rx.as_mut() {
            Some(rx) => std::iter::from_fn(|| rx.try_recv().ok()).collect(),
            None => Vec::new(),
        };
        for line in lines {
            for out in self.exec_console(&line) {
                info!("{out}");
            }
        }
    }

    /// Executes a console command and returns its output lines.
    pub fn exec_console(&mut self, line: &str) -> Vec<String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            return Vec::new();
        };

        let out = match command {
            "status" => self.status_lines(),
            "kick" => match tokens.get(1).and_then(|t| t.parse::<EntityId>().ok()) {
                Some(id) if self.clients.contains_key(&id) => {
                    self.kick(id);
                    vec![format!("Kicked {id}")]
                }
                Some(id) => vec![format!("No client {id}")],
                None => vec!["Usage: kick <id>".to_string()],
            },
            "respawn" => match tokens.get(1).and_then(|t| t.parse::<EntityId>().ok()) {
                Some(id) if self.sim.respawn(id) => vec![format!("Respawned {id}")],
                Some(id) => vec![format!("{id} is not dead")],
                None => vec!["Usage: respawn <id>".to_string()],
            },
            "quit" | "exit" => {
                info!("Server shutting down");
                self.shutdown = true;
                vec!["Shutting down".to_string()]
            }
            other => vec![format!("Unknown command: {other}")],
        };
        self.flush_events();
        out
    }

    fn status_lines(&self) -> Vec<String> {
        let mut out = vec![
            format!("Tick: {}", self.sim.tick_count()),
            format!("Uptime: {:.1}s", self.sim.now().as_secs_f32()),
            format!("Clients: {}", self.clients.len()),
        ];
        for id in self.sim.world().ids() {
            let Some(e) = self.sim.world().get(id) else {
                continue;
            };
            let udp = self
                .clients
                .get(&id)
                .map(|c| format!("{} seq={}", c.udp_peer, c.last_seq))
                .unwrap_or_default();
            out.push(format!(
                "  {id} {:?} {} hp={}/{} score={} {udp}",
                e.name,
                e.state().as_str(),
                e.hp,
                e.max_hp,
                e.score()
            ));
        }
        out
    }

    fn spawn_acceptor(&self) -> JoinHandle<()> {
        let tcp = Arc::clone(&self.tcp);
        let link_tx = self.link_tx.clone();
        tokio::spawn(async move {
            loop {
                let (conn, peer) = match tcp.accept().await {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        time::sleep(Duration::from_millis(50)).await;
                        continue;
                    }
                };
                let link_tx = link_tx.clone();
                tokio::spawn(async move {
                    match time::timeout(HANDSHAKE_TIMEOUT, handshake(conn, peer)).await {
                        Ok(Ok(hs)) => {
                            let _ = link_tx.send(LinkEvent::Connected(hs)).await;
                        }
                        Ok(Err(e)) => warn!(%peer, error = %e, "Handshake failed"),
                        Err(_) => warn!(%peer, "Handshake timed out"),
                    }
                });
            }
        })
    }

    fn on_link(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Connected(hs) => {
                self.attach(hs);
            }
            LinkEvent::Disconnected { id, reason } => self.disconnect(id, &reason),
        }
        self.flush_events();
    }

    /// Creates the entity for a handshaken connection and starts its IO tasks.
    fn attach(&mut self, hs: Handshake) -> EntityId {
        let Handshake {
            id,
            name,
            udp_peer,
            conn,
        } = hs;
        let (mut reader, mut writer) = conn.split();

        let (outbox, mut outbox_rx) = mpsc::channel::<NetMsg>(OUTBOX_DEPTH);
        tokio::spawn(async move {
            while let Some(msg) = outbox_rx.recv().await {
                if let Err(e) = writer.send(&msg).await {
                    debug!(entity = %id, error = %e, "Reliable send failed");
                    break;
                }
            }
        });

        let link_tx = self.link_tx.clone();
        tokio::spawn(async move {
            let reason = loop {
                match reader.recv().await {
                    Ok(NetMsg::Disconnect { reason }) => break reason,
                    Ok(other) => debug!(entity = %id, ?other, "Ignoring reliable message"),
                    Err(e) => break format!("connection lost: {e}"),
                }
            };
            let _ = link_tx.send(LinkEvent::Disconnected { id, reason }).await;
        });

        self.sim.create_entity(id, name.as_deref());
        self.sink.attach(id, udp_peer);
        self.clients.insert(
            id,
            ClientLink {
                peer_ip: udp_peer.ip(),
                udp_peer,
                outbox,
                last_seq: 0,
            },
        );
        info!(entity = %id, name = ?name, %udp_peer, "Client connected");
        id
    }

    fn disconnect(&mut self, id: EntityId, reason: &str) {
        if self.clients.remove(&id).is_none() {
            return;
        }
        self.sim.remove_entity(id);
        self.sink.detach(id);
        info!(entity = %id, reason, "Client disconnected");

        for (other, link) in &self.clients {
            if link.outbox.try_send(NetMsg::EntityRemoved { id }).is_err() {
                warn!(entity = %other, removed = %id, "Removal notice dropped");
            }
        }
    }

    fn kick(&mut self, id: EntityId) {
        if let Some(link) = self.clients.get(&id) {
            let _ = link.outbox.try_send(NetMsg::Disconnect {
                reason: "kicked".to_string(),
            });
        }
        self.disconnect(id, "kicked");
        self.flush_events();
    }

    fn recv_intents(&mut self) -> anyhow::Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
        loop {
            match self.udp.try_recv_from(&mut buf) {
                Ok((n, from)) => self.on_datagram(from, &buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e).context("udp recv"),
            }
        }
        Ok(())
    }

    fn on_datagram(&mut self, from: SocketAddr, payload: &[u8]) {
        match decode_from_bytes(payload) {
            Ok(NetMsg::Intent(cmd)) => self.on_intent(from, cmd),
            Ok(other) => debug!(%from, ?other, "Unexpected datagram"),
            Err(e) => debug!(%from, error = %e, "Dropping malformed datagram"),
        }
    }

    fn on_intent(&mut self, from: SocketAddr, cmd: IntentCommand) {
        let id = cmd.entity_id;
        let Some(link) = self.clients.get_mut(&id) else {
            debug!(entity = %id, %from, "Intent for unknown entity");
            return;
        };
        if from.ip() != link.peer_ip {
            debug!(entity = %id, %from, "Intent from foreign address");
            return;
        }
        if link.udp_peer != from {
            link.udp_peer = from;
            self.sink.attach(id, from);
        }
        link.last_seq = cmd.seq;
        debug!(entity = %id, seq = cmd.seq, intent = ?cmd.intent, "Intent");
        self.sim.apply_intent(id, cmd.intent);
        self.flush_events();
    }

    async fn tick_once(&mut self) {
        self.sim.set_clock(self.started.elapsed());
        let snapshot = self.sim.tick();
        self.flush_events();
        if let Err(e) = self.sink.publish(&snapshot).await {
            warn!(tick = snapshot.tick, error = %e, "Snapshot publish failed");
        }
    }

    fn flush_events(&mut self) {
        for event in self.sim.drain_events() {
            event.trace();
        }
    }
}

/// Performs the reliable-channel handshake and allocates the entity id.
async fn handshake(mut conn: ReliableConn, peer: SocketAddr) -> anyhow::Result<Handshake> {
    let name = match conn.recv().await? {
        NetMsg::Hello { protocol, name } if protocol == PROTOCOL_VERSION => name,
        NetMsg::Hello { protocol, .. } => {
            let reason = format!("protocol {protocol} unsupported, server speaks {PROTOCOL_VERSION}");
            let _ = conn.send(&NetMsg::Disconnect { reason: reason.clone() }).await;
            anyhow::bail!(reason);
        }
        other => anyhow::bail!("unexpected handshake msg: {other:?}"),
    };
    let client_udp_port = match conn.recv().await? {
        NetMsg::UdpHello { client_udp_port } => client_udp_port,
        other => anyhow::bail!("expected UdpHello, got {other:?}"),
    };

    let id = EntityId::new_unique();
    conn.send(&NetMsg::Welcome { entity_id: id }).await?;
    Ok(Handshake {
        id,
        name,
        udp_peer: SocketAddr::new(peer.ip(), client_udp_port),
        conn,
    })
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn next_console_line(rx: &mut Option<mpsc::Receiver<String>>) -> Option<String> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Helper for tests: bind to an ephemeral port.
pub async fn bind_ephemeral(tick_hz: u32) -> anyhow::Result<(GameServer, ArenaConfig)> {
    bind_ephemeral_with_dice(tick_hz, Box::new(RandomDice::from_entropy())).await
}

pub async fn bind_ephemeral_with_dice(
    tick_hz: u32,
    dice: Box<dyn Dice>,
) -> anyhow::Result<(GameServer, ArenaConfig)> {
    let cfg = ArenaConfig {
        server_addr: format!("{}:{}", IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        tick_hz,
        ..Default::default()
    };
    let server = GameServer::bind_with_dice(cfg, dice).await?;
    let cfg = server.cfg.clone();
    Ok((server, cfg))
}
