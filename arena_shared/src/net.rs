//! Networking primitives.
//!
//! Two channels per client:
//! - Reliable (TCP, length-prefixed JSON frames): handshake, removal notices, disconnect.
//! - Unreliable (UDP datagrams): intents upstream, full snapshots downstream.
//!
//! Snapshots are always complete world states; a lost datagram is simply
//! superseded by the next tick.

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream, UdpSocket,
    },
    time,
};

use crate::{entity::Entity, entity::EntityId, intent::Intent};

/// Protocol version for compatibility checks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Upper bound for a single reliable frame.
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Receive buffer size for datagrams.
pub const MAX_DATAGRAM_LEN: usize = 64 * 1024;

/// High-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum NetMsg {
    // ─── Connection handshake ───
    Hello {
        protocol: u32,
        /// Display name; the server substitutes a default when absent.
        name: Option<String>,
    },
    /// Client announces its UDP port to the server.
    UdpHello {
        client_udp_port: u16,
    },
    Welcome {
        entity_id: EntityId,
    },

    // ─── Gameplay ───
    /// Client -> server: one player intent.
    Intent(IntentCommand),
    /// Server -> client: full world state after a tick.
    Snapshot(Snapshot),
    /// Server -> client: an entity left with its connection.
    EntityRemoved {
        id: EntityId,
    },

    // ─── Disconnect ───
    Disconnect {
        reason: String,
    },
}

/// Intent tagged with the sender's entity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntentCommand {
    pub entity_id: EntityId,
    /// Client-side sequence number, carried for logging.
    pub seq: u32,
    pub intent: Intent,
}

/// Complete world state as of the end of a tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub tick: u32,
    /// Every entity, ordered by id.
    pub entities: Vec<Entity>,
}

impl Snapshot {
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(w: &mut W, msg: &NetMsg) -> anyhow::Result<()> {
    let payload = serde_json::to_vec(msg).context("serialize msg")?;
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);
    w.write_all(&buf).await.context("tcp write")?;
    Ok(())
}

async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> anyhow::Result<NetMsg> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf).await.context("tcp read len")?;
    let len = u32::from_be_bytes(len_buf) as usize;
    anyhow::ensure!(len <= MAX_FRAME_LEN, "frame too large: {len} bytes");
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)
        .await
        .context("tcp read payload")?;
    let msg = serde_json::from_slice(&payload).context("deserialize msg")?;
    Ok(msg)
}

/// Reliable connection over TCP with length-prefixed frames.
#[derive(Debug)]
pub struct ReliableConn {
    stream: TcpStream,
}

impl ReliableConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        write_frame(&mut self.stream, msg).await
    }

    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        read_frame(&mut self.stream).await
    }

    pub fn peer_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    /// Splits into independently owned halves so reads and writes can live
    /// in separate tasks.
    pub fn split(self) -> (ReliableReader, ReliableWriter) {
        let (read, write) = self.stream.into_split();
        (ReliableReader { read }, ReliableWriter { write })
    }
}

/// Receiving half of a [`ReliableConn`].
#[derive(Debug)]
pub struct ReliableReader {
    read: OwnedReadHalf,
}

impl ReliableReader {
    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        read_frame(&mut self.read).await
    }
}

/// Sending half of a [`ReliableConn`].
#[derive(Debug)]
pub struct ReliableWriter {
    write: OwnedWriteHalf,
}

impl ReliableWriter {
    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        write_frame(&mut self.write, msg).await
    }
}

/// Unreliable channel over UDP.
#[derive(Debug)]
pub struct UnreliableConn {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UnreliableConn {
    pub async fn connect(bind_addr: SocketAddr, peer: SocketAddr) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await.context("udp bind")?;
        socket.connect(peer).await.context("udp connect")?;
        Ok(Self { socket, peer })
    }

    pub async fn send(&self, msg: &NetMsg) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(msg).context("serialize udp msg")?;
        self.socket.send(&payload).await.context("udp send")?;
        Ok(())
    }

    pub async fn recv(&self) -> anyhow::Result<NetMsg> {
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
        let n = self.socket.recv(&mut buf).await.context("udp recv")?;
        let msg = serde_json::from_slice(&buf[..n]).context("deserialize udp msg")?;
        Ok(msg)
    }

    /// Receives a datagram within the given timeout.
    pub async fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> anyhow::Result<Option<NetMsg>> {
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
        match time::timeout(timeout, self.socket.recv(&mut buf)).await {
            Ok(Ok(n)) => {
                let msg = serde_json::from_slice(&buf[..n]).context("deserialize udp msg")?;
                Ok(Some(msg))
            }
            Ok(Err(e)) => Err(e).context("udp recv")?,
            Err(_) => Ok(None),
        }
    }

    /// Drains every datagram already queued on the socket.
    ///
    /// Datagrams that fail to decode are skipped.
    pub fn drain(&self) -> anyhow::Result<Vec<NetMsg>> {
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
        let mut out = Vec::new();
        loop {
            match self.socket.try_recv(&mut buf) {
                Ok(n) => match decode_from_bytes(&buf[..n]) {
                    Ok(msg) => out.push(msg),
                    Err(e) => tracing::debug!(error = %e, "Dropping malformed datagram"),
                },
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e).context("udp recv"),
            }
        }
        Ok(out)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

/// TCP server listener.
pub struct ReliableListener {
    listener: TcpListener,
}

impl ReliableListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(ReliableConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        Ok((ReliableConn::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Convenience codec helpers.
pub fn encode_to_bytes(msg: &NetMsg) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes(b: &[u8]) -> anyhow::Result<NetMsg> {
    serde_json::from_slice(b).context("deserialize")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Rules, math::Vec2};

    #[test]
    fn snapshot_carries_every_entity_field() {
        let mut e = Entity::spawn(EntityId(1), Some("ann"), &Rules::default());
        e.target_position = Some(Vec2::new(1.0, 2.0));
        let msg = NetMsg::Snapshot(Snapshot {
            tick: 12,
            entities: vec![e],
        });
        let bytes = encode_to_bytes(&msg).unwrap();
        let text = std::str::from_utf8(&bytes).unwrap();
        for field in [
            "id",
            "name",
            "color",
            "level",
            "position",
            "target_position",
            "hp",
            "max_hp",
            "state",
            "score",
        ] {
            assert!(text.contains(&format!("\"{field}\"")), "missing {field}");
        }
        assert_eq!(decode_from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        assert!(decode_from_bytes(b"{\"Bogus\":1}").is_err());
        assert!(decode_from_bytes(b"not json").is_err());
    }

    #[tokio::test]
    async fn reliable_frames_survive_split() -> anyhow::Result<()> {
        let listener = ReliableListener::bind("127.0.0.1:0".parse()?).await?;
        let addr = listener.local_addr()?;

        let client = tokio::spawn(async move {
            let mut conn = ReliableConn::new(TcpStream::connect(addr).await?);
            conn.send(&NetMsg::Hello {
                protocol: PROTOCOL_VERSION,
                name: Some("ann".into()),
            })
            .await?;
            conn.recv().await
        });

        let (conn, _) = listener.accept().await?;
        let (mut reader, mut writer) = conn.split();
        let hello = reader.recv().await?;
        assert!(matches!(hello, NetMsg::Hello { protocol: PROTOCOL_VERSION, .. }));
        writer
            .send(&NetMsg::Welcome {
                entity_id: EntityId(5),
            })
            .await?;

        let welcome = client.await??;
        assert_eq!(
            welcome,
            NetMsg::Welcome {
                entity_id: EntityId(5)
            }
        );
        Ok(())
    }
}
