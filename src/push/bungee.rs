// src/push/bungee.rs
//
// BungeeCord plugin messages carried over UDP to a proxy-side bridge.
// Strings use Java's modified-UTF framing: a big-endian u16 length, then the bytes.
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, error, warn};
use std::io::{self, Cursor, Read};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use crate::push::{PushChannel, PushUpdate};

pub const PLAYER_COUNT_SUBCHANNEL: &str = "PlayerCount";

const MAX_DATAGRAM: usize = 1024;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("truncated message: {0}")]
    Truncated(#[from] io::Error),

    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    #[error("unexpected subchannel \"{0}\"")]
    UnexpectedSubchannel(String),
}

fn write_utf(buf: &mut Vec<u8>, s: &str) -> io::Result<()> {
    let len = u16::try_from(s.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "string too long"))?;
    buf.write_u16::<BigEndian>(len)?;
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn read_utf(cursor: &mut Cursor<&[u8]>) -> Result<String, DecodeError> {
    let len = cursor.read_u16::<BigEndian>()?;
    let mut bytes = vec![0u8; len as usize];
    cursor.read_exact(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
}

pub fn encode_player_count_request(server: &str) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(PLAYER_COUNT_SUBCHANNEL.len() + server.len() + 4);
    write_utf(&mut buf, PLAYER_COUNT_SUBCHANNEL)?;
    write_utf(&mut buf, server)?;
    Ok(buf)
}

pub fn decode_player_count_response(bytes: &[u8]) -> Result<PushUpdate, DecodeError> {
    let mut cursor = Cursor::new(bytes);
    let subchannel = read_utf(&mut cursor)?;
    if subchannel != PLAYER_COUNT_SUBCHANNEL {
        return Err(DecodeError::UnexpectedSubchannel(subchannel));
    }
    let server = read_utf(&mut cursor)?;
    let online_players = cursor.read_i32::<BigEndian>()?;
    Ok(PushUpdate { server, online_players })
}

/// Talks to the proxy bridge over one UDP socket.
pub struct UdpBungeeMessenger {
    socket: Arc<UdpSocket>,
    bridge: SocketAddr,
}

impl UdpBungeeMessenger {
    pub async fn bind(local: &str, bridge: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(local).await?;
        debug!("Push bridge socket bound to {}", socket.local_addr()?);
        Ok(Self { socket: Arc::new(socket), bridge })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Forwards every decoded reply from the bridge to `updates` until the receiver goes away.
    pub fn spawn_receiver(&self, updates: UnboundedSender<PushUpdate>) -> JoinHandle<()> {
        let socket = self.socket.clone();
        let bridge = self.bridge;
        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_DATAGRAM];
            loop {
                let (len, from) = match socket.recv_from(&mut buffer).await {
                    Ok(received) => received,
                    Err(e) => {
                        error!("Failed to receive from push bridge: {}", e);
                        continue;
                    }
                };

                if from != bridge {
                    debug!("Ignoring datagram from unexpected peer {}", from);
                    continue;
                }

                match decode_player_count_response(&buffer[..len]) {
                    Ok(update) => {
                        if updates.send(update).is_err() {
                            debug!("Push update receiver closed, stopping bridge listener");
                            return;
                        }
                    }
                    Err(e) => warn!("Dropping invalid message from push bridge {}: {}", from, e),
                }
            }
        })
    }
}

impl PushChannel for UdpBungeeMessenger {
    fn send_player_count_request(&self, server: &str) {
        let packet = match encode_player_count_request(server) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Couldn't encode player count request for \"{}\": {}", server, e);
                return;
            }
        };

        if let Err(e) = self.socket.try_send_to(&packet, self.bridge) {
            warn!(
                "Couldn't send player count request for \"{}\" to {}: {}",
                server,
                self.bridge,
                send_failure_reason(&e)
            );
        }
    }
}

fn send_failure_reason(e: &io::Error) -> String {
    match e.kind() {
        io::ErrorKind::WouldBlock => "socket send buffer full, request dropped".to_string(),
        _ => e.to_string(),
    }
}
