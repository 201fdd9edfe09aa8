// src/ping/minecraft.rs
//
// Minecraft server list ping (the post-1.7 JSON status protocol).
// The client resolves and connects, sends a handshake followed by an
// empty status request, and reads back one packet carrying the JSON
// status document. Only the player counts and the description are kept.

use async_trait::async_trait;
use byteorder::{BigEndian, WriteBytesExt};
use log::debug;
use serde_json::Value;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpStream};

use crate::models::server::ServerAddress;
use crate::ping::{PingError, PingResponse, ServerPinger};

/// Protocol version sent in the handshake. Servers answer status pings for any version.
pub const DEFAULT_PROTOCOL_VERSION: i32 = 47;

const HANDSHAKE_PACKET_ID: i32 = 0x00;
const STATUS_PACKET_ID: i32 = 0x00;
const NEXT_STATE_STATUS: i32 = 1;
const MAX_STATUS_LEN: i32 = 256 * 1024;

#[derive(Debug, Clone)]
pub struct MinecraftPinger {
    protocol_version: i32,
}

impl MinecraftPinger {
    pub fn new(protocol_version: i32) -> Self {
        Self { protocol_version }
    }

    async fn exchange(&self, address: &ServerAddress) -> Result<PingResponse, PingError> {
        let target = lookup_host((address.host.as_str(), address.port))
            .await
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or(PingError::UnknownHost)?;

        let mut stream = TcpStream::connect(target).await?;
        stream.write_all(&handshake_packet(self.protocol_version, address)?).await?;
        stream.write_all(&status_request_packet()).await?;

        let bytes = read_status_response(&mut stream).await?;
        debug!("Status response from {}: {}", address, bytes.escape_ascii());
        decode_status(&bytes)
    }
}

impl Default for MinecraftPinger {
    fn default() -> Self {
        Self::new(DEFAULT_PROTOCOL_VERSION)
    }
}

#[async_trait]
impl ServerPinger for MinecraftPinger {
    async fn ping(&self, address: &ServerAddress, timeout: Duration) -> Result<PingResponse, PingError> {
        match tokio::time::timeout(timeout, self.exchange(address)).await {
            Ok(result) => result,
            Err(_) => Err(PingError::Timeout),
        }
    }
}

fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7F == 0 {
            buf.push(value as u8);
            return;
        }
        buf.push(((value & 0x7F) | 0x80) as u8);
        value >>= 7;
    }
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_varint(buf, s.len() as i32);
    buf.extend_from_slice(s.as_bytes());
}

fn frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 5);
    write_varint(&mut out, payload.len() as i32);
    out.extend_from_slice(payload);
    out
}

fn handshake_packet(protocol_version: i32, address: &ServerAddress) -> io::Result<Vec<u8>> {
    let mut payload = Vec::new();
    write_varint(&mut payload, HANDSHAKE_PACKET_ID);
    write_varint(&mut payload, protocol_version);
    write_string(&mut payload, &address.host);
    WriteBytesExt::write_u16::<BigEndian>(&mut payload, address.port)?;
    write_varint(&mut payload, NEXT_STATE_STATUS);
    Ok(frame(&payload))
}

fn status_request_packet() -> Vec<u8> {
    let mut payload = Vec::new();
    write_varint(&mut payload, STATUS_PACKET_ID);
    frame(&payload)
}

async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<i32> {
    let mut value: u32 = 0;
    for shift in 0..5 {
        let byte = reader.read_u8().await?;
        value |= u32::from(byte & 0x7F) << (7 * shift);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(io::Error::new(io::ErrorKind::InvalidData, "VarInt too big"))
}

async fn read_status_response<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Vec<u8>> {
    let _frame_len = read_varint(reader).await?;

    let packet_id = read_varint(reader).await?;
    if packet_id != STATUS_PACKET_ID {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid packet id {}", packet_id),
        ));
    }

    let len = read_varint(reader).await?;
    if len <= 0 || len > MAX_STATUS_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid status length {}", len),
        ));
    }

    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Decodes the status payload. Bytes that are not UTF-8 are reported escaped, as received.
pub fn decode_status(bytes: &[u8]) -> Result<PingResponse, PingError> {
    let raw = std::str::from_utf8(bytes).map_err(|e| {
        PingError::malformed(bytes.escape_ascii().to_string(), format!("invalid UTF-8: {}", e))
    })?;
    parse_status(raw)
}

/// Extracts counts and MOTD from a status document.
pub fn parse_status(raw: &str) -> Result<PingResponse, PingError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| PingError::malformed(raw, format!("invalid JSON: {}", e)))?;

    let players = value
        .get("players")
        .ok_or_else(|| PingError::malformed(raw, "missing \"players\""))?;
    let online_players = int_field(players, "online")
        .ok_or_else(|| PingError::malformed(raw, "missing \"players.online\""))?;
    let max_players = int_field(players, "max")
        .ok_or_else(|| PingError::malformed(raw, "missing \"players.max\""))?;

    let motd = value.get("description").map(flatten_text).unwrap_or_default();

    Ok(PingResponse { online_players, max_players, motd })
}

fn int_field(value: &Value, key: &str) -> Option<i32> {
    value.get(key)?.as_i64().and_then(|v| i32::try_from(v).ok())
}

// Chat components: plain strings, {"text", "extra"} objects, or arrays of either.
fn flatten_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(flatten_text).collect(),
        Value::Object(map) => {
            let mut out = map.get("text").map(flatten_text).unwrap_or_default();
            if let Some(extra) = map.get("extra") {
                out.push_str(&flatten_text(extra));
            }
            out
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn varint_encoding() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 300);
        assert_eq!(buf, vec![0xAC, 0x02]);

        buf.clear();
        write_varint(&mut buf, -1);
        assert_eq!(buf, vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
    }

    #[test]
    fn handshake_layout() {
        let packet = handshake_packet(47, &ServerAddress::new("ab", 25565)).unwrap();
        assert_eq!(packet, vec![8, 0x00, 47, 2, b'a', b'b', 0x63, 0xDD, 1]);
    }

    #[test]
    fn parses_plain_description() {
        let raw = r#"{"version":{"name":"1.20.4","protocol":765},"players":{"max":100,"online":7},"description":"A Minecraft Server"}"#;
        let response = parse_status(raw).unwrap();
        assert_eq!(
            response,
            PingResponse { online_players: 7, max_players: 100, motd: "A Minecraft Server".to_string() }
        );
    }

    #[test]
    fn parses_component_description() {
        let raw = r#"{"players":{"max":20,"online":0},"description":{"text":"Hello ","extra":[{"text":"world"},"!"]}}"#;
        assert_eq!(parse_status(raw).unwrap().motd, "Hello world!");
    }

    #[test]
    fn missing_players_is_malformed() {
        let raw = r#"{"description":"no players here"}"#;
        match parse_status(raw) {
            Err(PingError::MalformedResponse { raw: payload, reason }) => {
                assert_eq!(payload, raw);
                assert!(reason.contains("players"));
            }
            other => panic!("expected malformed response, got {:?}", other),
        }
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(parse_status("not json"), Err(PingError::MalformedResponse { .. })));
    }

    #[test]
    fn invalid_utf8_is_malformed_with_escaped_bytes() {
        let mut bytes = br#"{"description":""#.to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFE]);
        bytes.extend_from_slice(br#""}"#);
        match decode_status(&bytes) {
            Err(PingError::MalformedResponse { raw, reason }) => {
                assert!(raw.contains("\\xff\\xfe"), "{}", raw);
                assert!(reason.starts_with("invalid UTF-8"));
            }
            other => panic!("expected malformed response, got {:?}", other),
        }
    }

    fn status_reply(packet_id: i32, json: &str) -> Vec<u8> {
        let mut payload = Vec::new();
        write_varint(&mut payload, packet_id);
        write_string(&mut payload, json);
        frame(&payload)
    }

    async fn serve_reply(listener: TcpListener, reply: Vec<u8>) {
        let (mut socket, _) = listener.accept().await.unwrap();
        for _ in 0..2 {
            let len = read_varint(&mut socket).await.unwrap();
            let mut packet = vec![0u8; len as usize];
            socket.read_exact(&mut packet).await.unwrap();
        }
        socket.write_all(&reply).await.unwrap();
    }

    async fn serve_once(listener: TcpListener, json: &'static str) {
        serve_reply(listener, status_reply(STATUS_PACKET_ID, json)).await;
    }

    async fn ping_local(reply: Vec<u8>) -> Result<PingResponse, PingError> {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_reply(listener, reply));
        let result = MinecraftPinger::default()
            .ping(&ServerAddress::new("127.0.0.1", port), Duration::from_secs(2))
            .await;
        server.await.unwrap();
        result
    }

    #[tokio::test]
    async fn unexpected_packet_id_is_io_error() {
        let result = ping_local(status_reply(0x01, r#"{"players":{"max":1,"online":1}}"#)).await;
        assert!(matches!(result, Err(PingError::Io(_))), "{:?}", result);
    }

    #[tokio::test]
    async fn empty_status_is_io_error() {
        let mut payload = Vec::new();
        write_varint(&mut payload, STATUS_PACKET_ID);
        write_varint(&mut payload, 0);
        let result = ping_local(frame(&payload)).await;
        assert!(matches!(result, Err(PingError::Io(_))), "{:?}", result);
    }

    #[tokio::test]
    async fn unresolvable_host_is_unknown_host() {
        let result = MinecraftPinger::default()
            .ping(&ServerAddress::new("no-such-host.invalid", 25565), Duration::from_secs(10))
            .await;
        assert!(matches!(result, Err(PingError::UnknownHost)), "{:?}", result);
    }

    #[tokio::test]
    async fn pings_a_live_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(serve_once(
            listener,
            r#"{"players":{"max":50,"online":12},"description":{"text":"Lobby"}}"#,
        ));

        let response = MinecraftPinger::default()
            .ping(&ServerAddress::new("127.0.0.1", port), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(response.online_players, 12);
        assert_eq!(response.max_players, 50);
        assert_eq!(response.motd, "Lobby");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn closed_port_is_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = MinecraftPinger::default()
            .ping(&ServerAddress::new("127.0.0.1", port), Duration::from_secs(2))
            .await;
        assert!(matches!(result, Err(PingError::ConnectionRefused)), "{:?}", result);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _hold = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let result = MinecraftPinger::default()
            .ping(&ServerAddress::new("127.0.0.1", port), Duration::from_millis(100))
            .await;
        assert!(matches!(result, Err(PingError::Timeout)), "{:?}", result);
    }
}
